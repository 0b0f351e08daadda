use crate::jvm::class_file::{Constant, ConstantPoolOverflow};
use crate::jvm::code::SynLabel;
use crate::jvm::verifier::VerifierErrorKind;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow {
        constant: Constant,
        offset: u16,
    },
    IoError(std::io::Error),
    MethodCodeMaxStackOverflow(usize),
    MethodCodeMaxLocalsOverflow(usize),

    /// Code array would be longer than 65535 bytes
    MethodCodeOverflow(usize),

    /// Input could not be read as a class file
    MalformedClassFile(String),

    /// Opcode we refuse to decode (`jsr`, `ret`, or unassigned)
    UnsupportedInstruction {
        opcode: u8,
        offset: usize,
    },

    /// A label is used but never placed in the method body
    UnplacedLabel(SynLabel),

    /// A label is placed twice in the same method body
    DuplicateLabel(SynLabel),

    /// A jump target or exception handler has no verification frame
    MissingFrame(SynLabel),

    /// Labels placed at the same offset carry different frames
    ConflictingFrames(usize),

    /// Conditional jump could not be rewritten to reach its target
    UnencodableJump {
        from: usize,
        to: usize,
    },

    /// Control flow reaches the element at `index` with two different stack depths
    InconsistentStackDepth {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Generated instruction does not type-check against the current frame
    VerifierError {
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// Label is reached with two different frames
    IncompatibleFrames {
        label: SynLabel,
        found: String,
        expected: String,
    },

    /// Label placed in unreachable code before anything jumps to it
    PlacingLabelBeforeReference(SynLabel),

    /// Builder finished with labels that were jumped to but never placed
    MethodCodeNotFinished {
        unplaced_labels: Vec<SynLabel>,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: overflow.constant,
            offset: overflow.offset,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { constant, offset } => {
                write!(f, "constant pool is full at {} (adding {:?})", offset, constant)
            }
            Error::IoError(err) => write!(f, "{}", err),
            Error::MethodCodeMaxStackOverflow(size) => {
                write!(f, "method needs {} stack slots (max is 65535)", size)
            }
            Error::MethodCodeMaxLocalsOverflow(size) => {
                write!(f, "method needs {} local slots (max is 65535)", size)
            }
            Error::MethodCodeOverflow(size) => {
                write!(f, "method code is {} bytes (max is 65535)", size)
            }
            Error::MalformedClassFile(msg) => write!(f, "malformed class file: {}", msg),
            Error::UnsupportedInstruction { opcode, offset } => {
                write!(f, "unsupported opcode 0x{:02x} at offset {}", opcode, offset)
            }
            Error::UnplacedLabel(label) => write!(f, "label {:?} is never placed", label),
            Error::DuplicateLabel(label) => write!(f, "label {:?} is placed twice", label),
            Error::MissingFrame(label) => write!(f, "label {:?} has no stack map frame", label),
            Error::ConflictingFrames(offset) => {
                write!(f, "conflicting stack map frames at offset {}", offset)
            }
            Error::UnencodableJump { from, to } => {
                write!(f, "cannot encode jump from {} to {}", from, to)
            }
            Error::InconsistentStackDepth {
                index,
                expected,
                found,
            } => write!(
                f,
                "code element {} is reached with stack depth {} and {}",
                index, expected, found
            ),
            Error::VerifierError { instruction, kind } => {
                write!(f, "{} does not verify: {:?}", instruction, kind)
            }
            Error::IncompatibleFrames {
                label,
                found,
                expected,
            } => write!(
                f,
                "label {:?} has frame {} but is reached with {}",
                label, found, expected
            ),
            Error::PlacingLabelBeforeReference(label) => {
                write!(f, "label {:?} is unreachable", label)
            }
            Error::MethodCodeNotFinished { unplaced_labels } => {
                write!(f, "method code has unplaced labels {:?}", unplaced_labels)
            }
        }
    }
}

impl std::error::Error for Error {}
