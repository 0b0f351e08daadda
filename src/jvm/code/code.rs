use crate::jvm::code::{
    BranchInstruction, LabelGenerator, SymbolicInstruction, SynLabel, SynLabelGenerator,
};
use crate::jvm::class_file::Version;
use crate::jvm::verifier::{CodeFrame, Frame, VerificationType};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, UnqualifiedName};
use crate::util::Width;
use std::collections::HashMap;

/// Element in the flat sequence making up a method body
///
/// Labels take up no space. Conditional branches fall through to whatever element follows them.
#[derive(Clone, Debug, PartialEq)]
pub enum Element<Insn> {
    Label(SynLabel),
    Instruction(Insn),
    Branch(BranchInstruction<SynLabel, SynLabel>),
}

pub type CodeElement = Element<SymbolicInstruction>;

/// Entry of the exception table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected range (inclusive)
    pub start: SynLabel,

    /// End of the protected range (exclusive)
    pub end: SynLabel,

    /// Start of the handler code
    pub handler: SynLabel,

    /// Caught exception type (`None` catches everything)
    pub catch_type: Option<BinaryName>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start: SynLabel,
    pub line: u16,
}

/// Debug information about a local variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start: SynLabel,
    pub end: SynLabel,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub index: u16,
}

/// Debug information about the generic type of a local variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariableTypeEntry {
    pub start: SynLabel,
    pub end: SynLabel,
    pub name: UnqualifiedName,
    pub signature: String,
    pub index: u16,
}

/// What decoding and encoding need to know about the method owning a body
#[derive(Copy, Clone, Debug)]
pub struct CodeContext<'a> {
    /// Class declaring the method
    pub class: &'a BinaryName,
    pub is_static: bool,
    pub is_constructor: bool,
    pub descriptor: &'a MethodDescriptor<BinaryName>,

    /// Version of the enclosing class file
    pub version: Version,
}

impl<'a> CodeContext<'a> {
    /// Frame on entry to the method
    pub fn implicit_frame(&self) -> CodeFrame {
        Frame::implicit(
            self.class,
            self.is_static,
            self.is_constructor,
            self.descriptor,
        )
    }
}

/// Semantic representation of a method body
///
/// Byte offsets are replaced by labels everywhere (branch targets, exception ranges, debug tables,
/// uninitialized verification types) so that instructions can be freely inserted and removed.
/// Frames are absolute and only get delta-compressed when the body is serialized again.
#[derive(Clone, Debug, Default)]
pub struct MethodCode {
    /// Lower bound on the maximum height of the operand stack
    pub max_stack: usize,

    /// Lower bound on the number of local variable slots
    pub max_locals: usize,

    /// Instructions and labels, in placement order
    pub elements: Vec<CodeElement>,

    pub exception_handlers: Vec<TryCatchBlock>,

    /// Verification frames at labels
    pub frames: HashMap<SynLabel, CodeFrame>,

    pub line_numbers: Vec<LineNumberEntry>,
    pub local_variables: Vec<LocalVariableEntry>,
    pub local_variable_types: Vec<LocalVariableTypeEntry>,

    /// Generator to produce the next label
    pub label_generator: SynLabelGenerator,
}

impl MethodCode {
    /// Empty method body
    pub fn new() -> MethodCode {
        MethodCode::default()
    }

    /// Iterate over all of the non-label instructions
    pub fn instructions(&self) -> impl Iterator<Item = &SymbolicInstruction> {
        self.elements.iter().filter_map(|element| match element {
            CodeElement::Instruction(insn) => Some(insn),
            _ => None,
        })
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        self.label_generator.fresh_label()
    }

    /// Every label mentioned anywhere in the body
    pub fn labels(&self) -> Vec<SynLabel> {
        let mut labels = vec![];
        for element in &self.elements {
            match element {
                CodeElement::Label(label) => labels.push(*label),
                CodeElement::Instruction(_) => (),
                CodeElement::Branch(branch) => {
                    labels.extend(branch.jump_targets().targets().iter().copied())
                }
            }
        }
        for block in &self.exception_handlers {
            labels.extend([block.start, block.end, block.handler]);
        }
        labels.extend(self.frames.keys().copied());
        labels.extend(self.uninitialized_labels());
        labels.extend(self.line_numbers.iter().map(|entry| entry.start));
        for entry in &self.local_variables {
            labels.extend([entry.start, entry.end]);
        }
        for entry in &self.local_variable_types {
            labels.extend([entry.start, entry.end]);
        }
        labels
    }

    /// Copy of this body where every label has been replaced by a fresh one from `generator`
    ///
    /// Used to splice one method body into another without label collisions.
    pub fn relabel(&self, generator: &mut SynLabelGenerator) -> MethodCode {
        let mut renamed: HashMap<SynLabel, SynLabel> = HashMap::new();
        for label in self.labels() {
            renamed
                .entry(label)
                .or_insert_with(|| generator.fresh_label());
        }
        let rename = |label: &SynLabel| renamed[label];

        MethodCode {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            elements: self
                .elements
                .iter()
                .map(|element| match element {
                    CodeElement::Label(label) => CodeElement::Label(rename(label)),
                    CodeElement::Instruction(insn) => CodeElement::Instruction(insn.clone()),
                    CodeElement::Branch(branch) => {
                        CodeElement::Branch(branch.map_labels(rename, rename))
                    }
                })
                .collect(),
            exception_handlers: self
                .exception_handlers
                .iter()
                .map(|block| TryCatchBlock {
                    start: rename(&block.start),
                    end: rename(&block.end),
                    handler: rename(&block.handler),
                    catch_type: block.catch_type.clone(),
                })
                .collect(),
            frames: self
                .frames
                .iter()
                .map(|(label, frame)| (rename(label), frame.map(Clone::clone, rename)))
                .collect(),
            line_numbers: self
                .line_numbers
                .iter()
                .map(|entry| LineNumberEntry {
                    start: rename(&entry.start),
                    line: entry.line,
                })
                .collect(),
            local_variables: self
                .local_variables
                .iter()
                .map(|entry| LocalVariableEntry {
                    start: rename(&entry.start),
                    end: rename(&entry.end),
                    ..entry.clone()
                })
                .collect(),
            local_variable_types: self
                .local_variable_types
                .iter()
                .map(|entry| LocalVariableTypeEntry {
                    start: rename(&entry.start),
                    end: rename(&entry.end),
                    ..entry.clone()
                })
                .collect(),
            label_generator: generator.clone(),
        }
    }

    /// Highest local variable slot touched by an instruction, frame, or debug entry (plus one)
    pub fn locals_used(&self) -> usize {
        let mut used = self.max_locals;
        for insn in self.instructions() {
            if let Some((idx, width)) = insn.local_variable() {
                used = used.max(idx as usize + width);
            }
        }
        for frame in self.frames.values() {
            used = used.max(frame.locals.offset_len().0);
        }
        for entry in &self.local_variables {
            used = used.max(entry.index as usize + entry.descriptor.width());
        }
        used
    }

    /// Labels at which some element in the body may jump
    pub fn jump_targets(&self) -> Vec<SynLabel> {
        let mut targets = vec![];
        for element in &self.elements {
            if let CodeElement::Branch(branch) = element {
                targets.extend(branch.jump_targets().targets().iter().copied());
            }
        }
        targets.extend(self.exception_handlers.iter().map(|block| block.handler));
        targets
    }

    /// Labels used for `new` instructions referenced by uninitialized verification types
    pub fn uninitialized_labels(&self) -> Vec<SynLabel> {
        let mut labels = vec![];
        for frame in self.frames.values() {
            for vtype in frame.locals.iter().chain(frame.stack.iter()) {
                if let VerificationType::Uninitialized(label) = vtype {
                    labels.push(*label);
                }
            }
        }
        labels
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Instruction, OrdComparison};
    use crate::util::OffsetVec;

    #[test]
    fn relabel_keeps_structure() {
        let mut code = MethodCode::new();
        let top = code.fresh_label();
        let exit = code.fresh_label();
        code.elements = vec![
            CodeElement::Label(top),
            CodeElement::Instruction(Instruction::ILoad(1)),
            CodeElement::Branch(BranchInstruction::If(OrdComparison::EQ, exit)),
            CodeElement::Instruction(Instruction::IInc(1, -1)),
            CodeElement::Branch(BranchInstruction::Goto(top)),
            CodeElement::Label(exit),
            CodeElement::Branch(BranchInstruction::Return),
        ];
        let mut locals = OffsetVec::new();
        locals.push(VerificationType::Top);
        locals.push(VerificationType::Integer);
        let frame = CodeFrame {
            locals,
            stack: OffsetVec::new(),
        };
        code.frames.insert(top, frame.clone());
        code.frames.insert(exit, frame.clone());

        let mut generator = SynLabelGenerator::new(SynLabel::START);
        for _ in 0..10 {
            generator.fresh_label();
        }
        let relabelled = code.relabel(&mut generator);

        let new_top = match &relabelled.elements[0] {
            CodeElement::Label(label) => *label,
            other => panic!("expected label, got {:?}", other),
        };
        assert_ne!(new_top, top);
        assert_eq!(
            relabelled.elements[4],
            CodeElement::Branch(BranchInstruction::Goto(new_top))
        );
        assert_eq!(relabelled.frames.get(&new_top), Some(&frame));
        assert_eq!(relabelled.frames.len(), 2);
        assert_eq!(relabelled.locals_used(), 2);
    }
}
