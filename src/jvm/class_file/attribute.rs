use crate::jvm::class_file::{
    parse_bytes, ClassConstantIndex, ConstantIndex, Parse, Serialize, Utf8ConstantIndex,
};
use crate::jvm::verifier::VerificationType;
use crate::jvm::InnerClassAccessFlags;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Error, ErrorKind, Result};

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// The representation is designed to be easily extended with custom attributes.
/// While some attributes aren't essential, others are really important (eg. the
/// code attribute for including the actual bytecode).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Interpret the raw attribute bytes as a specific attribute
    ///
    /// Fails if the attribute does not use up exactly all of its bytes.
    pub fn decode<A: AttributeLike>(&self) -> Result<A> {
        let mut cursor = Cursor::new(&self.info[..]);
        let attribute = A::parse(&mut cursor)?;
        if cursor.position() as usize != self.info.len() {
            let msg = format!("Trailing bytes after {} attribute", A::NAME);
            return Err(Error::new(ErrorKind::InvalidData, msg));
        }
        Ok(attribute)
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        let len = u32::try_from(self.info.len())
            .map_err(|_| Error::new(ErrorKind::InvalidData, "Attribute is too long"))?;
        len.serialize(writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Parse for Attribute {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let name_index = Utf8ConstantIndex::parse(reader)?;
        let len = u32::parse(reader)?;
        let info = parse_bytes(reader, len as usize)?;
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into (and read back out of) attributes.
pub trait AttributeLike: Serialize + Parse {
    /// Name of the attribute
    const NAME: &'static str;
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.2
#[derive(Debug)]
pub struct ConstantValue(pub ConstantIndex);

impl Serialize for ConstantValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for ConstantValue {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        ConstantIndex::parse(reader).map(ConstantValue)
    }
}

impl AttributeLike for ConstantValue {
    const NAME: &'static str = "ConstantValue";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.3
#[derive(Debug)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: BytecodeArray,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        self.code_array.serialize(writer)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Parse for Code {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(Code {
            max_stack: u16::parse(reader)?,
            max_locals: u16::parse(reader)?,
            code_array: BytecodeArray::parse(reader)?,
            exception_table: Vec::parse(reader)?,
            attributes: Vec::parse(reader)?,
        })
    }
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";
}

#[derive(Debug)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: BytecodeIndex,

    /// End of exception handler range (exclusive)
    pub end_pc: BytecodeIndex,

    /// Start of the exception handler
    pub handler_pc: BytecodeIndex,

    /// Zero means any exception is caught
    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Parse for ExceptionHandler {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(ExceptionHandler {
            start_pc: BytecodeIndex::parse(reader)?,
            end_pc: BytecodeIndex::parse(reader)?,
            handler_pc: BytecodeIndex::parse(reader)?,
            catch_type: ClassConstantIndex::parse(reader)?,
        })
    }
}

/// Encoded bytecode instructions
#[derive(Debug)]
pub struct BytecodeArray(pub Vec<u8>);

impl Serialize for BytecodeArray {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let len = self.0.len() as u32;
        len.serialize(writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl Parse for BytecodeArray {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let len = u32::parse(reader)?;
        parse_bytes(reader, len as usize).map(BytecodeArray)
    }
}

/// Index into `BytecodeArray`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BytecodeIndex(pub u16);

impl Serialize for BytecodeIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for BytecodeIndex {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        u16::parse(reader).map(BytecodeIndex)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.4
#[derive(Debug)]
pub struct StackMapTable(pub Vec<StackMapFrame>);

impl AttributeLike for StackMapTable {
    const NAME: &'static str = "StackMapTable";
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for StackMapTable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(StackMapTable)
    }
}

/// Verification type as it appears inside a serialized stack map frame
pub type SerializedVerificationType = VerificationType<ClassConstantIndex, u16>;

#[derive(Debug, PartialEq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: SerializedVerificationType,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<SerializedVerificationType>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<SerializedVerificationType>,
        stack: Vec<SerializedVerificationType>,
    },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                if !(1..=3).contains(chopped_k) {
                    return Err(Error::new(ErrorKind::InvalidData, "Chop frames chop 1-3 locals"));
                }
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                let added_k = locals.len();
                if !(1..=3).contains(&added_k) {
                    return Err(Error::new(ErrorKind::InvalidData, "Append frames add 1-3 locals"));
                }
                (251 + added_k as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Parse for StackMapFrame {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let frame = match u8::parse(reader)? {
            tag @ 0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: tag as u16,
            },
            tag @ 64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: (tag - 64) as u16,
                stack: VerificationType::parse(reader)?,
            },
            247 => StackMapFrame::SameLocalsOneStack {
                offset_delta: u16::parse(reader)?,
                stack: VerificationType::parse(reader)?,
            },
            tag @ 248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: u16::parse(reader)?,
                chopped_k: 251 - tag,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::parse(reader)?,
            },
            tag @ 252..=254 => {
                let offset_delta = u16::parse(reader)?;
                let locals = (0..tag - 251)
                    .map(|_| VerificationType::parse(reader))
                    .collect::<Result<_>>()?;
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => StackMapFrame::Full {
                offset_delta: u16::parse(reader)?,
                locals: Vec::parse(reader)?,
                stack: Vec::parse(reader)?,
            },
            tag => {
                let msg = format!("Reserved stack map frame tag {}", tag);
                return Err(Error::new(ErrorKind::InvalidData, msg));
            }
        };
        Ok(frame)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.5
#[derive(Debug)]
pub struct Exceptions(pub Vec<ClassConstantIndex>);

impl AttributeLike for Exceptions {
    const NAME: &'static str = "Exceptions";
}

impl Serialize for Exceptions {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for Exceptions {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(Exceptions)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.23
#[derive(Debug)]
pub struct BootstrapMethods(pub Vec<BootstrapMethod>);

#[derive(Debug, Clone)]
pub struct BootstrapMethod {
    pub bootstrap_method: ConstantIndex,
    pub bootstrap_arguments: Vec<ConstantIndex>,
}

impl AttributeLike for BootstrapMethods {
    const NAME: &'static str = "BootstrapMethods";
}

impl Serialize for BootstrapMethods {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for BootstrapMethods {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(BootstrapMethods)
    }
}

impl Serialize for BootstrapMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bootstrap_method.serialize(writer)?;
        self.bootstrap_arguments.serialize(writer)?;
        Ok(())
    }
}

impl Parse for BootstrapMethod {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(BootstrapMethod {
            bootstrap_method: ConstantIndex::parse(reader)?,
            bootstrap_arguments: Vec::parse(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.28
#[derive(Debug)]
pub struct NestHost(pub ClassConstantIndex);

impl AttributeLike for NestHost {
    const NAME: &'static str = "NestHost";
}

impl Serialize for NestHost {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for NestHost {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        ClassConstantIndex::parse(reader).map(NestHost)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.29
#[derive(Debug)]
pub struct NestMembers(pub Vec<ClassConstantIndex>);

impl AttributeLike for NestMembers {
    const NAME: &'static str = "NestMembers";
}

impl Serialize for NestMembers {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for NestMembers {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(NestMembers)
    }
}

/// Every inner class referenced in a class' constant pool must be included in the inner classes
/// attribute on the class.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.6
#[derive(Debug)]
pub struct InnerClasses(pub Vec<InnerClass>);

impl AttributeLike for InnerClasses {
    const NAME: &'static str = "InnerClasses";
}

impl Serialize for InnerClasses {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for InnerClasses {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(InnerClasses)
    }
}

#[derive(Debug)]
pub struct InnerClass {
    pub inner_class: ClassConstantIndex,

    /// Zero for local and anonymous classes
    pub outer_class: ClassConstantIndex,

    /// Zero for anonymous classes
    pub inner_name: Utf8ConstantIndex,
    pub access_flags: InnerClassAccessFlags,
}

impl Serialize for InnerClass {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.inner_class.serialize(writer)?;
        self.outer_class.serialize(writer)?;
        self.inner_name.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        Ok(())
    }
}

impl Parse for InnerClass {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(InnerClass {
            inner_class: ClassConstantIndex::parse(reader)?,
            outer_class: ClassConstantIndex::parse(reader)?,
            inner_name: Utf8ConstantIndex::parse(reader)?,
            access_flags: InnerClassAccessFlags::parse(reader)?,
        })
    }
}

#[derive(Debug)]
pub struct Signature {
    pub signature: Utf8ConstantIndex,
}

impl AttributeLike for Signature {
    const NAME: &'static str = "Signature";
}

impl Serialize for Signature {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.signature.serialize(writer)?;
        Ok(())
    }
}

impl Parse for Signature {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(Signature {
            signature: Utf8ConstantIndex::parse(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.10
#[derive(Debug)]
pub struct SourceFile(pub Utf8ConstantIndex);

impl AttributeLike for SourceFile {
    const NAME: &'static str = "SourceFile";
}

impl Serialize for SourceFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for SourceFile {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Utf8ConstantIndex::parse(reader).map(SourceFile)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.12
#[derive(Debug)]
pub struct LineNumberTable(pub Vec<LineNumber>);

#[derive(Debug)]
pub struct LineNumber {
    pub start_pc: BytecodeIndex,
    pub line_number: u16,
}

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for LineNumberTable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(LineNumberTable)
    }
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)
    }
}

impl Parse for LineNumber {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(LineNumber {
            start_pc: BytecodeIndex::parse(reader)?,
            line_number: u16::parse(reader)?,
        })
    }
}

/// Entry in either a `LocalVariableTable` (where `descriptor` is a field descriptor) or a
/// `LocalVariableTypeTable` (where it is a field signature)
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.13
#[derive(Debug)]
pub struct LocalVariable {
    pub start_pc: BytecodeIndex,
    pub length: u16,
    pub name: Utf8ConstantIndex,
    pub descriptor: Utf8ConstantIndex,
    pub index: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.index.serialize(writer)
    }
}

impl Parse for LocalVariable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(LocalVariable {
            start_pc: BytecodeIndex::parse(reader)?,
            length: u16::parse(reader)?,
            name: Utf8ConstantIndex::parse(reader)?,
            descriptor: Utf8ConstantIndex::parse(reader)?,
            index: u16::parse(reader)?,
        })
    }
}

#[derive(Debug)]
pub struct LocalVariableTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTable {
    const NAME: &'static str = "LocalVariableTable";
}

impl Serialize for LocalVariableTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for LocalVariableTable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(LocalVariableTable)
    }
}

#[derive(Debug)]
pub struct LocalVariableTypeTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTypeTable {
    const NAME: &'static str = "LocalVariableTypeTable";
}

impl Serialize for LocalVariableTypeTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Parse for LocalVariableTypeTable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Vec::parse(reader).map(LocalVariableTypeTable)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode<A: Serialize>(attribute: &A) -> Vec<u8> {
        let mut bytes = vec![];
        attribute.serialize(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn compact_frame_encodings() {
        let same = StackMapFrame::SameLocalsNoStack { offset_delta: 5 };
        assert_eq!(encode(&same), vec![5]);

        let extended = StackMapFrame::SameLocalsNoStack { offset_delta: 300 };
        assert_eq!(encode(&extended), vec![251, 1, 44]);

        let one_stack = StackMapFrame::SameLocalsOneStack {
            offset_delta: 2,
            stack: VerificationType::Integer,
        };
        assert_eq!(encode(&one_stack), vec![66, 1]);

        let chop = StackMapFrame::ChopLocalsNoStack {
            offset_delta: 7,
            chopped_k: 2,
        };
        assert_eq!(encode(&chop), vec![249, 0, 7]);
    }

    #[test]
    fn frames_read_back() {
        let frames = StackMapTable(vec![
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![VerificationType::Long, VerificationType::Top],
            },
            StackMapFrame::Full {
                offset_delta: 12,
                locals: vec![VerificationType::Object(ClassConstantIndex(ConstantIndex(4)))],
                stack: vec![VerificationType::Uninitialized(9)],
            },
        ]);
        let attribute = Attribute {
            name_index: Utf8ConstantIndex(ConstantIndex(1)),
            info: encode(&frames),
        };
        let decoded: StackMapTable = attribute.decode().unwrap();
        assert_eq!(decoded.0, frames.0);
    }

    #[test]
    fn reserved_frame_tag() {
        let attribute = Attribute {
            name_index: Utf8ConstantIndex(ConstantIndex(1)),
            info: vec![0, 1, 200],
        };
        assert!(attribute.decode::<StackMapTable>().is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let attribute = Attribute {
            name_index: Utf8ConstantIndex(ConstantIndex(1)),
            info: vec![0, 3, 0],
        };
        assert!(attribute.decode::<SourceFile>().is_err());
    }
}
