use crate::jvm::class_file::{
    Attribute, ClassConstantIndex, Constant, Field, Method, Parse, Serialize, Version,
};
use crate::jvm::ClassAccessFlags;
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::{BufReader, BufWriter, Error, ErrorKind, Result};
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Zero only for `java/lang/Object` and `module-info`
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut class_file = BufWriter::new(fs::File::create(path)?);
        self.serialize(&mut class_file)
    }

    /// Load a class file from disk
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<ClassFile> {
        let mut class_file = BufReader::new(fs::File::open(path)?);
        ClassFile::parse(&mut class_file)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Parse for ClassFile {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::new(ErrorKind::InvalidData, "Missing class file magic"));
        }
        let version = Version::parse(reader)?;

        // Constant pool count is one more than the largest index
        let constants_count = u16::parse(reader)? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < constants_count {
            let constant = Constant::parse(reader)?;
            if constants.offset_len().0 + constant.width() > constants_count {
                let msg = "Wide constant overflows the constant pool";
                return Err(Error::new(ErrorKind::InvalidData, msg));
            }
            constants.push(constant);
        }

        Ok(ClassFile {
            version,
            constants,
            access_flags: ClassAccessFlags::parse(reader)?,
            this_class: ClassConstantIndex::parse(reader)?,
            super_class: ClassConstantIndex::parse(reader)?,
            interfaces: Vec::parse(reader)?,
            fields: Vec::parse(reader)?,
            methods: Vec::parse(reader)?,
            attributes: Vec::parse(reader)?,
        })
    }
}
