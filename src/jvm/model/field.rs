use crate::jvm::class_file::{
    self, Attribute, ConstantPool, ConstantValue, ConstantsPool, ConstantsWriter, Signature,
};
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::names::Name;
use crate::jvm::references::ConstantData;
use crate::jvm::{BinaryName, Error, FieldAccessFlags, FieldType, UnqualifiedName};

/// Semantic representation of a field
#[derive(Clone, Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,

    /// Generic field signature
    pub generic_signature: Option<String>,

    /// Initial value of a static field
    pub constant_value: Option<ConstantData>,
}

impl Field {
    /// Create a new field with no attributes
    pub fn new(
        access_flags: FieldAccessFlags,
        name: UnqualifiedName,
        descriptor: FieldType<BinaryName>,
    ) -> Field {
        Field {
            access_flags,
            name,
            descriptor,
            generic_signature: None,
            constant_value: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    /// Resolve a field from a class file
    pub fn parse_field(field: &class_file::Field, constants: &ConstantPool) -> Result<Field, Error> {
        let mut parsed = Field::new(
            field.access_flags,
            constants.get_unqualified_name(field.name_index)?,
            constants.get_field_type(field.descriptor_index)?,
        );

        for attribute in &field.attributes {
            match constants.get_utf8(attribute.name_index)? {
                "Signature" => {
                    let signature: Signature = decode_attribute(attribute)?;
                    parsed.generic_signature =
                        Some(constants.get_utf8(signature.signature)?.to_owned());
                }
                "ConstantValue" => {
                    let ConstantValue(index) = decode_attribute(attribute)?;
                    parsed.constant_value = Some(constants.get_constant_data(index)?);
                }
                _ => (),
            }
        }

        Ok(parsed)
    }

    /// Serialize the field
    pub fn serialize_field(&self, constants_pool: &mut ConstantsPool) -> Result<class_file::Field, Error> {
        let name_index = constants_pool.get_utf8(self.name.as_str())?;
        let descriptor_index = constants_pool.get_utf8(self.descriptor.render())?;

        let mut attributes = vec![];

        if let Some(constant) = &self.constant_value {
            let index = constant.constant_index(constants_pool)?;
            attributes.push(constants_pool.get_attribute(ConstantValue(index))?);
        }

        if let Some(signature) = &self.generic_signature {
            let signature = constants_pool.get_utf8(signature.as_str())?;
            attributes.push(constants_pool.get_attribute(Signature { signature })?);
        }

        Ok(class_file::Field {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}

/// Decode an attribute, reporting failures as malformed class files
pub(super) fn decode_attribute<A: class_file::AttributeLike>(attribute: &Attribute) -> Result<A, Error> {
    attribute
        .decode::<A>()
        .map_err(|err| Error::MalformedClassFile(format!("Bad {} attribute: {}", A::NAME, err)))
}
