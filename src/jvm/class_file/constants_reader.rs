use crate::jvm::class_file::{
    BootstrapMethod, ClassConstantIndex, Constant, ConstantIndex, HandleKind,
    NameAndTypeConstantIndex, Utf8ConstantIndex,
};
use crate::jvm::descriptors::ParseDescriptor;
use crate::jvm::names::Name;
use crate::jvm::references::{
    BootstrapMethodData, CallSite, ConstantData, DynamicConstant, FieldRef, HandleMember,
    MethodHandle, MethodRef,
};
use crate::jvm::{BinaryName, Error, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use crate::util::{Offset, OffsetVec};

/// Read-only view of the constant pool of a parsed class file
///
/// Lookups resolve raw indices into the symbolic references used by the rest of the crate. Since
/// dynamic constants and call sites refer to the `BootstrapMethods` attribute, that attribute must
/// be registered (see [`ConstantPool::set_bootstrap_methods`]) before those get resolved.
#[derive(Debug)]
pub struct ConstantPool {
    constants: OffsetVec<Constant>,
    bootstrap_methods: Vec<BootstrapMethod>,
}

/// Dynamic constants can have other dynamic constants as bootstrap arguments
const MAX_DYNAMIC_NESTING: usize = 64;

impl ConstantPool {
    pub fn new(constants: OffsetVec<Constant>) -> ConstantPool {
        ConstantPool {
            constants,
            bootstrap_methods: vec![],
        }
    }

    pub fn set_bootstrap_methods(&mut self, bootstrap_methods: Vec<BootstrapMethod>) {
        self.bootstrap_methods = bootstrap_methods;
    }

    pub fn get(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        self.constants
            .get_offset(Offset(index.0 as usize))
            .ok_or_else(|| malformed(format!("Invalid constant pool index {}", index.0)))
    }

    pub fn get_utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::Utf8(string) => Ok(string),
            other => Err(unexpected("Utf8", index.0, other)),
        }
    }

    pub fn get_unqualified_name(&self, index: Utf8ConstantIndex) -> Result<UnqualifiedName, Error> {
        UnqualifiedName::from_string(self.get_utf8(index)?.to_owned()).map_err(Error::MalformedClassFile)
    }

    pub fn get_binary_name(&self, index: Utf8ConstantIndex) -> Result<BinaryName, Error> {
        BinaryName::from_string(self.get_utf8(index)?.to_owned()).map_err(Error::MalformedClassFile)
    }

    pub fn get_field_type(&self, index: Utf8ConstantIndex) -> Result<FieldType<BinaryName>, Error> {
        let descriptor = self.get_utf8(index)?;
        FieldType::parse(descriptor).map_err(|err| bad_descriptor(descriptor, err))
    }

    pub fn get_method_descriptor(
        &self,
        index: Utf8ConstantIndex,
    ) -> Result<MethodDescriptor<BinaryName>, Error> {
        let descriptor = self.get_utf8(index)?;
        MethodDescriptor::parse(descriptor).map_err(|err| bad_descriptor(descriptor, err))
    }

    /// Resolve a `CONSTANT_Class_info` (which may be an array type)
    pub fn get_class(&self, index: ClassConstantIndex) -> Result<RefType<BinaryName>, Error> {
        match self.get(index.0)? {
            Constant::Class(name) => {
                let name = self.get_utf8(*name)?;
                RefType::parse_class_name(name).map_err(|err| bad_descriptor(name, err))
            }
            other => Err(unexpected("Class", index.0, other)),
        }
    }

    /// Resolve a `CONSTANT_Class_info` which must refer to a class or interface
    pub fn get_class_name(&self, index: ClassConstantIndex) -> Result<BinaryName, Error> {
        match self.get_class(index)? {
            RefType::Object(name) => Ok(name),
            other => Err(malformed(format!(
                "Expected class name at index {} but found array type {}",
                index.0 .0,
                other.render_class_name()
            ))),
        }
    }

    fn get_name_and_type(
        &self,
        index: NameAndTypeConstantIndex,
    ) -> Result<(UnqualifiedName, Utf8ConstantIndex), Error> {
        match self.get(index.0)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.get_unqualified_name(*name)?, *descriptor))
            }
            other => Err(unexpected("NameAndType", index.0, other)),
        }
    }

    pub fn get_field_ref(&self, index: ConstantIndex) -> Result<FieldRef, Error> {
        match self.get(index)? {
            Constant::FieldRef(class, name_and_type) => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                Ok(FieldRef {
                    class: self.get_class_name(*class)?,
                    name,
                    descriptor: self.get_field_type(descriptor)?,
                })
            }
            other => Err(unexpected("Fieldref", index, other)),
        }
    }

    pub fn get_method_ref(&self, index: ConstantIndex) -> Result<MethodRef, Error> {
        match self.get(index)? {
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                Ok(MethodRef {
                    class: self.get_class(*class)?,
                    name,
                    descriptor: self.get_method_descriptor(descriptor)?,
                    is_interface: *is_interface,
                })
            }
            other => Err(unexpected("Methodref", index, other)),
        }
    }

    pub fn get_method_handle(&self, index: ConstantIndex) -> Result<MethodHandle, Error> {
        match self.get(index)? {
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                let member = if handle_kind.is_field() {
                    HandleMember::Field(self.get_field_ref(*member)?)
                } else {
                    HandleMember::Method(self.get_method_ref(*member)?)
                };
                Ok(MethodHandle {
                    kind: *handle_kind,
                    member,
                })
            }
            other => Err(unexpected("MethodHandle", index, other)),
        }
    }

    /// Resolve a loadable constant (eg. the operand of `ldc` or a bootstrap argument)
    pub fn get_constant_data(&self, index: ConstantIndex) -> Result<ConstantData, Error> {
        self.get_constant_data_nested(index, 0)
    }

    fn get_constant_data_nested(
        &self,
        index: ConstantIndex,
        depth: usize,
    ) -> Result<ConstantData, Error> {
        Ok(match self.get(index)? {
            Constant::String(utf8) => ConstantData::String(self.get_utf8(*utf8)?.to_owned()),
            Constant::Class(_) => ConstantData::Class(self.get_class(ClassConstantIndex(index))?),
            Constant::Integer(integer) => ConstantData::Integer(*integer),
            Constant::Float(float) => ConstantData::float(*float),
            Constant::Long(long) => ConstantData::Long(*long),
            Constant::Double(double) => ConstantData::double(*double),
            Constant::MethodHandle { .. } => {
                ConstantData::MethodHandle(self.get_method_handle(index)?)
            }
            Constant::MethodType { descriptor } => {
                ConstantData::MethodType(self.get_method_descriptor(*descriptor)?)
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                if depth > MAX_DYNAMIC_NESTING {
                    return Err(malformed(format!(
                        "Dynamic constant at index {} is nested too deeply",
                        index.0
                    )));
                }
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                ConstantData::Dynamic(Box::new(DynamicConstant {
                    name,
                    descriptor: self.get_field_type(descriptor)?,
                    bootstrap: self.get_bootstrap_method_nested(*bootstrap_method, depth + 1)?,
                }))
            }
            other => return Err(unexpected("loadable constant", index, other)),
        })
    }

    pub fn get_bootstrap_method(&self, index: u16) -> Result<BootstrapMethodData, Error> {
        self.get_bootstrap_method_nested(index, 0)
    }

    fn get_bootstrap_method_nested(
        &self,
        index: u16,
        depth: usize,
    ) -> Result<BootstrapMethodData, Error> {
        let bootstrap = self
            .bootstrap_methods
            .get(index as usize)
            .ok_or_else(|| malformed(format!("Missing bootstrap method {}", index)))?;
        Ok(BootstrapMethodData {
            method: self.get_method_handle(bootstrap.bootstrap_method)?,
            arguments: bootstrap
                .bootstrap_arguments
                .iter()
                .map(|argument| self.get_constant_data_nested(*argument, depth))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn get_call_site(&self, index: ConstantIndex) -> Result<CallSite, Error> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                let (name, descriptor) = self.get_name_and_type(*method_descriptor)?;
                Ok(CallSite {
                    name,
                    descriptor: self.get_method_descriptor(descriptor)?,
                    bootstrap: self.get_bootstrap_method(*bootstrap_method)?,
                })
            }
            other => Err(unexpected("InvokeDynamic", index, other)),
        }
    }

    /// Kind of method handle at an index (without resolving the member)
    pub fn get_handle_kind(&self, index: ConstantIndex) -> Result<HandleKind, Error> {
        match self.get(index)? {
            Constant::MethodHandle { handle_kind, .. } => Ok(*handle_kind),
            other => Err(unexpected("MethodHandle", index, other)),
        }
    }
}

fn malformed(message: String) -> Error {
    Error::MalformedClassFile(message)
}

fn unexpected(expected: &str, index: ConstantIndex, found: &Constant) -> Error {
    malformed(format!(
        "Expected {} constant at index {} but found {:?}",
        expected, index.0, found
    ))
}

fn bad_descriptor(descriptor: &str, err: std::io::Error) -> Error {
    malformed(format!("Invalid descriptor '{}': {}", descriptor, err))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantsPool, ConstantsWriter};

    #[test]
    fn resolves_written_references() {
        let mut pool = ConstantsPool::new();
        let field = FieldRef {
            class: BinaryName::from_string("demo/Counter".to_owned()).unwrap(),
            name: UnqualifiedName::from_string("count".to_owned()).unwrap(),
            descriptor: FieldType::int(),
        };
        let method = MethodRef::interface(
            BinaryName::from_string("demo/Shape".to_owned()).unwrap(),
            UnqualifiedName::from_string("area".to_owned()).unwrap(),
            MethodDescriptor::parse("(I)D").unwrap(),
        );
        let field_idx = field.constant_index(&mut pool).unwrap();
        let method_idx = method.constant_index(&mut pool).unwrap();
        let double_idx = ConstantData::double(2.5).constant_index(&mut pool).unwrap();

        let (constants, _) = pool.into_parts();
        let reader = ConstantPool::new(constants);
        assert_eq!(reader.get_field_ref(field_idx.into()).unwrap(), field);
        assert_eq!(reader.get_method_ref(method_idx.into()).unwrap(), method);
        assert_eq!(
            reader.get_constant_data(double_idx).unwrap(),
            ConstantData::double(2.5)
        );
    }

    #[test]
    fn rejects_wrong_constant_kind() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("plain").unwrap();
        let (constants, _) = pool.into_parts();
        let reader = ConstantPool::new(constants);
        assert!(matches!(
            reader.get_field_ref(utf8.into()),
            Err(Error::MalformedClassFile(_))
        ));
        assert!(reader.get(ConstantIndex(40)).is_err());
    }
}
