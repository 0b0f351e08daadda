use crate::jvm::class_file::{
    Attribute, AttributeLike, BootstrapMethod, ClassConstantIndex, Constant, ConstantIndex,
    FieldRefConstantIndex, HandleKind, InvokeDynamicConstantIndex, MethodRefConstantIndex,
    NameAndTypeConstantIndex, StringConstantIndex, Utf8ConstantIndex,
};
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::names::Name;
use crate::jvm::references::{
    BootstrapMethodData, CallSite, ConstantData, FieldRef, HandleMember, MethodHandle, MethodRef,
};
use crate::jvm::{BinaryName, Error, RefType};
use crate::util::{Offset, OffsetVec, Width};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::result::Result;

/// Class file constants pool builder
///
/// The pool is append only and only after the pool is fully built up, it can be consumed into a
/// regular [`OffsetVec`]. The [`ConstantsWriter`] trait exposes inserting symbolic references
/// into the constants pool. Bootstrap methods are collected alongside the constants, since
/// `CONSTANT_InvokeDynamic_info` and `CONSTANT_Dynamic_info` refer to them by index.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    classes: HashMap<RefType<BinaryName>, ClassConstantIndex>,
    fieldrefs: HashMap<FieldRef, FieldRefConstantIndex>,
    methodrefs: HashMap<MethodRef, MethodRefConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), InvokeDynamicConstantIndex>,

    bootstrap_method_indices: HashMap<BootstrapMethodData, u16>,
    bootstrap_methods: Vec<BootstrapMethod>,
}

impl Default for ConstantsPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            classes: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            utf8s: HashMap::new(),
            method_handles: HashMap::new(),
            method_types: HashMap::new(),
            dynamics: HashMap::new(),
            invoke_dynamics: HashMap::new(),
            bootstrap_method_indices: HashMap::new(),
            bootstrap_methods: vec![],
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset: usize = self.constants.offset_len().0;

        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset as u16,
            });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Have any bootstrap methods been registered so far?
    pub fn has_bootstrap_methods(&self) -> bool {
        !self.bootstrap_methods.is_empty()
    }

    /// Consume the pool and return the final vector of constants and bootstrap methods
    pub fn into_parts(self) -> (OffsetVec<Constant>, Vec<BootstrapMethod>) {
        (self.constants, self.bootstrap_methods)
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(
        &mut self,
        utf8: Utf8ConstantIndex,
    ) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::String(utf8);
            let idx = StringConstantIndex(self.push_constant(constant)?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name_and_type_key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&name_and_type_key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(name_and_type_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method handle constant from the constant pool
    fn get_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let handle_key = (handle_kind, member);
        if let Some(idx) = self.method_handles.get(&handle_key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodHandle {
                handle_kind,
                member,
            };
            let idx = self.push_constant(constant)?;
            self.method_handles.insert(handle_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a bootstrap method, returning its index in the `BootstrapMethods` table
    ///
    /// Arguments are inserted first, so a dynamic constant used as an argument gets its own
    /// bootstrap method registered ahead of this one.
    pub fn get_bootstrap_method(
        &mut self,
        bootstrap: &BootstrapMethodData,
    ) -> Result<u16, ConstantPoolOverflow> {
        if let Some(idx) = self.bootstrap_method_indices.get(bootstrap) {
            return Ok(*idx);
        }

        let bootstrap_method = bootstrap.method.constant_index(self)?;
        let bootstrap_arguments = bootstrap
            .arguments
            .iter()
            .map(|argument| argument.constant_index(self))
            .collect::<Result<Vec<_>, _>>()?;

        let idx = self.bootstrap_methods.len() as u16;
        self.bootstrap_methods.push(BootstrapMethod {
            bootstrap_method,
            bootstrap_arguments,
        });
        self.bootstrap_method_indices.insert(bootstrap.clone(), idx);
        Ok(idx)
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info).map_err(Error::IoError)?;

        Ok(Attribute { name_index, info })
    }

    fn get_name_and_descriptor(
        &mut self,
        name: &str,
        descriptor: String,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name_utf8 = self.get_utf8(name)?;
        let desc_utf8 = self.get_utf8(descriptor)?;
        self.get_name_and_type(name_utf8, desc_utf8)
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

pub trait ConstantsWriter<Index = ConstantIndex> {
    /// Get or insert a constant into the constant pool and return the associated index
    fn constant_index(&self, constants_pool: &mut ConstantsPool)
        -> Result<Index, ConstantPoolOverflow>;
}

/// When making a `CONSTANT_Class_info`, reference types are almost always objects. However,
/// there are a handful of places where an array type needs to be fit in (eg. for a `checkcast`
/// to an array type). See [this section of the JVM specification][0] for more.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4.1
impl ConstantsWriter<ClassConstantIndex> for RefType<BinaryName> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = constants.classes.get(self) {
            Ok(*idx)
        } else {
            let name = constants.get_utf8(self.render_class_name())?;
            let idx = ClassConstantIndex(constants.push_constant(Constant::Class(name))?);
            constants.classes.insert(self.clone(), idx);
            Ok(idx)
        }
    }
}

/// Write a `CONSTANT_Class_info`
impl ConstantsWriter<ClassConstantIndex> for BinaryName {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        RefType::Object(self.clone()).constant_index(constants)
    }
}

/// Write a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
impl ConstantsWriter<MethodRefConstantIndex> for MethodRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = constants.methodrefs.get(self) {
            Ok(*idx)
        } else {
            let class_idx = self.class.constant_index(constants)?;
            let name_and_type_idx =
                constants.get_name_and_descriptor(self.name.as_str(), self.descriptor.render())?;
            let constant = Constant::MethodRef {
                class: class_idx,
                name_and_type: name_and_type_idx,
                is_interface: self.is_interface,
            };
            let idx = MethodRefConstantIndex(constants.push_constant(constant)?);
            constants.methodrefs.insert(self.clone(), idx);
            Ok(idx)
        }
    }
}

/// Write a `CONSTANT_Fieldref_info`
impl ConstantsWriter<FieldRefConstantIndex> for FieldRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = constants.fieldrefs.get(self) {
            Ok(*idx)
        } else {
            let class_idx = self.class.constant_index(constants)?;
            let name_and_type_idx =
                constants.get_name_and_descriptor(self.name.as_str(), self.descriptor.render())?;
            let constant = Constant::FieldRef(class_idx, name_and_type_idx);
            let idx = FieldRefConstantIndex(constants.push_constant(constant)?);
            constants.fieldrefs.insert(self.clone(), idx);
            Ok(idx)
        }
    }
}

/// Write a `CONSTANT_MethodHandle_info`
impl ConstantsWriter<ConstantIndex> for MethodHandle {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let member_idx: ConstantIndex = match &self.member {
            HandleMember::Field(field) => field.constant_index(constants)?.into(),
            HandleMember::Method(method) => method.constant_index(constants)?.into(),
        };
        constants.get_method_handle(self.kind, member_idx)
    }
}

/// Write a `CONSTANT_InvokeDynamic_info`
impl ConstantsWriter<InvokeDynamicConstantIndex> for CallSite {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<InvokeDynamicConstantIndex, ConstantPoolOverflow> {
        let bootstrap_method = constants.get_bootstrap_method(&self.bootstrap)?;
        let method_descriptor =
            constants.get_name_and_descriptor(self.name.as_str(), self.descriptor.render())?;
        let indy_key = (bootstrap_method, method_descriptor);
        if let Some(idx) = constants.invoke_dynamics.get(&indy_key) {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            };
            let idx = InvokeDynamicConstantIndex(constants.push_constant(constant)?);
            constants.invoke_dynamics.insert(indy_key, idx);
            Ok(idx)
        }
    }
}

/// Write a constant which can be loaded up using `ldc` or `ldc2_w`
impl ConstantsWriter<ConstantIndex> for ConstantData {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match self {
            ConstantData::String(string) => {
                let str_utf8 = constants.get_utf8(string.as_str())?;
                let str_idx = constants.get_string(str_utf8)?;
                Ok(str_idx.into())
            }
            ConstantData::Class(class) => Ok(class.constant_index(constants)?.into()),
            ConstantData::Integer(integer) => {
                if let Some(idx) = constants.integers.get(integer) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Integer(*integer))?;
                    constants.integers.insert(*integer, idx);
                    Ok(idx)
                }
            }
            ConstantData::Long(long) => {
                if let Some(idx) = constants.longs.get(long) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Long(*long))?;
                    constants.longs.insert(*long, idx);
                    Ok(idx)
                }
            }
            ConstantData::Float(float_bits) => {
                if let Some(idx) = constants.floats.get(float_bits) {
                    Ok(*idx)
                } else {
                    let float = f32::from_bits(*float_bits);
                    let idx = constants.push_constant(Constant::Float(float))?;
                    constants.floats.insert(*float_bits, idx);
                    Ok(idx)
                }
            }
            ConstantData::Double(double_bits) => {
                if let Some(idx) = constants.doubles.get(double_bits) {
                    Ok(*idx)
                } else {
                    let double = f64::from_bits(*double_bits);
                    let idx = constants.push_constant(Constant::Double(double))?;
                    constants.doubles.insert(*double_bits, idx);
                    Ok(idx)
                }
            }
            ConstantData::MethodHandle(handle) => handle.constant_index(constants),
            ConstantData::MethodType(method) => {
                let descriptor = constants.get_utf8(method.render())?;
                if let Some(idx) = constants.method_types.get(&descriptor) {
                    Ok(*idx)
                } else {
                    let constant = Constant::MethodType { descriptor };
                    let idx = constants.push_constant(constant)?;
                    constants.method_types.insert(descriptor, idx);
                    Ok(idx)
                }
            }
            ConstantData::Dynamic(dynamic) => {
                let bootstrap_method = constants.get_bootstrap_method(&dynamic.bootstrap)?;
                let name_and_type = constants
                    .get_name_and_descriptor(dynamic.name.as_str(), dynamic.descriptor.render())?;
                let dynamic_key = (bootstrap_method, name_and_type);
                if let Some(idx) = constants.dynamics.get(&dynamic_key) {
                    Ok(*idx)
                } else {
                    let constant = Constant::Dynamic {
                        bootstrap_method,
                        name_and_type,
                    };
                    let idx = constants.push_constant(constant)?;
                    constants.dynamics.insert(dynamic_key, idx);
                    Ok(idx)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{MethodDescriptor, UnqualifiedName};

    #[test]
    fn constants_are_deduplicated() {
        let mut pool = ConstantsPool::new();
        let object = pool_index(&mut pool, &BinaryName::OBJECT);
        let string = ConstantData::String("hello".to_owned())
            .constant_index(&mut pool)
            .unwrap();
        assert_eq!(pool_index(&mut pool, &BinaryName::OBJECT), object);
        assert_eq!(
            ConstantData::String("hello".to_owned())
                .constant_index(&mut pool)
                .unwrap(),
            string
        );
        let (constants, _) = pool.into_parts();
        assert_eq!(constants.len(), 4);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();
        let long = ConstantData::Long(7).constant_index(&mut pool).unwrap();
        let int = ConstantData::Integer(7).constant_index(&mut pool).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(int, ConstantIndex(3));
    }

    #[test]
    fn bootstrap_methods_are_shared() {
        let mut pool = ConstantsPool::new();
        let factory = MethodRef::new(
            BinaryName::from_string("java/lang/invoke/LambdaMetafactory".to_owned()).unwrap(),
            UnqualifiedName::from_string("metafactory".to_owned()).unwrap(),
            MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        );
        let bootstrap = BootstrapMethodData {
            method: MethodHandle {
                kind: HandleKind::InvokeStatic,
                member: HandleMember::Method(factory),
            },
            arguments: vec![ConstantData::Integer(1)],
        };
        let call_site = |name: &str| CallSite {
            name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            bootstrap: bootstrap.clone(),
        };
        let first = call_site("run").constant_index(&mut pool).unwrap();
        let second = call_site("apply").constant_index(&mut pool).unwrap();
        assert_ne!(first, second);
        let (_, bootstrap_methods) = pool.into_parts();
        assert_eq!(bootstrap_methods.len(), 1);
    }

    fn pool_index(pool: &mut ConstantsPool, name: &BinaryName) -> ClassConstantIndex {
        name.constant_index(pool).unwrap()
    }
}
