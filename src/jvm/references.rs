use crate::jvm::class_file::HandleKind;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};

/// Symbolic reference to a field, as used by `getfield`, `putstatic`, etc.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Symbolic reference to a method
///
/// The class is a reference type since methods can be invoked on array types (eg. `clone`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub class: RefType<BinaryName>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Was the method resolved via an `InterfaceMethodref`?
    pub is_interface: bool,
}

impl MethodRef {
    /// Reference to a method on a regular class
    pub fn new(
        class: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> MethodRef {
        MethodRef {
            class: RefType::Object(class),
            name,
            descriptor,
            is_interface: false,
        }
    }

    /// Reference to a method on an interface
    pub fn interface(
        class: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> MethodRef {
        MethodRef {
            is_interface: true,
            ..MethodRef::new(class, name, descriptor)
        }
    }
}

/// Member targeted by a method handle
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum HandleMember {
    Field(FieldRef),
    Method(MethodRef),
}

/// Constant `java.lang.invoke.MethodHandle`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodHandle {
    pub kind: HandleKind,
    pub member: HandleMember,
}

/// Constant which can be loaded with `ldc` (or passed as a bootstrap argument)
///
/// Floating point values are stored as their raw bits so that constants can be hashed and
/// deduplicated (`NaN` payloads survive unchanged).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConstantData {
    String(String),
    Class(RefType<BinaryName>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    MethodHandle(MethodHandle),
    MethodType(MethodDescriptor<BinaryName>),
    Dynamic(Box<DynamicConstant>),
}

impl ConstantData {
    pub fn float(value: f32) -> ConstantData {
        ConstantData::Float(value.to_bits())
    }

    pub fn double(value: f64) -> ConstantData {
        ConstantData::Double(value.to_bits())
    }

    /// Does this constant take two stack slots (and require `ldc2_w`)?
    pub fn is_wide(&self) -> bool {
        match self {
            ConstantData::Long(_) | ConstantData::Double(_) => true,
            ConstantData::Dynamic(dynamic) => matches!(
                dynamic.descriptor,
                FieldType::Base(crate::jvm::BaseType::Long | crate::jvm::BaseType::Double)
            ),
            _ => false,
        }
    }
}

/// Dynamically-computed constant
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DynamicConstant {
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub bootstrap: BootstrapMethodData,
}

/// Bootstrap method along with its static arguments
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BootstrapMethodData {
    pub method: MethodHandle,
    pub arguments: Vec<ConstantData>,
}

/// Dynamically-computed call site, as used by `invokedynamic`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CallSite {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub bootstrap: BootstrapMethodData,
}
