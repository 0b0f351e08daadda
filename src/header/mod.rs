//! Immutable descriptions of classes, fields, and methods
//!
//! A [`Header`] is what the rest of the crate uses to talk about a declaration without holding
//! on to its body: the runtime gets one for every rewritten method (so it can decide whether to
//! log, substitute, or delegate a call) and the matchers compare them to pair up submission and
//! reference declarations.
//!
//! ### Equality
//!
//! Headers compare and hash by name only. Two method headers with the same name but different
//! owners or descriptors are equal. Code that needs to tell overloads apart keys by
//! [`MemberKey`] instead.

mod describe;
mod emit;

pub use describe::*;
pub use emit::*;

use crate::jvm::model::{Class, Field, Method};
use crate::jvm::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, RenderDescriptor, UnqualifiedName,
};
use std::hash::{Hash, Hasher};

/// Header of a class or interface
#[derive(Clone, Debug)]
pub struct ClassHeader {
    pub access: ClassAccessFlags,
    pub name: BinaryName,
    pub signature: Option<String>,
    pub super_name: Option<BinaryName>,
    pub interfaces: Vec<BinaryName>,
}

/// Header of a field
#[derive(Clone, Debug)]
pub struct FieldHeader {
    pub owner: BinaryName,
    pub access: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub signature: Option<String>,
}

/// Header of a method
#[derive(Clone, Debug)]
pub struct MethodHeader {
    pub owner: BinaryName,
    pub access: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub signature: Option<String>,
    pub exceptions: Vec<BinaryName>,
}

/// Header of any kind of declaration
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Header {
    Class(ClassHeader),
    Field(FieldHeader),
    Method(MethodHeader),
}

/// Overload-aware identity of a field or method
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    pub owner: BinaryName,
    pub name: UnqualifiedName,

    /// Rendered field or method descriptor
    pub descriptor: String,
}

/// Value of one header component, as passed to the runtime header constructor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentValue {
    Int(i32),
    String(Option<String>),
    StringArray(Vec<String>),
}

impl ComponentValue {
    /// Type of the constructor parameter receiving this value
    pub fn field_type(&self) -> FieldType<BinaryName> {
        match self {
            ComponentValue::Int(_) => FieldType::int(),
            ComponentValue::String(_) => FieldType::object(BinaryName::STRING),
            ComponentValue::StringArray(_) => {
                FieldType::array(FieldType::object(BinaryName::STRING))
            }
        }
    }
}

impl ClassHeader {
    pub fn of(class: &Class) -> ClassHeader {
        ClassHeader {
            access: class.access_flags,
            name: class.name.clone(),
            signature: class.generic_signature.clone(),
            super_name: class.super_class.clone(),
            interfaces: class.interfaces.clone(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(ClassAccessFlags::INTERFACE)
    }

    /// Ordered components: access, name, signature, super name, interfaces
    pub fn components(&self) -> Vec<(&'static str, ComponentValue)> {
        vec![
            ("access", ComponentValue::Int(self.access.bits() as i32)),
            ("name", ComponentValue::String(Some(self.name.as_str().to_owned()))),
            ("signature", ComponentValue::String(self.signature.clone())),
            (
                "superName",
                ComponentValue::String(self.super_name.as_ref().map(|s| s.as_str().to_owned())),
            ),
            (
                "interfaces",
                ComponentValue::StringArray(
                    self.interfaces.iter().map(|i| i.as_str().to_owned()).collect(),
                ),
            ),
        ]
    }
}

impl FieldHeader {
    pub fn of(owner: &BinaryName, field: &Field) -> FieldHeader {
        FieldHeader {
            owner: owner.clone(),
            access: field.access_flags,
            name: field.name.clone(),
            descriptor: field.descriptor.clone(),
            signature: field.generic_signature.clone(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(FieldAccessFlags::STATIC)
    }

    pub fn key(&self) -> MemberKey {
        MemberKey {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.render(),
        }
    }

    /// Ordered components: owner, access, name, descriptor, signature
    pub fn components(&self) -> Vec<(&'static str, ComponentValue)> {
        vec![
            ("owner", ComponentValue::String(Some(self.owner.as_str().to_owned()))),
            ("access", ComponentValue::Int(self.access.bits() as i32)),
            ("name", ComponentValue::String(Some(self.name.as_str().to_owned()))),
            ("descriptor", ComponentValue::String(Some(self.descriptor.render()))),
            ("signature", ComponentValue::String(self.signature.clone())),
        ]
    }
}

impl MethodHeader {
    pub fn of(owner: &BinaryName, method: &Method) -> MethodHeader {
        MethodHeader {
            owner: owner.clone(),
            access: method.access_flags,
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            signature: method.generic_signature.clone(),
            exceptions: method.exceptions.clone(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn key(&self) -> MemberKey {
        MemberKey {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.render(),
        }
    }

    /// Ordered components: owner, access, name, descriptor, signature, exceptions
    pub fn components(&self) -> Vec<(&'static str, ComponentValue)> {
        vec![
            ("owner", ComponentValue::String(Some(self.owner.as_str().to_owned()))),
            ("access", ComponentValue::Int(self.access.bits() as i32)),
            ("name", ComponentValue::String(Some(self.name.as_str().to_owned()))),
            ("descriptor", ComponentValue::String(Some(self.descriptor.render()))),
            ("signature", ComponentValue::String(self.signature.clone())),
            (
                "exceptions",
                ComponentValue::StringArray(
                    self.exceptions.iter().map(|e| e.as_str().to_owned()).collect(),
                ),
            ),
        ]
    }
}

impl Header {
    /// Simple name of the declaration (the full internal name for classes)
    pub fn name(&self) -> &str {
        match self {
            Header::Class(header) => header.name.as_str(),
            Header::Field(header) => header.name.as_str(),
            Header::Method(header) => header.name.as_str(),
        }
    }

    /// Ordered (component name, value) pairs, in the order the runtime constructor takes them
    pub fn components(&self) -> Vec<(&'static str, ComponentValue)> {
        match self {
            Header::Class(header) => header.components(),
            Header::Field(header) => header.components(),
            Header::Method(header) => header.components(),
        }
    }
}

macro_rules! name_only_equality {
    ($header:ty) => {
        impl PartialEq for $header {
            fn eq(&self, other: &Self) -> bool {
                self.name == other.name
            }
        }

        impl Eq for $header {}

        impl Hash for $header {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.name.hash(state)
            }
        }
    };
}

name_only_equality!(ClassHeader);
name_only_equality!(FieldHeader);
name_only_equality!(MethodHeader);

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn method(owner: &str, descriptor: MethodDescriptor<BinaryName>) -> MethodHeader {
        MethodHeader {
            owner: BinaryName::from_string(owner.to_owned()).unwrap(),
            access: MethodAccessFlags::PUBLIC,
            name: UnqualifiedName::from_string(String::from("add")).unwrap(),
            descriptor,
            signature: None,
            exceptions: vec![],
        }
    }

    #[test]
    fn equality_ignores_owner_and_descriptor() {
        let ints = method(
            "h00/Calculator",
            MethodDescriptor {
                parameters: vec![FieldType::int(), FieldType::int()],
                return_type: Some(FieldType::int()),
            },
        );
        let longs = method(
            "h00/OtherCalculator",
            MethodDescriptor {
                parameters: vec![FieldType::long()],
                return_type: Some(FieldType::long()),
            },
        );

        assert_eq!(ints, longs);
        assert_eq!(hash_of(&ints), hash_of(&longs));
        assert_eq!(
            Header::Method(ints.clone()),
            Header::Method(longs.clone())
        );
        assert_ne!(ints.key(), longs.key());

        let keys: HashSet<MemberKey> = [ints.key(), longs.key()].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn method_components_are_ordered() {
        let header = method(
            "h00/Calculator",
            MethodDescriptor {
                parameters: vec![FieldType::int()],
                return_type: None,
            },
        );
        let names: Vec<&str> = header.components().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["owner", "access", "name", "descriptor", "signature", "exceptions"]
        );
        assert_eq!(
            header.components()[3].1,
            ComponentValue::String(Some(String::from("(I)V")))
        );
    }
}
