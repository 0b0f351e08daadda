use crate::header::{ClassHeader, FieldHeader, Header, MethodHeader};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags,
    Name, RefType,
};

/// Java source spelling of a type, eg. `int[]` or `java.lang.String`
pub fn java_type_name(field_type: &FieldType<BinaryName>) -> String {
    match field_type {
        FieldType::Base(base_type) => String::from(match base_type {
            BaseType::Boolean => "boolean",
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
        }),
        FieldType::Ref(RefType::Object(class)) => class.dotted(),
        FieldType::Ref(RefType::PrimitiveArray(array)) => format!(
            "{}{}",
            java_type_name(&FieldType::Base(array.element_type)),
            "[]".repeat(array.additional_dimensions + 1)
        ),
        FieldType::Ref(RefType::ObjectArray(array)) => format!(
            "{}{}",
            array.element_type.dotted(),
            "[]".repeat(array.additional_dimensions + 1)
        ),
    }
}

fn modifiers(pairs: &[(bool, &'static str)]) -> String {
    pairs
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, modifier)| format!("{} ", modifier))
        .collect()
}

impl ClassHeader {
    pub fn describe(&self) -> String {
        let flags = self.access;
        let interface = flags.contains(ClassAccessFlags::INTERFACE);
        let mut out = modifiers(&[
            (flags.contains(ClassAccessFlags::PUBLIC), "public"),
            (
                flags.contains(ClassAccessFlags::ABSTRACT) && !interface,
                "abstract",
            ),
            (flags.contains(ClassAccessFlags::FINAL), "final"),
        ]);
        out.push_str(if interface { "interface " } else { "class " });
        out.push_str(&self.name.dotted());

        if let Some(super_name) = &self.super_name {
            if !interface && *super_name != BinaryName::OBJECT {
                out.push_str(" extends ");
                out.push_str(&super_name.dotted());
            }
        }
        if !self.interfaces.is_empty() {
            out.push_str(if interface { " extends " } else { " implements " });
            let names: Vec<String> = self.interfaces.iter().map(BinaryName::dotted).collect();
            out.push_str(&names.join(", "));
        }
        out
    }
}

impl FieldHeader {
    pub fn describe(&self) -> String {
        let flags = self.access;
        let mut out = modifiers(&[
            (flags.contains(FieldAccessFlags::PUBLIC), "public"),
            (flags.contains(FieldAccessFlags::PROTECTED), "protected"),
            (flags.contains(FieldAccessFlags::PRIVATE), "private"),
            (flags.contains(FieldAccessFlags::STATIC), "static"),
            (flags.contains(FieldAccessFlags::FINAL), "final"),
            (flags.contains(FieldAccessFlags::TRANSIENT), "transient"),
            (flags.contains(FieldAccessFlags::VOLATILE), "volatile"),
        ]);
        out.push_str(&java_type_name(&self.descriptor));
        out.push(' ');
        out.push_str(&self.owner.dotted());
        out.push('.');
        out.push_str(self.name.as_str());
        out
    }
}

impl MethodHeader {
    pub fn describe(&self) -> String {
        let flags = self.access;
        let mut out = modifiers(&[
            (flags.contains(MethodAccessFlags::PUBLIC), "public"),
            (flags.contains(MethodAccessFlags::PROTECTED), "protected"),
            (flags.contains(MethodAccessFlags::PRIVATE), "private"),
            (flags.contains(MethodAccessFlags::STATIC), "static"),
            (flags.contains(MethodAccessFlags::ABSTRACT), "abstract"),
            (flags.contains(MethodAccessFlags::FINAL), "final"),
            (flags.contains(MethodAccessFlags::SYNCHRONIZED), "synchronized"),
            (flags.contains(MethodAccessFlags::NATIVE), "native"),
        ]);

        if !self.is_constructor() {
            match &self.descriptor.return_type {
                None => out.push_str("void"),
                Some(return_type) => out.push_str(&java_type_name(return_type)),
            }
            out.push(' ');
        }
        out.push_str(&self.owner.dotted());
        if !self.is_constructor() {
            out.push('.');
            out.push_str(self.name.as_str());
        }

        let parameters: Vec<String> = self.descriptor.parameters.iter().map(java_type_name).collect();
        out.push('(');
        out.push_str(&parameters.join(", "));
        out.push(')');

        if !self.exceptions.is_empty() {
            let exceptions: Vec<String> = self.exceptions.iter().map(BinaryName::dotted).collect();
            out.push_str(" throws ");
            out.push_str(&exceptions.join(", "));
        }
        out
    }
}

impl Header {
    /// Human-readable declaration, in Java syntax
    pub fn describe(&self) -> String {
        match self {
            Header::Class(header) => header.describe(),
            Header::Field(header) => header.describe(),
            Header::Method(header) => header.describe(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{MethodDescriptor, UnqualifiedName};

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    #[test]
    fn describe_method() {
        let header = MethodHeader {
            owner: name("h00/Calculator"),
            access: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name: UnqualifiedName::from_string(String::from("sum")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![
                    FieldType::array(FieldType::int()),
                    FieldType::object(BinaryName::STRING),
                ],
                return_type: Some(FieldType::long()),
            },
            signature: None,
            exceptions: vec![name("java/io/IOException")],
        };
        assert_eq!(
            header.describe(),
            "public static long h00.Calculator.sum(int[], java.lang.String) throws java.io.IOException"
        );
    }

    #[test]
    fn describe_constructor_and_field() {
        let constructor = MethodHeader {
            owner: name("h00/Calculator"),
            access: MethodAccessFlags::PROTECTED,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            signature: None,
            exceptions: vec![],
        };
        assert_eq!(constructor.describe(), "protected h00.Calculator()");

        let field = FieldHeader {
            owner: name("h00/Calculator"),
            access: FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL,
            name: UnqualifiedName::from_string(String::from("memory")).unwrap(),
            descriptor: FieldType::array(FieldType::array(FieldType::double())),
            signature: None,
        };
        assert_eq!(field.describe(), "private final double[][] h00.Calculator.memory");
    }

    #[test]
    fn describe_class() {
        let header = ClassHeader {
            access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: name("h00/Calculator"),
            signature: None,
            super_name: Some(name("h00/Machine")),
            interfaces: vec![name("java/lang/Runnable")],
        };
        assert_eq!(
            header.describe(),
            "public class h00.Calculator extends h00.Machine implements java.lang.Runnable"
        );
    }
}
