use crate::jvm::class_file::{
    self, Attribute, AttributeLike, BootstrapMethods, ClassConstantIndex, ClassFile, ConstantIndex,
    ConstantPool, ConstantsPool, ConstantsWriter, InnerClass, InnerClasses, NestHost, NestMembers,
    Parse, Serialize, Signature, SourceFile, Utf8ConstantIndex, Version,
};
use crate::jvm::model::field::decode_attribute;
use crate::jvm::model::{Field, Method};
use crate::jvm::names::Name;
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, InnerClassAccessFlags, MethodDescriptor, UnqualifiedName,
};
use std::io::Cursor;

/// Entry of the `InnerClasses` attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class: BinaryName,

    /// Absent for local and anonymous classes
    pub outer_class: Option<BinaryName>,

    /// Absent for anonymous classes
    pub inner_name: Option<UnqualifiedName>,

    pub access_flags: InnerClassAccessFlags,
}

/// Semantic representation of a class
#[derive(Clone, Debug)]
pub struct Class {
    pub version: Version,
    pub access_flags: ClassAccessFlags,
    pub name: BinaryName,

    /// Absent only for `java/lang/Object`
    pub super_class: Option<BinaryName>,
    pub interfaces: Vec<BinaryName>,

    pub fields: Vec<Field>,
    pub methods: Vec<Method>,

    /// Generic class signature
    pub generic_signature: Option<String>,
    pub source_file: Option<String>,
    pub inner_classes: Vec<InnerClassEntry>,
    pub nest_host: Option<BinaryName>,
    pub nest_members: Vec<BinaryName>,
}

impl Class {
    /// Create a new empty class
    pub fn new(
        version: Version,
        access_flags: ClassAccessFlags,
        name: BinaryName,
        super_class: Option<BinaryName>,
    ) -> Class {
        Class {
            version,
            access_flags,
            name,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            generic_signature: None,
            source_file: None,
            inner_classes: vec![],
            nest_host: None,
            nest_members: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Parse raw class file bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Class, Error> {
        let mut cursor = Cursor::new(bytes);
        let class_file = ClassFile::parse(&mut cursor)
            .map_err(|err| Error::MalformedClassFile(err.to_string()))?;
        Class::parse_class(&class_file)
    }

    /// Serialize into raw class file bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let class_file = self.serialize()?;
        let mut bytes = vec![];
        class_file.serialize(&mut bytes).map_err(Error::IoError)?;
        Ok(bytes)
    }

    /// Resolve a class file into its semantic representation
    ///
    /// Attributes other than the ones tracked on the model are dropped.
    pub fn parse_class(class_file: &ClassFile) -> Result<Class, Error> {
        let mut constants = ConstantPool::new(class_file.constants.clone());

        let mut class_attributes = vec![];
        for attribute in &class_file.attributes {
            let name = constants.get_utf8(attribute.name_index)?.to_owned();
            if name == BootstrapMethods::NAME {
                let BootstrapMethods(bootstrap_methods) = decode_attribute(attribute)?;
                constants.set_bootstrap_methods(bootstrap_methods);
            } else {
                class_attributes.push((name, attribute));
            }
        }

        let name = constants.get_class_name(class_file.this_class)?;
        let super_class = if class_file.super_class.0 == ConstantIndex::ZERO {
            None
        } else {
            Some(constants.get_class_name(class_file.super_class)?)
        };
        let mut class = Class::new(
            class_file.version,
            class_file.access_flags,
            name,
            super_class,
        );

        class.interfaces = class_file
            .interfaces
            .iter()
            .map(|interface| constants.get_class_name(*interface))
            .collect::<Result<_, _>>()?;

        for (attribute_name, attribute) in class_attributes {
            match attribute_name.as_str() {
                "Signature" => {
                    let signature: Signature = decode_attribute(attribute)?;
                    class.generic_signature =
                        Some(constants.get_utf8(signature.signature)?.to_owned());
                }
                "SourceFile" => {
                    let SourceFile(source_file) = decode_attribute(attribute)?;
                    class.source_file = Some(constants.get_utf8(source_file)?.to_owned());
                }
                "NestHost" => {
                    let NestHost(host) = decode_attribute(attribute)?;
                    class.nest_host = Some(constants.get_class_name(host)?);
                }
                "NestMembers" => {
                    let NestMembers(members) = decode_attribute(attribute)?;
                    class.nest_members = members
                        .into_iter()
                        .map(|member| constants.get_class_name(member))
                        .collect::<Result<_, _>>()?;
                }
                "InnerClasses" => {
                    let InnerClasses(inner_classes) = decode_attribute(attribute)?;
                    for inner_class in inner_classes {
                        class
                            .inner_classes
                            .push(parse_inner_class(&inner_class, &constants)?);
                    }
                }
                _ => (),
            }
        }

        for field in &class_file.fields {
            class.fields.push(Field::parse_field(field, &constants)?);
        }
        for method in &class_file.methods {
            class.methods.push(Method::parse_method(
                method,
                &constants,
                &class.name,
                class.version,
            )?);
        }

        Ok(class)
    }

    /// Serialize the class into a class file
    ///
    /// The constant pool is built from scratch. The `BootstrapMethods` attribute is generated
    /// from the `invokedynamic` calls and dynamic constants in all of the methods.
    pub fn serialize(&self) -> Result<ClassFile, Error> {
        let mut constants_pool = ConstantsPool::new();

        let this_class = self.name.constant_index(&mut constants_pool)?;
        let super_class = match &self.super_class {
            None => ClassConstantIndex(ConstantIndex::ZERO),
            Some(super_class) => super_class.constant_index(&mut constants_pool)?,
        };
        let interfaces: Vec<ClassConstantIndex> = self
            .interfaces
            .iter()
            .map(|interface| interface.constant_index(&mut constants_pool))
            .collect::<Result<_, _>>()?;

        let fields: Vec<class_file::Field> = self
            .fields
            .iter()
            .map(|field| field.serialize_field(&mut constants_pool))
            .collect::<Result<_, Error>>()?;
        let methods: Vec<class_file::Method> = self
            .methods
            .iter()
            .map(|method| method.serialize_method(&mut constants_pool, &self.name, self.version))
            .collect::<Result<_, Error>>()?;

        let mut attributes = vec![];

        if let Some(signature) = &self.generic_signature {
            let signature = constants_pool.get_utf8(signature.as_str())?;
            attributes.push(constants_pool.get_attribute(Signature { signature })?);
        }

        if let Some(source_file) = &self.source_file {
            let source_file = constants_pool.get_utf8(source_file.as_str())?;
            attributes.push(constants_pool.get_attribute(SourceFile(source_file))?);
        }

        if let Some(host) = &self.nest_host {
            let host = host.constant_index(&mut constants_pool)?;
            attributes.push(constants_pool.get_attribute(NestHost(host))?);
        }

        if !self.nest_members.is_empty() {
            let members = self
                .nest_members
                .iter()
                .map(|member| member.constant_index(&mut constants_pool))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants_pool.get_attribute(NestMembers(members))?);
        }

        if !self.inner_classes.is_empty() {
            let inner_classes = self
                .inner_classes
                .iter()
                .map(|entry| serialize_inner_class(entry, &mut constants_pool))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants_pool.get_attribute(InnerClasses(inner_classes))?);
        }

        // Has to come last, since the table only gets filled in while encoding method bodies
        let constants = if constants_pool.has_bootstrap_methods() {
            let name_index = constants_pool.get_utf8(BootstrapMethods::NAME)?;
            let (constants, bootstrap_methods) = constants_pool.into_parts();
            let mut info = vec![];
            BootstrapMethods(bootstrap_methods)
                .serialize(&mut info)
                .map_err(Error::IoError)?;
            attributes.push(Attribute { name_index, info });
            constants
        } else {
            constants_pool.into_parts().0
        };

        Ok(ClassFile {
            version: self.version,
            constants,
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Find a method by name and descriptor
    pub fn find_method(
        &self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| &method.name == name && &method.descriptor == descriptor)
    }
}

fn parse_inner_class(
    inner_class: &InnerClass,
    constants: &ConstantPool,
) -> Result<InnerClassEntry, Error> {
    let outer_class = if inner_class.outer_class.0 == ConstantIndex::ZERO {
        None
    } else {
        Some(constants.get_class_name(inner_class.outer_class)?)
    };
    let inner_name = if inner_class.inner_name.0 == ConstantIndex::ZERO {
        None
    } else {
        Some(constants.get_unqualified_name(inner_class.inner_name)?)
    };
    Ok(InnerClassEntry {
        inner_class: constants.get_class_name(inner_class.inner_class)?,
        outer_class,
        inner_name,
        access_flags: inner_class.access_flags,
    })
}

fn serialize_inner_class(
    entry: &InnerClassEntry,
    constants_pool: &mut ConstantsPool,
) -> Result<InnerClass, Error> {
    let outer_class = match &entry.outer_class {
        None => ClassConstantIndex(ConstantIndex::ZERO),
        Some(outer_class) => outer_class.constant_index(constants_pool)?,
    };
    let inner_name = match &entry.inner_name {
        None => Utf8ConstantIndex(ConstantIndex::ZERO),
        Some(inner_name) => constants_pool.get_utf8(inner_name.as_str())?,
    };
    Ok(InnerClass {
        inner_class: entry.inner_class.constant_index(constants_pool)?,
        outer_class,
        inner_name,
        access_flags: entry.access_flags,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{
        BranchInstruction, CodeBuilder, CodeBuilderExts, Instruction, InvokeType,
    };
    use crate::jvm::references::{
        BootstrapMethodData, CallSite, ConstantData, HandleMember, MethodHandle, MethodRef,
    };
    use crate::jvm::class_file::HandleKind;
    use crate::jvm::descriptors::ParseDescriptor;
    use crate::jvm::{FieldAccessFlags, FieldType, MethodAccessFlags, RefType};

    fn name(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn sample_class() -> Result<Class, Error> {
        let mut class = Class::new(
            Version::JAVA8,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name("h00/Point"),
            Some(BinaryName::OBJECT),
        );
        class.source_file = Some(String::from("Point.java"));

        let mut x = Field::new(
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            UnqualifiedName::from_string(String::from("ORIGIN")).unwrap(),
            FieldType::int(),
        );
        x.constant_value = Some(ConstantData::Integer(1234));
        class.fields.push(x);

        let mut method = Method::new(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            UnqualifiedName::from_string(String::from("greeting")).unwrap(),
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::object(BinaryName::STRING)),
            },
        );
        let bootstrap = BootstrapMethodData {
            method: MethodHandle {
                kind: HandleKind::InvokeStatic,
                member: HandleMember::Method(MethodRef::new(
                    name("java/lang/invoke/StringConcatFactory"),
                    UnqualifiedName::from_string(String::from("makeConcatWithConstants"))
                        .unwrap(),
                    MethodDescriptor::parse(
                        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
                         Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)\
                         Ljava/lang/invoke/CallSite;",
                    )
                    .unwrap(),
                )),
            },
            arguments: vec![ConstantData::String(String::from("hello \u{1}"))],
        };
        let mut code = CodeBuilder::new(&method.code_context(&class.name, class.version));
        code.const_string("world")?;
        code.push_instruction(Instruction::InvokeDynamic(CallSite {
            name: UnqualifiedName::from_string(String::from("makeConcatWithConstants")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::STRING)],
                return_type: Some(FieldType::object(BinaryName::STRING)),
            },
            bootstrap,
        }))?;
        code.push_branch_instruction(BranchInstruction::AReturn)?;
        method.code = Some(code.result()?);
        class.methods.push(method);

        let mut constructor = Method::new(
            MethodAccessFlags::PUBLIC,
            UnqualifiedName::INIT,
            MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        );
        let mut code = CodeBuilder::new(&constructor.code_context(&class.name, class.version));
        code.push_instruction(Instruction::ALoad(0))?;
        code.invoke(
            InvokeType::Special,
            MethodRef::new(
                BinaryName::OBJECT,
                UnqualifiedName::INIT,
                constructor.descriptor.clone(),
            ),
        )?;
        code.push_branch_instruction(BranchInstruction::Return)?;
        constructor.code = Some(code.result()?);
        class.methods.push(constructor);

        Ok(class)
    }

    #[test]
    fn class_survives_serialization() -> Result<(), Error> {
        let class = sample_class()?;
        let bytes = class.to_bytes()?;
        let parsed = Class::from_bytes(&bytes)?;

        assert_eq!(parsed.name, class.name);
        assert_eq!(parsed.super_class, Some(BinaryName::OBJECT));
        assert_eq!(parsed.source_file.as_deref(), Some("Point.java"));
        assert_eq!(parsed.fields[0].constant_value, Some(ConstantData::Integer(1234)));
        assert_eq!(parsed.methods.len(), 2);

        let greeting = &parsed.methods[0];
        let instructions: Vec<_> = greeting
            .code
            .as_ref()
            .unwrap()
            .instructions()
            .cloned()
            .collect();
        let original: Vec<_> = class.methods[0]
            .code
            .as_ref()
            .unwrap()
            .instructions()
            .cloned()
            .collect();
        assert_eq!(instructions, original);

        let constructor = parsed
            .find_method(&UnqualifiedName::INIT, &class.methods[1].descriptor)
            .unwrap();
        assert!(constructor.is_constructor());
        assert!(matches!(
            constructor.code.as_ref().unwrap().instructions().nth(1),
            Some(Instruction::Invoke(InvokeType::Special, method))
                if method.class == RefType::Object(BinaryName::OBJECT)
        ));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Class::from_bytes(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]),
            Err(Error::MalformedClassFile(_))
        ));
    }
}
