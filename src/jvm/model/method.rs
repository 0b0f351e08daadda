use crate::jvm::class_file::{
    self, ConstantPool, ConstantsPool, ConstantsWriter, Exceptions, Signature, Version,
};
use crate::jvm::code::{CodeContext, MethodCode};
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::model::field::decode_attribute;
use crate::jvm::names::Name;
use crate::jvm::{BinaryName, Error, MethodAccessFlags, MethodDescriptor, UnqualifiedName};

/// Semantic representation of a method
#[derive(Clone, Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Method code implementation
    pub code: Option<MethodCode>,

    /// Which exceptions can this method throw?
    ///
    /// Note: this does not need to include `RuntimeException`, `Error`, or subclasses
    pub exceptions: Vec<BinaryName>,

    /// Generic method signature
    ///
    /// [Format](https://docs.oracle.com/javase/specs/jvms/se11/html/jvms-4.html#jvms-4.7.9.1)
    pub generic_signature: Option<String>,
}

impl Method {
    /// Create a new method with no body
    pub fn new(
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Method {
        Method {
            access_flags,
            name,
            descriptor,
            code: None,
            exceptions: vec![],
            generic_signature: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == UnqualifiedName::CLINIT
    }

    /// Compiler-generated methods (lambda bodies, bridges, accessors)
    pub fn is_synthetic(&self) -> bool {
        self.access_flags
            .intersects(MethodAccessFlags::SYNTHETIC | MethodAccessFlags::BRIDGE)
    }

    /// Information code decoding and encoding needs about this method
    pub fn code_context<'a>(&'a self, class: &'a BinaryName, version: Version) -> CodeContext<'a> {
        CodeContext {
            class,
            is_static: self.is_static(),
            is_constructor: self.is_constructor(),
            descriptor: &self.descriptor,
            version,
        }
    }

    /// Resolve a method from a class file, decoding its body
    pub fn parse_method(
        method: &class_file::Method,
        constants: &ConstantPool,
        class: &BinaryName,
        version: Version,
    ) -> Result<Method, Error> {
        let mut parsed = Method::new(
            method.access_flags,
            constants.get_unqualified_name(method.name_index)?,
            constants.get_method_descriptor(method.descriptor_index)?,
        );

        let mut code_attribute: Option<class_file::Code> = None;
        for attribute in &method.attributes {
            match constants.get_utf8(attribute.name_index)? {
                "Code" => code_attribute = Some(decode_attribute(attribute)?),
                "Exceptions" => {
                    let Exceptions(exceptions) = decode_attribute(attribute)?;
                    parsed.exceptions = exceptions
                        .into_iter()
                        .map(|exception| constants.get_class_name(exception))
                        .collect::<Result<_, _>>()?;
                }
                "Signature" => {
                    let signature: Signature = decode_attribute(attribute)?;
                    parsed.generic_signature =
                        Some(constants.get_utf8(signature.signature)?.to_owned());
                }
                _ => (),
            }
        }

        if let Some(code_attribute) = code_attribute {
            let context = parsed.code_context(class, version);
            let code = MethodCode::decode(&code_attribute, constants, &context)?;
            parsed.code = Some(code);
        }

        Ok(parsed)
    }

    /// Serialize the method
    pub fn serialize_method(
        &self,
        constants_pool: &mut ConstantsPool,
        class: &BinaryName,
        version: Version,
    ) -> Result<class_file::Method, Error> {
        let name_index = constants_pool.get_utf8(self.name.as_str())?;
        let descriptor_index = constants_pool.get_utf8(self.descriptor.render())?;

        let mut attributes = vec![];

        // `Code` attribute
        if let Some(code) = &self.code {
            let context = self.code_context(class, version);
            let code = code.encode(constants_pool, &context)?;
            attributes.push(constants_pool.get_attribute(code)?);
        }

        // `Exceptions` attribute
        if !self.exceptions.is_empty() {
            let exceptions = self
                .exceptions
                .iter()
                .map(|exception| exception.constant_index(constants_pool))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants_pool.get_attribute(Exceptions(exceptions))?);
        }

        // `Signature` attribute
        if let Some(signature) = &self.generic_signature {
            let signature = constants_pool.get_utf8(signature.as_str())?;
            attributes.push(constants_pool.get_attribute(Signature { signature })?);
        }

        Ok(class_file::Method {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
