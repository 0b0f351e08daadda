//! Classes of the JVM runtime that rewritten code calls into
//!
//! None of these are generated here: they ship with the grading harness. Rewritten methods only
//! need to know their names and the shapes of the few methods they call.

use super::Error;
use crate::jvm::references::MethodRef;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name, UnqualifiedName};

/// Internal names of the runtime collaborators
#[derive(Clone, Debug)]
pub struct RuntimeNames {
    /// Process-wide singleton deciding whether to log, substitute, or delegate calls
    pub execution_handler: BinaryName,

    /// Record of one call (owner class, header, stack trace, receiver, boxed arguments)
    pub invocation: BinaryName,

    /// Interface of grader-supplied replacement logic
    pub method_substitution: BinaryName,

    /// Interface naming the constructor a constructor substitution routes through
    pub constructor_invocation: BinaryName,

    pub class_header: BinaryName,
    pub field_header: BinaryName,
    pub method_header: BinaryName,
}

impl RuntimeNames {
    pub const DEFAULT_PACKAGE: &'static str = "gradejar/runtime";

    /// Runtime classes in the default package
    pub fn new() -> RuntimeNames {
        let class = BinaryName::name;
        RuntimeNames {
            execution_handler: class("gradejar/runtime/ExecutionHandler"),
            invocation: class("gradejar/runtime/Invocation"),
            method_substitution: class("gradejar/runtime/MethodSubstitution"),
            constructor_invocation: class("gradejar/runtime/MethodSubstitution$ConstructorInvocation"),
            class_header: class("gradejar/runtime/ClassHeader"),
            field_header: class("gradejar/runtime/FieldHeader"),
            method_header: class("gradejar/runtime/MethodHeader"),
        }
    }

    /// Runtime classes with the default simple names, in some other package
    pub fn in_package(package: &str) -> Result<RuntimeNames, Error> {
        let class = |simple_name: &str| {
            BinaryName::from_string(format!("{}/{}", package, simple_name))
                .map_err(Error::MalformedName)
        };

        Ok(RuntimeNames {
            execution_handler: class("ExecutionHandler")?,
            invocation: class("Invocation")?,
            method_substitution: class("MethodSubstitution")?,
            constructor_invocation: class("MethodSubstitution$ConstructorInvocation")?,
            class_header: class("ClassHeader")?,
            field_header: class("FieldHeader")?,
            method_header: class("MethodHeader")?,
        })
    }

    fn handler_method(
        &self,
        name: UnqualifiedName,
        parameters: Vec<FieldType<BinaryName>>,
        return_type: Option<FieldType<BinaryName>>,
    ) -> MethodRef {
        MethodRef::new(
            self.execution_handler.clone(),
            name,
            MethodDescriptor {
                parameters,
                return_type,
            },
        )
    }

    fn method_header_type(&self) -> FieldType<BinaryName> {
        FieldType::object(self.method_header.clone())
    }

    /// `static ExecutionHandler getInstance()`
    pub fn get_instance(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::GETINSTANCE,
            vec![],
            Some(FieldType::object(self.execution_handler.clone())),
        )
    }

    /// `boolean logInvocation(MethodHeader)`
    pub fn log_invocation(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::LOGINVOCATION,
            vec![self.method_header_type()],
            Some(FieldType::boolean()),
        )
    }

    /// `void addInvocation(MethodHeader, Invocation)`
    pub fn add_invocation(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::ADDINVOCATION,
            vec![
                self.method_header_type(),
                FieldType::object(self.invocation.clone()),
            ],
            None,
        )
    }

    /// `boolean useSubstitution(MethodHeader)`
    pub fn use_substitution(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::USESUBSTITUTION,
            vec![self.method_header_type()],
            Some(FieldType::boolean()),
        )
    }

    /// `MethodSubstitution getSubstitution(MethodHeader)`
    pub fn get_substitution(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::GETSUBSTITUTION,
            vec![self.method_header_type()],
            Some(FieldType::object(self.method_substitution.clone())),
        )
    }

    /// `boolean useReferenceImpl(MethodHeader)`
    pub fn use_reference_impl(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::USEREFERENCEIMPL,
            vec![self.method_header_type()],
            Some(FieldType::boolean()),
        )
    }

    /// `void recordStaticFieldValue(String owner, String name, Object value)`
    pub fn record_static_field_value(&self) -> MethodRef {
        self.handler_method(
            UnqualifiedName::RECORDSTATICFIELDVALUE,
            vec![
                FieldType::object(BinaryName::STRING),
                FieldType::object(BinaryName::STRING),
                FieldType::object(BinaryName::OBJECT),
            ],
            None,
        )
    }

    /// `Invocation(Class<?> owner, MethodHeader header, StackTraceElement[] stackTrace)`
    pub fn invocation_constructor(&self) -> MethodDescriptor<BinaryName> {
        MethodDescriptor {
            parameters: vec![
                FieldType::object(BinaryName::CLASS),
                self.method_header_type(),
                FieldType::array(FieldType::object(BinaryName::STACKTRACEELEMENT)),
            ],
            return_type: None,
        }
    }

    /// `void Invocation.setInstance(Object)`
    pub fn set_instance(&self) -> MethodRef {
        MethodRef::new(
            self.invocation.clone(),
            UnqualifiedName::SETINSTANCE,
            MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::OBJECT)],
                return_type: None,
            },
        )
    }

    /// `void Invocation.addParameter(Object)`
    pub fn add_parameter(&self) -> MethodRef {
        MethodRef::new(
            self.invocation.clone(),
            UnqualifiedName::ADDPARAMETER,
            MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::OBJECT)],
                return_type: None,
            },
        )
    }

    /// `Object MethodSubstitution.execute(Invocation)`
    pub fn execute(&self) -> MethodRef {
        MethodRef::interface(
            self.method_substitution.clone(),
            UnqualifiedName::EXECUTE,
            MethodDescriptor {
                parameters: vec![FieldType::object(self.invocation.clone())],
                return_type: Some(FieldType::object(BinaryName::OBJECT)),
            },
        )
    }

    /// `ConstructorInvocation MethodSubstitution.getConstructorInvocation()`
    pub fn get_constructor_invocation(&self) -> MethodRef {
        MethodRef::interface(
            self.method_substitution.clone(),
            UnqualifiedName::GETCONSTRUCTORINVOCATION,
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::object(self.constructor_invocation.clone())),
            },
        )
    }

    fn constructor_invocation_getter(
        &self,
        name: UnqualifiedName,
        return_type: FieldType<BinaryName>,
    ) -> MethodRef {
        MethodRef::interface(
            self.constructor_invocation.clone(),
            name,
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(return_type),
            },
        )
    }

    /// `String ConstructorInvocation.owner()`
    pub fn constructor_owner(&self) -> MethodRef {
        self.constructor_invocation_getter(
            UnqualifiedName::OWNER,
            FieldType::object(BinaryName::STRING),
        )
    }

    /// `String ConstructorInvocation.descriptor()`
    pub fn constructor_descriptor(&self) -> MethodRef {
        self.constructor_invocation_getter(
            UnqualifiedName::DESCRIPTOR,
            FieldType::object(BinaryName::STRING),
        )
    }

    /// `Object[] ConstructorInvocation.args()`
    pub fn constructor_args(&self) -> MethodRef {
        self.constructor_invocation_getter(
            UnqualifiedName::ARGS,
            FieldType::array(FieldType::object(BinaryName::OBJECT)),
        )
    }
}

impl Default for RuntimeNames {
    fn default() -> RuntimeNames {
        RuntimeNames::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::RenderDescriptor;

    #[test]
    fn custom_package() {
        let names = RuntimeNames::in_package("org/grading").unwrap();
        assert_eq!(names.method_header.as_str(), "org/grading/MethodHeader");
        assert_eq!(
            names.add_invocation().descriptor.render(),
            "(Lorg/grading/MethodHeader;Lorg/grading/Invocation;)V"
        );
        assert!(RuntimeNames::in_package("org..grading").is_err());
    }

    #[test]
    fn default_names() {
        let names = RuntimeNames::new();
        assert!(names
            .execution_handler
            .as_str()
            .starts_with(RuntimeNames::DEFAULT_PACKAGE));
        assert!(names.get_substitution().descriptor.return_type.is_some());
        assert!(names.execute().is_interface);
    }
}
