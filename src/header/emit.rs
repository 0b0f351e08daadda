use crate::header::{ComponentValue, Header};
use crate::jvm::code::{CodeBuilder, CodeBuilderExts};
use crate::jvm::{BinaryName, Error, MethodDescriptor};
use crate::transform::RuntimeNames;

impl Header {
    /// Runtime class whose constructor rebuilds this header
    pub fn runtime_class<'a>(&self, names: &'a RuntimeNames) -> &'a BinaryName {
        match self {
            Header::Class(_) => &names.class_header,
            Header::Field(_) => &names.field_header,
            Header::Method(_) => &names.method_header,
        }
    }

    /// Emit code that leaves an equivalent runtime header object on the stack
    ///
    /// Returns the maximum stack depth (in slots) the emitted sequence reaches, on top of
    /// whatever was already on the stack.
    pub fn emit_construction(
        &self,
        builder: &mut CodeBuilder,
        names: &RuntimeNames,
    ) -> Result<usize, Error> {
        let components = self.components();
        let descriptor = MethodDescriptor {
            parameters: components.iter().map(|(_, value)| value.field_type()).collect(),
            return_type: None,
        };

        // `new` and `dup`
        let mut max_depth = 2;
        builder.new_object(
            self.runtime_class(names).clone(),
            descriptor,
            |builder| {
                for (pushed, (_, value)) in components.iter().enumerate() {
                    let depth = 2 + pushed;
                    match value {
                        ComponentValue::Int(int) => builder.const_int(*int)?,
                        ComponentValue::String(string) => {
                            builder.const_optional_string(string.as_deref())?
                        }
                        ComponentValue::StringArray(strings) => {
                            builder.new_string_array(strings)?;
                            if !strings.is_empty() {
                                max_depth = max_depth.max(depth + 4);
                            }
                        }
                    }
                    max_depth = max_depth.max(depth + 1);
                }
                Ok(())
            },
        )?;

        Ok(max_depth)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::{FieldHeader, MethodHeader};
    use crate::jvm::class_file::Version;
    use crate::jvm::code::{
        BranchInstruction, CodeContext, Instruction, InvokeType, SymbolicInstruction,
    };
    use crate::jvm::{
        FieldAccessFlags, FieldType, MethodAccessFlags, Name, RenderDescriptor, UnqualifiedName,
    };

    fn emit(header: &Header) -> (usize, usize, Vec<SymbolicInstruction>) {
        let class = BinaryName::from_string(String::from("h00/Emitter")).unwrap();
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::object(BinaryName::OBJECT)),
        };
        let context = CodeContext {
            class: &class,
            is_static: true,
            is_constructor: false,
            descriptor: &descriptor,
            version: Version::JAVA8,
        };
        let mut builder = CodeBuilder::new(&context);
        let depth = header
            .emit_construction(&mut builder, &RuntimeNames::new())
            .unwrap();
        builder
            .push_branch_instruction(BranchInstruction::AReturn)
            .unwrap();
        let code = builder.result().unwrap();
        (depth, code.max_stack, code.instructions().cloned().collect())
    }

    #[test]
    fn method_header_depth() {
        let owner = BinaryName::from_string(String::from("h00/Calculator")).unwrap();
        let header = Header::Method(MethodHeader {
            owner,
            access: MethodAccessFlags::PUBLIC,
            name: UnqualifiedName::from_string(String::from("add")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::int()],
                return_type: Some(FieldType::int()),
            },
            signature: None,
            exceptions: vec![BinaryName::ILLEGALARGUMENTEXCEPTION],
        });
        let (depth, max_stack, instructions) = emit(&header);

        // 2 (new, dup) + 5 arguments + 4 while filling the exceptions array
        assert_eq!(depth, 11);
        assert_eq!(max_stack as usize, depth);
        match instructions.last() {
            Some(Instruction::Invoke(InvokeType::Special, method)) => {
                assert_eq!(method.name, UnqualifiedName::INIT);
                assert_eq!(
                    method.descriptor.render(),
                    "(Ljava/lang/String;ILjava/lang/String;Ljava/lang/String;\
                     Ljava/lang/String;[Ljava/lang/String;)V"
                );
            }
            other => panic!("unexpected final instruction {:?}", other),
        }
    }

    #[test]
    fn field_header_depth() {
        let owner = BinaryName::from_string(String::from("h00/Calculator")).unwrap();
        let header = Header::Field(FieldHeader {
            owner,
            access: FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC,
            name: UnqualifiedName::from_string(String::from("count")).unwrap(),
            descriptor: FieldType::long(),
            signature: None,
        });
        let (depth, max_stack, instructions) = emit(&header);
        assert_eq!(depth, 7);
        assert_eq!(max_stack, 7);
        assert!(instructions.contains(&Instruction::AConstNull));
    }
}
