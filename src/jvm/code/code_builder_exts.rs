use crate::jvm::code::{BranchInstruction, CodeBuilder, Instruction, InvokeType};
use crate::jvm::references::{ConstantData, MethodRef};
use crate::jvm::{
    BaseType, BinaryName, Error, FieldType, MethodDescriptor, RefType, UnqualifiedName,
};
use crate::util::Width;

/// Helpers for emitting common instruction sequences
pub trait CodeBuilderExts {
    /// Push a constant string to the stack
    fn const_string(&mut self, string: impl Into<String>) -> Result<(), Error>;

    /// Push a constant string, or `null` if there is no string
    fn const_optional_string(&mut self, string: Option<&str>) -> Result<(), Error>;

    /// Push an integer constant onto the stack
    fn const_int(&mut self, integer: i32) -> Result<(), Error>;

    /// Push the zero value of a type (`0`, `0L`, `0.0`, or `null`)
    fn const_zero(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Get a local at a particular offset
    fn get_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Set a local at a particular offset
    fn set_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Return from the function
    fn return_(&mut self, field_type: Option<&FieldType<BinaryName>>) -> Result<(), Error>;

    /// Pop the top of the stack, accounting for the different possible type widths
    fn pop(&mut self) -> Result<(), Error>;

    /// Duplicate the top of the stack, accounting for the different possible type widths
    fn dup(&mut self) -> Result<(), Error>;

    /// Invoke a method
    fn invoke(&mut self, invoke_type: InvokeType, method: MethodRef) -> Result<(), Error>;

    /// Invoke a static method on a regular class
    fn invoke_static(
        &mut self,
        class: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        self.invoke(InvokeType::Static, MethodRef::new(class, name, descriptor))
    }

    /// Invoke a virtual method on a regular class
    fn invoke_virtual(
        &mut self,
        class: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        self.invoke(InvokeType::Virtual, MethodRef::new(class, name, descriptor))
    }

    /// Construct a new object, leaving it on the stack
    ///
    /// `push_arguments` must push values matching the constructor descriptor.
    fn new_object(
        &mut self,
        class: BinaryName,
        descriptor: MethodDescriptor<BinaryName>,
        push_arguments: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Construct a `String[]` holding the given strings
    fn new_string_array(&mut self, strings: &[String]) -> Result<(), Error>;

    /// Box the primitive value on top of the stack (references are left alone)
    fn box_value(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Convert the `java/lang/Object` on top of the stack into a value of the given type,
    /// unboxing primitives
    fn unbox_value(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error>;

    /// Throw a new exception of the given class, constructed with a message
    fn throw_new(&mut self, exception: BinaryName, message: impl Into<String>)
        -> Result<(), Error>;
}

impl CodeBuilderExts for CodeBuilder {
    fn const_string(&mut self, string: impl Into<String>) -> Result<(), Error> {
        self.push_instruction(Instruction::Ldc(ConstantData::String(string.into())))
    }

    fn const_optional_string(&mut self, string: Option<&str>) -> Result<(), Error> {
        match string {
            None => self.push_instruction(Instruction::AConstNull),
            Some(string) => self.const_string(string),
        }
    }

    fn const_int(&mut self, integer: i32) -> Result<(), Error> {
        let insn = match integer {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            -128..=127 => Instruction::BiPush(integer as i8),
            -32768..=32767 => Instruction::SiPush(integer as i16),
            _ => Instruction::Ldc(ConstantData::Integer(integer)),
        };
        self.push_instruction(insn)
    }

    fn const_zero(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(BaseType::Long) => Instruction::LConst0,
            FieldType::Base(BaseType::Float) => Instruction::FConst0,
            FieldType::Base(BaseType::Double) => Instruction::DConst0,
            FieldType::Base(_) => Instruction::IConst0,
            FieldType::Ref(_) => Instruction::AConstNull,
        };
        self.push_instruction(insn)
    }

    fn get_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(BaseType::Float) => Instruction::FLoad(offset),
            FieldType::Base(BaseType::Long) => Instruction::LLoad(offset),
            FieldType::Base(BaseType::Double) => Instruction::DLoad(offset),
            FieldType::Base(_) => Instruction::ILoad(offset),
            FieldType::Ref(_) => Instruction::ALoad(offset),
        };
        self.push_instruction(insn)
    }

    fn set_local(&mut self, offset: u16, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(BaseType::Float) => Instruction::FStore(offset),
            FieldType::Base(BaseType::Long) => Instruction::LStore(offset),
            FieldType::Base(BaseType::Double) => Instruction::DStore(offset),
            FieldType::Base(_) => Instruction::IStore(offset),
            FieldType::Ref(_) => Instruction::AStore(offset),
        };
        self.push_instruction(insn)
    }

    fn return_(&mut self, field_type: Option<&FieldType<BinaryName>>) -> Result<(), Error> {
        let insn = match field_type {
            None => BranchInstruction::Return,
            Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
            Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
            Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
            Some(FieldType::Base(_)) => BranchInstruction::IReturn,
            Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
        };
        self.push_branch_instruction(insn)
    }

    fn pop(&mut self) -> Result<(), Error> {
        if let Some(frame) = self.current_frame() {
            let wide_typ = frame
                .stack
                .iter()
                .last()
                .map_or(false, |t| t.width() == 2);
            let insn = if wide_typ {
                Instruction::Pop2
            } else {
                Instruction::Pop
            };
            self.push_instruction(insn)?;
        }
        Ok(())
    }

    fn dup(&mut self) -> Result<(), Error> {
        if let Some(frame) = self.current_frame() {
            let wide_typ = frame
                .stack
                .iter()
                .last()
                .map_or(false, |t| t.width() == 2);
            let insn = if wide_typ {
                Instruction::Dup2
            } else {
                Instruction::Dup
            };
            self.push_instruction(insn)?;
        }
        Ok(())
    }

    fn invoke(&mut self, invoke_type: InvokeType, method: MethodRef) -> Result<(), Error> {
        self.push_instruction(Instruction::Invoke(invoke_type, method))
    }

    fn new_object(
        &mut self,
        class: BinaryName,
        descriptor: MethodDescriptor<BinaryName>,
        push_arguments: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.push_instruction(Instruction::New(RefType::Object(class.clone())))?;
        self.push_instruction(Instruction::Dup)?;
        push_arguments(self)?;
        self.invoke(
            InvokeType::Special,
            MethodRef::new(class, UnqualifiedName::INIT, descriptor),
        )
    }

    fn new_string_array(&mut self, strings: &[String]) -> Result<(), Error> {
        self.const_int(strings.len() as i32)?;
        self.push_instruction(Instruction::ANewArray(RefType::Object(BinaryName::STRING)))?;
        for (idx, string) in strings.iter().enumerate() {
            self.push_instruction(Instruction::Dup)?;
            self.const_int(idx as i32)?;
            self.const_string(string.as_str())?;
            self.push_instruction(Instruction::AAStore)?;
        }
        Ok(())
    }

    fn box_value(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        if let FieldType::Base(base_type) = field_type {
            let boxed = base_type.boxed_class();
            self.invoke_static(
                boxed.clone(),
                UnqualifiedName::VALUEOF,
                MethodDescriptor {
                    parameters: vec![field_type.clone()],
                    return_type: Some(FieldType::object(boxed)),
                },
            )?;
        }
        Ok(())
    }

    fn unbox_value(&mut self, field_type: &FieldType<BinaryName>) -> Result<(), Error> {
        match field_type {
            FieldType::Base(base_type) => {
                let boxed = base_type.boxed_class();
                let getter = match base_type {
                    BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
                    BaseType::Byte => UnqualifiedName::BYTEVALUE,
                    BaseType::Char => UnqualifiedName::CHARVALUE,
                    BaseType::Double => UnqualifiedName::DOUBLEVALUE,
                    BaseType::Float => UnqualifiedName::FLOATVALUE,
                    BaseType::Int => UnqualifiedName::INTVALUE,
                    BaseType::Long => UnqualifiedName::LONGVALUE,
                    BaseType::Short => UnqualifiedName::SHORTVALUE,
                };
                self.push_instruction(Instruction::CheckCast(RefType::Object(boxed.clone())))?;
                self.invoke_virtual(
                    boxed,
                    getter,
                    MethodDescriptor {
                        parameters: vec![],
                        return_type: Some(field_type.clone()),
                    },
                )
            }
            FieldType::Ref(RefType::Object(class)) if *class == BinaryName::OBJECT => Ok(()),
            FieldType::Ref(ref_type) => {
                self.push_instruction(Instruction::CheckCast(ref_type.clone()))
            }
        }
    }

    fn throw_new(
        &mut self,
        exception: BinaryName,
        message: impl Into<String>,
    ) -> Result<(), Error> {
        let message = message.into();
        self.new_object(
            exception,
            MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::STRING)],
                return_type: None,
            },
            |builder| builder.const_string(message),
        )?;
        self.push_branch_instruction(BranchInstruction::AThrow)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::code::{CodeContext, CodeElement, MethodCode};
    use crate::jvm::names::Name;

    fn build(
        descriptor: MethodDescriptor<BinaryName>,
        body: impl FnOnce(&mut CodeBuilder) -> Result<(), Error>,
    ) -> MethodCode {
        let class = BinaryName::from_string(String::from("h00/Helpers")).unwrap();
        let context = CodeContext {
            class: &class,
            is_static: true,
            is_constructor: false,
            descriptor: &descriptor,
            version: Version::JAVA8,
        };
        let mut builder = CodeBuilder::new(&context);
        body(&mut builder).unwrap();
        builder.result().unwrap()
    }

    #[test]
    fn boxing_round_trip() {
        let descriptor = MethodDescriptor {
            parameters: vec![FieldType::long()],
            return_type: Some(FieldType::long()),
        };
        let code = build(descriptor, |builder| {
            builder.get_local(0, &FieldType::long())?;
            builder.box_value(&FieldType::long())?;
            builder.unbox_value(&FieldType::long())?;
            builder.return_(Some(&FieldType::long()))
        });
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.instructions().count(), 4);
    }

    #[test]
    fn thrown_exceptions_end_the_body() {
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::int()),
        };
        let code = build(descriptor, |builder| {
            builder.throw_new(BinaryName::NOSUCHMETHODERROR, "nope")
        });
        assert_eq!(code.max_stack, 3);
        assert_eq!(
            code.elements.last(),
            Some(&CodeElement::Branch(BranchInstruction::AThrow))
        );
    }

    #[test]
    fn string_arrays() {
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::array(FieldType::object(BinaryName::STRING))),
        };
        let strings = vec![String::from("a"), String::from("b")];
        let code = build(descriptor, |builder| {
            builder.new_string_array(&strings)?;
            builder.push_branch_instruction(BranchInstruction::AReturn)
        });
        assert_eq!(code.max_stack, 4);
        assert_eq!(code.instructions().count(), 2 + 2 * 4);
    }
}
