//! Substitution of constructors
//!
//! A substitute can't allocate `this` on its own, so instead it names the constructor to route
//! through (a superclass constructor or another constructor of the same class) along with the
//! boxed arguments. The rewritten constructor compares that choice against every candidate it
//! knows of, in order, and calls the first one that matches exactly.

use super::stages::{execute_substitution, invoke_interface, ReservedSlot};
use super::{Error, MethodRewriter, RuntimeNames};
use crate::header::MethodHeader;
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, Instruction, InvokeType, OrdComparison,
};
use crate::jvm::references::MethodRef;
use crate::jvm::{self, BinaryName, FieldType, MethodDescriptor, Name, RenderDescriptor, UnqualifiedName};

/// Route the constructor through whatever the substitute asks for, then run the substitute
///
/// Expects the substitute in its reserved slot.
pub fn route_constructor(rewriter: &MethodRewriter, builder: &mut CodeBuilder) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;
    let slot = rewriter.reserved(ReservedSlot::ConstructorInvocation);

    builder.push_instruction(Instruction::ALoad(
        rewriter.reserved(ReservedSlot::Substitution),
    ))?;
    invoke_interface(builder, runtime.get_constructor_invocation())?;
    builder.push_instruction(Instruction::AStore(slot))?;

    let candidates = rewriter
        .context
        .constructor_candidates(rewriter.class, &rewriter.header.key());
    log::debug!(
        "Constructor '{}' can route through {} candidate(s)",
        rewriter.header.describe(),
        candidates.len()
    );

    emit_routing_chain(builder, runtime, slot, &candidates, |builder| {
        execute_substitution(rewriter, builder, true)
    })
}

/// Emit the chain of equality tests over `candidates`
///
/// `slot` holds the `ConstructorInvocation`. The first candidate whose owner and descriptor
/// both equal the requested ones is called on `this` with the unboxed arguments, followed by
/// `after_init` (which must not fall through). If no candidate matches, an
/// `IllegalArgumentException` naming the requested owner and descriptor is thrown.
pub fn emit_routing_chain(
    builder: &mut CodeBuilder,
    runtime: &RuntimeNames,
    slot: u16,
    candidates: &[MethodHeader],
    mut after_init: impl FnMut(&mut CodeBuilder) -> Result<(), Error>,
) -> Result<(), Error> {
    for candidate in candidates {
        let next = builder.fresh_label();
        let descriptor = candidate.descriptor.render();

        for (getter, expected) in [
            (runtime.constructor_owner(), candidate.owner.as_str()),
            (runtime.constructor_descriptor(), descriptor.as_str()),
        ] {
            builder.push_instruction(Instruction::ALoad(slot))?;
            invoke_interface(builder, getter)?;
            builder.const_string(expected)?;
            builder.invoke_virtual(BinaryName::STRING, UnqualifiedName::EQUALS, string_equals())?;
            builder.push_branch_instruction(BranchInstruction::If(OrdComparison::EQ, next))?;
        }

        builder.push_instruction(Instruction::ALoad(0))?;
        for (idx, parameter) in candidate.descriptor.parameters.iter().enumerate() {
            builder.push_instruction(Instruction::ALoad(slot))?;
            invoke_interface(builder, runtime.constructor_args())?;
            builder.const_int(idx as i32)?;
            builder.push_instruction(Instruction::AALoad)?;
            builder.unbox_value(parameter)?;
        }
        builder.invoke(
            InvokeType::Special,
            MethodRef::new(
                candidate.owner.clone(),
                UnqualifiedName::INIT,
                candidate.descriptor.clone(),
            ),
        )?;
        after_init(builder)?;

        builder.place_label(next)?;
    }

    builder.new_object(
        BinaryName::ILLEGALARGUMENTEXCEPTION,
        MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::STRING)],
            return_type: None,
        },
        |builder| {
            builder.const_string("No constructor to route through for owner ")?;
            builder.push_instruction(Instruction::ALoad(slot))?;
            invoke_interface(builder, runtime.constructor_owner())?;
            concat(builder)?;
            builder.const_string(" and descriptor ")?;
            concat(builder)?;
            builder.push_instruction(Instruction::ALoad(slot))?;
            invoke_interface(builder, runtime.constructor_descriptor())?;
            concat(builder)
        },
    )?;
    builder.push_branch_instruction(BranchInstruction::AThrow)?;
    Ok(())
}

fn string_equals() -> MethodDescriptor<BinaryName> {
    MethodDescriptor {
        parameters: vec![FieldType::object(BinaryName::OBJECT)],
        return_type: Some(FieldType::boolean()),
    }
}

fn concat(builder: &mut CodeBuilder) -> Result<(), jvm::Error> {
    builder.invoke_virtual(
        BinaryName::STRING,
        UnqualifiedName::CONCAT,
        MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::STRING)],
            return_type: Some(FieldType::object(BinaryName::STRING)),
        },
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::MethodHeader;
    use crate::jvm::class_file::Version;
    use crate::jvm::code::{CodeContext, CodeElement, MethodCode};
    use crate::jvm::references::ConstantData;
    use crate::jvm::{MethodAccessFlags, ParseDescriptor, RefType};

    fn binary(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn constructor(owner: &str, descriptor: &str) -> MethodHeader {
        MethodHeader {
            owner: binary(owner),
            access: MethodAccessFlags::PUBLIC,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
            signature: None,
            exceptions: vec![],
        }
    }

    /// Routing chain inside `h00/OwnerB.<init>()V`, with the constructor invocation in slot 1
    fn routing_chain(candidates: &[MethodHeader]) -> MethodCode {
        let runtime = RuntimeNames::new();
        let class = binary("h00/OwnerB");
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: None,
        };
        let context = CodeContext {
            class: &class,
            is_static: false,
            is_constructor: true,
            descriptor: &descriptor,
            version: Version::JAVA8,
        };
        let mut builder = CodeBuilder::new(&context);
        builder.push_instruction(Instruction::AConstNull).unwrap();
        builder
            .push_instruction(Instruction::CheckCast(RefType::Object(
                runtime.constructor_invocation.clone(),
            )))
            .unwrap();
        builder.push_instruction(Instruction::AStore(1)).unwrap();
        emit_routing_chain(&mut builder, &runtime, 1, candidates, |builder| {
            builder.return_(None)?;
            Ok(())
        })
        .unwrap();
        builder.result().unwrap()
    }

    fn strings(code: &MethodCode) -> Vec<String> {
        code.instructions()
            .filter_map(|insn| match insn {
                Instruction::Ldc(ConstantData::String(string)) => Some(string.clone()),
                _ => None,
            })
            .collect()
    }

    fn initializers(code: &MethodCode) -> Vec<String> {
        code.instructions()
            .filter_map(|insn| match insn {
                Instruction::Invoke(InvokeType::Special, method) => Some(format!(
                    "{}{}",
                    method.class.render_class_name(),
                    method.descriptor.render()
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn candidates_are_tested_in_order() {
        let code = routing_chain(&[
            constructor("h00/OwnerA", "(I)V"),
            constructor("h00/OwnerB", "()V"),
        ]);

        assert_eq!(
            strings(&code),
            vec![
                "h00/OwnerA",
                "(I)V",
                "h00/OwnerB",
                "()V",
                "No constructor to route through for owner ",
                " and descriptor ",
            ]
        );
        assert_eq!(
            initializers(&code),
            vec![
                "h00/OwnerA(I)V",
                "h00/OwnerB()V",
                "java/lang/IllegalArgumentException(Ljava/lang/String;)V",
            ]
        );

        // Arguments are unboxed from the array
        assert!(code.instructions().any(|insn| matches!(
            insn,
            Instruction::Invoke(InvokeType::Virtual, method) if method.name == UnqualifiedName::INTVALUE
        )));
    }

    #[test]
    fn no_candidates_always_throws() {
        let code = routing_chain(&[]);
        assert_eq!(
            initializers(&code),
            vec!["java/lang/IllegalArgumentException(Ljava/lang/String;)V"]
        );
        assert!(code.frames.is_empty());
    }

    #[test]
    fn each_failed_test_jumps_to_the_next_candidate() {
        let code = routing_chain(&[
            constructor("h00/OwnerA", "(I)V"),
            constructor("h00/OwnerB", "()V"),
        ]);
        let targets: Vec<_> = code
            .elements
            .iter()
            .filter_map(|element| match element {
                CodeElement::Branch(BranchInstruction::If(OrdComparison::EQ, target)) => {
                    Some(*target)
                }
                _ => None,
            })
            .collect();
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0], targets[1]);
        assert_eq!(targets[2], targets[3]);
        assert_ne!(targets[1], targets[2]);
        for target in targets {
            assert!(code.frames.contains_key(&target));
        }
    }
}
