//! Code emitted in front of instrumented methods
//!
//! Every instrumented method starts the same way: fetch the execution handler, build the header
//! of the method, offer the call for logging, then ask whether to substitute or delegate it.
//! Substitution and delegation are jumps to out-of-line blocks placed after the fallthrough
//! code, so the fallthrough always starts right after the checks.
//!
//! ```text
//!           setup           handler and header into reserved slots
//!           logging         record an `Invocation` if the handler asks for it
//!           ifne SUBST      substitution check
//!           ifne DELEG      delegation check (only with a reference body)
//!           <fallthrough>   submission body, or a throw
//!   DELEG:  <reference body>
//!   SUBST:  <execute the substitute and return its result>
//! ```

use super::{constructor_routing, Error, MethodRewriter};
use crate::header::Header;
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, Instruction, InvokeType, MethodCode,
    OrdComparison, SynLabel,
};
use crate::jvm::references::{ConstantData, MethodRef};
use crate::jvm::verifier::Frame;
use crate::jvm::{self, BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use crate::util::Width;

/// Locals reserved after the parameters of an instrumented method
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReservedSlot {
    ExecutionHandler = 0,
    MethodHeader = 1,
    Substitution = 2,
    ConstructorInvocation = 3,
}

impl ReservedSlot {
    /// Local slot, given the first slot after the parameters
    pub fn slot(self, first_free: usize) -> u16 {
        (first_free + self as usize) as u16
    }
}

impl<'a> MethodRewriter<'a> {
    pub(super) fn reserved(&self, slot: ReservedSlot) -> u16 {
        slot.slot(self.first_free)
    }
}

/// Invoke an interface method, counting the argument slots `invokeinterface` wants
pub(super) fn invoke_interface(
    builder: &mut CodeBuilder,
    method: MethodRef,
) -> Result<(), jvm::Error> {
    let count = method.descriptor.parameter_length(true) as u8;
    builder.invoke(InvokeType::Interface(count), method)
}

/// Push the execution handler followed by the header of the method
fn push_handler_and_header(rewriter: &MethodRewriter, builder: &mut CodeBuilder) -> Result<(), Error> {
    builder.push_instruction(Instruction::ALoad(
        rewriter.reserved(ReservedSlot::ExecutionHandler),
    ))?;
    builder.push_instruction(Instruction::ALoad(
        rewriter.reserved(ReservedSlot::MethodHeader),
    ))?;
    Ok(())
}

/// SETUP: store the execution handler and the header of this method in their reserved slots
pub fn setup(rewriter: &MethodRewriter, builder: &mut CodeBuilder) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;
    builder.invoke(InvokeType::Static, runtime.get_instance())?;
    builder.push_instruction(Instruction::AStore(
        rewriter.reserved(ReservedSlot::ExecutionHandler),
    ))?;

    let header = Header::Method(rewriter.header.clone());
    let depth = header.emit_construction(builder, runtime)?;
    log::trace!("Header of '{}' takes {} stack slots to build", rewriter.header.name, depth);
    builder.push_instruction(Instruction::AStore(
        rewriter.reserved(ReservedSlot::MethodHeader),
    ))?;
    Ok(())
}

/// Push a new `Invocation` describing the current call
///
/// The receiver is only recorded when `with_receiver` is set: in constructors `this` is not
/// usable until the superclass constructor has run.
pub fn push_invocation(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
    with_receiver: bool,
) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;
    let this_class = rewriter.this_class().clone();
    let header_slot = rewriter.reserved(ReservedSlot::MethodHeader);

    builder.new_object(
        runtime.invocation.clone(),
        runtime.invocation_constructor(),
        |builder| {
            builder.push_instruction(Instruction::Ldc(ConstantData::Class(RefType::Object(
                this_class,
            ))))?;
            builder.push_instruction(Instruction::ALoad(header_slot))?;
            builder.invoke_static(
                BinaryName::THREAD,
                UnqualifiedName::CURRENTTHREAD,
                MethodDescriptor {
                    parameters: vec![],
                    return_type: Some(FieldType::object(BinaryName::THREAD)),
                },
            )?;
            builder.invoke_virtual(
                BinaryName::THREAD,
                UnqualifiedName::GETSTACKTRACE,
                MethodDescriptor {
                    parameters: vec![],
                    return_type: Some(FieldType::array(FieldType::object(
                        BinaryName::STACKTRACEELEMENT,
                    ))),
                },
            )
        },
    )?;

    if with_receiver {
        builder.push_instruction(Instruction::Dup)?;
        builder.push_instruction(Instruction::ALoad(0))?;
        builder.invoke(InvokeType::Virtual, runtime.set_instance())?;
    }

    let mut slot = if rewriter.is_static { 0 } else { 1 };
    for parameter in &rewriter.header.descriptor.parameters {
        builder.push_instruction(Instruction::Dup)?;
        builder.get_local(slot as u16, parameter)?;
        builder.box_value(parameter)?;
        builder.invoke(InvokeType::Virtual, runtime.add_parameter())?;
        slot += parameter.width();
    }
    Ok(())
}

/// LOGGING: record the call if the execution handler wants it
pub fn logging(rewriter: &MethodRewriter, builder: &mut CodeBuilder) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;
    let skip = builder.fresh_label();

    push_handler_and_header(rewriter, builder)?;
    builder.invoke(InvokeType::Virtual, runtime.log_invocation())?;
    builder.push_branch_instruction(BranchInstruction::If(OrdComparison::EQ, skip))?;

    push_handler_and_header(rewriter, builder)?;
    let with_receiver = !rewriter.is_static && !rewriter.is_constructor;
    push_invocation(rewriter, builder, with_receiver)?;
    builder.invoke(InvokeType::Virtual, runtime.add_invocation())?;

    builder.place_label(skip)?;
    Ok(())
}

/// SUBSTITUTION-CHECK: jump to the returned label if a substitute should run instead
pub fn substitution_check(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
) -> Result<SynLabel, Error> {
    let runtime = &rewriter.context.settings.runtime;
    let substitute = builder.fresh_label();

    push_handler_and_header(rewriter, builder)?;
    builder.invoke(InvokeType::Virtual, runtime.use_substitution())?;
    builder.push_branch_instruction(BranchInstruction::If(OrdComparison::NE, substitute))?;
    Ok(substitute)
}

/// DELEGATION-CHECK: jump to the returned label if the reference body should run instead
///
/// The reserved slots are dropped before the jump, so the reference body starts from the
/// frame it was compiled against.
pub fn delegation_check(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
) -> Result<SynLabel, Error> {
    let runtime = &rewriter.context.settings.runtime;
    let delegate = builder.fresh_label();

    push_handler_and_header(rewriter, builder)?;
    builder.invoke(InvokeType::Virtual, runtime.use_reference_impl())?;
    builder.truncate_locals(rewriter.first_free);
    builder.push_branch_instruction(BranchInstruction::If(OrdComparison::NE, delegate))?;
    Ok(delegate)
}

/// DELEGATION-CODE: replay the reference body
pub fn delegation(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
    label: SynLabel,
    reference: &MethodCode,
) -> Result<(), Error> {
    builder.place_label(label)?;
    let entry_frame = Frame::implicit(
        rewriter.this_class(),
        rewriter.is_static,
        rewriter.is_constructor,
        &rewriter.header.descriptor,
    );
    builder.append_body(reference, &entry_frame)?;
    Ok(())
}

/// Run the substitute and return whatever it produced
///
/// Expects the substitute in its reserved slot.
pub fn execute_substitution(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
    with_receiver: bool,
) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;
    let return_type = rewriter.header.descriptor.return_type.as_ref();

    builder.push_instruction(Instruction::ALoad(
        rewriter.reserved(ReservedSlot::Substitution),
    ))?;
    push_invocation(rewriter, builder, with_receiver)?;
    invoke_interface(builder, runtime.execute())?;
    match return_type {
        None => builder.pop()?,
        Some(return_type) => builder.unbox_value(return_type)?,
    }
    builder.return_(return_type)?;
    Ok(())
}

/// SUBSTITUTION: fetch the substitute and run it
pub fn substitution(
    rewriter: &MethodRewriter,
    builder: &mut CodeBuilder,
    label: SynLabel,
) -> Result<(), Error> {
    let runtime = &rewriter.context.settings.runtime;

    builder.place_label(label)?;
    push_handler_and_header(rewriter, builder)?;
    builder.invoke(InvokeType::Virtual, runtime.get_substitution())?;
    builder.push_instruction(Instruction::AStore(
        rewriter.reserved(ReservedSlot::Substitution),
    ))?;

    if rewriter.is_constructor {
        constructor_routing::route_constructor(rewriter, builder)
    } else {
        execute_substitution(rewriter, builder, !rewriter.is_static)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserved_slots_follow_parameters() {
        assert_eq!(ReservedSlot::ExecutionHandler.slot(3), 3);
        assert_eq!(ReservedSlot::MethodHeader.slot(3), 4);
        assert_eq!(ReservedSlot::Substitution.slot(3), 5);
        assert_eq!(ReservedSlot::ConstructorInvocation.slot(0), 3);
    }
}
