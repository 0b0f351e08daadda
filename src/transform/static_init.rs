//! Rewriting of `<clinit>`
//!
//! The submission initializer runs first. Every value it stores into one of the class's own
//! static fields is also reported to the execution handler, which keeps the original values
//! around so that static state can be reset between test runs. Once it is done (every `return`
//! becomes a jump to its end), the reference initializer runs to set up the fields only the
//! reference declares. Its stores into fields the submission declares are dropped.

use super::{Error, MethodRewriter};
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, CodeContext, CodeElement, Instruction,
    InvokeType, MethodCode,
};
use crate::jvm::references::FieldRef;
use crate::jvm::verifier::CodeFrame;
use crate::jvm::{MethodDescriptor, Name};
use crate::util::Width;

pub fn rewrite_static_initializer(rewriter: &MethodRewriter) -> Result<MethodCode, Error> {
    let context = rewriter.code_context();
    let entry_frame = context.implicit_frame();
    let mut builder = CodeBuilder::new(&context);

    let submission = rewriter
        .submission
        .and_then(|(method, _)| method.code.as_ref());
    if let Some(code) = submission {
        let mut body = rewriter.rewrite_body(code, None)?;
        mirror_static_stores(rewriter, &mut body, &entry_frame)?;
        builder.append_body(&body, &entry_frame)?;
    }

    match rewriter.reference.and_then(|method| method.code.as_ref()) {
        Some(reference) => {
            let reference = discard_submission_stores(rewriter, reference);
            builder.append_body(&reference, &entry_frame)?;
        }
        None => {
            if builder.current_frame().is_none() {
                let end = builder.fresh_label();
                builder.place_label_with_frame(end, &entry_frame)?;
            }
            builder.return_(None)?;
        }
    }

    Ok(builder.result()?)
}

/// Is this a store into a static field the submission declares on this class?
fn stores_submission_field(rewriter: &MethodRewriter, field: &FieldRef) -> bool {
    field.class == *rewriter.this_class()
        && rewriter
            .class
            .declares_computed_field(field.name.as_str(), &field.descriptor)
}

/// Report every store into a submission field, and turn returns into jumps past the body
///
/// `end_frame` is the frame after the body, which is also the frame on entry.
fn mirror_static_stores(
    rewriter: &MethodRewriter,
    body: &mut MethodCode,
    end_frame: &CodeFrame,
) -> Result<(), Error> {
    let end = body.fresh_label();
    let mut extra_stack = 0;

    let mut elements = Vec::with_capacity(body.elements.len());
    for element in body.elements.drain(..) {
        match element {
            CodeElement::Branch(BranchInstruction::Return) => {
                elements.push(CodeElement::Branch(BranchInstruction::Goto(end)));
            }
            CodeElement::Instruction(Instruction::PutStatic(field))
                if stores_submission_field(rewriter, &field) =>
            {
                let (record, depth) = record_store(rewriter, &field)?;
                extra_stack = extra_stack.max(depth);
                elements.push(CodeElement::Instruction(Instruction::PutStatic(field)));
                elements.extend(record);
            }
            other => elements.push(other),
        }
    }
    elements.push(CodeElement::Label(end));

    body.elements = elements;
    body.frames.insert(end, end_frame.clone());
    body.max_stack += extra_stack;
    Ok(())
}

/// Code handing the current value of a static field to the execution handler
///
/// Returns the elements along with the stack depth they need.
fn record_store(
    rewriter: &MethodRewriter,
    field: &FieldRef,
) -> Result<(Vec<CodeElement>, usize), Error> {
    let runtime = &rewriter.context.settings.runtime;
    let descriptor = MethodDescriptor {
        parameters: vec![],
        return_type: None,
    };
    let context = CodeContext {
        class: rewriter.this_class(),
        is_static: true,
        is_constructor: false,
        descriptor: &descriptor,
        version: rewriter.version,
    };

    let mut builder = CodeBuilder::new(&context);
    builder.invoke(InvokeType::Static, runtime.get_instance())?;
    builder.const_string(field.class.as_str())?;
    builder.const_string(field.name.as_str())?;
    builder.push_instruction(Instruction::GetStatic(field.clone()))?;
    builder.box_value(&field.descriptor)?;
    builder.invoke(InvokeType::Virtual, runtime.record_static_field_value())?;
    let code = builder.result()?;

    Ok((code.elements, code.max_stack))
}

/// Reference initializer with its stores into submission fields replaced by pops
fn discard_submission_stores(rewriter: &MethodRewriter, reference: &MethodCode) -> MethodCode {
    let mut code = reference.clone();
    for element in &mut code.elements {
        let discarded_width = match element {
            CodeElement::Instruction(Instruction::PutStatic(field))
                if stores_submission_field(rewriter, field) =>
            {
                log::debug!("Dropping reference store into '{}'", field.name);
                Some(field.descriptor.width())
            }
            _ => None,
        };
        match discarded_width {
            Some(2) => *element = CodeElement::Instruction(Instruction::Pop2),
            Some(_) => *element = CodeElement::Instruction(Instruction::Pop),
            None => (),
        }
    }
    code
}
