use super::{stages, static_init, Error, SubmissionClassInfo, TransformationContext};
use crate::header::{MemberKey, MethodHeader};
use crate::jvm::class_file::Version;
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, CodeContext, CodeElement, Instruction,
    InvokeType, MethodCode, SymbolicInstruction,
};
use crate::jvm::model::Method;
use crate::jvm::verifier::Frame;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, RenderDescriptor};
use crate::util::Width;

/// How a method gets rewritten
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RewriteKind {
    /// Method the submission declares with a body
    Submission,

    /// Reference method the submission does not declare, built from scratch
    Synthesized,

    /// The `<clinit>` of the class
    StaticInitializer,

    /// Compiler generated method, only translated
    Closure,
}

/// Do two descriptors have a different shape?
///
/// Only the coarse kind of each parameter and of the return type matters, so descriptors that
/// only differ in which classes they mention are never a mismatch.
pub fn header_mismatch(
    original: &MethodDescriptor<BinaryName>,
    computed: &MethodDescriptor<BinaryName>,
) -> bool {
    original.kinds() != computed.kinds()
}

/// State for rewriting one method of a submission class
pub struct MethodRewriter<'a> {
    pub context: &'a TransformationContext,
    pub class: &'a SubmissionClassInfo,
    pub kind: RewriteKind,

    /// Header of the method being emitted
    pub header: &'a MethodHeader,

    /// Submission method along with its translated header
    pub submission: Option<(&'a Method, &'a MethodHeader)>,

    /// Reference method whose body can be replayed
    pub reference: Option<&'a Method>,

    pub version: Version,
    pub is_static: bool,
    pub is_constructor: bool,

    /// First local slot after the parameters (including `this`)
    pub first_free: usize,

    /// The submission declaration can't be adapted to `header`
    pub header_mismatch: bool,
}

impl<'a> MethodRewriter<'a> {
    pub fn new(
        context: &'a TransformationContext,
        class: &'a SubmissionClassInfo,
        kind: RewriteKind,
        header: &'a MethodHeader,
        submission: Option<(&'a Method, &'a MethodHeader)>,
        reference: Option<&'a Method>,
        version: Version,
    ) -> MethodRewriter<'a> {
        let is_static = header.is_static();
        let header_mismatch = submission.map_or(false, |(_, declared)| {
            header_mismatch(&declared.descriptor, &header.descriptor)
        });
        MethodRewriter {
            context,
            class,
            kind,
            header,
            submission,
            reference,
            version,
            is_static,
            is_constructor: header.is_constructor(),
            first_free: header.descriptor.parameter_length(!is_static),
            header_mismatch,
        }
    }

    /// Name of the class being emitted
    pub fn this_class(&self) -> &BinaryName {
        &self.class.computed_header.name
    }

    pub fn code_context(&self) -> CodeContext<'_> {
        CodeContext {
            class: self.this_class(),
            is_static: self.is_static,
            is_constructor: self.is_constructor,
            descriptor: &self.header.descriptor,
            version: self.version,
        }
    }

    /// Body of the submission method, along with its translated header
    fn submission_body(&self) -> Option<(&'a MethodCode, &'a MethodHeader)> {
        self.submission
            .and_then(|(method, declared)| method.code.as_ref().map(|code| (code, declared)))
    }

    /// Rewrite the method body
    ///
    /// Returns `None` for methods without a body (abstract and native methods).
    pub fn rewrite(&self) -> Result<Option<MethodCode>, Error> {
        log::debug!("Rewriting '{}' ({:?})", self.header.describe(), self.kind);
        match self.kind {
            RewriteKind::Closure => self
                .submission_body()
                .map(|(code, _)| self.rewrite_body(code, None))
                .transpose(),
            RewriteKind::StaticInitializer => static_init::rewrite_static_initializer(self).map(Some),
            RewriteKind::Submission => match self.submission_body() {
                None => Ok(None),
                Some(_) => self.instrumented().map(Some),
            },
            RewriteKind::Synthesized => match self.reference.and_then(|method| method.code.as_ref()) {
                None => Ok(None),
                Some(_) => self.instrumented().map(Some),
            },
        }
    }

    /// Body with every stage in front of the fallthrough
    fn instrumented(&self) -> Result<MethodCode, Error> {
        let mut builder = CodeBuilder::new(&self.code_context());

        stages::setup(self, &mut builder)?;
        stages::logging(self, &mut builder)?;
        let substitute = stages::substitution_check(self, &mut builder)?;
        let reference = self
            .reference
            .and_then(|method| method.code.as_ref());
        let delegate = match reference {
            Some(_) => Some(stages::delegation_check(self, &mut builder)?),
            None => None,
        };

        self.fallthrough(&mut builder)?;

        if let (Some(label), Some(body)) = (delegate, reference) {
            stages::delegation(self, &mut builder, label, body)?;
        }
        stages::substitution(self, &mut builder, substitute)?;

        Ok(builder.result()?)
    }

    /// What runs when the call is neither substituted nor delegated
    fn fallthrough(&self, builder: &mut CodeBuilder) -> Result<(), Error> {
        builder.truncate_locals(self.first_free);

        let declared_body = self.submission_body().filter(|_| !self.header_mismatch);
        match declared_body {
            Some((code, declared)) => {
                self.cast_parameters(builder, &declared.descriptor)?;
                let return_cast = match (&declared.descriptor.return_type, &self.header.descriptor.return_type) {
                    (Some(FieldType::Ref(declared)), Some(FieldType::Ref(computed)))
                        if declared != computed =>
                    {
                        Some(computed)
                    }
                    _ => None,
                };
                let body = self.rewrite_body(code, return_cast)?;
                let entry_frame = Frame::implicit(
                    self.this_class(),
                    self.is_static,
                    self.is_constructor,
                    &declared.descriptor,
                );
                builder.append_body(&body, &entry_frame)?;
            }
            None => {
                let message = match self.submission {
                    Some((_, declared)) => format!(
                        "Submission method '{}' does not match the expected '{}'",
                        declared.describe(),
                        self.header.describe()
                    ),
                    None => format!(
                        "Submission does not implement '{}'",
                        self.header.describe()
                    ),
                };
                builder.throw_new(BinaryName::NOSUCHMETHODERROR, message)?;
            }
        }
        Ok(())
    }

    /// Narrow reference parameters to the types the submission body expects
    fn cast_parameters(
        &self,
        builder: &mut CodeBuilder,
        declared: &MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        let mut slot = if self.is_static { 0 } else { 1 };
        for (expected, computed) in declared.parameters.iter().zip(&self.header.descriptor.parameters) {
            if let (FieldType::Ref(expected_ref), FieldType::Ref(_)) = (expected, computed) {
                if expected != computed {
                    builder.push_instruction(Instruction::ALoad(slot as u16))?;
                    builder.push_instruction(Instruction::CheckCast(expected_ref.clone()))?;
                    builder.push_instruction(Instruction::AStore(slot as u16))?;
                }
            }
            slot += expected.width();
        }
        Ok(())
    }

    /// Translate every type and member a submission body mentions into its computed form
    ///
    /// Calls found in the replacement table are redirected to their static replacement. If
    /// `return_cast` is set, every `areturn` first casts its operand to that type.
    pub fn rewrite_body(
        &self,
        code: &MethodCode,
        return_cast: Option<&RefType<BinaryName>>,
    ) -> Result<MethodCode, Error> {
        let context = self.context;
        let mut rewritten = code.clone();

        let mut elements = Vec::with_capacity(code.elements.len());
        for element in &code.elements {
            match element {
                CodeElement::Instruction(insn) => {
                    elements.push(CodeElement::Instruction(self.rewrite_instruction(insn)?));
                }
                CodeElement::Branch(BranchInstruction::AReturn) if return_cast.is_some() => {
                    if let Some(cast) = return_cast {
                        elements.push(CodeElement::Instruction(Instruction::CheckCast(
                            cast.clone(),
                        )));
                    }
                    elements.push(element.clone());
                }
                other => elements.push(other.clone()),
            }
        }
        rewritten.elements = elements;

        for handler in &mut rewritten.exception_handlers {
            if let Some(catch_type) = &handler.catch_type {
                handler.catch_type = Some(context.to_computed_name(catch_type)?);
            }
        }
        for variable in &mut rewritten.local_variables {
            variable.descriptor = context.to_computed_field_type(&variable.descriptor)?;
        }
        for variable in &mut rewritten.local_variable_types {
            variable.signature = context.to_computed_signature(&variable.signature)?;
        }
        for frame in rewritten.frames.values_mut() {
            *frame = frame.try_map(
                |class| context.to_computed_ref_type(class),
                |label| Ok(*label),
            )?;
        }

        Ok(rewritten)
    }

    fn rewrite_instruction(&self, insn: &SymbolicInstruction) -> Result<SymbolicInstruction, Error> {
        let context = self.context;
        if let Instruction::Invoke(_, method) = insn {
            if let RefType::Object(owner) = &method.class {
                let key = MemberKey {
                    owner: owner.clone(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.render(),
                };
                if let Some(replacement) = context.get_replacement(&key) {
                    log::debug!(
                        "Redirecting call to '{}.{}' to '{}.{}'",
                        owner,
                        method.name,
                        replacement.class.render_class_name(),
                        replacement.name
                    );
                    return Ok(Instruction::Invoke(InvokeType::Static, replacement.clone()));
                }
            }
        }

        insn.map(
            |class| context.to_computed_ref_type(class),
            |constant| context.computed_constant(constant),
            |field| context.computed_field(field),
            |_, method| context.computed_method(method),
            |call_site| context.computed_call_site(call_site),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{BaseType, Name, ParseDescriptor};

    fn descriptor(desc: &str) -> MethodDescriptor<BinaryName> {
        MethodDescriptor::parse(desc).unwrap()
    }

    #[test]
    fn owner_only_differences_are_not_mismatches() {
        assert!(!header_mismatch(
            &descriptor("(Lsub/Calculater;[I)Lsub/Calculater;"),
            &descriptor("(Lh00/Calculator;[I)Ljava/lang/Object;"),
        ));
        assert!(!header_mismatch(
            &descriptor("([Lsub/A;)V"),
            &descriptor("([[I)V"),
        ));
    }

    #[test]
    fn kind_differences_are_mismatches() {
        assert!(header_mismatch(&descriptor("(J)I"), &descriptor("(I)I")));
        assert!(header_mismatch(&descriptor("()V"), &descriptor("()I")));
        assert!(header_mismatch(
            &descriptor("(Ljava/lang/String;)V"),
            &descriptor("([Ljava/lang/String;)V"),
        ));
        assert!(header_mismatch(&descriptor("(I)V"), &descriptor("(II)V")));
    }

    #[test]
    fn parameter_widths() {
        let desc = descriptor("(JLjava/lang/String;D)V");
        assert_eq!(desc.parameter_length(true), 6);
        assert_eq!(FieldType::<BinaryName>::Base(BaseType::Long).width(), 2);
        assert_eq!(BinaryName::NOSUCHMETHODERROR.as_str(), "java/lang/NoSuchMethodError");
    }
}
