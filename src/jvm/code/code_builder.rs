use crate::jvm::code::{
    BranchInstruction, CodeContext, CodeElement, Instruction, LabelGenerator, MethodCode,
    SymbolicInstruction, SynLabel,
};
use crate::jvm::verifier::CodeFrame;
use crate::jvm::{BinaryName, Error, FieldType};
use std::collections::{HashMap, HashSet};

/// Builder for method bodies
///
/// Instructions are appended from top to bottom and the frame is tracked along the way, so that
/// every label placed in the body ends up with the frame the verifier will expect there. The
/// main restriction is that labels in unreachable code (code which does not follow a
/// fallthrough) can only be placed once something has jumped to them, since otherwise there is
/// no way to infer the frame.
///
/// Frames must match exactly when control flow merges. There is no attempt to compute a least
/// upper bound, so generated code should explicitly kill locals that differ across branches.
pub struct CodeBuilder {
    /// Code being built
    code: MethodCode,

    /// Class declaring the method
    this_class: BinaryName,

    return_type: Option<FieldType<BinaryName>>,

    /// Frame after the last element, or `None` if the last element does not fall through
    current_frame: Option<CodeFrame>,

    /// Labels that have been jumped to but not placed yet, along with the expected frame
    unplaced_labels: HashMap<SynLabel, CodeFrame>,

    /// Labels that have been placed
    placed_labels: HashSet<SynLabel>,
}

impl CodeBuilder {
    /// New builder for the method described by the context, starting with the implicit frame
    pub fn new(context: &CodeContext) -> CodeBuilder {
        let entry_frame = context.implicit_frame();
        let mut code = MethodCode::new();
        code.max_locals = entry_frame.locals.offset_len().0;

        CodeBuilder {
            code,
            this_class: context.class.clone(),
            return_type: context.descriptor.return_type.clone(),
            current_frame: Some(entry_frame),
            unplaced_labels: HashMap::new(),
            placed_labels: HashSet::new(),
        }
    }

    /// Turn the builder into the method code
    ///
    /// Only labels which are jumped to (or which follow code that does not fall through) keep
    /// their frame.
    pub fn result(mut self) -> Result<MethodCode, Error> {
        if !self.unplaced_labels.is_empty() {
            let mut unplaced_labels: Vec<SynLabel> = self.unplaced_labels.into_keys().collect();
            unplaced_labels.sort_unstable();
            return Err(Error::MethodCodeNotFinished { unplaced_labels });
        }

        let mut needs_frame: HashSet<SynLabel> = self.code.jump_targets().into_iter().collect();
        let mut after_barrier = false;
        for element in &self.code.elements {
            match element {
                CodeElement::Label(label) => {
                    if after_barrier {
                        needs_frame.insert(*label);
                    }
                }
                CodeElement::Instruction(_) => after_barrier = false,
                CodeElement::Branch(branch) => after_barrier = !branch.falls_through(),
            }
        }
        self.code
            .frames
            .retain(|label, _| needs_frame.contains(label));

        Ok(self.code)
    }

    /// Query the expected frame for a label that has already been referred to or placed
    pub fn lookup_frame(&self, label: SynLabel) -> Option<&CodeFrame> {
        self.code
            .frames
            .get(&label)
            .or_else(|| self.unplaced_labels.get(&label))
    }

    /// Check that the label has a certain frame. If the frame is already being tracked, the
    /// frames must match. Otherwise, start tracking the frame for when the label is placed.
    fn assert_frame_for_label(&mut self, label: SynLabel, expected: &CodeFrame) -> Result<(), Error> {
        if let Some(found) = self.lookup_frame(label) {
            if found != expected {
                return Err(Error::IncompatibleFrames {
                    label,
                    found: format!("{:?}", found),
                    expected: format!("{:?}", expected),
                });
            }
        } else {
            self.unplaced_labels.insert(label, expected.clone());
        }
        Ok(())
    }

    fn update_maximums(&mut self) {
        if let Some(frame) = &self.current_frame {
            self.code.max_stack = self.code.max_stack.max(frame.stack.offset_len().0);
            self.code.max_locals = self.code.max_locals.max(frame.locals.offset_len().0);
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        self.code.label_generator.fresh_label()
    }

    /// Push a new straight-line instruction
    ///
    /// `new` instructions get a fresh label placed before them, since the label is what
    /// identifies the uninitialized object in frames. Instructions pushed in unreachable code are
    /// dropped.
    pub fn push_instruction(&mut self, insn: SymbolicInstruction) -> Result<(), Error> {
        if self.current_frame.is_none() {
            return Ok(());
        }

        let new_label = if let Instruction::New(_) = insn {
            let label = self.fresh_label();
            self.place_label(label)?;
            Some(label)
        } else {
            None
        };

        if let Some(frame) = self.current_frame.as_mut() {
            frame
                .interpret_instruction(&insn, new_label, &self.this_class)
                .map_err(|kind| Error::VerifierError {
                    instruction: format!("{:?}", insn),
                    kind,
                })?;
        }
        self.update_maximums();
        self.code.elements.push(CodeElement::Instruction(insn));
        Ok(())
    }

    /// Push a branch instruction, recording the frame expected at every jump target
    pub fn push_branch_instruction(
        &mut self,
        insn: BranchInstruction<SynLabel, SynLabel>,
    ) -> Result<(), Error> {
        let mut frame = match self.current_frame.take() {
            None => return Ok(()),
            Some(frame) => frame,
        };
        frame
            .interpret_branch(&insn, &self.return_type)
            .map_err(|kind| Error::VerifierError {
                instruction: format!("{:?}", insn),
                kind,
            })?;

        for target in insn.jump_targets().targets() {
            self.assert_frame_for_label(*target, &frame)?;
        }

        if insn.falls_through() {
            self.current_frame = Some(frame);
        }
        self.code.elements.push(CodeElement::Branch(insn));
        Ok(())
    }

    /// Place a label at the current position. This can fail if:
    ///
    ///   * the label was already placed
    ///   * the label was already jumped to from elsewhere and the frames don't match
    ///   * the label was never jumped to and there is no fallthrough
    ///
    pub fn place_label(&mut self, label: SynLabel) -> Result<(), Error> {
        if !self.placed_labels.insert(label) {
            return Err(Error::DuplicateLabel(label));
        }

        let frame = match self.current_frame.take() {
            Some(frame) => {
                self.assert_frame_for_label(label, &frame)?;
                self.unplaced_labels.remove(&label);
                frame
            }
            None => self
                .unplaced_labels
                .remove(&label)
                .ok_or(Error::PlacingLabelBeforeReference(label))?,
        };

        self.code.frames.insert(label, frame.clone());
        self.code.elements.push(CodeElement::Label(label));
        self.current_frame = Some(frame);
        self.update_maximums();
        Ok(())
    }

    /// Like `place_label`, but with an explicit frame, so the label may be placed in unreachable
    /// code
    pub fn place_label_with_frame(&mut self, label: SynLabel, frame: &CodeFrame) -> Result<(), Error> {
        self.assert_frame_for_label(label, frame)?;
        self.place_label(label)
    }

    /// Get the current frame
    pub fn current_frame(&self) -> Option<&CodeFrame> {
        self.current_frame.as_ref()
    }

    /// Forget every local from slot `slots` onwards
    pub fn truncate_locals(&mut self, slots: usize) {
        if let Some(frame) = self.current_frame.as_mut() {
            frame.truncate_locals(slots);
        }
    }

    /// Append an existing method body
    ///
    /// The body is relabelled so that its labels don't collide with those already in the
    /// builder. `entry_frame` is the frame the body expects on entry (usually the implicit frame
    /// of the method it was decoded from); the current frame must match it exactly. The body
    /// keeps its own frames, exception handlers and debug tables.
    pub fn append_body(&mut self, body: &MethodCode, entry_frame: &CodeFrame) -> Result<(), Error> {
        let entry = self.fresh_label();
        self.place_label_with_frame(entry, entry_frame)?;

        let body = body.relabel(&mut self.code.label_generator);
        for (label, frame) in &body.frames {
            self.placed_labels.insert(*label);
            self.code.frames.insert(*label, frame.clone());
        }
        for element in &body.elements {
            if let CodeElement::Label(label) = element {
                self.placed_labels.insert(*label);
            }
        }

        self.code.max_stack = self.code.max_stack.max(body.max_stack);
        self.code.max_locals = self.code.max_locals.max(body.locals_used());
        self.code.elements.extend(body.elements);
        self.code.exception_handlers.extend(body.exception_handlers);
        self.code.line_numbers.extend(body.line_numbers);
        self.code.local_variables.extend(body.local_variables);
        self.code
            .local_variable_types
            .extend(body.local_variable_types);
        self.code.label_generator = body.label_generator;

        // Well-formed bodies never run off the end
        self.current_frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::code::OrdComparison;
    use crate::jvm::names::Name;
    use crate::jvm::verifier::{Frame, VerificationType};
    use crate::jvm::MethodDescriptor;
    use crate::util::OffsetVec;
    use Instruction::*;

    fn with_builder<T>(
        is_static: bool,
        descriptor: MethodDescriptor<BinaryName>,
        build: impl FnOnce(&mut CodeBuilder) -> Result<T, Error>,
    ) -> Result<MethodCode, Error> {
        let class = BinaryName::from_string(String::from("h00/Counter")).unwrap();
        let context = CodeContext {
            class: &class,
            is_static,
            is_constructor: false,
            descriptor: &descriptor,
            version: Version::JAVA8,
        };
        let mut builder = CodeBuilder::new(&context);
        build(&mut builder)?;
        builder.result()
    }

    fn int_to_int() -> MethodDescriptor<BinaryName> {
        MethodDescriptor {
            parameters: vec![FieldType::int()],
            return_type: Some(FieldType::int()),
        }
    }

    #[test]
    fn tracks_maximums_and_frames() {
        let code = with_builder(true, int_to_int(), |builder| {
            let negative = builder.fresh_label();
            builder.push_instruction(ILoad(0))?;
            builder.push_branch_instruction(BranchInstruction::If(OrdComparison::LT, negative))?;
            builder.push_instruction(ILoad(0))?;
            builder.push_instruction(ILoad(0))?;
            builder.push_instruction(IMul)?;
            builder.push_branch_instruction(BranchInstruction::IReturn)?;
            builder.place_label(negative)?;
            builder.push_instruction(IConst0)?;
            builder.push_branch_instruction(BranchInstruction::IReturn)
        })
        .unwrap();

        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.frames.len(), 1);
        let frame = code.frames.values().next().unwrap();
        assert_eq!(frame.stack.len(), 0);
        assert_eq!(frame.locals.len(), 1);
    }

    #[test]
    fn unreachable_labels_need_a_reference() {
        let result = with_builder(true, int_to_int(), |builder| {
            builder.push_instruction(IConst1)?;
            builder.push_branch_instruction(BranchInstruction::IReturn)?;
            let dead = builder.fresh_label();
            builder.place_label(dead)
        });
        assert!(matches!(result, Err(Error::PlacingLabelBeforeReference(_))));
    }

    #[test]
    fn merging_needs_equal_frames() {
        let result = with_builder(true, int_to_int(), |builder| {
            let join = builder.fresh_label();
            builder.push_instruction(ILoad(0))?;
            builder.push_branch_instruction(BranchInstruction::If(OrdComparison::EQ, join))?;
            builder.push_instruction(IConst1)?;
            builder.place_label(join)
        });
        assert!(matches!(result, Err(Error::IncompatibleFrames { .. })));
    }

    #[test]
    fn bad_instructions_are_rejected() {
        let result = with_builder(true, int_to_int(), |builder| {
            builder.push_instruction(IAdd)
        });
        assert!(matches!(result, Err(Error::VerifierError { .. })));

        let result = with_builder(true, int_to_int(), |builder| {
            builder.push_branch_instruction(BranchInstruction::Return)
        });
        assert!(matches!(result, Err(Error::VerifierError { .. })));
    }

    #[test]
    fn unplaced_targets_are_reported() {
        let result = with_builder(true, int_to_int(), |builder| {
            let nowhere = builder.fresh_label();
            builder.push_branch_instruction(BranchInstruction::Goto(nowhere))
        });
        assert!(matches!(result, Err(Error::MethodCodeNotFinished { .. })));
    }

    #[test]
    fn new_gets_a_label() {
        let code = with_builder(true, int_to_int(), |builder| {
            builder.push_instruction(New(crate::jvm::RefType::Object(BinaryName::OBJECT)))?;
            let frame = builder.current_frame().unwrap();
            assert!(matches!(
                frame.stack.iter().next(),
                Some(VerificationType::Uninitialized(_))
            ));
            builder.push_instruction(Pop)?;
            builder.push_instruction(ILoad(0))?;
            builder.push_branch_instruction(BranchInstruction::IReturn)
        })
        .unwrap();
        assert!(matches!(code.elements[0], CodeElement::Label(_)));
        assert!(code.frames.is_empty());
    }

    #[test]
    fn appended_body_keeps_its_frames() {
        let mut body = MethodCode::new();
        let top = body.fresh_label();
        body.elements = vec![
            CodeElement::Label(top),
            CodeElement::Instruction(IInc(0, -1)),
            CodeElement::Instruction(ILoad(0)),
            CodeElement::Branch(BranchInstruction::If(OrdComparison::GT, top)),
            CodeElement::Instruction(ILoad(0)),
            CodeElement::Branch(BranchInstruction::IReturn),
        ];
        let mut locals = OffsetVec::new();
        locals.push(VerificationType::Integer);
        let entry_frame = Frame {
            locals,
            stack: OffsetVec::new(),
        };
        body.frames.insert(top, entry_frame.clone());
        body.max_stack = 1;

        let code = with_builder(true, int_to_int(), |builder| {
            builder.push_instruction(IConst5)?;
            builder.push_instruction(IStore(1))?;
            builder.truncate_locals(1);
            builder.append_body(&body, &entry_frame)
        })
        .unwrap();

        assert_eq!(code.max_locals, 2);
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.elements.len(), 9);
        assert!(code
            .frames
            .values()
            .all(|frame| frame.locals.len() == 1 && frame.stack.is_empty()));
        assert!(!code.frames.is_empty());
    }
}
