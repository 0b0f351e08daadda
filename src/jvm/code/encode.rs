use crate::jvm::class_file::{
    self, BytecodeArray, BytecodeIndex, ClassConstantIndex, ConstantIndex, ConstantsPool,
    ConstantsWriter, ExceptionHandler, LineNumber, LineNumberTable, LocalVariable,
    LocalVariableTable, LocalVariableTypeTable, Serialize, StackMapTable,
};
use crate::jvm::code::jump_encoding::{self, Layout};
use crate::jvm::code::{
    BranchInstruction, CodeContext, CodeElement, Element, MethodCode, SerializableInstruction,
    SynLabel,
};
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::names::Name;
use crate::jvm::verifier::{CodeFrame, SerializedFrame};
use crate::jvm::Error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::TryFrom;

impl MethodCode {
    /// Serialize the method body back into a `Code` attribute
    ///
    /// Symbolic operands get added to the constants pool, oversized jumps are rewritten, and
    /// frames get delta-compressed into a `StackMapTable` (only for class file versions that use
    /// them).
    pub fn encode(
        &self,
        constants_pool: &mut ConstantsPool,
        context: &CodeContext,
    ) -> Result<class_file::Code, Error> {
        let uses_frames = context.version.uses_stack_map_frames();
        if uses_frames {
            for target in self.jump_targets() {
                if !self.frames.contains_key(&target) {
                    return Err(Error::MissingFrame(target));
                }
            }
        }

        // Stack and locals
        let max_stack = self.max_stack_depth()?.max(self.max_stack);
        let max_locals = self
            .locals_used()
            .max(context.implicit_frame().locals.offset_len().0);
        let max_stack: u16 =
            u16::try_from(max_stack).map_err(|_| Error::MethodCodeMaxStackOverflow(max_stack))?;
        let max_locals: u16 = u16::try_from(max_locals)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(max_locals))?;

        // Resolve operands into the constant pool
        let mut elements = self.resolve_elements(constants_pool)?;

        // Check and rewrite oversized jumps
        let mut frames = self.frames.clone();
        let mut label_generator = self.label_generator.clone();
        let layout = jump_encoding::widen_oversized_jumps(
            &mut elements,
            &mut frames,
            &mut label_generator,
            &jump_encoding::SIGNED_16BIT_JUMP_RANGE,
        )?;
        if layout.code_len > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(layout.code_len));
        }

        // Code array
        let mut code_array = BytecodeArray(Vec::with_capacity(layout.code_len));
        for (element, offset) in elements.iter().zip(&layout.element_offsets) {
            match element {
                Element::Label(_) => (),
                Element::Instruction(insn) => insn.serialize(&mut code_array.0)?,
                Element::Branch(branch) => {
                    let from = *offset as i64;
                    let encoded: BranchInstruction<i16, i32> = branch.try_map_labels(
                        |lbl| {
                            let to = layout.label_offset(*lbl)?;
                            i16::try_from(to as i64 - from)
                                .map_err(|_| Error::UnencodableJump { from: *offset, to })
                        },
                        |lbl| {
                            let to = layout.label_offset(*lbl)?;
                            i32::try_from(to as i64 - from)
                                .map_err(|_| Error::UnencodableJump { from: *offset, to })
                        },
                    )?;
                    encoded.serialize(&mut code_array.0)?;
                }
            }
        }

        // Exception table
        let mut exception_table = vec![];
        for block in &self.exception_handlers {
            let start_pc = layout.label_offset(block.start)?;
            let end_pc = layout.label_offset(block.end)?;
            if start_pc >= end_pc {
                continue;
            }
            let catch_type = match &block.catch_type {
                None => ClassConstantIndex(ConstantIndex::ZERO),
                Some(class) => class.constant_index(constants_pool)?,
            };
            exception_table.push(ExceptionHandler {
                start_pc: BytecodeIndex(start_pc as u16),
                end_pc: BytecodeIndex(end_pc as u16),
                handler_pc: BytecodeIndex(layout.label_offset(block.handler)? as u16),
                catch_type,
            });
        }

        let mut attributes = vec![];

        // Add `StackMapTable` attribute only if there are frames
        if uses_frames {
            let stack_map_frames =
                encode_frames(&frames, &layout, constants_pool, &context.implicit_frame())?;
            if !stack_map_frames.is_empty() {
                let stack_map_table = StackMapTable(stack_map_frames);
                attributes.push(constants_pool.get_attribute(stack_map_table)?);
            }
        }

        // Debug tables
        let placed = |lbl: &SynLabel| layout.label_offsets.get(lbl).copied();
        let line_numbers: Vec<LineNumber> = self
            .line_numbers
            .iter()
            .filter_map(|entry| {
                let start = placed(&entry.start).filter(|start| *start < layout.code_len)?;
                Some(LineNumber {
                    start_pc: BytecodeIndex(start as u16),
                    line_number: entry.line,
                })
            })
            .collect();
        if !line_numbers.is_empty() {
            attributes.push(constants_pool.get_attribute(LineNumberTable(line_numbers))?);
        }

        let mut local_variables = vec![];
        for entry in &self.local_variables {
            if let (Some(start), Some(end)) = (placed(&entry.start), placed(&entry.end)) {
                if start <= end {
                    local_variables.push(LocalVariable {
                        start_pc: BytecodeIndex(start as u16),
                        length: (end - start) as u16,
                        name: constants_pool.get_utf8(entry.name.as_str())?,
                        descriptor: constants_pool.get_utf8(entry.descriptor.render())?,
                        index: entry.index,
                    });
                }
            }
        }
        if !local_variables.is_empty() {
            attributes.push(constants_pool.get_attribute(LocalVariableTable(local_variables))?);
        }

        let mut local_variable_types = vec![];
        for entry in &self.local_variable_types {
            if let (Some(start), Some(end)) = (placed(&entry.start), placed(&entry.end)) {
                if start <= end {
                    local_variable_types.push(LocalVariable {
                        start_pc: BytecodeIndex(start as u16),
                        length: (end - start) as u16,
                        name: constants_pool.get_utf8(entry.name.as_str())?,
                        descriptor: constants_pool.get_utf8(entry.signature.as_str())?,
                        index: entry.index,
                    });
                }
            }
        }
        if !local_variable_types.is_empty() {
            attributes.push(
                constants_pool.get_attribute(LocalVariableTypeTable(local_variable_types))?,
            );
        }

        Ok(class_file::Code {
            max_stack,
            max_locals,
            code_array,
            exception_table,
            attributes,
        })
    }

    /// Resolve every symbolic operand into an index in the constants pool
    ///
    /// This is also the first point at which the width of every instruction is known.
    fn resolve_elements(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<Vec<Element<SerializableInstruction>>, Error> {
        let constants = &RefCell::new(constants);
        let mut resolved = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            resolved.push(match element {
                CodeElement::Label(label) => Element::Label(*label),
                CodeElement::Branch(branch) => Element::Branch(branch.clone()),
                CodeElement::Instruction(insn) => Element::Instruction(insn.map(
                    |class| class.constant_index(&mut constants.borrow_mut()),
                    |constant| constant.constant_index(&mut constants.borrow_mut()),
                    |field| field.constant_index(&mut constants.borrow_mut()),
                    |_, method| method.constant_index(&mut constants.borrow_mut()),
                    |call_site| call_site.constant_index(&mut constants.borrow_mut()),
                )?),
            });
        }
        Ok(resolved)
    }

    /// Maximum operand stack depth reached along any path through the body
    ///
    /// Depths flow forward from the method entry (empty stack), from exception handlers (just
    /// the exception), and from every label with a frame. Reaching the same element with two
    /// different depths is an error.
    pub fn max_stack_depth(&self) -> Result<usize, Error> {
        let mut label_indices: HashMap<SynLabel, usize> = HashMap::new();
        for (idx, element) in self.elements.iter().enumerate() {
            if let CodeElement::Label(label) = element {
                label_indices.insert(*label, idx);
            }
        }
        let index_of = |label: &SynLabel| {
            label_indices
                .get(label)
                .copied()
                .ok_or(Error::UnplacedLabel(*label))
        };

        let mut worklist: Vec<(usize, usize)> = vec![(0, 0)];
        for block in &self.exception_handlers {
            worklist.push((index_of(&block.handler)?, 1));
        }
        for (label, frame) in &self.frames {
            if let Some(idx) = label_indices.get(label) {
                worklist.push((*idx, frame.stack.offset_len().0));
            }
        }

        // Every element is entered with exactly one stack depth
        let mut depths: HashMap<usize, usize> = HashMap::new();
        let mut max_depth = 0;
        while let Some((start, start_depth)) = worklist.pop() {
            let mut depth = start_depth;
            let mut idx = start;
            while idx < self.elements.len() {
                match depths.insert(idx, depth) {
                    Some(seen) if seen == depth => break,
                    Some(seen) => {
                        return Err(Error::InconsistentStackDepth {
                            index: idx,
                            expected: seen,
                            found: depth,
                        })
                    }
                    None => (),
                }
                max_depth = max_depth.max(depth);
                match &self.elements[idx] {
                    CodeElement::Label(_) => (),
                    CodeElement::Instruction(insn) => {
                        let (pops, pushes) = insn.stack_effect();
                        depth = depth.saturating_sub(pops) + pushes;
                        max_depth = max_depth.max(depth);
                    }
                    CodeElement::Branch(branch) => {
                        depth = depth.saturating_sub(branch.stack_pops());
                        for target in branch.jump_targets().targets() {
                            worklist.push((index_of(target)?, depth));
                        }
                        if !branch.falls_through() {
                            break;
                        }
                    }
                }
                idx += 1;
            }
        }
        Ok(max_depth)
    }
}

/// Delta-compress the frames of all placed labels into stack map frames
fn encode_frames(
    frames: &HashMap<SynLabel, CodeFrame>,
    layout: &Layout,
    constants_pool: &mut ConstantsPool,
    implicit_frame: &CodeFrame,
) -> Result<Vec<class_file::StackMapFrame>, Error> {
    let constants_pool = &RefCell::new(constants_pool);
    let mut serialize_frame = |frame: &CodeFrame| -> Result<SerializedFrame, Error> {
        frame.try_map(
            |class| -> Result<ClassConstantIndex, Error> {
                Ok(class.constant_index(&mut constants_pool.borrow_mut())?)
            },
            |label| -> Result<u16, Error> { Ok(layout.label_offset(*label)? as u16) },
        )
    };

    let mut placed_frames: Vec<(usize, SerializedFrame)> = vec![];
    for (label, frame) in frames {
        if let Some(offset) = layout.label_offsets.get(label) {
            if *offset < layout.code_len {
                placed_frames.push((*offset, serialize_frame(frame)?));
            }
        }
    }
    placed_frames.sort_by_key(|(offset, _)| *offset);

    let mut previous_frame = serialize_frame(implicit_frame)?;
    let mut previous_offset: Option<usize> = None;
    let mut stack_map_frames = vec![];
    for (offset, frame) in placed_frames {
        let offset_delta = match previous_offset {
            None => offset,
            Some(previous_offset) if previous_offset == offset => {
                if frame != previous_frame {
                    return Err(Error::ConflictingFrames(offset));
                }
                continue;
            }
            Some(previous_offset) => offset - previous_offset - 1,
        };
        stack_map_frames.push(frame.stack_map_frame(offset_delta as u16, &previous_frame));
        previous_frame = frame;
        previous_offset = Some(offset);
    }
    Ok(stack_map_frames)
}
