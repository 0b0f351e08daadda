use crate::jvm::class_file::{
    self, ClassConstantIndex, ConstantIndex, ConstantPool, LineNumberTable, LocalVariableTable,
    LocalVariableTypeTable, Parse, StackMapTable,
};
use crate::jvm::code::{
    array_type_from_code, BranchInstruction, CodeContext, CodeElement, CompareMode, EqComparison,
    Instruction, InvokeType, LabelGenerator, LineNumberEntry, LocalVariableEntry,
    LocalVariableTypeEntry, MethodCode, OrdComparison, ShiftType, SymbolicInstruction, SynLabel,
    SynLabelGenerator, TryCatchBlock,
};
use crate::jvm::Error;
use byteorder::ReadBytesExt;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

/// Labels handed out for byte offsets in the code array
struct OffsetLabels {
    labels: HashMap<usize, SynLabel>,
    generator: SynLabelGenerator,
}

impl OffsetLabels {
    fn at(&mut self, offset: usize) -> SynLabel {
        let generator = &mut self.generator;
        *self
            .labels
            .entry(offset)
            .or_insert_with(|| generator.fresh_label())
    }

    /// Label for a jump relative to an instruction
    fn relative(&mut self, from: usize, delta: i64, code_len: usize) -> Result<SynLabel, Error> {
        let target = from as i64 + delta;
        if target < 0 || target >= code_len as i64 {
            return Err(Error::MalformedClassFile(format!(
                "Jump from {} lands outside the code array at {}",
                from, target
            )));
        }
        Ok(self.at(target as usize))
    }
}

impl MethodCode {
    /// Decode a `Code` attribute into a method body
    ///
    /// Every byte offset mentioned by a branch, the exception table, the stack map frames or the
    /// debug tables turns into a label placed right before the instruction at that offset.
    pub fn decode(
        code: &class_file::Code,
        constants: &ConstantPool,
        context: &CodeContext,
    ) -> Result<MethodCode, Error> {
        let bytes = &code.code_array.0;
        let mut labels = OffsetLabels {
            labels: HashMap::new(),
            generator: SynLabelGenerator::default(),
        };

        // Instructions
        let mut decoded: Vec<(usize, CodeElement)> = vec![];
        let mut reader = Cursor::new(bytes.as_slice());
        while (reader.position() as usize) < bytes.len() {
            let offset = reader.position() as usize;
            let element = decode_element(&mut reader, offset, bytes.len(), constants, &mut labels)?;
            decoded.push((offset, element));
        }

        // Exception table
        let mut exception_handlers = vec![];
        for handler in &code.exception_table {
            let catch_type = if handler.catch_type == ClassConstantIndex(ConstantIndex::ZERO) {
                None
            } else {
                Some(constants.get_class_name(handler.catch_type)?)
            };
            exception_handlers.push(TryCatchBlock {
                start: labels.at(handler.start_pc.0 as usize),
                end: labels.at(handler.end_pc.0 as usize),
                handler: labels.at(handler.handler_pc.0 as usize),
                catch_type,
            });
        }

        // Attributes of the code
        let mut frames = HashMap::new();
        let mut line_numbers = vec![];
        let mut local_variables = vec![];
        let mut local_variable_types = vec![];
        for attribute in &code.attributes {
            match constants.get_utf8(attribute.name_index)? {
                "StackMapTable" => {
                    let table: StackMapTable = attribute.decode()?;
                    let mut previous = context.implicit_frame();
                    let mut previous_offset: Option<usize> = None;
                    for stack_map_frame in &table.0 {
                        let delta = stack_map_frame.offset_delta() as usize;
                        let offset = match previous_offset {
                            None => delta,
                            Some(previous_offset) => previous_offset + delta + 1,
                        };
                        let frame = previous.following(stack_map_frame, |vtype| {
                            vtype.try_map(
                                |cls| constants.get_class(*cls),
                                |new_offset| Ok(labels.at(*new_offset as usize)),
                            )
                        })?;
                        frames.insert(labels.at(offset), frame.clone());
                        previous = frame;
                        previous_offset = Some(offset);
                    }
                }
                "LineNumberTable" => {
                    let table: LineNumberTable = attribute.decode()?;
                    for entry in table.0 {
                        line_numbers.push(LineNumberEntry {
                            start: labels.at(entry.start_pc.0 as usize),
                            line: entry.line_number,
                        });
                    }
                }
                "LocalVariableTable" => {
                    let table: LocalVariableTable = attribute.decode()?;
                    for entry in table.0 {
                        let start = entry.start_pc.0 as usize;
                        local_variables.push(LocalVariableEntry {
                            start: labels.at(start),
                            end: labels.at(start + entry.length as usize),
                            name: constants.get_unqualified_name(entry.name)?,
                            descriptor: constants.get_field_type(entry.descriptor)?,
                            index: entry.index,
                        });
                    }
                }
                "LocalVariableTypeTable" => {
                    let table: LocalVariableTypeTable = attribute.decode()?;
                    for entry in table.0 {
                        let start = entry.start_pc.0 as usize;
                        local_variable_types.push(LocalVariableTypeEntry {
                            start: labels.at(start),
                            end: labels.at(start + entry.length as usize),
                            name: constants.get_unqualified_name(entry.name)?,
                            signature: constants.get_utf8(entry.descriptor)?.to_owned(),
                            index: entry.index,
                        });
                    }
                }
                other => debug!("Dropping code attribute {}", other),
            }
        }

        // Every label must sit on an instruction boundary (or at the very end)
        let boundaries: HashSet<usize> = decoded
            .iter()
            .map(|(offset, _)| *offset)
            .chain(std::iter::once(bytes.len()))
            .collect();
        if let Some(offset) = labels
            .labels
            .keys()
            .find(|offset| !boundaries.contains(offset))
        {
            return Err(Error::MalformedClassFile(format!(
                "Offset {} is not the start of an instruction",
                offset
            )));
        }

        // Interleave labels with instructions
        let mut elements = Vec::with_capacity(decoded.len() + labels.labels.len());
        for (offset, element) in decoded {
            if let Some(label) = labels.labels.get(&offset) {
                elements.push(CodeElement::Label(*label));
            }
            elements.push(element);
        }
        if let Some(label) = labels.labels.get(&bytes.len()) {
            elements.push(CodeElement::Label(*label));
        }

        Ok(MethodCode {
            max_stack: code.max_stack as usize,
            max_locals: code.max_locals as usize,
            elements,
            exception_handlers,
            frames,
            line_numbers,
            local_variables,
            local_variable_types,
            label_generator: labels.generator,
        })
    }
}

/// Decode the instruction starting at `offset`
fn decode_element(
    reader: &mut Cursor<&[u8]>,
    offset: usize,
    code_len: usize,
    constants: &ConstantPool,
    labels: &mut OffsetLabels,
) -> Result<CodeElement, Error> {
    let opcode = reader.read_u8()?;

    let branch = |branch: BranchInstruction<SynLabel, SynLabel>| -> Result<CodeElement, Error> {
        Ok(CodeElement::Branch(branch))
    };
    let regular_target =
        |reader: &mut Cursor<&[u8]>, labels: &mut OffsetLabels| -> Result<SynLabel, Error> {
            let delta = i16::parse(reader)?;
            labels.relative(offset, delta as i64, code_len)
        };
    let wide_target =
        |reader: &mut Cursor<&[u8]>, labels: &mut OffsetLabels| -> Result<SynLabel, Error> {
            let delta = i32::parse(reader)?;
            labels.relative(offset, delta as i64, code_len)
        };

    let insn: SymbolicInstruction = match opcode {
            0x00 => Instruction::Nop,
            0x01 => Instruction::AConstNull,
            0x02 => Instruction::IConstM1,
            0x03 => Instruction::IConst0,
            0x04 => Instruction::IConst1,
            0x05 => Instruction::IConst2,
            0x06 => Instruction::IConst3,
            0x07 => Instruction::IConst4,
            0x08 => Instruction::IConst5,
            0x09 => Instruction::LConst0,
            0x0a => Instruction::LConst1,
            0x0b => Instruction::FConst0,
            0x0c => Instruction::FConst1,
            0x0d => Instruction::FConst2,
            0x0e => Instruction::DConst0,
            0x0f => Instruction::DConst1,
            0x2e => Instruction::IALoad,
            0x2f => Instruction::LALoad,
            0x30 => Instruction::FALoad,
            0x31 => Instruction::DALoad,
            0x32 => Instruction::AALoad,
            0x33 => Instruction::BALoad,
            0x34 => Instruction::CALoad,
            0x35 => Instruction::SALoad,
            0x4f => Instruction::IAStore,
            0x50 => Instruction::LAStore,
            0x51 => Instruction::FAStore,
            0x52 => Instruction::DAStore,
            0x53 => Instruction::AAStore,
            0x54 => Instruction::BAStore,
            0x55 => Instruction::CAStore,
            0x56 => Instruction::SAStore,
            0x57 => Instruction::Pop,
            0x58 => Instruction::Pop2,
            0x59 => Instruction::Dup,
            0x5a => Instruction::DupX1,
            0x5b => Instruction::DupX2,
            0x5c => Instruction::Dup2,
            0x5d => Instruction::Dup2X1,
            0x5e => Instruction::Dup2X2,
            0x5f => Instruction::Swap,
            0x60 => Instruction::IAdd,
            0x61 => Instruction::LAdd,
            0x62 => Instruction::FAdd,
            0x63 => Instruction::DAdd,
            0x64 => Instruction::ISub,
            0x65 => Instruction::LSub,
            0x66 => Instruction::FSub,
            0x67 => Instruction::DSub,
            0x68 => Instruction::IMul,
            0x69 => Instruction::LMul,
            0x6a => Instruction::FMul,
            0x6b => Instruction::DMul,
            0x6c => Instruction::IDiv,
            0x6d => Instruction::LDiv,
            0x6e => Instruction::FDiv,
            0x6f => Instruction::DDiv,
            0x70 => Instruction::IRem,
            0x71 => Instruction::LRem,
            0x72 => Instruction::FRem,
            0x73 => Instruction::DRem,
            0x74 => Instruction::INeg,
            0x75 => Instruction::LNeg,
            0x76 => Instruction::FNeg,
            0x77 => Instruction::DNeg,
            0x7e => Instruction::IAnd,
            0x7f => Instruction::LAnd,
            0x80 => Instruction::IOr,
            0x81 => Instruction::LOr,
            0x82 => Instruction::IXor,
            0x83 => Instruction::LXor,
            0x85 => Instruction::I2L,
            0x86 => Instruction::I2F,
            0x87 => Instruction::I2D,
            0x88 => Instruction::L2I,
            0x89 => Instruction::L2F,
            0x8a => Instruction::L2D,
            0x8b => Instruction::F2I,
            0x8c => Instruction::F2L,
            0x8d => Instruction::F2D,
            0x8e => Instruction::D2I,
            0x8f => Instruction::D2L,
            0x90 => Instruction::D2F,
            0x91 => Instruction::I2B,
            0x92 => Instruction::I2C,
            0x93 => Instruction::I2S,
            0x94 => Instruction::LCmp,
            0xbe => Instruction::ArrayLength,
            0xc2 => Instruction::MonitorEnter,
            0xc3 => Instruction::MonitorExit,
            0x10 => Instruction::BiPush(i8::parse(reader)?),
            0x11 => Instruction::SiPush(i16::parse(reader)?),
            0x12 => {
                let idx = reader.read_u8()? as u16;
                Instruction::Ldc(constants.get_constant_data(ConstantIndex(idx))?)
            }
            0x13 => Instruction::Ldc(constants.get_constant_data(ConstantIndex::parse(reader)?)?),
            0x14 => Instruction::Ldc2(constants.get_constant_data(ConstantIndex::parse(reader)?)?),
            0x15..=0x19 | 0x36..=0x3a => {
                local_variable_instruction(opcode, reader.read_u8()? as u16, offset)?
            }
            0x1a..=0x2d => {
                let idx = ((opcode - 0x1a) % 4) as u16;
                local_variable_instruction(0x15 + (opcode - 0x1a) / 4, idx, offset)?
            }
            0x3b..=0x4e => {
                let idx = ((opcode - 0x3b) % 4) as u16;
                local_variable_instruction(0x36 + (opcode - 0x3b) / 4, idx, offset)?
            }
            0x78 => Instruction::ISh(ShiftType::Left),
            0x79 => Instruction::LSh(ShiftType::Left),
            0x7a => Instruction::ISh(ShiftType::ArithmeticRight),
            0x7b => Instruction::LSh(ShiftType::ArithmeticRight),
            0x7c => Instruction::ISh(ShiftType::LogicalRight),
            0x7d => Instruction::LSh(ShiftType::LogicalRight),
            0x84 => {
                let idx = reader.read_u8()? as u16;
                let diff = i8::parse(reader)? as i16;
                Instruction::IInc(idx, diff)
            }
            0x95 => Instruction::FCmp(CompareMode::L),
            0x96 => Instruction::FCmp(CompareMode::G),
            0x97 => Instruction::DCmp(CompareMode::L),
            0x98 => Instruction::DCmp(CompareMode::G),
            0x99..=0x9e => {
                let comparison = ord_comparison(opcode - 0x99);
                return branch(BranchInstruction::If(comparison, regular_target(reader, labels)?));
            }
            0x9f..=0xa4 => {
                let comparison = ord_comparison(opcode - 0x9f);
                let target = regular_target(reader, labels)?;
                return branch(BranchInstruction::IfICmp(comparison, target));
            }
            0xa5 | 0xa6 => {
                let comparison = eq_comparison(opcode - 0xa5);
                let target = regular_target(reader, labels)?;
                return branch(BranchInstruction::IfACmp(comparison, target));
            }
            0xa7 => return branch(BranchInstruction::Goto(regular_target(reader, labels)?)),
            0xaa => {
                let padding = skip_padding(reader, offset)?;
                let default = wide_target(reader, labels)?;
                let low = i32::parse(reader)?;
                let high = i32::parse(reader)?;
                if high < low {
                    return Err(Error::MalformedClassFile(format!(
                        "tableswitch at {} has low {} above high {}",
                        offset, low, high
                    )));
                }
                let mut targets = vec![];
                for _ in low..=high {
                    targets.push(wide_target(reader, labels)?);
                }
                return branch(BranchInstruction::TableSwitch {
                    padding,
                    default,
                    low,
                    targets,
                });
            }
            0xab => {
                let padding = skip_padding(reader, offset)?;
                let default = wide_target(reader, labels)?;
                let pairs = i32::parse(reader)?;
                let mut targets = vec![];
                for _ in 0..pairs.max(0) {
                    let key = i32::parse(reader)?;
                    targets.push((key, wide_target(reader, labels)?));
                }
                return branch(BranchInstruction::LookupSwitch {
                    padding,
                    default,
                    targets,
                });
            }
            0xac => return branch(BranchInstruction::IReturn),
            0xad => return branch(BranchInstruction::LReturn),
            0xae => return branch(BranchInstruction::FReturn),
            0xaf => return branch(BranchInstruction::DReturn),
            0xb0 => return branch(BranchInstruction::AReturn),
            0xb1 => return branch(BranchInstruction::Return),
            0xb2 => Instruction::GetStatic(constants.get_field_ref(ConstantIndex::parse(reader)?)?),
            0xb3 => Instruction::PutStatic(constants.get_field_ref(ConstantIndex::parse(reader)?)?),
            0xb4 => Instruction::GetField(constants.get_field_ref(ConstantIndex::parse(reader)?)?),
            0xb5 => Instruction::PutField(constants.get_field_ref(ConstantIndex::parse(reader)?)?),
            0xb6 => {
                let method = constants.get_method_ref(ConstantIndex::parse(reader)?)?;
                Instruction::Invoke(InvokeType::Virtual, method)
            }
            0xb7 => {
                let method = constants.get_method_ref(ConstantIndex::parse(reader)?)?;
                Instruction::Invoke(InvokeType::Special, method)
            }
            0xb8 => {
                let method = constants.get_method_ref(ConstantIndex::parse(reader)?)?;
                Instruction::Invoke(InvokeType::Static, method)
            }
            0xb9 => {
                let method = constants.get_method_ref(ConstantIndex::parse(reader)?)?;
                let count = reader.read_u8()?;
                let _zero = reader.read_u8()?;
                Instruction::Invoke(InvokeType::Interface(count), method)
            }
            0xba => {
                let call_site = constants.get_call_site(ConstantIndex::parse(reader)?)?;
                let _zero = u16::parse(reader)?;
                Instruction::InvokeDynamic(call_site)
            }
            0xbb => Instruction::New(constants.get_class(ClassConstantIndex::parse(reader)?)?),
            0xbc => {
                let code = reader.read_u8()?;
                let base_type = array_type_from_code(code).ok_or_else(|| {
                    Error::MalformedClassFile(format!("Bad newarray type {} at {}", code, offset))
                })?;
                Instruction::NewArray(base_type)
            }
            0xbd => Instruction::ANewArray(constants.get_class(ClassConstantIndex::parse(reader)?)?),
            0xbf => return branch(BranchInstruction::AThrow),
            0xc0 => Instruction::CheckCast(constants.get_class(ClassConstantIndex::parse(reader)?)?),
            0xc1 => {
                Instruction::InstanceOf(constants.get_class(ClassConstantIndex::parse(reader)?)?)
            }
            0xc4 => {
                let modified = reader.read_u8()?;
                match modified {
                    0x15..=0x19 | 0x36..=0x3a => {
                        local_variable_instruction(modified, u16::parse(reader)?, offset)?
                    }
                    0x84 => {
                        let idx = u16::parse(reader)?;
                        let diff = i16::parse(reader)?;
                        Instruction::IInc(idx, diff)
                    }
                    _ => {
                        return Err(Error::UnsupportedInstruction {
                            opcode: modified,
                            offset,
                        })
                    }
                }
            }
            0xc5 => {
                let class = constants.get_class(ClassConstantIndex::parse(reader)?)?;
                let dimensions = reader.read_u8()?;
                Instruction::MultiANewArray(class, dimensions)
            }
            0xc6 | 0xc7 => {
                let comparison = eq_comparison(opcode - 0xc6);
                let target = regular_target(reader, labels)?;
                return branch(BranchInstruction::IfNull(comparison, target));
            }
            0xc8 => return branch(BranchInstruction::Goto(wide_target(reader, labels)?)),

            // `jsr`, `ret`, `jsr_w`, reserved, and unassigned opcodes
            _ => return Err(Error::UnsupportedInstruction { opcode, offset }),
    };
    Ok(CodeElement::Instruction(insn))
}

/// Build a load or store from its regular (non-short) opcode
fn local_variable_instruction(
    opcode: u8,
    idx: u16,
    offset: usize,
) -> Result<SymbolicInstruction, Error> {
    Ok(match opcode {
        0x15 => Instruction::ILoad(idx),
        0x16 => Instruction::LLoad(idx),
        0x17 => Instruction::FLoad(idx),
        0x18 => Instruction::DLoad(idx),
        0x19 => Instruction::ALoad(idx),
        0x36 => Instruction::IStore(idx),
        0x37 => Instruction::LStore(idx),
        0x38 => Instruction::FStore(idx),
        0x39 => Instruction::DStore(idx),
        0x3a => Instruction::AStore(idx),
        _ => return Err(Error::UnsupportedInstruction { opcode, offset }),
    })
}

/// Comparisons in opcode order: `eq`, `ne`, `lt`, `ge`, `gt`, `le`
fn ord_comparison(relative_opcode: u8) -> OrdComparison {
    match relative_opcode {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

fn eq_comparison(relative_opcode: u8) -> EqComparison {
    if relative_opcode == 0 {
        EqComparison::EQ
    } else {
        EqComparison::NE
    }
}

/// Skip the 0-3 bytes aligning switch operands, returning how many there were
fn skip_padding(reader: &mut Cursor<&[u8]>, opcode_offset: usize) -> Result<u8, Error> {
    let padding = ((4 - (opcode_offset + 1) % 4) % 4) as u8;
    for _ in 0..padding {
        reader.read_u8()?;
    }
    Ok(padding)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        Attribute, BytecodeArray, BytecodeIndex, ConstantsPool, ConstantsWriter, ExceptionHandler,
        StackMapFrame, Version,
    };
    use crate::jvm::descriptors::ParseDescriptor;
    use crate::jvm::names::Name;
    use crate::jvm::references::FieldRef;
    use crate::jvm::verifier::VerificationType;
    use crate::jvm::{BinaryName, FieldType, MethodDescriptor, UnqualifiedName};

    fn owner() -> BinaryName {
        BinaryName::from_string("demo/Calculator".to_owned()).unwrap()
    }

    fn context<'a>(class: &'a BinaryName, descriptor: &'a MethodDescriptor<BinaryName>) -> CodeContext<'a> {
        CodeContext {
            class,
            is_static: true,
            is_constructor: false,
            descriptor,
            version: Version::JAVA8,
        }
    }

    fn code(bytes: Vec<u8>, attributes: Vec<Attribute>) -> class_file::Code {
        class_file::Code {
            max_stack: 2,
            max_locals: 2,
            code_array: BytecodeArray(bytes),
            exception_table: vec![],
            attributes,
        }
    }

    #[test]
    fn branches_become_labels() {
        let mut pool = ConstantsPool::new();
        let table = pool
            .get_attribute(StackMapTable(vec![StackMapFrame::SameLocalsNoStack {
                offset_delta: 7,
            }]))
            .unwrap();
        let (constants, _) = pool.into_parts();
        let constants = ConstantPool::new(constants);

        // static int max(int a, int b) { return a < b ? b : a; }
        let bytes = vec![0x1a, 0x1b, 0xa1, 0x00, 0x05, 0x1a, 0xac, 0x1b, 0xac];
        let class = owner();
        let descriptor = MethodDescriptor::parse("(II)I").unwrap();
        let decoded =
            MethodCode::decode(&code(bytes, vec![table]), &constants, &context(&class, &descriptor))
                .unwrap();

        let target = match &decoded.elements[2] {
            CodeElement::Branch(BranchInstruction::IfICmp(OrdComparison::LT, target)) => *target,
            other => panic!("unexpected element {:?}", other),
        };
        assert_eq!(decoded.elements[5], CodeElement::Label(target));
        assert_eq!(
            decoded.elements[6],
            CodeElement::Instruction(Instruction::ILoad(1))
        );
        let frame = &decoded.frames[&target];
        assert_eq!(frame.locals.len(), 2);
        assert_eq!(frame.stack.len(), 0);
        assert_eq!(
            frame.locals.get(1).cloned(),
            Some(VerificationType::Integer)
        );
    }

    #[test]
    fn symbolic_operands() {
        let mut pool = ConstantsPool::new();
        let field = FieldRef {
            class: owner(),
            name: UnqualifiedName::from_string("total".to_owned()).unwrap(),
            descriptor: FieldType::long(),
        };
        let field_idx = field.constant_index(&mut pool).unwrap();
        let catch_type = BinaryName::ILLEGALARGUMENTEXCEPTION
            .constant_index(&mut pool)
            .unwrap();
        let (constants, _) = pool.into_parts();
        let constants = ConstantPool::new(constants);

        let [hi, lo] = field_idx.0 .0.to_be_bytes();
        // getstatic total; pop2; wide iload 300; pop; return; handler: athrow
        let bytes = vec![0xb2, hi, lo, 0x58, 0xc4, 0x15, 0x01, 0x2c, 0x57, 0xb1, 0xbf];
        let mut input = code(bytes, vec![]);
        input.exception_table.push(ExceptionHandler {
            start_pc: BytecodeIndex(0),
            end_pc: BytecodeIndex(9),
            handler_pc: BytecodeIndex(10),
            catch_type,
        });
        let class = owner();
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        let decoded =
            MethodCode::decode(&input, &constants, &context(&class, &descriptor)).unwrap();

        let instructions: Vec<&SymbolicInstruction> = decoded.instructions().collect();
        assert_eq!(instructions[0], &Instruction::GetStatic(field));
        assert_eq!(instructions[2], &Instruction::ILoad(300));
        assert_eq!(decoded.exception_handlers.len(), 1);
        assert_eq!(
            decoded.exception_handlers[0].catch_type,
            Some(BinaryName::ILLEGALARGUMENTEXCEPTION)
        );
    }

    #[test]
    fn subroutines_are_rejected() {
        let constants = ConstantPool::new(ConstantsPool::new().into_parts().0);
        let class = owner();
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        let result = MethodCode::decode(
            &code(vec![0xa8, 0x00, 0x03, 0xb1], vec![]),
            &constants,
            &context(&class, &descriptor),
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedInstruction {
                opcode: 0xa8,
                offset: 0
            })
        ));
    }

    #[test]
    fn jump_into_instruction_is_rejected() {
        let constants = ConstantPool::new(ConstantsPool::new().into_parts().0);
        let class = owner();
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        // goto +2 lands in the middle of the goto itself
        let result = MethodCode::decode(
            &code(vec![0xa7, 0x00, 0x02, 0xb1], vec![]),
            &constants,
            &context(&class, &descriptor),
        );
        assert!(matches!(result, Err(Error::MalformedClassFile(_))));
    }
}
