use crate::jvm::code::{BranchInstruction, Instruction, InvokeType, SymbolicInstruction, SynLabel};
use crate::jvm::references::ConstantData;
use crate::jvm::verifier::{CodeFrame, Frame, VerificationType};
use crate::jvm::{ArrayType, BaseType, BinaryName, FieldType, RefType, UnqualifiedName};
use crate::util::{Offset, OffsetVec, Width};

type VType = VerificationType<RefType<BinaryName>, SynLabel>;

/// Reason an instruction could not be applied to a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    InvalidIndex(u16),
    InvalidType,
    NotArrayType,
}

impl CodeFrame {
    /// Update the frame to reflect the effects of the given (non-branching) instruction
    ///
    /// Reference types are only checked for being references: without a class hierarchy at hand,
    /// assignability between classes is left to the JVM verifier. `new_label` must be the label
    /// placed on the instruction when it is a `new`.
    pub fn interpret_instruction(
        &mut self,
        insn: &SymbolicInstruction,
        new_label: Option<SynLabel>,
        this_class: &BinaryName,
    ) -> Result<(), VerifierErrorKind> {
        use Instruction::*;
        use VerificationType::*;

        let Frame { stack, locals } = self;

        match insn {
            Nop => (),
            AConstNull => {
                stack.push(Null);
            }
            IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
            | SiPush(_) => {
                stack.push(Integer);
            }
            LConst0 | LConst1 => {
                stack.push(Long);
            }
            FConst0 | FConst1 | FConst2 => {
                stack.push(Float);
            }
            DConst0 | DConst1 => {
                stack.push(Double);
            }
            Ldc(constant) | Ldc2(constant) => {
                let is_wide_insn = matches!(insn, Ldc2(_));
                if constant.is_wide() != is_wide_insn {
                    return Err(VerifierErrorKind::InvalidWidth(if is_wide_insn { 1 } else { 2 }));
                }
                stack.push(constant_type(constant));
            }

            ILoad(idx) => load(stack, locals, *idx, Some(Integer))?,
            LLoad(idx) => load(stack, locals, *idx, Some(Long))?,
            FLoad(idx) => load(stack, locals, *idx, Some(Float))?,
            DLoad(idx) => load(stack, locals, *idx, Some(Double))?,
            ALoad(idx) => load(stack, locals, *idx, None)?,

            IALoad | BALoad | CALoad | SALoad => array_load(stack, Integer)?,
            LALoad => array_load(stack, Long)?,
            FALoad => array_load(stack, Float)?,
            DALoad => array_load(stack, Double)?,
            AALoad => {
                pop_expecting_type(stack, Integer)?;
                let element = match pop(stack)? {
                    Null => Null,
                    Object(RefType::ObjectArray(arr)) => Object(array_element(arr)),
                    Object(RefType::PrimitiveArray(arr)) if arr.additional_dimensions > 0 => {
                        Object(RefType::PrimitiveArray(ArrayType {
                            additional_dimensions: arr.additional_dimensions - 1,
                            element_type: arr.element_type,
                        }))
                    }
                    _ => return Err(VerifierErrorKind::NotArrayType),
                };
                stack.push(element);
            }

            IStore(idx) => store(stack, locals, *idx, Some(Integer))?,
            LStore(idx) => store(stack, locals, *idx, Some(Long))?,
            FStore(idx) => store(stack, locals, *idx, Some(Float))?,
            DStore(idx) => store(stack, locals, *idx, Some(Double))?,
            AStore(idx) => store(stack, locals, *idx, None)?,

            IAStore | BAStore | CAStore | SAStore => array_store(stack, Some(Integer))?,
            LAStore => array_store(stack, Some(Long))?,
            FAStore => array_store(stack, Some(Float))?,
            DAStore => array_store(stack, Some(Double))?,
            AAStore => array_store(stack, None)?,

            Pop => {
                pop_expecting_width(stack, 1)?;
            }
            Pop2 => {
                if pop(stack)?.width() == 1 {
                    pop_expecting_width(stack, 1)?;
                }
            }
            Dup => {
                let arg1 = pop_expecting_width(stack, 1)?;
                stack.push(arg1.clone());
                stack.push(arg1);
            }
            DupX1 => {
                let arg1 = pop_expecting_width(stack, 1)?;
                let arg2 = pop_expecting_width(stack, 1)?;
                stack.push(arg1.clone());
                stack.push(arg2);
                stack.push(arg1);
            }
            DupX2 => {
                let arg1 = pop_expecting_width(stack, 1)?;
                let mut below = vec![pop(stack)?];
                if below[0].width() == 1 {
                    below.push(pop_expecting_width(stack, 1)?);
                }
                stack.push(arg1.clone());
                push_all(stack, below);
                stack.push(arg1);
            }
            Dup2 => {
                let top = pop_slots(stack, 2)?;
                push_all(stack, top.clone());
                push_all(stack, top);
            }
            Dup2X1 => {
                let top = pop_slots(stack, 2)?;
                let arg = pop_expecting_width(stack, 1)?;
                push_all(stack, top.clone());
                stack.push(arg);
                push_all(stack, top);
            }
            Dup2X2 => {
                let top = pop_slots(stack, 2)?;
                let below = pop_slots(stack, 2)?;
                push_all(stack, top.clone());
                push_all(stack, below);
                push_all(stack, top);
            }
            Swap => {
                let arg1 = pop_expecting_width(stack, 1)?;
                let arg2 = pop_expecting_width(stack, 1)?;
                stack.push(arg1);
                stack.push(arg2);
            }

            IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | ISh(_) => {
                binary(stack, Integer, Integer)?
            }
            LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => binary(stack, Long, Long)?,
            FAdd | FSub | FMul | FDiv | FRem => binary(stack, Float, Float)?,
            DAdd | DSub | DMul | DDiv | DRem => binary(stack, Double, Double)?,
            LSh(_) => {
                pop_expecting_type(stack, Integer)?;
                pop_expecting_type(stack, Long)?;
                stack.push(Long);
            }
            INeg | I2B | I2C | I2S => unary(stack, Integer, Integer)?,
            LNeg => unary(stack, Long, Long)?,
            FNeg => unary(stack, Float, Float)?,
            DNeg => unary(stack, Double, Double)?,
            IInc(idx, _) => {
                expect_local(locals, *idx, Some(&Integer))?;
            }
            I2L => unary(stack, Integer, Long)?,
            I2F => unary(stack, Integer, Float)?,
            I2D => unary(stack, Integer, Double)?,
            L2I => unary(stack, Long, Integer)?,
            L2F => unary(stack, Long, Float)?,
            L2D => unary(stack, Long, Double)?,
            F2I => unary(stack, Float, Integer)?,
            F2L => unary(stack, Float, Long)?,
            F2D => unary(stack, Float, Double)?,
            D2I => unary(stack, Double, Integer)?,
            D2L => unary(stack, Double, Long)?,
            D2F => unary(stack, Double, Float)?,
            LCmp => binary(stack, Long, Integer)?,
            FCmp(_) => binary(stack, Float, Integer)?,
            DCmp(_) => binary(stack, Double, Integer)?,

            GetStatic(field) => {
                stack.push(VType::from(field.descriptor.clone()));
            }
            PutStatic(field) => {
                pop_assignable(stack, &field.descriptor)?;
            }
            GetField(field) => {
                pop_reference(stack)?;
                stack.push(VType::from(field.descriptor.clone()));
            }
            PutField(field) => {
                pop_assignable(stack, &field.descriptor)?;
                pop_reference(stack)?;
            }

            Invoke(invoke_type, method) => {
                for parameter in method.descriptor.parameters.iter().rev() {
                    pop_assignable(stack, parameter)?;
                }
                let is_init = method.name == UnqualifiedName::INIT;
                if let (InvokeType::Special, true) = (invoke_type, is_init) {
                    // Initialize
                    let receiver = pop(stack)?;
                    let initialized = match &receiver {
                        UninitializedThis => Object(RefType::Object(this_class.clone())),
                        Uninitialized(_) => Object(method.class.clone()),
                        _ => return Err(VerifierErrorKind::InvalidType),
                    };
                    replace_all(stack, &receiver, &initialized);
                    replace_all(locals, &receiver, &initialized);
                } else {
                    if *invoke_type != InvokeType::Static {
                        pop_reference(stack)?;
                    }
                    if let Some(return_type) = &method.descriptor.return_type {
                        stack.push(VType::from(return_type.clone()));
                    }
                }
            }
            InvokeDynamic(call_site) => {
                for parameter in call_site.descriptor.parameters.iter().rev() {
                    pop_assignable(stack, parameter)?;
                }
                if let Some(return_type) = &call_site.descriptor.return_type {
                    stack.push(VType::from(return_type.clone()));
                }
            }

            New(ref_type) => {
                if !matches!(ref_type, RefType::Object(_)) {
                    return Err(VerifierErrorKind::InvalidType);
                }
                let label = new_label.ok_or(VerifierErrorKind::InvalidType)?;
                stack.push(Uninitialized(label));
            }
            NewArray(base_type) => {
                pop_expecting_type(stack, Integer)?;
                stack.push(Object(RefType::array(FieldType::Base(*base_type))));
            }
            ANewArray(ref_type) => {
                pop_expecting_type(stack, Integer)?;
                stack.push(Object(RefType::array(FieldType::Ref(ref_type.clone()))));
            }
            ArrayLength => {
                match pop(stack)? {
                    Null | Object(RefType::PrimitiveArray(_) | RefType::ObjectArray(_)) => (),
                    _ => return Err(VerifierErrorKind::NotArrayType),
                }
                stack.push(Integer);
            }
            CheckCast(ref_type) => {
                pop_reference(stack)?;
                stack.push(Object(ref_type.clone()));
            }
            InstanceOf(_) => {
                pop_reference(stack)?;
                stack.push(Integer);
            }
            MonitorEnter | MonitorExit => {
                pop_reference(stack)?;
            }
            MultiANewArray(ref_type, dimensions) => {
                for _ in 0..*dimensions {
                    pop_expecting_type(stack, Integer)?;
                }
                stack.push(Object(ref_type.clone()));
            }
        }

        Ok(())
    }

    /// Update the frame to reflect the effects of the given branching instruction
    ///
    /// The resulting frame is what jump targets (and the fallthrough, if any) observe.
    pub fn interpret_branch(
        &mut self,
        insn: &BranchInstruction<SynLabel, SynLabel>,
        return_type: &Option<FieldType<BinaryName>>,
    ) -> Result<(), VerifierErrorKind> {
        use BranchInstruction::*;
        use VerificationType::*;

        let stack = &mut self.stack;
        match insn {
            If(_, _) | TableSwitch { .. } | LookupSwitch { .. } => {
                pop_expecting_type(stack, Integer)?
            }
            IfICmp(_, _) => {
                pop_expecting_type(stack, Integer)?;
                pop_expecting_type(stack, Integer)?;
            }
            IfACmp(_, _) => {
                pop_reference(stack)?;
                pop_reference(stack)?;
            }
            IfNull(_, _) => pop_reference(stack)?,
            Goto(_) | GotoW(_) => (),
            IReturn | LReturn | FReturn | DReturn | AReturn => {
                let expected = return_type.as_ref().ok_or(VerifierErrorKind::InvalidType)?;
                let returned = pop(stack)?;
                let matches_kind = match (insn, VType::from(expected.clone())) {
                    (AReturn, expected) => returned.is_reference() && expected.is_reference(),
                    (_, expected) => returned == expected,
                };
                if !matches_kind || return_instruction_for(expected) != *insn {
                    return Err(VerifierErrorKind::InvalidType);
                }
            }
            Return => {
                if return_type.is_some() {
                    return Err(VerifierErrorKind::InvalidType);
                }
            }
            AThrow => {
                let thrown = pop(stack)?;
                if !thrown.is_reference() {
                    return Err(VerifierErrorKind::InvalidType);
                }
                stack.clear();
                stack.push(thrown);
            }
        }
        Ok(())
    }

    /// Type of the local starting at a given slot
    pub fn local(&self, idx: u16) -> Option<&VType> {
        self.locals.get_offset(Offset(idx as usize))
    }

    /// Overwrite the local starting at `idx`, padding with `Top` and invalidating any
    /// `long`/`double` that gets partially overwritten
    pub fn set_local(&mut self, idx: u16, vtype: VType) {
        set_local(&mut self.locals, idx, vtype)
    }
}

/// Return instruction matching a return type
pub fn return_instruction_for(
    return_type: &FieldType<BinaryName>,
) -> BranchInstruction<SynLabel, SynLabel> {
    match return_type {
        FieldType::Base(BaseType::Long) => BranchInstruction::LReturn,
        FieldType::Base(BaseType::Float) => BranchInstruction::FReturn,
        FieldType::Base(BaseType::Double) => BranchInstruction::DReturn,
        FieldType::Base(_) => BranchInstruction::IReturn,
        FieldType::Ref(_) => BranchInstruction::AReturn,
    }
}

fn constant_type(constant: &ConstantData) -> VType {
    let object = |name: BinaryName| VerificationType::Object(RefType::Object(name));
    match constant {
        ConstantData::String(_) => object(BinaryName::STRING),
        ConstantData::Class(_) => object(BinaryName::CLASS),
        ConstantData::Integer(_) => VerificationType::Integer,
        ConstantData::Float(_) => VerificationType::Float,
        ConstantData::Long(_) => VerificationType::Long,
        ConstantData::Double(_) => VerificationType::Double,
        ConstantData::MethodHandle(_) => object(BinaryName::METHODHANDLE),
        ConstantData::MethodType(_) => object(BinaryName::METHODTYPE),
        ConstantData::Dynamic(dynamic) => VType::from(dynamic.descriptor.clone()),
    }
}

fn array_element(arr: ArrayType<BinaryName>) -> RefType<BinaryName> {
    if arr.additional_dimensions == 0 {
        RefType::Object(arr.element_type)
    } else {
        RefType::ObjectArray(ArrayType {
            additional_dimensions: arr.additional_dimensions - 1,
            element_type: arr.element_type,
        })
    }
}

fn pop(stack: &mut OffsetVec<VType>) -> Result<VType, VerifierErrorKind> {
    stack
        .pop()
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_expecting_width(
    stack: &mut OffsetVec<VType>,
    expected_width: usize,
) -> Result<VType, VerifierErrorKind> {
    let typ = pop(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

fn pop_expecting_type(
    stack: &mut OffsetVec<VType>,
    expected_type: VType,
) -> Result<(), VerifierErrorKind> {
    if pop(stack)? == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

fn pop_reference(stack: &mut OffsetVec<VType>) -> Result<(), VerifierErrorKind> {
    if pop(stack)?.is_reference() {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

/// Pop a value which must be usable where the field type is expected
fn pop_assignable(
    stack: &mut OffsetVec<VType>,
    expected: &FieldType<BinaryName>,
) -> Result<(), VerifierErrorKind> {
    match expected {
        FieldType::Ref(_) => pop_reference(stack),
        FieldType::Base(_) => pop_expecting_type(stack, VType::from(expected.clone())),
    }
}

/// Pop entries covering exactly `slots` slots (in push order)
fn pop_slots(stack: &mut OffsetVec<VType>, slots: usize) -> Result<Vec<VType>, VerifierErrorKind> {
    let mut popped = vec![];
    let mut covered = 0;
    while covered < slots {
        let typ = pop(stack)?;
        covered += typ.width();
        popped.push(typ);
    }
    if covered != slots {
        return Err(VerifierErrorKind::InvalidWidth(covered));
    }
    popped.reverse();
    Ok(popped)
}

fn push_all(stack: &mut OffsetVec<VType>, types: Vec<VType>) {
    for typ in types {
        stack.push(typ);
    }
}

fn unary(stack: &mut OffsetVec<VType>, arg: VType, result: VType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, arg)?;
    stack.push(result);
    Ok(())
}

fn binary(stack: &mut OffsetVec<VType>, arg: VType, result: VType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, arg.clone())?;
    pop_expecting_type(stack, arg)?;
    stack.push(result);
    Ok(())
}

fn array_load(stack: &mut OffsetVec<VType>, element: VType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, VerificationType::Integer)?;
    pop_reference(stack)?;
    stack.push(element);
    Ok(())
}

fn array_store(
    stack: &mut OffsetVec<VType>,
    element: Option<VType>,
) -> Result<(), VerifierErrorKind> {
    match element {
        Some(element) => pop_expecting_type(stack, element)?,
        None => pop_reference(stack)?,
    }
    pop_expecting_type(stack, VerificationType::Integer)?;
    pop_reference(stack)
}

fn expect_local<'a>(
    locals: &'a OffsetVec<VType>,
    idx: u16,
    expected: Option<&VType>,
) -> Result<&'a VType, VerifierErrorKind> {
    let found = locals
        .get_offset(Offset(idx as usize))
        .ok_or(VerifierErrorKind::InvalidIndex(idx))?;
    let is_expected = match expected {
        Some(expected) => found == expected,
        None => found.is_reference(),
    };
    if is_expected {
        Ok(found)
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

fn load(
    stack: &mut OffsetVec<VType>,
    locals: &OffsetVec<VType>,
    idx: u16,
    expected: Option<VType>,
) -> Result<(), VerifierErrorKind> {
    let found = expect_local(locals, idx, expected.as_ref())?.clone();
    stack.push(found);
    Ok(())
}

fn store(
    stack: &mut OffsetVec<VType>,
    locals: &mut OffsetVec<VType>,
    idx: u16,
    expected: Option<VType>,
) -> Result<(), VerifierErrorKind> {
    let value = pop(stack)?;
    let is_expected = match &expected {
        Some(expected) => value == *expected,
        None => value.is_reference(),
    };
    if !is_expected {
        return Err(VerifierErrorKind::InvalidType);
    }
    set_local(locals, idx, value);
    Ok(())
}

fn set_local(locals: &mut OffsetVec<VType>, idx: u16, vtype: VType) {
    // One entry per slot, `None` for the second half of a wide value
    let mut slots: Vec<Option<VType>> = vec![];
    for local in locals.iter() {
        let is_wide = local.width() == 2;
        slots.push(Some(local.clone()));
        if is_wide {
            slots.push(None);
        }
    }

    let idx = idx as usize;
    let width = vtype.width();
    while slots.len() < idx + width {
        slots.push(Some(VerificationType::Top));
    }
    if idx > 0 && slots[idx].is_none() {
        slots[idx - 1] = Some(VerificationType::Top);
    }
    let after = idx + width;
    if after < slots.len() && slots[after].is_none() {
        slots[after] = Some(VerificationType::Top);
    }
    slots[idx] = Some(vtype);
    if width == 2 {
        slots[idx + 1] = None;
    }

    *locals = slots.into_iter().flatten().collect();
}

fn replace_all(offset_vec: &mut OffsetVec<VType>, original: &VType, updated: &VType) {
    *offset_vec = offset_vec
        .iter()
        .map(|typ| (if typ == original { updated } else { typ }).clone())
        .collect();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{LabelGenerator, SynLabelGenerator};
    use crate::jvm::descriptors::ParseDescriptor;
    use crate::jvm::names::Name;
    use crate::jvm::references::MethodRef;
    use crate::jvm::MethodDescriptor;
    use VerificationType::*;

    fn new_frame<const N: usize, const M: usize>(locals: [VType; N], stack: [VType; M]) -> CodeFrame {
        CodeFrame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    fn this_class() -> BinaryName {
        BinaryName::from_string("demo/Shape".to_owned()).unwrap()
    }

    #[test]
    fn arithmetic() {
        let binops = [
            (Integer, vec![Instruction::IAdd, Instruction::ISub, Instruction::IXor]),
            (Long, vec![Instruction::LAdd, Instruction::LMul]),
            (Float, vec![Instruction::FAdd, Instruction::FRem]),
            (Double, vec![Instruction::DAdd, Instruction::DDiv]),
        ];

        for (good_typ, instructions) in binops {
            for instruction in instructions {
                for typ in [Integer, Long, Float, Double, Null] {
                    let mut frame_in = new_frame([], [typ.clone(), typ.clone()]);
                    let result = frame_in.interpret_instruction(&instruction, None, &this_class());
                    if typ == good_typ {
                        assert_eq!(result, Ok(()), "interpreting {:?}", instruction);
                        assert_eq!(frame_in, new_frame([], [typ]));
                    } else {
                        assert_eq!(result, Err(VerifierErrorKind::InvalidType));
                    }
                }

                let mut frame_in = new_frame([], [good_typ.clone()]);
                assert_eq!(
                    frame_in.interpret_instruction(&instruction, None, &this_class()),
                    Err(VerifierErrorKind::EmptyStack)
                );
            }
        }
    }

    #[test]
    fn stores_split_wide_locals() {
        let mut frame = new_frame([Integer, Long], []);
        frame.set_local(2, Float);
        assert_eq!(frame, new_frame([Integer, Top, Float], []));

        let mut frame = new_frame([Integer], []);
        frame.set_local(3, Double);
        assert_eq!(frame.locals.offset_len().0, 5);
        assert_eq!(frame.local(3), Some(&Double));
        assert_eq!(frame.local(1), Some(&Top));
    }

    #[test]
    fn constructor_initializes_every_copy() {
        let mut generator = SynLabelGenerator::default();
        let new_label = generator.fresh_label();
        let point = BinaryName::from_string("demo/Point".to_owned()).unwrap();
        let init = MethodRef::new(
            point.clone(),
            UnqualifiedName::INIT,
            MethodDescriptor::parse("(I)V").unwrap(),
        );

        let mut frame = new_frame([], []);
        let insns: Vec<SymbolicInstruction> = vec![
            Instruction::New(RefType::Object(point.clone())),
            Instruction::Dup,
            Instruction::IConst1,
            Instruction::Invoke(InvokeType::Special, init),
        ];
        for insn in &insns {
            frame
                .interpret_instruction(insn, Some(new_label), &this_class())
                .unwrap();
        }
        assert_eq!(frame, new_frame([], [Object(RefType::Object(point))]));
    }

    #[test]
    fn returns_match_descriptor() {
        let mut frame = new_frame([], [Integer]);
        assert_eq!(
            frame.interpret_branch(&BranchInstruction::IReturn, &Some(FieldType::boolean())),
            Ok(())
        );

        let mut frame = new_frame([], [Integer]);
        assert_eq!(
            frame.interpret_branch(&BranchInstruction::IReturn, &Some(FieldType::long())),
            Err(VerifierErrorKind::InvalidType)
        );

        let mut frame = new_frame([Integer], [Integer, Null]);
        frame
            .interpret_branch(&BranchInstruction::AThrow, &None)
            .unwrap();
        assert_eq!(frame, new_frame([Integer], [Null]));
    }
}
