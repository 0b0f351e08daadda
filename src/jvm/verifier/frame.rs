use crate::jvm::class_file::{ClassConstantIndex, SerializedVerificationType, StackMapFrame};
use crate::jvm::code::SynLabel;
use crate::jvm::verifier::VerificationType;
use crate::jvm::{BinaryName, Error, MethodDescriptor, RefType};
use crate::util::OffsetVec;

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Locals are stored one entry per value, so a `long` or `double` local is a single entry
/// spanning two slots. This matches how the `StackMapTable` attribute counts locals.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

/// Frame attached to a label in a method body
pub type CodeFrame = Frame<RefType<BinaryName>, SynLabel>;

/// Frame as it appears in the `StackMapTable`
pub type SerializedFrame = Frame<ClassConstantIndex, u16>;

impl<Cls: Clone, U: Clone> Frame<Cls, U> {
    /// Keep only the locals which start before the given slot
    pub fn truncate_locals(&mut self, slots: usize) {
        let keep = self
            .locals
            .offsets()
            .take_while(|offset| offset.0 < slots)
            .count();
        self.locals.truncate(keep);
    }

    /// Map over both classes and uninitialized markers
    pub fn map<C2, U2>(
        &self,
        mut map_class: impl FnMut(&Cls) -> C2,
        mut map_uninitialized: impl FnMut(&U) -> U2,
    ) -> Frame<C2, U2> {
        let mut map_vtype =
            |vtype: &VerificationType<Cls, U>| vtype.map(&mut map_class, &mut map_uninitialized);
        Frame {
            locals: self.locals.iter().map(|t| map_vtype(t)).collect(),
            stack: self.stack.iter().map(|t| map_vtype(t)).collect(),
        }
    }

    /// Fallible map over both classes and uninitialized markers
    pub fn try_map<C2, U2, E>(
        &self,
        mut map_class: impl FnMut(&Cls) -> Result<C2, E>,
        mut map_uninitialized: impl FnMut(&U) -> Result<U2, E>,
    ) -> Result<Frame<C2, U2>, E> {
        let mut map_vtype =
            |vtype: &VerificationType<Cls, U>| vtype.try_map(&mut map_class, &mut map_uninitialized);
        let locals = self
            .locals
            .iter()
            .map(|t| map_vtype(t))
            .collect::<Result<_, E>>()?;
        let stack = self
            .stack
            .iter()
            .map(|t| map_vtype(t))
            .collect::<Result<_, E>>()?;
        Ok(Frame { locals, stack })
    }
}

impl<U> Frame<RefType<BinaryName>, U> {
    /// Frame at the very start of a method, before any instruction has run
    ///
    /// Constructors (other than the one on `java/lang/Object`) start with an uninitialized
    /// `this`.
    pub fn implicit(
        this_class: &BinaryName,
        is_static: bool,
        is_constructor: bool,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Self {
        let mut locals = OffsetVec::new();
        if !is_static {
            if is_constructor && this_class != &BinaryName::OBJECT {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(RefType::Object(this_class.clone())));
            }
        }
        for parameter in &descriptor.parameters {
            locals.push(VerificationType::from(parameter.clone()));
        }
        Frame {
            locals,
            stack: OffsetVec::new(),
        }
    }
}

impl SerializedFrame {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();

                if this_locals_len <= prev_locals_len {
                    let len_difference = prev_locals_len - this_locals_len;
                    if len_difference < 4 {
                        let this_is_prefix_of_prev = self
                            .locals
                            .iter()
                            .zip(previous_frame.locals.iter())
                            .all(|(t1, t2)| t1 == t2);

                        if this_is_prefix_of_prev {
                            if len_difference == 0 {
                                return StackMapFrame::SameLocalsNoStack { offset_delta };
                            } else {
                                return StackMapFrame::ChopLocalsNoStack {
                                    offset_delta,
                                    chopped_k: len_difference as u8,
                                };
                            }
                        }
                    }
                } else if this_locals_len - prev_locals_len < 4 {
                    let prev_is_prefix_of_this = previous_frame
                        .locals
                        .iter()
                        .zip(self.locals.iter())
                        .all(|(t1, t2)| t1 == t2);

                    if prev_is_prefix_of_this {
                        return StackMapFrame::AppendLocalsNoStack {
                            offset_delta,
                            locals: self
                                .locals
                                .iter()
                                .skip(prev_locals_len)
                                .map(|t| t.clone())
                                .collect(),
                        };
                    }
                }
            }
            1 if self.locals == previous_frame.locals => {
                if let Some(stack) = self.stack.iter().next() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: stack.clone(),
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.iter().map(|t| t.clone()).collect(),
            locals: self.locals.iter().map(|t| t.clone()).collect(),
        }
    }
}

impl<Cls: Clone, U: Clone> Frame<Cls, U> {
    /// Reconstruct the absolute frame described by a stack map frame, given the previous frame
    ///
    /// Verification types in the stack map frame get converted with `map_vtype` as they are read.
    pub fn following(
        &self,
        stack_map_frame: &StackMapFrame,
        mut map_vtype: impl FnMut(&SerializedVerificationType) -> Result<VerificationType<Cls, U>, Error>,
    ) -> Result<Frame<Cls, U>, Error> {
        let frame = match stack_map_frame {
            StackMapFrame::SameLocalsNoStack { .. } => Frame {
                locals: self.locals.clone(),
                stack: OffsetVec::new(),
            },
            StackMapFrame::SameLocalsOneStack { stack, .. } => {
                let mut one_stack = OffsetVec::new();
                one_stack.push(map_vtype(stack)?);
                Frame {
                    locals: self.locals.clone(),
                    stack: one_stack,
                }
            }
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => {
                let chopped_k = *chopped_k as usize;
                if chopped_k > self.locals.len() {
                    return Err(Error::MalformedClassFile(format!(
                        "Cannot chop {} locals from a frame with {} locals",
                        chopped_k,
                        self.locals.len()
                    )));
                }
                let mut locals = self.locals.clone();
                locals.truncate(self.locals.len() - chopped_k);
                Frame {
                    locals,
                    stack: OffsetVec::new(),
                }
            }
            StackMapFrame::AppendLocalsNoStack { locals: added, .. } => {
                let mut locals = self.locals.clone();
                for local in added {
                    locals.push(map_vtype(local)?);
                }
                Frame {
                    locals,
                    stack: OffsetVec::new(),
                }
            }
            StackMapFrame::Full { locals, stack, .. } => Frame {
                locals: locals
                    .iter()
                    .map(&mut map_vtype)
                    .collect::<Result<_, Error>>()?,
                stack: stack
                    .iter()
                    .map(&mut map_vtype)
                    .collect::<Result<_, Error>>()?,
            },
        };
        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;
    use crate::jvm::names::Name;

    type VType = VerificationType<ClassConstantIndex, u16>;

    fn new_frame<const N: usize, const M: usize>(locals: [VType; N], stack: [VType; M]) -> SerializedFrame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    fn object(idx: u16) -> VType {
        VerificationType::Object(ClassConstantIndex(ConstantIndex(idx)))
    }

    #[test]
    fn same_and_one_stack() {
        let prev = new_frame([object(2), VerificationType::Integer], []);
        let same = new_frame([object(2), VerificationType::Integer], []);
        assert_eq!(
            same.stack_map_frame(4, &prev),
            StackMapFrame::SameLocalsNoStack { offset_delta: 4 }
        );

        let one = new_frame([object(2), VerificationType::Integer], [VerificationType::Long]);
        assert_eq!(
            one.stack_map_frame(9, &prev),
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 9,
                stack: VerificationType::Long
            }
        );
    }

    #[test]
    fn chop_and_append_count_entries() {
        let prev = new_frame([object(2), VerificationType::Long, VerificationType::Double], []);
        let chopped = new_frame([object(2)], []);
        assert_eq!(
            chopped.stack_map_frame(0, &prev),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 0,
                chopped_k: 2
            }
        );

        let appended = new_frame(
            [
                object(2),
                VerificationType::Long,
                VerificationType::Double,
                VerificationType::Top,
            ],
            [],
        );
        assert_eq!(
            appended.stack_map_frame(1, &prev),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 1,
                locals: vec![VerificationType::Top]
            }
        );
    }

    #[test]
    fn falls_back_to_full() {
        let prev = new_frame([object(2)], []);
        let changed = new_frame([object(3)], [VerificationType::Integer, VerificationType::Integer]);
        assert!(matches!(
            changed.stack_map_frame(5, &prev),
            StackMapFrame::Full { offset_delta: 5, .. }
        ));
    }

    fn same(vtype: &VType) -> Result<VType, Error> {
        Ok(vtype.clone())
    }

    #[test]
    fn following_frames_expand() {
        let start = new_frame([object(2), VerificationType::Integer], []);
        let appended = start
            .following(&StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![VerificationType::Long],
            }, same)
            .unwrap();
        assert_eq!(appended.locals.offset_len().0, 4);

        let chopped = appended
            .following(&StackMapFrame::ChopLocalsNoStack {
                offset_delta: 2,
                chopped_k: 2,
            }, same)
            .unwrap();
        assert_eq!(chopped, new_frame([object(2)], []));

        assert!(chopped
            .following(&StackMapFrame::ChopLocalsNoStack {
                offset_delta: 2,
                chopped_k: 3,
            }, same)
            .is_err());
    }

    #[test]
    fn implicit_constructor_frame() {
        let owner = BinaryName::from_string("demo/Point".to_owned()).unwrap();
        let descriptor = MethodDescriptor {
            parameters: vec![crate::jvm::FieldType::int(), crate::jvm::FieldType::double()],
            return_type: None,
        };
        let frame: CodeFrame = Frame::implicit(&owner, false, true, &descriptor);
        assert_eq!(frame.locals.len(), 3);
        assert_eq!(frame.locals.offset_len().0, 4);
        assert_eq!(
            frame.locals.get(0).cloned(),
            Some(VerificationType::UninitializedThis)
        );
    }
}
