//! Fix wide jumps by rewriting them into `goto_w`
//!
//! This module is responsible for laying out a method body and fixing jumps that require bigger
//! relative offsets than the jump instruction supports. Most branch instructions only have a
//! signed 16-bit offset, so a target further than 32KB away needs a rewrite.
//!
//! ### Rewriting
//!
//! There are two categories of 16-bit jumps that need to be rewritten: `goto` and `if*`. An
//! oversized `goto` simply becomes a `goto_w`:
//!
//! ```text,ignore,no_run
//!     goto L2               goto_w L2
//! L1: ...         =>    L1: ...
//!     ...                   ...
//! L2: ...               L2: ...
//! ```
//!
//! There is no wide `if*`, so conditional jumps get bounced through a trampoline. The trampoline
//! is placed right after some nearby instruction that never falls through, so that it can only
//! be reached by the retargeted branch. Since the trampoline does nothing but jump, its frame is
//! exactly the frame of the final target:
//!
//! ```text,ignore,no_run
//!     if* L2                if* L3
//!     ...                   ...
//!     return                return
//! L1: ...         =>    L3: goto_w L2
//!     ...               L1: ...
//! L2: ...                   ...
//!                       L2: ...
//! ```
//!
//! If there is no such instruction within reach of the `if*`, the jump cannot be encoded.
//!
//! ### Termination
//!
//! Rewrites only ever make the code longer, which may push other jumps out of range. Layout is
//! repeated until no jump is oversized. Each round either widens a `goto` (which then never needs
//! rewriting again) or adds a trampoline for one `if*`, so the number of rounds is bounded.
//!
//! Switch padding depends on the offset of the switch, so it is recomputed on every round.

use crate::jvm::code::{BranchInstruction, Element, JumpTargets, LabelGenerator, SynLabel};
use crate::jvm::Error;
use crate::util::Width;
use std::collections::HashMap;
use std::ops::{RangeBounds, RangeInclusive};

/// Range of relative jump offsets supported by `goto` and `if*` branch instructions
pub const SIGNED_16BIT_JUMP_RANGE: RangeInclusive<isize> =
    RangeInclusive::new(i16::MIN as isize, i16::MAX as isize);

/// Width of a `goto_w` instruction, which is all a trampoline contains
const TRAMPOLINE_WIDTH: usize = 5;

/// Byte offsets of a laid out method body
#[derive(Debug)]
pub struct Layout {
    /// Offset of every element (labels share the offset of the following instruction)
    pub element_offsets: Vec<usize>,

    /// Offset of every placed label
    pub label_offsets: HashMap<SynLabel, usize>,

    /// Total length of the code array
    pub code_len: usize,
}

impl Layout {
    /// Offset of a label which is expected to be placed
    pub fn label_offset(&self, label: SynLabel) -> Result<usize, Error> {
        self.label_offsets
            .get(&label)
            .copied()
            .ok_or(Error::UnplacedLabel(label))
    }
}

/// Padding needed to align the operands of a switch whose opcode is at `offset`
pub fn switch_padding(offset: usize) -> u8 {
    ((4 - (offset + 1) % 4) % 4) as u8
}

/// Compute offsets of every element, updating switch padding along the way
pub fn compute_layout<Insn: Width>(elements: &mut [Element<Insn>]) -> Result<Layout, Error> {
    let mut element_offsets = Vec::with_capacity(elements.len());
    let mut label_offsets = HashMap::new();
    let mut offset = 0;
    for element in elements.iter_mut() {
        element_offsets.push(offset);
        match element {
            Element::Label(label) => {
                if label_offsets.insert(*label, offset).is_some() {
                    return Err(Error::DuplicateLabel(*label));
                }
            }
            Element::Instruction(insn) => offset += insn.width(),
            Element::Branch(branch) => {
                branch.set_padding(switch_padding(offset));
                offset += branch.width();
            }
        }
    }
    Ok(Layout {
        element_offsets,
        label_offsets,
        code_len: offset,
    })
}

/// Lay out the elements, rewriting any jumps which are too far for their instruction.
///
/// Trampolines get their frame copied from the frame of the label they jump to. The
/// `small_jump_range` parameter should always be `SIGNED_16BIT_JUMP_RANGE` - it is a parameter
/// only for unit testing purposes.
pub fn widen_oversized_jumps<Insn: Width, Frame: Clone>(
    elements: &mut Vec<Element<Insn>>,
    frames: &mut HashMap<SynLabel, Frame>,
    label_generator: &mut impl LabelGenerator<SynLabel>,
    small_jump_range: &impl RangeBounds<isize>,
) -> Result<Layout, Error> {
    let max_rounds = elements.len() + 1;
    for _ in 0..max_rounds {
        let layout = compute_layout(elements)?;

        // Find all oversized jumps in this layout
        let mut oversized_ifs: Vec<(usize, SynLabel)> = vec![];
        let mut widened_goto = false;
        for idx in 0..elements.len() {
            let element = &mut elements[idx];
            let branch = match element {
                Element::Branch(branch) => branch,
                _ => continue,
            };
            for target in branch.jump_targets().targets() {
                layout.label_offset(*target)?;
            }
            let target = match branch.jump_targets() {
                JumpTargets::Regular(target) => target,
                _ => continue,
            };
            let distance = layout.label_offsets[&target] as isize
                - layout.element_offsets[idx] as isize;
            if small_jump_range.contains(&distance) {
                continue;
            }
            if let BranchInstruction::Goto(_) = branch {
                *branch = BranchInstruction::GotoW(target);
                widened_goto = true;
            } else {
                oversized_ifs.push((idx, target));
            }
        }

        if widened_goto {
            continue;
        }
        match oversized_ifs.first() {
            None => return Ok(layout),
            Some((if_idx, target)) => {
                let trampoline = label_generator.fresh_label();
                let position =
                    trampoline_position(elements, &layout, *if_idx, small_jump_range).ok_or(
                        Error::UnencodableJump {
                            from: layout.element_offsets[*if_idx],
                            to: layout.label_offsets[target],
                        },
                    )?;
                if let Element::Branch(branch) = &mut elements[*if_idx] {
                    *branch = branch.map_labels(|_| trampoline, |lbl| *lbl);
                }
                if let Some(frame) = frames.get(target).cloned() {
                    frames.insert(trampoline, frame);
                }
                elements.splice(
                    position..position,
                    [
                        Element::Label(trampoline),
                        Element::Branch(BranchInstruction::GotoW(*target)),
                    ],
                );
            }
        }
    }

    let layout = compute_layout(elements)?;
    Err(Error::UnencodableJump {
        from: 0,
        to: layout.code_len,
    })
}

/// Find the element index before which a trampoline for the branch at `if_idx` can go
///
/// Candidates are right after an instruction which does not fall through. The closest one wins.
fn trampoline_position<Insn>(
    elements: &[Element<Insn>],
    layout: &Layout,
    if_idx: usize,
    small_jump_range: &impl RangeBounds<isize>,
) -> Option<usize> {
    let if_offset = layout.element_offsets[if_idx] as isize;
    let mut best: Option<(usize, isize)> = None;
    for idx in 1..=elements.len() {
        let follows_unconditional = matches!(
            &elements[idx - 1],
            Element::Branch(branch) if !branch.falls_through()
        );
        if !follows_unconditional {
            continue;
        }

        let position_offset = layout
            .element_offsets
            .get(idx)
            .copied()
            .unwrap_or(layout.code_len) as isize;

        // Inserting before the branch pushes the branch itself forward
        let distance = if idx <= if_idx {
            position_offset - (if_offset + TRAMPOLINE_WIDTH as isize)
        } else {
            position_offset - if_offset
        };
        if !small_jump_range.contains(&distance) {
            continue;
        }
        if best.map_or(true, |(_, best_distance)| distance.abs() < best_distance.abs()) {
            best = Some((idx, distance));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Instruction, OrdComparison, SerializableInstruction, SynLabelGenerator};

    type Elem = Element<SerializableInstruction>;

    fn nops(count: usize) -> impl Iterator<Item = Elem> {
        (0..count).map(|_| Element::Instruction(Instruction::Nop))
    }

    fn branch_at(elements: &[Elem], label: SynLabel) -> Option<&BranchInstruction<SynLabel, SynLabel>> {
        let idx = elements
            .iter()
            .position(|element| element == &Element::Label(label))?;
        match &elements[idx + 1] {
            Element::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    fn assert_jumps_fit(elements: &[Elem], layout: &Layout) {
        for (idx, element) in elements.iter().enumerate() {
            if let Element::Branch(branch) = element {
                if let JumpTargets::Regular(target) = branch.jump_targets() {
                    let distance = layout.label_offsets[&target] as isize
                        - layout.element_offsets[idx] as isize;
                    assert!(
                        SIGNED_16BIT_JUMP_RANGE.contains(&distance),
                        "jump at {} is still oversized",
                        idx
                    );
                }
            }
        }
    }

    // Small jumps should not be rewritten at all
    #[test]
    fn non_oversized_jumps() {
        let generator = &mut SynLabelGenerator::default();
        let l0 = generator.fresh_label();
        let l1 = generator.fresh_label();

        let mut elements: Vec<Elem> = vec![
            Element::Label(l0),
            Element::Instruction(Instruction::IConst0),
            Element::Branch(BranchInstruction::If(OrdComparison::EQ, l1)),
            Element::Branch(BranchInstruction::Goto(l0)),
            Element::Label(l1),
            Element::Branch(BranchInstruction::Return),
        ];
        let expected = elements.clone();
        let mut frames: HashMap<SynLabel, ()> = HashMap::new();
        let layout =
            widen_oversized_jumps(&mut elements, &mut frames, generator, &SIGNED_16BIT_JUMP_RANGE)
                .unwrap();
        assert_eq!(elements, expected);
        assert_eq!(layout.code_len, 8);
        assert_eq!(layout.label_offsets[&l1], 7);
    }

    // Long forward `goto` jump that should be rewritten to a `goto_w`
    #[test]
    fn oversized_forward_goto() {
        let generator = &mut SynLabelGenerator::default();
        let l0 = generator.fresh_label();

        let mut elements: Vec<Elem> = vec![Element::Branch(BranchInstruction::Goto(l0))];
        elements.extend(nops(40000));
        elements.push(Element::Label(l0));
        elements.push(Element::Branch(BranchInstruction::Return));

        let mut frames: HashMap<SynLabel, ()> = HashMap::new();
        let layout =
            widen_oversized_jumps(&mut elements, &mut frames, generator, &SIGNED_16BIT_JUMP_RANGE)
                .unwrap();
        assert_eq!(elements[0], Element::Branch(BranchInstruction::GotoW(l0)));
        assert_eq!(layout.label_offsets[&l0], 40005);
    }

    // Long forward `ifeq` that gets bounced through a trampoline after a nearby `return`
    #[test]
    fn oversized_if_uses_trampoline() {
        let generator = &mut SynLabelGenerator::default();
        let exit = generator.fresh_label();
        let far = generator.fresh_label();

        let mut elements: Vec<Elem> = vec![
            Element::Instruction(Instruction::ILoad(0)),
            Element::Branch(BranchInstruction::If(OrdComparison::EQ, far)),
            Element::Branch(BranchInstruction::Return),
            Element::Label(exit),
        ];
        elements.extend(nops(40000));
        elements.push(Element::Label(far));
        elements.push(Element::Branch(BranchInstruction::Return));

        let mut frames: HashMap<SynLabel, &'static str> = HashMap::new();
        frames.insert(far, "far frame");
        let layout =
            widen_oversized_jumps(&mut elements, &mut frames, generator, &SIGNED_16BIT_JUMP_RANGE)
                .unwrap();

        let trampoline = match &elements[1] {
            Element::Branch(BranchInstruction::If(OrdComparison::EQ, trampoline)) => *trampoline,
            other => panic!("unexpected element {:?}", other),
        };
        assert_ne!(trampoline, far);
        assert_eq!(elements[3], Element::Label(trampoline));
        assert_eq!(
            branch_at(&elements, trampoline),
            Some(&BranchInstruction::GotoW(far))
        );
        assert_eq!(frames.get(&trampoline), Some(&"far frame"));
        assert_eq!(layout.label_offsets[&exit], 10);
        assert_jumps_fit(&elements, &layout);
    }

    // Without any instruction that doesn't fall through nearby, there is nowhere to bounce
    #[test]
    fn unencodable_if() {
        let generator = &mut SynLabelGenerator::default();
        let far = generator.fresh_label();

        let mut elements: Vec<Elem> = vec![
            Element::Instruction(Instruction::ILoad(0)),
            Element::Branch(BranchInstruction::If(OrdComparison::NE, far)),
        ];
        elements.extend(nops(40000));
        elements.push(Element::Label(far));
        elements.push(Element::Branch(BranchInstruction::Return));

        let mut frames: HashMap<SynLabel, ()> = HashMap::new();
        let result =
            widen_oversized_jumps(&mut elements, &mut frames, generator, &SIGNED_16BIT_JUMP_RANGE);
        assert!(matches!(result, Err(Error::UnencodableJump { from: 1, .. })));
    }

    #[test]
    fn switch_padding_follows_offset() {
        let generator = &mut SynLabelGenerator::default();
        let target = generator.fresh_label();

        let mut elements: Vec<Elem> = vec![
            Element::Instruction(Instruction::ILoad(0)),
            Element::Branch(BranchInstruction::LookupSwitch {
                padding: 0,
                default: target,
                targets: vec![(1, target)],
            }),
            Element::Label(target),
            Element::Branch(BranchInstruction::Return),
        ];
        let layout = compute_layout(&mut elements).unwrap();
        match &elements[1] {
            Element::Branch(BranchInstruction::LookupSwitch { padding, .. }) => {
                assert_eq!(*padding, 2)
            }
            other => panic!("unexpected element {:?}", other),
        }
        assert_eq!(layout.label_offsets[&target], 1 + 1 + 2 + 16);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let label = SynLabelGenerator::default().fresh_label();
        let mut elements: Vec<Elem> = vec![
            Element::Label(label),
            Element::Instruction(Instruction::Nop),
            Element::Label(label),
            Element::Branch(BranchInstruction::Return),
        ];
        assert!(matches!(
            compute_layout(&mut elements),
            Err(Error::DuplicateLabel(_))
        ));
    }
}
