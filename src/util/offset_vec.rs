use std::fmt::{Debug, Error, Formatter};
use std::iter::FromIterator;
use std::result::Result;

/// Number of slots a value takes up
pub trait Width {
    fn width(&self) -> usize;
}

/// Vector addressed by slot offset rather than by position
///
/// `long` and `double` take two slots in the constant pool, in the locals, and on the operand
/// stack, so the offset of an entry is the total width of the entries in front of it.
#[derive(Clone)]
pub struct OffsetVec<T> {
    entries: Vec<(Offset, T)>,

    /// Offset the next pushed entry gets
    next_offset: Offset,

    /// 1 for the constant pool, 0 everywhere else
    first_offset: Offset,
}

/// Slot offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// Empty vector whose first entry will be at `first_offset`
    pub fn new_starting_at(first_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            next_offset: first_offset,
            first_offset,
        }
    }

    /// Number of entries (not slots)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset just past the last entry
    pub fn offset_len(&self) -> Offset {
        self.next_offset
    }

    /// Append an entry, returning its offset
    pub fn push(&mut self, entry: T) -> Offset {
        let offset = self.next_offset;
        self.next_offset.0 += entry.width();
        self.entries.push((offset, entry));
        offset
    }

    pub fn pop(&mut self) -> Option<T> {
        let (offset, entry) = self.entries.pop()?;
        self.next_offset = offset;
        Some(entry)
    }

    /// Keep the first `len` entries
    pub fn truncate(&mut self, len: usize) {
        if let Some((offset, _)) = self.entries.get(len) {
            self.next_offset = *offset;
            self.entries.truncate(len);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_offset = self.first_offset;
    }

    /// Entry starting at `offset`
    ///
    /// `None` if the offset is past the end or lands on the second slot of a wide entry.
    pub fn get_offset(&self, offset: Offset) -> Option<&T> {
        self.entries
            .binary_search_by_key(&offset, |(start, _)| *start)
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Entry at position `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Starting offset of each entry
    pub fn offsets(&self) -> impl Iterator<Item = Offset> + '_ {
        self.entries.iter().map(|(offset, _)| *offset)
    }
}

impl<T: PartialEq> PartialEq for OffsetVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Eq> Eq for OffsetVec<T> {}

impl<T: Width> Default for OffsetVec<T> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(entries: I) -> Self {
        let mut offset_vec = OffsetVec::new();
        for entry in entries {
            offset_vec.push(entry);
        }
        offset_vec
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (offset, entry) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", offset.0, entry));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Int(i32),
        Long(i64),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Int(_) => 1,
                Slot::Long(_) => 2,
            }
        }
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut locals: OffsetVec<Slot> = OffsetVec::new();
        assert_eq!(locals.push(Slot::Int(1)), Offset(0));
        assert_eq!(locals.push(Slot::Long(2)), Offset(1));
        assert_eq!(locals.push(Slot::Int(3)), Offset(3));
        assert_eq!(locals.offset_len(), Offset(4));
        assert_eq!(locals.len(), 3);
        assert_eq!(locals.get(1), Some(&Slot::Long(2)));
        assert_eq!(
            locals.iter().copied().collect::<Vec<_>>(),
            vec![Slot::Int(1), Slot::Long(2), Slot::Int(3)]
        );

        assert_eq!(locals.pop(), Some(Slot::Int(3)));
        assert_eq!(locals.offset_len(), Offset(1 + 2));
    }

    #[test]
    fn constant_pool_starts_at_one() {
        let mut pool: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        pool.push(Slot::Long(7));
        pool.push(Slot::Int(8));

        assert_eq!(pool.get_offset(Offset(0)), None);
        assert_eq!(pool.get_offset(Offset(1)), Some(&Slot::Long(7)));
        assert_eq!(pool.get_offset(Offset(2)), None);
        assert_eq!(pool.get_offset(Offset(3)), Some(&Slot::Int(8)));
        assert_eq!(pool.get_offset(Offset(9)), None);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.offset_len(), Offset(1));
    }

    #[test]
    fn truncate_drops_trailing_slots() {
        let mut stack: OffsetVec<Slot> = vec![Slot::Int(0), Slot::Long(1), Slot::Int(3)]
            .into_iter()
            .collect();
        stack.truncate(1);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.offset_len(), Offset(1));

        stack.truncate(5);
        assert_eq!(stack.len(), 1);
    }
}
