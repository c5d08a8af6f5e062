/// Something taking up one or more consecutive offsets
pub trait Width {
    fn width(&self) -> usize;
}

/// Vector indexed by offset: the sum of the widths of the entries before
///
/// The constant pool and local slots are both laid out like this, with `long` and `double`
/// taking two offsets.
pub struct OffsetVec<T> {
    /// Entries, each with its offset (increasing)
    entries: Vec<(Offset, T)>,

    /// Offset the next entry gets
    offset_len: Offset,

    /// Offset of the first entry (1 for the constant pool)
    initial_offset: Offset,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next entry
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    pub fn push(&mut self, entry: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += entry.width();
        self.entries.push((offset, entry));
        offset
    }

    /// Drop every entry at or past `offset`, returning them in push order
    pub fn truncate_offset(&mut self, offset: Offset) -> Vec<(Offset, T)> {
        let keep = self.entries.partition_point(|(start, _)| *start < offset);
        let removed = self.entries.split_off(keep);
        self.offset_len = match self.entries.last() {
            Some((start, entry)) => Offset(start.0 + entry.width()),
            None => self.initial_offset,
        };
        removed
    }

    pub fn get_offset(&self, offset: Offset) -> OffsetResult<'_, T> {
        match self.entries.binary_search_by_key(&offset, |(start, _)| *start) {
            Ok(idx) => OffsetResult::Ok(idx, &self.entries[idx].1),
            Err(idx) if idx == self.entries.len() => OffsetResult::TooLarge,
            Err(idx) => OffsetResult::InvalidOffset(idx),
        }
    }

    /// Entry starting exactly at `offset`
    pub fn get_offset_mut(&mut self, offset: Offset) -> Option<&mut T> {
        let idx = self
            .entries
            .binary_search_by_key(&offset, |(start, _)| *start)
            .ok()?;
        Some(&mut self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Offset, &T)> + '_ {
        self.entries.iter().map(|(start, entry)| (*start, entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Offset, &mut T)> + '_ {
        self.entries.iter_mut().map(|(start, entry)| (*start, entry))
    }
}

impl<T: Width> Default for OffsetVec<T> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

pub enum OffsetResult<'a, T> {
    /// Entry at this index starts at the offset
    Ok(usize, &'a T),

    /// Offset falls inside the entry at this index
    InvalidOffset(usize),

    /// Offset is past the last entry
    TooLarge,
}
