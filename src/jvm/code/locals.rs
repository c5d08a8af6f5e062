use super::LocalVariableRange;
use crate::jvm::Error;
use crate::util::{Offset, OffsetResult, OffsetVec, Width};

/// Local variable slots of a method under construction
///
/// Slots are handed out stack-like: a block takes a mark when it starts and releases everything
/// allocated past that mark when it ends, so sibling blocks reuse the same slots.
pub struct Locals {
    slots: OffsetVec<LocalSlot>,

    /// Largest number of slots used at once
    max_locals: usize,

    /// Visible ranges which are already closed
    ranges: Vec<LocalVariableRange>,
}

/// Name and descriptor of a source-level local, as shown in debug tables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalDebugInfo {
    pub name: String,
    pub descriptor: String,
}

struct LocalSlot {
    /// 1 or 2 (for `long` and `double`)
    width: usize,

    /// Temporaries synthesized by codegen have none
    debug: Option<LocalDebugInfo>,

    /// Start of the visible range currently open
    open_since: Option<usize>,
}

impl Width for LocalSlot {
    fn width(&self) -> usize {
        self.width
    }
}

impl Locals {
    pub fn new() -> Locals {
        Locals {
            slots: OffsetVec::new(),
            max_locals: 0,
            ranges: vec![],
        }
    }

    /// Reserve the next free slot(s) for a local of the given width
    pub fn allocate(
        &mut self,
        width: usize,
        debug: Option<LocalDebugInfo>,
    ) -> Result<u16, Error> {
        let Offset(next) = self.slots.offset_len();
        if next + width > u16::MAX as usize {
            return Err(Error::MethodCodeMaxLocalsOverflow(next + width));
        }
        let Offset(slot) = self.slots.push(LocalSlot {
            width,
            debug,
            open_since: None,
        });
        self.max_locals = self.max_locals.max(slot + width);
        Ok(slot as u16)
    }

    /// First free slot
    pub fn mark(&self) -> usize {
        self.slots.offset_len().0
    }

    /// Free every slot at or past `mark`, closing their visible ranges at `position`
    pub fn release(&mut self, mark: usize, position: usize) {
        for (Offset(slot), local) in self.slots.truncate_offset(Offset(mark)) {
            Self::close(&mut self.ranges, slot, local, position);
        }
    }

    fn close(ranges: &mut Vec<LocalVariableRange>, slot: usize, local: LocalSlot, end: usize) {
        if let (Some(start), Some(debug)) = (local.open_since, local.debug) {
            if start < end {
                ranges.push(LocalVariableRange {
                    start,
                    end,
                    name: debug.name,
                    descriptor: debug.descriptor,
                    slot: slot as u16,
                });
            }
        }
    }

    /// Start the visible range of a local (no-op if it is already visible)
    pub fn open_range(&mut self, slot: u16, position: usize) {
        if let Some(local) = self.slots.get_offset_mut(Offset(slot as usize)) {
            if local.open_since.is_none() {
                local.open_since = Some(position);
            }
        }
    }

    /// End the visible range of a local (no-op if it is not visible)
    pub fn close_range(&mut self, slot: u16, position: usize) {
        if let Some(local) = self.slots.get_offset_mut(Offset(slot as usize)) {
            if let (Some(start), Some(debug)) = (local.open_since.take(), local.debug.as_ref()) {
                if start < position {
                    self.ranges.push(LocalVariableRange {
                        start,
                        end: position,
                        name: debug.name.clone(),
                        descriptor: debug.descriptor.clone(),
                        slot,
                    });
                }
            }
        }
    }

    pub fn is_visible(&self, slot: u16) -> bool {
        match self.slots.get_offset(Offset(slot as usize)) {
            OffsetResult::Ok(_, local) => local.open_since.is_some(),
            _ => false,
        }
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    /// Pull every recorded position back to at most `length` (after code gets truncated)
    pub fn clamp(&mut self, length: usize) {
        for (_, local) in self.slots.iter_mut() {
            if let Some(start) = local.open_since.as_mut() {
                *start = (*start).min(length);
            }
        }
        for range in &mut self.ranges {
            range.start = range.start.min(length);
            range.end = range.end.min(length);
        }
        self.ranges.retain(|range| range.start < range.end);
    }

    /// Close every open range at `position` and return the full table
    pub fn finish(mut self, position: usize) -> (usize, Vec<LocalVariableRange>) {
        self.release(0, position);
        self.ranges.sort_by_key(|range| (range.slot, range.start));
        (self.max_locals, self.ranges)
    }
}

impl Default for Locals {
    fn default() -> Self {
        Locals::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn named(name: &str, descriptor: &str) -> Option<LocalDebugInfo> {
        Some(LocalDebugInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    #[test]
    fn sibling_scopes_share_slots() {
        let mut locals = Locals::new();
        assert_eq!(locals.allocate(1, named("this", "LA;")).unwrap(), 0);
        let mark = locals.mark();
        assert_eq!(locals.allocate(2, named("l", "J")).unwrap(), 1);
        assert_eq!(locals.allocate(1, named("i", "I")).unwrap(), 3);
        locals.release(mark, 10);
        assert_eq!(locals.allocate(1, named("j", "I")).unwrap(), 1);
        assert_eq!(locals.max_locals(), 4);
    }

    #[test]
    fn visible_ranges() {
        let mut locals = Locals::new();
        let x = locals.allocate(1, named("x", "I")).unwrap();
        let tmp = locals.allocate(1, None).unwrap();
        locals.open_range(x, 2);
        locals.open_range(tmp, 2);
        assert!(locals.is_visible(x));
        locals.close_range(x, 5);
        assert!(!locals.is_visible(x));
        locals.open_range(x, 8);
        locals.open_range(x, 9);
        let (max_locals, ranges) = locals.finish(12);
        assert_eq!(max_locals, 2);
        let spans: Vec<(usize, usize)> = ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(2, 5), (8, 12)]);
        assert!(ranges.iter().all(|r| r.name == "x"));
    }

    #[test]
    fn visibility_only_at_the_first_slot() {
        let mut locals = Locals::new();
        let l = locals.allocate(2, named("l", "J")).unwrap();
        locals.open_range(l, 0);
        assert!(locals.is_visible(l));
        assert!(!locals.is_visible(l + 1));
        assert!(!locals.is_visible(l + 2));
    }

    #[test]
    fn clamping_drops_empty_ranges() {
        let mut locals = Locals::new();
        let x = locals.allocate(1, named("x", "I")).unwrap();
        locals.open_range(x, 6);
        locals.close_range(x, 9);
        locals.clamp(6);
        let (_, ranges) = locals.finish(6);
        assert!(ranges.is_empty());
    }
}
