/// Placeholder for a position in the code of a method
///
/// Labels are cheap handles into the label table of the `CodeBuilder` that created them, so they
/// are `Copy` and can be stashed in codegen contexts (eg. the break target of a loop).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Label(pub(crate) u32);

impl Label {
    pub(super) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Location of a jump offset inside the code
///
/// Offsets are relative to the start of the jumping instruction, which is not necessarily the
/// byte right before the operand (switches have padding and several operands).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) struct PatchSite {
    /// Position of the opcode of the jumping instruction
    pub instruction: usize,

    /// Position of the operand to patch
    pub operand: usize,

    /// Whether the operand is 4 bytes (instead of 2)
    pub wide: bool,
}

/// Bookkeeping for one label
#[derive(Default, Debug)]
pub(super) struct LabelData {
    /// Position in the code, once the label is placed
    pub position: Option<usize>,

    /// Jumps to this label waiting on it to be placed
    pub pending: Vec<PatchSite>,

    /// Jumps to this label which have already been patched
    pub resolved: Vec<PatchSite>,

    /// Stack depth expected at the label, as soon as any jump to it (or its placement) fixes it
    pub stack_depth: Option<u16>,

    /// Label which jumps to this one should go to instead
    ///
    /// This is set when the first instruction after this label is an unconditional jump.
    pub forward_to: Option<Label>,
}

impl LabelData {
    /// Has anything jumped (or is waiting to jump) to this label?
    pub fn is_referenced(&self) -> bool {
        !self.pending.is_empty() || !self.resolved.is_empty()
    }
}
