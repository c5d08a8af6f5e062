//! Choosing between `tableswitch` and `lookupswitch`
//!
//! A `tableswitch` costs 4 bytes per value in `[low, high]` (holes jump to the default), while a
//! `lookupswitch` costs 8 bytes per key but is searched at runtime. The table form is picked when
//! keys are dense enough: `count * 2.5 > high - low`.

/// Shape of the dispatch instruction for a set of case keys
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwitchKind {
    Table { low: i32, high: i32 },
    Lookup,
}

/// Permutation of `keys` putting them in ascending order
///
/// Case blocks are emitted in source order, but both switch instructions need their targets
/// sorted by key, so codegen keeps the permutation to map targets back.
pub fn sorted_order(keys: &[i32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|idx| keys[*idx]);
    order
}

/// Pick the dispatch instruction for keys already sorted in ascending order
pub fn choose_kind(sorted_keys: &[i32]) -> SwitchKind {
    match (sorted_keys.first(), sorted_keys.last()) {
        (Some(&low), Some(&high)) => {
            let span = i64::from(high) - i64::from(low);
            if sorted_keys.len() as f64 * 2.5 > span as f64 {
                SwitchKind::Table { low, high }
            } else {
                SwitchKind::Lookup
            }
        }
        _ => SwitchKind::Lookup,
    }
}

/// Padding bytes after a switch opcode at `opcode_position`, so the operands are 4-byte aligned
/// relative to the start of the method
pub const fn switch_padding(opcode_position: usize) -> usize {
    (4 - (opcode_position + 1) % 4) % 4
}
