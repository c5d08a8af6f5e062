use std::fmt;

const WORD_BITS: usize = 64;

/// Growable set of small non-negative integers, stored as a bit vector
///
/// Bits past the end of the backing storage read as the `fill` value. This lets a set stand for
/// "everything" (`fill = true`) without knowing up front how many elements can be tracked, which
/// is what unreachable flow states need: every local counts as assigned there.
#[derive(Clone)]
pub struct BitSet {
    words: Vec<u64>,
    fill: bool,
}

impl BitSet {
    /// Set with no elements
    pub fn new() -> BitSet {
        BitSet {
            words: vec![],
            fill: false,
        }
    }

    /// Set with every element
    pub fn full() -> BitSet {
        BitSet {
            words: vec![],
            fill: true,
        }
    }

    fn fill_word(&self) -> u64 {
        if self.fill {
            u64::MAX
        } else {
            0
        }
    }

    fn word(&self, idx: usize) -> u64 {
        self.words.get(idx).copied().unwrap_or_else(|| self.fill_word())
    }

    fn grow_to(&mut self, words: usize) {
        if self.words.len() < words {
            let fill = self.fill_word();
            self.words.resize(words, fill);
        }
    }

    pub fn contains(&self, bit: usize) -> bool {
        self.word(bit / WORD_BITS) & (1 << (bit % WORD_BITS)) != 0
    }

    pub fn insert(&mut self, bit: usize) {
        self.grow_to(bit / WORD_BITS + 1);
        self.words[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
    }

    pub fn remove(&mut self, bit: usize) {
        self.grow_to(bit / WORD_BITS + 1);
        self.words[bit / WORD_BITS] &= !(1 << (bit % WORD_BITS));
    }

    /// Keep only elements in both sets
    pub fn intersect_with(&mut self, other: &BitSet) {
        self.grow_to(other.words.len());
        for (idx, word) in self.words.iter_mut().enumerate() {
            *word &= other.word(idx);
        }
        self.fill &= other.fill;
    }

    /// Keep elements in either set
    pub fn union_with(&mut self, other: &BitSet) {
        self.grow_to(other.words.len());
        for (idx, word) in self.words.iter_mut().enumerate() {
            *word |= other.word(idx);
        }
        self.fill |= other.fill;
    }

    /// Elements present among the first `limit` bits
    pub fn iter_below(&self, limit: usize) -> impl Iterator<Item = usize> + '_ {
        (0..limit).filter(move |bit| self.contains(*bit))
    }

    fn significant_words(&self) -> usize {
        let fill = self.fill_word();
        self.words
            .iter()
            .rposition(|word| *word != fill)
            .map_or(0, |idx| idx + 1)
    }
}

impl Default for BitSet {
    fn default() -> Self {
        BitSet::new()
    }
}

/// Equality is on the represented set, not on the length of the backing storage
impl PartialEq for BitSet {
    fn eq(&self, other: &BitSet) -> bool {
        if self.fill != other.fill {
            return false;
        }
        let len = self.significant_words().max(other.significant_words());
        (0..len).all(|idx| self.word(idx) == other.word(idx))
    }
}

impl Eq for BitSet {}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limit = self.significant_words() * WORD_BITS;
        let mut set = f.debug_set();
        set.entries(self.iter_below(limit));
        if self.fill {
            set.entry(&format_args!("{}..", limit));
        }
        set.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_past_first_word() {
        let mut set = BitSet::new();
        set.insert(3);
        set.insert(130);
        assert!(set.contains(3));
        assert!(set.contains(130));
        assert!(!set.contains(64));
        assert!(!set.contains(1000));
        set.remove(130);
        assert!(!set.contains(130));
    }

    #[test]
    fn full_set_survives_growth() {
        let mut set = BitSet::full();
        set.remove(70);
        assert!(set.contains(0));
        assert!(!set.contains(70));
        assert!(set.contains(500));
    }

    #[test]
    fn intersection_with_full_is_identity() {
        let mut set = BitSet::new();
        set.insert(1);
        set.insert(99);
        let before = set.clone();
        set.intersect_with(&BitSet::full());
        assert_eq!(set, before);
    }

    #[test]
    fn equality_ignores_storage_length() {
        let mut a = BitSet::new();
        a.insert(200);
        a.remove(200);
        assert_eq!(a, BitSet::new());
        assert_ne!(BitSet::full(), BitSet::new());
    }
}
