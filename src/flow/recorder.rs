use super::Inits;
use crate::util::BitSet;

/// Opaque handle on a recorded flow state
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct StateIndex(u32);

/// Snapshots of definite assignment taken during flow analysis of one method
///
/// Code generation replays them at branch and join points to know which locals hold a value (and
/// so should be visible in the debug tables).
#[derive(Default, Debug)]
pub struct StateRecorder {
    /// `None` for states which are not reachable
    snapshots: Vec<Option<BitSet>>,
}

impl StateRecorder {
    pub fn new() -> StateRecorder {
        StateRecorder::default()
    }

    pub fn record(&mut self, inits: &Inits) -> StateIndex {
        let snapshot = if inits.is_reachable() {
            Some(inits.assigned().clone())
        } else {
            None
        };
        self.snapshots.push(snapshot);
        StateIndex(self.snapshots.len() as u32 - 1)
    }

    /// Locals definitely assigned in a recorded state (`None` if the state was not reachable)
    pub fn definitely_assigned(&self, index: StateIndex) -> Option<&BitSet> {
        self.snapshots
            .get(index.0 as usize)
            .and_then(|snapshot| snapshot.as_ref())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshots_are_independent_of_later_changes() {
        let mut recorder = StateRecorder::new();
        let mut inits = Inits::initial();
        inits.mark_assigned(2);
        let first = recorder.record(&inits);
        inits.mark_assigned(5);
        let second = recorder.record(&inits);
        let dead = recorder.record(&Inits::dead_end());

        assert_eq!(recorder.len(), 3);
        let first = recorder.definitely_assigned(first).unwrap();
        assert!(first.contains(2) && !first.contains(5));
        assert!(recorder.definitely_assigned(second).unwrap().contains(5));
        assert!(recorder.definitely_assigned(dead).is_none());
    }
}
