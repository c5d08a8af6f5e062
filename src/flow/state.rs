use crate::util::BitSet;

/// Can control get to a program point?
///
/// Ordered so that joining two non-reachable states keeps the weaker claim: code merely ruled out
/// by a constant condition is `Unreachable`, code after a `return` is a `DeadEnd`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Reachability {
    /// Control never gets here (after `return`, `throw`, `break`, infinite loops...)
    DeadEnd,

    /// Only reachable through a branch a constant condition rules out ("fake reachable")
    Unreachable,

    Reachable,
}

/// Assignment facts about locals at one program point
///
/// Locals are tracked by their flow id. In states which are not reachable every local counts as
/// definitely assigned, so that dead code does not produce spurious complaints.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Inits {
    /// Assigned on every path reaching this point
    assigned: BitSet,

    /// Assigned on at least one path reaching this point
    potentially_assigned: BitSet,

    reachability: Reachability,
}

impl Inits {
    /// State at method entry: reachable, nothing assigned
    pub fn initial() -> Inits {
        Inits {
            assigned: BitSet::new(),
            potentially_assigned: BitSet::new(),
            reachability: Reachability::Reachable,
        }
    }

    /// State after something that cannot complete normally
    pub fn dead_end() -> Inits {
        Inits {
            assigned: BitSet::full(),
            potentially_assigned: BitSet::new(),
            reachability: Reachability::DeadEnd,
        }
    }

    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    pub fn is_reachable(&self) -> bool {
        self.reachability == Reachability::Reachable
    }

    /// Downgrade a reachable state to "fake reachable" (no-op on states already not reachable)
    pub fn mark_unreachable(&mut self) {
        if self.is_reachable() {
            self.reachability = Reachability::Unreachable;
        }
    }

    pub fn is_definitely_assigned(&self, flow_id: usize) -> bool {
        !self.is_reachable() || self.assigned.contains(flow_id)
    }

    pub fn is_potentially_assigned(&self, flow_id: usize) -> bool {
        self.potentially_assigned.contains(flow_id)
    }

    pub fn mark_assigned(&mut self, flow_id: usize) {
        self.assigned.insert(flow_id);
        self.potentially_assigned.insert(flow_id);
    }

    /// Forget everything about a local (its declaration is being re-entered)
    pub fn mark_unassigned(&mut self, flow_id: usize) {
        if self.is_reachable() {
            self.assigned.remove(flow_id);
        }
        self.potentially_assigned.remove(flow_id);
    }

    /// Locals definitely assigned
    pub fn assigned(&self) -> &BitSet {
        &self.assigned
    }

    /// State at a join point reached either from `self` or from `other`
    ///
    /// A non-reachable side contributes nothing, so merging with it returns the other side.
    pub fn merge(&self, other: &Inits) -> Inits {
        match (self.is_reachable(), other.is_reachable()) {
            (true, false) => self.clone(),
            (false, true) => other.clone(),
            _ => {
                let mut assigned = self.assigned.clone();
                assigned.intersect_with(&other.assigned);
                let mut potentially_assigned = self.potentially_assigned.clone();
                potentially_assigned.union_with(&other.potentially_assigned);
                Inits {
                    assigned,
                    potentially_assigned,
                    reachability: self.reachability.max(other.reachability),
                }
            }
        }
    }

    /// Also count as potentially assigned whatever `other` potentially assigns
    pub fn add_potential_assignments(&mut self, other: &Inits) {
        self.potentially_assigned
            .union_with(&other.potentially_assigned);
    }

    /// Add the assignments made on the way to `other` (eg. by a `finally` block)
    ///
    /// If `other` is not reachable, neither is the result.
    pub fn add_assignments(&mut self, other: &Inits) {
        if !other.is_reachable() {
            *self = Inits {
                reachability: self.reachability.min(other.reachability),
                ..Inits::dead_end()
            };
            return;
        }
        if self.is_reachable() {
            self.assigned.union_with(&other.assigned);
        }
        self.add_potential_assignments(other);
    }
}

/// Flow state threaded through expressions
///
/// Boolean expressions can leave different facts depending on their outcome: after `a && (x = 1)
/// > 0` is true, `x` is assigned. Such expressions produce a `Conditional` state.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FlowState {
    Unconditional(Inits),
    Conditional { when_true: Inits, when_false: Inits },
}

impl FlowState {
    /// Split on a boolean outcome
    pub fn conditional(when_true: Inits, when_false: Inits) -> FlowState {
        FlowState::Conditional {
            when_true,
            when_false,
        }
    }

    /// Facts holding whatever the outcome
    pub fn unconditional(&self) -> Inits {
        match self {
            FlowState::Unconditional(inits) => inits.clone(),
            FlowState::Conditional {
                when_true,
                when_false,
            } => when_true.merge(when_false),
        }
    }

    pub fn into_unconditional(self) -> Inits {
        match self {
            FlowState::Unconditional(inits) => inits,
            FlowState::Conditional {
                when_true,
                when_false,
            } => when_true.merge(&when_false),
        }
    }

    /// Facts holding when the expression evaluated to `true`
    pub fn when_true(&self) -> Inits {
        match self {
            FlowState::Unconditional(inits) => inits.clone(),
            FlowState::Conditional { when_true, .. } => when_true.clone(),
        }
    }

    /// Facts holding when the expression evaluated to `false`
    pub fn when_false(&self) -> Inits {
        match self {
            FlowState::Unconditional(inits) => inits.clone(),
            FlowState::Conditional { when_false, .. } => when_false.clone(),
        }
    }

    /// Swap the outcomes (for `!`)
    pub fn negate(self) -> FlowState {
        match self {
            FlowState::Unconditional(inits) => FlowState::Unconditional(inits),
            FlowState::Conditional {
                when_true,
                when_false,
            } => FlowState::Conditional {
                when_true: when_false,
                when_false: when_true,
            },
        }
    }

    pub fn merge(&self, other: &FlowState) -> FlowState {
        match (self, other) {
            (FlowState::Unconditional(a), FlowState::Unconditional(b)) => {
                FlowState::Unconditional(a.merge(b))
            }
            _ => FlowState::Conditional {
                when_true: self.when_true().merge(&other.when_true()),
                when_false: self.when_false().merge(&other.when_false()),
            },
        }
    }

    pub fn is_reachable(&self) -> bool {
        match self {
            FlowState::Unconditional(inits) => inits.is_reachable(),
            FlowState::Conditional {
                when_true,
                when_false,
            } => when_true.is_reachable() || when_false.is_reachable(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assigned(ids: &[usize]) -> Inits {
        let mut inits = Inits::initial();
        for id in ids {
            inits.mark_assigned(*id);
        }
        inits
    }

    #[test]
    fn merge_is_idempotent() {
        let inits = assigned(&[0, 3, 70]);
        assert_eq!(inits.merge(&inits), inits);
    }

    #[test]
    fn merge_with_unreachable_is_identity() {
        let inits = assigned(&[1, 2]);
        assert_eq!(inits.merge(&Inits::dead_end()), inits);
        assert_eq!(Inits::dead_end().merge(&inits), inits);

        let mut fake = assigned(&[5]);
        fake.mark_unreachable();
        assert_eq!(inits.merge(&fake), inits);
    }

    #[test]
    fn merge_intersects_definite_and_unites_potential() {
        let merged = assigned(&[0, 1]).merge(&assigned(&[1, 2]));
        assert!(!merged.is_definitely_assigned(0));
        assert!(merged.is_definitely_assigned(1));
        assert!(!merged.is_definitely_assigned(2));
        assert!(merged.is_potentially_assigned(0));
        assert!(merged.is_potentially_assigned(2));
    }

    #[test]
    fn unreachable_joins() {
        let mut fake = Inits::initial();
        fake.mark_unreachable();
        let joined = fake.merge(&Inits::dead_end());
        assert_eq!(joined.reachability(), Reachability::Unreachable);
        assert_eq!(
            Inits::dead_end().merge(&Inits::dead_end()).reachability(),
            Reachability::DeadEnd
        );
        assert!(joined.is_definitely_assigned(12));
    }

    #[test]
    fn negate_swaps_outcomes() {
        let state = FlowState::conditional(assigned(&[0]), assigned(&[1]));
        let negated = state.clone().negate();
        assert_eq!(negated.when_true(), assigned(&[1]));
        assert_eq!(negated.when_false(), assigned(&[0]));
        assert_eq!(negated.negate(), state);
        assert!(!state.unconditional().is_definitely_assigned(0));
    }

    #[test]
    fn dead_finally_kills_the_merge() {
        let mut merged = assigned(&[0]);
        merged.add_assignments(&assigned(&[4]));
        assert!(merged.is_definitely_assigned(4));
        merged.add_assignments(&Inits::dead_end());
        assert_eq!(merged.reachability(), Reachability::DeadEnd);
    }
}
