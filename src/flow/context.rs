use super::Inits;
use crate::ast::Span;
use crate::binding::LocalId;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum ContextKind<'a> {
    Loop,
    Switch,
    Labeled(&'a str),

    /// `try` with a `finally` block
    TryFinally,
}

/// Flow context of a construct which `break`, `continue`, or `return` can jump out of
pub(super) struct FlowContext<'a> {
    pub kind: ContextKind<'a>,

    /// Merge of the states at every `break` targeting this construct
    pub break_inits: Option<Inits>,

    /// Merge of the states at every `continue` targeting this loop
    pub continue_inits: Option<Inits>,

    /// Locals with a flow id at or past this one are declared inside the construct
    pub first_inner_local: usize,

    /// Assignments to `final` locals declared outside the loop, to be checked once it is known
    /// which states flow back to the start of the loop
    pub deferred_final_checks: Vec<(LocalId, Span)>,
}

impl<'a> FlowContext<'a> {
    pub fn new(kind: ContextKind<'a>, first_inner_local: usize) -> FlowContext<'a> {
        FlowContext {
            kind,
            break_inits: None,
            continue_inits: None,
            first_inner_local,
            deferred_final_checks: vec![],
        }
    }

    pub fn record_break(&mut self, inits: &Inits) {
        Self::accumulate(&mut self.break_inits, inits);
    }

    pub fn record_continue(&mut self, inits: &Inits) {
        Self::accumulate(&mut self.continue_inits, inits);
    }

    fn accumulate(slot: &mut Option<Inits>, inits: &Inits) {
        *slot = Some(match slot.take() {
            None => inits.clone(),
            Some(previous) => previous.merge(inits),
        });
    }

    /// State after the construct, as far as `break`s are concerned
    pub fn breaks(&self) -> Inits {
        self.break_inits.clone().unwrap_or_else(Inits::dead_end)
    }

    /// State at the loop's continuation point, as far as `continue`s are concerned
    pub fn continues(&self) -> Inits {
        self.continue_inits.clone().unwrap_or_else(Inits::dead_end)
    }

    pub fn is_loop(&self) -> bool {
        self.kind == ContextKind::Loop
    }

    /// Can an unlabeled `break` target this?
    pub fn is_breakable(&self) -> bool {
        matches!(self.kind, ContextKind::Loop | ContextKind::Switch)
    }
}
