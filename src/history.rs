use crate::algebra::OperatorState;
use std::rc::Rc;

/// Stack of operator snapshots. Index 0 is the initial state and is never
/// removed; the last entry is the current state.
#[derive(Debug, Clone)]
pub struct OperatorHistory {
    states: Vec<Rc<OperatorState>>,
}

impl OperatorHistory {
    pub fn new(initial: OperatorState) -> Self {
        Self {
            states: vec![Rc::new(initial)],
        }
    }

    pub fn push(&mut self, state: OperatorState) -> Rc<OperatorState> {
        let state = Rc::new(state);
        self.states.push(Rc::clone(&state));
        state
    }

    /// Drops the current state. Returns `None` when only the initial state
    /// is left.
    pub fn undo(&mut self) -> Option<Rc<OperatorState>> {
        if self.states.len() > 1 {
            self.states.pop()
        } else {
            None
        }
    }

    /// Truncates to the initial state and returns how many states were
    /// dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.states.len() - 1;
        self.states.truncate(1);
        removed
    }

    pub fn current(&self) -> &Rc<OperatorState> {
        // `states` is never empty.
        &self.states[self.states.len() - 1]
    }

    pub fn initial(&self) -> &Rc<OperatorState> {
        &self.states[0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_at_initial(&self) -> bool {
        self.states.len() == 1
    }

    pub fn states(&self) -> &[Rc<OperatorState>] {
        &self.states
    }

    pub fn logs(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.log())
    }
}
