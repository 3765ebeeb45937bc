use std::{cell::RefCell, rc::Rc};

use crate::runtime::{error::EvalError, value::TypedValue};

/// Outcome of an evaluation as seen through a [`Completion`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionState {
    Pending,
    /// The top of the Stash when Control drained, if there was one.
    Resolved(Option<TypedValue>),
    Rejected(EvalError),
}

/// Shared handle to the result of one `evaluate_chunk` call.
///
/// The evaluator keeps a clone and settles it when Control drains or a step
/// fails. Settling is one-shot: later attempts are ignored.
#[derive(Debug, Clone)]
pub struct Completion {
    inner: Rc<RefCell<CompletionState>>,
}

impl Completion {
    pub fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionState::Pending)),
        }
    }

    pub fn rejected(error: EvalError) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionState::Rejected(error))),
        }
    }

    pub fn state(&self) -> CompletionState {
        self.inner.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.borrow(), CompletionState::Pending)
    }

    /// `None` while pending.
    pub fn result(&self) -> Option<Result<Option<TypedValue>, EvalError>> {
        match self.state() {
            CompletionState::Pending => None,
            CompletionState::Resolved(value) => Some(Ok(value)),
            CompletionState::Rejected(error) => Some(Err(error)),
        }
    }

    pub(crate) fn resolve(&self, value: Option<TypedValue>) {
        self.settle(CompletionState::Resolved(value));
    }

    pub(crate) fn reject(&self, error: EvalError) {
        self.settle(CompletionState::Rejected(error));
    }

    fn settle(&self, outcome: CompletionState) {
        let mut state = self.inner.borrow_mut();
        if matches!(*state, CompletionState::Pending) {
            *state = outcome;
        }
    }
}
