use crate::runtime::error::EvalError;

use super::MachineState;

/// A draft of the machine state.
///
/// Beginning a transaction clones the committed state, which is O(1) on
/// persistent collections. Dropping the transaction discards the draft and
/// leaves the committed state untouched.
pub struct Transaction<F> {
    draft: MachineState<F>,
}

impl<F: Clone> Transaction<F> {
    pub fn begin(committed: &MachineState<F>) -> Self {
        let mut draft = committed.clone();
        draft.is_draft = true;
        Self { draft }
    }

    pub fn state(&mut self) -> &mut MachineState<F> {
        &mut self.draft
    }

    /// Closes the draft and returns it as the new committed state.
    ///
    /// Every queued decrement must have been reconciled first.
    pub fn commit(self) -> Result<MachineState<F>, EvalError> {
        let mut state = self.draft;
        if !state.heap.pending_decrements().is_empty() {
            return Err(EvalError::internal(format!(
                "commit with {} unreconciled decrement(s)",
                state.heap.pending_decrements().len()
            )));
        }
        state.is_draft = false;
        Ok(state)
    }
}
