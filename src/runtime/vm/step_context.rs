use std::fmt;

use crate::runtime::{error::EvalError, language::Language, state::MachineState};

/// One open step: the draft state plus the language that lowers fragments
/// and implements operators.
///
/// Instructions execute through it, and native closures receive it as
/// their [`crate::runtime::data_handler::DataHandler`].
pub struct StepContext<'a, F> {
    pub(crate) state: &'a mut MachineState<F>,
    pub(crate) language: &'a dyn Language<Fragment = F>,
    pub(crate) trace: bool,
}

impl<'a, F: Clone + fmt::Debug + 'static> StepContext<'a, F> {
    pub fn new(
        state: &'a mut MachineState<F>,
        language: &'a dyn Language<Fragment = F>,
        trace: bool,
    ) -> Self {
        Self {
            state,
            language,
            trace,
        }
    }

    pub fn state(&self) -> &MachineState<F> {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState<F> {
        &mut *self.state
    }

    /// Runs instructions until Control is empty.
    pub(crate) fn drain(&mut self) -> Result<(), EvalError> {
        while !self.state.control().is_empty() {
            let instruction = self.state.control_pop()?;
            self.execute(instruction)?;
        }
        Ok(())
    }
}
