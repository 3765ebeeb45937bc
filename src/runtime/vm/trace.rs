use std::fmt;

use crate::runtime::{instruction::Instruction, state::MachineState};

use super::StepContext;

impl<F: Clone + fmt::Debug + 'static> StepContext<'_, F> {
    pub(super) fn trace_instruction(&self, instruction: &Instruction<F>) {
        println!("{}", format_trace(self.state, instruction));
    }
}

/// The instruction about to run, followed by the Stash and the current frame.
pub(crate) fn format_trace<F: Clone>(state: &MachineState<F>, instruction: &Instruction<F>) -> String {
    let stash: Vec<String> = state.stash().iter().map(|v| v.to_string()).collect();
    let frame = state.current_frame();
    let label = state
        .expect_frame(frame)
        .map(|f| f.label.clone())
        .unwrap_or_else(|_| "?".to_string());
    format!(
        "{}\n  stash: [{}]\n  frame: {} {}",
        instruction,
        stash.join(", "),
        frame,
        label
    )
}
