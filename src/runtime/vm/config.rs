/// Knobs for [`super::CseEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Steps run by `evaluate_chunk` before it hands back a pending completion.
    pub step_limit: usize,
    /// Committed states kept as history.
    pub saved_states: usize,
    /// Allocations between automatic mark-and-sweep passes.
    pub gc_threshold: usize,
    /// Disables automatic mark-and-sweep when `false`.
    pub gc_enabled: bool,
    /// Runs the reference-count cascade at the end of every step.
    pub clean_every_step: bool,
    /// Prints every executed instruction with the stash and current frame.
    pub trace: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            step_limit: 100,
            saved_states: 8,
            gc_threshold: 1024,
            gc_enabled: true,
            clean_every_step: false,
            trace: false,
        }
    }
}
