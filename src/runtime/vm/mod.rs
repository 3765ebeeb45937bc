use std::{collections::VecDeque, rc::Rc};

use log::{debug, error, info, warn};

use crate::runtime::{
    closure::{NativeClosure, NativeFn, NativeSignature},
    data_type::DataType,
    error::EvalError,
    gc::{ClosureId, Identifier},
    instruction::Instruction,
    language::Language,
    state::{MachineState, StateSnapshot, Transaction},
    stdlib,
    value::TypedValue,
};

mod completion;
mod config;
mod dispatch;
mod function_call;
mod index_ops;
mod step_context;
mod trace;

pub use completion::{Completion, CompletionState};
pub use config::EvaluatorConfig;
pub use step_context::StepContext;

/// What a call to [`CseEvaluator::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Control was already empty; nothing ran.
    Idle,
    /// One instruction ran and more remain.
    Continue,
    /// One instruction ran and Control is now empty.
    Finished,
}

/// Drives a language on the CSE machine, one committed step at a time.
///
/// Each step runs on a draft of the whole state and commits only if every
/// part of it succeeded; a failing step leaves the previous committed state
/// in place and rejects the pending completion.
pub struct CseEvaluator<L: Language> {
    language: L,
    state: MachineState<L::Fragment>,
    history: VecDeque<MachineState<L::Fragment>>,
    config: EvaluatorConfig,
    stepping: bool,
    completion: Option<Completion>,
}

impl<L: Language> CseEvaluator<L> {
    pub fn new(language: L) -> Self {
        Self::with_config(language, EvaluatorConfig::default())
    }

    /// Creates an evaluator with the prelude installed in the Global frame.
    pub fn with_config(language: L, config: EvaluatorConfig) -> Self {
        let mut state = MachineState::new();
        state.heap.set_threshold(config.gc_threshold);
        state.heap.set_enabled(config.gc_enabled);

        let mut evaluator = Self {
            language,
            state,
            history: VecDeque::with_capacity(config.saved_states),
            config,
            stepping: false,
            completion: None,
        };
        if let Err(err) = stdlib::install_prelude(&mut evaluator) {
            error!("failed to install prelude: {}", err);
        }
        evaluator.history.clear();
        evaluator
    }

    pub fn language(&self) -> &L {
        &self.language
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.config.trace = enabled;
    }

    /// The last committed state.
    pub fn state(&self) -> &MachineState<L::Fragment> {
        &self.state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Previously committed states, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MachineState<L::Fragment>> {
        self.history.iter()
    }

    /// The completion of the evaluation in progress, if any.
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// Lowers `chunk` into a FRAGMENT and steps it until Control drains or
    /// the step budget runs out.
    ///
    /// The returned completion is still pending when the budget ran out;
    /// [`CseEvaluator::run_to_completion`] continues from there. Starting a
    /// new chunk rejects any evaluation still pending.
    pub fn evaluate_chunk(&mut self, chunk: &str) -> Completion {
        if let Some(previous) = self.completion.take() {
            previous.reject(EvalError::Evaluator(
                "evaluation superseded by a new chunk".to_string(),
            ));
        }

        let fragment = match self.language.process_chunk(chunk) {
            Ok(fragment) => fragment,
            Err(err) => {
                self.report(&err);
                return Completion::rejected(err);
            }
        };
        info!("evaluating chunk {}-{}", fragment.start, fragment.end);

        let loaded = self.in_transaction(|ctx| {
            let state = ctx.state_mut();
            state.control_clear()?;
            state.stash_clear()?;
            state.set_current_frame(Identifier::PROGRAM)?;
            state.control_push(Instruction::Fragment(Rc::new(fragment)))?;
            Ok(())
        });
        match loaded {
            Ok(((), next)) => self.commit(next),
            Err(err) => {
                self.report(&err);
                return Completion::rejected(err);
            }
        }

        let completion = Completion::pending();
        self.completion = Some(completion.clone());
        let steps = self.run(self.config.step_limit);
        debug!("chunk ran {} step(s)", steps);
        completion
    }

    /// Keeps stepping the current evaluation until Control drains, a step
    /// fails, or `limit` steps have run.
    pub fn run_to_completion(&mut self, limit: Option<usize>) -> Option<Completion> {
        let completion = self.completion.clone();
        self.run(limit.unwrap_or(usize::MAX));
        completion
    }

    fn run(&mut self, limit: usize) -> usize {
        let mut steps = 0;
        while steps < limit {
            match self.step() {
                Ok(StepOutcome::Continue) => steps += 1,
                Ok(StepOutcome::Finished) => return steps + 1,
                Ok(StepOutcome::Idle) | Err(_) => break,
            }
        }
        steps
    }

    /// Executes the instruction on top of Control as one transaction.
    pub fn step(&mut self) -> Result<StepOutcome, EvalError> {
        if self.stepping {
            return Err(EvalError::internal("step already in progress"));
        }
        if self.state.control_top().is_none() {
            return Ok(StepOutcome::Idle);
        }

        let stepped = self.in_transaction(|ctx| {
            let instruction = ctx.state.control_pop()?;
            ctx.execute(instruction)
        });
        let next = match stepped {
            Ok(((), next)) => next,
            Err(err) => {
                self.report(&err);
                if let Some(completion) = self.completion.take() {
                    completion.reject(err.clone());
                }
                return Err(err);
            }
        };
        self.commit(next);

        if !self.state.control().is_empty() {
            return Ok(StepOutcome::Continue);
        }
        let result = self.state.stash_top().cloned();
        if let Some(completion) = self.completion.take() {
            info!(
                "evaluation finished with {}",
                result
                    .as_ref()
                    .map_or_else(|| "no value".to_string(), |v| v.to_string())
            );
            completion.resolve(result);
        }
        Ok(StepOutcome::Finished)
    }

    /// Runs `f` against a fresh draft, reconciles and collects, and returns
    /// the draft ready to commit. The re-entrancy flag is held throughout.
    fn in_transaction<R>(
        &mut self,
        f: impl FnOnce(&mut StepContext<'_, L::Fragment>) -> Result<R, EvalError>,
    ) -> Result<(R, MachineState<L::Fragment>), EvalError> {
        if self.stepping {
            return Err(EvalError::internal("step already in progress"));
        }
        self.stepping = true;
        let result = self.run_draft(f);
        self.stepping = false;
        result
    }

    fn run_draft<R>(
        &self,
        f: impl FnOnce(&mut StepContext<'_, L::Fragment>) -> Result<R, EvalError>,
    ) -> Result<(R, MachineState<L::Fragment>), EvalError> {
        let mut tx = Transaction::begin(&self.state);
        let value = {
            let mut ctx = StepContext::new(tx.state(), &self.language, self.config.trace);
            f(&mut ctx)?
        };

        let draft = tx.state();
        draft.reconcile_step()?;
        if self.config.clean_every_step {
            draft.clean(None)?;
        }
        if draft.heap().should_collect() {
            draft.mark_sweep()?;
        }
        Ok((value, tx.commit()?))
    }

    fn commit(&mut self, next: MachineState<L::Fragment>) {
        let previous = std::mem::replace(&mut self.state, next);
        self.history.push_back(previous);
        while self.history.len() > self.config.saved_states {
            self.history.pop_front();
        }
    }

    fn report(&self, err: &EvalError) {
        if err.is_internal() {
            error!("{}", err);
        } else {
            warn!("step rejected: {}", err);
        }
    }

    /// Opens a transaction and hands the host a data handler over it.
    ///
    /// The draft is committed only if `f` succeeds.
    pub fn with_data_handler<R>(
        &mut self,
        f: impl FnOnce(&mut StepContext<'_, L::Fragment>) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        let (value, next) = self.in_transaction(f)?;
        self.commit(next);
        Ok(value)
    }

    /// Binds `name` in the Global frame.
    pub fn define_global(&mut self, name: &str, value: TypedValue, constant: bool) -> Result<(), EvalError> {
        self.with_data_handler(|ctx| {
            ctx.state_mut()
                .define(name, value, constant, Some(Identifier::GLOBAL))
        })
    }

    /// Allocates a native closure under the Global frame and binds it there
    /// under its signature's name.
    pub fn define_native(
        &mut self,
        signature: NativeSignature,
        callback: NativeFn<L::Fragment>,
    ) -> Result<ClosureId, EvalError> {
        let name = signature
            .name
            .clone()
            .ok_or_else(|| EvalError::internal("global natives need a name"))?;
        self.with_data_handler(|ctx| {
            let state = ctx.state_mut();
            let id = state.make_native_closure(NativeClosure {
                signature,
                parent_frame: Identifier::GLOBAL,
                callback,
            })?;
            state.define(
                &name,
                TypedValue::reference(DataType::Closure, id),
                false,
                Some(Identifier::GLOBAL),
            )?;
            Ok(ClosureId(id))
        })
    }

    #[cfg(test)]
    pub(crate) fn force_stepping(&mut self, stepping: bool) {
        self.stepping = stepping;
    }
}

#[cfg(test)]
pub(crate) mod test_support;
