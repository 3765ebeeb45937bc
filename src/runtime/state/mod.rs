use std::rc::Rc;

use im_rc::Vector;

use crate::runtime::{
    error::EvalError,
    frame::Frame,
    gc::{Heap, HeapData, Identifier},
    instruction::{Continuation, Instruction},
    value::TypedValue,
};

mod data;
mod environment;
pub mod snapshot;
pub mod transaction;

pub use snapshot::StateSnapshot;
pub use transaction::Transaction;

/// The whole machine: Control, Stash, heap and the current-frame pointer.
///
/// Every collection is persistent, so cloning a state is O(1). Mutation is
/// only legal on a draft opened by [`Transaction::begin`]; every mutating
/// method checks this first and fails with an internal error otherwise.
#[derive(Clone)]
pub struct MachineState<F> {
    pub(crate) control: Vector<Instruction<F>>,
    pub(crate) stash: Vector<TypedValue>,
    pub(crate) heap: Heap<F>,
    pub(crate) current_frame: Identifier,
    pub(crate) is_draft: bool,
}

impl<F: Clone> Default for MachineState<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone> MachineState<F> {
    /// A committed state holding only the Global and Program frames.
    ///
    /// Program is tied to Global and is the current frame, so both start
    /// with a count of one.
    pub fn new() -> Self {
        let (global, program) = (Identifier::GLOBAL, Identifier::PROGRAM);
        // The first two slots of a fresh heap: neither allocation can fail.
        let mut heap = Heap::new();
        let _ = heap.alloc(HeapData::Frame(Frame::new("global", None)));
        let _ = heap.alloc(HeapData::Frame(Frame::new("program", Some(global))));

        let mut state = Self {
            control: Vector::new(),
            stash: Vector::new(),
            heap,
            current_frame: Identifier::PROGRAM,
            is_draft: false,
        };
        let _ = state.heap.tie(program, Some(global));
        let _ = state.heap.increment_ref(program);
        state
    }

    pub fn control(&self) -> &Vector<Instruction<F>> {
        &self.control
    }

    pub fn stash(&self) -> &Vector<TypedValue> {
        &self.stash
    }

    pub fn heap(&self) -> &Heap<F> {
        &self.heap
    }

    pub fn current_frame(&self) -> Identifier {
        self.current_frame
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub(crate) fn verify_draft(&self, operation: &str) -> Result<(), EvalError> {
        if self.is_draft {
            Ok(())
        } else {
            Err(EvalError::internal(format!(
                "{} requires an open transaction",
                operation
            )))
        }
    }

    /// Pushes onto Control and counts the instruction's references. A
    /// RESTORE arrives with its references already held by its continuation.
    pub fn control_push(&mut self, instruction: Instruction<F>) -> Result<(), EvalError> {
        self.verify_draft("control_push")?;
        if !matches!(instruction, Instruction::Restore(_)) {
            for id in instruction.refs() {
                self.heap.increment_ref(id)?;
            }
        }
        self.control.push_back(instruction);
        Ok(())
    }

    /// Pops the top of Control. A popped RESTORE keeps its references for
    /// [`MachineState::resume_continuation`].
    pub fn control_pop(&mut self) -> Result<Instruction<F>, EvalError> {
        self.verify_draft("control_pop")?;
        let instruction = self
            .control
            .pop_back()
            .ok_or_else(|| EvalError::internal("Control is empty!"))?;
        if !matches!(instruction, Instruction::Restore(_)) {
            for id in instruction.refs() {
                self.heap.decrement_ref(id)?;
            }
        }
        Ok(instruction)
    }

    pub fn control_top(&self) -> Option<&Instruction<F>> {
        self.control.back()
    }

    /// Empties Control and returns what it held, bottom first. Everything
    /// it referenced is released, RESTORE continuations included.
    pub fn control_clear(&mut self) -> Result<Vector<Instruction<F>>, EvalError> {
        self.verify_draft("control_clear")?;
        let control = std::mem::take(&mut self.control);
        for instruction in control.iter() {
            for id in instruction.refs() {
                self.heap.decrement_ref(id)?;
            }
        }
        Ok(control)
    }

    /// Moves Control, Stash and the current frame into a continuation,
    /// leaving Control and Stash empty.
    ///
    /// No count changes hands: the references move with the values. The
    /// current-frame pointer keeps pointing at the same frame and takes a
    /// fresh reference of its own.
    pub fn capture_continuation(&mut self, save_count: usize) -> Result<Continuation<F>, EvalError> {
        self.verify_draft("capture_continuation")?;
        let control = std::mem::take(&mut self.control);
        let stash = std::mem::take(&mut self.stash);
        self.heap.increment_ref(self.current_frame)?;
        Ok(Continuation::new(
            control.into_iter().collect(),
            stash.into_iter().collect(),
            self.current_frame,
            save_count,
        ))
    }

    /// Reinstates a continuation taken off Control or held by the host.
    ///
    /// Whatever the callee left on Control and Stash is released, then the
    /// continuation hands its references back. The frame it saved becomes
    /// current and the callee's frame loses the pointer's reference.
    pub fn resume_continuation(&mut self, continuation: Continuation<F>) -> Result<(), EvalError> {
        self.verify_draft("resume_continuation")?;
        self.expect_frame(continuation.frame())?;
        self.control_clear()?;
        self.stash_clear()?;
        let (control, stash, frame) = continuation.into_parts();
        self.control = control.into_iter().collect();
        self.stash = stash.into_iter().collect();
        self.heap.decrement_ref(self.current_frame)?;
        self.current_frame = frame;
        Ok(())
    }

    /// Pushes a RESTORE for `continuation`, whose references it now owns.
    pub fn push_continuation(&mut self, continuation: Continuation<F>) -> Result<(), EvalError> {
        self.control_push(Instruction::Restore(Rc::new(continuation)))
    }

    pub fn stash_push(&mut self, value: TypedValue) -> Result<(), EvalError> {
        self.verify_draft("stash_push")?;
        if let Some(id) = value.identifier() {
            self.heap.increment_ref(id)?;
        }
        self.stash.push_back(value);
        Ok(())
    }

    pub fn stash_pop(&mut self) -> Result<TypedValue, EvalError> {
        self.verify_draft("stash_pop")?;
        let value = self
            .stash
            .pop_back()
            .ok_or_else(|| EvalError::internal("Stash is empty!"))?;
        if let Some(id) = value.identifier() {
            self.heap.decrement_ref(id)?;
        }
        Ok(value)
    }

    /// Pops `n` values and returns them oldest first.
    pub fn stash_pop_n(&mut self, n: usize) -> Result<Vec<TypedValue>, EvalError> {
        self.verify_draft("stash_pop_n")?;
        if self.stash.len() < n {
            return Err(EvalError::internal(format!(
                "Stash holds {} value(s), {} requested",
                self.stash.len(),
                n
            )));
        }
        let values = self.stash.split_off(self.stash.len() - n);
        for value in values.iter() {
            if let Some(id) = value.identifier() {
                self.heap.decrement_ref(id)?;
            }
        }
        Ok(values.into_iter().collect())
    }

    pub fn stash_top(&self) -> Option<&TypedValue> {
        self.stash.back()
    }

    /// The top `n` values, oldest first, without popping.
    pub fn stash_top_n(&self, n: usize) -> Result<Vec<TypedValue>, EvalError> {
        if self.stash.len() < n {
            return Err(EvalError::internal(format!(
                "Stash holds {} value(s), {} requested",
                self.stash.len(),
                n
            )));
        }
        Ok(self.stash.skip(self.stash.len() - n).into_iter().collect())
    }

    pub fn stash_clear(&mut self) -> Result<Vector<TypedValue>, EvalError> {
        self.verify_draft("stash_clear")?;
        let stash = std::mem::take(&mut self.stash);
        for value in stash.iter() {
            if let Some(id) = value.identifier() {
                self.heap.decrement_ref(id)?;
            }
        }
        Ok(stash)
    }

    /// Moves the current-frame pointer. The pointer holds a reference: the
    /// new frame is incremented now, the old one decremented at reconcile.
    pub fn set_current_frame(&mut self, frame: Identifier) -> Result<(), EvalError> {
        self.verify_draft("set_current_frame")?;
        self.expect_frame(frame)?;
        self.heap.increment_ref(frame)?;
        self.heap.decrement_ref(self.current_frame)?;
        self.current_frame = frame;
        Ok(())
    }

    /// The machine's own references with multiplicity: one per identifier in
    /// each Control instruction's refs, one per reference on the Stash, and
    /// the current-frame pointer.
    pub fn counted_roots(&self) -> Vec<Identifier> {
        let mut roots: Vec<Identifier> = self
            .control
            .iter()
            .flat_map(|instruction| instruction.refs())
            .collect();
        roots.extend(self.stash.iter().filter_map(TypedValue::identifier));
        roots.push(self.current_frame);
        roots
    }

    /// Applies every decrement queued during this step.
    pub fn reconcile_step(&mut self) -> Result<(), EvalError> {
        self.verify_draft("reconcile_step")?;
        self.heap.reconcile()
    }

    /// Reference-count cascade. See [`Heap::clean`].
    pub fn clean(&mut self, targets: Option<&[Identifier]>) -> Result<usize, EvalError> {
        self.verify_draft("clean")?;
        self.heap.clean(targets)
    }

    /// Root-based collection over the machine's references.
    pub fn mark_sweep(&mut self) -> Result<usize, EvalError> {
        self.verify_draft("mark_sweep")?;
        let roots = self.counted_roots();
        self.heap.mark_sweep(&roots, &[])
    }

    /// `None` runs the refcount cascade; `Some(extra)` runs mark-and-sweep
    /// with `extra` protected in addition to the machine's own roots.
    pub fn collect(&mut self, extra_roots: Option<&[Identifier]>) -> Result<usize, EvalError> {
        self.verify_draft("collect")?;
        match extra_roots {
            None => self.heap.clean(None),
            Some(extra) => {
                let roots = self.counted_roots();
                self.heap.mark_sweep(&roots, extra)
            }
        }
    }

    /// Audits every live count against the machine's references.
    /// Only meaningful when no decrements are queued.
    pub fn verify_ref_counts(&self) -> Result<(), EvalError> {
        if !self.heap.pending_decrements().is_empty() {
            return Err(EvalError::internal(
                "reference counts audited with decrements still queued",
            ));
        }
        self.heap.verify_ref_counts(&self.counted_roots())?;
        self.heap.verify_dependencies()
    }
}
