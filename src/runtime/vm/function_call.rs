use std::fmt;

use log::trace;

use crate::runtime::{
    closure::{Closure, NativeClosure, check_param_types},
    data_type::DataType,
    error::EvalError,
    gc::{HeapData, Identifier},
    instruction::{Continuation, Instruction},
    value::TypedValue,
};

use super::StepContext;

impl<F: Clone + fmt::Debug + 'static> StepContext<'_, F> {
    /// APPLY: the closure sits on top of the Stash with its arguments below
    /// it in push order.
    pub(super) fn apply(&mut self, arity: usize) -> Result<(), EvalError> {
        let callee = self.state.stash_pop()?;
        let id = match (callee.data_type, callee.identifier()) {
            (DataType::Closure, Some(id)) => id,
            _ => {
                return Err(EvalError::type_mismatch(
                    "Cannot apply a non-closure value",
                    DataType::Closure,
                    callee.data_type,
                ));
            }
        };

        match self.state.heap().get(id)?.clone() {
            HeapData::Closure(closure) => {
                check_arity(closure.arity, arity)?;
                let args = self.state.stash_pop_n(arity)?;
                check_param_types(closure.param_types.as_deref(), &args)?;
                self.apply_interpreted(closure, args)
            }
            HeapData::NativeClosure(native) => {
                check_arity(native.signature.arity, arity)?;
                let args = self.state.stash_pop_n(arity)?;
                check_param_types(native.signature.param_types.as_deref(), &args)?;
                self.apply_native(native, args)
            }
            other => Err(EvalError::internal(format!(
                "closure-tagged value {} points at {}",
                id,
                other.data_type()
            ))),
        }
    }

    /// Saves the caller's continuation, then enters the body in a fresh
    /// frame under the closure's captured frame.
    fn apply_interpreted(&mut self, closure: Closure<F>, args: Vec<TypedValue>) -> Result<(), EvalError> {
        let continuation = self.state.capture_continuation(1)?;
        self.state.push_continuation(continuation)?;

        let bindings = closure
            .param_names
            .iter()
            .cloned()
            .zip(args)
            .collect::<Vec<_>>();
        let label = closure.name.as_deref().unwrap_or("lambda");
        self.state
            .make_frame(label, &[], bindings, Some(closure.parent_frame))?;
        self.push_block(&closure.body)
    }

    /// Runs the host callback inside this step. No frame is created.
    fn apply_native(&mut self, native: NativeClosure<F>, args: Vec<TypedValue>) -> Result<(), EvalError> {
        trace!(
            "native call {} with {} argument(s)",
            native.signature.name.as_deref().unwrap_or("anonymous"),
            args.len()
        );
        let result = (native.callback)(self, &args)?;
        let return_type = native.signature.return_type;
        if return_type == DataType::Unassigned {
            return Ok(());
        }
        let tagged = TypedValue::new(return_type, result.value).map_err(|_| {
            EvalError::type_mismatch(
                "Native closure returned the wrong type",
                return_type,
                result.data_type,
            )
        })?;
        self.state.stash_push(tagged)
    }

    /// RESTORE: keeps the top `save_count` values and reinstates the saved
    /// Control, Stash and frame underneath them.
    pub(super) fn restore(&mut self, continuation: Continuation<F>) -> Result<(), EvalError> {
        let save_count = continuation.save_count();
        if self.state.stash().len() < save_count {
            return Err(EvalError::Evaluator("function produced no value".to_string()));
        }
        let saved = self.state.stash_pop_n(save_count)?;
        self.state.resume_continuation(continuation)?;
        for value in saved {
            self.state.stash_push(value)?;
        }
        Ok(())
    }

    /// Calls a closure from host code, synchronously, inside this step.
    ///
    /// The caller's continuation is set aside, the call runs on an empty
    /// Control until it drains, and the continuation is then restored with
    /// the result carried over. Void natives produce `Unassigned`.
    pub fn call_closure(&mut self, closure: Identifier, args: &[TypedValue]) -> Result<TypedValue, EvalError> {
        let returns_value = match self.state.heap().get(closure)? {
            HeapData::Closure(_) => true,
            HeapData::NativeClosure(native) => !native.signature.is_void(),
            other => {
                return Err(EvalError::type_mismatch(
                    "Cannot call a non-closure value",
                    DataType::Closure,
                    other.data_type(),
                ));
            }
        };
        let save_count = usize::from(returns_value);

        let continuation = self.state.capture_continuation(save_count)?;
        for arg in args {
            self.state.stash_push(arg.clone())?;
        }
        self.state
            .stash_push(TypedValue::reference(DataType::Closure, closure))?;
        self.state.control_push(Instruction::Apply(args.len()))?;
        self.drain()?;
        self.restore(continuation)?;
        if returns_value {
            self.state.stash_pop()
        } else {
            Ok(TypedValue::unassigned())
        }
    }
}

fn check_arity(expected: usize, actual: usize) -> Result<(), EvalError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvalError::arity_mismatch(
            "Wrong number of arguments",
            expected,
            actual,
        ))
    }
}
