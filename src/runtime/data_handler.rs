use std::{any::Any, collections::HashSet, fmt, rc::Rc};

use crate::runtime::{
    closure::{Closure, NativeClosure, NativeFn, NativeSignature},
    data_type::DataType,
    error::{EvalError, assert_data_type},
    gc::{ArrayId, ClosureId, Identifier, OpaqueId, PairId},
    value::TypedValue,
    vm::StepContext,
};

/// Heap access for native closures and hosts.
///
/// Every method works on the open draft; nothing here is visible until the
/// surrounding step commits. The provided list helpers are written purely in
/// terms of the required methods.
pub trait DataHandler {
    type Fragment;

    fn pair_make(&mut self, head: TypedValue, tail: TypedValue) -> Result<PairId, EvalError>;
    fn pair_head(&self, pair: PairId) -> Result<TypedValue, EvalError>;
    fn pair_tail(&self, pair: PairId) -> Result<TypedValue, EvalError>;
    fn pair_set_head(&mut self, pair: PairId, value: TypedValue) -> Result<(), EvalError>;
    fn pair_set_tail(&mut self, pair: PairId, value: TypedValue) -> Result<(), EvalError>;

    fn array_make(
        &mut self,
        element_type: Option<DataType>,
        elements: Vec<TypedValue>,
    ) -> Result<ArrayId, EvalError>;
    fn array_length(&self, array: ArrayId) -> Result<usize, EvalError>;
    fn array_get(&self, array: ArrayId, index: usize) -> Result<TypedValue, EvalError>;
    /// The declared element type, if the array was created with one.
    fn array_type(&self, array: ArrayId) -> Result<Option<DataType>, EvalError>;
    fn array_set(&mut self, array: ArrayId, index: usize, value: TypedValue) -> Result<(), EvalError>;

    /// Allocates a native closure parented at the current frame.
    fn closure_make_native(
        &mut self,
        signature: NativeSignature,
        callback: NativeFn<Self::Fragment>,
    ) -> Result<ClosureId, EvalError>;
    fn closure_make(&mut self, closure: Closure<Self::Fragment>) -> Result<ClosureId, EvalError>;
    fn closure_arity(&self, closure: ClosureId) -> Result<usize, EvalError>;
    /// Calls `closure` to completion and returns its result.
    fn closure_call(&mut self, closure: ClosureId, args: &[TypedValue]) -> Result<TypedValue, EvalError>;

    fn opaque_make(&mut self, value: Rc<dyn Any>, immutable: bool) -> Result<OpaqueId, EvalError>;
    fn opaque_get(&self, opaque: OpaqueId) -> Result<Rc<dyn Any>, EvalError>;
    fn opaque_set(&mut self, opaque: OpaqueId, value: Rc<dyn Any>) -> Result<(), EvalError>;

    /// Records that `dependent` holds a reference to `dependee`.
    fn tie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError>;
    fn untie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError>;

    fn pair_assert(
        &self,
        pair: PairId,
        head_type: Option<DataType>,
        tail_type: Option<DataType>,
    ) -> Result<(), EvalError> {
        if let Some(expected) = head_type {
            let actual = self.pair_head(pair)?.data_type;
            assert_data_type("Pair head assertion failure", actual, expected)?;
        }
        if let Some(expected) = tail_type {
            let actual = self.pair_tail(pair)?.data_type;
            assert_data_type("Pair tail assertion failure", actual, expected)?;
        }
        Ok(())
    }

    fn array_type_at(&self, array: ArrayId, index: usize) -> Result<DataType, EvalError> {
        Ok(self.array_get(array, index)?.data_type)
    }

    fn array_assert(
        &self,
        array: ArrayId,
        element_type: Option<DataType>,
        length: Option<usize>,
    ) -> Result<(), EvalError> {
        if let Some(expected) = element_type {
            let actual = self.array_type(array)?;
            if actual != Some(expected) {
                return Err(EvalError::TypeMismatch {
                    context: "Array type assertion failure".to_string(),
                    expected: expected.label().to_string(),
                    actual: actual.map_or("untyped", |t| t.label()).to_string(),
                });
            }
        }
        if let Some(expected) = length {
            let actual = self.array_length(array)?;
            if actual != expected {
                return Err(EvalError::TypeMismatch {
                    context: "Array length assertion failure".to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }

    fn closure_arity_assert(&self, closure: ClosureId, arity: usize) -> Result<(), EvalError> {
        let actual = self.closure_arity(closure)?;
        if actual != arity {
            return Err(EvalError::arity_mismatch(
                "Closure arity assertion failure",
                arity,
                actual,
            ));
        }
        Ok(())
    }

    /// Passes `value` through if its tag satisfies `expected`.
    fn closure_returnvalue_checked(
        &self,
        value: TypedValue,
        expected: DataType,
    ) -> Result<TypedValue, EvalError> {
        assert_data_type("Closure return type assertion failure", value.data_type, expected)?;
        Ok(value)
    }

    /// Whether `xs` is the empty list or a chain of pairs ending in it.
    /// A chain that loops back on itself is not a list.
    fn is_list(&self, xs: &TypedValue) -> Result<bool, EvalError> {
        let mut seen = HashSet::new();
        let mut current = xs.clone();
        loop {
            match current.data_type {
                DataType::EmptyList => return Ok(true),
                DataType::Pair => {
                    let id = pair_id(&current)?;
                    if !seen.insert(id.id()) {
                        return Ok(false);
                    }
                    current = self.pair_tail(id)?;
                }
                _ => return Ok(false),
            }
        }
    }

    fn length(&self, xs: &TypedValue) -> Result<usize, EvalError> {
        if !self.is_list(xs)? {
            return Err(EvalError::type_mismatch(
                "length(xs) expects a list",
                DataType::List,
                xs.data_type,
            ));
        }
        Ok(self.list_to_vec(xs)?.len())
    }

    /// Builds a list holding `elements` in order.
    fn list(&mut self, elements: Vec<TypedValue>) -> Result<TypedValue, EvalError> {
        let mut list = TypedValue::empty_list();
        for element in elements.into_iter().rev() {
            let pair = self.pair_make(element, list)?;
            list = TypedValue::reference(DataType::Pair, pair.id());
        }
        Ok(list)
    }

    /// The elements of a proper list, first to last.
    fn list_to_vec(&self, xs: &TypedValue) -> Result<Vec<TypedValue>, EvalError> {
        let mut elements = Vec::new();
        let mut seen = HashSet::new();
        let mut current = xs.clone();
        loop {
            match current.data_type {
                DataType::EmptyList => return Ok(elements),
                DataType::Pair => {
                    let id = pair_id(&current)?;
                    if !seen.insert(id.id()) {
                        return Err(EvalError::Evaluator("Input is a circular list".to_string()));
                    }
                    elements.push(self.pair_head(id)?);
                    current = self.pair_tail(id)?;
                }
                other => {
                    return Err(EvalError::type_mismatch(
                        "Input is not a list",
                        DataType::List,
                        other,
                    ));
                }
            }
        }
    }

    /// Folds `xs` from the right: `op(x1, op(x2, ... op(xn, initial)))`.
    fn accumulate(
        &mut self,
        op: ClosureId,
        initial: TypedValue,
        xs: &TypedValue,
    ) -> Result<TypedValue, EvalError> {
        self.closure_arity_assert(op, 2)?;
        let elements = self.list_to_vec(xs)?;
        let mut result = initial;
        for element in elements.into_iter().rev() {
            result = self.closure_call(op, &[element, result])?;
        }
        Ok(result)
    }
}

fn pair_id(value: &TypedValue) -> Result<PairId, EvalError> {
    value
        .identifier()
        .map(PairId)
        .ok_or_else(|| EvalError::type_mismatch("Expected a pair", DataType::Pair, value.data_type))
}

impl<F: Clone + fmt::Debug + 'static> DataHandler for StepContext<'_, F> {
    type Fragment = F;

    fn pair_make(&mut self, head: TypedValue, tail: TypedValue) -> Result<PairId, EvalError> {
        self.state.make_pair(head, tail).map(PairId)
    }

    fn pair_head(&self, pair: PairId) -> Result<TypedValue, EvalError> {
        self.state.pair_head(pair.id())
    }

    fn pair_tail(&self, pair: PairId) -> Result<TypedValue, EvalError> {
        self.state.pair_tail(pair.id())
    }

    fn pair_set_head(&mut self, pair: PairId, value: TypedValue) -> Result<(), EvalError> {
        self.state.pair_set(pair.id(), true, value)
    }

    fn pair_set_tail(&mut self, pair: PairId, value: TypedValue) -> Result<(), EvalError> {
        self.state.pair_set(pair.id(), false, value)
    }

    fn array_make(
        &mut self,
        element_type: Option<DataType>,
        elements: Vec<TypedValue>,
    ) -> Result<ArrayId, EvalError> {
        self.state
            .make_array(element_type, elements.into_iter().collect())
            .map(ArrayId)
    }

    fn array_length(&self, array: ArrayId) -> Result<usize, EvalError> {
        self.state.array_length(array.id())
    }

    fn array_get(&self, array: ArrayId, index: usize) -> Result<TypedValue, EvalError> {
        self.state.array_get(array.id(), index as f64)
    }

    fn array_type(&self, array: ArrayId) -> Result<Option<DataType>, EvalError> {
        self.state.array_element_type(array.id())
    }

    fn array_set(&mut self, array: ArrayId, index: usize, value: TypedValue) -> Result<(), EvalError> {
        self.state.array_set(array.id(), index as f64, value)
    }

    fn closure_make_native(
        &mut self,
        signature: NativeSignature,
        callback: NativeFn<F>,
    ) -> Result<ClosureId, EvalError> {
        let parent_frame = self.state.current_frame();
        self.state
            .make_native_closure(NativeClosure {
                signature,
                parent_frame,
                callback,
            })
            .map(ClosureId)
    }

    fn closure_make(&mut self, closure: Closure<F>) -> Result<ClosureId, EvalError> {
        self.state.make_closure(closure).map(ClosureId)
    }

    fn closure_arity(&self, closure: ClosureId) -> Result<usize, EvalError> {
        self.state.closure_arity(closure.id())
    }

    fn closure_call(&mut self, closure: ClosureId, args: &[TypedValue]) -> Result<TypedValue, EvalError> {
        self.call_closure(closure.id(), args)
    }

    fn opaque_make(&mut self, value: Rc<dyn Any>, immutable: bool) -> Result<OpaqueId, EvalError> {
        self.state.make_opaque(value, immutable).map(OpaqueId)
    }

    fn opaque_get(&self, opaque: OpaqueId) -> Result<Rc<dyn Any>, EvalError> {
        self.state.opaque_get(opaque.id())
    }

    fn opaque_set(&mut self, opaque: OpaqueId, value: Rc<dyn Any>) -> Result<(), EvalError> {
        self.state.opaque_set(opaque.id(), value)
    }

    fn tie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        self.state.tie(dependent, dependee)
    }

    fn untie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        self.state.untie(dependent, dependee)
    }
}
