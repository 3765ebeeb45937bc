use std::fmt;

use crate::runtime::{
    data_type::DataType,
    error::{EvalError, assert_data_type},
    gc::Identifier,
    value::TypedValue,
};

use super::StepContext;

impl<F: Clone + fmt::Debug + 'static> StepContext<'_, F> {
    pub(super) fn execute_array_literal(
        &mut self,
        length: usize,
        element_type: Option<DataType>,
    ) -> Result<(), EvalError> {
        let elements = self.state.stash_pop_n(length)?;
        let id = self
            .state
            .make_array(element_type, elements.into_iter().collect())?;
        self.state
            .stash_push(TypedValue::reference(DataType::Array, id))
    }

    /// Stash: array, index (top).
    pub(super) fn execute_array_index(&mut self) -> Result<(), EvalError> {
        let operands = self.state.stash_pop_n(2)?;
        let array = self.expect_array("Cannot index array", &operands[0])?;
        let index = expect_index("Cannot index array", &operands[1])?;
        let element = self.state.array_get(array, index)?;
        self.state.stash_push(element)
    }

    /// Stash: array, index, value (top).
    pub(super) fn execute_array_assign(&mut self) -> Result<(), EvalError> {
        let mut operands = self.state.stash_pop_n(3)?;
        let array = self.expect_array("Cannot assign array index", &operands[0])?;
        let index = expect_index("Cannot assign array index", &operands[1])?;
        let value = operands.remove(2);
        self.state.array_set(array, index, value)
    }

    pub(super) fn execute_array_length(&mut self) -> Result<(), EvalError> {
        let operand = self.state.stash_pop()?;
        let array = self.expect_array("Cannot take length of array", &operand)?;
        let length = self.state.array_length(array)?;
        self.state.stash_push(TypedValue::number(length as f64))
    }

    fn expect_array(&self, context: &str, value: &TypedValue) -> Result<Identifier, EvalError> {
        self.state.expect_reference(context, value, DataType::Array)
    }
}

fn expect_index(context: &str, value: &TypedValue) -> Result<f64, EvalError> {
    assert_data_type(context, value.data_type, DataType::Number)?;
    value
        .as_number()
        .ok_or_else(|| EvalError::type_mismatch(context, DataType::Number, value.data_type))
}
