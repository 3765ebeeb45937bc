use std::fmt;

use crate::runtime::{
    data_handler::DataHandler,
    data_type::DataType,
    error::EvalError,
    gc::{ArrayId, ClosureId, PairId},
    value::TypedValue,
    vm::StepContext,
};

fn arg_pair(args: &[TypedValue], index: usize, name: &str) -> Result<PairId, EvalError> {
    let value = &args[index];
    match (value.data_type, value.identifier()) {
        (DataType::Pair, Some(id)) => Ok(PairId(id)),
        _ => Err(EvalError::type_mismatch(
            &format!("{} expects a pair", name),
            DataType::Pair,
            value.data_type,
        )),
    }
}

fn arg_array(args: &[TypedValue], index: usize, name: &str) -> Result<ArrayId, EvalError> {
    let value = &args[index];
    match (value.data_type, value.identifier()) {
        (DataType::Array, Some(id)) => Ok(ArrayId(id)),
        _ => Err(EvalError::type_mismatch(
            &format!("{} expects an array", name),
            DataType::Array,
            value.data_type,
        )),
    }
}

fn arg_closure(args: &[TypedValue], index: usize, name: &str) -> Result<ClosureId, EvalError> {
    let value = &args[index];
    match (value.data_type, value.identifier()) {
        (DataType::Closure, Some(id)) => Ok(ClosureId(id)),
        _ => Err(EvalError::type_mismatch(
            &format!("{} expects a closure", name),
            DataType::Closure,
            value.data_type,
        )),
    }
}

/// pair(head, tail) - Allocates a pair.
pub(super) fn builtin_pair<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    let pair = ctx.pair_make(args[0].clone(), args[1].clone())?;
    Ok(TypedValue::reference(DataType::Pair, pair.id()))
}

/// tail(xs) - The rest of a list.
pub(super) fn builtin_tail<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    let pair = arg_pair(args, 0, "tail")?;
    ctx.pair_tail(pair)
}

/// is_list(xs) - Whether `xs` is a proper list.
pub(super) fn builtin_is_list<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    Ok(TypedValue::boolean(ctx.is_list(&args[0])?))
}

/// length(xs) - Number of elements in a proper list.
pub(super) fn builtin_length<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    Ok(TypedValue::number(ctx.length(&args[0])? as f64))
}

/// list_to_array(xs) - Copies a list's elements into a fresh array.
pub(super) fn builtin_list_to_array<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    let elements = ctx.list_to_vec(&args[0])?;
    let array = ctx.array_make(None, elements)?;
    Ok(TypedValue::reference(DataType::Array, array.id()))
}

/// array_to_list(arr) - Builds a list from an array's elements.
pub(super) fn builtin_array_to_list<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    let array = arg_array(args, 0, "array_to_list")?;
    let elements = (0..ctx.array_length(array)?)
        .map(|i| ctx.array_get(array, i))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.list(elements)
}

/// accumulate(op, initial, xs) - Right fold of a list of numbers.
pub(super) fn builtin_accumulate<F: Clone + fmt::Debug + 'static>(
    ctx: &mut StepContext<'_, F>,
    args: &[TypedValue],
) -> Result<TypedValue, EvalError> {
    let op = arg_closure(args, 0, "accumulate")?;
    let result = ctx.accumulate(op, args[1].clone(), &args[2])?;
    ctx.closure_returnvalue_checked(result, DataType::Number)
}
