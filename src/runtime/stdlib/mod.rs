//! Native closures installed in the Global frame of every evaluator.
//!
//! Each entry is written against [`crate::runtime::data_handler::DataHandler`]
//! only, so it works with any language.

use crate::runtime::{
    closure::{NativeSignature, native_fn},
    data_type::DataType,
    error::EvalError,
    language::Language,
    vm::CseEvaluator,
};

mod list_ops;

use list_ops::{
    builtin_accumulate, builtin_array_to_list, builtin_is_list, builtin_length, builtin_list_to_array,
    builtin_pair, builtin_tail,
};

/// Names bound by [`install_prelude`], in installation order.
pub const PRELUDE: &[&str] = &[
    "pair",
    "tail",
    "is_list",
    "length",
    "list_to_array",
    "array_to_list",
    "accumulate",
];

/// Binds every prelude native in the Global frame.
pub fn install_prelude<L: Language>(evaluator: &mut CseEvaluator<L>) -> Result<(), EvalError> {
    evaluator.define_native(
        NativeSignature::new("pair", 2, DataType::Pair),
        native_fn(builtin_pair),
    )?;
    evaluator.define_native(
        NativeSignature::new("tail", 1, DataType::List).with_param_types(vec![DataType::Pair]),
        native_fn(builtin_tail),
    )?;
    evaluator.define_native(
        NativeSignature::new("is_list", 1, DataType::Boolean),
        native_fn(builtin_is_list),
    )?;
    evaluator.define_native(
        NativeSignature::new("length", 1, DataType::Number).with_param_types(vec![DataType::List]),
        native_fn(builtin_length),
    )?;
    evaluator.define_native(
        NativeSignature::new("list_to_array", 1, DataType::Array)
            .with_param_types(vec![DataType::List]),
        native_fn(builtin_list_to_array),
    )?;
    evaluator.define_native(
        NativeSignature::new("array_to_list", 1, DataType::List)
            .with_param_types(vec![DataType::Array]),
        native_fn(builtin_array_to_list),
    )?;
    evaluator.define_native(
        NativeSignature::new("accumulate", 3, DataType::Number).with_param_types(vec![
            DataType::Closure,
            DataType::Number,
            DataType::List,
        ]),
        native_fn(builtin_accumulate),
    )?;
    Ok(())
}
