use std::{fmt, rc::Rc};

use im_rc::OrdSet;

use crate::runtime::{
    data_type::DataType,
    error::EvalError,
    gc::Identifier,
    instruction::{Instruction, block_refs},
    value::TypedValue,
    vm::StepContext,
};

/// Host callback backing a native closure.
///
/// The callback runs inside the step that applied it and receives the open
/// step as its data handler. Closures whose return type is `Unassigned`
/// should return [`TypedValue::unassigned`].
pub type NativeFn<F> =
    Rc<dyn Fn(&mut StepContext<'_, F>, &[TypedValue]) -> Result<TypedValue, EvalError>>;

/// Wraps a Rust closure as a [`NativeFn`].
pub fn native_fn<F, C>(callback: C) -> NativeFn<F>
where
    C: Fn(&mut StepContext<'_, F>, &[TypedValue]) -> Result<TypedValue, EvalError> + 'static,
{
    Rc::new(callback)
}

/// A closure whose body is a sequence of machine instructions.
#[derive(Debug, Clone)]
pub struct Closure<F> {
    pub arity: usize,
    pub param_types: Option<Rc<[DataType]>>,
    pub param_names: Rc<[String]>,
    pub name: Option<String>,
    pub parent_frame: Identifier,
    /// Stored in Control order: the last instruction runs first.
    pub body: Rc<[Instruction<F>]>,
}

impl<F: Clone> Closure<F> {
    pub fn references(&self) -> OrdSet<Identifier> {
        let mut refs = block_refs(&self.body);
        refs.insert(self.parent_frame);
        refs
    }
}

/// Shape of a native closure, independent of its callback.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSignature {
    pub name: Option<String>,
    pub arity: usize,
    pub param_types: Option<Vec<DataType>>,
    /// `Unassigned` marks a closure that produces nothing.
    pub return_type: DataType,
}

impl NativeSignature {
    pub fn new(name: &str, arity: usize, return_type: DataType) -> Self {
        Self {
            name: Some(name.to_string()),
            arity,
            param_types: None,
            return_type,
        }
    }

    pub fn with_param_types(mut self, param_types: Vec<DataType>) -> Self {
        self.param_types = Some(param_types);
        self
    }

    pub fn is_void(&self) -> bool {
        self.return_type == DataType::Unassigned
    }
}

/// A closure implemented by the host.
#[derive(Clone)]
pub struct NativeClosure<F> {
    pub signature: NativeSignature,
    pub parent_frame: Identifier,
    pub callback: NativeFn<F>,
}

impl<F> fmt::Debug for NativeClosure<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeClosure")
            .field("signature", &self.signature)
            .field("parent_frame", &self.parent_frame)
            .finish_non_exhaustive()
    }
}

/// Fails unless every argument satisfies the declared parameter type.
pub(crate) fn check_param_types(
    param_types: Option<&[DataType]>,
    args: &[TypedValue],
) -> Result<(), EvalError> {
    let Some(param_types) = param_types else {
        return Ok(());
    };
    for (arg, expected) in args.iter().zip(param_types) {
        if !arg.data_type.satisfies(*expected) {
            return Err(EvalError::type_mismatch(
                "Argument type mismatch",
                *expected,
                arg.data_type,
            ));
        }
    }
    Ok(())
}
