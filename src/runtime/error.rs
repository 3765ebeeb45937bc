use thiserror::Error;

use crate::runtime::data_type::DataType;

/// Every failure the machine can report.
///
/// Everything except [`EvalError::Internal`] is caused by the program being
/// evaluated and is reported to the caller through the rejected completion.
/// `Internal` means the core or its host broke a contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{context} (expected {expected}, got {actual})")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },
    #[error("name not found: {0}")]
    NameNotFound(String),
    #[error("cannot assign to constant: {0}")]
    ConstantAssignment(String),
    #[error("index {index} out of range for array of length {length}")]
    IndexOutOfRange { index: f64, length: usize },
    #[error("{0}")]
    Evaluator(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`EvalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Name,
    Constant,
    Range,
    Evaluator,
    Internal,
}

impl EvalError {
    pub fn type_mismatch(context: &str, expected: DataType, actual: DataType) -> Self {
        EvalError::TypeMismatch {
            context: context.to_string(),
            expected: expected.label().to_string(),
            actual: actual.label().to_string(),
        }
    }

    pub fn arity_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        EvalError::TypeMismatch {
            context: context.to_string(),
            expected: format!("{} arguments", expected),
            actual: actual.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EvalError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::TypeMismatch { .. } => ErrorKind::Type,
            EvalError::NameNotFound(_) => ErrorKind::Name,
            EvalError::ConstantAssignment(_) => ErrorKind::Constant,
            EvalError::IndexOutOfRange { .. } => ErrorKind::Range,
            EvalError::Evaluator(_) => ErrorKind::Evaluator,
            EvalError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Fails with a `TypeMismatch` unless `actual` satisfies `expected`.
pub fn assert_data_type(context: &str, actual: DataType, expected: DataType) -> Result<(), EvalError> {
    if actual.satisfies(expected) {
        Ok(())
    } else {
        Err(EvalError::type_mismatch(context, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_message_names_both_tags() {
        let err = EvalError::type_mismatch("Cannot index array", DataType::Array, DataType::Number);
        assert_eq!(
            err.to_string(),
            "Cannot index array (expected ARRAY, got NUMBER)"
        );
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn only_internal_errors_are_internal() {
        assert!(EvalError::internal("Stash is empty!").is_internal());
        assert!(!EvalError::NameNotFound("x".into()).is_internal());
    }

    #[test]
    fn assert_data_type_accepts_list_members() {
        assert!(assert_data_type("len", DataType::EmptyList, DataType::List).is_ok());
        assert!(assert_data_type("len", DataType::Number, DataType::List).is_err());
    }
}
