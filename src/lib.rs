pub mod postfix;
pub mod runtime;
