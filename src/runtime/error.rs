use crate::language::span::Span;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A runtime failure before it has been pinned to a source location.
/// Every kind is fatal; the evaluator attaches the offending span and
/// unwinds to the caller.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("type mismatch: expected {expected}, found {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected a referenceable value")]
    NotReferenceable,
    #[error("key is not present in the dict")]
    KeyNotFound,
    #[error("argument stack access out of range: {pos}")]
    StackAccess { pos: i64 },
    #[error("pop from an empty argument stack")]
    StackEmpty,
    #[error("dereference of a null pointer")]
    NullDereference,
    #[error("pointer target no longer exists")]
    DanglingPointer,
    #[error("cannot convert `{text}` to {target}")]
    Conversion { target: &'static str, text: String },
    #[error("name `{name}` is not bound in any visible scope")]
    NameResolution { name: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("position {index} out of range for a string of {len} characters")]
    Bounds { index: i64, len: usize },
    #[error("expected {expected} operands, found {found}")]
    Arity { expected: &'static str, found: usize },
    #[error("expected a value")]
    MissingValue,
    #[error("{message}")]
    Native { message: String },
}

impl RuntimeError {
    pub fn at(self, span: Span) -> FatalError {
        FatalError { error: self, span }
    }
}

/// A runtime failure bound to the span of the form being evaluated.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{error}")]
pub struct FatalError {
    pub error: RuntimeError,
    pub span: Span,
}

pub type EvalResult<T> = Result<T, FatalError>;
