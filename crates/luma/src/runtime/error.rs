// Errors and non-local control flow.
//
// The evaluator never throws: break/goto/return/error are an explicit result
// sum propagated through `Result`, unwinding via early returns. Protected
// regions catch only `Error`; `Close` (coroutine teardown) passes through
// every protected boundary.

use crate::value::Value;
use smol_str::SmolStr;
use thiserror::Error;

/// Host-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    TypeError,
    ArithError,
    IndexError,
    CallError,
    ConstViolation,
    CoroutineError,
    FinalizationError,
    ModuleError,
    /// Script-raised (`error(v)`) and other uncategorised runtime failures.
    RuntimeError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ArithError => "ArithError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::CallError => "CallError",
            ErrorKind::ConstViolation => "ConstViolation",
            ErrorKind::CoroutineError => "CoroutineError",
            ErrorKind::FinalizationError => "FinalizationError",
            ErrorKind::ModuleError => "ModuleError",
            ErrorKind::RuntimeError => "RuntimeError",
        }
    }
}

/// In-flight error: a first-class value plus the trace captured where it was
/// raised.
#[derive(Debug, Clone)]
pub struct RtError {
    pub kind: ErrorKind,
    pub value: Value,
    pub traceback: Vec<String>,
}

impl RtError {
    pub fn new(kind: ErrorKind, value: Value) -> Self {
        RtError {
            kind,
            value,
            traceback: Vec::new(),
        }
    }
}

/// Outcome sum for one evaluation step. `Ok(..)` is the Normal case;
/// everything non-local travels here.
#[derive(Debug)]
pub enum Control {
    Break,
    Goto(SmolStr),
    Return(Vec<Value>),
    Error(RtError),
    /// Coroutine close/teardown unwind. Runs closers like an error but no
    /// pcall may catch it; carries the first `__close` failure, if any.
    Close(Option<RtError>),
}

pub type Eval<T> = Result<T, Control>;

/// Error on the host boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LumaError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Vec<String>,
}

impl LumaError {
    pub fn syntax(message: String) -> Self {
        LumaError {
            kind: ErrorKind::SyntaxError,
            message,
            trace: Vec::new(),
        }
    }
}

impl From<crate::syntax::SyntaxError> for LumaError {
    fn from(e: crate::syntax::SyntaxError) -> Self {
        LumaError::syntax(e.to_string())
    }
}
