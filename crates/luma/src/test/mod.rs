// Test module organization

pub mod test_basic;
pub mod test_closures;
pub mod test_control_flow;
pub mod test_coroutine;
pub mod test_errors;
pub mod test_gc;
pub mod test_metamethods;
pub mod test_operators;
pub mod test_package;
pub mod test_syntax;

use crate::{stdlib, LumaError, Runtime, Value};

/// Fresh runtime with the full standard library.
pub fn rt() -> Runtime {
    let rt = Runtime::new();
    stdlib::open_all(&rt);
    rt
}

pub fn run(source: &str) -> Result<Vec<Value>, LumaError> {
    rt().evaluate(source, Some("test.luma"))
}

/// Run a snippet whose own `assert` calls carry the checks.
#[track_caller]
pub fn check(source: &str) {
    if let Err(e) = run(source) {
        panic!("script failed: {}\n{}", e.message, e.trace.join("\n"));
    }
}

/// Expect the snippet to fail, returning the host-visible error.
#[track_caller]
pub fn check_fails(source: &str) -> LumaError {
    match run(source) {
        Ok(_) => panic!("script unexpectedly succeeded"),
        Err(e) => e,
    }
}
