// luma: a Lua 5.4 compatible scripting runtime.
// Tree-walking evaluator with coroutines and a generational GC.

#[cfg(test)]
mod test;

pub mod gc;
pub mod runtime;
pub mod stdlib;
pub mod syntax;
pub mod value;

pub use runtime::{ErrorKind, LumaError, Runtime};
pub use syntax::{parse, Chunk};
pub use value::Value;

/// One-shot execution with the full standard library.
pub fn execute(source: &str) -> Result<Vec<Value>, LumaError> {
    let rt = Runtime::new();
    stdlib::open_all(&rt);
    rt.evaluate(source, None)
}
