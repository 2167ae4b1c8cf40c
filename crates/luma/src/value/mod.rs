// Runtime value model.

mod coroutine;
mod function;
mod string;
mod table;
mod userdata;
#[allow(clippy::module_inception)]
mod value;

pub use coroutine::{CoroMachine, CoroStatus, Coroutine};
pub use function::{Function, NativeCall, NativeFn, NativeFunction, ScriptClosure};
pub use string::LumaStr;
pub use table::{KeyError, Table, TableKey, WeakMode};
pub use userdata::Userdata;
pub use value::{float_to_int_exact, format_float, Value};
