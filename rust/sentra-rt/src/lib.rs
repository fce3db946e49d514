//! Sentra Runtime
//!
//! Executes a compiled IR program (§4.5): the interpreter environment, the
//! reference resolver, the shared boolean-condition evaluator, the
//! host-populated tool registry, and the execution trace format.

pub mod condition;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod refs;
pub mod registry;
pub mod trace;

pub use env::Env;
pub use error::RuntimeError;
pub use interpreter::{ErrorAction, Interpreter, RunOutcome};
pub use refs::resolve_refs;
pub use registry::{ToolError, ToolFn, ToolRegistry};
pub use trace::{read_trace, write_trace, TraceRecord};
