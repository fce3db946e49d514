//! Sentra Core
//!
//! Shared types used across the compiler, runtime, and provider crates:
//! source spans, the runtime value model, and money arithmetic.

pub mod span;
pub mod value;

pub use span::Span;
pub use value::{Currency, Money, Row, Value};
