//! A small statically typed, Scala-flavoured REPL used as litbook's
//! built-in backend.

pub mod ast;
pub mod backend;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod runtime_value;
pub mod session;
pub mod types;

pub use backend::ReplBackend;
pub use error::ReplError;
pub use runtime_value::Value;
pub use session::{ReplSession, Transcript};
pub use types::Ty;
