pub mod assemble;
pub mod backend;
pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod parser;
pub mod render;
pub mod session;

pub use backend::{Backend, ExecutionResult};
pub use build::report::{BuildReport, DocumentReport, DocumentStatus};
pub use build::{CompileError, CompileOptions, build, compile_document};
pub use config::{BackendConfig, BuildConfig, ConfigError, ConfigFile, FailPolicy};
pub use document::{CodeSegment, Document, Mode, ProseSegment, Segment};
pub use error::{Error, Failure, FailureKind, Result};
