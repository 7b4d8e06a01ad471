//! Logging and diagnostics plumbing.

mod tracing_init;

pub use tracing_init::{init_tracing, TracingError};
