//! Executor module for running protocol batches against muninlite.

mod error;
mod process;

pub use error::ExecutionError;
pub use process::*;
