//! Execution layer - dependency resolution, scheduling, and result collection.

#![warn(missing_docs)]

pub mod dependency;
pub mod engine;
pub mod error;
pub mod observer;
pub mod scheduler;

pub use dependency::{DepGraph, DependencyResolver, DisabledCheck};
pub use engine::{run_checks, CheckExecutor, ExecutorConfig, RunOptions};
pub use error::{ExecutionError, Result};
pub use observer::{ExecutionObserver, NoopObserver, ProgressCallback};
pub use scheduler::{Budget, ResourceScheduler, DEFAULT_MAX_CONCURRENT};
