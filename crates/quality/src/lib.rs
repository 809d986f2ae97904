//! Quality checks (Layer 2)
//!
//! The check contract, the registry that resolves names and aliases into
//! configured check instances, and reusable building blocks for checks.

#![warn(missing_docs)]

pub mod check;
pub mod registry;
pub mod applicability;
pub mod command;

pub use check::{Check, CheckInstance};
pub use registry::{CheckFactory, CheckRegistry};
pub use command::{CommandCheck, CommandCheckBuilder, CommandCheckError};
