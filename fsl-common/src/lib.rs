//! File System Linker - Common Types and Utilities
//! 
//! This crate contains shared identifiers, the fatal error type and the
//! diagnostic reporter used across all components of the linker.

pub mod error;
pub mod types;
pub mod diagnostics;

pub use error::LinkerError;
pub use types::*;
pub use diagnostics::{Diagnostic, OnceStore, Reporter, Severity};
