//! Error handling for the File System Linker
//!
//! Every condition that must stop the pipeline is a `LinkerError`. Library
//! code only ever returns it; the driver is the single place that turns it
//! into a `LINKER: ERROR:` line and a non-zero exit status.

use thiserror::Error;

/// Fatal linker error. No partial module is ever produced alongside one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkerError {
    #[error("Entry function '{name}' not found in module.")]
    EntryNotFound { name: String },

    #[error("Function {name} defined in different modules ({first} and {second})")]
    EntryMultiplyDefined {
        name: String,
        first: String,
        second: String,
    },

    #[error("Could not link files {message}")]
    Link { message: String },

    #[error("{what} '{name}' not found")]
    MissingSymbol { what: &'static str, name: String },

    #[error("Could not add {name} wrapper")]
    MissingStartup { name: String },

    #[error("Imported {name} wrapper does not have the correct number of arguments (expected {expected}, found {found})")]
    StartupArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("llvm.global_ctors and llvm.global_dtors not supported")]
    GlobalCtorsDtors,

    #[error("Broken module found: {}", .errors.join("; "))]
    InvalidModule { errors: Vec<String> },

    #[error("Unexpected instruction operand types detected")]
    OperandTypes { violations: Vec<String> },

    #[error("error loading '{path}': {message}")]
    Load { path: String, message: String },

    #[error("only accept 64bit architecture but module is {triple}")]
    UnsupportedTarget { triple: String },

    #[error("{message}")]
    Usage { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl LinkerError {
    /// Create a link error
    pub fn link(message: impl Into<String>) -> Self {
        LinkerError::Link { message: message.into() }
    }

    /// Create a loader error for the given path
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        LinkerError::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a usage error (API misuse by the caller)
    pub fn usage(message: impl Into<String>) -> Self {
        LinkerError::Usage { message: message.into() }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for LinkerError {
    fn from(err: std::io::Error) -> Self {
        LinkerError::Io {
            message: err.to_string(),
        }
    }
}
