//! File System Linker - Link Orchestration
//!
//! This crate turns a set of IR modules into the single module the engine
//! executes.
//!
//! ## Architecture
//!
//! - `module_util` - Loading, dependency-driven linking and symbol queries
//! - `entry` - POSIX and libc entry-point bridging
//! - `lmodule` - The working module grown round by round
//! - `linker` - The `set_module` orchestrator and the external-function table
//! - `passes` - Normalization, optimization and checking passes
//! - `externals` - Final report of what stays undefined
//! - `options` - Per-run options and processing switches

pub mod entry;
pub mod externals;
pub mod linker;
pub mod lmodule;
pub mod module_util;
pub mod options;
pub mod passes;

pub use entry::{create_libc_wrapper, link_with_libc, prepare_posix, replace_or_rename_function};
pub use externals::externals_and_globals_check;
pub use linker::{ExternalInfo, Linker, EXTERNAL_INFO};
pub use lmodule::WorkingModule;
pub use module_util::{link_modules, load_file, JsonLoader, ModuleLoader};
pub use options::{LinkerConfig, ModuleOptions, OptNoneScope, StartupContract, SwitchType};
