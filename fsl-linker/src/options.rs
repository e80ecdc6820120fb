//! Linker configuration values
//!
//! `ModuleOptions` travels with one `set_module` call. `LinkerConfig` holds
//! the module-processing switches that stay fixed for a whole run, and
//! `StartupContract` describes the libc startup routine the entry trampoline
//! forwards into.

use serde::{Deserialize, Serialize};

/// Per-run module options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOptions {
    pub entry_point: String,
    pub optimize: bool,
}

impl ModuleOptions {
    pub fn new(entry_point: impl Into<String>, optimize: bool) -> Self {
        Self {
            entry_point: entry_point.into(),
            optimize,
        }
    }
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self::new("main", false)
    }
}

/// How `switch` terminators are handled before the module is handed over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchType {
    /// Leave switches untouched, the engine executes them natively
    #[default]
    Internal,
    /// Ordered chain of equality branches
    Simple,
    /// Balanced binary search over the case values
    General,
}

/// Which functions the `OptNone` stage marks when engine-call
/// optimisation is disabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptNoneScope {
    /// Every function in the module
    #[default]
    Module,
    /// Only functions calling a runtime engine primitive
    EngineCallers,
}

/// Module-processing switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Allow optimisation of functions that contain engine calls
    pub engine_call_optimisation: bool,
    pub opt_none_scope: OptNoneScope,
    pub switch_type: SwitchType,
    /// Do not run the structural verifier in `check_module`
    pub skip_verification: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            engine_call_optimisation: true,
            opt_none_scope: OptNoneScope::default(),
            switch_type: SwitchType::default(),
            skip_verification: false,
        }
    }
}

/// Shape of the libc startup routine the entry trampoline calls.
///
/// Parameter 0 receives the renamed user entry, `argc_index` and
/// `argv_index` receive the trampoline's own arguments and every other
/// parameter is passed as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupContract {
    pub function: String,
    pub arity: usize,
    pub argc_index: usize,
    pub argv_index: usize,
}

impl StartupContract {
    /// `__uClibc_main(main, argc, argv, app_init, app_fini, rtld_fini, stack_end)`
    pub fn uclibc() -> Self {
        Self {
            function: "__uClibc_main".to_string(),
            arity: 7,
            argc_index: 1,
            argv_index: 2,
        }
    }
}

impl Default for StartupContract {
    fn default() -> Self {
        Self::uclibc()
    }
}
