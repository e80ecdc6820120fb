//! Link orchestrator
//!
//! `Linker::set_module` turns a list of loaded modules into the single
//! prepared module handed to the engine:
//!
//! 1. link and instrument until a round absorbs nothing
//! 2. hand runtime-modelled externals over to the engine
//! 3. optimize and normalize once, keeping the preserved names intact
//! 4. check the result

use fsl_common::LinkerError;
use fsl_ir::Module;
use log::{debug, info};
use crate::lmodule::WorkingModule;
use crate::options::{LinkerConfig, ModuleOptions};

/// Runtime knowledge about an external function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalInfo {
    pub name: &'static str,
    /// Terminates the process
    pub does_not_return: bool,
    pub has_return_value: bool,
    /// Keep an existing definition
    pub do_not_override: bool,
}

const fn returns(name: &'static str, has_return_value: bool) -> ExternalInfo {
    ExternalInfo {
        name,
        does_not_return: false,
        has_return_value,
        do_not_override: false,
    }
}

const fn does_not_return(name: &'static str) -> ExternalInfo {
    ExternalInfo {
        name,
        does_not_return: true,
        has_return_value: false,
        do_not_override: false,
    }
}

/// Externals the engine models itself
pub const EXTERNAL_INFO: [ExternalInfo; 17] = [
    does_not_return("__assert_rtn"),
    does_not_return("__assert_fail"),
    does_not_return("__assert"),
    does_not_return("_assert"),
    does_not_return("abort"),
    does_not_return("_exit"),
    ExternalInfo {
        name: "exit",
        does_not_return: true,
        has_return_value: false,
        do_not_override: true,
    },
    returns("calloc", true),
    returns("free", false),
    returns("__errno_location", true),
    returns("malloc", true),
    returns("memalign", true),
    returns("realloc", true),
    // Emitted by -fsanitize=signed-integer-overflow / unsigned-integer-overflow
    returns("__ubsan_handle_add_overflow", false),
    returns("__ubsan_handle_sub_overflow", false),
    returns("__ubsan_handle_mul_overflow", false),
    returns("__ubsan_handle_divrem_overflow", false),
];

/// Free-standing library calls the optimizer must not touch
const PRESERVED_LIBRARY_CALLS: [&str; 4] = ["memset", "memcpy", "memcmp", "memmove"];

/// Turn every modelled external present in the module into a declaration
/// the engine implements, returning the names that must be preserved
fn prepare_external_functions(lmodule: &mut WorkingModule) -> Vec<String> {
    let mut preserved = Vec::new();
    for info in &EXTERNAL_INFO {
        let Some(function) = lmodule.module_mut().get_function_mut(info.name) else {
            continue;
        };
        if info.do_not_override && !function.is_declaration() {
            continue;
        }
        if info.does_not_return {
            function.attributes.no_return = true;
        }
        if !function.is_declaration() {
            debug!("replacing definition of {} with the engine model", info.name);
            function.delete_body();
        }
        preserved.push(info.name.to_string());
        lmodule.mark_internal(info.name);
    }
    preserved
}

#[derive(Default)]
pub struct Linker {
    lmodule: Option<WorkingModule>,
    config: LinkerConfig,
}

impl Linker {
    pub fn new(config: LinkerConfig) -> Self {
        Self { lmodule: None, config }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Link `modules` into one prepared module.
    ///
    /// Modules that were never needed are left in `modules`. Only one module
    /// can be registered per linker.
    pub fn set_module(&mut self, modules: &mut Vec<Module>, opts: &ModuleOptions) -> Result<&Module, LinkerError> {
        if self.lmodule.is_some() {
            return Err(LinkerError::usage("can only register one module"));
        }
        if modules.is_empty() {
            return Err(LinkerError::usage("no input modules"));
        }

        let mut lmodule = WorkingModule::new(self.config.clone());

        let mut rounds = 0;
        while lmodule.link(modules, &opts.entry_point)? {
            rounds += 1;
            lmodule.instrument();
        }
        info!("linking finished after {rounds} round(s), {} module(s) unused", modules.len());

        let mut preserved = prepare_external_functions(&mut lmodule);
        preserved.push(opts.entry_point.clone());
        preserved.extend(PRESERVED_LIBRARY_CALLS.iter().map(|name| name.to_string()));

        lmodule.optimise_and_prepare(opts, &preserved)?;
        lmodule.check_module()?;

        Ok(self.lmodule.insert(lmodule).module())
    }

    pub fn module(&self) -> Option<&Module> {
        self.lmodule.as_ref().map(WorkingModule::module)
    }

    pub fn working_module(&self) -> Option<&WorkingModule> {
        self.lmodule.as_ref()
    }

    /// Hand the prepared module over to the caller
    pub fn into_module(self) -> Option<Module> {
        self.lmodule.map(WorkingModule::into_module)
    }
}
