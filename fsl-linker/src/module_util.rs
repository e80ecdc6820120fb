//! Module linking and loading
//!
//! `link_modules` merges a list of candidate modules into one. With an empty
//! entry name every candidate is merged; otherwise only the modules needed
//! to resolve the symbols reachable from the entry module are pulled in and
//! the rest stay in the list for a later round.

use fsl_common::{is_intrinsic_name, LinkerError};
use fsl_ir::{Alias, Function, GlobalVariable, Module, Value};
use log::{debug, trace, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// File extension of module archives
pub const ARCHIVE_EXTENSION: &str = "jsonar";

/// Names declared in `module` that no non-local symbol of it defines.
/// Intrinsic names are never reported.
pub fn undefined_symbols(module: &Module) -> BTreeSet<String> {
    let mut undefined = BTreeSet::new();
    let mut defined = BTreeSet::new();

    for function in &module.functions {
        if function.is_declaration() {
            undefined.insert(function.name.clone());
        } else if !function.linkage.is_local() {
            defined.insert(function.name.clone());
        }
    }
    for global in &module.globals {
        if global.is_declaration() {
            undefined.insert(global.name.clone());
        } else if !global.linkage.is_local() {
            defined.insert(global.name.clone());
        }
    }
    for alias in &module.aliases {
        if !alias.linkage.is_local() {
            defined.insert(alias.name.clone());
        }
    }

    undefined.retain(|name| !defined.contains(name) && !is_intrinsic_name(name));
    undefined
}

/// `module` provides a definition of `name` visible to other modules
fn exports(module: &Module, name: &str) -> bool {
    module.defines(name) && module.linkage_of(name).is_some_and(|l| !l.is_local())
}

/// Link the candidates in `modules` together.
///
/// Modules merged into the result are removed from `modules`; the ones that
/// were not needed are left in place.
pub fn link_modules(modules: &mut Vec<Module>, entry_function: &str) -> Result<Module, LinkerError> {
    if entry_function.is_empty() {
        // Link everything into the last module
        let Some(mut composite) = modules.pop() else {
            return Err(LinkerError::link("no modules to link"));
        };
        for module in modules.drain(..) {
            link_two_modules(&mut composite, module)?;
        }
        return Ok(composite);
    }

    let mut entry_index: Option<usize> = None;
    for (index, module) in modules.iter().enumerate() {
        let defines_entry = module
            .get_function(entry_function)
            .is_some_and(|f| !f.is_declaration());
        if !defines_entry {
            continue;
        }
        if let Some(first) = entry_index {
            return Err(LinkerError::EntryMultiplyDefined {
                name: entry_function.to_string(),
                first: modules[first].name.clone(),
                second: module.name.clone(),
            });
        }
        entry_index = Some(index);
    }
    let Some(entry_index) = entry_index else {
        return Err(LinkerError::EntryNotFound {
            name: entry_function.to_string(),
        });
    };

    let mut composite = modules.remove(entry_index);
    debug!("entry '{}' found in module '{}'", entry_function, composite.name);

    loop {
        let undefined = undefined_symbols(&composite);
        if undefined.is_empty() {
            break;
        }
        trace!("undefined symbols: {undefined:?}");

        let provider = modules
            .iter()
            .position(|module| undefined.iter().any(|symbol| exports(module, symbol)));
        let Some(provider) = provider else {
            break;
        };
        let module = modules.remove(provider);
        debug!("linking '{}' to resolve undefined symbols", module.name);
        link_two_modules(&mut composite, module)?;
    }

    Ok(composite)
}

/// Merge `src` into `dest`.
///
/// Definitions replace declarations, weak and link-once definitions yield to
/// strong ones and clashing local symbols are renamed apart.
pub fn link_two_modules(dest: &mut Module, mut src: Module) -> Result<(), LinkerError> {
    trace!("merging module '{}' into '{}'", src.name, dest.name);

    if dest.target_triple.is_empty() {
        dest.target_triple = src.target_triple.clone();
    } else if !src.target_triple.is_empty() && src.target_triple != dest.target_triple {
        warn!(
            "linking module '{}' with target '{}' into '{}' with target '{}'",
            src.name, src.target_triple, dest.name, dest.target_triple
        );
    }
    if dest.data_layout.is_none() {
        dest.data_layout = src.data_layout.clone();
    }

    rename_local_clashes(dest, &mut src);

    let Module { functions, globals, aliases, .. } = src;
    for function in functions {
        merge_function(dest, function)?;
    }
    for global in globals {
        merge_global(dest, global)?;
    }
    for alias in aliases {
        merge_alias(dest, alias)?;
    }
    Ok(())
}

fn fresh_name(dest: &Module, src: &Module, base: &str) -> String {
    (1u64..)
        .map(|n| format!("{base}.{n}"))
        .find(|candidate| !dest.has_symbol(candidate) && !src.has_symbol(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Local symbols never bind across modules: give every clashing one a
/// fresh name before merging.
fn rename_local_clashes(dest: &mut Module, src: &mut Module) {
    for name in src.local_symbols() {
        if dest.has_symbol(&name) {
            let new_name = fresh_name(dest, src, &name);
            trace!("renaming local '{name}' of '{}' to '{new_name}'", src.name);
            src.rename_symbol(&name, &new_name);
        }
    }
    for name in dest.local_symbols() {
        if src.has_symbol(&name) {
            let new_name = fresh_name(dest, src, &name);
            trace!("renaming local '{name}' of '{}' to '{new_name}'", dest.name);
            dest.rename_symbol(&name, &new_name);
        }
    }
}

fn conflict(name: &str) -> LinkerError {
    LinkerError::link(format!("symbol '{name}' has conflicting definitions"))
}

fn multiply_defined(name: &str) -> LinkerError {
    LinkerError::link(format!("symbol multiply defined: {name}"))
}

fn merge_function(dest: &mut Module, function: Function) -> Result<(), LinkerError> {
    let Some(index) = dest.functions.iter().position(|f| f.name == function.name) else {
        if let Some(global) = dest.get_global(&function.name) {
            if function.is_declaration() && !global.is_declaration() {
                return Ok(());
            }
            return Err(conflict(&function.name));
        }
        if dest.get_alias(&function.name).is_some() {
            if function.is_declaration() {
                return Ok(());
            }
            return Err(multiply_defined(&function.name));
        }
        dest.functions.push(function);
        return Ok(());
    };

    let existing = &dest.functions[index];
    if function.is_declaration() {
        return Ok(());
    }
    if existing.is_declaration() || (existing.linkage.is_overridable() && !function.linkage.is_overridable()) {
        let mut function = function;
        function.attributes.no_return |= existing.attributes.no_return;
        dest.functions[index] = function;
        return Ok(());
    }
    if function.linkage.is_overridable() {
        return Ok(());
    }
    Err(multiply_defined(&function.name))
}

fn merge_global(dest: &mut Module, global: GlobalVariable) -> Result<(), LinkerError> {
    let Some(index) = dest.globals.iter().position(|g| g.name == global.name) else {
        if dest.get_function(&global.name).is_some() {
            return Err(conflict(&global.name));
        }
        if dest.get_alias(&global.name).is_some() {
            if global.is_declaration() {
                return Ok(());
            }
            return Err(multiply_defined(&global.name));
        }
        dest.globals.push(global);
        return Ok(());
    };

    let existing = &dest.globals[index];
    if global.is_declaration() {
        return Ok(());
    }
    if existing.is_declaration() || (existing.linkage.is_overridable() && !global.linkage.is_overridable()) {
        dest.globals[index] = global;
        return Ok(());
    }
    if global.linkage.is_overridable() {
        return Ok(());
    }
    Err(multiply_defined(&global.name))
}

fn merge_alias(dest: &mut Module, alias: Alias) -> Result<(), LinkerError> {
    if let Some(existing) = dest.get_alias(&alias.name) {
        if existing.aliasee == alias.aliasee {
            return Ok(());
        }
        return Err(multiply_defined(&alias.name));
    }
    // An alias defines its name: it supersedes a declaration
    if let Some(function) = dest.get_function(&alias.name) {
        if !function.is_declaration() {
            return Err(multiply_defined(&alias.name));
        }
        dest.remove_function(&alias.name);
    }
    if let Some(global) = dest.get_global(&alias.name) {
        if !global.is_declaration() {
            return Err(multiply_defined(&alias.name));
        }
        dest.remove_global(&alias.name);
    }
    dest.aliases.push(alias);
    Ok(())
}

/// True if `name` is used other than as the callee of a direct call
pub fn function_escapes(module: &Module, name: &str) -> bool {
    if module.aliases.iter().any(|a| a.aliasee == name) {
        return true;
    }
    let in_initializer = module
        .globals
        .iter()
        .filter_map(|g| g.initializer.as_ref())
        .any(|init| init.symbol_name() == Some(name));
    if in_initializer {
        return true;
    }
    module.functions.iter().flat_map(|f| f.instructions()).any(|instr| {
        let skip = usize::from(instr.callee().is_some());
        instr
            .operands()
            .into_iter()
            .skip(skip)
            .any(|v| matches!(v, Value::Function(f) if f == name))
    })
}

/// Source of IR modules
pub trait ModuleLoader {
    /// Read every module stored at `path`
    fn load(&self, path: &Path) -> Result<Vec<Module>, LinkerError>;
}

/// Loads modules serialized as JSON.
///
/// A file holding one object is a single module; a `.jsonar` file, or any
/// file holding an array, is an archive of modules. Unnamed modules are
/// named after the file stem.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl ModuleLoader for JsonLoader {
    fn load(&self, path: &Path) -> Result<Vec<Module>, LinkerError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| LinkerError::load(&display, e.to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| LinkerError::load(&display, e.to_string()))?;

        let is_archive = path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION);
        if is_archive && !value.is_array() {
            return Err(LinkerError::load(&display, "archive does not contain a list of modules"));
        }

        let archive = value.is_array();
        let mut modules = if archive {
            serde_json::from_value::<Vec<Module>>(value)
        } else {
            serde_json::from_value::<Module>(value).map(|module| vec![module])
        }
        .map_err(|e| LinkerError::load(&display, e.to_string()))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for (index, module) in modules.iter_mut().enumerate() {
            if module.name.is_empty() {
                module.name = if archive { format!("{stem}({index})") } else { stem.clone() };
            }
        }
        Ok(modules)
    }
}

/// Append every module stored at `path` to `modules`, returning how many
/// were added
pub fn load_file(
    loader: &dyn ModuleLoader,
    path: &Path,
    modules: &mut Vec<Module>,
) -> Result<usize, LinkerError> {
    let loaded = loader.load(path)?;
    let count = loaded.len();
    debug!("loaded {} module(s) from {}", count, path.display());
    modules.extend(loaded);
    Ok(count)
}
