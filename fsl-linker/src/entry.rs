//! Entry-point bridging
//!
//! Before linking, the program's entry function may have to be routed
//! through a runtime: the POSIX model wraps the user entry so it can set up
//! its environment first, and a libc runtime starts execution in its own
//! startup routine, which is handed the user entry through a synthesized
//! trampoline.

use fsl_common::{LinkerError, Reporter};
use fsl_ir::{Function, IrBuilder, IrType, Module, Value};
use log::debug;
use std::path::Path;
use crate::module_util::{load_file, ModuleLoader};
use crate::options::StartupContract;

/// Name the POSIX runtime calls the user entry by
pub const POSIX_WRAPPED_MAIN: &str = "__klee_posix_wrapped_main";
/// POSIX runtime function that becomes the new entry
pub const POSIX_WRAPPER: &str = "__klee_posix_wrapper";
/// Prefix of the user entry once a libc runtime owns the entry symbol
pub const USER_ENTRY_PREFIX: &str = "__user_";

/// libc internals renamed to their public names in freshly loaded runtime
/// modules
const LIBC_RENAMES: [(&str, &str); 2] = [("__libc_open", "open"), ("__libc_fcntl", "fcntl")];

/// Route the user entry through the POSIX runtime's wrapper.
///
/// The user entry becomes `__klee_posix_wrapped_main` and the wrapper takes
/// the name `libc_prefix + entry`. With a libc prefix, the module of the
/// user entry keeps a declaration of `entry` for the libc bridge to find.
pub fn prepare_posix(modules: &mut [Module], entry: &str, libc_prefix: &str) -> Result<(), LinkerError> {
    let Some(user) = modules.iter_mut().find(|m| m.get_function(entry).is_some()) else {
        return Err(LinkerError::EntryNotFound { name: entry.to_string() });
    };
    user.rename_function(entry, POSIX_WRAPPED_MAIN);
    debug!("renamed entry '{entry}' in '{}' to {POSIX_WRAPPED_MAIN}", user.name);

    if !libc_prefix.is_empty() && user.get_function(entry).is_none() {
        if let Some(wrapped) = user.get_function(POSIX_WRAPPED_MAIN) {
            let mut declaration = Function::declaration(entry, wrapped.return_type.clone(), wrapped.param_types());
            declaration.is_vararg = wrapped.is_vararg;
            user.add_function(declaration);
        }
    }

    let Some(runtime) = modules.iter_mut().find(|m| m.get_function(POSIX_WRAPPER).is_some()) else {
        return Err(LinkerError::MissingSymbol {
            what: "POSIX wrapper",
            name: POSIX_WRAPPER.to_string(),
        });
    };
    let new_name = format!("{libc_prefix}{entry}");
    match runtime.get_function(&new_name) {
        Some(existing) if !existing.is_declaration() => {
            return Err(LinkerError::link(format!("symbol multiply defined: {new_name}")));
        }
        Some(_) => {
            runtime.remove_function(&new_name);
        }
        None => {}
    }
    runtime.rename_function(POSIX_WRAPPER, &new_name);
    Ok(())
}

/// Point uses of `old_name` at `new_name` if both exist, otherwise rename
/// `old_name`
pub fn replace_or_rename_function(module: &mut Module, old_name: &str, new_name: &str) {
    if module.get_function(old_name).is_none() {
        return;
    }
    if module.get_function(new_name).is_some() {
        module.replace_symbol_uses(old_name, new_name);
        module.remove_function(old_name);
    } else {
        module.rename_function(old_name, new_name);
    }
}

/// Load the libc runtime at `path` and make its startup routine the entry
pub fn link_with_libc(
    loader: &dyn ModuleLoader,
    path: &Path,
    modules: &mut Vec<Module>,
    entry: &str,
    contract: &StartupContract,
    reporter: &mut Reporter,
) -> Result<(), LinkerError> {
    let first_new = modules.len();
    load_file(loader, path, modules).map_err(|err| match err {
        LinkerError::Load { path, message } => LinkerError::load(path, format!("Cannot find uclibc: {message}")),
        other => other,
    })?;

    for module in &mut modules[first_new..] {
        for (old_name, new_name) in LIBC_RENAMES {
            replace_or_rename_function(module, old_name, new_name);
        }
    }

    create_libc_wrapper(modules, entry, contract)?;
    reporter.message(format!("NOTE: Using uclibc : {}", path.display()));
    Ok(())
}

/// Rename the user entry to `__user_<entry>` and synthesize
///
/// ```text
/// i32 entry(argc, argv) {
///     startup(__user_entry, argc, argv, 0, 0, 0, 0)
///     unreachable
/// }
/// ```
///
/// in the module of the startup routine. Nothing is modified if the startup
/// routine is missing or its arity does not match `contract`.
pub fn create_libc_wrapper(
    modules: &mut [Module],
    entry: &str,
    contract: &StartupContract,
) -> Result<(), LinkerError> {
    let Some(user_index) = modules.iter().position(|m| m.get_function(entry).is_some()) else {
        return Err(LinkerError::EntryNotFound { name: entry.to_string() });
    };
    let Some((startup_index, startup)) = modules
        .iter()
        .enumerate()
        .find_map(|(i, m)| m.get_function(&contract.function).map(|f| (i, f)))
    else {
        return Err(LinkerError::MissingStartup { name: contract.function.clone() });
    };

    let startup_params = startup.param_types();
    if startup_params.len() != contract.arity {
        return Err(LinkerError::StartupArity {
            name: contract.function.clone(),
            expected: contract.arity,
            found: startup_params.len(),
        });
    }
    let (Some(argc_type), Some(argv_type)) = (
        startup_params.get(contract.argc_index).cloned(),
        startup_params.get(contract.argv_index).cloned(),
    ) else {
        return Err(LinkerError::usage(format!(
            "startup contract of {} forwards arguments past its arity",
            contract.function
        )));
    };
    let startup_return = startup.return_type.clone();

    let user_name = format!("{USER_ENTRY_PREFIX}{entry}");
    let user_module = &mut modules[user_index];
    let user_signature = user_module
        .get_function(entry)
        .map(|f| (f.return_type.clone(), f.param_types(), f.is_vararg));
    user_module.rename_function(entry, &user_name);

    let startup_module = &mut modules[startup_index];
    if let Some((return_type, params, is_vararg)) = user_signature {
        if startup_module.get_function(&user_name).is_none() {
            let mut declaration = Function::declaration(user_name.clone(), return_type, params);
            declaration.is_vararg = is_vararg;
            startup_module.add_function(declaration);
        }
    }
    match startup_module.get_function(entry) {
        Some(existing) if !existing.is_declaration() => {
            return Err(LinkerError::link(format!("symbol multiply defined: {entry}")));
        }
        Some(_) => {
            startup_module.remove_function(entry);
        }
        None => {}
    }

    let mut builder = IrBuilder::new();
    builder.create_function(entry, IrType::I32);
    let argc = builder.add_parameter(argc_type).map_err(LinkerError::link)?;
    let argv = builder.add_parameter(argv_type).map_err(LinkerError::link)?;
    builder.create_block().map_err(LinkerError::link)?;

    let args = startup_params
        .iter()
        .enumerate()
        .map(|(index, ty)| match index {
            0 => Value::Function(user_name.clone()),
            i if i == contract.argc_index => Value::Temp(argc),
            i if i == contract.argv_index => Value::Temp(argv),
            _ => Value::zero_of(ty),
        })
        .collect();
    builder
        .build_call(Value::Function(contract.function.clone()), args, startup_return)
        .map_err(LinkerError::link)?;
    builder.build_unreachable().map_err(LinkerError::link)?;

    let Some(trampoline) = builder.finish_function() else {
        return Err(LinkerError::link(format!("could not build the {entry} trampoline")));
    };
    debug!("synthesized {entry} trampoline in '{}'", startup_module.name);
    startup_module.add_function(trampoline);
    Ok(())
}
