//! External-symbol classification
//!
//! Reports what the final module still expects from the outside world.
//! Symbols the engine models, runtime support symbols and toolchain
//! intrinsics are expected to stay undefined and are not reported.

use fsl_common::{is_intrinsic_name, Diagnostic, Reporter};
use fsl_ir::{Instruction, Module};
use std::collections::BTreeMap;
use crate::linker::EXTERNAL_INFO;

/// Externals whose presence makes a run suspicious
pub const UNSAFE_EXTERNALS: [&str; 5] = ["fork", "exec", "error", "raise", "kill"];

/// Name prefixes of symbols the engine runtime supplies
pub const RUNTIME_PREFIXES: [&str; 3] = ["klee_", "gs_", "make_symbolic"];

const INLINE_ASM_TEMPLATE: &str = "function \"%s\" has inline asm";

fn is_modelled(name: &str) -> bool {
    EXTERNAL_INFO.iter().any(|info| info.name == name)
}

fn is_runtime_support(name: &str) -> bool {
    RUNTIME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn undefined_reference(name: &str, is_variable: bool, unsafe_suffix: bool) -> String {
    let kind = if is_variable { "variable" } else { "function" };
    let suffix = if unsafe_suffix { " (UNSAFE)!" } else { "" };
    format!("undefined reference to {kind}: {name}{suffix}")
}

/// Report undefined externals and inline assembly in `module`.
///
/// Returns the diagnostics emitted by this call, in emission order.
/// Unsafe externals are reported after all other undefined references.
pub fn externals_and_globals_check(module: &Module, reporter: &mut Reporter) -> Vec<Diagnostic> {
    let mut emitted = Vec::new();
    // name -> is a variable
    let mut externals: BTreeMap<&str, bool> = BTreeMap::new();

    for function in &module.functions {
        if function.is_declaration() && module.use_count(&function.name) > 0 {
            externals.insert(&function.name, false);
        }
        let has_inline_asm = function
            .instructions()
            .any(|i| matches!(i, Instruction::Call { callee, .. } if callee.is_inline_asm()));
        if has_inline_asm {
            let message = format!("function \"{}\" has inline asm", function.name);
            emitted.extend(reporter.message_once(&function.name, INLINE_ASM_TEMPLATE, message));
        }
    }
    for global in &module.globals {
        if global.is_declaration() && module.use_count(&global.name) > 0 {
            externals.insert(&global.name, true);
        }
    }
    // Aliases define the symbol
    for alias in &module.aliases {
        externals.remove(alias.name.as_str());
    }

    let mut unsafe_found = Vec::new();
    for (name, is_variable) in externals {
        if is_modelled(name) || is_runtime_support(name) || is_intrinsic_name(name) {
            continue;
        }
        if UNSAFE_EXTERNALS.contains(&name) {
            unsafe_found.push((name, is_variable));
            continue;
        }
        emitted.push(reporter.message(undefined_reference(name, is_variable, false)));
    }
    for (name, is_variable) in unsafe_found {
        emitted.push(reporter.message(undefined_reference(name, is_variable, true)));
    }
    emitted
}
