//! Function alias resolution
//!
//! Every use of an alias that ultimately names a function is redirected to
//! that function and the alias is dropped. Aliases of data stay.

use fsl_ir::Module;
use log::trace;
use super::ModulePass;

pub struct FunctionAlias;

/// Follow an alias chain to the function it names
fn resolve_function(module: &Module, alias: &str) -> Option<String> {
    let mut current = alias.to_string();
    // Bounded by the alias count so cycles terminate
    for _ in 0..=module.aliases.len() {
        match module.get_alias(&current) {
            Some(alias) => current = alias.aliasee.clone(),
            None => return module.get_function(&current).map(|f| f.name.clone()),
        }
    }
    None
}

impl ModulePass for FunctionAlias {
    fn name(&self) -> &'static str {
        "function-alias"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let resolved: Vec<(String, String)> = module
            .aliases
            .iter()
            .filter_map(|a| resolve_function(module, &a.name).map(|target| (a.name.clone(), target)))
            .collect();

        for (alias, target) in &resolved {
            trace!("replacing alias {alias} with {target}");
            module.replace_symbol_uses(alias, target);
            module.remove_alias(alias);
        }
        !resolved.is_empty()
    }
}
