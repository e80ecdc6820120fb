//! Marks functions `optimize_none` + `no_inline` so the optimizer leaves
//! them alone.

use fsl_ir::{Instruction, Module};
use std::collections::BTreeSet;
use crate::options::OptNoneScope;
use super::ModulePass;

/// Name prefixes of runtime engine primitives
pub const ENGINE_CALL_PREFIXES: [&str; 3] = ["klee_", "llsc_", "make_symbolic"];

pub struct OptNone {
    scope: OptNoneScope,
}

impl OptNone {
    pub fn new(scope: OptNoneScope) -> Self {
        Self { scope }
    }
}

fn is_engine_call(name: &str) -> bool {
    ENGINE_CALL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Functions containing a call or invoke of an engine primitive
fn engine_callers(module: &Module) -> BTreeSet<String> {
    module
        .functions
        .iter()
        .filter(|f| {
            f.instructions()
                .filter_map(Instruction::called_function)
                .any(is_engine_call)
        })
        .map(|f| f.name.clone())
        .collect()
}

impl ModulePass for OptNone {
    fn name(&self) -> &'static str {
        "optnone"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let selected = match self.scope {
            OptNoneScope::Module => None,
            OptNoneScope::EngineCallers => Some(engine_callers(module)),
        };

        let mut changed = false;
        for function in &mut module.functions {
            if selected.as_ref().is_some_and(|s| !s.contains(&function.name)) {
                continue;
            }
            if function.attributes.optimize_none {
                continue;
            }
            function.attributes.optimize_none = true;
            function.attributes.no_inline = true;
            changed = true;
        }
        changed
    }
}
