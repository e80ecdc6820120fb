//! Transformation stage library
//!
//! Every stage is a `ModulePass` that mutates a module in place and reports
//! whether it changed anything. Stages are run in order by a `PassManager`.

use fsl_ir::Module;
use log::debug;

mod cfg_simplify;
mod function_alias;
mod intrinsic_cleaner;
mod lower_atomic;
mod lower_switch;
mod operand_type_check;
mod opt_none;
mod optimize;
mod phi_cleaner;
mod raise_asm;
mod scalarizer;
mod verifier;

pub use cfg_simplify::CfgSimplify;
pub use function_alias::FunctionAlias;
pub use intrinsic_cleaner::IntrinsicCleaner;
pub use lower_atomic::LowerAtomic;
pub use lower_switch::LowerSwitch;
pub use operand_type_check::OperandTypeCheck;
pub use opt_none::OptNone;
pub use optimize::Optimizer;
pub use phi_cleaner::PhiCleaner;
pub use raise_asm::RaiseAsm;
pub use scalarizer::Scalarizer;
pub use verifier::Verifier;

/// An in-place module transformation
pub trait ModulePass {
    fn name(&self) -> &'static str;

    /// Run over `module`, returning true if it was modified
    fn run(&mut self, module: &mut Module) -> bool;
}

/// Ordered list of stages
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: impl ModulePass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every stage in order. Returns true if any stage changed the module.
    pub fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for pass in &mut self.passes {
            let pass_changed = pass.run(module);
            debug!("pass {}: changed={}", pass.name(), pass_changed);
            changed |= pass_changed;
        }
        changed
    }
}

/// Allocates fresh temporaries and labels within one function
pub(crate) struct IdGen {
    next_temp: fsl_ir::TempId,
    next_label: fsl_ir::LabelId,
}

impl IdGen {
    pub(crate) fn for_function(function: &fsl_ir::Function) -> Self {
        Self {
            next_temp: function.next_temp_id(),
            next_label: function.next_label_id(),
        }
    }

    pub(crate) fn temp(&mut self) -> fsl_ir::TempId {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    pub(crate) fn label(&mut self) -> fsl_ir::LabelId {
        let id = self.next_label;
        self.next_label += 1;
        id
    }
}

#[cfg(test)]
mod tests;
