//! Working module
//!
//! The single module the linker grows round by round. It absorbs input
//! modules through `link`, is normalized by `instrument` after every round
//! that absorbed something, and is finally optimized and checked once.

use fsl_common::LinkerError;
use fsl_ir::{DataLayout, Module};
use log::{debug, info};
use std::collections::BTreeSet;
use crate::module_util::link_modules;
use crate::options::{LinkerConfig, ModuleOptions, SwitchType};
use crate::passes::{
    CfgSimplify, FunctionAlias, IntrinsicCleaner, LowerAtomic, LowerSwitch, ModulePass, OperandTypeCheck,
    OptNone, Optimizer, PassManager, PhiCleaner, RaiseAsm, Scalarizer, Verifier,
};

/// Global tables the engine cannot run
const UNSUPPORTED_GLOBALS: [&str; 2] = ["llvm.global_ctors", "llvm.global_dtors"];

pub struct WorkingModule {
    module: Module,
    layout: DataLayout,
    /// Functions whose behaviour the engine provides itself
    internal_functions: BTreeSet<String>,
    config: LinkerConfig,
}

impl WorkingModule {
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            module: Module::new("linked"),
            layout: DataLayout::default(),
            internal_functions: BTreeSet::new(),
            config,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    pub fn internal_functions(&self) -> &BTreeSet<String> {
        &self.internal_functions
    }

    pub fn mark_internal(&mut self, name: impl Into<String>) {
        self.internal_functions.insert(name.into());
    }

    /// Absorb whatever `modules` can contribute. Returns true if at least one
    /// input module was consumed.
    pub fn link(&mut self, modules: &mut Vec<Module>, entry_point: &str) -> Result<bool, LinkerError> {
        let count_before = modules.len();
        if !self.module.is_empty() {
            modules.push(std::mem::take(&mut self.module));
        }
        let total = modules.len();

        let linked = link_modules(modules, entry_point)?;
        let absorbed = total - modules.len();
        debug!("link round absorbed {absorbed} module(s), {} left", modules.len());

        self.module = linked;
        self.layout = DataLayout::from_triple(&self.module.target_triple);
        Ok(modules.len() != count_before)
    }

    /// Normalization run after every round that absorbed new code
    pub fn instrument(&mut self) {
        let mut passes = PassManager::new();
        passes.add(RaiseAsm);
        passes.add(Scalarizer);
        passes.add(LowerAtomic);
        passes.add(IntrinsicCleaner::new(self.layout));
        passes.run(&mut self.module);
    }

    pub fn optimise_and_prepare(&mut self, opts: &ModuleOptions, preserved: &[String]) -> Result<(), LinkerError> {
        if !self.config.engine_call_optimisation {
            OptNone::new(self.config.opt_none_scope).run(&mut self.module);
        }

        if opts.optimize {
            info!("optimizing module, {} preserved name(s)", preserved.len());
            Optimizer::new(preserved.iter().cloned()).run(&mut self.module);
        }

        if UNSUPPORTED_GLOBALS.iter().any(|name| self.module.get_global(name).is_some()) {
            return Err(LinkerError::GlobalCtorsDtors);
        }

        let mut passes = PassManager::new();
        passes.add(CfgSimplify);
        match self.config.switch_type {
            SwitchType::Internal => {}
            SwitchType::Simple => passes.add(LowerSwitch::simple()),
            SwitchType::General => passes.add(LowerSwitch::general()),
        }
        passes.add(IntrinsicCleaner::new(self.layout));
        passes.add(Scalarizer);
        passes.add(PhiCleaner);
        passes.add(FunctionAlias);
        debug!("prepare passes: {:?}", passes.names());
        passes.run(&mut self.module);
        Ok(())
    }

    /// Fatal unless the module is structurally valid and free of vector
    /// operands
    pub fn check_module(&mut self) -> Result<(), LinkerError> {
        if !self.config.skip_verification {
            let mut verifier = Verifier::new();
            verifier.run(&mut self.module);
            if !verifier.is_valid() {
                return Err(LinkerError::InvalidModule {
                    errors: verifier.errors().to_vec(),
                });
            }
        }

        let mut operand_check = OperandTypeCheck::new();
        operand_check.run(&mut self.module);
        if !operand_check.passed() {
            return Err(LinkerError::OperandTypes {
                violations: operand_check.violations().to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsl_ir::{BasicBlock, Function, GlobalVariable, Instruction, IrType, Value};
    use pretty_assertions::assert_eq;

    fn defines(name: &str, calls: &[&str]) -> Module {
        let mut module = Module::new(name);
        let mut function = Function::new(name, IrType::Void);
        let mut block = BasicBlock::new(0);
        for callee in calls {
            block.add_instruction(Instruction::Call {
                result: None,
                callee: Value::Function(callee.to_string()),
                args: Vec::new(),
                result_type: IrType::Void,
            });
            module.add_function(Function::declaration(*callee, IrType::Void, Vec::new()));
        }
        block.add_instruction(Instruction::Return(None));
        function.add_block(block);
        module.add_function(function);
        module
    }

    #[test]
    fn test_link_reaches_fixpoint() {
        let mut working = WorkingModule::new(LinkerConfig::default());
        let mut modules = vec![defines("main", &["a"]), defines("a", &[]), defines("unused", &[])];

        assert!(working.link(&mut modules, "main").unwrap());
        assert_eq!(modules.len(), 1);
        assert!(working.module().get_function("a").is_some_and(|f| !f.is_declaration()));

        assert!(!working.link(&mut modules, "main").unwrap());
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "unused");
    }

    #[test]
    fn test_link_adopts_layout() {
        let mut working = WorkingModule::new(LinkerConfig::default());
        let mut module = defines("main", &[]);
        module.target_triple = "riscv32-unknown-none-elf".to_string();

        working.link(&mut vec![module], "").unwrap();
        assert_eq!(working.layout().pointer_size, 4);
    }

    #[test]
    fn test_ctors_rejected() {
        let mut working = WorkingModule::new(LinkerConfig::default());
        working.link(&mut vec![defines("main", &[])], "main").unwrap();
        working
            .module_mut()
            .add_global(GlobalVariable::new("llvm.global_ctors", IrType::I32, Some(Value::Constant(0))));

        let result = working.optimise_and_prepare(&ModuleOptions::default(), &[]);
        assert_eq!(result, Err(LinkerError::GlobalCtorsDtors));
    }

    #[test]
    fn test_engine_call_optimisation_off_marks_everything() {
        let config = LinkerConfig {
            engine_call_optimisation: false,
            ..LinkerConfig::default()
        };
        let mut working = WorkingModule::new(config);
        working.link(&mut vec![defines("main", &["helper"])], "").unwrap();
        working.optimise_and_prepare(&ModuleOptions::default(), &[]).unwrap();

        assert!(working
            .module()
            .functions
            .iter()
            .all(|f| f.attributes.optimize_none && f.attributes.no_inline));
    }

    #[test]
    fn test_check_module_reports_broken_ir() {
        let mut working = WorkingModule::new(LinkerConfig::default());
        let mut module = Module::new("m");
        let mut function = Function::new("main", IrType::Void);
        function.add_block(BasicBlock::new(0));
        module.add_function(function);
        working.link(&mut vec![module], "").unwrap();

        let Err(LinkerError::InvalidModule { errors }) = working.check_module() else {
            panic!("expected an invalid module");
        };
        assert_eq!(errors, vec!["main: block 0 must end with exactly one terminator".to_string()]);
    }

    #[test]
    fn test_skip_verification_still_checks_operands() {
        let config = LinkerConfig {
            skip_verification: true,
            ..LinkerConfig::default()
        };
        let mut working = WorkingModule::new(config);
        let mut module = Module::new("m");
        let vec2 = IrType::vector(2, IrType::I32);
        let mut function = Function::new("main", vec2.clone());
        function.add_parameter(0, vec2);
        let mut block = BasicBlock::new(0);
        block.add_instruction(Instruction::Return(Some(Value::Temp(0))));
        function.add_block(block);
        module.add_function(function);
        working.link(&mut vec![module], "").unwrap();

        assert!(matches!(working.check_module(), Err(LinkerError::OperandTypes { .. })));
    }
}
