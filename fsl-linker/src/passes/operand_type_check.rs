//! Checks that scalarization left no vector operands behind. Only lane
//! accesses may still read a vector.

use fsl_ir::{is_vector_value, Instruction, Module};
use log::warn;
use super::ModulePass;

#[derive(Default)]
pub struct OperandTypeCheck {
    violations: Vec<String>,
}

impl OperandTypeCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

impl ModulePass for OperandTypeCheck {
    fn name(&self) -> &'static str {
        "operand-type-check"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        self.violations.clear();
        for function in module.functions.iter().filter(|f| !f.is_declaration()) {
            let env = function.type_env();
            for instr in function.instructions() {
                if matches!(instr, Instruction::ExtractElement { .. } | Instruction::InsertElement { .. }) {
                    continue;
                }
                if instr.operands().into_iter().any(|v| is_vector_value(v, &env)) {
                    let violation = format!("{}: {}", function.name, instr);
                    warn!("vector operand in {violation}");
                    self.violations.push(violation);
                }
            }
        }
        false
    }
}
