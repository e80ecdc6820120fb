//! Raise inline assembly to IR
//!
//! Recognizes the two idioms C code commonly emits:
//! - an empty `asm volatile("" ::: "memory")` barrier becomes a `fence`
//! - a single-register `bswap` becomes a call to `llvm.bswap.iN`

use fsl_ir::{AtomicOrdering, Instruction, IrType, Module, Value};
use log::trace;
use super::ModulePass;

const BSWAP_FORMS: [&str; 3] = ["bswap $0", "bswapl $0", "bswapq $0"];
const BARRIER_CLOBBERS: [&str; 4] = ["~{memory}", "~{dirflag}", "~{fpsr}", "~{flags}"];

pub struct RaiseAsm;

/// Constraint string only clobbers memory and flags
fn is_barrier(assembly: &str, constraints: &str) -> bool {
    if !assembly.trim().is_empty() {
        return false;
    }
    let mut parts = constraints.split(',').filter(|c| !c.is_empty()).peekable();
    parts.peek().is_some() && parts.all(|c| BARRIER_CLOBBERS.contains(&c))
}

fn is_bswap(assembly: &str, constraints: &str) -> bool {
    BSWAP_FORMS.contains(&assembly.trim()) && constraints.starts_with("=r,0")
}

impl ModulePass for RaiseAsm {
    fn name(&self) -> &'static str {
        "raise-asm"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        let mut declarations: Vec<(String, IrType)> = Vec::new();

        for function in &mut module.functions {
            let fn_name = function.name.clone();
            for instr in function.instructions_mut() {
                let Instruction::Call { result, callee: Value::InlineAsm { assembly, constraints }, args, result_type } = instr else {
                    continue;
                };

                if result.is_none() && args.is_empty() && is_barrier(assembly, constraints) {
                    trace!("{fn_name}: raising asm barrier to fence");
                    *instr = Instruction::Fence { ordering: AtomicOrdering::SequentiallyConsistent };
                    changed = true;
                    continue;
                }

                let bits = result_type.int_bits().filter(|&b| matches!(b, 16 | 32 | 64));
                if let (Some(bits), true) = (bits, args.len() == 1 && is_bswap(assembly, constraints)) {
                    let intrinsic = format!("llvm.bswap.i{bits}");
                    trace!("{fn_name}: raising bswap asm to {intrinsic}");
                    declarations.push((intrinsic.clone(), result_type.clone()));
                    let raised = Instruction::Call {
                        result: *result,
                        callee: Value::Function(intrinsic),
                        args: std::mem::take(args),
                        result_type: result_type.clone(),
                    };
                    *instr = raised;
                    changed = true;
                }
            }
        }

        for (name, ty) in declarations {
            module.get_or_insert_function(&name, ty.clone(), vec![ty]);
        }
        changed
    }
}
