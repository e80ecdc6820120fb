//! Atomic lowering
//!
//! The engine executes a single thread, so atomics become their plain
//! equivalents: orderings are dropped from loads and stores, `atomicrmw`
//! and `cmpxchg` turn into load/compute/store sequences and fences vanish.

use fsl_ir::{AtomicRmwOp, Instruction, IrBinaryOp, IrType, Module, Value};
use super::{IdGen, ModulePass};

pub struct LowerAtomic;

fn rmw_binary(op: AtomicRmwOp) -> Option<IrBinaryOp> {
    match op {
        AtomicRmwOp::Add => Some(IrBinaryOp::Add),
        AtomicRmwOp::Sub => Some(IrBinaryOp::Sub),
        AtomicRmwOp::And => Some(IrBinaryOp::And),
        AtomicRmwOp::Or => Some(IrBinaryOp::Or),
        AtomicRmwOp::Xor => Some(IrBinaryOp::Xor),
        _ => None,
    }
}

/// Comparison selecting the old value for min/max operations
fn rmw_compare(op: AtomicRmwOp) -> Option<IrBinaryOp> {
    match op {
        AtomicRmwOp::Max => Some(IrBinaryOp::Sgt),
        AtomicRmwOp::Min => Some(IrBinaryOp::Slt),
        AtomicRmwOp::UMax => Some(IrBinaryOp::Ugt),
        AtomicRmwOp::UMin => Some(IrBinaryOp::Ult),
        _ => None,
    }
}

fn lower(instr: Instruction, ids: &mut IdGen) -> Vec<Instruction> {
    match instr {
        Instruction::Load { result, ptr, result_type, ordering: Some(_) } => {
            vec![Instruction::Load { result, ptr, result_type, ordering: None }]
        }
        Instruction::Store { value, value_type, ptr, ordering: Some(_) } => {
            vec![Instruction::Store { value, value_type, ptr, ordering: None }]
        }
        Instruction::Fence { .. } => Vec::new(),
        Instruction::AtomicRmw { result, op, ptr, value, result_type, .. } => {
            let old = Value::Temp(result);
            let mut out = vec![Instruction::Load {
                result,
                ptr: ptr.clone(),
                result_type: result_type.clone(),
                ordering: None,
            }];
            let new_value = if let Some(bin) = rmw_binary(op) {
                let id = ids.temp();
                out.push(Instruction::Binary { result: id, op: bin, lhs: old, rhs: value, result_type: result_type.clone() });
                Value::Temp(id)
            } else if let Some(cmp) = rmw_compare(op) {
                let keep = ids.temp();
                let chosen = ids.temp();
                out.push(Instruction::Binary {
                    result: keep,
                    op: cmp,
                    lhs: old.clone(),
                    rhs: value.clone(),
                    result_type: IrType::I1,
                });
                out.push(Instruction::Select {
                    result: chosen,
                    condition: Value::Temp(keep),
                    true_value: old,
                    false_value: value,
                    result_type: result_type.clone(),
                });
                Value::Temp(chosen)
            } else {
                value
            };
            out.push(Instruction::Store { value: new_value, value_type: result_type, ptr, ordering: None });
            out
        }
        Instruction::CmpXchg { result, success, ptr, expected, new_value, result_type, .. } => {
            let chosen = ids.temp();
            vec![
                Instruction::Load { result, ptr: ptr.clone(), result_type: result_type.clone(), ordering: None },
                Instruction::Binary {
                    result: success,
                    op: IrBinaryOp::Eq,
                    lhs: Value::Temp(result),
                    rhs: expected,
                    result_type: IrType::I1,
                },
                Instruction::Select {
                    result: chosen,
                    condition: Value::Temp(success),
                    true_value: new_value,
                    false_value: Value::Temp(result),
                    result_type: result_type.clone(),
                },
                Instruction::Store { value: Value::Temp(chosen), value_type: result_type, ptr, ordering: None },
            ]
        }
        other => vec![other],
    }
}

fn is_atomic(instr: &Instruction) -> bool {
    matches!(
        instr,
        Instruction::Load { ordering: Some(_), .. }
            | Instruction::Store { ordering: Some(_), .. }
            | Instruction::Fence { .. }
            | Instruction::AtomicRmw { .. }
            | Instruction::CmpXchg { .. }
    )
}

impl ModulePass for LowerAtomic {
    fn name(&self) -> &'static str {
        "lower-atomic"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for function in &mut module.functions {
            if !function.instructions().any(is_atomic) {
                continue;
            }
            let mut ids = IdGen::for_function(function);
            for block in &mut function.blocks {
                let instructions = std::mem::take(&mut block.instructions);
                block.instructions = instructions.into_iter().flat_map(|i| lower(i, &mut ids)).collect();
            }
            changed = true;
        }
        changed
    }
}
