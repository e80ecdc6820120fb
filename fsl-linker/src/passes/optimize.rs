//! General optimizer
//!
//! A small fixpoint of cleanups run when the caller asks for optimization:
//! constant folding, dead instruction elimination, inlining of small
//! single-block functions, dead argument elimination on local functions
//! and removal of unreferenced local symbols.
//!
//! Names in the preserve list are never inlined, never have their
//! signature changed and are never removed. Functions marked
//! `optimize_none` are left untouched.

use fsl_ir::{Function, Instruction, IrType, IrUnaryOp, Module, TempId, Value};
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap, HashSet};
use crate::module_util::function_escapes;
use super::{cfg_simplify, IdGen, ModulePass};

const INLINE_THRESHOLD: usize = 8;
const MAX_ROUNDS: usize = 16;

pub struct Optimizer {
    preserved: BTreeSet<String>,
}

impl Optimizer {
    pub fn new<I, S>(preserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preserved: preserved.into_iter().map(Into::into).collect(),
        }
    }

    fn is_preserved(&self, name: &str) -> bool {
        self.preserved.contains(name)
    }
}

fn optimizable(function: &Function) -> bool {
    !function.is_declaration() && !function.attributes.optimize_none
}

/// Bring a folded value back into the range of `ty`
fn normalize(value: i64, ty: &IrType) -> i64 {
    match ty.int_bits() {
        Some(1) => value & 1,
        Some(bits) if bits < 64 => {
            let shift = 64 - bits;
            (value << shift) >> shift
        }
        _ => value,
    }
}

fn fold(instr: &Instruction) -> Option<(TempId, Value)> {
    match instr {
        Instruction::Binary { result, op, lhs: Value::Constant(a), rhs: Value::Constant(b), result_type }
            if result_type.is_integer() =>
        {
            let folded = op.fold(*a, *b)?;
            Some((*result, Value::Constant(normalize(folded, result_type))))
        }
        Instruction::Unary { result, op, operand: Value::Constant(a), result_type } if result_type.is_integer() => {
            let folded = match op {
                IrUnaryOp::Not => !a,
                IrUnaryOp::Neg => a.wrapping_neg(),
                IrUnaryOp::Trunc => *a,
                _ => return None,
            };
            Some((*result, Value::Constant(normalize(folded, result_type))))
        }
        Instruction::Select { result, condition: Value::Constant(c), true_value, false_value, .. } => {
            let chosen = if *c != 0 { true_value } else { false_value };
            Some((*result, chosen.clone()))
        }
        _ => None,
    }
}

fn fold_constants(function: &mut Function) -> bool {
    let mut folded = Vec::new();
    for block in &mut function.blocks {
        block.instructions.retain(|instr| match fold(instr) {
            Some(replacement) => {
                folded.push(replacement);
                false
            }
            None => true,
        });
    }
    let changed = !folded.is_empty();
    function.forward_temps(folded);
    changed
}

fn eliminate_dead_instructions(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let used: HashSet<TempId> = function
            .instructions()
            .flat_map(|i| i.operands())
            .filter_map(Value::as_temp)
            .collect();
        let mut removed = false;
        for block in &mut function.blocks {
            let before = block.instructions.len();
            block
                .instructions
                .retain(|i| !(i.is_pure() && i.result().is_some_and(|r| !used.contains(&r))));
            removed |= block.instructions.len() != before;
        }
        if !removed {
            return changed;
        }
        changed = true;
    }
}

impl Optimizer {
    fn inlinable(&self, function: &Function) -> bool {
        let [block] = function.blocks.as_slice() else {
            return false;
        };
        let attrs = function.attributes;
        !attrs.no_inline
            && !attrs.optimize_none
            && !function.is_vararg
            && !self.is_preserved(&function.name)
            && block.instructions.len() <= INLINE_THRESHOLD
            && matches!(block.instructions.last(), Some(Instruction::Return(_)))
            && block.instructions.iter().all(|i| {
                !matches!(i, Instruction::Alloca { .. } | Instruction::Phi { .. } | Instruction::Invoke { .. })
                    && i.called_function() != Some(function.name.as_str())
            })
    }

    fn inline_calls(&self, module: &mut Module) -> bool {
        let candidates: HashMap<String, Function> = module
            .functions
            .iter()
            .filter(|f| self.inlinable(f))
            .map(|f| (f.name.clone(), f.clone()))
            .collect();
        if candidates.is_empty() {
            return false;
        }

        let mut changed = false;
        for function in module.functions.iter_mut().filter(|f| optimizable(f)) {
            let mut ids = IdGen::for_function(function);
            let mut forwards: Vec<(TempId, Value)> = Vec::new();

            for block in &mut function.blocks {
                let mut out = Vec::with_capacity(block.instructions.len());
                for instr in std::mem::take(&mut block.instructions) {
                    let callee = match &instr {
                        Instruction::Call { callee: Value::Function(name), args, .. } if *name != function.name => {
                            candidates.get(name).filter(|c| c.parameters.len() == args.len())
                        }
                        _ => None,
                    };
                    let Some(callee) = callee else {
                        out.push(instr);
                        continue;
                    };
                    let Instruction::Call { result, args, .. } = instr else {
                        continue;
                    };
                    trace!("inlining {} into {}", callee.name, function.name);

                    let mut map: HashMap<TempId, Value> = callee
                        .parameters
                        .iter()
                        .map(|(id, _)| *id)
                        .zip(args)
                        .collect();
                    for callee_instr in callee.blocks.iter().flat_map(|b| b.instructions.iter()) {
                        let mut copy = callee_instr.clone();
                        for operand in copy.operands_mut() {
                            if let Some(mapped) = operand.as_temp().and_then(|t| map.get(&t)) {
                                *operand = mapped.clone();
                            }
                        }
                        if let Instruction::Return(value) = copy {
                            if let Some(result) = result {
                                forwards.push((result, value.unwrap_or(Value::Undef)));
                            }
                            break;
                        }
                        for def in copy.defined_temps_mut() {
                            let fresh = ids.temp();
                            map.insert(*def, Value::Temp(fresh));
                            *def = fresh;
                        }
                        out.push(copy);
                    }
                    changed = true;
                }
                block.instructions = out;
            }

            function.forward_temps(forwards);
        }
        changed
    }

    /// Drop parameters a local, non-escaping function never reads
    fn eliminate_dead_arguments(&self, module: &mut Module) -> bool {
        let mut dead: Vec<(String, Vec<usize>)> = Vec::new();
        for function in &module.functions {
            if !optimizable(function)
                || !function.linkage.is_local()
                || function.is_vararg
                || self.is_preserved(&function.name)
                || function_escapes(module, &function.name)
            {
                continue;
            }
            let unused: Vec<usize> = function
                .parameters
                .iter()
                .enumerate()
                .filter(|(_, (id, _))| function.use_count(*id) == 0)
                .map(|(index, _)| index)
                .collect();
            if !unused.is_empty() {
                dead.push((function.name.clone(), unused));
            }
        }

        for (name, unused) in &dead {
            debug!("removing {} dead argument(s) of {}", unused.len(), name);
            let Some(function) = module.get_function_mut(name) else {
                continue;
            };
            let arity = function.parameters.len();
            let mut index = 0;
            function.parameters.retain(|_| {
                let keep = !unused.contains(&index);
                index += 1;
                keep
            });

            for instr in module.functions.iter_mut().flat_map(|f| f.instructions_mut()) {
                let (Instruction::Call { callee: Value::Function(callee), args, .. }
                | Instruction::Invoke { callee: Value::Function(callee), args, .. }) = instr
                else {
                    continue;
                };
                if callee != name || args.len() != arity {
                    continue;
                }
                let mut index = 0;
                args.retain(|_| {
                    let keep = !unused.contains(&index);
                    index += 1;
                    keep
                });
            }
        }
        !dead.is_empty()
    }

    fn remove_unreferenced_locals(&self, module: &mut Module) -> bool {
        let dead_functions: Vec<String> = module
            .functions
            .iter()
            .filter(|f| f.linkage.is_local() && !f.attributes.optimize_none && !self.is_preserved(&f.name))
            .filter(|f| module.use_count(&f.name) == 0)
            .map(|f| f.name.clone())
            .collect();
        let dead_globals: Vec<String> = module
            .globals
            .iter()
            .filter(|g| g.linkage.is_local() && !self.is_preserved(&g.name))
            .filter(|g| module.use_count(&g.name) == 0)
            .map(|g| g.name.clone())
            .collect();

        for name in &dead_functions {
            debug!("removing unreferenced function {name}");
            module.remove_function(name);
        }
        for name in &dead_globals {
            debug!("removing unreferenced global {name}");
            module.remove_global(name);
        }
        !dead_functions.is_empty() || !dead_globals.is_empty()
    }
}

impl ModulePass for Optimizer {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for _ in 0..MAX_ROUNDS {
            let mut round = false;
            for function in module.functions.iter_mut().filter(|f| optimizable(f)) {
                round |= fold_constants(function);
                round |= eliminate_dead_instructions(function);
                round |= cfg_simplify::simplify_function(function);
            }
            round |= self.inline_calls(module);
            round |= self.eliminate_dead_arguments(module);
            round |= self.remove_unreferenced_locals(module);
            if !round {
                break;
            }
            changed = true;
        }
        changed
    }
}
