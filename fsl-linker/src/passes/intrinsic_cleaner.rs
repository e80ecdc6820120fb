//! Toolchain intrinsic cleanup
//!
//! Rewrites the `llvm.*` intrinsics the engine has no model for:
//! debug and lifetime markers are dropped, `llvm.expect` forwards its
//! value, memory intrinsics become calls to the libc primitives and
//! `llvm.trap` becomes `abort()` followed by `unreachable`.

use fsl_ir::{DataLayout, Function, Instruction, IrType, IrUnaryOp, LabelId, Module, TempId, Value};
use log::trace;
use std::collections::BTreeSet;
use super::{IdGen, ModulePass};

pub struct IntrinsicCleaner {
    layout: DataLayout,
}

impl IntrinsicCleaner {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }
}

const DROPPED_PREFIXES: [&str; 2] = ["llvm.dbg.", "llvm.lifetime."];
const MEMORY_INTRINSICS: [(&str, &str); 3] = [
    ("llvm.memcpy.", "memcpy"),
    ("llvm.memmove.", "memmove"),
    ("llvm.memset.", "memset"),
];

fn is_dropped(name: &str) -> bool {
    name == "llvm.assume" || DROPPED_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn is_cleaned(name: &str) -> bool {
    is_dropped(name)
        || name.starts_with("llvm.expect.")
        || name == "llvm.trap"
        || MEMORY_INTRINSICS.iter().any(|(prefix, _)| name.starts_with(prefix))
}

/// Width of the trailing `.iN` component of an overloaded intrinsic name
fn size_suffix_bits(name: &str) -> Option<u32> {
    name.rsplit('.').next()?.strip_prefix('i')?.parse().ok()
}

struct Rewrite<'a> {
    layout: &'a DataLayout,
    ids: IdGen,
    forwards: Vec<(TempId, Value)>,
    needed: BTreeSet<&'static str>,
}

impl Rewrite<'_> {
    /// Cast a size operand to the pointer-width integer
    fn size_operand(&mut self, name: &str, size: Value, out: &mut Vec<Instruction>) -> Value {
        let intptr = self.layout.intptr_type();
        let Some(bits) = size_suffix_bits(name) else {
            return size;
        };
        let target_bits = intptr.int_bits().unwrap_or(64);
        if bits == target_bits || size.as_temp().is_none() {
            return size;
        }
        let op = if bits < target_bits { IrUnaryOp::ZExt } else { IrUnaryOp::Trunc };
        let result = self.ids.temp();
        out.push(Instruction::Unary { result, op, operand: size, result_type: intptr });
        Value::Temp(result)
    }

    /// Replacement for a call to intrinsic `name`, or None to keep it.
    /// The bool is true when the call ends the block.
    fn rewrite(&mut self, name: &str, result: Option<TempId>, args: Vec<Value>) -> Option<(Vec<Instruction>, bool)> {
        if is_dropped(name) {
            if let Some(result) = result {
                self.forwards.push((result, Value::Undef));
            }
            return Some((Vec::new(), false));
        }
        if name.starts_with("llvm.expect.") {
            let forwarded = args.into_iter().next().unwrap_or(Value::Undef);
            if let Some(result) = result {
                self.forwards.push((result, forwarded));
            }
            return Some((Vec::new(), false));
        }
        if name == "llvm.trap" {
            self.needed.insert("abort");
            let call = Instruction::Call {
                result: None,
                callee: Value::Function("abort".to_string()),
                args: Vec::new(),
                result_type: IrType::Void,
            };
            return Some((vec![call, Instruction::Unreachable], true));
        }

        let &(_, libc) = MEMORY_INTRINSICS.iter().find(|(prefix, _)| name.starts_with(prefix))?;
        if args.len() < 3 {
            return None;
        }
        let mut out = Vec::new();
        let mut args = args.into_iter();
        let dest = args.next()?;
        let mut second = args.next()?;
        let size = args.next()?;
        if libc == "memset" && second.as_temp().is_some() {
            let widened = self.ids.temp();
            out.push(Instruction::Unary {
                result: widened,
                op: IrUnaryOp::ZExt,
                operand: second,
                result_type: IrType::I32,
            });
            second = Value::Temp(widened);
        }
        let size = self.size_operand(name, size, &mut out);
        self.needed.insert(libc);
        out.push(Instruction::Call {
            result: None,
            callee: Value::Function(libc.to_string()),
            args: vec![dest, second, size],
            result_type: IrType::ptr(IrType::I8),
        });
        Some((out, false))
    }
}

impl IntrinsicCleaner {
    fn clean_function(&self, function: &mut Function, needed: &mut BTreeSet<&'static str>) -> bool {
        let mut rewrite = Rewrite {
            layout: &self.layout,
            ids: IdGen::for_function(function),
            forwards: Vec::new(),
            needed: BTreeSet::new(),
        };
        let mut changed = false;
        let mut cut_edges: Vec<(LabelId, Vec<LabelId>)> = Vec::new();

        for block in &mut function.blocks {
            let old_successors = block.successors();
            let mut new_instructions = Vec::with_capacity(block.instructions.len());
            let mut terminated = false;
            let mut pending = std::mem::take(&mut block.instructions).into_iter();
            for instr in pending.by_ref() {
                let name = match &instr {
                    Instruction::Call { callee: Value::Function(name), .. } if is_cleaned(name) => name.clone(),
                    _ => {
                        new_instructions.push(instr);
                        continue;
                    }
                };
                let Instruction::Call { result, args, .. } = instr.clone() else {
                    new_instructions.push(instr);
                    continue;
                };
                match rewrite.rewrite(&name, result, args) {
                    Some((replacement, ends_block)) => {
                        trace!("{}: cleaned call to {name}", function.name);
                        new_instructions.extend(replacement);
                        changed = true;
                        if ends_block {
                            terminated = true;
                            break;
                        }
                    }
                    None => new_instructions.push(instr),
                }
            }
            // Results defined after a trap may still be named in other blocks
            for dropped in pending {
                rewrite
                    .forwards
                    .extend(dropped.defined_temps().into_iter().map(|temp| (temp, Value::Undef)));
            }
            block.instructions = new_instructions;
            if terminated {
                cut_edges.push((block.id, old_successors));
            }
        }

        function.forward_temps(std::mem::take(&mut rewrite.forwards));
        for (pred, successors) in cut_edges {
            for succ in successors {
                if let Some(block) = function.get_block_mut(succ) {
                    block.remove_incoming(pred);
                }
            }
        }
        needed.extend(rewrite.needed);
        changed
    }
}

impl ModulePass for IntrinsicCleaner {
    fn name(&self) -> &'static str {
        "intrinsic-cleaner"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        let mut needed = BTreeSet::new();
        for function in &mut module.functions {
            if !function.is_declaration() {
                changed |= self.clean_function(function, &mut needed);
            }
        }

        let intptr = self.layout.intptr_type();
        let byte_ptr = IrType::ptr(IrType::I8);
        for name in needed {
            let params = match name {
                "memset" => vec![byte_ptr.clone(), IrType::I32, intptr.clone()],
                "abort" => Vec::new(),
                _ => vec![byte_ptr.clone(), byte_ptr.clone(), intptr.clone()],
            };
            let return_type = if name == "abort" { IrType::Void } else { byte_ptr.clone() };
            let function = module.get_or_insert_function(name, return_type, params);
            if name == "abort" {
                function.attributes.no_return = true;
            }
        }

        // Drop declarations of intrinsics that no longer have users
        let unused: Vec<String> = module
            .functions
            .iter()
            .filter(|f| f.is_declaration() && is_cleaned(&f.name))
            .filter(|f| module.use_count(&f.name) == 0)
            .map(|f| f.name.clone())
            .collect();
        for name in &unused {
            module.remove_function(name);
        }
        changed || !unused.is_empty()
    }
}
