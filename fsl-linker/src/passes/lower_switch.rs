//! Switch lowering
//!
//! Replaces `switch` terminators with conditional branches, either as an
//! ordered chain of equality tests or as a balanced binary search over the
//! sorted case values. Phi nodes in the case destinations are rewired to the
//! new predecessor blocks.

use fsl_ir::{BasicBlock, Function, Instruction, IrBinaryOp, IrType, LabelId, Module, Value};
use super::{IdGen, ModulePass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Chain,
    BinarySearch,
}

pub struct LowerSwitch {
    strategy: Strategy,
}

impl LowerSwitch {
    /// Ordered chain of equality branches
    pub fn simple() -> Self {
        Self { strategy: Strategy::Chain }
    }

    /// Binary search tree of comparisons
    pub fn general() -> Self {
        Self { strategy: Strategy::BinarySearch }
    }
}

struct Lowering<'a> {
    ids: &'a mut IdGen,
    value: Value,
    default: LabelId,
    blocks: Vec<BasicBlock>,
    /// (destination, new predecessor) for every edge leaving the lowering
    edges: Vec<(LabelId, LabelId)>,
}

impl Lowering<'_> {
    fn compare(&mut self, block: &mut BasicBlock, op: IrBinaryOp, case: i64) -> Value {
        let result = self.ids.temp();
        block.add_instruction(Instruction::Binary {
            result,
            op,
            lhs: self.value.clone(),
            rhs: Value::Constant(case),
            result_type: IrType::I1,
        });
        Value::Temp(result)
    }

    fn chain(&mut self, cases: &[(i64, LabelId)]) -> LabelId {
        let labels: Vec<LabelId> = cases.iter().map(|_| self.ids.label()).collect();
        for (index, &(case, dest)) in cases.iter().enumerate() {
            let label = labels[index];
            let next = labels.get(index + 1).copied();
            let mut block = BasicBlock::new(label);
            let condition = self.compare(&mut block, IrBinaryOp::Eq, case);
            let false_label = next.unwrap_or(self.default);
            block.add_instruction(Instruction::BranchCond { condition, true_label: dest, false_label });
            self.edges.push((dest, label));
            if next.is_none() {
                self.edges.push((self.default, label));
            }
            self.blocks.push(block);
        }
        labels.first().copied().unwrap_or(self.default)
    }

    fn tree(&mut self, cases: &[(i64, LabelId)]) -> LabelId {
        match cases {
            [] => self.default,
            [(case, dest)] => {
                let label = self.ids.label();
                let mut block = BasicBlock::new(label);
                let condition = self.compare(&mut block, IrBinaryOp::Eq, *case);
                block.add_instruction(Instruction::BranchCond {
                    condition,
                    true_label: *dest,
                    false_label: self.default,
                });
                self.edges.push((*dest, label));
                self.edges.push((self.default, label));
                self.blocks.push(block);
                label
            }
            _ => {
                let mid = cases.len() / 2;
                let label = self.ids.label();
                let left = self.tree(&cases[..mid]);
                let right = self.tree(&cases[mid..]);
                let mut block = BasicBlock::new(label);
                let condition = self.compare(&mut block, IrBinaryOp::Slt, cases[mid].0);
                block.add_instruction(Instruction::BranchCond { condition, true_label: left, false_label: right });
                self.blocks.push(block);
                label
            }
        }
    }
}

/// Point phi entries for `old_pred` in `dest` at each of `new_preds`
fn rewire_phis(function: &mut Function, dest: LabelId, old_pred: LabelId, new_preds: &[LabelId]) {
    let Some(block) = function.get_block_mut(dest) else {
        return;
    };
    for instr in &mut block.instructions {
        let Instruction::Phi { incoming, .. } = instr else {
            continue;
        };
        let Some(value) = incoming.iter().find(|(_, l)| *l == old_pred).map(|(v, _)| v.clone()) else {
            continue;
        };
        incoming.retain(|(_, l)| *l != old_pred);
        incoming.extend(new_preds.iter().map(|p| (value.clone(), *p)));
    }
}

impl LowerSwitch {
    fn lower_function(&self, function: &mut Function) -> bool {
        let switch_blocks: Vec<LabelId> = function
            .blocks
            .iter()
            .filter(|b| matches!(b.terminator(), Some(Instruction::Switch { .. })))
            .map(|b| b.id)
            .collect();
        if switch_blocks.is_empty() {
            return false;
        }

        let mut ids = IdGen::for_function(function);
        for label in switch_blocks {
            let Some(block) = function.get_block_mut(label) else {
                continue;
            };
            let Some(Instruction::Switch { value, default, mut cases, .. }) = block.instructions.pop() else {
                continue;
            };
            let old_successors: Vec<LabelId> = std::iter::once(default)
                .chain(cases.iter().map(|(_, l)| *l))
                .collect();
            cases.sort_by_key(|(case, _)| *case);
            cases.dedup_by_key(|(case, _)| *case);

            let mut lowering = Lowering {
                ids: &mut ids,
                value,
                default,
                blocks: Vec::new(),
                edges: Vec::new(),
            };
            let first = match self.strategy {
                Strategy::Chain => lowering.chain(&cases),
                Strategy::BinarySearch => lowering.tree(&cases),
            };
            let Lowering { blocks, mut edges, .. } = lowering;
            if cases.is_empty() {
                edges.push((default, label));
            }

            block.add_instruction(Instruction::Branch(first));
            function.blocks.extend(blocks);

            let mut seen = Vec::new();
            for dest in old_successors {
                if seen.contains(&dest) {
                    continue;
                }
                seen.push(dest);
                let mut new_preds: Vec<LabelId> = Vec::new();
                for (d, p) in &edges {
                    if *d == dest && !new_preds.contains(p) {
                        new_preds.push(*p);
                    }
                }
                rewire_phis(function, dest, label, &new_preds);
            }
        }
        true
    }
}

impl ModulePass for LowerSwitch {
    fn name(&self) -> &'static str {
        match self.strategy {
            Strategy::Chain => "lower-switch-simple",
            Strategy::BinarySearch => "lower-switch",
        }
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for function in &mut module.functions {
            changed |= self.lower_function(function);
        }
        changed
    }
}
