//! Phi normalization: every phi of a block lists its incoming blocks in the
//! same order as the block's first phi.

use fsl_ir::{Instruction, LabelId, Module, Value};
use super::ModulePass;

pub struct PhiCleaner;

/// `incoming` reordered to follow `order`, or None if the label lists differ
fn reorder(incoming: &[(Value, LabelId)], order: &[LabelId]) -> Option<Vec<(Value, LabelId)>> {
    if incoming.len() != order.len() {
        return None;
    }
    let mut used = vec![false; incoming.len()];
    let mut reordered = Vec::with_capacity(order.len());
    for label in order {
        let index = (0..incoming.len()).find(|&i| !used[i] && incoming[i].1 == *label)?;
        used[index] = true;
        reordered.push(incoming[index].clone());
    }
    Some(reordered)
}

impl ModulePass for PhiCleaner {
    fn name(&self) -> &'static str {
        "phi-cleaner"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for block in module.functions.iter_mut().flat_map(|f| f.blocks.iter_mut()) {
            let mut reference: Option<Vec<LabelId>> = None;
            for instr in block.instructions.iter_mut() {
                let Instruction::Phi { incoming, .. } = instr else {
                    break;
                };
                if reference.is_none() {
                    reference = Some(incoming.iter().map(|(_, l)| *l).collect());
                    continue;
                }
                let Some(order) = &reference else {
                    continue;
                };
                let in_order = incoming.iter().map(|(_, l)| l).eq(order.iter());
                if in_order {
                    continue;
                }
                if let Some(reordered) = reorder(incoming, order) {
                    *incoming = reordered;
                    changed = true;
                }
            }
        }
        changed
    }
}
