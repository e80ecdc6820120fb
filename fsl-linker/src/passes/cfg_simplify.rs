//! Control-flow simplification
//!
//! Folds branches on constants, deletes blocks unreachable from the entry
//! and merges a block into its single predecessor when that predecessor
//! jumps straight to it. Functions marked `optimize_none` are skipped.

use fsl_ir::{Function, Instruction, LabelId, Module, Value};
use std::collections::HashSet;
use super::ModulePass;

pub struct CfgSimplify;

/// Replace constant conditional branches and switches with plain branches
fn fold_constant_branches(function: &mut Function) -> bool {
    let mut dropped_edges: Vec<(LabelId, LabelId)> = Vec::new();
    let mut folded = false;

    for block in &mut function.blocks {
        let id = block.id;
        let Some(terminator) = block.terminator_mut() else {
            continue;
        };
        let target = match &*terminator {
            Instruction::BranchCond { condition: Value::Constant(c), true_label, false_label } => {
                if *c != 0 { *true_label } else { *false_label }
            }
            Instruction::BranchCond { true_label, false_label, .. } if true_label == false_label => *true_label,
            Instruction::Switch { value: Value::Constant(c), default, cases, .. } => cases
                .iter()
                .find(|(case, _)| case == c)
                .map_or(*default, |(_, label)| *label),
            _ => continue,
        };
        for succ in terminator.successors() {
            if succ != target && !dropped_edges.contains(&(succ, id)) {
                dropped_edges.push((succ, id));
            }
        }
        *terminator = Instruction::Branch(target);
        folded = true;
    }

    for (succ, pred) in dropped_edges {
        if let Some(block) = function.get_block_mut(succ) {
            block.remove_incoming(pred);
        }
    }
    folded
}

fn remove_unreachable_blocks(function: &mut Function) -> bool {
    let Some(entry) = function.entry_block().map(|b| b.id) else {
        return false;
    };
    let mut reachable = HashSet::from([entry]);
    let mut worklist = vec![entry];
    while let Some(label) = worklist.pop() {
        if let Some(block) = function.get_block(label) {
            for succ in block.successors() {
                if reachable.insert(succ) {
                    worklist.push(succ);
                }
            }
        }
    }

    let dead: Vec<LabelId> = function
        .blocks
        .iter()
        .map(|b| b.id)
        .filter(|id| !reachable.contains(id))
        .collect();
    if dead.is_empty() {
        return false;
    }
    function.blocks.retain(|b| reachable.contains(&b.id));
    for block in &mut function.blocks {
        for label in &dead {
            block.remove_incoming(*label);
        }
    }
    true
}

/// Merge one block into its predecessor when the edge between them is the
/// only way in and out
fn merge_one_block(function: &mut Function) -> bool {
    let preds = function.predecessors();
    let Some(entry) = function.entry_block().map(|b| b.id) else {
        return false;
    };

    let candidate = function.blocks.iter().find_map(|block| {
        if block.id == entry {
            return None;
        }
        let [pred] = preds.get(&block.id)?.as_slice() else {
            return None;
        };
        let pred_block = function.get_block(*pred)?;
        let jumps_here = matches!(pred_block.terminator(), Some(Instruction::Branch(l)) if *l == block.id);
        (*pred != block.id && jumps_here).then_some((*pred, block.id))
    });
    let Some((pred, label)) = candidate else {
        return false;
    };

    let Some(index) = function.blocks.iter().position(|b| b.id == label) else {
        return false;
    };
    let block = function.blocks.remove(index);
    let mut moved = Vec::with_capacity(block.instructions.len());
    let mut forwards = Vec::new();
    for instr in block.instructions {
        match instr {
            Instruction::Phi { result, incoming, .. } => {
                let value = incoming.into_iter().next().map_or(Value::Undef, |(v, _)| v);
                forwards.push((result, value));
            }
            other => moved.push(other),
        }
    }
    let successors: Vec<LabelId> = moved.last().map(|t| t.successors()).unwrap_or_default();

    if let Some(pred_block) = function.get_block_mut(pred) {
        pred_block.instructions.pop();
        pred_block.instructions.extend(moved);
    }
    for succ in successors {
        if let Some(succ_block) = function.get_block_mut(succ) {
            succ_block.replace_incoming(label, pred);
        }
    }
    function.forward_temps(forwards);
    true
}

pub(crate) fn simplify_function(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let round = fold_constant_branches(function)
            | remove_unreachable_blocks(function)
            | merge_one_block(function);
        if !round {
            return changed;
        }
        changed = true;
    }
}

impl ModulePass for CfgSimplify {
    fn name(&self) -> &'static str {
        "simplifycfg"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for function in &mut module.functions {
            if function.is_declaration() || function.attributes.optimize_none {
                continue;
            }
            changed |= simplify_function(function);
        }
        changed
    }
}
