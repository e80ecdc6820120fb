//! Basic Block Management
//!
//! Defines basic blocks - sequences of instructions with single entry and
//! exactly one terminator at the end.

use fsl_common::LabelId;
use serde::{Deserialize, Serialize};
use crate::Instruction;

/// Basic Block - a sequence of instructions with a single entry and exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: LabelId,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: LabelId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions.last().is_some_and(|instr| instr.is_terminator())
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|instr| instr.is_terminator())
    }

    pub fn terminator_mut(&mut self) -> Option<&mut Instruction> {
        self.instructions.last_mut().filter(|instr| instr.is_terminator())
    }

    /// Successor labels of this block's terminator
    pub fn successors(&self) -> Vec<LabelId> {
        self.terminator().map(|t| t.successors()).unwrap_or_default()
    }

    /// Index of the first instruction that is not a phi node
    pub fn first_non_phi(&self) -> usize {
        self.instructions
            .iter()
            .position(|instr| !instr.is_phi())
            .unwrap_or(self.instructions.len())
    }

    /// Insert before the terminator (or at the end if there is none)
    pub fn insert_before_terminator(&mut self, instrs: Vec<Instruction>) {
        let at = if self.has_terminator() {
            self.instructions.len() - 1
        } else {
            self.instructions.len()
        };
        self.instructions.splice(at..at, instrs);
    }

    /// Drop every phi entry coming from `pred`
    pub fn remove_incoming(&mut self, pred: LabelId) {
        for instr in &mut self.instructions {
            if let Instruction::Phi { incoming, .. } = instr {
                incoming.retain(|(_, label)| *label != pred);
            }
        }
    }

    /// Rename `from` to `to` in every phi entry of this block
    pub fn replace_incoming(&mut self, from: LabelId, to: LabelId) {
        for instr in &mut self.instructions {
            if let Instruction::Phi { incoming, .. } = instr {
                for (_, label) in incoming.iter_mut() {
                    if *label == from {
                        *label = to;
                    }
                }
            }
        }
    }
}
