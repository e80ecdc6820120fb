//! Function Definitions
//!
//! Defines IR functions with their parameters, blocks, linkage and
//! attributes. A function without blocks is a declaration.

use fsl_common::{LabelId, TempId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::{BasicBlock, Instruction, IrType, Linkage, Value};

/// Function attributes the linker reads or sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAttributes {
    #[serde(default)]
    pub no_return: bool,
    #[serde(default)]
    pub no_inline: bool,
    #[serde(default)]
    pub optimize_none: bool,
}

/// Types of every temporary of one function
pub type TypeEnv = HashMap<TempId, IrType>;

/// Function in IR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: IrType,
    pub parameters: Vec<(TempId, IrType)>,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub attributes: FunctionAttributes,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: IrType) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            blocks: Vec::new(),
            is_vararg: false,
            linkage: Linkage::External,
            attributes: FunctionAttributes::default(),
        }
    }

    /// External declaration with the given parameter types
    pub fn declaration(name: impl Into<String>, return_type: IrType, param_types: Vec<IrType>) -> Self {
        let mut function = Self::new(name, return_type);
        function.parameters = param_types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| (i as TempId, ty))
            .collect();
        function
    }

    pub fn add_parameter(&mut self, param_id: TempId, param_type: IrType) {
        self.parameters.push((param_id, param_type));
    }

    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.push(block);
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Turn a definition into a declaration
    pub fn delete_body(&mut self) {
        self.blocks.clear();
    }

    pub fn param_types(&self) -> Vec<IrType> {
        self.parameters.iter().map(|(_, ty)| ty.clone()).collect()
    }

    pub fn function_type(&self) -> IrType {
        IrType::Function {
            return_type: Box::new(self.return_type.clone()),
            param_types: self.param_types(),
            is_vararg: self.is_vararg,
        }
    }

    pub fn get_block(&self, id: LabelId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn get_block_mut(&mut self, id: LabelId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    pub fn instructions_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.blocks.iter_mut().flat_map(|b| b.instructions.iter_mut())
    }

    /// First temp id not used by any parameter or instruction
    pub fn next_temp_id(&self) -> TempId {
        let params = self.parameters.iter().map(|(id, _)| *id);
        let defs = self.instructions().flat_map(|i| i.defined_temps());
        params.chain(defs).max().map_or(0, |max| max + 1)
    }

    /// First label id not used by any block
    pub fn next_label_id(&self) -> LabelId {
        self.blocks.iter().map(|b| b.id).max().map_or(0, |max| max + 1)
    }

    /// Map every block to the list of blocks branching to it. Each
    /// predecessor is listed once even if it has several edges.
    pub fn predecessors(&self) -> HashMap<LabelId, Vec<LabelId>> {
        let mut preds: HashMap<LabelId, Vec<LabelId>> =
            self.blocks.iter().map(|b| (b.id, Vec::new())).collect();
        for block in &self.blocks {
            for succ in block.successors() {
                let entry = preds.entry(succ).or_default();
                if !entry.contains(&block.id) {
                    entry.push(block.id);
                }
            }
        }
        preds
    }

    /// Types of parameters and instruction results
    pub fn type_env(&self) -> TypeEnv {
        let mut env: TypeEnv = self.parameters.iter().cloned().collect();
        for instr in self.instructions() {
            env.extend(instr.defined_types());
        }
        env
    }

    /// Replace every use of `temp` with `with`
    pub fn replace_all_uses(&mut self, temp: TempId, with: &Value) {
        for instr in self.instructions_mut() {
            for operand in instr.operands_mut() {
                if *operand == Value::Temp(temp) {
                    *operand = with.clone();
                }
            }
        }
    }

    /// Replace uses of several temporaries at once. A replacement that is
    /// itself forwarded is followed to the end of the chain; a cycle
    /// resolves to `undef`.
    pub fn forward_temps(&mut self, forwards: impl IntoIterator<Item = (TempId, Value)>) {
        let map: HashMap<TempId, Value> = forwards.into_iter().collect();
        if map.is_empty() {
            return;
        }
        let resolve = |value: &Value| {
            let mut current = value.clone();
            for _ in 0..=map.len() {
                match current.as_temp().and_then(|t| map.get(&t)) {
                    Some(next) => current = next.clone(),
                    None => return current,
                }
            }
            Value::Undef
        };
        for instr in self.instructions_mut() {
            for operand in instr.operands_mut() {
                if operand.as_temp().is_some_and(|t| map.contains_key(&t)) {
                    *operand = resolve(&*operand);
                }
            }
        }
    }

    /// Number of operand uses of `temp`
    pub fn use_count(&self, temp: TempId) -> usize {
        self.instructions()
            .flat_map(|i| i.operands())
            .filter(|v| **v == Value::Temp(temp))
            .count()
    }
}

/// Is `value` vector-typed in the function described by `env`
pub fn is_vector_value(value: &Value, env: &TypeEnv) -> bool {
    match value {
        Value::ConstantVector { .. } => true,
        Value::Temp(id) => env.get(id).is_some_and(|ty| ty.is_vector()),
        _ => false,
    }
}
