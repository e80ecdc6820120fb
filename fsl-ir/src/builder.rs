//! IR Builder
//!
//! Provides utilities for constructing IR programmatically.

use fsl_common::{LabelId, TempId};
use crate::{
    BasicBlock, Function, Instruction, IrBinaryOp, IrType, IrUnaryOp, Value,
};

/// Builder for constructing IR
pub struct IrBuilder {
    current_function: Option<Function>,
    current_block: Option<LabelId>,
    next_temp_id: TempId,
    next_label_id: LabelId,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self {
            current_function: None,
            current_block: None,
            next_temp_id: 0,
            next_label_id: 0,
        }
    }

    pub fn new_temp(&mut self) -> TempId {
        let temp = self.next_temp_id;
        self.next_temp_id += 1;
        temp
    }

    pub fn new_label(&mut self) -> LabelId {
        let label = self.next_label_id;
        self.next_label_id += 1;
        label
    }

    pub fn create_function(&mut self, name: impl Into<String>, return_type: IrType) -> &mut Function {
        // Reset counters for new function
        self.next_temp_id = 0;
        self.next_label_id = 0;
        self.current_block = None;
        self.current_function.insert(Function::new(name, return_type))
    }

    /// Add a parameter and return the temp holding it
    pub fn add_parameter(&mut self, param_type: IrType) -> Result<TempId, String> {
        let param_id = self.new_temp();
        match self.current_function {
            Some(ref mut function) => {
                function.add_parameter(param_id, param_type);
                Ok(param_id)
            }
            None => Err("No current function".to_string()),
        }
    }

    pub fn create_block(&mut self) -> Result<LabelId, String> {
        let label_id = self.new_label();
        match self.current_function {
            Some(ref mut function) => {
                function.add_block(BasicBlock::new(label_id));
                self.current_block = Some(label_id);
                Ok(label_id)
            }
            None => Err("No current function".to_string()),
        }
    }

    /// Continue emitting into an existing block
    pub fn position_at_end(&mut self, label_id: LabelId) {
        self.current_block = Some(label_id);
    }

    pub fn build_binary(&mut self, op: IrBinaryOp, lhs: Value, rhs: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Binary { result, op, lhs, rhs, result_type })?;
        Ok(result)
    }

    pub fn build_unary(&mut self, op: IrUnaryOp, operand: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Unary { result, op, operand, result_type })?;
        Ok(result)
    }

    pub fn build_load(&mut self, ptr: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Load { result, ptr, result_type, ordering: None })?;
        Ok(result)
    }

    pub fn build_store(&mut self, value: Value, value_type: IrType, ptr: Value) -> Result<(), String> {
        self.add_instruction(Instruction::Store { value, value_type, ptr, ordering: None })
    }

    pub fn build_alloca(&mut self, alloc_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        let result_type = IrType::ptr(alloc_type.clone());
        self.add_instruction(Instruction::Alloca { result, alloc_type, count: None, result_type })?;
        Ok(result)
    }

    pub fn build_call(&mut self, callee: Value, args: Vec<Value>, result_type: IrType) -> Result<Option<TempId>, String> {
        let result = if matches!(result_type, IrType::Void) {
            None
        } else {
            Some(self.new_temp())
        };
        self.add_instruction(Instruction::Call { result, callee, args, result_type })?;
        Ok(result)
    }

    pub fn build_select(&mut self, condition: Value, true_value: Value, false_value: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Select { result, condition, true_value, false_value, result_type })?;
        Ok(result)
    }

    pub fn build_phi(&mut self, incoming: Vec<(Value, LabelId)>, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Phi { result, incoming, result_type })?;
        Ok(result)
    }

    pub fn build_extract_element(&mut self, vector: Value, index: i64, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::ExtractElement { result, vector, index: Value::Constant(index), result_type })?;
        Ok(result)
    }

    pub fn build_return(&mut self, value: Option<Value>) -> Result<(), String> {
        self.add_instruction(Instruction::Return(value))
    }

    pub fn build_branch(&mut self, label: LabelId) -> Result<(), String> {
        self.add_instruction(Instruction::Branch(label))
    }

    pub fn build_branch_cond(&mut self, condition: Value, true_label: LabelId, false_label: LabelId) -> Result<(), String> {
        self.add_instruction(Instruction::BranchCond { condition, true_label, false_label })
    }

    pub fn build_switch(&mut self, value: Value, value_type: IrType, default: LabelId, cases: Vec<(i64, LabelId)>) -> Result<(), String> {
        self.add_instruction(Instruction::Switch { value, value_type, default, cases })
    }

    pub fn build_unreachable(&mut self) -> Result<(), String> {
        self.add_instruction(Instruction::Unreachable)
    }

    /// Append an arbitrary instruction to the current block
    pub fn add_instruction(&mut self, instr: Instruction) -> Result<(), String> {
        let Some(ref mut function) = self.current_function else {
            return Err("No current function".to_string());
        };
        let Some(block_id) = self.current_block else {
            return Err("No current block".to_string());
        };
        match function.get_block_mut(block_id) {
            Some(block) => {
                block.add_instruction(instr);
                Ok(())
            }
            None => Err("Current block not found".to_string()),
        }
    }

    pub fn current_block_has_terminator(&self) -> bool {
        self.current_function
            .as_ref()
            .zip(self.current_block)
            .and_then(|(function, block_id)| function.get_block(block_id))
            .is_some_and(|block| block.has_terminator())
    }

    pub fn finish_function(&mut self) -> Option<Function> {
        self.current_block = None;
        self.current_function.take()
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}
