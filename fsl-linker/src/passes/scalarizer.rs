//! Vector scalarization
//!
//! Splits vector-typed binary, unary, select, phi and store instructions
//! into one scalar instruction per lane. Lanes are read with
//! `extractelement` and the vector result is rebuilt with a chain of
//! `insertelement`s whose last link keeps the original result id, so
//! existing users are unaffected.

use fsl_ir::{
    is_vector_value, Instruction, IrType, LabelId, Module, TempId, TypeEnv, Value,
};
use std::collections::HashMap;
use super::{IdGen, ModulePass};

pub struct Scalarizer;

struct FunctionScalarizer<'a> {
    env: &'a TypeEnv,
    ids: IdGen,
    /// Extracts that must run at the end of a predecessor block (phi lanes)
    pending: HashMap<LabelId, Vec<Instruction>>,
}

fn vector_shape(ty: &IrType) -> Option<(u32, IrType)> {
    match ty {
        IrType::Vector { len, element_type } if *len > 0 => Some((*len, (**element_type).clone())),
        _ => None,
    }
}

impl FunctionScalarizer<'_> {
    fn element_type_of(&self, value: &Value) -> Option<IrType> {
        match value {
            Value::ConstantVector { element_type, .. } => Some(element_type.clone()),
            Value::Temp(id) => self.env.get(id).and_then(vector_shape).map(|(_, elem)| elem),
            _ => None,
        }
    }

    /// Value of lane `index` of `value`, emitting an extract if needed
    fn lane(&mut self, value: &Value, index: u32, elem: &IrType, out: &mut Vec<Instruction>) -> Value {
        match value {
            Value::ConstantVector { elements, .. } => {
                Value::Constant(elements.get(index as usize).copied().unwrap_or(0))
            }
            Value::Undef => Value::Undef,
            Value::Null => Value::zero_of(elem),
            other => {
                let result = self.ids.temp();
                out.push(Instruction::ExtractElement {
                    result,
                    vector: other.clone(),
                    index: Value::Constant(index as i64),
                    result_type: elem.clone(),
                });
                Value::Temp(result)
            }
        }
    }

    /// Reassemble `lanes` into a vector whose final id is `result`
    fn rebuild(&mut self, result: TempId, vector_type: &IrType, lanes: Vec<Value>, out: &mut Vec<Instruction>) {
        let last = lanes.len().saturating_sub(1);
        let mut acc = Value::Undef;
        for (index, element) in lanes.into_iter().enumerate() {
            let id = if index == last { result } else { self.ids.temp() };
            out.push(Instruction::InsertElement {
                result: id,
                vector: acc,
                element,
                index: Value::Constant(index as i64),
                result_type: vector_type.clone(),
            });
            acc = Value::Temp(id);
        }
    }

    /// Scalar replacement of a non-phi instruction, or None to keep it
    fn scalarize(&mut self, instr: &Instruction) -> Option<Vec<Instruction>> {
        let mut out = Vec::new();
        match instr {
            Instruction::Binary { result, op, lhs, rhs, result_type } => {
                let (len, elem) = vector_shape(result_type)?;
                let operand_elem = if op.is_comparison() {
                    self.element_type_of(lhs).or_else(|| self.element_type_of(rhs))?
                } else {
                    elem.clone()
                };
                let mut lanes = Vec::with_capacity(len as usize);
                for index in 0..len {
                    let a = self.lane(lhs, index, &operand_elem, &mut out);
                    let b = self.lane(rhs, index, &operand_elem, &mut out);
                    let scalar = self.ids.temp();
                    out.push(Instruction::Binary { result: scalar, op: *op, lhs: a, rhs: b, result_type: elem.clone() });
                    lanes.push(Value::Temp(scalar));
                }
                self.rebuild(*result, result_type, lanes, &mut out);
            }
            Instruction::Unary { result, op, operand, result_type } => {
                let (len, elem) = vector_shape(result_type)?;
                let operand_elem = self.element_type_of(operand).unwrap_or_else(|| elem.clone());
                let mut lanes = Vec::with_capacity(len as usize);
                for index in 0..len {
                    let a = self.lane(operand, index, &operand_elem, &mut out);
                    let scalar = self.ids.temp();
                    out.push(Instruction::Unary { result: scalar, op: *op, operand: a, result_type: elem.clone() });
                    lanes.push(Value::Temp(scalar));
                }
                self.rebuild(*result, result_type, lanes, &mut out);
            }
            Instruction::Select { result, condition, true_value, false_value, result_type } => {
                let (len, elem) = vector_shape(result_type)?;
                let vector_condition = is_vector_value(condition, self.env);
                let mut lanes = Vec::with_capacity(len as usize);
                for index in 0..len {
                    let c = if vector_condition {
                        self.lane(condition, index, &IrType::I1, &mut out)
                    } else {
                        condition.clone()
                    };
                    let t = self.lane(true_value, index, &elem, &mut out);
                    let f = self.lane(false_value, index, &elem, &mut out);
                    let scalar = self.ids.temp();
                    out.push(Instruction::Select {
                        result: scalar,
                        condition: c,
                        true_value: t,
                        false_value: f,
                        result_type: elem.clone(),
                    });
                    lanes.push(Value::Temp(scalar));
                }
                self.rebuild(*result, result_type, lanes, &mut out);
            }
            Instruction::Store { value, value_type, ptr, ordering } => {
                let (len, elem) = vector_shape(value_type)?;
                for index in 0..len {
                    let v = self.lane(value, index, &elem, &mut out);
                    let slot = self.ids.temp();
                    out.push(Instruction::GetElementPtr {
                        result: slot,
                        ptr: ptr.clone(),
                        indices: vec![Value::Constant(0), Value::Constant(index as i64)],
                        result_type: IrType::ptr(elem.clone()),
                    });
                    out.push(Instruction::Store {
                        value: v,
                        value_type: elem.clone(),
                        ptr: Value::Temp(slot),
                        ordering: *ordering,
                    });
                }
            }
            _ => return None,
        }
        Some(out)
    }

    /// Per-lane phis for a vector phi; lane extracts go to the predecessors
    fn scalarize_phi(
        &mut self,
        result: TempId,
        incoming: &[(Value, LabelId)],
        result_type: &IrType,
        phis: &mut Vec<Instruction>,
        rebuilt: &mut Vec<Instruction>,
    ) -> bool {
        let Some((len, elem)) = vector_shape(result_type) else {
            return false;
        };
        let mut lanes = Vec::with_capacity(len as usize);
        for index in 0..len {
            let mut lane_incoming = Vec::with_capacity(incoming.len());
            for (value, pred) in incoming {
                let mut extracts = Vec::new();
                let lane = self.lane(value, index, &elem, &mut extracts);
                self.pending.entry(*pred).or_default().extend(extracts);
                lane_incoming.push((lane, *pred));
            }
            let scalar = self.ids.temp();
            phis.push(Instruction::Phi { result: scalar, incoming: lane_incoming, result_type: elem.clone() });
            lanes.push(Value::Temp(scalar));
        }
        self.rebuild(result, result_type, lanes, rebuilt);
        true
    }
}

impl ModulePass for Scalarizer {
    fn name(&self) -> &'static str {
        "scalarizer"
    }

    fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;

        for function in &mut module.functions {
            if function.is_declaration() {
                continue;
            }
            let env = function.type_env();
            let has_vectors = env.values().any(IrType::is_vector)
                || function.instructions().any(|i| matches!(i, Instruction::Store { value_type, .. } if value_type.is_vector()));
            if !has_vectors {
                continue;
            }

            let mut scalarizer = FunctionScalarizer {
                env: &env,
                ids: IdGen::for_function(function),
                pending: HashMap::new(),
            };

            for block in &mut function.blocks {
                let mut phis = Vec::new();
                let mut rebuilt = Vec::new();
                let mut body = Vec::new();
                for instr in std::mem::take(&mut block.instructions) {
                    if let Instruction::Phi { result, incoming, result_type } = &instr {
                        if scalarizer.scalarize_phi(*result, incoming, result_type, &mut phis, &mut rebuilt) {
                            changed = true;
                        } else {
                            phis.push(instr);
                        }
                        continue;
                    }
                    match scalarizer.scalarize(&instr) {
                        Some(replacement) => {
                            body.extend(replacement);
                            changed = true;
                        }
                        None => body.push(instr),
                    }
                }
                phis.extend(rebuilt);
                phis.extend(body);
                block.instructions = phis;
            }

            for (label, extracts) in scalarizer.pending {
                if let Some(block) = function.get_block_mut(label) {
                    block.insert_before_terminator(extracts);
                }
            }
        }
        changed
    }
}
