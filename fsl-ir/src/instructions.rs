//! IR Instructions
//!
//! Defines all instruction types available in the IR together with the
//! generic operand/successor accessors the transformation stages rely on.

use fsl_common::{LabelId, TempId};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::{AtomicOrdering, AtomicRmwOp, IrBinaryOp, IrType, IrUnaryOp, Value};

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Binary operation: result = op lhs, rhs
    Binary {
        result: TempId,
        op: IrBinaryOp,
        lhs: Value,
        rhs: Value,
        result_type: IrType,
    },

    /// Unary operation or cast: result = op operand
    Unary {
        result: TempId,
        op: IrUnaryOp,
        operand: Value,
        result_type: IrType,
    },

    /// Load from memory: result = load ptr
    Load {
        result: TempId,
        ptr: Value,
        result_type: IrType,
        #[serde(default)]
        ordering: Option<AtomicOrdering>,
    },

    /// Store to memory: store value, ptr
    Store {
        value: Value,
        value_type: IrType,
        ptr: Value,
        #[serde(default)]
        ordering: Option<AtomicOrdering>,
    },

    /// Atomic read-modify-write: result = atomicrmw op ptr, value
    AtomicRmw {
        result: TempId,
        op: AtomicRmwOp,
        ptr: Value,
        value: Value,
        result_type: IrType,
        ordering: AtomicOrdering,
    },

    /// Compare and exchange: result = old value, success = (old == expected)
    CmpXchg {
        result: TempId,
        success: TempId,
        ptr: Value,
        expected: Value,
        new_value: Value,
        result_type: IrType,
        ordering: AtomicOrdering,
    },

    /// Memory fence
    Fence { ordering: AtomicOrdering },

    /// Get element pointer: result = getelementptr ptr, indices...
    GetElementPtr {
        result: TempId,
        ptr: Value,
        indices: Vec<Value>,
        result_type: IrType,
    },

    /// Allocate stack memory: result = alloca type, count
    Alloca {
        result: TempId,
        alloc_type: IrType,
        count: Option<Value>,
        result_type: IrType, // Always pointer type
    },

    /// Function call: result = call callee(args...)
    Call {
        result: Option<TempId>,
        callee: Value,
        args: Vec<Value>,
        result_type: IrType,
    },

    /// Call with exceptional successor
    Invoke {
        result: Option<TempId>,
        callee: Value,
        args: Vec<Value>,
        result_type: IrType,
        normal: LabelId,
        unwind: LabelId,
    },

    /// Phi node: result = phi [val1, label1], [val2, label2], ...
    Phi {
        result: TempId,
        incoming: Vec<(Value, LabelId)>,
        result_type: IrType,
    },

    /// Select (ternary): result = select condition, true_value, false_value
    Select {
        result: TempId,
        condition: Value,
        true_value: Value,
        false_value: Value,
        result_type: IrType,
    },

    /// Read one lane of a vector
    ExtractElement {
        result: TempId,
        vector: Value,
        index: Value,
        result_type: IrType,
    },

    /// Write one lane of a vector, producing a new vector
    InsertElement {
        result: TempId,
        vector: Value,
        element: Value,
        index: Value,
        result_type: IrType,
    },

    /// Return: ret value or ret void
    Return(Option<Value>),

    /// Unconditional branch: br label
    Branch(LabelId),

    /// Conditional branch: br condition, true_label, false_label
    BranchCond {
        condition: Value,
        true_label: LabelId,
        false_label: LabelId,
    },

    /// Multi-way branch on an integer value
    Switch {
        value: Value,
        value_type: IrType,
        default: LabelId,
        cases: Vec<(i64, LabelId)>,
    },

    /// Control never reaches this point
    Unreachable,
}

impl Instruction {
    /// Temporary defined by this instruction
    pub fn result(&self) -> Option<TempId> {
        match self {
            Instruction::Binary { result, .. }
            | Instruction::Unary { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::AtomicRmw { result, .. }
            | Instruction::CmpXchg { result, .. }
            | Instruction::GetElementPtr { result, .. }
            | Instruction::Alloca { result, .. }
            | Instruction::Phi { result, .. }
            | Instruction::Select { result, .. }
            | Instruction::ExtractElement { result, .. }
            | Instruction::InsertElement { result, .. } => Some(*result),
            Instruction::Call { result, .. } | Instruction::Invoke { result, .. } => *result,
            _ => None,
        }
    }

    /// Every temporary defined by this instruction (cmpxchg defines two)
    pub fn defined_temps(&self) -> Vec<TempId> {
        match self {
            Instruction::CmpXchg { result, success, .. } => vec![*result, *success],
            other => other.result().into_iter().collect(),
        }
    }

    /// Mutable access to the temporaries in `defined_temps`
    pub fn defined_temps_mut(&mut self) -> Vec<&mut TempId> {
        match self {
            Instruction::CmpXchg { result, success, .. } => vec![result, success],
            Instruction::Binary { result, .. }
            | Instruction::Unary { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::AtomicRmw { result, .. }
            | Instruction::GetElementPtr { result, .. }
            | Instruction::Alloca { result, .. }
            | Instruction::Phi { result, .. }
            | Instruction::Select { result, .. }
            | Instruction::ExtractElement { result, .. }
            | Instruction::InsertElement { result, .. } => vec![result],
            Instruction::Call { result, .. } | Instruction::Invoke { result, .. } => result.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Types of the temporaries in `defined_temps`, in the same order
    pub fn defined_types(&self) -> Vec<(TempId, IrType)> {
        match self {
            Instruction::Binary { result, result_type, .. }
            | Instruction::Unary { result, result_type, .. }
            | Instruction::Load { result, result_type, .. }
            | Instruction::AtomicRmw { result, result_type, .. }
            | Instruction::GetElementPtr { result, result_type, .. }
            | Instruction::Alloca { result, result_type, .. }
            | Instruction::Phi { result, result_type, .. }
            | Instruction::Select { result, result_type, .. }
            | Instruction::ExtractElement { result, result_type, .. }
            | Instruction::InsertElement { result, result_type, .. } => {
                vec![(*result, result_type.clone())]
            }
            Instruction::CmpXchg { result, success, result_type, .. } => {
                vec![(*result, result_type.clone()), (*success, IrType::I1)]
            }
            Instruction::Call { result: Some(result), result_type, .. }
            | Instruction::Invoke { result: Some(result), result_type, .. } => {
                vec![(*result, result_type.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// All value operands, in a stable order
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::Store { value, ptr, .. } => vec![value, ptr],
            Instruction::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            Instruction::CmpXchg { ptr, expected, new_value, .. } => vec![ptr, expected, new_value],
            Instruction::Fence { .. } => Vec::new(),
            Instruction::GetElementPtr { ptr, indices, .. } => {
                std::iter::once(ptr).chain(indices.iter()).collect()
            }
            Instruction::Alloca { count, .. } => count.iter().collect(),
            Instruction::Call { callee, args, .. } | Instruction::Invoke { callee, args, .. } => {
                std::iter::once(callee).chain(args.iter()).collect()
            }
            Instruction::Phi { incoming, .. } => incoming.iter().map(|(v, _)| v).collect(),
            Instruction::Select { condition, true_value, false_value, .. } => {
                vec![condition, true_value, false_value]
            }
            Instruction::ExtractElement { vector, index, .. } => vec![vector, index],
            Instruction::InsertElement { vector, element, index, .. } => vec![vector, element, index],
            Instruction::Return(value) => value.iter().collect(),
            Instruction::Branch(_) | Instruction::Unreachable => Vec::new(),
            Instruction::BranchCond { condition, .. } => vec![condition],
            Instruction::Switch { value, .. } => vec![value],
        }
    }

    /// Mutable access to all value operands, same order as `operands`
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::Store { value, ptr, .. } => vec![value, ptr],
            Instruction::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            Instruction::CmpXchg { ptr, expected, new_value, .. } => vec![ptr, expected, new_value],
            Instruction::Fence { .. } => Vec::new(),
            Instruction::GetElementPtr { ptr, indices, .. } => {
                std::iter::once(ptr).chain(indices.iter_mut()).collect()
            }
            Instruction::Alloca { count, .. } => count.iter_mut().collect(),
            Instruction::Call { callee, args, .. } | Instruction::Invoke { callee, args, .. } => {
                std::iter::once(callee).chain(args.iter_mut()).collect()
            }
            Instruction::Phi { incoming, .. } => incoming.iter_mut().map(|(v, _)| v).collect(),
            Instruction::Select { condition, true_value, false_value, .. } => {
                vec![condition, true_value, false_value]
            }
            Instruction::ExtractElement { vector, index, .. } => vec![vector, index],
            Instruction::InsertElement { vector, element, index, .. } => vec![vector, element, index],
            Instruction::Return(value) => value.iter_mut().collect(),
            Instruction::Branch(_) | Instruction::Unreachable => Vec::new(),
            Instruction::BranchCond { condition, .. } => vec![condition],
            Instruction::Switch { value, .. } => vec![value],
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Return(_)
                | Instruction::Branch(_)
                | Instruction::BranchCond { .. }
                | Instruction::Switch { .. }
                | Instruction::Invoke { .. }
                | Instruction::Unreachable
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instruction::Phi { .. })
    }

    /// Successor blocks of a terminator, in order, duplicates preserved
    pub fn successors(&self) -> Vec<LabelId> {
        match self {
            Instruction::Branch(label) => vec![*label],
            Instruction::BranchCond { true_label, false_label, .. } => vec![*true_label, *false_label],
            Instruction::Switch { default, cases, .. } => {
                std::iter::once(*default).chain(cases.iter().map(|(_, l)| *l)).collect()
            }
            Instruction::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            _ => Vec::new(),
        }
    }

    /// Retarget every edge to `from` so it goes to `to`
    pub fn replace_successor(&mut self, from: LabelId, to: LabelId) {
        let swap = |l: &mut LabelId| {
            if *l == from {
                *l = to;
            }
        };
        match self {
            Instruction::Branch(label) => swap(label),
            Instruction::BranchCond { true_label, false_label, .. } => {
                swap(true_label);
                swap(false_label);
            }
            Instruction::Switch { default, cases, .. } => {
                swap(default);
                cases.iter_mut().for_each(|(_, l)| swap(l));
            }
            Instruction::Invoke { normal, unwind, .. } => {
                swap(normal);
                swap(unwind);
            }
            _ => {}
        }
    }

    /// Callee of a call or invoke
    pub fn callee(&self) -> Option<&Value> {
        match self {
            Instruction::Call { callee, .. } | Instruction::Invoke { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Name of the directly called function, if any
    pub fn called_function(&self) -> Option<&str> {
        match self.callee() {
            Some(Value::Function(name)) => Some(name),
            _ => None,
        }
    }

    /// No side effects: removable when its result is unused
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Instruction::Binary { .. }
                | Instruction::Unary { .. }
                | Instruction::GetElementPtr { .. }
                | Instruction::Alloca { .. }
                | Instruction::Phi { .. }
                | Instruction::Select { .. }
                | Instruction::ExtractElement { .. }
                | Instruction::InsertElement { .. }
        )
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{arg}")?;
    }
    Ok(())
}

fn write_ordering(f: &mut fmt::Formatter<'_>, ordering: &Option<AtomicOrdering>) -> fmt::Result {
    match ordering {
        Some(ordering) => write!(f, " atomic {ordering}"),
        None => Ok(()),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Binary { result, op, lhs, rhs, result_type } => {
                write!(f, "%{result} = {op} {result_type} {lhs}, {rhs}")
            }
            Instruction::Unary { result, op, operand, result_type } => {
                write!(f, "%{result} = {op} {operand} to {result_type}")
            }
            Instruction::Load { result, ptr, result_type, ordering } => {
                write!(f, "%{result} = load {result_type}, {result_type}* {ptr}")?;
                write_ordering(f, ordering)
            }
            Instruction::Store { value, value_type, ptr, ordering } => {
                write!(f, "store {value_type} {value}, {value_type}* {ptr}")?;
                write_ordering(f, ordering)
            }
            Instruction::AtomicRmw { result, op, ptr, value, result_type, ordering } => {
                write!(f, "%{result} = atomicrmw {op} {result_type}* {ptr}, {value} {ordering}")
            }
            Instruction::CmpXchg { result, success, ptr, expected, new_value, ordering, .. } => {
                write!(f, "%{result}, %{success} = cmpxchg {ptr}, {expected}, {new_value} {ordering}")
            }
            Instruction::Fence { ordering } => write!(f, "fence {ordering}"),
            Instruction::GetElementPtr { result, ptr, indices, .. } => {
                write!(f, "%{result} = getelementptr {ptr}")?;
                for index in indices {
                    write!(f, ", {index}")?;
                }
                Ok(())
            }
            Instruction::Alloca { result, alloc_type, count, .. } => {
                write!(f, "%{result} = alloca {alloc_type}")?;
                if let Some(count) = count {
                    write!(f, ", {count}")?;
                }
                Ok(())
            }
            Instruction::Call { result, callee, args, result_type } => {
                if let Some(result) = result {
                    write!(f, "%{result} = ")?;
                }
                write!(f, "call {result_type} {callee}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Instruction::Invoke { result, callee, args, result_type, normal, unwind } => {
                if let Some(result) = result {
                    write!(f, "%{result} = ")?;
                }
                write!(f, "invoke {result_type} {callee}(")?;
                write_args(f, args)?;
                write!(f, ") to label %L{normal} unwind label %L{unwind}")
            }
            Instruction::Phi { result, incoming, result_type } => {
                write!(f, "%{result} = phi {result_type} ")?;
                for (i, (value, label)) in incoming.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "[{value}, %L{label}]")?;
                }
                Ok(())
            }
            Instruction::Select { result, condition, true_value, false_value, result_type } => {
                write!(f, "%{result} = select i1 {condition}, {result_type} {true_value}, {result_type} {false_value}")
            }
            Instruction::ExtractElement { result, vector, index, .. } => {
                write!(f, "%{result} = extractelement {vector}, {index}")
            }
            Instruction::InsertElement { result, vector, element, index, .. } => {
                write!(f, "%{result} = insertelement {vector}, {element}, {index}")
            }
            Instruction::Return(Some(value)) => write!(f, "ret {value}"),
            Instruction::Return(None) => write!(f, "ret void"),
            Instruction::Branch(label) => write!(f, "br label %L{label}"),
            Instruction::BranchCond { condition, true_label, false_label } => {
                write!(f, "br i1 {condition}, label %L{true_label}, label %L{false_label}")
            }
            Instruction::Switch { value, value_type, default, cases } => {
                write!(f, "switch {value_type} {value}, label %L{default} [")?;
                for (case, label) in cases {
                    write!(f, " {value_type} {case}, label %L{label}")?;
                }
                write!(f, " ]")
            }
            Instruction::Unreachable => write!(f, "unreachable"),
        }
    }
}
