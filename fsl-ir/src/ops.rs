//! IR Operations
//!
//! Defines binary, unary and atomic operations available in the IR.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operations in IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrBinaryOp {
    // Arithmetic
    Add, Sub, Mul,
    SDiv, UDiv,    // Signed/unsigned division
    SRem, URem,    // Signed/unsigned remainder

    // Bitwise
    And, Or, Xor,
    Shl, LShr, AShr, // Logical/arithmetic shift right

    // Comparison (return i1)
    Eq, Ne,
    Slt, Sle, Sgt, Sge, // Signed comparisons
    Ult, Ule, Ugt, Uge, // Unsigned comparisons
}

impl IrBinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            IrBinaryOp::Eq | IrBinaryOp::Ne
                | IrBinaryOp::Slt | IrBinaryOp::Sle | IrBinaryOp::Sgt | IrBinaryOp::Sge
                | IrBinaryOp::Ult | IrBinaryOp::Ule | IrBinaryOp::Ugt | IrBinaryOp::Uge
        )
    }

    /// Fold two constants. Division by zero and oversized shifts do not fold.
    pub fn fold(&self, lhs: i64, rhs: i64) -> Option<i64> {
        let b = |v: bool| v as i64;
        Some(match self {
            IrBinaryOp::Add => lhs.wrapping_add(rhs),
            IrBinaryOp::Sub => lhs.wrapping_sub(rhs),
            IrBinaryOp::Mul => lhs.wrapping_mul(rhs),
            IrBinaryOp::SDiv => lhs.checked_div(rhs)?,
            IrBinaryOp::UDiv => (lhs as u64).checked_div(rhs as u64)? as i64,
            IrBinaryOp::SRem => lhs.checked_rem(rhs)?,
            IrBinaryOp::URem => (lhs as u64).checked_rem(rhs as u64)? as i64,
            IrBinaryOp::And => lhs & rhs,
            IrBinaryOp::Or => lhs | rhs,
            IrBinaryOp::Xor => lhs ^ rhs,
            IrBinaryOp::Shl => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
            IrBinaryOp::LShr => ((lhs as u64).checked_shr(u32::try_from(rhs).ok()?)?) as i64,
            IrBinaryOp::AShr => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
            IrBinaryOp::Eq => b(lhs == rhs),
            IrBinaryOp::Ne => b(lhs != rhs),
            IrBinaryOp::Slt => b(lhs < rhs),
            IrBinaryOp::Sle => b(lhs <= rhs),
            IrBinaryOp::Sgt => b(lhs > rhs),
            IrBinaryOp::Sge => b(lhs >= rhs),
            IrBinaryOp::Ult => b((lhs as u64) < (rhs as u64)),
            IrBinaryOp::Ule => b((lhs as u64) <= (rhs as u64)),
            IrBinaryOp::Ugt => b((lhs as u64) > (rhs as u64)),
            IrBinaryOp::Uge => b((lhs as u64) >= (rhs as u64)),
        })
    }
}

impl fmt::Display for IrBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            IrBinaryOp::Add => "add",
            IrBinaryOp::Sub => "sub",
            IrBinaryOp::Mul => "mul",
            IrBinaryOp::SDiv => "sdiv",
            IrBinaryOp::UDiv => "udiv",
            IrBinaryOp::SRem => "srem",
            IrBinaryOp::URem => "urem",
            IrBinaryOp::And => "and",
            IrBinaryOp::Or => "or",
            IrBinaryOp::Xor => "xor",
            IrBinaryOp::Shl => "shl",
            IrBinaryOp::LShr => "lshr",
            IrBinaryOp::AShr => "ashr",
            IrBinaryOp::Eq => "icmp eq",
            IrBinaryOp::Ne => "icmp ne",
            IrBinaryOp::Slt => "icmp slt",
            IrBinaryOp::Sle => "icmp sle",
            IrBinaryOp::Sgt => "icmp sgt",
            IrBinaryOp::Sge => "icmp sge",
            IrBinaryOp::Ult => "icmp ult",
            IrBinaryOp::Ule => "icmp ule",
            IrBinaryOp::Ugt => "icmp ugt",
            IrBinaryOp::Uge => "icmp uge",
        };
        write!(f, "{op_str}")
    }
}

/// Unary operations and casts in IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrUnaryOp {
    Not,      // Bitwise NOT
    Neg,      // Arithmetic negation
    ZExt,     // Zero extend
    SExt,     // Sign extend
    Trunc,    // Truncate
    PtrToInt, // Pointer to integer cast
    IntToPtr, // Integer to pointer cast
    BitCast,  // Reinterpret bits
}

impl fmt::Display for IrUnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            IrUnaryOp::Not => "not",
            IrUnaryOp::Neg => "neg",
            IrUnaryOp::ZExt => "zext",
            IrUnaryOp::SExt => "sext",
            IrUnaryOp::Trunc => "trunc",
            IrUnaryOp::PtrToInt => "ptrtoint",
            IrUnaryOp::IntToPtr => "inttoptr",
            IrUnaryOp::BitCast => "bitcast",
        };
        write!(f, "{op_str}")
    }
}

/// Memory ordering of atomic instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicOrdering {
    Monotonic,
    Acquire,
    Release,
    AcquireRelease,
    SequentiallyConsistent,
}

impl fmt::Display for AtomicOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AtomicOrdering::Monotonic => "monotonic",
            AtomicOrdering::Acquire => "acquire",
            AtomicOrdering::Release => "release",
            AtomicOrdering::AcquireRelease => "acq_rel",
            AtomicOrdering::SequentiallyConsistent => "seq_cst",
        };
        write!(f, "{s}")
    }
}

/// Read-modify-write operations of `atomicrmw`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicRmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Max,
    Min,
    UMax,
    UMin,
}

impl fmt::Display for AtomicRmwOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AtomicRmwOp::Xchg => "xchg",
            AtomicRmwOp::Add => "add",
            AtomicRmwOp::Sub => "sub",
            AtomicRmwOp::And => "and",
            AtomicRmwOp::Or => "or",
            AtomicRmwOp::Xor => "xor",
            AtomicRmwOp::Max => "max",
            AtomicRmwOp::Min => "min",
            AtomicRmwOp::UMax => "umax",
            AtomicRmwOp::UMin => "umin",
        };
        write!(f, "{s}")
    }
}
