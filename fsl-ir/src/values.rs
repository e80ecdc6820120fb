//! IR Value Representations
//!
//! Defines values that can be used as operands in IR instructions,
//! including temporaries, constants, symbol references and inline assembly.

use fsl_common::TempId;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::IrType;

/// IR Value - represents operands in IR instructions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Temporary variable
    Temp(TempId),

    /// Constant integer
    Constant(i64),

    /// Constant vector of integers
    ConstantVector { elements: Vec<i64>, element_type: IrType },

    /// Array of constant values (for initializers)
    ConstantArray(Vec<i64>),

    /// Null pointer
    Null,

    /// Global variable reference
    Global(String),

    /// Function reference
    Function(String),

    /// Inline assembly used as a callee
    InlineAsm { assembly: String, constraints: String },

    /// Undefined value
    Undef,
}

impl Value {
    /// The all-zero value of a type
    pub fn zero_of(ty: &IrType) -> Value {
        match ty {
            IrType::Ptr(_) => Value::Null,
            IrType::Vector { len, element_type } => Value::ConstantVector {
                elements: vec![0; *len as usize],
                element_type: (**element_type).clone(),
            },
            IrType::Void | IrType::Label | IrType::Function { .. } => Value::Undef,
            _ => Value::Constant(0),
        }
    }

    pub fn as_temp(&self) -> Option<TempId> {
        match self {
            Value::Temp(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Value::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Name of the global or function this value refers to
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Value::Global(name) | Value::Function(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_inline_asm(&self) -> bool {
        matches!(self, Value::InlineAsm { .. })
    }

    /// True for values that are known at link time
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Value::Constant(_)
                | Value::ConstantVector { .. }
                | Value::ConstantArray(_)
                | Value::Null
                | Value::Undef
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id) => write!(f, "%{id}"),
            Value::Constant(val) => write!(f, "{val}"),
            Value::ConstantVector { elements, element_type } => {
                write!(f, "<")?;
                for (i, val) in elements.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{element_type} {val}")?;
                }
                write!(f, ">")
            }
            Value::ConstantArray(values) => {
                write!(f, "[")?;
                for (i, val) in values.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{val}")?;
                }
                write!(f, "]")
            }
            Value::Null => write!(f, "null"),
            Value::Global(name) => write!(f, "@{name}"),
            Value::Function(name) => write!(f, "@{name}"),
            Value::InlineAsm { assembly, constraints } => {
                write!(f, "asm \"{assembly}\", \"{constraints}\"")
            }
            Value::Undef => write!(f, "undef"),
        }
    }
}
