//! IR Type System
//!
//! Defines the type system for the IR: integers, floats, pointers, vectors,
//! aggregates and function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// IR Type system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Void type
    Void,

    /// Integer types with bit width
    I1,
    I8,
    I16,
    I32,
    I64,

    /// Floating point types
    F32,
    F64,

    /// Pointer type
    Ptr(Box<IrType>),

    /// Vector type <len x element_type>
    Vector { len: u32, element_type: Box<IrType> },

    /// Array type [size x element_type]
    Array { size: u64, element_type: Box<IrType> },

    /// Function type
    Function {
        return_type: Box<IrType>,
        param_types: Vec<IrType>,
        is_vararg: bool,
    },

    /// Struct type
    Struct {
        name: Option<String>,
        fields: Vec<IrType>,
        packed: bool,
    },

    /// Label type (for basic block addresses)
    Label,
}

impl IrType {
    /// Pointer to the given type
    pub fn ptr(to: IrType) -> IrType {
        IrType::Ptr(Box::new(to))
    }

    /// Vector of `len` elements
    pub fn vector(len: u32, element_type: IrType) -> IrType {
        IrType::Vector { len, element_type: Box::new(element_type) }
    }

    /// Integer type with the given bit width, if one exists
    pub fn int(bits: u32) -> Option<IrType> {
        match bits {
            1 => Some(IrType::I1),
            8 => Some(IrType::I8),
            16 => Some(IrType::I16),
            32 => Some(IrType::I32),
            64 => Some(IrType::I64),
            _ => None,
        }
    }

    /// Bit width of integer types
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            IrType::I1 => Some(1),
            IrType::I8 => Some(8),
            IrType::I16 => Some(16),
            IrType::I32 => Some(32),
            IrType::I64 => Some(64),
            _ => None,
        }
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        self.int_bits().is_some()
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    /// Check if this is a vector type
    pub fn is_vector(&self) -> bool {
        matches!(self, IrType::Vector { .. })
    }

    /// Number of lanes of a vector type
    pub fn vector_len(&self) -> Option<u32> {
        match self {
            IrType::Vector { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Get the element type for pointers, vectors and arrays
    pub fn element_type(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(elem) => Some(elem),
            IrType::Vector { element_type, .. } => Some(element_type),
            IrType::Array { element_type, .. } => Some(element_type),
            _ => None,
        }
    }

    /// Same shape with vector lanes replaced by their element type
    pub fn scalar_type(&self) -> &IrType {
        match self {
            IrType::Vector { element_type, .. } => element_type,
            other => other,
        }
    }

    /// Number of parameters of a function type
    pub fn param_count(&self) -> Option<usize> {
        match self {
            IrType::Function { param_types, .. } => Some(param_types.len()),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I16 => write!(f, "i16"),
            IrType::I32 => write!(f, "i32"),
            IrType::I64 => write!(f, "i64"),
            IrType::F32 => write!(f, "float"),
            IrType::F64 => write!(f, "double"),
            IrType::Ptr(target) => write!(f, "{target}*"),
            IrType::Vector { len, element_type } => write!(f, "<{len} x {element_type}>"),
            IrType::Array { size, element_type } => write!(f, "[{size} x {element_type}]"),
            IrType::Function { return_type, param_types, is_vararg } => {
                write!(f, "{return_type} (")?;
                for (i, param) in param_types.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{param}")?;
                }
                if *is_vararg { write!(f, ", ...")?; }
                write!(f, ")")
            }
            IrType::Struct { name: Some(name), .. } => write!(f, "%{name}"),
            IrType::Struct { name: None, fields, packed } => {
                if *packed { write!(f, "<")?; }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{field}")?;
                }
                write!(f, " }}")?;
                if *packed { write!(f, ">")?; }
                Ok(())
            }
            IrType::Label => write!(f, "label"),
        }
    }
}
