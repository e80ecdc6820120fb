//! File System Linker - Intermediate Representation
//! 
//! This crate defines the typed IR the linker merges and normalizes.
//! 
//! ## Architecture
//! 
//! The crate is structured as follows:
//! - `types` - Type system (IrType)
//! - `values` - Value representations
//! - `ops` - Binary, unary and atomic operations
//! - `instructions` - IR instructions
//! - `blocks` - Basic block management
//! - `function` - Function definitions and attributes
//! - `module` - Module, global variables and aliases
//! - `layout` - Data layout derived from the target triple
//! - `builder` - IR construction utilities

// Public exports - clean API surface
pub use self::types::IrType;
pub use self::values::Value;
pub use self::ops::{AtomicOrdering, AtomicRmwOp, IrBinaryOp, IrUnaryOp};
pub use self::instructions::Instruction;
pub use self::blocks::BasicBlock;
pub use self::function::{is_vector_value, Function, FunctionAttributes, TypeEnv};
pub use self::module::{Alias, GlobalVariable, Linkage, Module};
pub use self::layout::{DataLayout, Endianness};
pub use self::builder::IrBuilder;
pub use fsl_common::{LabelId, TempId};

// Internal modules
mod types;
mod values;
mod ops;
mod instructions;
mod blocks;
mod function;
mod module;
mod layout;
mod builder;
