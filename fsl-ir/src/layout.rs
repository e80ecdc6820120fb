//! Data layout derived from a target triple
//!
//! The linker only needs pointer width and byte order. Both come from
//! `target-lexicon`; an empty or unparsable triple falls back to a 64-bit
//! little-endian layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use target_lexicon::Triple;
use crate::IrType;

/// Byte order of the target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

/// Target data layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLayout {
    /// Pointer size in bytes
    pub pointer_size: u8,
    pub endianness: Endianness,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            endianness: Endianness::Little,
        }
    }
}

impl DataLayout {
    /// Derive the layout of a target triple string
    pub fn from_triple(triple: &str) -> Self {
        if triple.is_empty() {
            return Self::default();
        }
        let Ok(triple) = Triple::from_str(triple) else {
            return Self::default();
        };

        let pointer_size = match triple.pointer_width() {
            Ok(target_lexicon::PointerWidth::U16) => 2,
            Ok(target_lexicon::PointerWidth::U32) => 4,
            Ok(target_lexicon::PointerWidth::U64) => 8,
            Err(_) => 8,
        };

        let endianness = match triple.endianness() {
            Ok(target_lexicon::Endianness::Big) => Endianness::Big,
            _ => Endianness::Little,
        };

        Self { pointer_size, endianness }
    }

    /// Integer type wide enough to hold a pointer
    pub fn intptr_type(&self) -> IrType {
        IrType::int(self.pointer_size as u32 * 8).unwrap_or(IrType::I64)
    }

    pub fn is_64bit(&self) -> bool {
        self.pointer_size == 8
    }
}

/// Descriptor string, e.g. `e-p:64`
impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.endianness {
            Endianness::Little => "e",
            Endianness::Big => "E",
        };
        write!(f, "{order}-p:{}", self.pointer_size as u32 * 8)
    }
}
