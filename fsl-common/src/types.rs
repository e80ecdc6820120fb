//! Common identifiers used throughout the linker
//! 
//! The IR refers to SSA temporaries and basic blocks by small integer ids.
//! They are plain aliases so the IR stays cheap to clone and serialize.

/// Label identifier of a basic block within a function
pub type LabelId = u32;

/// Temporary (SSA value) identifier within a function
pub type TempId = u32;

/// Prefix reserved for compiler intrinsics; such names never need linking.
pub const INTRINSIC_PREFIX: &str = "llvm.";

/// Check whether a symbol name lives in the reserved intrinsic namespace
pub fn is_intrinsic_name(name: &str) -> bool {
    name.starts_with(INTRINSIC_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_names() {
        assert!(is_intrinsic_name("llvm.memcpy.p0i8.p0i8.i64"));
        assert!(is_intrinsic_name("llvm.dbg.declare"));
        assert!(!is_intrinsic_name("memcpy"));
        assert!(!is_intrinsic_name("llvmfoo"));
    }
}
