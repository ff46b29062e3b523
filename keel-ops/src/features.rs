//! Feature gates over the operator inventory.

use core::fmt;

bitflags::bitflags! {
    /// The set of enabled proposals.
    ///
    /// Decoding and validation reject anything gated behind a bit that is
    /// not set. The operator table carries one flag per operator; flags
    /// outside the table (such as [`Self::SHARED_MEMORIES`]) gate section
    /// content instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureSet: u32 {
        /// The WebAssembly v1 baseline. Always enabled.
        const MVP = 0;
        /// Multiple results on functions and blocks.
        const MULTI_VALUE = 1 << 0;
        /// `i32.extend8_s` and friends.
        const SIGN_EXTENSION = 1 << 1;
        /// Saturating float-to-int conversions.
        const NONTRAPPING_FLOAT_TO_INT = 1 << 2;
        /// `memory.copy`, `memory.fill`, passive segments, table init/copy.
        const BULK_MEMORY = 1 << 3;
        /// `funcref`/`externref` values outside tables.
        const REFERENCE_TYPES = 1 << 4;
        /// The packed-vector operator space.
        const SIMD = 1 << 5;
        /// The atomic operator space.
        const ATOMICS = 1 << 6;
        /// Shared linear memories.
        const SHARED_MEMORIES = 1 << 7;
        /// `try`/`catch`/`throw` and exception tags.
        const EXCEPTION_HANDLING = 1 << 8;
    }
}

impl FeatureSet {
    /// Everything the engine implements.
    pub const fn standard() -> Self {
        Self::all()
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
