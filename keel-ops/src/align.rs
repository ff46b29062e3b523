//! Natural alignment of memory-touching operators.

use crate::Opcode;

impl Opcode {
    /// Log2 of the operator's natural alignment: the width of the memory
    /// access it performs. `None` for operators that do not take a memarg.
    ///
    /// The encoded alignment hint must not exceed this bound, and must
    /// equal it exactly for the atomic space.
    pub const fn natural_alignment_log2(self) -> Option<u32> {
        use Opcode::*;
        let log2 = match self {
            I32Load8S | I32Load8U | I64Load8S | I64Load8U | I32Store8 | I64Store8
            | V128Load8Splat | V128Load8Lane | V128Store8Lane | I32AtomicLoad8U
            | I64AtomicLoad8U | I32AtomicStore8 | I64AtomicStore8 | I32AtomicRmw8AddU
            | I64AtomicRmw8AddU | I32AtomicRmw8SubU | I64AtomicRmw8SubU
            | I32AtomicRmw8AndU | I64AtomicRmw8AndU | I32AtomicRmw8OrU
            | I64AtomicRmw8OrU | I32AtomicRmw8XorU | I64AtomicRmw8XorU
            | I32AtomicRmw8XchgU | I64AtomicRmw8XchgU | I32AtomicRmw8CmpxchgU
            | I64AtomicRmw8CmpxchgU => 0,

            I32Load16S | I32Load16U | I64Load16S | I64Load16U | I32Store16 | I64Store16
            | V128Load16Splat | V128Load16Lane | V128Store16Lane | I32AtomicLoad16U
            | I64AtomicLoad16U | I32AtomicStore16 | I64AtomicStore16
            | I32AtomicRmw16AddU | I64AtomicRmw16AddU | I32AtomicRmw16SubU
            | I64AtomicRmw16SubU | I32AtomicRmw16AndU | I64AtomicRmw16AndU
            | I32AtomicRmw16OrU | I64AtomicRmw16OrU | I32AtomicRmw16XorU
            | I64AtomicRmw16XorU | I32AtomicRmw16XchgU | I64AtomicRmw16XchgU
            | I32AtomicRmw16CmpxchgU | I64AtomicRmw16CmpxchgU => 1,

            I32Load | F32Load | I64Load32S | I64Load32U | I32Store | F32Store
            | I64Store32 | V128Load32Splat | V128Load32Zero | V128Load32Lane
            | V128Store32Lane | MemoryAtomicNotify | MemoryAtomicWait32
            | I32AtomicLoad | I64AtomicLoad32U | I32AtomicStore | I64AtomicStore32
            | I32AtomicRmwAdd | I64AtomicRmw32AddU | I32AtomicRmwSub
            | I64AtomicRmw32SubU | I32AtomicRmwAnd | I64AtomicRmw32AndU
            | I32AtomicRmwOr | I64AtomicRmw32OrU | I32AtomicRmwXor
            | I64AtomicRmw32XorU | I32AtomicRmwXchg | I64AtomicRmw32XchgU
            | I32AtomicRmwCmpxchg | I64AtomicRmw32CmpxchgU => 2,

            I64Load | F64Load | I64Store | F64Store | V128Load8x8S | V128Load8x8U
            | V128Load16x4S | V128Load16x4U | V128Load32x2S | V128Load32x2U
            | V128Load64Splat | V128Load64Zero | V128Load64Lane | V128Store64Lane
            | MemoryAtomicWait64 | I64AtomicLoad | I64AtomicStore | I64AtomicRmwAdd
            | I64AtomicRmwSub | I64AtomicRmwAnd | I64AtomicRmwOr | I64AtomicRmwXor
            | I64AtomicRmwXchg | I64AtomicRmwCmpxchg => 3,

            V128Load | V128Store => 4,

            _ => return None,
        };
        Some(log2)
    }

    /// Whether the operator sits in the atomic space and therefore requires
    /// its alignment hint to equal the natural alignment.
    pub const fn is_atomic(self) -> bool {
        self.encoding() >> 16 == crate::PREFIX_ATOMIC as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_the_access_size() {
        assert_eq!(Opcode::I32Load.natural_alignment_log2(), Some(2));
        assert_eq!(Opcode::I64Load32U.natural_alignment_log2(), Some(2));
        assert_eq!(Opcode::V128Load.natural_alignment_log2(), Some(4));
        assert_eq!(Opcode::V128Load8x8S.natural_alignment_log2(), Some(3));
        assert_eq!(Opcode::I32Add.natural_alignment_log2(), None);
    }

    #[test]
    fn atomics_are_flagged() {
        assert!(Opcode::I32AtomicLoad.is_atomic());
        assert!(Opcode::AtomicFence.is_atomic());
        assert!(!Opcode::I32Load.is_atomic());
    }
}
