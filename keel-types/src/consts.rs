//! Engine-wide size parameters.

/// Size of a linear-memory page, in bytes.
pub const PAGE_SIZE: u64 = 65536;

/// Log2 of [`PAGE_SIZE`].
pub const PAGE_SIZE_LOG2: u32 = 16;

/// Absolute cap on the page count of a 32-bit linear memory.
pub const MAX_MEMORY_PAGES: u64 = 65536;

/// Absolute cap on the element count of a table.
pub const MAX_TABLE_ELEMS: u64 = u32::MAX as u64;

/// Maximum number of parameters accepted on a function type.
pub const MAX_PARAMS: usize = 1000;

/// Maximum number of results accepted on a function type.
pub const MAX_RESULTS: usize = 16;

/// Maximum number of declared locals in a single function body.
pub const MAX_LOCALS: usize = 50_000;

/// Maximum operand values carried on a trap.
pub const MAX_TRAP_OPERANDS: usize = 16;

static_assertions::const_assert!(PAGE_SIZE == 1 << PAGE_SIZE_LOG2);
static_assertions::const_assert!(MAX_MEMORY_PAGES * PAGE_SIZE <= 1 << 32);
