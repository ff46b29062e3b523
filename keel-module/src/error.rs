//! Load-time error bands.

use keel_types::ExternKind;

/// A parse failure: the bytes are not a WebAssembly module.
///
/// Offsets are absolute positions in the input buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BinaryError {
    /// The input ended inside a value.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Position of the truncation.
        offset: usize,
    },
    /// The magic number is not `\0asm`.
    #[error("bad magic number")]
    BadMagic,
    /// The version field is not 1.
    #[error("unsupported binary version {0}")]
    BadVersion(u32),
    /// A LEB128 integer was overlong or exceeded its declared width.
    #[error("malformed LEB128 integer at offset {offset}")]
    BadLeb128 {
        /// Position of the offending byte.
        offset: usize,
    },
    /// An opcode outside the operator table.
    #[error("unknown opcode 0x{raw:x} at offset {offset}")]
    UnknownOpcode {
        /// The encoding key that failed to resolve.
        raw: u32,
        /// Position of the opcode byte.
        offset: usize,
    },
    /// An operator whose feature gate is disabled.
    #[error("operator {name} requires a disabled feature")]
    FeatureDisabled {
        /// Display name of the gated operator.
        name: &'static str,
    },
    /// A byte that does not encode a value type.
    #[error("invalid value type byte 0x{byte:02x} at offset {offset}")]
    BadValueType {
        /// The offending byte.
        byte: u8,
        /// Its position.
        offset: usize,
    },
    /// A byte that does not encode a reference type.
    #[error("invalid reference type byte 0x{byte:02x} at offset {offset}")]
    BadRefType {
        /// The offending byte.
        byte: u8,
        /// Its position.
        offset: usize,
    },
    /// A malformed block type encoding.
    #[error("invalid block type at offset {offset}")]
    BadBlockType {
        /// Position of the encoding.
        offset: usize,
    },
    /// A section id outside the known set.
    #[error("unknown section id {0}")]
    UnknownSection(u8),
    /// A non-custom section out of canonical order.
    #[error("section id {0} out of order")]
    SectionOutOfOrder(u8),
    /// A non-custom section appearing twice.
    #[error("duplicate section id {0}")]
    DuplicateSection(u8),
    /// A section body longer or shorter than its declared length.
    #[error("section id {id} length mismatch: declared {declared}, consumed {consumed}")]
    SectionLengthMismatch {
        /// Section id.
        id: u8,
        /// Declared byte length.
        declared: usize,
        /// Bytes actually consumed.
        consumed: usize,
    },
    /// A function body longer or shorter than its declared length.
    #[error("body of function {func} length mismatch")]
    BodyLengthMismatch {
        /// Defined-function index.
        func: u32,
    },
    /// The function and code sections declare different counts.
    #[error("function section declares {functions} functions but code section has {bodies} bodies")]
    FunctionCodeCountMismatch {
        /// Declared function count.
        functions: usize,
        /// Code entry count.
        bodies: usize,
    },
    /// A name that is not valid UTF-8.
    #[error("invalid UTF-8 in name at offset {offset}")]
    BadUtf8 {
        /// Position of the name.
        offset: usize,
    },
    /// An unknown flags byte (limits, mutability, segment kinds).
    #[error("invalid flags value {value:#x} at offset {offset}")]
    BadFlags {
        /// The offending value.
        value: u32,
        /// Its position.
        offset: usize,
    },
    /// An unknown extern kind byte.
    #[error("invalid extern kind byte 0x{byte:02x} at offset {offset}")]
    BadExternKind {
        /// The offending byte.
        byte: u8,
        /// Its position.
        offset: usize,
    },
    /// A function type not introduced by the `0x60` form tag.
    #[error("invalid function type form 0x{byte:02x} at offset {offset}")]
    BadFuncTypeForm {
        /// The offending byte.
        byte: u8,
        /// Its position.
        offset: usize,
    },
    /// More locals than the engine accepts.
    #[error("function {func} declares too many locals")]
    TooManyLocals {
        /// Defined-function index.
        func: u32,
    },
    /// An expression that ran past its enclosing frame without `end`.
    #[error("unterminated expression at offset {offset}")]
    UnterminatedExpression {
        /// Position where input ran out.
        offset: usize,
    },
    /// Bytes left over after the final section.
    #[error("trailing bytes after final section at offset {offset}")]
    TrailingBytes {
        /// Position of the first stray byte.
        offset: usize,
    },
}

/// A typing failure: the module parsed but violates a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// A type index beyond the type table.
    #[error("type index {index} out of range ({count} types)")]
    TypeIndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Size of the type table.
        count: usize,
    },
    /// A function/table/memory/global/tag index beyond its index space.
    #[error("{kind} index {index} out of range ({count} defined)")]
    IndexOutOfRange {
        /// Index space.
        kind: ExternKind,
        /// The offending index.
        index: u32,
        /// Size of the index space.
        count: usize,
    },
    /// A data or element segment index beyond its table.
    #[error("{space} segment index {index} out of range ({count} segments)")]
    SegmentIndexOutOfRange {
        /// `"data"` or `"elem"`.
        space: &'static str,
        /// The offending index.
        index: u32,
        /// Number of segments.
        count: usize,
    },
    /// Limits with `min > max`.
    #[error("{kind} limits invalid: min {min} exceeds max {max}")]
    LimitsMinExceedsMax {
        /// Index space.
        kind: ExternKind,
        /// Declared minimum.
        min: u64,
        /// Declared maximum.
        max: u64,
    },
    /// Limits beyond the absolute cap.
    #[error("{kind} limits exceed the absolute cap of {cap}")]
    LimitsExceedCap {
        /// Index space.
        kind: ExternKind,
        /// The cap that was exceeded.
        cap: u64,
    },
    /// A shared memory without a declared maximum.
    #[error("shared memory requires a declared maximum")]
    SharedMemoryWithoutMax,
    /// Shared memories with the feature disabled.
    #[error("shared memories are disabled")]
    SharedMemoriesDisabled,
    /// A function type with too many parameters or results.
    #[error("function type arity exceeds the configured cap")]
    ArityTooLarge,
    /// Multiple results with the feature disabled.
    #[error("multiple results require the multi-value feature")]
    MultiValueDisabled,
    /// A non-constant operator in a constant expression.
    #[error("non-constant operator {name} in a constant expression")]
    NonConstantInitializer {
        /// Display name of the operator.
        name: &'static str,
    },
    /// A constant expression yielding the wrong type.
    #[error("constant expression has type {found}, expected {expected}")]
    InitializerTypeMismatch {
        /// Required type.
        expected: String,
        /// Actual type.
        found: String,
    },
    /// `global.get` of a non-imported or mutable global in an initializer.
    #[error("constant expression may only read imported immutable globals (global {index})")]
    InitializerGlobalNotImportedImmutable {
        /// The offending global index.
        index: u32,
    },
    /// Two exports with the same name.
    #[error("duplicate export name {name:?}")]
    DuplicateExportName {
        /// The duplicated name.
        name: String,
    },
    /// A start function whose type is not `[] -> []`.
    #[error("start function must have type [] -> [], found {found}")]
    BadStartFunctionType {
        /// Actual type.
        found: String,
    },
    /// An element segment whose type does not match its table.
    #[error("element segment type {segment} does not match table type {table}")]
    ElemSegmentTypeMismatch {
        /// Segment element type.
        segment: String,
        /// Table element type.
        table: String,
    },
    /// A tag whose type has results.
    #[error("exception tag type must have no results, found {found}")]
    TagTypeHasResults {
        /// Actual type.
        found: String,
    },
    /// A data count section disagreeing with the data section.
    #[error("data count {declared} does not match {actual} data segments")]
    DataCountMismatch {
        /// Count from the data-count section.
        declared: u32,
        /// Number of decoded segments.
        actual: usize,
    },
    /// A global written despite being immutable.
    #[error("global {index} is immutable")]
    GlobalNotMutable {
        /// The offending global index.
        index: u32,
    },
    /// A failure inside one function body.
    #[error("in function {func}, operator {index} ({name}): {reason}")]
    Body {
        /// Function index (import-space).
        func: u32,
        /// Logical operator index within the body.
        index: usize,
        /// Display name of the operator.
        name: &'static str,
        /// What went wrong.
        reason: BodyError,
    },
}

/// The reason a function body failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BodyError {
    /// A pop from an empty (and reachable) stack.
    #[error("stack underflow: expected {expected}")]
    StackUnderflow {
        /// Type the operator wanted.
        expected: String,
    },
    /// An operand of the wrong type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the operator wanted.
        expected: String,
        /// Type on the stack.
        found: String,
    },
    /// A branch depth beyond the control stack.
    #[error("branch depth {depth} exceeds {frames} enclosing frames")]
    BadBranchDepth {
        /// The requested depth.
        depth: u32,
        /// Current control-stack size.
        frames: usize,
    },
    /// `br_table` targets with incompatible label types.
    #[error("br_table targets disagree on label types")]
    InconsistentBrTable,
    /// A local index beyond the frame.
    #[error("local index {index} out of range ({count} locals)")]
    BadLocalIndex {
        /// The offending index.
        index: u32,
        /// Locals in the frame.
        count: usize,
    },
    /// An index-space failure (function, global, table, memory, tag,
    /// segment) inside a body.
    #[error("{0}")]
    Module(Box<ValidationError>),
    /// An alignment hint exceeding the operator's natural alignment.
    #[error("alignment 2^{align} exceeds natural alignment 2^{natural}")]
    AlignmentTooLarge {
        /// Encoded alignment log2.
        align: u32,
        /// Natural alignment log2.
        natural: u32,
    },
    /// An atomic operator with a non-natural alignment.
    #[error("atomic access requires exact natural alignment 2^{natural}, found 2^{align}")]
    AtomicAlignmentNotNatural {
        /// Encoded alignment log2.
        align: u32,
        /// Natural alignment log2.
        natural: u32,
    },
    /// An atomic wait or notify on an unshared memory.
    #[error("atomic wait/notify requires a shared memory")]
    AtomicNeedsSharedMemory,
    /// An `atomic.fence` with a non-sequentially-consistent ordering.
    #[error("atomic.fence ordering must be sequentially consistent")]
    BadFenceOrdering,
    /// The legacy `select` applied to a reference type.
    #[error("untyped select cannot produce a reference ({found})")]
    UntypedSelectOnRef {
        /// The reference type found.
        found: String,
    },
    /// A typed `select` with an arity other than one.
    #[error("typed select requires exactly one type, found {found}")]
    BadSelectArity {
        /// Number of immediate types.
        found: usize,
    },
    /// `ref.func` on a function that is never declared referenceable.
    #[error("function {index} is not declared referenceable")]
    UndeclaredFunctionReference {
        /// The offending function index.
        index: u32,
    },
    /// `rethrow` outside the catch of a deep-enough `try`.
    #[error("rethrow depth {depth} does not name a catch block")]
    BadRethrowDepth {
        /// The requested depth.
        depth: u32,
    },
    /// `else` outside an `if`, or a second `else`.
    #[error("else without a matching if")]
    ElseWithoutIf,
    /// `catch`/`catch_all`/`delegate` outside a `try`.
    #[error("{name} without a matching try")]
    CatchWithoutTry {
        /// The offending operator.
        name: &'static str,
    },
    /// A `catch` after `catch_all`.
    #[error("catch after catch_all")]
    CatchAfterCatchAll,
    /// A structured frame closed with values left over.
    #[error("frame closed with {found} extra values on the stack")]
    FrameHeightMismatch {
        /// Number of surplus operands.
        found: usize,
    },
    /// An `if` without `else` whose results differ from its parameters.
    #[error("if without else must have matching parameter and result types")]
    IfWithoutElseTypeMismatch,
    /// Operators after the closing `end` of the body.
    #[error("operators after the function's final end")]
    TrailingOperators,
    /// The body ended with control frames still open.
    #[error("function ended with {depth} unclosed frames")]
    UnclosedFrames {
        /// Number of frames still open.
        depth: usize,
    },
    /// An operator whose feature gate is disabled. Decoding normally
    /// rejects these first; this covers programmatically built modules.
    #[error("operator is behind a disabled feature")]
    FeatureDisabled,
    /// A lane index beyond the operator's lane count.
    #[error("lane index {lane} out of range for {lanes} lanes")]
    BadLaneIndex {
        /// The offending lane.
        lane: u8,
        /// Lane count of the shape.
        lanes: u8,
    },
}

impl From<ValidationError> for BodyError {
    fn from(error: ValidationError) -> Self {
        Self::Module(Box::new(error))
    }
}
