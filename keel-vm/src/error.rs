//! Runtime traps and link-time errors.

use std::fmt;

use keel_types::{
    consts::MAX_TRAP_OPERANDS,
    ExternType,
    Value,
};

/// Why a trap fired.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumDiscriminants)]
#[strum_discriminants(name(TrapCode), derive(Hash, strum::EnumIter))]
#[non_exhaustive]
pub enum TrapKind {
    /// A load or store past the accessible end of a linear memory.
    OutOfBoundsMemoryAccess,
    /// A table access past the table's current length.
    OutOfBoundsTableAccess,
    /// An indirect call through a null table element.
    UndefinedElement,
    /// An indirect call whose callee type does not match the declared type.
    IndirectCallSignatureMismatch,
    /// Integer division by zero, or `INT_MIN / -1`.
    IntegerDivideByZeroOrOverflow,
    /// A float-to-int truncation of NaN or an out-of-range value.
    InvalidFloatOperation,
    /// The call stack exceeded its limit.
    StackOverflow,
    /// The `unreachable` operator.
    Unreachable,
    /// A call into an import that was stubbed rather than resolved.
    CalledUnimplementedIntrinsic,
    /// The host refused to commit memory for a grow request.
    OutOfMemory,
    /// A guest exception thrown and never caught.
    UserException {
        /// Object id of the tag, within the throwing compartment.
        tag: u32,
        /// The tag's payload values.
        payload: Vec<Value>,
    },
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBoundsMemoryAccess => f.write_str("out-of-bounds memory access"),
            Self::OutOfBoundsTableAccess => f.write_str("out-of-bounds table access"),
            Self::UndefinedElement => f.write_str("undefined table element"),
            Self::IndirectCallSignatureMismatch => {
                f.write_str("indirect call signature mismatch")
            }
            Self::IntegerDivideByZeroOrOverflow => {
                f.write_str("integer divide by zero or overflow")
            }
            Self::InvalidFloatOperation => f.write_str("invalid float operation"),
            Self::StackOverflow => f.write_str("stack overflow"),
            Self::Unreachable => f.write_str("unreachable executed"),
            Self::CalledUnimplementedIntrinsic => {
                f.write_str("called an unimplemented intrinsic")
            }
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::UserException { tag, .. } => write!(f, "uncaught exception (tag {tag})"),
        }
    }
}

/// One entry of a captured call stack, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Debug name of the function, as given at instantiation or import.
    pub function: String,
    /// Logical index of the operator that was executing.
    pub operator: usize,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@op{}", self.function, self.operator)
    }
}

/// A structured guest failure, unwound to the nearest invoke boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Trap {
    /// What happened.
    pub kind: TrapKind,
    /// Up to [`MAX_TRAP_OPERANDS`] values involved (the faulting address,
    /// the mismatched index, ...).
    pub operands: Vec<Value>,
    /// Captured call stack, innermost frame first.
    pub stack: Vec<FrameInfo>,
}

impl Trap {
    /// A trap with no operands and no stack yet.
    pub fn new(kind: TrapKind) -> Self {
        Self {
            kind,
            operands: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Attach an operand, silently dropping past the cap.
    pub fn with_operand(mut self, value: impl Into<Value>) -> Self {
        if self.operands.len() < MAX_TRAP_OPERANDS {
            self.operands.push(value.into());
        }
        self
    }

    /// Record a stack frame during unwinding, outermost last.
    pub(crate) fn push_frame(&mut self, function: &str, operator: usize) {
        self.stack.push(FrameInfo {
            function: function.to_string(),
            operator,
        });
    }
}

impl std::error::Error for Trap {}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trap: {}", self.kind)?;
        for operand in &self.operands {
            write!(f, " [{operand}]")?;
        }
        if !self.stack.is_empty() {
            write!(f, " at ")?;
            for (index, frame) in self.stack.iter().enumerate() {
                if index > 0 {
                    write!(f, " <- ")?;
                }
                write!(f, "{frame}")?;
            }
        }
        Ok(())
    }
}

/// One import the linker could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingImport {
    /// Module namespace of the import.
    pub module: String,
    /// Name within the namespace.
    pub name: String,
    /// The type the module expected.
    pub ty: ExternType,
}

impl fmt::Display for MissingImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.module, self.name, self.ty)
    }
}

/// The linker's failure report: every unresolved import, not just the
/// first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum LinkError {
    /// One or more imports went unresolved.
    #[error("{} unresolved import(s): {}", missing.len(),
        missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    MissingImports {
        /// Every import that failed to resolve.
        missing: Vec<MissingImport>,
    },
    /// A resolved object came from a different compartment.
    #[error("import {module}.{name} resolves to an object from another compartment")]
    CrossCompartment {
        /// Module namespace of the import.
        module: String,
        /// Name within the namespace.
        name: String,
    },
}

/// Any load-time failure, for callers that drive the whole pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The codec rejected the bytes.
    #[error(transparent)]
    Malformed(#[from] keel_module::BinaryError),
    /// The validator rejected the module.
    #[error(transparent)]
    Invalid(#[from] keel_module::ValidationError),
    /// Imports could not be resolved.
    #[error(transparent)]
    Link(#[from] LinkError),
}
