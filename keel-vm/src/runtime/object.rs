//! The flattened object model: one tagged union of per-kind payloads,
//! reference-counted handles, and the kind-erased [`Object`].

use std::sync::{
    atomic::{
        AtomicU32,
        Ordering,
    },
    Arc,
    OnceLock,
    Weak,
};

use keel_types::{
    ExternKind,
    ExternType,
    GlobalType,
    InternedFuncType,
    UntaggedValue,
    Value,
};

use super::{
    compartment::CompartmentInner,
    memory::MemoryData,
    table::TableData,
};
use crate::{
    exec::{
        CodeUnit,
        ExecCtx,
        InstanceView,
    },
    Trap,
};

/// Index of an object within its compartment's arena.
pub(crate) type ObjectId = u32;

/// Shared header of every arena slot: the number of external strong
/// handles. Objects with a nonzero count are garbage-collection roots.
#[derive(Debug, Default)]
pub(crate) struct ObjectHeader {
    pub(crate) external: AtomicU32,
}

/// How a function executes when called.
pub(crate) enum FunctionCode {
    /// A function of a loaded module, run through the module's code unit.
    Guest {
        /// The owning module's compiled unit.
        unit: Arc<CodeUnit>,
        /// Defined-function index within the unit.
        index: usize,
    },
    /// A host function behind an intrinsic thunk. The thunk owns argument
    /// marshalling and context insertion.
    Host(HostFn),
}

/// A host callee wrapped by the intrinsic thunk.
pub(crate) type HostFn =
    Arc<dyn Fn(&mut ExecCtx<'_>, &[Value]) -> Result<Vec<Value>, Trap> + Send + Sync>;

/// Payload of a function object.
pub(crate) struct FunctionData {
    pub(crate) ty: InternedFuncType,
    pub(crate) debug_name: String,
    pub(crate) code: FunctionCode,
    /// Defining instance, if any, installed when instantiation completes;
    /// keeps the instance reachable from any externally held function
    /// handle.
    pub(crate) instance: OnceLock<ObjectId>,
    /// The defining instance's runtime view, installed when instantiation
    /// completes. Weak: the view is owned by the instance object.
    pub(crate) view: OnceLock<Weak<InstanceView>>,
}

impl std::fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionData")
            .field("ty", &self.ty)
            .field("debug_name", &self.debug_name)
            .finish_non_exhaustive()
    }
}

/// Payload of a global object.
#[derive(Debug)]
pub(crate) struct GlobalData {
    pub(crate) ty: GlobalType,
    pub(crate) storage: GlobalStorage,
}

/// Where a global's value lives.
#[derive(Debug)]
pub(crate) enum GlobalStorage {
    /// Fixed at instantiation, shared by every context.
    Immutable(UntaggedValue),
    /// One cell per context, at this slot of the context's slab.
    Mutable {
        /// Slab index, compartment-wide.
        slot: u32,
    },
}

/// Payload of an exception tag object.
#[derive(Debug)]
pub(crate) struct TagData {
    pub(crate) ty: InternedFuncType,
    pub(crate) debug_name: String,
}

/// Payload of an instance object.
pub(crate) struct InstanceData {
    pub(crate) debug_name: String,
    pub(crate) exports: std::collections::HashMap<String, (ExternKind, ObjectId)>,
    /// The runtime view shared with the executor.
    pub(crate) view: Arc<InstanceView>,
    /// Everything the instance owns or borrows, for tracing.
    pub(crate) owned: Vec<ObjectId>,
}

impl std::fmt::Debug for InstanceData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceData")
            .field("debug_name", &self.debug_name)
            .field("exports", &self.exports.len())
            .finish_non_exhaustive()
    }
}

/// Payload of a context object: per-thread mutable state within one
/// compartment.
#[derive(Debug)]
pub(crate) struct ContextData {
    /// Mutable-global slab, indexed by [`GlobalStorage::Mutable`] slots.
    pub(crate) mutable_globals: crate::platform::Mutex<Vec<UntaggedValue>>,
}

/// The tagged union stored in a compartment's arena.
#[derive(Debug)]
pub(crate) enum ObjectData {
    Function(Arc<FunctionData>),
    Table(Arc<TableData>),
    Memory(Arc<MemoryData>),
    Global(Arc<GlobalData>),
    Tag(Arc<TagData>),
    Instance(Arc<InstanceData>),
    Context(Arc<ContextData>),
}

impl ObjectData {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Table(_) => "table",
            Self::Memory(_) => "memory",
            Self::Global(_) => "global",
            Self::Tag(_) => "tag",
            Self::Instance(_) => "instance",
            Self::Context(_) => "context",
        }
    }
}

/// The compartment-affine part of every handle: bumps the external count
/// on clone, drops it on drop.
pub(crate) struct RawHandle {
    pub(crate) compartment: Arc<CompartmentInner>,
    pub(crate) id: ObjectId,
    pub(crate) header: Arc<ObjectHeader>,
}

impl RawHandle {
    pub(crate) fn new(
        compartment: Arc<CompartmentInner>,
        id: ObjectId,
        header: Arc<ObjectHeader>,
    ) -> Self {
        header.external.fetch_add(1, Ordering::AcqRel);
        Self {
            compartment,
            id,
            header,
        }
    }
}

impl Clone for RawHandle {
    fn clone(&self) -> Self {
        self.header.external.fetch_add(1, Ordering::AcqRel);
        Self {
            compartment: Arc::clone(&self.compartment),
            id: self.id,
            header: Arc::clone(&self.header),
        }
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        self.header.external.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@c{}", self.id, self.compartment.id())
    }
}

macro_rules! strong_handle {
    ($(#[$meta:meta])* $Handle:ident($Data:ident)) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $Handle {
            pub(crate) raw: RawHandle,
            pub(crate) data: Arc<$Data>,
        }

        impl $Handle {
            /// Arena id within the owning compartment.
            pub(crate) fn id(&self) -> ObjectId {
                self.raw.id
            }

            /// The owning compartment's id.
            pub fn compartment_id(&self) -> u32 {
                self.raw.compartment.id()
            }
        }
    };
}

strong_handle! {
    /// A strong handle to a function.
    Function(FunctionData)
}

strong_handle! {
    /// A strong handle to a table.
    Table(TableData)
}

strong_handle! {
    /// A strong handle to a linear memory.
    Memory(MemoryData)
}

strong_handle! {
    /// A strong handle to a global cell.
    Global(GlobalData)
}

strong_handle! {
    /// A strong handle to an exception tag.
    Tag(TagData)
}

strong_handle! {
    /// A strong handle to an instance.
    Instance(InstanceData)
}

strong_handle! {
    /// A strong handle to an execution context.
    Context(ContextData)
}

impl Function {
    /// The function's interned type.
    pub fn ty(&self) -> &InternedFuncType {
        &self.data.ty
    }

    /// The function's debug name.
    pub fn debug_name(&self) -> &str {
        &self.data.debug_name
    }
}

impl Tag {
    /// The tag's parameter signature.
    pub fn ty(&self) -> &InternedFuncType {
        &self.data.ty
    }
}

/// A kind-erased handle, as stored in export maps and produced by
/// resolvers.
#[derive(Clone, Debug)]
pub enum Object {
    /// A function.
    Function(Function),
    /// A table.
    Table(Table),
    /// A linear memory.
    Memory(Memory),
    /// A global cell.
    Global(Global),
    /// An exception tag.
    Tag(Tag),
}

impl Object {
    /// The object's kind.
    pub fn kind(&self) -> ExternKind {
        match self {
            Self::Function(_) => ExternKind::Func,
            Self::Table(_) => ExternKind::Table,
            Self::Memory(_) => ExternKind::Memory,
            Self::Global(_) => ExternKind::Global,
            Self::Tag(_) => ExternKind::Tag,
        }
    }

    /// The object's extern type, as the linker compares it.
    pub fn extern_type(&self) -> ExternType {
        match self {
            Self::Function(f) => ExternType::Func(f.data.ty.clone()),
            Self::Table(t) => ExternType::Table(t.data.ty),
            Self::Memory(m) => ExternType::Memory(m.data.ty),
            Self::Global(g) => ExternType::Global(g.data.ty),
            Self::Tag(t) => ExternType::Tag(t.data.ty.clone()),
        }
    }

    /// The owning compartment's id.
    pub fn compartment_id(&self) -> u32 {
        match self {
            Self::Function(x) => x.compartment_id(),
            Self::Table(x) => x.compartment_id(),
            Self::Memory(x) => x.compartment_id(),
            Self::Global(x) => x.compartment_id(),
            Self::Tag(x) => x.compartment_id(),
        }
    }

    /// Downcast to a function.
    pub fn into_function(self) -> Option<Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Downcast to a memory.
    pub fn into_memory(self) -> Option<Memory> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// Downcast to a table.
    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Downcast to a global.
    pub fn into_global(self) -> Option<Global> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }
}
