//! The intrinsics framework: declare a host module once, materialize it
//! per compartment.
//!
//! A host module is a named set of functions, globals, memories, and
//! tables. Instantiating it creates the runtime objects and an instance
//! whose export map is exactly the declared set, so host modules link
//! like any other.

use std::{
    collections::HashMap,
    sync::Arc,
};

use keel_types::{
    ExternKind,
    GlobalType,
    InternedFuncType,
    MemoryType,
    TableType,
    Value,
};
use tracing::debug;

use crate::{
    exec::{
        ExecCtx,
        InstanceView,
    },
    platform,
    runtime::{
        object::{
            InstanceData,
            ObjectData,
            RawHandle,
        },
        Compartment,
        Instance,
        Object,
    },
    Trap,
};

/// Signature of a host function exposed to guest code. The execution
/// context arrives first, per the engine calling convention.
pub type HostFunc =
    dyn Fn(&mut ExecCtx<'_>, &[Value]) -> Result<Vec<Value>, Trap> + Send + Sync;

enum Declaration {
    Function {
        ty: InternedFuncType,
        body: Arc<HostFunc>,
    },
    Global {
        ty: GlobalType,
        init: Value,
    },
    Memory(MemoryType),
    Table(TableType),
}

/// A declarative host module.
pub struct IntrinsicModule {
    name: String,
    declarations: Vec<(String, Declaration)>,
}

impl IntrinsicModule {
    /// Start declaring a host module.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            declarations: Vec::new(),
        }
    }

    /// Declare a function export.
    pub fn function(
        mut self,
        name: &str,
        ty: InternedFuncType,
        body: impl Fn(&mut ExecCtx<'_>, &[Value]) -> Result<Vec<Value>, Trap>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.declarations.push((
            name.to_string(),
            Declaration::Function {
                ty,
                body: Arc::new(body),
            },
        ));
        self
    }

    /// Declare a global export.
    pub fn global(mut self, name: &str, ty: GlobalType, init: Value) -> Self {
        self.declarations
            .push((name.to_string(), Declaration::Global { ty, init }));
        self
    }

    /// Declare a memory export.
    pub fn memory(mut self, name: &str, ty: MemoryType) -> Self {
        self.declarations
            .push((name.to_string(), Declaration::Memory(ty)));
        self
    }

    /// Declare a table export.
    pub fn table(mut self, name: &str, ty: TableType) -> Self {
        self.declarations
            .push((name.to_string(), Declaration::Table(ty)));
        self
    }

    /// Materialize the declared set inside `compartment`.
    pub fn instantiate(&self, compartment: &Compartment) -> Result<Instance, Trap> {
        let mut exports = HashMap::with_capacity(self.declarations.len());
        let mut owned = Vec::with_capacity(self.declarations.len());

        for (name, declaration) in &self.declarations {
            let object = match declaration {
                Declaration::Function { ty, body } => {
                    let debug_name = format!("{}.{name}", self.name);
                    let body = Arc::clone(body);
                    let function = compartment.create_host_function(
                        ty.clone(),
                        &debug_name,
                        Arc::new(move |ctx: &mut ExecCtx<'_>, args: &[Value]| {
                            body(ctx, args)
                        }),
                    );
                    Object::Function(function)
                }
                Declaration::Global { ty, init } => {
                    Object::Global(compartment.create_global(*ty, *init))
                }
                Declaration::Memory(ty) => {
                    Object::Memory(compartment.create_memory(*ty)?)
                }
                Declaration::Table(ty) => Object::Table(compartment.create_table(*ty)),
            };
            let (kind, id) = match &object {
                Object::Function(x) => (ExternKind::Func, x.id()),
                Object::Table(x) => (ExternKind::Table, x.id()),
                Object::Memory(x) => (ExternKind::Memory, x.id()),
                Object::Global(x) => (ExternKind::Global, x.id()),
                Object::Tag(x) => (ExternKind::Tag, x.id()),
            };
            owned.push(id);
            exports.insert(name.clone(), (kind, id));
        }

        let data = Arc::new(InstanceData {
            debug_name: self.name.clone(),
            exports,
            view: Arc::new(empty_view()),
            owned,
        });
        let (id, header) = compartment
            .inner
            .alloc_object(ObjectData::Instance(Arc::clone(&data)));
        debug!(module = %self.name, exports = data.exports.len(), "intrinsic module instantiated");
        Ok(Instance {
            raw: RawHandle::new(Arc::clone(&compartment.inner), id, header),
            data,
        })
    }
}

/// The view of an instance with no guest code.
fn empty_view() -> InstanceView {
    InstanceView {
        functions: Vec::new(),
        func_ids: Vec::new(),
        tables: Vec::new(),
        table_ids: Vec::new(),
        memories: Vec::new(),
        memory_ids: Vec::new(),
        globals: Vec::new(),
        global_ids: Vec::new(),
        tags: Vec::new(),
        tag_ids: Vec::new(),
        unit_types: Vec::new(),
        passive_elems: platform::Mutex::new(Vec::new()),
        passive_data: platform::Mutex::new(Vec::new()),
    }
}
