//! Instantiation: materialize a loaded module inside a compartment.
//!
//! Imports land first in each index space, then the module's own
//! definitions are created, constant initializers evaluated, active
//! segments applied with the bounds semantics of the corresponding bulk
//! operators, and finally the start function runs.

use std::sync::{
    Arc,
    OnceLock,
};

use keel_module::{
    DataKind,
    ElemItems,
    ElemKind,
};
use keel_ops::Operator;
use keel_types::{
    ExternKind,
    UntaggedValue,
    Value,
};
use tracing::debug;

use crate::{
    engine::LoadedModule,
    exec::InstanceView,
    linker::ResolvedImports,
    platform,
    runtime::{
        object::{
            FunctionCode,
            FunctionData,
            GlobalData,
            GlobalStorage,
            InstanceData,
            ObjectData,
            ObjectId,
            RawHandle,
            TagData,
        },
        table::TableElem,
        Compartment,
        Instance,
        Object,
    },
    Trap,
    TrapKind,
};

/// One index space while it is being assembled: arena ids plus payloads.
struct Space<T> {
    ids: Vec<ObjectId>,
    data: Vec<Arc<T>>,
}

impl<T> Default for Space<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl<T> Space<T> {
    fn push(&mut self, id: ObjectId, data: Arc<T>) {
        self.ids.push(id);
        self.data.push(data);
    }
}

/// Materialize `loaded` in `compartment` with the given resolved imports.
///
/// Traps from segment application or the start function abort the
/// instantiation; already created objects stay in the compartment until
/// the next collection.
pub fn instantiate(
    compartment: &Compartment,
    loaded: &Arc<LoadedModule>,
    imports: ResolvedImports,
    debug_name: &str,
) -> Result<Instance, Trap> {
    let module = &loaded.module;

    let mut functions = Space::<FunctionData>::default();
    let mut tables = Space::default();
    let mut memories = Space::default();
    let mut globals = Space::<GlobalData>::default();
    let mut tags = Space::<TagData>::default();

    // Imports occupy the front of each index space, in declaration order.
    for object in imports.objects {
        match object {
            Object::Function(f) => functions.push(f.id(), Arc::clone(&f.data)),
            Object::Table(t) => tables.push(t.id(), Arc::clone(&t.data)),
            Object::Memory(m) => memories.push(m.id(), Arc::clone(&m.data)),
            Object::Global(g) => globals.push(g.id(), Arc::clone(&g.data)),
            Object::Tag(t) => tags.push(t.id(), Arc::clone(&t.data)),
        }
    }

    // Defined tags.
    for type_index in &module.tags {
        let ty = module.types[*type_index as usize].clone();
        let tag = compartment.create_tag(ty, &format!("{debug_name}!tag"));
        tags.push(tag.id(), Arc::clone(&tag.data));
    }

    // Defined functions. The instance back-reference and view are
    // installed once the instance object exists.
    for (defined, compiled) in loaded.code.functions.iter().enumerate() {
        let data = Arc::new(FunctionData {
            ty: compiled.ty.clone(),
            debug_name: format!("{debug_name}!{}", compiled.debug_name),
            code: FunctionCode::Guest {
                unit: Arc::clone(&loaded.code),
                index: defined,
            },
            instance: OnceLock::new(),
            view: OnceLock::new(),
        });
        let (id, _header) = compartment
            .inner
            .alloc_object(ObjectData::Function(Arc::clone(&data)));
        functions.push(id, data);
    }

    // Defined globals; initializers may read imported globals and take
    // function references.
    for global in &module.globals {
        let bits = eval_const(&global.init, &globals, &functions)?;
        let handle = compartment.create_global(global.ty, Value::from_parts(global.ty.ty, bits));
        globals.push(handle.id(), Arc::clone(&handle.data));
    }

    // Defined memories and tables.
    for ty in &module.memories {
        let handle = compartment.create_memory(*ty)?;
        memories.push(handle.id(), Arc::clone(&handle.data));
    }
    for ty in &module.tables {
        let handle = compartment.create_table(*ty);
        tables.push(handle.id(), Arc::clone(&handle.data));
    }

    // Element segments: snapshot passive ones, remember active ones.
    let mut passive_elems = Vec::with_capacity(module.elems.len());
    for segment in &module.elems {
        match segment.kind {
            ElemKind::Passive => {
                let items = elem_items(compartment, &segment.items, &globals, &functions)?;
                passive_elems.push(Some(Arc::new(items)));
            }
            ElemKind::Active { .. } | ElemKind::Declared => passive_elems.push(None),
        }
    }
    let mut passive_data = Vec::with_capacity(module.data.len());
    for segment in &module.data {
        match segment.kind {
            DataKind::Passive => {
                passive_data.push(Some(Arc::<[u8]>::from(segment.bytes.as_slice())))
            }
            DataKind::Active { .. } => passive_data.push(None),
        }
    }

    let view = Arc::new(InstanceView {
        functions: functions.data.clone(),
        func_ids: functions.ids.clone(),
        tables: tables.data.clone(),
        table_ids: tables.ids.clone(),
        memories: memories.data.clone(),
        memory_ids: memories.ids.clone(),
        globals: globals.data.clone(),
        global_ids: globals.ids.clone(),
        tags: tags.data.clone(),
        tag_ids: tags.ids.clone(),
        unit_types: module.types.clone(),
        passive_elems: platform::Mutex::new(passive_elems),
        passive_data: platform::Mutex::new(passive_data),
    });

    // Apply active element segments, then active data segments, with the
    // bounds semantics of table.init and memory.init.
    for segment in &module.elems {
        if let ElemKind::Active { table, offset } = &segment.kind {
            let base = eval_const(offset, &globals, &functions)?.as_i32() as u32;
            let items = elem_items(compartment, &segment.items, &globals, &functions)?;
            let table = &tables.data[*table as usize];
            let end = base as u64 + items.len() as u64;
            if end > table.len() as u64 {
                return Err(Trap::new(TrapKind::OutOfBoundsTableAccess).with_operand(base));
            }
            table.init(base, &items)?;
        }
    }
    for segment in &module.data {
        if let DataKind::Active { memory, offset } = &segment.kind {
            let base = eval_const(offset, &globals, &functions)?.as_i32() as u32;
            memories.data[*memory as usize].init(base, &segment.bytes)?;
        }
    }

    // Export map over the merged index spaces.
    let exports = module
        .exports
        .iter()
        .map(|export| {
            let id = match export.kind {
                ExternKind::Func => functions.ids[export.index as usize],
                ExternKind::Table => tables.ids[export.index as usize],
                ExternKind::Memory => memories.ids[export.index as usize],
                ExternKind::Global => globals.ids[export.index as usize],
                ExternKind::Tag => tags.ids[export.index as usize],
            };
            (export.name.clone(), (export.kind, id))
        })
        .collect();

    let mut owned: Vec<ObjectId> = Vec::new();
    owned.extend_from_slice(&functions.ids);
    owned.extend_from_slice(&tables.ids);
    owned.extend_from_slice(&memories.ids);
    owned.extend_from_slice(&globals.ids);
    owned.extend_from_slice(&tags.ids);

    let instance_data = Arc::new(InstanceData {
        debug_name: debug_name.to_string(),
        exports,
        view: Arc::clone(&view),
        owned,
    });
    let (instance_id, header) = compartment
        .inner
        .alloc_object(ObjectData::Instance(Arc::clone(&instance_data)));

    // Wire the defined functions to their instance.
    for (defined, _) in loaded.code.functions.iter().enumerate() {
        let data = &functions.data[module.imported_funcs() + defined];
        let _ = data.instance.set(instance_id);
        let _ = data.view.set(Arc::downgrade(&view));
    }

    let instance = Instance {
        raw: RawHandle::new(Arc::clone(&compartment.inner), instance_id, header),
        data: instance_data,
    };

    if let Some(start) = module.start {
        run_start(compartment, &functions.data[start as usize])?;
    }

    debug!(
        compartment = compartment.id(),
        name = debug_name,
        "instance created"
    );
    Ok(instance)
}

/// Run the start function in a transient context; mutable-global writes
/// it makes become the initial values future contexts observe.
fn run_start(
    compartment: &Compartment,
    start: &Arc<FunctionData>,
) -> Result<(), Trap> {
    let context = compartment.create_context();
    let mut ctx = crate::exec::ExecCtx {
        compartment: &compartment.inner,
        context: &context.data,
        depth: 0,
    };
    platform::catch_hardware_traps(|| {
        crate::exec::call_function(&mut ctx, start, &[]).map(|_| ())
    })?;
    let slab = context.data.mutable_globals.lock().clone();
    compartment.seed_mutable_globals(slab);
    Ok(())
}

/// Evaluate a validated constant expression to raw bits.
fn eval_const(
    expr: &keel_module::ConstExpr,
    globals: &Space<GlobalData>,
    functions: &Space<FunctionData>,
) -> Result<UntaggedValue, Trap> {
    let payload = expr
        .payload()
        .expect("validation reduced the expression to one operator");
    let bits = match payload {
        Operator::I32Const(imm) => imm.value.into(),
        Operator::I64Const(imm) => imm.value.into(),
        Operator::F32Const(imm) => imm.value().into(),
        Operator::F64Const(imm) => imm.value().into(),
        Operator::V128Const(imm) => keel_types::V128(imm.bytes).into(),
        Operator::RefNull(_) => UntaggedValue::ZERO,
        Operator::RefFunc(imm) => {
            let id = functions.ids[imm.func as usize];
            UntaggedValue::from(id as u64 + 1)
        }
        Operator::GlobalGet(imm) => match &globals.data[imm.global as usize].storage {
            GlobalStorage::Immutable(bits) => *bits,
            GlobalStorage::Mutable { .. } => {
                unreachable!("validation restricts initializers to immutable globals")
            }
        },
        other => unreachable!("validation rejected {other} in a constant expression"),
    };
    Ok(bits)
}

/// Resolve segment items to table elements.
fn elem_items(
    compartment: &Compartment,
    items: &ElemItems,
    globals: &Space<GlobalData>,
    functions: &Space<FunctionData>,
) -> Result<Vec<TableElem>, Trap> {
    match items {
        ElemItems::Funcs(indices) => Ok(indices
            .iter()
            .map(|func| TableElem::Func {
                id: functions.ids[*func as usize],
                data: Arc::clone(&functions.data[*func as usize]),
            })
            .collect()),
        ElemItems::Exprs(exprs) => exprs
            .iter()
            .map(|expr| {
                let bits = eval_const(expr, globals, functions)?;
                let token = bits.as_ref_token();
                if token == 0 {
                    Ok(TableElem::Null)
                } else {
                    // The only non-null constant references are function
                    // references; resolve through the arena so values read
                    // from imported globals work too.
                    let id = (token - 1) as ObjectId;
                    let data = compartment
                        .inner
                        .function_data(id)
                        .expect("constant function reference resolves in its compartment");
                    Ok(TableElem::Func { id, data })
                }
            })
            .collect(),
    }
}
