//! The execution boundary: compiled code units, the per-instance runtime
//! view, invoke and intrinsic thunks, and trap delivery.
//!
//! Every callee, guest or host, is entered through the same convention:
//! the execution context first, then the arguments in the function type's
//! order. Invoke thunks marshal boxed [`Value`] arrays across that
//! boundary and are cached per function type; intrinsic thunks adapt host
//! functions into it. Traps travel as `Result` errors and unwind to the
//! nearest [`invoke`] call, which also arms the hardware-trap catcher.

mod executor;
mod numeric;
mod side_table;
mod simd;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex as StdMutex,
        OnceLock,
        Weak,
    },
};

use keel_types::{
    InternedFuncType,
    UntaggedValue,
    Value,
    ValueType,
};
use tracing::trace;

pub(crate) use side_table::{
    arity_resolver,
    SideTable,
};

use crate::{
    platform,
    runtime::{
        compartment::CompartmentInner,
        memory::MemoryData,
        object::{
            ContextData,
            FunctionCode,
            FunctionData,
            GlobalData,
            ObjectId,
            TagData,
        },
        table::TableElem,
        Context,
        Function,
    },
    Trap,
    TrapKind,
};

/// Hard cap on guest call depth; exceeding it traps with
/// [`TrapKind::StackOverflow`].
pub(crate) const MAX_CALL_DEPTH: usize = 1000;

/// One function compiled into a [`CodeUnit`]: the validated operator
/// stream plus the structured-control side table the executor drives
/// branches with.
pub(crate) struct CompiledFunc {
    pub(crate) ty: InternedFuncType,
    /// Declared locals, expanded one type per local (parameters excluded).
    pub(crate) locals: Vec<ValueType>,
    pub(crate) ops: Vec<keel_ops::Operator>,
    pub(crate) side: SideTable,
    pub(crate) debug_name: String,
}

/// The per-module product of the engine's code pipeline: the in-tree
/// realization of the compiled-object contract. A native producer would
/// slot in here without touching the boundary types.
pub struct CodeUnit {
    pub(crate) functions: Vec<CompiledFunc>,
}

impl std::fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CodeUnit({} functions)", self.functions.len())
    }
}

/// The flattened runtime view of one instance: what executing code needs,
/// resolved once at instantiation.
pub(crate) struct InstanceView {
    pub(crate) functions: Vec<Arc<FunctionData>>,
    pub(crate) func_ids: Vec<ObjectId>,
    pub(crate) tables: Vec<Arc<crate::runtime::table::TableData>>,
    pub(crate) table_ids: Vec<ObjectId>,
    pub(crate) memories: Vec<Arc<MemoryData>>,
    pub(crate) memory_ids: Vec<ObjectId>,
    pub(crate) globals: Vec<Arc<GlobalData>>,
    pub(crate) global_ids: Vec<ObjectId>,
    pub(crate) tags: Vec<Arc<TagData>>,
    pub(crate) tag_ids: Vec<ObjectId>,
    /// The module's interned type table, for `call_indirect` checks.
    pub(crate) unit_types: Vec<InternedFuncType>,
    /// Passive element segments, dropped by `elem.drop`. Indexed by
    /// segment; `None` once dropped (or for active segments).
    pub(crate) passive_elems: platform::Mutex<Vec<Option<Arc<Vec<TableElem>>>>>,
    /// Passive data segments, dropped by `data.drop`.
    pub(crate) passive_data: platform::Mutex<Vec<Option<Arc<[u8]>>>>,
}

impl InstanceView {
    /// Rebuild a view against another arena (compartment cloning): same
    /// shape, same ids, payloads resolved in the target compartment.
    pub(crate) fn rebuild(
        old: &InstanceView,
        resolve_func: impl Fn(ObjectId) -> Option<Arc<FunctionData>>,
        resolve_table: impl Fn(ObjectId) -> Option<Arc<crate::runtime::table::TableData>>,
        resolve_memory: impl Fn(ObjectId) -> Option<Arc<MemoryData>>,
        resolve_global: impl Fn(ObjectId) -> Option<Arc<GlobalData>>,
    ) -> InstanceView {
        InstanceView {
            functions: old
                .func_ids
                .iter()
                .map(|id| resolve_func(*id).expect("clone replicated every function"))
                .collect(),
            func_ids: old.func_ids.clone(),
            tables: old
                .table_ids
                .iter()
                .map(|id| resolve_table(*id).expect("clone replicated every table"))
                .collect(),
            table_ids: old.table_ids.clone(),
            memories: old
                .memory_ids
                .iter()
                .map(|id| resolve_memory(*id).expect("clone replicated every memory"))
                .collect(),
            memory_ids: old.memory_ids.clone(),
            globals: old
                .global_ids
                .iter()
                .map(|id| resolve_global(*id).expect("clone replicated every global"))
                .collect(),
            global_ids: old.global_ids.clone(),
            tags: old.tags.clone(),
            tag_ids: old.tag_ids.clone(),
            unit_types: old.unit_types.clone(),
            passive_elems: platform::Mutex::new(old.passive_elems.lock().clone()),
            passive_data: platform::Mutex::new(old.passive_data.lock().clone()),
        }
    }
}

/// The execution state threaded through every call: which compartment and
/// context are running, and how deep the guest call stack is.
pub struct ExecCtx<'a> {
    pub(crate) compartment: &'a Arc<CompartmentInner>,
    pub(crate) context: &'a Arc<ContextData>,
    pub(crate) depth: usize,
}

impl ExecCtx<'_> {
    /// The running compartment's id.
    pub fn compartment_id(&self) -> u32 {
        self.compartment.id()
    }
}

/// A cached per-function-type marshalling thunk: checks the boxed
/// arguments against the type once per call and unboxes the results.
struct InvokeThunk {
    ty: InternedFuncType,
}

impl InvokeThunk {
    fn marshal_args(&self, args: &[Value]) -> Result<Vec<UntaggedValue>, Trap> {
        if args.len() != self.ty.params().len() {
            return Err(Trap::new(TrapKind::IndirectCallSignatureMismatch)
                .with_operand(args.len() as u32));
        }
        args.iter()
            .zip(self.ty.params())
            .map(|(arg, expected)| {
                if arg.ty() != *expected {
                    Err(Trap::new(TrapKind::IndirectCallSignatureMismatch)
                        .with_operand(*arg))
                } else {
                    Ok(arg.bits())
                }
            })
            .collect()
    }

    fn unmarshal_results(&self, results: Vec<UntaggedValue>) -> Vec<Value> {
        results
            .into_iter()
            .zip(self.ty.results())
            .map(|(bits, ty)| Value::from_parts(*ty, bits))
            .collect()
    }
}

fn invoke_thunk(ty: &InternedFuncType) -> Arc<InvokeThunk> {
    // The engine-wide thunk cache, keyed by interned type identity.
    static CACHE: OnceLock<StdMutex<HashMap<InternedFuncType, Arc<InvokeThunk>>>> =
        OnceLock::new();
    let cache = CACHE.get_or_init(|| StdMutex::new(HashMap::new()));
    let mut cache = cache.lock().expect("thunk cache poisoned");
    Arc::clone(cache.entry(ty.clone()).or_insert_with(|| {
        trace!(%ty, "invoke thunk generated");
        Arc::new(InvokeThunk { ty: ty.clone() })
    }))
}

/// Invoke a function with boxed arguments in the given context.
///
/// This is the trap boundary: guest traps and intercepted hardware traps
/// alike surface here as the `Err` arm, with the call stack captured.
///
/// # Panics
///
/// Panics if `function` and `context` belong to different compartments;
/// cross-compartment references violate the isolation contract.
pub fn invoke(
    context: &Context,
    function: &Function,
    args: &[Value],
) -> Result<Vec<Value>, Trap> {
    assert_eq!(
        context.compartment_id(),
        function.compartment_id(),
        "invoke across compartments"
    );

    let thunk = invoke_thunk(&function.data.ty);
    let raw_args = thunk.marshal_args(args)?;

    let result = platform::catch_hardware_traps(|| {
        let mut ctx = ExecCtx {
            compartment: &function.raw.compartment,
            context: &context.data,
            depth: 0,
        };
        call_function(&mut ctx, &function.data, &raw_args)
    });
    result.map(|results| thunk.unmarshal_results(results))
}

/// Call a function payload under the engine convention; both sides of
/// the boundary (guest code units and host intrinsics) dispatch here.
pub(crate) fn call_function(
    ctx: &mut ExecCtx<'_>,
    function: &FunctionData,
    args: &[UntaggedValue],
) -> Result<Vec<UntaggedValue>, Trap> {
    if ctx.depth >= MAX_CALL_DEPTH {
        return Err(Trap::new(TrapKind::StackOverflow));
    }
    ctx.depth += 1;
    let result = match &function.code {
        FunctionCode::Guest { unit, index } => {
            let view = function
                .view
                .get()
                .and_then(Weak::upgrade)
                .expect("guest function called before instantiation completed");
            executor::execute(ctx, &unit.functions[*index], &view, args)
        }
        FunctionCode::Host(host) => {
            // The intrinsic thunk: box the arguments per the type, insert
            // the context, and translate the results back.
            let values: Vec<Value> = args
                .iter()
                .zip(function.ty.params())
                .map(|(bits, ty)| Value::from_parts(*ty, *bits))
                .collect();
            host(ctx, &values)
                .map(|results| results.into_iter().map(|value| value.bits()).collect())
                .map_err(|mut trap| {
                    trap.push_frame(&function.debug_name, 0);
                    trap
                })
        }
    };
    ctx.depth -= 1;
    result
}
