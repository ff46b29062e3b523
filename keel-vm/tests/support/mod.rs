//! Shared helpers: build small modules programmatically and push them
//! through the full byte pipeline before running them.

// Each integration binary uses a different subset of these.
#![allow(dead_code)]

use std::sync::Arc;

use keel_module::{
    decode_module,
    encode_module,
    FunctionBody,
    Module,
};
use keel_ops::{
    FeatureSet,
    NoImm,
    Operator,
};
use keel_types::{
    InternedFuncType,
    Value,
    ValueType,
};
use keel_vm::{
    Compartment,
    Context,
    Engine,
    Function,
    Instance,
    LoadedModule,
    ResolvedImports,
    Trap,
};

/// A module exporting one function `"run"` with the given signature and
/// body (the closing `end` is appended here).
pub fn single_func_module(
    params: &[ValueType],
    results: &[ValueType],
    locals: &[ValueType],
    mut ops: Vec<Operator>,
) -> Module {
    ops.push(Operator::End(NoImm));
    let mut module = Module::default();
    module.types.push(InternedFuncType::from_parts(params, results));
    module.functions.push(0);
    module.code.push(FunctionBody {
        locals: locals.iter().map(|ty| (1, *ty)).collect(),
        offsets: (0..ops.len() as u32).collect(),
        ops,
    });
    module.exports.push(keel_module::Export {
        name: "run".into(),
        kind: keel_types::ExternKind::Func,
        index: 0,
    });
    module
}

/// Encode, re-decode, and load: every test module passes through the
/// wire format so the codec is always in the loop.
pub fn load(module: Module) -> Arc<LoadedModule> {
    let bytes = encode_module(&module);
    let decoded = decode_module(&bytes, FeatureSet::standard()).expect("encoder output decodes");
    assert_eq!(decoded, module, "container round-trip");
    Engine::default().load(decoded).expect("test module validates")
}

/// Instantiate with no imports and hand back everything needed to call
/// exports.
pub fn instantiate(loaded: &Arc<LoadedModule>) -> (Compartment, Context, Instance) {
    let compartment = Engine::default().create_compartment();
    let instance = keel_vm::instantiate(
        &compartment,
        loaded,
        ResolvedImports::default(),
        "test",
    )
    .expect("test module instantiates");
    let context = compartment.create_context();
    (compartment, context, instance)
}

/// The exported `"run"` function of an instance.
pub fn run_export(instance: &Instance) -> Function {
    instance
        .export("run")
        .expect("module exports run")
        .into_function()
        .expect("run is a function")
}

/// Build, load, instantiate, and invoke in one go.
pub fn run(
    params: &[ValueType],
    results: &[ValueType],
    ops: Vec<Operator>,
    args: &[Value],
) -> Result<Vec<Value>, Trap> {
    let loaded = load(single_func_module(params, results, &[], ops));
    let (_compartment, context, instance) = instantiate(&loaded);
    keel_vm::invoke(&context, &run_export(&instance), args)
}
