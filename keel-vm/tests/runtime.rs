//! Runtime object model: host-side object APIs, compartment cloning,
//! collection, intrinsic modules, and context isolation of mutable
//! globals.

mod support;

use keel_ops::{
    GlobalImm,
    I32Imm,
    LocalImm,
    MemArg,
    NoImm,
    Operator as O,
};
use keel_types::{
    GlobalType,
    InternedFuncType,
    Limits,
    MemoryType,
    RefType,
    TableType,
    Value,
    ValueType,
};
use keel_vm::{
    instantiate,
    intrinsics::IntrinsicModule,
    invoke,
    link,
    try_collect,
    Engine,
    ModuleResolver,
    TrapKind,
};

#[test]
fn host_memory_api_matches_guest_semantics() {
    let compartment = Engine::default().create_compartment();
    let memory = compartment
        .create_memory(MemoryType {
            limits: Limits { min: 1, max: Some(2) },
            shared: false,
        })
        .unwrap();

    memory.write(0, &[1, 2, 3]).unwrap();
    let mut out = [0u8; 3];
    memory.read(0, &mut out).unwrap();
    assert_eq!(out, [1, 2, 3]);

    assert_eq!(memory.grow(1).unwrap(), Some(1));
    assert_eq!(memory.pages(), 2);
    assert_eq!(memory.grow(1).unwrap(), None);
    assert_eq!(
        memory.read(2 * 65536, &mut out).unwrap_err().kind,
        TrapKind::OutOfBoundsMemoryAccess
    );
}

#[test]
fn host_table_api_matches_guest_semantics() {
    let compartment = Engine::default().create_compartment();
    let table = compartment.create_table(TableType {
        elem: RefType::ExternRef,
        limits: Limits { min: 2, max: Some(3) },
    });

    assert!(table.get(0).unwrap().is_null_ref());
    table
        .set(1, Value::ref_from_token(RefType::ExternRef, 0xbeef))
        .unwrap();
    assert_eq!(table.get(1).unwrap().ref_token(), Some(0xbeef));
    assert_eq!(
        table.get(5).unwrap_err().kind,
        TrapKind::OutOfBoundsTableAccess
    );
    assert_eq!(table.grow(1), Some(2));
    assert_eq!(table.grow(1), None);
}

#[test]
fn collection_is_driven_by_external_handles() {
    let compartment = Engine::default().create_compartment();
    let table = compartment.create_table(TableType {
        elem: RefType::FuncRef,
        limits: Limits { min: 0, max: None },
    });
    // Pinned by the handle.
    assert!(!try_collect(&compartment));
    drop(table);
    assert!(try_collect(&compartment));
}

#[test]
fn instances_keep_their_objects_alive() {
    let mut module = support::single_func_module(
        &[],
        &[ValueType::I32],
        &[],
        vec![
            O::I32Const(I32Imm { value: 0 }),
            O::I32Load(MemArg {
                align_log2: 2,
                offset: 0,
            }),
        ],
    );
    module.memories.push(MemoryType {
        limits: Limits { min: 1, max: Some(1) },
        shared: false,
    });
    module.data.push(keel_module::DataSegment {
        kind: keel_module::DataKind::Active {
            memory: 0,
            offset: keel_module::ConstExpr::single(O::I32Const(I32Imm { value: 0 })),
        },
        bytes: 41u32.to_le_bytes().to_vec(),
    });

    let loaded = support::load(module);
    let (compartment, context, instance) = support::instantiate(&loaded);
    let run = support::run_export(&instance);
    // Only the function handle pins the graph now.
    drop(instance);
    assert!(!try_collect(&compartment));

    let results = invoke(&context, &run, &[]).unwrap();
    assert_eq!(results, vec![Value::from(41i32)]);

    drop(run);
    drop(context);
    assert!(try_collect(&compartment));
}

#[test]
fn cloned_compartments_share_code_but_not_state() {
    let mut module = support::single_func_module(
        &[],
        &[ValueType::I32],
        &[],
        vec![
            // counter += 1; return counter
            O::GlobalGet(GlobalImm { global: 0 }),
            O::I32Const(I32Imm { value: 1 }),
            O::I32Add(NoImm),
            O::GlobalSet(GlobalImm { global: 0 }),
            O::GlobalGet(GlobalImm { global: 0 }),
        ],
    );
    module.globals.push(keel_module::GlobalDef {
        ty: GlobalType {
            ty: ValueType::I32,
            mutable: true,
        },
        init: keel_module::ConstExpr::single(O::I32Const(I32Imm { value: 0 })),
    });

    let loaded = support::load(module);
    let (compartment, context, instance) = support::instantiate(&loaded);
    let run = support::run_export(&instance);
    assert_eq!(invoke(&context, &run, &[]).unwrap(), vec![Value::from(1i32)]);
    assert_eq!(invoke(&context, &run, &[]).unwrap(), vec![Value::from(2i32)]);

    // The clone starts from the original's current state but diverges.
    let cloned = compartment.clone_compartment().unwrap();
    let cloned_context = cloned.create_context();
    let cloned_run = {
        let state_instance = cloned_instance(&cloned);
        support::run_export(&state_instance)
    };
    assert_eq!(
        invoke(&cloned_context, &cloned_run, &[]).unwrap(),
        vec![Value::from(1i32)]
    );
    // The original is unaffected by the clone's execution.
    assert_eq!(invoke(&context, &run, &[]).unwrap(), vec![Value::from(3i32)]);
}

/// The cloned instance: cloning preserves ids and the instance set, so
/// the single instance of this compartment is the one we made.
fn cloned_instance(cloned: &keel_vm::Compartment) -> keel_vm::Instance {
    cloned
        .instances()
        .into_iter()
        .next()
        .expect("clone carries the instance")
}

#[test]
fn context_mutable_globals_do_not_alias() {
    let mut module = support::single_func_module(
        &[ValueType::I32],
        &[ValueType::I32],
        &[],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::GlobalSet(GlobalImm { global: 0 }),
            O::GlobalGet(GlobalImm { global: 0 }),
        ],
    );
    module.globals.push(keel_module::GlobalDef {
        ty: GlobalType {
            ty: ValueType::I32,
            mutable: true,
        },
        init: keel_module::ConstExpr::single(O::I32Const(I32Imm { value: 0 })),
    });
    module.exports.push(keel_module::Export {
        name: "g".into(),
        kind: keel_types::ExternKind::Global,
        index: 0,
    });

    let loaded = support::load(module);
    let (compartment, context_a, instance) = support::instantiate(&loaded);
    let context_b = compartment.create_context();
    let run = support::run_export(&instance);

    assert_eq!(
        invoke(&context_a, &run, &[Value::from(7i32)]).unwrap(),
        vec![Value::from(7i32)]
    );
    // The write in context A is invisible to context B's storage.
    let global = instance
        .export("g")
        .and_then(|object| object.into_global())
        .expect("global export");
    assert_eq!(global.get(&context_a), Value::from(7i32));
    assert_eq!(global.get(&context_b), Value::from(0i32));
}

#[test]
fn intrinsic_modules_link_like_any_other() {
    let double_ty = InternedFuncType::from_parts(&[ValueType::I32], &[ValueType::I32]);

    let compartment = Engine::default().create_compartment();
    let host = IntrinsicModule::new("env")
        .function("double", double_ty, |_ctx, args| {
            let value = args[0].i32().expect("typed by the thunk");
            Ok(vec![Value::from(value * 2)])
        })
        .global(
            "offset",
            GlobalType {
                ty: ValueType::I32,
                mutable: false,
            },
            Value::from(5i32),
        )
        .instantiate(&compartment)
        .unwrap();

    // A guest module importing both.
    let mut module = keel_module::Module::default();
    module
        .types
        .push(InternedFuncType::from_parts(&[ValueType::I32], &[ValueType::I32]));
    module.imports.push(keel_module::Import {
        module: "env".into(),
        name: "double".into(),
        desc: keel_module::ImportDesc::Func { type_index: 0 },
    });
    module.imports.push(keel_module::Import {
        module: "env".into(),
        name: "offset".into(),
        desc: keel_module::ImportDesc::Global(GlobalType {
            ty: ValueType::I32,
            mutable: false,
        }),
    });
    // run(x) = double(x) + offset
    module.functions.push(0);
    module.code.push(keel_module::FunctionBody {
        locals: vec![],
        ops: vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::Call(keel_ops::FuncImm { func: 0 }),
            O::GlobalGet(GlobalImm { global: 0 }),
            O::I32Add(NoImm),
            O::End(NoImm),
        ],
        offsets: vec![0, 1, 2, 3, 4],
    });
    module.exports.push(keel_module::Export {
        name: "run".into(),
        kind: keel_types::ExternKind::Func,
        index: 1,
    });

    let loaded = support::load(module);
    let mut resolver = ModuleResolver::new();
    resolver.define_instance("env", host);
    let imports = link(&compartment, &loaded, &resolver).unwrap();
    let instance = instantiate(&compartment, &loaded, imports, "guest").unwrap();
    let context = compartment.create_context();

    let results = invoke(
        &context,
        &support::run_export(&instance),
        &[Value::from(10i32)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(25i32)]);
}
