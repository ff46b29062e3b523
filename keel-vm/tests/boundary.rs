//! The boundary scenarios: the smallest module of each failure and
//! success mode, exercised end to end.

mod support;

use keel_module::{
    decode_module,
    validate_module,
    Module,
};
use keel_ops::{
    CallIndirectImm,
    FeatureSet,
    FuncImm,
    I32Imm,
    LocalImm,
    MemArg,
    NoImm,
    Operator as O,
};
use keel_types::{
    ExternKind,
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
    invoke,
    link,
    Engine,
    LinkError,
    NullResolver,
    StubResolver,
    TrapKind,
};

const EMPTY_MODULE: &[u8] = &[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

#[test]
fn empty_module_loads_and_instantiates_to_nothing() {
    let module = decode_module(EMPTY_MODULE, FeatureSet::standard()).unwrap();
    validate_module(&module, FeatureSet::standard()).unwrap();

    let loaded = Engine::default().load(module).unwrap();
    let compartment = Engine::default().create_compartment();
    let instance = instantiate(
        &compartment,
        &loaded,
        keel_vm::ResolvedImports::default(),
        "empty",
    )
    .unwrap();
    assert!(instance.export("anything").is_none());
}

#[test]
fn identity_returns_its_argument() {
    let results = support::run(
        &[ValueType::I32],
        &[ValueType::I32],
        vec![O::LocalGet(LocalImm { local: 0 })],
        &[Value::from(42i32)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(42i32)]);
}

#[test]
fn division_edge_cases_trap() {
    let divide = |lhs: i32, rhs: i32| {
        support::run(
            &[ValueType::I32, ValueType::I32],
            &[ValueType::I32],
            vec![
                O::LocalGet(LocalImm { local: 0 }),
                O::LocalGet(LocalImm { local: 1 }),
                O::I32DivS(NoImm),
            ],
            &[Value::from(lhs), Value::from(rhs)],
        )
    };

    let trap = divide(1, 0).unwrap_err();
    assert_eq!(trap.kind, TrapKind::IntegerDivideByZeroOrOverflow);
    let trap = divide(i32::MIN, -1).unwrap_err();
    assert_eq!(trap.kind, TrapKind::IntegerDivideByZeroOrOverflow);
    assert_eq!(divide(-6, 2).unwrap(), vec![Value::from(-3i32)]);
}

#[test]
fn out_of_bounds_load_traps_with_the_address() {
    let mut module = support::single_func_module(
        &[],
        &[ValueType::I32],
        &[],
        vec![
            O::I32Const(I32Imm { value: 65536 }),
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

    let loaded = support::load(module);
    let (_compartment, context, instance) = support::instantiate(&loaded);
    let trap = invoke(&context, &support::run_export(&instance), &[]).unwrap_err();
    assert_eq!(trap.kind, TrapKind::OutOfBoundsMemoryAccess);
    assert_eq!(trap.operands[0], Value::from(65536u64));
    assert!(!trap.stack.is_empty());
}

#[test]
fn call_indirect_signature_mismatch_traps() {
    // Table slot 0 holds a [] -> [i32] function; the call site expects
    // [] -> [].
    let mut module = Module::default();
    module.types.push(InternedFuncType::from_parts(&[], &[ValueType::I32]));
    module.types.push(InternedFuncType::from_parts(&[], &[]));
    // func 0: the callee, type [] -> [i32].
    module.functions.push(0);
    module.code.push(keel_module::FunctionBody {
        locals: vec![],
        ops: vec![O::I32Const(I32Imm { value: 7 }), O::End(NoImm)],
        offsets: vec![0, 1],
    });
    // func 1: "run", performs the mistyped indirect call.
    module.functions.push(1);
    module.code.push(keel_module::FunctionBody {
        locals: vec![],
        ops: vec![
            O::I32Const(I32Imm { value: 0 }),
            O::CallIndirect(CallIndirectImm { ty: 1, table: 0 }),
            O::End(NoImm),
        ],
        offsets: vec![0, 1, 2],
    });
    module.tables.push(TableType {
        elem: RefType::FuncRef,
        limits: Limits { min: 1, max: Some(1) },
    });
    module.elems.push(keel_module::ElemSegment {
        kind: keel_module::ElemKind::Active {
            table: 0,
            offset: keel_module::ConstExpr::single(O::I32Const(I32Imm { value: 0 })),
        },
        ty: RefType::FuncRef,
        items: keel_module::ElemItems::Funcs(vec![0]),
    });
    module.exports.push(keel_module::Export {
        name: "run".into(),
        kind: ExternKind::Func,
        index: 1,
    });

    let loaded = support::load(module);
    let (_compartment, context, instance) = support::instantiate(&loaded);
    let trap = invoke(&context, &support::run_export(&instance), &[]).unwrap_err();
    assert_eq!(trap.kind, TrapKind::IndirectCallSignatureMismatch);
}

fn importing_module() -> Module {
    let mut module = Module::default();
    module
        .types
        .push(InternedFuncType::from_parts(&[ValueType::I32], &[]));
    module.imports.push(keel_module::Import {
        module: "env".into(),
        name: "does_not_exist".into(),
        desc: keel_module::ImportDesc::Func { type_index: 0 },
    });
    // "run" forwards to the import.
    module.functions.push(0);
    module.code.push(keel_module::FunctionBody {
        locals: vec![],
        ops: vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::Call(FuncImm { func: 0 }),
            O::End(NoImm),
        ],
        offsets: vec![0, 1, 2],
    });
    module.exports.push(keel_module::Export {
        name: "run".into(),
        kind: ExternKind::Func,
        index: 1,
    });
    module
}

#[test]
fn missing_imports_are_reported_as_a_triple() {
    let loaded = support::load(importing_module());
    let compartment = Engine::default().create_compartment();

    let error = link(&compartment, &loaded, &NullResolver).unwrap_err();
    let LinkError::MissingImports { missing } = error else {
        panic!("expected a missing-import report");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].module, "env");
    assert_eq!(missing[0].name, "does_not_exist");
    assert!(matches!(missing[0].ty, keel_types::ExternType::Func(_)));
}

#[test]
fn stubbed_imports_trap_when_called() {
    let loaded = support::load(importing_module());
    let compartment = Engine::default().create_compartment();

    let stubs = StubResolver::new(&compartment, &NullResolver);
    let imports = link(&compartment, &loaded, &stubs).unwrap();
    let instance = instantiate(&compartment, &loaded, imports, "stubbed").unwrap();
    let context = compartment.create_context();

    let trap = invoke(
        &context,
        &support::run_export(&instance),
        &[Value::from(1i32)],
    )
    .unwrap_err();
    assert_eq!(trap.kind, TrapKind::CalledUnimplementedIntrinsic);
}
