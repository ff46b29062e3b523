//! Execution semantics: control flow, numeric edge cases checked
//! against a direct Rust rendition, exceptions, and vector operators.

mod support;

use keel_ops::{
    BlockType,
    BlockTypeImm,
    BranchImm,
    BranchTableImm,
    I32Imm,
    I64Imm,
    LaneImm,
    LocalImm,
    NoImm,
    Operator as O,
    TagImm,
    V128Imm,
};
use keel_types::{
    InternedFuncType,
    Value,
    ValueType,
};
use keel_vm::{
    invoke,
    TrapKind,
};
use quickcheck_macros::quickcheck;

fn run_i32(ops: Vec<O>, args: &[i32]) -> Result<i32, keel_vm::Trap> {
    let params: Vec<ValueType> = args.iter().map(|_| ValueType::I32).collect();
    let values: Vec<Value> = args.iter().map(|value| Value::from(*value)).collect();
    support::run(&params, &[ValueType::I32], ops, &values)
        .map(|results| results[0].i32().expect("i32 result"))
}

#[test]
fn blocks_and_branches() {
    // block (result i32) i32.const 1; br 0; i32.const 2 end
    let result = run_i32(
        vec![
            O::Block(BlockTypeImm {
                ty: BlockType::Value(ValueType::I32),
            }),
            O::I32Const(I32Imm { value: 1 }),
            O::Br(BranchImm { depth: 0 }),
            O::I32Const(I32Imm { value: 2 }),
            O::Drop(NoImm),
            O::End(NoImm),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, 1);
}

#[test]
fn loop_counts_down() {
    // local 0 counts down from the argument; local 1 accumulates.
    let loaded = support::load(support::single_func_module(
        &[ValueType::I32],
        &[ValueType::I32],
        &[ValueType::I32],
        vec![
            O::Block(BlockTypeImm { ty: BlockType::Empty }),
            O::Loop(BlockTypeImm { ty: BlockType::Empty }),
            // if counter == 0, exit
            O::LocalGet(LocalImm { local: 0 }),
            O::I32Eqz(NoImm),
            O::BrIf(BranchImm { depth: 1 }),
            // acc += counter; counter -= 1
            O::LocalGet(LocalImm { local: 1 }),
            O::LocalGet(LocalImm { local: 0 }),
            O::I32Add(NoImm),
            O::LocalSet(LocalImm { local: 1 }),
            O::LocalGet(LocalImm { local: 0 }),
            O::I32Const(I32Imm { value: 1 }),
            O::I32Sub(NoImm),
            O::LocalSet(LocalImm { local: 0 }),
            O::Br(BranchImm { depth: 0 }),
            O::End(NoImm),
            O::End(NoImm),
            O::LocalGet(LocalImm { local: 1 }),
            O::End(NoImm),
        ],
    ));
    let (_c, context, instance) = support::instantiate(&loaded);
    let results = invoke(
        &context,
        &support::run_export(&instance),
        &[Value::from(10i32)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(55i32)]);
}

#[test]
fn br_table_selects_by_index() {
    let body = |selector: i32| {
        run_i32(
            vec![
                O::Block(BlockTypeImm { ty: BlockType::Empty }),
                O::Block(BlockTypeImm { ty: BlockType::Empty }),
                O::Block(BlockTypeImm { ty: BlockType::Empty }),
                O::LocalGet(LocalImm { local: 0 }),
                O::BrTable(BranchTableImm {
                    targets: vec![0, 1].into(),
                    default: 2,
                }),
                O::End(NoImm),
                O::I32Const(I32Imm { value: 10 }),
                O::Return(NoImm),
                O::End(NoImm),
                O::I32Const(I32Imm { value: 20 }),
                O::Return(NoImm),
                O::End(NoImm),
                O::I32Const(I32Imm { value: 30 }),
            ],
            &[selector],
        )
        .unwrap()
    };
    assert_eq!(body(0), 10);
    assert_eq!(body(1), 20);
    assert_eq!(body(2), 30);
    assert_eq!(body(-1), 30);
}

#[test]
fn unreachable_traps_with_a_stack() {
    let trap = run_i32(vec![O::Unreachable(NoImm)], &[]).unwrap_err();
    assert_eq!(trap.kind, TrapKind::Unreachable);
    assert_eq!(trap.stack.len(), 1);
}

#[quickcheck]
fn i32_arithmetic_matches_rust(a: i32, b: i32) -> bool {
    let check = |op: O, expected: i32| {
        run_i32(
            vec![
                O::LocalGet(LocalImm { local: 0 }),
                O::LocalGet(LocalImm { local: 1 }),
                op,
            ],
            &[a, b],
        )
        .unwrap()
            == expected
    };
    check(O::I32Add(NoImm), a.wrapping_add(b))
        && check(O::I32Sub(NoImm), a.wrapping_sub(b))
        && check(O::I32Mul(NoImm), a.wrapping_mul(b))
        && check(O::I32Xor(NoImm), a ^ b)
        && check(O::I32Shl(NoImm), a.wrapping_shl(b as u32))
        && check(O::I32ShrU(NoImm), ((a as u32) >> (b as u32 & 31)) as i32)
        && check(O::I32Rotl(NoImm), a.rotate_left(b as u32 & 31))
        && check(
            O::I32LtS(NoImm),
            (a < b) as i32,
        )
}

#[quickcheck]
fn i64_division_matches_rust(a: i64, b: i64) -> bool {
    let result = support::run(
        &[ValueType::I64, ValueType::I64],
        &[ValueType::I64],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::LocalGet(LocalImm { local: 1 }),
            O::I64DivS(NoImm),
        ],
        &[Value::from(a), Value::from(b)],
    );
    if b == 0 || (a == i64::MIN && b == -1) {
        matches!(result, Err(trap) if trap.kind == TrapKind::IntegerDivideByZeroOrOverflow)
    } else {
        result.unwrap() == vec![Value::from(a.wrapping_div(b))]
    }
}

#[test]
fn trunc_and_sat_disagree_only_on_the_edges() {
    let trunc = support::run(
        &[ValueType::F64],
        &[ValueType::I32],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::I32TruncF64S(NoImm),
        ],
        &[Value::from(1e15f64)],
    );
    assert_eq!(
        trunc.unwrap_err().kind,
        TrapKind::InvalidFloatOperation
    );

    let saturated = support::run(
        &[ValueType::F64],
        &[ValueType::I32],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::I32TruncSatF64S(NoImm),
        ],
        &[Value::from(1e15f64)],
    )
    .unwrap();
    assert_eq!(saturated, vec![Value::from(i32::MAX)]);
}

#[test]
fn float_bit_patterns_are_preserved() {
    // Propagate a NaN through a reinterpret round trip; the payload must
    // survive untouched.
    let nan_bits = 0x7ff4_dead_beef_0000u64;
    let results = support::run(
        &[ValueType::I64],
        &[ValueType::I64],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::F64ReinterpretI64(NoImm),
            O::I64ReinterpretF64(NoImm),
        ],
        &[Value::from(nan_bits)],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(nan_bits)]);
}

#[test]
fn thrown_exceptions_unwind_to_the_invoker() {
    let mut module = support::single_func_module(
        &[],
        &[],
        &[],
        vec![
            O::I32Const(I32Imm { value: 9 }),
            O::Throw(TagImm { tag: 0 }),
        ],
    );
    module
        .types
        .push(InternedFuncType::from_parts(&[ValueType::I32], &[]));
    module.tags.push(1);

    let loaded = support::load(module);
    let (_c, context, instance) = support::instantiate(&loaded);
    let trap = invoke(&context, &support::run_export(&instance), &[]).unwrap_err();
    let TrapKind::UserException { payload, .. } = trap.kind else {
        panic!("expected a user exception");
    };
    assert_eq!(payload, vec![Value::from(9i32)]);
}

#[test]
fn catch_receives_the_payload() {
    let mut module = support::single_func_module(
        &[],
        &[ValueType::I32],
        &[],
        vec![
            O::Try(BlockTypeImm {
                ty: BlockType::Value(ValueType::I32),
            }),
            O::I32Const(I32Imm { value: 5 }),
            O::Throw(TagImm { tag: 0 }),
            O::Catch(TagImm { tag: 0 }),
            // The payload (5) is on the stack; add one.
            O::I32Const(I32Imm { value: 1 }),
            O::I32Add(NoImm),
            O::End(NoImm),
        ],
    );
    module
        .types
        .push(InternedFuncType::from_parts(&[ValueType::I32], &[]));
    module.tags.push(1);

    let loaded = support::load(module);
    let (_c, context, instance) = support::instantiate(&loaded);
    let results = invoke(&context, &support::run_export(&instance), &[]).unwrap();
    assert_eq!(results, vec![Value::from(6i32)]);
}

#[test]
fn catch_all_swallows_any_tag() {
    let mut module = support::single_func_module(
        &[],
        &[ValueType::I32],
        &[],
        vec![
            O::Try(BlockTypeImm {
                ty: BlockType::Value(ValueType::I32),
            }),
            O::Throw(TagImm { tag: 0 }),
            O::CatchAll(NoImm),
            O::I32Const(I32Imm { value: 77 }),
            O::End(NoImm),
        ],
    );
    module.types.push(InternedFuncType::from_parts(&[], &[]));
    module.tags.push(1);

    let loaded = support::load(module);
    let (_c, context, instance) = support::instantiate(&loaded);
    let results = invoke(&context, &support::run_export(&instance), &[]).unwrap();
    assert_eq!(results, vec![Value::from(77i32)]);
}

#[test]
fn vector_lanes_compute() {
    // splat 3 over i32x4, add a constant vector, extract lane 2.
    let mut constant = [0u8; 16];
    constant[8] = 39; // lane 2 = 39
    let results = support::run(
        &[],
        &[ValueType::I32],
        vec![
            O::I32Const(I32Imm { value: 3 }),
            O::I32x4Splat(NoImm),
            O::V128Const(V128Imm { bytes: constant }),
            O::I32x4Add(NoImm),
            O::I32x4ExtractLane(LaneImm { lane: 2 }),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(42i32)]);
}

#[test]
fn vector_saturating_narrow() {
    // i16x8 lanes of 300 narrow (signed) to 127.
    let wide = {
        let mut bytes = [0u8; 16];
        for lane in 0..8 {
            bytes[lane * 2..lane * 2 + 2].copy_from_slice(&300i16.to_le_bytes());
        }
        bytes
    };
    let results = support::run(
        &[],
        &[ValueType::I32],
        vec![
            O::V128Const(V128Imm { bytes: wide }),
            O::V128Const(V128Imm { bytes: wide }),
            O::I8x16NarrowI16x8S(NoImm),
            O::I8x16ExtractLaneS(LaneImm { lane: 0 }),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(127i32)]);
}

#[test]
fn deep_recursion_overflows_the_stack() {
    // "run" calls itself unconditionally.
    let results = support::run(
        &[],
        &[],
        vec![O::Call(keel_ops::FuncImm { func: 0 })],
        &[],
    );
    assert_eq!(results.unwrap_err().kind, TrapKind::StackOverflow);
}

#[test]
fn i64_constants_round_trip_through_invocation() {
    let results = support::run(
        &[],
        &[ValueType::I64],
        vec![O::I64Const(I64Imm {
            value: i64::MIN + 1,
        })],
        &[],
    )
    .unwrap();
    assert_eq!(results, vec![Value::from(i64::MIN + 1)]);
}
