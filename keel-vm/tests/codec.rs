//! Codec properties: byte-exact round trips and rejection of mangled
//! input, driven by generated mutations.

mod support;

use keel_module::{
    decode_module,
    encode_module,
    validate_module,
    BinaryError,
};
use keel_ops::{
    FeatureSet,
    I32Imm,
    LocalImm,
    MemArg,
    NoImm,
    Operator as O,
};
use keel_types::{
    Limits,
    MemoryType,
    ValueType,
};
use quickcheck_macros::quickcheck;

/// A representative valid module: types, function, memory, export, code,
/// and data sections all present.
fn reference_bytes() -> Vec<u8> {
    let mut module = support::single_func_module(
        &[ValueType::I32],
        &[ValueType::I32],
        &[ValueType::I64],
        vec![
            O::LocalGet(LocalImm { local: 0 }),
            O::I32Const(I32Imm { value: 3 }),
            O::I32Add(NoImm),
            O::I32Const(I32Imm { value: 0 }),
            O::I32Load(MemArg {
                align_log2: 2,
                offset: 4,
            }),
            O::I32Add(NoImm),
        ],
    );
    module.memories.push(MemoryType {
        limits: Limits { min: 1, max: Some(2) },
        shared: false,
    });
    module.data.push(keel_module::DataSegment {
        kind: keel_module::DataKind::Active {
            memory: 0,
            offset: keel_module::ConstExpr::single(O::I32Const(I32Imm { value: 4 })),
        },
        bytes: vec![1, 0, 0, 0],
    });
    encode_module(&module)
}

#[test]
fn the_reference_module_round_trips_byte_for_byte() {
    let bytes = reference_bytes();
    let module = decode_module(&bytes, FeatureSet::standard()).unwrap();
    assert_eq!(encode_module(&module), bytes);
    validate_module(&module, FeatureSet::standard()).unwrap();
}

#[test]
fn custom_sections_survive_in_place() {
    let bytes = reference_bytes();
    let mut module = decode_module(&bytes, FeatureSet::standard()).unwrap();
    module.custom_sections.push(keel_module::CustomSection {
        name: "name".into(),
        bytes: vec![0xde, 0xad],
        position: 1,
    });
    let encoded = encode_module(&module);
    let decoded = decode_module(&encoded, FeatureSet::standard()).unwrap();
    assert_eq!(decoded.custom_sections, module.custom_sections);
    assert_eq!(encode_module(&decoded), encoded);
}

#[quickcheck]
fn truncation_at_any_byte_is_malformed(cut: usize) -> bool {
    let bytes = reference_bytes();
    let cut = cut % bytes.len();
    decode_module(&bytes[..cut], FeatureSet::standard()).is_err()
}

#[quickcheck]
fn single_byte_mutations_never_panic(position: usize, value: u8) -> bool {
    let mut bytes = reference_bytes();
    let position = position % bytes.len();
    bytes[position] = value;
    // The mutated module must either be rejected by one of the two load
    // phases or decode to something that still validates; it must never
    // take the engine down.
    match decode_module(&bytes, FeatureSet::standard()) {
        Err(_) => true,
        Ok(module) => {
            let _ = validate_module(&module, FeatureSet::standard());
            true
        }
    }
}

#[test]
fn reordered_sections_are_malformed() {
    // Move the memory section (id 5) after the export section (id 7) by
    // re-encoding manually: decode, then emit sections in a wrong order.
    let bytes = reference_bytes();
    // Find section boundaries: skip the 8-byte header, then walk frames.
    let mut sections: Vec<(u8, Vec<u8>)> = Vec::new();
    let mut cursor = 8usize;
    while cursor < bytes.len() {
        let id = bytes[cursor];
        // All section lengths in the reference module fit one LEB byte.
        let len = bytes[cursor + 1] as usize;
        sections.push((id, bytes[cursor..cursor + 2 + len].to_vec()));
        cursor += 2 + len;
    }
    let memory = sections
        .iter()
        .position(|(id, _)| *id == 5)
        .expect("reference module has a memory section");
    let section = sections.remove(memory);
    sections.push(section);

    let mut mangled = bytes[..8].to_vec();
    for (_, section) in &sections {
        mangled.extend_from_slice(section);
    }
    assert!(matches!(
        decode_module(&mangled, FeatureSet::standard()),
        Err(BinaryError::SectionOutOfOrder(5))
    ));
}

#[test]
fn junk_after_the_last_section_is_malformed() {
    let mut bytes = reference_bytes();
    bytes.push(0xff);
    assert!(decode_module(&bytes, FeatureSet::standard()).is_err());
}
