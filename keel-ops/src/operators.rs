//! The operator table.
//!
//! One row per operator the engine knows. Gaps in the prefixed spaces are
//! deliberate: an encoding absent here is rejected, whatever the host
//! hardware could do.

impl_operators! {
    // Control.
    0x00 Unreachable "unreachable" NoImm MVP,
    0x01 Nop "nop" NoImm MVP,
    0x02 Block "block" BlockTypeImm MVP,
    0x03 Loop "loop" BlockTypeImm MVP,
    0x04 If "if" BlockTypeImm MVP,
    0x05 Else "else" NoImm MVP,
    0x06 Try "try" BlockTypeImm EXCEPTION_HANDLING,
    0x07 Catch "catch" TagImm EXCEPTION_HANDLING,
    0x08 Throw "throw" TagImm EXCEPTION_HANDLING,
    0x09 Rethrow "rethrow" BranchImm EXCEPTION_HANDLING,
    0x0b End "end" NoImm MVP,
    0x0c Br "br" BranchImm MVP,
    0x0d BrIf "br_if" BranchImm MVP,
    0x0e BrTable "br_table" BranchTableImm MVP,
    0x0f Return "return" NoImm MVP,
    0x10 Call "call" FuncImm MVP,
    0x11 CallIndirect "call_indirect" CallIndirectImm MVP,
    0x18 Delegate "delegate" BranchImm EXCEPTION_HANDLING,
    0x19 CatchAll "catch_all" NoImm EXCEPTION_HANDLING,

    // Parametric.
    0x1a Drop "drop" NoImm MVP,
    0x1b Select "select" NoImm MVP,
    0x1c SelectT "select" SelectTypeImm REFERENCE_TYPES,

    // Variables.
    0x20 LocalGet "local.get" LocalImm MVP,
    0x21 LocalSet "local.set" LocalImm MVP,
    0x22 LocalTee "local.tee" LocalImm MVP,
    0x23 GlobalGet "global.get" GlobalImm MVP,
    0x24 GlobalSet "global.set" GlobalImm MVP,

    // Table access.
    0x25 TableGet "table.get" TableImm REFERENCE_TYPES,
    0x26 TableSet "table.set" TableImm REFERENCE_TYPES,

    // Memory access.
    0x28 I32Load "i32.load" MemArg MVP,
    0x29 I64Load "i64.load" MemArg MVP,
    0x2a F32Load "f32.load" MemArg MVP,
    0x2b F64Load "f64.load" MemArg MVP,
    0x2c I32Load8S "i32.load8_s" MemArg MVP,
    0x2d I32Load8U "i32.load8_u" MemArg MVP,
    0x2e I32Load16S "i32.load16_s" MemArg MVP,
    0x2f I32Load16U "i32.load16_u" MemArg MVP,
    0x30 I64Load8S "i64.load8_s" MemArg MVP,
    0x31 I64Load8U "i64.load8_u" MemArg MVP,
    0x32 I64Load16S "i64.load16_s" MemArg MVP,
    0x33 I64Load16U "i64.load16_u" MemArg MVP,
    0x34 I64Load32S "i64.load32_s" MemArg MVP,
    0x35 I64Load32U "i64.load32_u" MemArg MVP,
    0x36 I32Store "i32.store" MemArg MVP,
    0x37 I64Store "i64.store" MemArg MVP,
    0x38 F32Store "f32.store" MemArg MVP,
    0x39 F64Store "f64.store" MemArg MVP,
    0x3a I32Store8 "i32.store8" MemArg MVP,
    0x3b I32Store16 "i32.store16" MemArg MVP,
    0x3c I64Store8 "i64.store8" MemArg MVP,
    0x3d I64Store16 "i64.store16" MemArg MVP,
    0x3e I64Store32 "i64.store32" MemArg MVP,
    0x3f MemorySize "memory.size" MemoryImm MVP,
    0x40 MemoryGrow "memory.grow" MemoryImm MVP,

    // Constants.
    0x41 I32Const "i32.const" I32Imm MVP,
    0x42 I64Const "i64.const" I64Imm MVP,
    0x43 F32Const "f32.const" F32Imm MVP,
    0x44 F64Const "f64.const" F64Imm MVP,

    // i32 comparisons.
    0x45 I32Eqz "i32.eqz" NoImm MVP,
    0x46 I32Eq "i32.eq" NoImm MVP,
    0x47 I32Ne "i32.ne" NoImm MVP,
    0x48 I32LtS "i32.lt_s" NoImm MVP,
    0x49 I32LtU "i32.lt_u" NoImm MVP,
    0x4a I32GtS "i32.gt_s" NoImm MVP,
    0x4b I32GtU "i32.gt_u" NoImm MVP,
    0x4c I32LeS "i32.le_s" NoImm MVP,
    0x4d I32LeU "i32.le_u" NoImm MVP,
    0x4e I32GeS "i32.ge_s" NoImm MVP,
    0x4f I32GeU "i32.ge_u" NoImm MVP,

    // i64 comparisons.
    0x50 I64Eqz "i64.eqz" NoImm MVP,
    0x51 I64Eq "i64.eq" NoImm MVP,
    0x52 I64Ne "i64.ne" NoImm MVP,
    0x53 I64LtS "i64.lt_s" NoImm MVP,
    0x54 I64LtU "i64.lt_u" NoImm MVP,
    0x55 I64GtS "i64.gt_s" NoImm MVP,
    0x56 I64GtU "i64.gt_u" NoImm MVP,
    0x57 I64LeS "i64.le_s" NoImm MVP,
    0x58 I64LeU "i64.le_u" NoImm MVP,
    0x59 I64GeS "i64.ge_s" NoImm MVP,
    0x5a I64GeU "i64.ge_u" NoImm MVP,

    // f32 comparisons.
    0x5b F32Eq "f32.eq" NoImm MVP,
    0x5c F32Ne "f32.ne" NoImm MVP,
    0x5d F32Lt "f32.lt" NoImm MVP,
    0x5e F32Gt "f32.gt" NoImm MVP,
    0x5f F32Le "f32.le" NoImm MVP,
    0x60 F32Ge "f32.ge" NoImm MVP,

    // f64 comparisons.
    0x61 F64Eq "f64.eq" NoImm MVP,
    0x62 F64Ne "f64.ne" NoImm MVP,
    0x63 F64Lt "f64.lt" NoImm MVP,
    0x64 F64Gt "f64.gt" NoImm MVP,
    0x65 F64Le "f64.le" NoImm MVP,
    0x66 F64Ge "f64.ge" NoImm MVP,

    // i32 arithmetic.
    0x67 I32Clz "i32.clz" NoImm MVP,
    0x68 I32Ctz "i32.ctz" NoImm MVP,
    0x69 I32Popcnt "i32.popcnt" NoImm MVP,
    0x6a I32Add "i32.add" NoImm MVP,
    0x6b I32Sub "i32.sub" NoImm MVP,
    0x6c I32Mul "i32.mul" NoImm MVP,
    0x6d I32DivS "i32.div_s" NoImm MVP,
    0x6e I32DivU "i32.div_u" NoImm MVP,
    0x6f I32RemS "i32.rem_s" NoImm MVP,
    0x70 I32RemU "i32.rem_u" NoImm MVP,
    0x71 I32And "i32.and" NoImm MVP,
    0x72 I32Or "i32.or" NoImm MVP,
    0x73 I32Xor "i32.xor" NoImm MVP,
    0x74 I32Shl "i32.shl" NoImm MVP,
    0x75 I32ShrS "i32.shr_s" NoImm MVP,
    0x76 I32ShrU "i32.shr_u" NoImm MVP,
    0x77 I32Rotl "i32.rotl" NoImm MVP,
    0x78 I32Rotr "i32.rotr" NoImm MVP,

    // i64 arithmetic.
    0x79 I64Clz "i64.clz" NoImm MVP,
    0x7a I64Ctz "i64.ctz" NoImm MVP,
    0x7b I64Popcnt "i64.popcnt" NoImm MVP,
    0x7c I64Add "i64.add" NoImm MVP,
    0x7d I64Sub "i64.sub" NoImm MVP,
    0x7e I64Mul "i64.mul" NoImm MVP,
    0x7f I64DivS "i64.div_s" NoImm MVP,
    0x80 I64DivU "i64.div_u" NoImm MVP,
    0x81 I64RemS "i64.rem_s" NoImm MVP,
    0x82 I64RemU "i64.rem_u" NoImm MVP,
    0x83 I64And "i64.and" NoImm MVP,
    0x84 I64Or "i64.or" NoImm MVP,
    0x85 I64Xor "i64.xor" NoImm MVP,
    0x86 I64Shl "i64.shl" NoImm MVP,
    0x87 I64ShrS "i64.shr_s" NoImm MVP,
    0x88 I64ShrU "i64.shr_u" NoImm MVP,
    0x89 I64Rotl "i64.rotl" NoImm MVP,
    0x8a I64Rotr "i64.rotr" NoImm MVP,

    // f32 arithmetic.
    0x8b F32Abs "f32.abs" NoImm MVP,
    0x8c F32Neg "f32.neg" NoImm MVP,
    0x8d F32Ceil "f32.ceil" NoImm MVP,
    0x8e F32Floor "f32.floor" NoImm MVP,
    0x8f F32Trunc "f32.trunc" NoImm MVP,
    0x90 F32Nearest "f32.nearest" NoImm MVP,
    0x91 F32Sqrt "f32.sqrt" NoImm MVP,
    0x92 F32Add "f32.add" NoImm MVP,
    0x93 F32Sub "f32.sub" NoImm MVP,
    0x94 F32Mul "f32.mul" NoImm MVP,
    0x95 F32Div "f32.div" NoImm MVP,
    0x96 F32Min "f32.min" NoImm MVP,
    0x97 F32Max "f32.max" NoImm MVP,
    0x98 F32Copysign "f32.copysign" NoImm MVP,

    // f64 arithmetic.
    0x99 F64Abs "f64.abs" NoImm MVP,
    0x9a F64Neg "f64.neg" NoImm MVP,
    0x9b F64Ceil "f64.ceil" NoImm MVP,
    0x9c F64Floor "f64.floor" NoImm MVP,
    0x9d F64Trunc "f64.trunc" NoImm MVP,
    0x9e F64Nearest "f64.nearest" NoImm MVP,
    0x9f F64Sqrt "f64.sqrt" NoImm MVP,
    0xa0 F64Add "f64.add" NoImm MVP,
    0xa1 F64Sub "f64.sub" NoImm MVP,
    0xa2 F64Mul "f64.mul" NoImm MVP,
    0xa3 F64Div "f64.div" NoImm MVP,
    0xa4 F64Min "f64.min" NoImm MVP,
    0xa5 F64Max "f64.max" NoImm MVP,
    0xa6 F64Copysign "f64.copysign" NoImm MVP,

    // Conversions.
    0xa7 I32WrapI64 "i32.wrap_i64" NoImm MVP,
    0xa8 I32TruncF32S "i32.trunc_f32_s" NoImm MVP,
    0xa9 I32TruncF32U "i32.trunc_f32_u" NoImm MVP,
    0xaa I32TruncF64S "i32.trunc_f64_s" NoImm MVP,
    0xab I32TruncF64U "i32.trunc_f64_u" NoImm MVP,
    0xac I64ExtendI32S "i64.extend_i32_s" NoImm MVP,
    0xad I64ExtendI32U "i64.extend_i32_u" NoImm MVP,
    0xae I64TruncF32S "i64.trunc_f32_s" NoImm MVP,
    0xaf I64TruncF32U "i64.trunc_f32_u" NoImm MVP,
    0xb0 I64TruncF64S "i64.trunc_f64_s" NoImm MVP,
    0xb1 I64TruncF64U "i64.trunc_f64_u" NoImm MVP,
    0xb2 F32ConvertI32S "f32.convert_i32_s" NoImm MVP,
    0xb3 F32ConvertI32U "f32.convert_i32_u" NoImm MVP,
    0xb4 F32ConvertI64S "f32.convert_i64_s" NoImm MVP,
    0xb5 F32ConvertI64U "f32.convert_i64_u" NoImm MVP,
    0xb6 F32DemoteF64 "f32.demote_f64" NoImm MVP,
    0xb7 F64ConvertI32S "f64.convert_i32_s" NoImm MVP,
    0xb8 F64ConvertI32U "f64.convert_i32_u" NoImm MVP,
    0xb9 F64ConvertI64S "f64.convert_i64_s" NoImm MVP,
    0xba F64ConvertI64U "f64.convert_i64_u" NoImm MVP,
    0xbb F64PromoteF32 "f64.promote_f32" NoImm MVP,
    0xbc I32ReinterpretF32 "i32.reinterpret_f32" NoImm MVP,
    0xbd I64ReinterpretF64 "i64.reinterpret_f64" NoImm MVP,
    0xbe F32ReinterpretI32 "f32.reinterpret_i32" NoImm MVP,
    0xbf F64ReinterpretI64 "f64.reinterpret_i64" NoImm MVP,

    // Sign extension.
    0xc0 I32Extend8S "i32.extend8_s" NoImm SIGN_EXTENSION,
    0xc1 I32Extend16S "i32.extend16_s" NoImm SIGN_EXTENSION,
    0xc2 I64Extend8S "i64.extend8_s" NoImm SIGN_EXTENSION,
    0xc3 I64Extend16S "i64.extend16_s" NoImm SIGN_EXTENSION,
    0xc4 I64Extend32S "i64.extend32_s" NoImm SIGN_EXTENSION,

    // References.
    0xd0 RefNull "ref.null" RefTypeImm REFERENCE_TYPES,
    0xd1 RefIsNull "ref.is_null" NoImm REFERENCE_TYPES,
    0xd2 RefFunc "ref.func" FuncImm REFERENCE_TYPES,

    // Saturating truncation (0xfc space).
    0xfc_0000 I32TruncSatF32S "i32.trunc_sat_f32_s" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0001 I32TruncSatF32U "i32.trunc_sat_f32_u" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0002 I32TruncSatF64S "i32.trunc_sat_f64_s" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0003 I32TruncSatF64U "i32.trunc_sat_f64_u" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0004 I64TruncSatF32S "i64.trunc_sat_f32_s" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0005 I64TruncSatF32U "i64.trunc_sat_f32_u" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0006 I64TruncSatF64S "i64.trunc_sat_f64_s" NoImm NONTRAPPING_FLOAT_TO_INT,
    0xfc_0007 I64TruncSatF64U "i64.trunc_sat_f64_u" NoImm NONTRAPPING_FLOAT_TO_INT,

    // Bulk memory and table (0xfc space).
    0xfc_0008 MemoryInit "memory.init" DataMemoryImm BULK_MEMORY,
    0xfc_0009 DataDrop "data.drop" DataImm BULK_MEMORY,
    0xfc_000a MemoryCopy "memory.copy" MemoryPairImm BULK_MEMORY,
    0xfc_000b MemoryFill "memory.fill" MemoryImm BULK_MEMORY,
    0xfc_000c TableInit "table.init" ElemTableImm BULK_MEMORY,
    0xfc_000d ElemDrop "elem.drop" ElemImm BULK_MEMORY,
    0xfc_000e TableCopy "table.copy" TablePairImm BULK_MEMORY,
    0xfc_000f TableGrow "table.grow" TableImm REFERENCE_TYPES,
    0xfc_0010 TableSize "table.size" TableImm REFERENCE_TYPES,
    0xfc_0011 TableFill "table.fill" TableImm REFERENCE_TYPES,

    // Vector memory access (0xfd space).
    0xfd_0000 V128Load "v128.load" MemArg SIMD,
    0xfd_0001 V128Load8x8S "v128.load8x8_s" MemArg SIMD,
    0xfd_0002 V128Load8x8U "v128.load8x8_u" MemArg SIMD,
    0xfd_0003 V128Load16x4S "v128.load16x4_s" MemArg SIMD,
    0xfd_0004 V128Load16x4U "v128.load16x4_u" MemArg SIMD,
    0xfd_0005 V128Load32x2S "v128.load32x2_s" MemArg SIMD,
    0xfd_0006 V128Load32x2U "v128.load32x2_u" MemArg SIMD,
    0xfd_0007 V128Load8Splat "v128.load8_splat" MemArg SIMD,
    0xfd_0008 V128Load16Splat "v128.load16_splat" MemArg SIMD,
    0xfd_0009 V128Load32Splat "v128.load32_splat" MemArg SIMD,
    0xfd_000a V128Load64Splat "v128.load64_splat" MemArg SIMD,
    0xfd_000b V128Store "v128.store" MemArg SIMD,

    // Vector constants and shuffles.
    0xfd_000c V128Const "v128.const" V128Imm SIMD,
    0xfd_000d I8x16Shuffle "i8x16.shuffle" ShuffleImm SIMD,
    0xfd_000e I8x16Swizzle "i8x16.swizzle" NoImm SIMD,

    // Splats.
    0xfd_000f I8x16Splat "i8x16.splat" NoImm SIMD,
    0xfd_0010 I16x8Splat "i16x8.splat" NoImm SIMD,
    0xfd_0011 I32x4Splat "i32x4.splat" NoImm SIMD,
    0xfd_0012 I64x2Splat "i64x2.splat" NoImm SIMD,
    0xfd_0013 F32x4Splat "f32x4.splat" NoImm SIMD,
    0xfd_0014 F64x2Splat "f64x2.splat" NoImm SIMD,

    // Lane access.
    0xfd_0015 I8x16ExtractLaneS "i8x16.extract_lane_s" LaneImm SIMD,
    0xfd_0016 I8x16ExtractLaneU "i8x16.extract_lane_u" LaneImm SIMD,
    0xfd_0017 I8x16ReplaceLane "i8x16.replace_lane" LaneImm SIMD,
    0xfd_0018 I16x8ExtractLaneS "i16x8.extract_lane_s" LaneImm SIMD,
    0xfd_0019 I16x8ExtractLaneU "i16x8.extract_lane_u" LaneImm SIMD,
    0xfd_001a I16x8ReplaceLane "i16x8.replace_lane" LaneImm SIMD,
    0xfd_001b I32x4ExtractLane "i32x4.extract_lane" LaneImm SIMD,
    0xfd_001c I32x4ReplaceLane "i32x4.replace_lane" LaneImm SIMD,
    0xfd_001d I64x2ExtractLane "i64x2.extract_lane" LaneImm SIMD,
    0xfd_001e I64x2ReplaceLane "i64x2.replace_lane" LaneImm SIMD,
    0xfd_001f F32x4ExtractLane "f32x4.extract_lane" LaneImm SIMD,
    0xfd_0020 F32x4ReplaceLane "f32x4.replace_lane" LaneImm SIMD,
    0xfd_0021 F64x2ExtractLane "f64x2.extract_lane" LaneImm SIMD,
    0xfd_0022 F64x2ReplaceLane "f64x2.replace_lane" LaneImm SIMD,

    // i8x16 comparisons.
    0xfd_0023 I8x16Eq "i8x16.eq" NoImm SIMD,
    0xfd_0024 I8x16Ne "i8x16.ne" NoImm SIMD,
    0xfd_0025 I8x16LtS "i8x16.lt_s" NoImm SIMD,
    0xfd_0026 I8x16LtU "i8x16.lt_u" NoImm SIMD,
    0xfd_0027 I8x16GtS "i8x16.gt_s" NoImm SIMD,
    0xfd_0028 I8x16GtU "i8x16.gt_u" NoImm SIMD,
    0xfd_0029 I8x16LeS "i8x16.le_s" NoImm SIMD,
    0xfd_002a I8x16LeU "i8x16.le_u" NoImm SIMD,
    0xfd_002b I8x16GeS "i8x16.ge_s" NoImm SIMD,
    0xfd_002c I8x16GeU "i8x16.ge_u" NoImm SIMD,

    // i16x8 comparisons.
    0xfd_002d I16x8Eq "i16x8.eq" NoImm SIMD,
    0xfd_002e I16x8Ne "i16x8.ne" NoImm SIMD,
    0xfd_002f I16x8LtS "i16x8.lt_s" NoImm SIMD,
    0xfd_0030 I16x8LtU "i16x8.lt_u" NoImm SIMD,
    0xfd_0031 I16x8GtS "i16x8.gt_s" NoImm SIMD,
    0xfd_0032 I16x8GtU "i16x8.gt_u" NoImm SIMD,
    0xfd_0033 I16x8LeS "i16x8.le_s" NoImm SIMD,
    0xfd_0034 I16x8LeU "i16x8.le_u" NoImm SIMD,
    0xfd_0035 I16x8GeS "i16x8.ge_s" NoImm SIMD,
    0xfd_0036 I16x8GeU "i16x8.ge_u" NoImm SIMD,

    // i32x4 comparisons.
    0xfd_0037 I32x4Eq "i32x4.eq" NoImm SIMD,
    0xfd_0038 I32x4Ne "i32x4.ne" NoImm SIMD,
    0xfd_0039 I32x4LtS "i32x4.lt_s" NoImm SIMD,
    0xfd_003a I32x4LtU "i32x4.lt_u" NoImm SIMD,
    0xfd_003b I32x4GtS "i32x4.gt_s" NoImm SIMD,
    0xfd_003c I32x4GtU "i32x4.gt_u" NoImm SIMD,
    0xfd_003d I32x4LeS "i32x4.le_s" NoImm SIMD,
    0xfd_003e I32x4LeU "i32x4.le_u" NoImm SIMD,
    0xfd_003f I32x4GeS "i32x4.ge_s" NoImm SIMD,
    0xfd_0040 I32x4GeU "i32x4.ge_u" NoImm SIMD,

    // f32x4 comparisons.
    0xfd_0041 F32x4Eq "f32x4.eq" NoImm SIMD,
    0xfd_0042 F32x4Ne "f32x4.ne" NoImm SIMD,
    0xfd_0043 F32x4Lt "f32x4.lt" NoImm SIMD,
    0xfd_0044 F32x4Gt "f32x4.gt" NoImm SIMD,
    0xfd_0045 F32x4Le "f32x4.le" NoImm SIMD,
    0xfd_0046 F32x4Ge "f32x4.ge" NoImm SIMD,

    // f64x2 comparisons.
    0xfd_0047 F64x2Eq "f64x2.eq" NoImm SIMD,
    0xfd_0048 F64x2Ne "f64x2.ne" NoImm SIMD,
    0xfd_0049 F64x2Lt "f64x2.lt" NoImm SIMD,
    0xfd_004a F64x2Gt "f64x2.gt" NoImm SIMD,
    0xfd_004b F64x2Le "f64x2.le" NoImm SIMD,
    0xfd_004c F64x2Ge "f64x2.ge" NoImm SIMD,

    // Bitwise.
    0xfd_004d V128Not "v128.not" NoImm SIMD,
    0xfd_004e V128And "v128.and" NoImm SIMD,
    0xfd_004f V128Andnot "v128.andnot" NoImm SIMD,
    0xfd_0050 V128Or "v128.or" NoImm SIMD,
    0xfd_0051 V128Xor "v128.xor" NoImm SIMD,
    0xfd_0052 V128Bitselect "v128.bitselect" NoImm SIMD,
    0xfd_0053 V128AnyTrue "v128.any_true" NoImm SIMD,

    // Lane memory access.
    0xfd_0054 V128Load8Lane "v128.load8_lane" MemArgLaneImm SIMD,
    0xfd_0055 V128Load16Lane "v128.load16_lane" MemArgLaneImm SIMD,
    0xfd_0056 V128Load32Lane "v128.load32_lane" MemArgLaneImm SIMD,
    0xfd_0057 V128Load64Lane "v128.load64_lane" MemArgLaneImm SIMD,
    0xfd_0058 V128Store8Lane "v128.store8_lane" MemArgLaneImm SIMD,
    0xfd_0059 V128Store16Lane "v128.store16_lane" MemArgLaneImm SIMD,
    0xfd_005a V128Store32Lane "v128.store32_lane" MemArgLaneImm SIMD,
    0xfd_005b V128Store64Lane "v128.store64_lane" MemArgLaneImm SIMD,
    0xfd_005c V128Load32Zero "v128.load32_zero" MemArg SIMD,
    0xfd_005d V128Load64Zero "v128.load64_zero" MemArg SIMD,

    // Float narrowing.
    0xfd_005e F32x4DemoteF64x2Zero "f32x4.demote_f64x2_zero" NoImm SIMD,
    0xfd_005f F64x2PromoteLowF32x4 "f64x2.promote_low_f32x4" NoImm SIMD,

    // i8x16 lanewise.
    0xfd_0060 I8x16Abs "i8x16.abs" NoImm SIMD,
    0xfd_0061 I8x16Neg "i8x16.neg" NoImm SIMD,
    0xfd_0062 I8x16Popcnt "i8x16.popcnt" NoImm SIMD,
    0xfd_0063 I8x16AllTrue "i8x16.all_true" NoImm SIMD,
    0xfd_0064 I8x16Bitmask "i8x16.bitmask" NoImm SIMD,
    0xfd_0065 I8x16NarrowI16x8S "i8x16.narrow_i16x8_s" NoImm SIMD,
    0xfd_0066 I8x16NarrowI16x8U "i8x16.narrow_i16x8_u" NoImm SIMD,
    0xfd_0067 F32x4Ceil "f32x4.ceil" NoImm SIMD,
    0xfd_0068 F32x4Floor "f32x4.floor" NoImm SIMD,
    0xfd_0069 F32x4Trunc "f32x4.trunc" NoImm SIMD,
    0xfd_006a F32x4Nearest "f32x4.nearest" NoImm SIMD,
    0xfd_006b I8x16Shl "i8x16.shl" NoImm SIMD,
    0xfd_006c I8x16ShrS "i8x16.shr_s" NoImm SIMD,
    0xfd_006d I8x16ShrU "i8x16.shr_u" NoImm SIMD,
    0xfd_006e I8x16Add "i8x16.add" NoImm SIMD,
    0xfd_006f I8x16AddSatS "i8x16.add_sat_s" NoImm SIMD,
    0xfd_0070 I8x16AddSatU "i8x16.add_sat_u" NoImm SIMD,
    0xfd_0071 I8x16Sub "i8x16.sub" NoImm SIMD,
    0xfd_0072 I8x16SubSatS "i8x16.sub_sat_s" NoImm SIMD,
    0xfd_0073 I8x16SubSatU "i8x16.sub_sat_u" NoImm SIMD,
    0xfd_0074 F64x2Ceil "f64x2.ceil" NoImm SIMD,
    0xfd_0075 F64x2Floor "f64x2.floor" NoImm SIMD,
    0xfd_0076 I8x16MinS "i8x16.min_s" NoImm SIMD,
    0xfd_0077 I8x16MinU "i8x16.min_u" NoImm SIMD,
    0xfd_0078 I8x16MaxS "i8x16.max_s" NoImm SIMD,
    0xfd_0079 I8x16MaxU "i8x16.max_u" NoImm SIMD,
    0xfd_007a F64x2Trunc "f64x2.trunc" NoImm SIMD,
    0xfd_007b I8x16AvgrU "i8x16.avgr_u" NoImm SIMD,

    // Pairwise extensions.
    0xfd_007c I16x8ExtaddPairwiseI8x16S "i16x8.extadd_pairwise_i8x16_s" NoImm SIMD,
    0xfd_007d I16x8ExtaddPairwiseI8x16U "i16x8.extadd_pairwise_i8x16_u" NoImm SIMD,
    0xfd_007e I32x4ExtaddPairwiseI16x8S "i32x4.extadd_pairwise_i16x8_s" NoImm SIMD,
    0xfd_007f I32x4ExtaddPairwiseI16x8U "i32x4.extadd_pairwise_i16x8_u" NoImm SIMD,

    // i16x8 lanewise.
    0xfd_0080 I16x8Abs "i16x8.abs" NoImm SIMD,
    0xfd_0081 I16x8Neg "i16x8.neg" NoImm SIMD,
    0xfd_0082 I16x8Q15mulrSatS "i16x8.q15mulr_sat_s" NoImm SIMD,
    0xfd_0083 I16x8AllTrue "i16x8.all_true" NoImm SIMD,
    0xfd_0084 I16x8Bitmask "i16x8.bitmask" NoImm SIMD,
    0xfd_0085 I16x8NarrowI32x4S "i16x8.narrow_i32x4_s" NoImm SIMD,
    0xfd_0086 I16x8NarrowI32x4U "i16x8.narrow_i32x4_u" NoImm SIMD,
    0xfd_0087 I16x8ExtendLowI8x16S "i16x8.extend_low_i8x16_s" NoImm SIMD,
    0xfd_0088 I16x8ExtendHighI8x16S "i16x8.extend_high_i8x16_s" NoImm SIMD,
    0xfd_0089 I16x8ExtendLowI8x16U "i16x8.extend_low_i8x16_u" NoImm SIMD,
    0xfd_008a I16x8ExtendHighI8x16U "i16x8.extend_high_i8x16_u" NoImm SIMD,
    0xfd_008b I16x8Shl "i16x8.shl" NoImm SIMD,
    0xfd_008c I16x8ShrS "i16x8.shr_s" NoImm SIMD,
    0xfd_008d I16x8ShrU "i16x8.shr_u" NoImm SIMD,
    0xfd_008e I16x8Add "i16x8.add" NoImm SIMD,
    0xfd_008f I16x8AddSatS "i16x8.add_sat_s" NoImm SIMD,
    0xfd_0090 I16x8AddSatU "i16x8.add_sat_u" NoImm SIMD,
    0xfd_0091 I16x8Sub "i16x8.sub" NoImm SIMD,
    0xfd_0092 I16x8SubSatS "i16x8.sub_sat_s" NoImm SIMD,
    0xfd_0093 I16x8SubSatU "i16x8.sub_sat_u" NoImm SIMD,
    0xfd_0094 F64x2Nearest "f64x2.nearest" NoImm SIMD,
    0xfd_0095 I16x8Mul "i16x8.mul" NoImm SIMD,
    0xfd_0096 I16x8MinS "i16x8.min_s" NoImm SIMD,
    0xfd_0097 I16x8MinU "i16x8.min_u" NoImm SIMD,
    0xfd_0098 I16x8MaxS "i16x8.max_s" NoImm SIMD,
    0xfd_0099 I16x8MaxU "i16x8.max_u" NoImm SIMD,
    0xfd_009b I16x8AvgrU "i16x8.avgr_u" NoImm SIMD,
    0xfd_009c I16x8ExtmulLowI8x16S "i16x8.extmul_low_i8x16_s" NoImm SIMD,
    0xfd_009d I16x8ExtmulHighI8x16S "i16x8.extmul_high_i8x16_s" NoImm SIMD,
    0xfd_009e I16x8ExtmulLowI8x16U "i16x8.extmul_low_i8x16_u" NoImm SIMD,
    0xfd_009f I16x8ExtmulHighI8x16U "i16x8.extmul_high_i8x16_u" NoImm SIMD,

    // i32x4 lanewise.
    0xfd_00a0 I32x4Abs "i32x4.abs" NoImm SIMD,
    0xfd_00a1 I32x4Neg "i32x4.neg" NoImm SIMD,
    0xfd_00a3 I32x4AllTrue "i32x4.all_true" NoImm SIMD,
    0xfd_00a4 I32x4Bitmask "i32x4.bitmask" NoImm SIMD,
    0xfd_00a7 I32x4ExtendLowI16x8S "i32x4.extend_low_i16x8_s" NoImm SIMD,
    0xfd_00a8 I32x4ExtendHighI16x8S "i32x4.extend_high_i16x8_s" NoImm SIMD,
    0xfd_00a9 I32x4ExtendLowI16x8U "i32x4.extend_low_i16x8_u" NoImm SIMD,
    0xfd_00aa I32x4ExtendHighI16x8U "i32x4.extend_high_i16x8_u" NoImm SIMD,
    0xfd_00ab I32x4Shl "i32x4.shl" NoImm SIMD,
    0xfd_00ac I32x4ShrS "i32x4.shr_s" NoImm SIMD,
    0xfd_00ad I32x4ShrU "i32x4.shr_u" NoImm SIMD,
    0xfd_00ae I32x4Add "i32x4.add" NoImm SIMD,
    0xfd_00b1 I32x4Sub "i32x4.sub" NoImm SIMD,
    0xfd_00b5 I32x4Mul "i32x4.mul" NoImm SIMD,
    0xfd_00b6 I32x4MinS "i32x4.min_s" NoImm SIMD,
    0xfd_00b7 I32x4MinU "i32x4.min_u" NoImm SIMD,
    0xfd_00b8 I32x4MaxS "i32x4.max_s" NoImm SIMD,
    0xfd_00b9 I32x4MaxU "i32x4.max_u" NoImm SIMD,
    0xfd_00ba I32x4DotI16x8S "i32x4.dot_i16x8_s" NoImm SIMD,
    0xfd_00bc I32x4ExtmulLowI16x8S "i32x4.extmul_low_i16x8_s" NoImm SIMD,
    0xfd_00bd I32x4ExtmulHighI16x8S "i32x4.extmul_high_i16x8_s" NoImm SIMD,
    0xfd_00be I32x4ExtmulLowI16x8U "i32x4.extmul_low_i16x8_u" NoImm SIMD,
    0xfd_00bf I32x4ExtmulHighI16x8U "i32x4.extmul_high_i16x8_u" NoImm SIMD,

    // i64x2 lanewise.
    0xfd_00c0 I64x2Abs "i64x2.abs" NoImm SIMD,
    0xfd_00c1 I64x2Neg "i64x2.neg" NoImm SIMD,
    0xfd_00c3 I64x2AllTrue "i64x2.all_true" NoImm SIMD,
    0xfd_00c4 I64x2Bitmask "i64x2.bitmask" NoImm SIMD,
    0xfd_00c7 I64x2ExtendLowI32x4S "i64x2.extend_low_i32x4_s" NoImm SIMD,
    0xfd_00c8 I64x2ExtendHighI32x4S "i64x2.extend_high_i32x4_s" NoImm SIMD,
    0xfd_00c9 I64x2ExtendLowI32x4U "i64x2.extend_low_i32x4_u" NoImm SIMD,
    0xfd_00ca I64x2ExtendHighI32x4U "i64x2.extend_high_i32x4_u" NoImm SIMD,
    0xfd_00cb I64x2Shl "i64x2.shl" NoImm SIMD,
    0xfd_00cc I64x2ShrS "i64x2.shr_s" NoImm SIMD,
    0xfd_00cd I64x2ShrU "i64x2.shr_u" NoImm SIMD,
    0xfd_00ce I64x2Add "i64x2.add" NoImm SIMD,
    0xfd_00d1 I64x2Sub "i64x2.sub" NoImm SIMD,
    0xfd_00d5 I64x2Mul "i64x2.mul" NoImm SIMD,
    0xfd_00d6 I64x2Eq "i64x2.eq" NoImm SIMD,
    0xfd_00d7 I64x2Ne "i64x2.ne" NoImm SIMD,
    0xfd_00d8 I64x2LtS "i64x2.lt_s" NoImm SIMD,
    0xfd_00d9 I64x2GtS "i64x2.gt_s" NoImm SIMD,
    0xfd_00da I64x2LeS "i64x2.le_s" NoImm SIMD,
    0xfd_00db I64x2GeS "i64x2.ge_s" NoImm SIMD,
    0xfd_00dc I64x2ExtmulLowI32x4S "i64x2.extmul_low_i32x4_s" NoImm SIMD,
    0xfd_00dd I64x2ExtmulHighI32x4S "i64x2.extmul_high_i32x4_s" NoImm SIMD,
    0xfd_00de I64x2ExtmulLowI32x4U "i64x2.extmul_low_i32x4_u" NoImm SIMD,
    0xfd_00df I64x2ExtmulHighI32x4U "i64x2.extmul_high_i32x4_u" NoImm SIMD,

    // f32x4 lanewise.
    0xfd_00e0 F32x4Abs "f32x4.abs" NoImm SIMD,
    0xfd_00e1 F32x4Neg "f32x4.neg" NoImm SIMD,
    0xfd_00e3 F32x4Sqrt "f32x4.sqrt" NoImm SIMD,
    0xfd_00e4 F32x4Add "f32x4.add" NoImm SIMD,
    0xfd_00e5 F32x4Sub "f32x4.sub" NoImm SIMD,
    0xfd_00e6 F32x4Mul "f32x4.mul" NoImm SIMD,
    0xfd_00e7 F32x4Div "f32x4.div" NoImm SIMD,
    0xfd_00e8 F32x4Min "f32x4.min" NoImm SIMD,
    0xfd_00e9 F32x4Max "f32x4.max" NoImm SIMD,
    0xfd_00ea F32x4Pmin "f32x4.pmin" NoImm SIMD,
    0xfd_00eb F32x4Pmax "f32x4.pmax" NoImm SIMD,

    // f64x2 lanewise.
    0xfd_00ec F64x2Abs "f64x2.abs" NoImm SIMD,
    0xfd_00ed F64x2Neg "f64x2.neg" NoImm SIMD,
    0xfd_00ef F64x2Sqrt "f64x2.sqrt" NoImm SIMD,
    0xfd_00f0 F64x2Add "f64x2.add" NoImm SIMD,
    0xfd_00f1 F64x2Sub "f64x2.sub" NoImm SIMD,
    0xfd_00f2 F64x2Mul "f64x2.mul" NoImm SIMD,
    0xfd_00f3 F64x2Div "f64x2.div" NoImm SIMD,
    0xfd_00f4 F64x2Min "f64x2.min" NoImm SIMD,
    0xfd_00f5 F64x2Max "f64x2.max" NoImm SIMD,
    0xfd_00f6 F64x2Pmin "f64x2.pmin" NoImm SIMD,
    0xfd_00f7 F64x2Pmax "f64x2.pmax" NoImm SIMD,

    // Vector conversions.
    0xfd_00f8 I32x4TruncSatF32x4S "i32x4.trunc_sat_f32x4_s" NoImm SIMD,
    0xfd_00f9 I32x4TruncSatF32x4U "i32x4.trunc_sat_f32x4_u" NoImm SIMD,
    0xfd_00fa F32x4ConvertI32x4S "f32x4.convert_i32x4_s" NoImm SIMD,
    0xfd_00fb F32x4ConvertI32x4U "f32x4.convert_i32x4_u" NoImm SIMD,
    0xfd_00fc I32x4TruncSatF64x2SZero "i32x4.trunc_sat_f64x2_s_zero" NoImm SIMD,
    0xfd_00fd I32x4TruncSatF64x2UZero "i32x4.trunc_sat_f64x2_u_zero" NoImm SIMD,
    0xfd_00fe F64x2ConvertLowI32x4S "f64x2.convert_low_i32x4_s" NoImm SIMD,
    0xfd_00ff F64x2ConvertLowI32x4U "f64x2.convert_low_i32x4_u" NoImm SIMD,

    // Wait and notify (0xfe space).
    0xfe_0000 MemoryAtomicNotify "memory.atomic.notify" MemArg ATOMICS,
    0xfe_0001 MemoryAtomicWait32 "memory.atomic.wait32" MemArg ATOMICS,
    0xfe_0002 MemoryAtomicWait64 "memory.atomic.wait64" MemArg ATOMICS,
    0xfe_0003 AtomicFence "atomic.fence" FenceImm ATOMICS,

    // Atomic loads.
    0xfe_0010 I32AtomicLoad "i32.atomic.load" MemArg ATOMICS,
    0xfe_0011 I64AtomicLoad "i64.atomic.load" MemArg ATOMICS,
    0xfe_0012 I32AtomicLoad8U "i32.atomic.load8_u" MemArg ATOMICS,
    0xfe_0013 I32AtomicLoad16U "i32.atomic.load16_u" MemArg ATOMICS,
    0xfe_0014 I64AtomicLoad8U "i64.atomic.load8_u" MemArg ATOMICS,
    0xfe_0015 I64AtomicLoad16U "i64.atomic.load16_u" MemArg ATOMICS,
    0xfe_0016 I64AtomicLoad32U "i64.atomic.load32_u" MemArg ATOMICS,

    // Atomic stores.
    0xfe_0017 I32AtomicStore "i32.atomic.store" MemArg ATOMICS,
    0xfe_0018 I64AtomicStore "i64.atomic.store" MemArg ATOMICS,
    0xfe_0019 I32AtomicStore8 "i32.atomic.store8" MemArg ATOMICS,
    0xfe_001a I32AtomicStore16 "i32.atomic.store16" MemArg ATOMICS,
    0xfe_001b I64AtomicStore8 "i64.atomic.store8" MemArg ATOMICS,
    0xfe_001c I64AtomicStore16 "i64.atomic.store16" MemArg ATOMICS,
    0xfe_001d I64AtomicStore32 "i64.atomic.store32" MemArg ATOMICS,

    // Atomic read-modify-write: add.
    0xfe_001e I32AtomicRmwAdd "i32.atomic.rmw.add" MemArg ATOMICS,
    0xfe_001f I64AtomicRmwAdd "i64.atomic.rmw.add" MemArg ATOMICS,
    0xfe_0020 I32AtomicRmw8AddU "i32.atomic.rmw8.add_u" MemArg ATOMICS,
    0xfe_0021 I32AtomicRmw16AddU "i32.atomic.rmw16.add_u" MemArg ATOMICS,
    0xfe_0022 I64AtomicRmw8AddU "i64.atomic.rmw8.add_u" MemArg ATOMICS,
    0xfe_0023 I64AtomicRmw16AddU "i64.atomic.rmw16.add_u" MemArg ATOMICS,
    0xfe_0024 I64AtomicRmw32AddU "i64.atomic.rmw32.add_u" MemArg ATOMICS,

    // Atomic read-modify-write: sub.
    0xfe_0025 I32AtomicRmwSub "i32.atomic.rmw.sub" MemArg ATOMICS,
    0xfe_0026 I64AtomicRmwSub "i64.atomic.rmw.sub" MemArg ATOMICS,
    0xfe_0027 I32AtomicRmw8SubU "i32.atomic.rmw8.sub_u" MemArg ATOMICS,
    0xfe_0028 I32AtomicRmw16SubU "i32.atomic.rmw16.sub_u" MemArg ATOMICS,
    0xfe_0029 I64AtomicRmw8SubU "i64.atomic.rmw8.sub_u" MemArg ATOMICS,
    0xfe_002a I64AtomicRmw16SubU "i64.atomic.rmw16.sub_u" MemArg ATOMICS,
    0xfe_002b I64AtomicRmw32SubU "i64.atomic.rmw32.sub_u" MemArg ATOMICS,

    // Atomic read-modify-write: and.
    0xfe_002c I32AtomicRmwAnd "i32.atomic.rmw.and" MemArg ATOMICS,
    0xfe_002d I64AtomicRmwAnd "i64.atomic.rmw.and" MemArg ATOMICS,
    0xfe_002e I32AtomicRmw8AndU "i32.atomic.rmw8.and_u" MemArg ATOMICS,
    0xfe_002f I32AtomicRmw16AndU "i32.atomic.rmw16.and_u" MemArg ATOMICS,
    0xfe_0030 I64AtomicRmw8AndU "i64.atomic.rmw8.and_u" MemArg ATOMICS,
    0xfe_0031 I64AtomicRmw16AndU "i64.atomic.rmw16.and_u" MemArg ATOMICS,
    0xfe_0032 I64AtomicRmw32AndU "i64.atomic.rmw32.and_u" MemArg ATOMICS,

    // Atomic read-modify-write: or.
    0xfe_0033 I32AtomicRmwOr "i32.atomic.rmw.or" MemArg ATOMICS,
    0xfe_0034 I64AtomicRmwOr "i64.atomic.rmw.or" MemArg ATOMICS,
    0xfe_0035 I32AtomicRmw8OrU "i32.atomic.rmw8.or_u" MemArg ATOMICS,
    0xfe_0036 I32AtomicRmw16OrU "i32.atomic.rmw16.or_u" MemArg ATOMICS,
    0xfe_0037 I64AtomicRmw8OrU "i64.atomic.rmw8.or_u" MemArg ATOMICS,
    0xfe_0038 I64AtomicRmw16OrU "i64.atomic.rmw16.or_u" MemArg ATOMICS,
    0xfe_0039 I64AtomicRmw32OrU "i64.atomic.rmw32.or_u" MemArg ATOMICS,

    // Atomic read-modify-write: xor.
    0xfe_003a I32AtomicRmwXor "i32.atomic.rmw.xor" MemArg ATOMICS,
    0xfe_003b I64AtomicRmwXor "i64.atomic.rmw.xor" MemArg ATOMICS,
    0xfe_003c I32AtomicRmw8XorU "i32.atomic.rmw8.xor_u" MemArg ATOMICS,
    0xfe_003d I32AtomicRmw16XorU "i32.atomic.rmw16.xor_u" MemArg ATOMICS,
    0xfe_003e I64AtomicRmw8XorU "i64.atomic.rmw8.xor_u" MemArg ATOMICS,
    0xfe_003f I64AtomicRmw16XorU "i64.atomic.rmw16.xor_u" MemArg ATOMICS,
    0xfe_0040 I64AtomicRmw32XorU "i64.atomic.rmw32.xor_u" MemArg ATOMICS,

    // Atomic read-modify-write: exchange.
    0xfe_0041 I32AtomicRmwXchg "i32.atomic.rmw.xchg" MemArg ATOMICS,
    0xfe_0042 I64AtomicRmwXchg "i64.atomic.rmw.xchg" MemArg ATOMICS,
    0xfe_0043 I32AtomicRmw8XchgU "i32.atomic.rmw8.xchg_u" MemArg ATOMICS,
    0xfe_0044 I32AtomicRmw16XchgU "i32.atomic.rmw16.xchg_u" MemArg ATOMICS,
    0xfe_0045 I64AtomicRmw8XchgU "i64.atomic.rmw8.xchg_u" MemArg ATOMICS,
    0xfe_0046 I64AtomicRmw16XchgU "i64.atomic.rmw16.xchg_u" MemArg ATOMICS,
    0xfe_0047 I64AtomicRmw32XchgU "i64.atomic.rmw32.xchg_u" MemArg ATOMICS,

    // Atomic read-modify-write: compare-exchange.
    0xfe_0048 I32AtomicRmwCmpxchg "i32.atomic.rmw.cmpxchg" MemArg ATOMICS,
    0xfe_0049 I64AtomicRmwCmpxchg "i64.atomic.rmw.cmpxchg" MemArg ATOMICS,
    0xfe_004a I32AtomicRmw8CmpxchgU "i32.atomic.rmw8.cmpxchg_u" MemArg ATOMICS,
    0xfe_004b I32AtomicRmw16CmpxchgU "i32.atomic.rmw16.cmpxchg_u" MemArg ATOMICS,
    0xfe_004c I64AtomicRmw8CmpxchgU "i64.atomic.rmw8.cmpxchg_u" MemArg ATOMICS,
    0xfe_004d I64AtomicRmw16CmpxchgU "i64.atomic.rmw16.cmpxchg_u" MemArg ATOMICS,
    0xfe_004e I64AtomicRmw32CmpxchgU "i64.atomic.rmw32.cmpxchg_u" MemArg ATOMICS,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_keys_round_trip() {
        for opcode in [
            Opcode::Unreachable,
            Opcode::End,
            Opcode::I32Add,
            Opcode::RefFunc,
            Opcode::MemoryCopy,
            Opcode::V128Const,
            Opcode::I64AtomicRmw32CmpxchgU,
        ] {
            assert_eq!(Opcode::from_u32(opcode.encoding()), Some(opcode));
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert_eq!(Opcode::from_u32(0x0a), None);
        assert_eq!(Opcode::from_u32(0xfd_009a), None);
        assert_eq!(Opcode::from_u32(0xfd_00c2), None);
        assert_eq!(Opcode::from_u32(0xfe_0004), None);
        assert_eq!(Opcode::from_u32(0x1_0000), None);
    }

    #[test]
    fn names_match_the_wire_spelling() {
        assert_eq!(Opcode::I32TruncSatF64U.name(), "i32.trunc_sat_f64_u");
        assert_eq!(Opcode::MemoryAtomicNotify.name(), "memory.atomic.notify");
        assert_eq!(Opcode::I8x16Shuffle.name(), "i8x16.shuffle");
    }

    #[test]
    fn features_gate_the_extended_spaces() {
        use crate::FeatureSet;
        assert_eq!(Opcode::I32Add.feature(), FeatureSet::MVP);
        assert_eq!(Opcode::V128Not.feature(), FeatureSet::SIMD);
        assert_eq!(Opcode::AtomicFence.feature(), FeatureSet::ATOMICS);
        assert_eq!(Opcode::Try.feature(), FeatureSet::EXCEPTION_HANDLING);
    }
}
