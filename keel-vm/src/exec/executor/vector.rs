//! The vector half of the executor's dispatch.

use keel_ops::Operator;
use keel_types::{
    floats::{
        canonicalize_f32 as cf32,
        canonicalize_f64 as cf64,
    },
    V128,
};

use super::{
    numeric,
    Machine,
};
use crate::{
    exec::simd,
    Trap,
};

macro_rules! v_unop {
    ($self:ident, $f:expr) => {{
        let a = $self.pop_v128();
        $self.push_v128($f(a));
    }};
}

macro_rules! v_binop {
    ($self:ident, $f:expr) => {{
        let b = $self.pop_v128();
        let a = $self.pop_v128();
        $self.push_v128($f(a, b));
    }};
}

macro_rules! v_shift {
    ($self:ident, $map:ident, $ty:ty, $mask:expr, $f:expr) => {{
        let shift = $self.pop_u32() & $mask;
        let a = $self.pop_v128();
        $self.push_v128(simd::$map(a, |lane: $ty| $f(lane, shift)));
    }};
}

macro_rules! v_load_extend {
    ($self:ident, $imm:expr, $raw:ty, $wide:ty, $from:ident, $lanes:expr) => {{
        let addr = $self.pop_u32();
        let mut raw = [0u8; 8];
        $self.memory(0)?.read(addr, $imm.offset, &mut raw)?;
        let mut lanes = [<$wide>::default(); $lanes];
        const W: usize = std::mem::size_of::<$raw>();
        for (index, lane) in lanes.iter_mut().enumerate() {
            let mut bytes = [0u8; W];
            bytes.copy_from_slice(&raw[index * W..(index + 1) * W]);
            *lane = <$raw>::from_le_bytes(bytes) as $wide;
        }
        $self.push_v128(V128::$from(lanes));
    }};
}

macro_rules! v_load_splat {
    ($self:ident, $imm:expr, $raw:ty, $from:ident, $lanes:expr) => {{
        let addr = $self.pop_u32();
        let mut bytes = [0u8; std::mem::size_of::<$raw>()];
        $self.memory(0)?.read(addr, $imm.offset, &mut bytes)?;
        let value = <$raw>::from_le_bytes(bytes);
        $self.push_v128(V128::$from([value; $lanes]));
    }};
}

macro_rules! v_load_lane {
    ($self:ident, $imm:expr, $raw:ty, $set:ident) => {{
        let vector = $self.pop_v128();
        let addr = $self.pop_u32();
        let mut bytes = [0u8; std::mem::size_of::<$raw>()];
        $self.memory(0)?.read(addr, $imm.memarg.offset, &mut bytes)?;
        let mut vector = vector;
        vector.$set($imm.lane as usize, <$raw>::from_le_bytes(bytes));
        $self.push_v128(vector);
    }};
}

macro_rules! v_store_lane {
    ($self:ident, $imm:expr, $get:ident) => {{
        let vector = $self.pop_v128();
        let addr = $self.pop_u32();
        let lane = vector.$get($imm.lane as usize);
        $self.memory(0)?.write(addr, $imm.memarg.offset, &lane.to_le_bytes())?;
    }};
}

macro_rules! v_extract {
    ($self:ident, $imm:expr, $get:ident, $push:ident, $conv:ty) => {{
        let vector = $self.pop_v128();
        $self.$push(vector.$get($imm.lane as usize) as $conv);
    }};
}

macro_rules! v_replace {
    ($self:ident, $imm:expr, $pop:ident, $set:ident, $raw:ty) => {{
        let value = $self.$pop() as $raw;
        let mut vector = $self.pop_v128();
        vector.$set($imm.lane as usize, value);
        $self.push_v128(vector);
    }};
}

impl Machine<'_> {
    pub(super) fn step_vector(&mut self, op: &Operator) -> Result<(), Trap> {
        use Operator as O;

        match op {
            // Whole-vector memory access.
            O::V128Load(imm) => {
                let addr = self.pop_u32();
                let mut bytes = [0u8; 16];
                self.memory(0)?.read(addr, imm.offset, &mut bytes)?;
                self.push_v128(V128(bytes));
            }
            O::V128Store(imm) => {
                let vector = self.pop_v128();
                let addr = self.pop_u32();
                self.memory(0)?.write(addr, imm.offset, &vector.0)?;
            }

            // Widening loads.
            O::V128Load8x8S(imm) => v_load_extend!(self, imm, i8, i16, from_i16x8, 8),
            O::V128Load8x8U(imm) => v_load_extend!(self, imm, u8, i16, from_i16x8, 8),
            O::V128Load16x4S(imm) => v_load_extend!(self, imm, i16, i32, from_i32x4, 4),
            O::V128Load16x4U(imm) => v_load_extend!(self, imm, u16, i32, from_i32x4, 4),
            O::V128Load32x2S(imm) => v_load_extend!(self, imm, i32, i64, from_i64x2, 2),
            O::V128Load32x2U(imm) => v_load_extend!(self, imm, u32, i64, from_i64x2, 2),

            // Splatting and zero-extending loads.
            O::V128Load8Splat(imm) => v_load_splat!(self, imm, u8, from_u8x16, 16),
            O::V128Load16Splat(imm) => v_load_splat!(self, imm, u16, from_u16x8, 8),
            O::V128Load32Splat(imm) => v_load_splat!(self, imm, u32, from_u32x4, 4),
            O::V128Load64Splat(imm) => v_load_splat!(self, imm, u64, from_u64x2, 2),
            O::V128Load32Zero(imm) => {
                let addr = self.pop_u32();
                let mut bytes = [0u8; 4];
                self.memory(0)?.read(addr, imm.offset, &mut bytes)?;
                self.push_v128(V128::from_u32x4([u32::from_le_bytes(bytes), 0, 0, 0]));
            }
            O::V128Load64Zero(imm) => {
                let addr = self.pop_u32();
                let mut bytes = [0u8; 8];
                self.memory(0)?.read(addr, imm.offset, &mut bytes)?;
                self.push_v128(V128::from_u64x2([u64::from_le_bytes(bytes), 0]));
            }

            // Single-lane memory access.
            O::V128Load8Lane(imm) => v_load_lane!(self, imm, u8, set_u8x16),
            O::V128Load16Lane(imm) => v_load_lane!(self, imm, u16, set_u16x8),
            O::V128Load32Lane(imm) => v_load_lane!(self, imm, u32, set_u32x4),
            O::V128Load64Lane(imm) => v_load_lane!(self, imm, u64, set_u64x2),
            O::V128Store8Lane(imm) => v_store_lane!(self, imm, u8x16),
            O::V128Store16Lane(imm) => v_store_lane!(self, imm, u16x8),
            O::V128Store32Lane(imm) => v_store_lane!(self, imm, u32x4),
            O::V128Store64Lane(imm) => v_store_lane!(self, imm, u64x2),

            // Constants and byte permutation.
            O::V128Const(imm) => self.push_v128(V128(imm.bytes)),
            O::I8x16Shuffle(imm) => {
                let b = self.pop_v128();
                let a = self.pop_v128();
                self.push_v128(simd::shuffle(a, b, imm.lanes));
            }
            O::I8x16Swizzle(_) => v_binop!(self, simd::swizzle),

            // Splats.
            O::I8x16Splat(_) => {
                let value = self.pop_u32() as u8;
                self.push_v128(V128::from_u8x16([value; 16]));
            }
            O::I16x8Splat(_) => {
                let value = self.pop_u32() as u16;
                self.push_v128(V128::from_u16x8([value; 8]));
            }
            O::I32x4Splat(_) => {
                let value = self.pop_u32();
                self.push_v128(V128::from_u32x4([value; 4]));
            }
            O::I64x2Splat(_) => {
                let value = self.pop_u64();
                self.push_v128(V128::from_u64x2([value; 2]));
            }
            O::F32x4Splat(_) => {
                let value = self.pop_f32();
                self.push_v128(V128::from_f32x4([value; 4]));
            }
            O::F64x2Splat(_) => {
                let value = self.pop_f64();
                self.push_v128(V128::from_f64x2([value; 2]));
            }

            // Lane access.
            O::I8x16ExtractLaneS(imm) => v_extract!(self, imm, i8x16, push_i32, i32),
            O::I8x16ExtractLaneU(imm) => v_extract!(self, imm, u8x16, push_u32, u32),
            O::I8x16ReplaceLane(imm) => v_replace!(self, imm, pop_u32, set_u8x16, u8),
            O::I16x8ExtractLaneS(imm) => v_extract!(self, imm, i16x8, push_i32, i32),
            O::I16x8ExtractLaneU(imm) => v_extract!(self, imm, u16x8, push_u32, u32),
            O::I16x8ReplaceLane(imm) => v_replace!(self, imm, pop_u32, set_u16x8, u16),
            O::I32x4ExtractLane(imm) => v_extract!(self, imm, i32x4, push_i32, i32),
            O::I32x4ReplaceLane(imm) => v_replace!(self, imm, pop_u32, set_u32x4, u32),
            O::I64x2ExtractLane(imm) => v_extract!(self, imm, i64x2, push_i64, i64),
            O::I64x2ReplaceLane(imm) => v_replace!(self, imm, pop_u64, set_u64x2, u64),
            O::F32x4ExtractLane(imm) => {
                let vector = self.pop_v128();
                self.push_f32(vector.f32x4(imm.lane as usize));
            }
            O::F32x4ReplaceLane(imm) => v_replace!(self, imm, pop_f32, set_f32x4, f32),
            O::F64x2ExtractLane(imm) => {
                let vector = self.pop_v128();
                self.push_f64(vector.f64x2(imm.lane as usize));
            }
            O::F64x2ReplaceLane(imm) => v_replace!(self, imm, pop_f64, set_f64x2, f64),

            // Integer comparisons.
            O::I8x16Eq(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x == y)),
            O::I8x16Ne(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x != y)),
            O::I8x16LtS(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x < y)),
            O::I8x16LtU(_) => v_binop!(self, |a, b| simd::cmp_u8x16(a, b, |x, y| x < y)),
            O::I8x16GtS(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x > y)),
            O::I8x16GtU(_) => v_binop!(self, |a, b| simd::cmp_u8x16(a, b, |x, y| x > y)),
            O::I8x16LeS(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x <= y)),
            O::I8x16LeU(_) => v_binop!(self, |a, b| simd::cmp_u8x16(a, b, |x, y| x <= y)),
            O::I8x16GeS(_) => v_binop!(self, |a, b| simd::cmp_i8x16(a, b, |x, y| x >= y)),
            O::I8x16GeU(_) => v_binop!(self, |a, b| simd::cmp_u8x16(a, b, |x, y| x >= y)),
            O::I16x8Eq(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x == y)),
            O::I16x8Ne(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x != y)),
            O::I16x8LtS(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x < y)),
            O::I16x8LtU(_) => v_binop!(self, |a, b| simd::cmp_u16x8(a, b, |x, y| x < y)),
            O::I16x8GtS(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x > y)),
            O::I16x8GtU(_) => v_binop!(self, |a, b| simd::cmp_u16x8(a, b, |x, y| x > y)),
            O::I16x8LeS(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x <= y)),
            O::I16x8LeU(_) => v_binop!(self, |a, b| simd::cmp_u16x8(a, b, |x, y| x <= y)),
            O::I16x8GeS(_) => v_binop!(self, |a, b| simd::cmp_i16x8(a, b, |x, y| x >= y)),
            O::I16x8GeU(_) => v_binop!(self, |a, b| simd::cmp_u16x8(a, b, |x, y| x >= y)),
            O::I32x4Eq(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x == y)),
            O::I32x4Ne(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x != y)),
            O::I32x4LtS(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x < y)),
            O::I32x4LtU(_) => v_binop!(self, |a, b| simd::cmp_u32x4(a, b, |x, y| x < y)),
            O::I32x4GtS(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x > y)),
            O::I32x4GtU(_) => v_binop!(self, |a, b| simd::cmp_u32x4(a, b, |x, y| x > y)),
            O::I32x4LeS(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x <= y)),
            O::I32x4LeU(_) => v_binop!(self, |a, b| simd::cmp_u32x4(a, b, |x, y| x <= y)),
            O::I32x4GeS(_) => v_binop!(self, |a, b| simd::cmp_i32x4(a, b, |x, y| x >= y)),
            O::I32x4GeU(_) => v_binop!(self, |a, b| simd::cmp_u32x4(a, b, |x, y| x >= y)),
            O::I64x2Eq(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x == y)),
            O::I64x2Ne(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x != y)),
            O::I64x2LtS(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x < y)),
            O::I64x2GtS(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x > y)),
            O::I64x2LeS(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x <= y)),
            O::I64x2GeS(_) => v_binop!(self, |a, b| simd::cmp_i64x2(a, b, |x, y| x >= y)),

            // Float comparisons.
            O::F32x4Eq(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x == y)),
            O::F32x4Ne(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x != y)),
            O::F32x4Lt(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x < y)),
            O::F32x4Gt(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x > y)),
            O::F32x4Le(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x <= y)),
            O::F32x4Ge(_) => v_binop!(self, |a, b| simd::cmp_f32x4(a, b, |x, y| x >= y)),
            O::F64x2Eq(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x == y)),
            O::F64x2Ne(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x != y)),
            O::F64x2Lt(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x < y)),
            O::F64x2Gt(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x > y)),
            O::F64x2Le(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x <= y)),
            O::F64x2Ge(_) => v_binop!(self, |a, b| simd::cmp_f64x2(a, b, |x, y| x >= y)),

            // Bitwise.
            O::V128Not(_) => v_unop!(self, |a: V128| {
                let mut out = a;
                for byte in &mut out.0 {
                    *byte = !*byte;
                }
                out
            }),
            O::V128And(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, |x, y| x & y)),
            O::V128Andnot(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, |x, y| x & !y)),
            O::V128Or(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, |x, y| x | y)),
            O::V128Xor(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, |x, y| x ^ y)),
            O::V128Bitselect(_) => {
                let mask = self.pop_v128();
                let b = self.pop_v128();
                let a = self.pop_v128();
                self.push_v128(simd::bitselect(a, b, mask));
            }

            // Tests and masks.
            O::V128AnyTrue(_) => {
                let a = self.pop_v128();
                self.push_u32(simd::any_true(a) as u32);
            }
            O::I8x16AllTrue(_) => {
                let a = self.pop_v128();
                self.push_u32(simd::all_true_i8x16(a) as u32);
            }
            O::I16x8AllTrue(_) => {
                let a = self.pop_v128();
                self.push_u32(simd::all_true_i16x8(a) as u32);
            }
            O::I32x4AllTrue(_) => {
                let a = self.pop_v128();
                self.push_u32(simd::all_true_i32x4(a) as u32);
            }
            O::I64x2AllTrue(_) => {
                let a = self.pop_v128();
                self.push_u32(simd::all_true_i64x2(a) as u32);
            }
            O::I8x16Bitmask(_) => {
                let a = self.pop_v128();
                self.push_i32(simd::bitmask_i8x16(a));
            }
            O::I16x8Bitmask(_) => {
                let a = self.pop_v128();
                self.push_i32(simd::bitmask_i16x8(a));
            }
            O::I32x4Bitmask(_) => {
                let a = self.pop_v128();
                self.push_i32(simd::bitmask_i32x4(a));
            }
            O::I64x2Bitmask(_) => {
                let a = self.pop_v128();
                self.push_i32(simd::bitmask_i64x2(a));
            }

            // Shifts.
            O::I8x16Shl(_) => v_shift!(self, map_u8x16, u8, 7, |lane: u8, s| lane << s),
            O::I8x16ShrS(_) => v_shift!(self, map_i8x16, i8, 7, |lane: i8, s| lane >> s),
            O::I8x16ShrU(_) => v_shift!(self, map_u8x16, u8, 7, |lane: u8, s| lane >> s),
            O::I16x8Shl(_) => v_shift!(self, map_u16x8, u16, 15, |lane: u16, s| lane << s),
            O::I16x8ShrS(_) => v_shift!(self, map_i16x8, i16, 15, |lane: i16, s| lane >> s),
            O::I16x8ShrU(_) => v_shift!(self, map_u16x8, u16, 15, |lane: u16, s| lane >> s),
            O::I32x4Shl(_) => v_shift!(self, map_u32x4, u32, 31, |lane: u32, s| lane << s),
            O::I32x4ShrS(_) => v_shift!(self, map_i32x4, i32, 31, |lane: i32, s| lane >> s),
            O::I32x4ShrU(_) => v_shift!(self, map_u32x4, u32, 31, |lane: u32, s| lane >> s),
            O::I64x2Shl(_) => v_shift!(self, map_u64x2, u64, 63, |lane: u64, s| lane << s),
            O::I64x2ShrS(_) => v_shift!(self, map_i64x2, i64, 63, |lane: i64, s| lane >> s),
            O::I64x2ShrU(_) => v_shift!(self, map_u64x2, u64, 63, |lane: u64, s| lane >> s),

            // Integer lanewise arithmetic.
            O::I8x16Abs(_) => v_unop!(self, |a| simd::map_i8x16(a, i8::wrapping_abs)),
            O::I8x16Neg(_) => v_unop!(self, |a| simd::map_i8x16(a, i8::wrapping_neg)),
            O::I8x16Popcnt(_) => {
                v_unop!(self, |a| simd::map_u8x16(a, |x| x.count_ones() as u8))
            }
            O::I8x16Add(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::wrapping_add)),
            O::I8x16AddSatS(_) => {
                v_binop!(self, |a, b| simd::zip_i8x16(a, b, i8::saturating_add))
            }
            O::I8x16AddSatU(_) => {
                v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::saturating_add))
            }
            O::I8x16Sub(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::wrapping_sub)),
            O::I8x16SubSatS(_) => {
                v_binop!(self, |a, b| simd::zip_i8x16(a, b, i8::saturating_sub))
            }
            O::I8x16SubSatU(_) => {
                v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::saturating_sub))
            }
            O::I8x16MinS(_) => v_binop!(self, |a, b| simd::zip_i8x16(a, b, i8::min)),
            O::I8x16MinU(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::min)),
            O::I8x16MaxS(_) => v_binop!(self, |a, b| simd::zip_i8x16(a, b, i8::max)),
            O::I8x16MaxU(_) => v_binop!(self, |a, b| simd::zip_u8x16(a, b, u8::max)),
            O::I8x16AvgrU(_) => v_binop!(self, simd::avgr_u8),
            O::I8x16NarrowI16x8S(_) => v_binop!(self, simd::narrow_i16x8_to_i8x16),
            O::I8x16NarrowI16x8U(_) => v_binop!(self, simd::narrow_i16x8_to_u8x16),

            O::I16x8Abs(_) => v_unop!(self, |a| simd::map_i16x8(a, i16::wrapping_abs)),
            O::I16x8Neg(_) => v_unop!(self, |a| simd::map_i16x8(a, i16::wrapping_neg)),
            O::I16x8Add(_) => {
                v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::wrapping_add))
            }
            O::I16x8AddSatS(_) => {
                v_binop!(self, |a, b| simd::zip_i16x8(a, b, i16::saturating_add))
            }
            O::I16x8AddSatU(_) => {
                v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::saturating_add))
            }
            O::I16x8Sub(_) => {
                v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::wrapping_sub))
            }
            O::I16x8SubSatS(_) => {
                v_binop!(self, |a, b| simd::zip_i16x8(a, b, i16::saturating_sub))
            }
            O::I16x8SubSatU(_) => {
                v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::saturating_sub))
            }
            O::I16x8Mul(_) => {
                v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::wrapping_mul))
            }
            O::I16x8MinS(_) => v_binop!(self, |a, b| simd::zip_i16x8(a, b, i16::min)),
            O::I16x8MinU(_) => v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::min)),
            O::I16x8MaxS(_) => v_binop!(self, |a, b| simd::zip_i16x8(a, b, i16::max)),
            O::I16x8MaxU(_) => v_binop!(self, |a, b| simd::zip_u16x8(a, b, u16::max)),
            O::I16x8AvgrU(_) => v_binop!(self, simd::avgr_u16),
            O::I16x8Q15mulrSatS(_) => v_binop!(self, simd::q15mulr_sat),
            O::I16x8NarrowI32x4S(_) => v_binop!(self, simd::narrow_i32x4_to_i16x8),
            O::I16x8NarrowI32x4U(_) => v_binop!(self, simd::narrow_i32x4_to_u16x8),
            O::I16x8ExtendLowI8x16S(_) => v_unop!(self, simd::extend_low_i8x16_s),
            O::I16x8ExtendHighI8x16S(_) => v_unop!(self, simd::extend_high_i8x16_s),
            O::I16x8ExtendLowI8x16U(_) => v_unop!(self, simd::extend_low_i8x16_u),
            O::I16x8ExtendHighI8x16U(_) => v_unop!(self, simd::extend_high_i8x16_u),
            O::I16x8ExtaddPairwiseI8x16S(_) => v_unop!(self, simd::extadd_pairwise_i8x16_s),
            O::I16x8ExtaddPairwiseI8x16U(_) => v_unop!(self, simd::extadd_pairwise_i8x16_u),
            O::I16x8ExtmulLowI8x16S(_) => v_binop!(self, simd::extmul_low_i8x16_s),
            O::I16x8ExtmulHighI8x16S(_) => v_binop!(self, simd::extmul_high_i8x16_s),
            O::I16x8ExtmulLowI8x16U(_) => v_binop!(self, simd::extmul_low_i8x16_u),
            O::I16x8ExtmulHighI8x16U(_) => v_binop!(self, simd::extmul_high_i8x16_u),

            O::I32x4Abs(_) => v_unop!(self, |a| simd::map_i32x4(a, i32::wrapping_abs)),
            O::I32x4Neg(_) => v_unop!(self, |a| simd::map_i32x4(a, i32::wrapping_neg)),
            O::I32x4Add(_) => {
                v_binop!(self, |a, b| simd::zip_u32x4(a, b, u32::wrapping_add))
            }
            O::I32x4Sub(_) => {
                v_binop!(self, |a, b| simd::zip_u32x4(a, b, u32::wrapping_sub))
            }
            O::I32x4Mul(_) => {
                v_binop!(self, |a, b| simd::zip_u32x4(a, b, u32::wrapping_mul))
            }
            O::I32x4MinS(_) => v_binop!(self, |a, b| simd::zip_i32x4(a, b, i32::min)),
            O::I32x4MinU(_) => v_binop!(self, |a, b| simd::zip_u32x4(a, b, u32::min)),
            O::I32x4MaxS(_) => v_binop!(self, |a, b| simd::zip_i32x4(a, b, i32::max)),
            O::I32x4MaxU(_) => v_binop!(self, |a, b| simd::zip_u32x4(a, b, u32::max)),
            O::I32x4DotI16x8S(_) => v_binop!(self, simd::dot_i16x8),
            O::I32x4ExtendLowI16x8S(_) => v_unop!(self, simd::extend_low_i16x8_s),
            O::I32x4ExtendHighI16x8S(_) => v_unop!(self, simd::extend_high_i16x8_s),
            O::I32x4ExtendLowI16x8U(_) => v_unop!(self, simd::extend_low_i16x8_u),
            O::I32x4ExtendHighI16x8U(_) => v_unop!(self, simd::extend_high_i16x8_u),
            O::I32x4ExtaddPairwiseI16x8S(_) => v_unop!(self, simd::extadd_pairwise_i16x8_s),
            O::I32x4ExtaddPairwiseI16x8U(_) => v_unop!(self, simd::extadd_pairwise_i16x8_u),
            O::I32x4ExtmulLowI16x8S(_) => v_binop!(self, simd::extmul_low_i16x8_s),
            O::I32x4ExtmulHighI16x8S(_) => v_binop!(self, simd::extmul_high_i16x8_s),
            O::I32x4ExtmulLowI16x8U(_) => v_binop!(self, simd::extmul_low_i16x8_u),
            O::I32x4ExtmulHighI16x8U(_) => v_binop!(self, simd::extmul_high_i16x8_u),

            O::I64x2Abs(_) => v_unop!(self, |a| simd::map_i64x2(a, i64::wrapping_abs)),
            O::I64x2Neg(_) => v_unop!(self, |a| simd::map_i64x2(a, i64::wrapping_neg)),
            O::I64x2Add(_) => {
                v_binop!(self, |a, b| simd::zip_u64x2(a, b, u64::wrapping_add))
            }
            O::I64x2Sub(_) => {
                v_binop!(self, |a, b| simd::zip_u64x2(a, b, u64::wrapping_sub))
            }
            O::I64x2Mul(_) => {
                v_binop!(self, |a, b| simd::zip_u64x2(a, b, u64::wrapping_mul))
            }
            O::I64x2ExtendLowI32x4S(_) => v_unop!(self, simd::extend_low_i32x4_s),
            O::I64x2ExtendHighI32x4S(_) => v_unop!(self, simd::extend_high_i32x4_s),
            O::I64x2ExtendLowI32x4U(_) => v_unop!(self, simd::extend_low_i32x4_u),
            O::I64x2ExtendHighI32x4U(_) => v_unop!(self, simd::extend_high_i32x4_u),
            O::I64x2ExtmulLowI32x4S(_) => v_binop!(self, simd::extmul_low_i32x4_s),
            O::I64x2ExtmulHighI32x4S(_) => v_binop!(self, simd::extmul_high_i32x4_s),
            O::I64x2ExtmulLowI32x4U(_) => v_binop!(self, simd::extmul_low_i32x4_u),
            O::I64x2ExtmulHighI32x4U(_) => v_binop!(self, simd::extmul_high_i32x4_u),

            // Float lanewise arithmetic.
            O::F32x4Abs(_) => v_unop!(self, |a| simd::map_f32x4(a, f32::abs)),
            O::F32x4Neg(_) => v_unop!(self, |a| simd::map_f32x4(a, |x| -x)),
            O::F32x4Sqrt(_) => v_unop!(self, |a| simd::map_f32x4(a, |x| cf32(x.sqrt()))),
            O::F32x4Ceil(_) => v_unop!(self, |a| simd::map_f32x4(a, |x| cf32(x.ceil()))),
            O::F32x4Floor(_) => v_unop!(self, |a| simd::map_f32x4(a, |x| cf32(x.floor()))),
            O::F32x4Trunc(_) => v_unop!(self, |a| simd::map_f32x4(a, |x| cf32(x.trunc()))),
            O::F32x4Nearest(_) => {
                v_unop!(self, |a| simd::map_f32x4(a, |x| cf32(numeric::nearest32(x))))
            }
            O::F32x4Add(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| cf32(x + y))),
            O::F32x4Sub(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| cf32(x - y))),
            O::F32x4Mul(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| cf32(x * y))),
            O::F32x4Div(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| cf32(x / y))),
            O::F32x4Min(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, numeric::fmin32)),
            O::F32x4Max(_) => v_binop!(self, |a, b| simd::zip_f32x4(a, b, numeric::fmax32)),
            O::F32x4Pmin(_) => {
                v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| if y < x { y } else { x }))
            }
            O::F32x4Pmax(_) => {
                v_binop!(self, |a, b| simd::zip_f32x4(a, b, |x, y| if x < y { y } else { x }))
            }

            O::F64x2Abs(_) => v_unop!(self, |a| simd::map_f64x2(a, f64::abs)),
            O::F64x2Neg(_) => v_unop!(self, |a| simd::map_f64x2(a, |x| -x)),
            O::F64x2Sqrt(_) => v_unop!(self, |a| simd::map_f64x2(a, |x| cf64(x.sqrt()))),
            O::F64x2Ceil(_) => v_unop!(self, |a| simd::map_f64x2(a, |x| cf64(x.ceil()))),
            O::F64x2Floor(_) => v_unop!(self, |a| simd::map_f64x2(a, |x| cf64(x.floor()))),
            O::F64x2Trunc(_) => v_unop!(self, |a| simd::map_f64x2(a, |x| cf64(x.trunc()))),
            O::F64x2Nearest(_) => {
                v_unop!(self, |a| simd::map_f64x2(a, |x| cf64(numeric::nearest64(x))))
            }
            O::F64x2Add(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| cf64(x + y))),
            O::F64x2Sub(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| cf64(x - y))),
            O::F64x2Mul(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| cf64(x * y))),
            O::F64x2Div(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| cf64(x / y))),
            O::F64x2Min(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, numeric::fmin64)),
            O::F64x2Max(_) => v_binop!(self, |a, b| simd::zip_f64x2(a, b, numeric::fmax64)),
            O::F64x2Pmin(_) => {
                v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| if y < x { y } else { x }))
            }
            O::F64x2Pmax(_) => {
                v_binop!(self, |a, b| simd::zip_f64x2(a, b, |x, y| if x < y { y } else { x }))
            }

            // Conversions.
            O::I32x4TruncSatF32x4S(_) => v_unop!(self, |a: V128| {
                let mut out = [0i32; 4];
                for (index, lane) in out.iter_mut().enumerate() {
                    *lane = numeric::trunc_sat_f32_to_i32(a.f32x4(index));
                }
                V128::from_i32x4(out)
            }),
            O::I32x4TruncSatF32x4U(_) => v_unop!(self, |a: V128| {
                let mut out = [0u32; 4];
                for (index, lane) in out.iter_mut().enumerate() {
                    *lane = numeric::trunc_sat_f32_to_u32(a.f32x4(index));
                }
                V128::from_u32x4(out)
            }),
            O::I32x4TruncSatF64x2SZero(_) => v_unop!(self, |a: V128| {
                let mut out = [0i32; 4];
                for index in 0..2 {
                    out[index] = numeric::trunc_sat_f64_to_i32(a.f64x2(index));
                }
                V128::from_i32x4(out)
            }),
            O::I32x4TruncSatF64x2UZero(_) => v_unop!(self, |a: V128| {
                let mut out = [0u32; 4];
                for index in 0..2 {
                    out[index] = numeric::trunc_sat_f64_to_u32(a.f64x2(index));
                }
                V128::from_u32x4(out)
            }),
            O::F32x4ConvertI32x4S(_) => v_unop!(self, |a: V128| {
                let mut out = [0f32; 4];
                for (index, lane) in out.iter_mut().enumerate() {
                    *lane = a.i32x4(index) as f32;
                }
                V128::from_f32x4(out)
            }),
            O::F32x4ConvertI32x4U(_) => v_unop!(self, |a: V128| {
                let mut out = [0f32; 4];
                for (index, lane) in out.iter_mut().enumerate() {
                    *lane = a.u32x4(index) as f32;
                }
                V128::from_f32x4(out)
            }),
            O::F64x2ConvertLowI32x4S(_) => v_unop!(self, |a: V128| {
                V128::from_f64x2([a.i32x4(0) as f64, a.i32x4(1) as f64])
            }),
            O::F64x2ConvertLowI32x4U(_) => v_unop!(self, |a: V128| {
                V128::from_f64x2([a.u32x4(0) as f64, a.u32x4(1) as f64])
            }),
            O::F32x4DemoteF64x2Zero(_) => v_unop!(self, |a: V128| {
                V128::from_f32x4([
                    cf32(a.f64x2(0) as f32),
                    cf32(a.f64x2(1) as f32),
                    0.0,
                    0.0,
                ])
            }),
            O::F64x2PromoteLowF32x4(_) => v_unop!(self, |a: V128| {
                V128::from_f64x2([cf64(a.f32x4(0) as f64), cf64(a.f32x4(1) as f64)])
            }),

            other => unreachable!("non-vector operator {} reached the vector step", other),
        }
        Ok(())
    }
}
