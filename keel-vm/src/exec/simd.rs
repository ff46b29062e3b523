//! Lane-wise vector helpers.
//!
//! One map/zip/compare family per lane shape, macro-generated so the
//! executor's vector arms stay one-liners. Saturating narrows, pairwise
//! and widening products, and the handful of irregular operators live at
//! the bottom.

use keel_types::V128;

macro_rules! lane_family {
    ($map:ident, $zip:ident, $cmp:ident, $get:ident, $from:ident, $ty:ty, $lanes:expr, $mask:expr) => {
        /// Apply `f` to every lane.
        pub(crate) fn $map(a: V128, f: impl Fn($ty) -> $ty) -> V128 {
            let mut out = [<$ty>::default(); $lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = f(a.$get(index));
            }
            V128::$from(out)
        }

        /// Combine corresponding lanes with `f`.
        pub(crate) fn $zip(a: V128, b: V128, f: impl Fn($ty, $ty) -> $ty) -> V128 {
            let mut out = [<$ty>::default(); $lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = f(a.$get(index), b.$get(index));
            }
            V128::$from(out)
        }

        /// Compare lanes; true lanes become all-ones.
        pub(crate) fn $cmp(a: V128, b: V128, f: impl Fn($ty, $ty) -> bool) -> V128 {
            let mut out = [<$ty>::default(); $lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = if f(a.$get(index), b.$get(index)) {
                    $mask
                } else {
                    <$ty>::default()
                };
            }
            V128::$from(out)
        }
    };
}

lane_family!(map_i8x16, zip_i8x16, cmp_i8x16, i8x16, from_i8x16, i8, 16, -1);
lane_family!(map_u8x16, zip_u8x16, cmp_u8x16, u8x16, from_u8x16, u8, 16, u8::MAX);
lane_family!(map_i16x8, zip_i16x8, cmp_i16x8, i16x8, from_i16x8, i16, 8, -1);
lane_family!(map_u16x8, zip_u16x8, cmp_u16x8, u16x8, from_u16x8, u16, 8, u16::MAX);
lane_family!(map_i32x4, zip_i32x4, cmp_i32x4, i32x4, from_i32x4, i32, 4, -1);
lane_family!(map_u32x4, zip_u32x4, cmp_u32x4, u32x4, from_u32x4, u32, 4, u32::MAX);
lane_family!(map_i64x2, zip_i64x2, cmp_i64x2, i64x2, from_i64x2, i64, 2, -1);
lane_family!(map_u64x2, zip_u64x2, cmp_u64x2, u64x2, from_u64x2, u64, 2, u64::MAX);
macro_rules! float_lane_family {
    ($map:ident, $zip:ident, $get:ident, $from:ident, $ty:ty, $lanes:expr) => {
        /// Apply `f` to every lane.
        pub(crate) fn $map(a: V128, f: impl Fn($ty) -> $ty) -> V128 {
            let mut out = [<$ty>::default(); $lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = f(a.$get(index));
            }
            V128::$from(out)
        }

        /// Combine corresponding lanes with `f`.
        pub(crate) fn $zip(a: V128, b: V128, f: impl Fn($ty, $ty) -> $ty) -> V128 {
            let mut out = [<$ty>::default(); $lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = f(a.$get(index), b.$get(index));
            }
            V128::$from(out)
        }
    };
}

float_lane_family!(map_f32x4, zip_f32x4, f32x4, from_f32x4, f32, 4);
float_lane_family!(map_f64x2, zip_f64x2, f64x2, from_f64x2, f64, 2);

/// Float comparisons produce integer masks of the lane width.
pub(crate) fn cmp_f32x4(a: V128, b: V128, f: impl Fn(f32, f32) -> bool) -> V128 {
    let mut out = [0u32; 4];
    for (index, lane) in out.iter_mut().enumerate() {
        *lane = if f(a.f32x4(index), b.f32x4(index)) {
            u32::MAX
        } else {
            0
        };
    }
    V128::from_u32x4(out)
}

/// As [`cmp_f32x4`], for two-lane doubles.
pub(crate) fn cmp_f64x2(a: V128, b: V128, f: impl Fn(f64, f64) -> bool) -> V128 {
    let mut out = [0u64; 2];
    for (index, lane) in out.iter_mut().enumerate() {
        *lane = if f(a.f64x2(index), b.f64x2(index)) {
            u64::MAX
        } else {
            0
        };
    }
    V128::from_u64x2(out)
}

/// `v128.bitselect`: bits of `a` where `mask` is set, else bits of `b`.
pub(crate) fn bitselect(a: V128, b: V128, mask: V128) -> V128 {
    let mut out = [0u8; 16];
    for (index, byte) in out.iter_mut().enumerate() {
        *byte = (a.0[index] & mask.0[index]) | (b.0[index] & !mask.0[index]);
    }
    V128(out)
}

/// `i8x16.swizzle`: lane selection with out-of-range selectors yielding
/// zero.
pub(crate) fn swizzle(a: V128, selectors: V128) -> V128 {
    let mut out = [0u8; 16];
    for (index, byte) in out.iter_mut().enumerate() {
        let selector = selectors.u8x16(index);
        *byte = if selector < 16 { a.u8x16(selector as usize) } else { 0 };
    }
    V128(out)
}

/// `i8x16.shuffle` over the 32 lanes of both inputs.
pub(crate) fn shuffle(a: V128, b: V128, lanes: [u8; 16]) -> V128 {
    let mut out = [0u8; 16];
    for (index, byte) in out.iter_mut().enumerate() {
        let lane = lanes[index] as usize;
        *byte = if lane < 16 {
            a.u8x16(lane)
        } else {
            b.u8x16(lane - 16)
        };
    }
    V128(out)
}

/// The most significant bit of every lane, packed little-lane-first.
macro_rules! bitmask {
    ($name:ident, $get:ident, $lanes:expr) => {
        pub(crate) fn $name(a: V128) -> i32 {
            let mut mask = 0i32;
            for index in 0..$lanes {
                if a.$get(index) < 0 {
                    mask |= 1 << index;
                }
            }
            mask
        }
    };
}

bitmask!(bitmask_i8x16, i8x16, 16);
bitmask!(bitmask_i16x8, i16x8, 8);
bitmask!(bitmask_i32x4, i32x4, 4);
bitmask!(bitmask_i64x2, i64x2, 2);

/// Whether any bit is set.
pub(crate) fn any_true(a: V128) -> bool {
    a.0 != [0; 16]
}

macro_rules! all_true {
    ($name:ident, $get:ident, $lanes:expr) => {
        /// Whether every lane is nonzero.
        pub(crate) fn $name(a: V128) -> bool {
            (0..$lanes).all(|index| a.$get(index) != 0)
        }
    };
}

all_true!(all_true_i8x16, u8x16, 16);
all_true!(all_true_i16x8, u16x8, 8);
all_true!(all_true_i32x4, u32x4, 4);
all_true!(all_true_i64x2, u64x2, 2);

macro_rules! narrow {
    ($name:ident, $wide_get:ident, $narrow:ty, $from:ident, $wide_lanes:expr) => {
        /// Saturating narrow: lanes of `a` then lanes of `b`.
        pub(crate) fn $name(a: V128, b: V128) -> V128 {
            let mut out = [<$narrow>::default(); 2 * $wide_lanes];
            for index in 0..$wide_lanes {
                out[index] = clamp_to(a.$wide_get(index));
                out[index + $wide_lanes] = clamp_to(b.$wide_get(index));
            }
            V128::$from(out)
        }
    };
}

fn clamp_to<Narrow, Wide>(value: Wide) -> Narrow
where
    Narrow: TryFrom<Wide> + Bounds<Wide>,
    Wide: PartialOrd + Copy,
{
    if value <= Narrow::MIN_WIDE {
        Narrow::MIN_SELF
    } else if value >= Narrow::MAX_WIDE {
        Narrow::MAX_SELF
    } else {
        Narrow::try_from(value).unwrap_or(Narrow::MIN_SELF)
    }
}

pub(crate) trait Bounds<Wide>: Sized {
    const MIN_WIDE: Wide;
    const MAX_WIDE: Wide;
    const MIN_SELF: Self;
    const MAX_SELF: Self;
}

macro_rules! bounds {
    ($narrow:ty, $wide:ty) => {
        impl Bounds<$wide> for $narrow {
            const MIN_WIDE: $wide = <$narrow>::MIN as $wide;
            const MAX_WIDE: $wide = <$narrow>::MAX as $wide;
            const MIN_SELF: Self = <$narrow>::MIN;
            const MAX_SELF: Self = <$narrow>::MAX;
        }
    };
}

bounds!(i8, i16);
bounds!(u8, i16);
bounds!(i16, i32);
bounds!(u16, i32);

narrow!(narrow_i16x8_to_i8x16, i16x8, i8, from_i8x16, 8);
narrow!(narrow_i16x8_to_u8x16, i16x8, u8, from_u8x16, 8);
narrow!(narrow_i32x4_to_i16x8, i32x4, i16, from_i16x8, 4);
narrow!(narrow_i32x4_to_u16x8, i32x4, u16, from_u16x8, 4);

macro_rules! extend {
    ($name:ident, $get:ident, $wide:ty, $from:ident, $wide_lanes:expr, $offset:expr) => {
        /// Widen half of the lanes.
        pub(crate) fn $name(a: V128) -> V128 {
            let mut out = [<$wide>::default(); $wide_lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                *lane = a.$get(index + $offset) as $wide;
            }
            V128::$from(out)
        }
    };
}

extend!(extend_low_i8x16_s, i8x16, i16, from_i16x8, 8, 0);
extend!(extend_high_i8x16_s, i8x16, i16, from_i16x8, 8, 8);
extend!(extend_low_i8x16_u, u8x16, i16, from_i16x8, 8, 0);
extend!(extend_high_i8x16_u, u8x16, i16, from_i16x8, 8, 8);
extend!(extend_low_i16x8_s, i16x8, i32, from_i32x4, 4, 0);
extend!(extend_high_i16x8_s, i16x8, i32, from_i32x4, 4, 4);
extend!(extend_low_i16x8_u, u16x8, i32, from_i32x4, 4, 0);
extend!(extend_high_i16x8_u, u16x8, i32, from_i32x4, 4, 4);
extend!(extend_low_i32x4_s, i32x4, i64, from_i64x2, 2, 0);
extend!(extend_high_i32x4_s, i32x4, i64, from_i64x2, 2, 2);
extend!(extend_low_i32x4_u, u32x4, i64, from_i64x2, 2, 0);
extend!(extend_high_i32x4_u, u32x4, i64, from_i64x2, 2, 2);

macro_rules! extmul {
    ($name:ident, $get:ident, $wide:ty, $from:ident, $wide_lanes:expr, $offset:expr) => {
        /// Widening product of half the lanes.
        pub(crate) fn $name(a: V128, b: V128) -> V128 {
            let mut out = [<$wide>::default(); $wide_lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                let x = a.$get(index + $offset) as $wide;
                let y = b.$get(index + $offset) as $wide;
                *lane = x.wrapping_mul(y);
            }
            V128::$from(out)
        }
    };
}

extmul!(extmul_low_i8x16_s, i8x16, i16, from_i16x8, 8, 0);
extmul!(extmul_high_i8x16_s, i8x16, i16, from_i16x8, 8, 8);
extmul!(extmul_low_i8x16_u, u8x16, i16, from_i16x8, 8, 0);
extmul!(extmul_high_i8x16_u, u8x16, i16, from_i16x8, 8, 8);
extmul!(extmul_low_i16x8_s, i16x8, i32, from_i32x4, 4, 0);
extmul!(extmul_high_i16x8_s, i16x8, i32, from_i32x4, 4, 4);
extmul!(extmul_low_i16x8_u, u16x8, i32, from_i32x4, 4, 0);
extmul!(extmul_high_i16x8_u, u16x8, i32, from_i32x4, 4, 4);
extmul!(extmul_low_i32x4_s, i32x4, i64, from_i64x2, 2, 0);
extmul!(extmul_high_i32x4_s, i32x4, i64, from_i64x2, 2, 2);
extmul!(extmul_low_i32x4_u, u32x4, i64, from_i64x2, 2, 0);
extmul!(extmul_high_i32x4_u, u32x4, i64, from_i64x2, 2, 2);

macro_rules! extadd_pairwise {
    ($name:ident, $get:ident, $wide:ty, $from:ident, $wide_lanes:expr) => {
        /// Sum adjacent lane pairs into the wider shape.
        pub(crate) fn $name(a: V128) -> V128 {
            let mut out = [<$wide>::default(); $wide_lanes];
            for (index, lane) in out.iter_mut().enumerate() {
                let x = a.$get(2 * index) as $wide;
                let y = a.$get(2 * index + 1) as $wide;
                *lane = x.wrapping_add(y);
            }
            V128::$from(out)
        }
    };
}

extadd_pairwise!(extadd_pairwise_i8x16_s, i8x16, i16, from_i16x8, 8);
extadd_pairwise!(extadd_pairwise_i8x16_u, u8x16, i16, from_i16x8, 8);
extadd_pairwise!(extadd_pairwise_i16x8_s, i16x8, i32, from_i32x4, 4);
extadd_pairwise!(extadd_pairwise_i16x8_u, u16x8, i32, from_i32x4, 4);

/// `i16x8.q15mulr_sat_s`: fixed-point rounding multiply, saturated.
pub(crate) fn q15mulr_sat(a: V128, b: V128) -> V128 {
    zip_i16x8(a, b, |x, y| {
        let product = (x as i32 * y as i32 + (1 << 14)) >> 15;
        product.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    })
}

/// `i32x4.dot_i16x8_s`: pairwise products summed into four lanes.
pub(crate) fn dot_i16x8(a: V128, b: V128) -> V128 {
    let mut out = [0i32; 4];
    for (index, lane) in out.iter_mut().enumerate() {
        let lo = a.i16x8(2 * index) as i32 * b.i16x8(2 * index) as i32;
        let hi = a.i16x8(2 * index + 1) as i32 * b.i16x8(2 * index + 1) as i32;
        *lane = lo.wrapping_add(hi);
    }
    V128::from_i32x4(out)
}

/// Rounding average, unsigned.
pub(crate) fn avgr_u8(a: V128, b: V128) -> V128 {
    zip_u8x16(a, b, |x, y| ((x as u16 + y as u16 + 1) / 2) as u8)
}

/// Rounding average, unsigned, 16-bit lanes.
pub(crate) fn avgr_u16(a: V128, b: V128) -> V128 {
    zip_u16x8(a, b, |x, y| ((x as u32 + y as u32 + 1) / 2) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_masks_are_all_ones() {
        let a = V128::from_i32x4([1, 5, -3, 0]);
        let b = V128::from_i32x4([1, 4, -3, 9]);
        let mask = cmp_i32x4(a, b, |x, y| x == y);
        assert_eq!(mask.u32x4(0), u32::MAX);
        assert_eq!(mask.u32x4(1), 0);
        assert_eq!(mask.u32x4(2), u32::MAX);
    }

    #[test]
    fn swizzle_zeroes_out_of_range_selectors() {
        let a = V128::from_u8x16(core::array::from_fn(|i| i as u8 + 1));
        let mut sel = [0u8; 16];
        sel[0] = 3;
        sel[1] = 200;
        let out = swizzle(a, V128::from_u8x16(sel));
        assert_eq!(out.u8x16(0), 4);
        assert_eq!(out.u8x16(1), 0);
    }

    #[test]
    fn narrow_saturates_both_sides() {
        let wide = V128::from_i16x8([300, -300, 127, -128, 0, 1, -1, 42]);
        let narrowed = narrow_i16x8_to_i8x16(wide, wide);
        assert_eq!(narrowed.i8x16(0), 127);
        assert_eq!(narrowed.i8x16(1), -128);
        assert_eq!(narrowed.i8x16(2), 127);
        let unsigned = narrow_i16x8_to_u8x16(wide, wide);
        assert_eq!(unsigned.u8x16(0), 255);
        assert_eq!(unsigned.u8x16(1), 0);
    }

    #[test]
    fn bitmask_packs_sign_bits() {
        let a = V128::from_i8x16([
            -1, 0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -128,
        ]);
        assert_eq!(bitmask_i8x16(a), 0b1000_0000_0000_0101u16 as i32);
    }

    #[test]
    fn q15_rounds_and_saturates() {
        let a = V128::from_i16x8([i16::MIN, 1 << 14, 0, 0, 0, 0, 0, 0]);
        let b = V128::from_i16x8([i16::MIN, 1 << 14, 0, 0, 0, 0, 0, 0]);
        let out = q15mulr_sat(a, b);
        assert_eq!(out.i16x8(0), i16::MAX); // MIN*MIN saturates
        assert_eq!(out.i16x8(1), 1 << 13);
    }

    #[test]
    fn extadd_pairs() {
        let a = V128::from_i16x8([1, 2, 3, 4, 5, 6, 7, 8]);
        let out = extadd_pairwise_i16x8_s(a);
        assert_eq!(
            [out.i32x4(0), out.i32x4(1), out.i32x4(2), out.i32x4(3)],
            [3, 7, 11, 15]
        );
    }
}
