//! Bit-exact scalar numeric semantics: trapping and saturating
//! conversions, division edge cases, and float min/max/nearest with the
//! required NaN and signed-zero behavior.

use keel_types::floats;

use crate::{
    Trap,
    TrapKind,
};

/// `div_s` for both integer widths: traps on zero and on
/// `MIN / -1`.
pub(crate) fn div_s<T>(lhs: T, rhs: T) -> Result<T, Trap>
where
    T: Copy + PartialEq + WrappingInt,
{
    if rhs == T::ZERO || (lhs == T::MIN && rhs == T::NEG_ONE) {
        return Err(Trap::new(TrapKind::IntegerDivideByZeroOrOverflow));
    }
    Ok(lhs.wrapping_div(rhs))
}

/// `rem_s`: traps on zero; `MIN % -1` is zero, not a trap.
pub(crate) fn rem_s<T>(lhs: T, rhs: T) -> Result<T, Trap>
where
    T: Copy + PartialEq + WrappingInt,
{
    if rhs == T::ZERO {
        return Err(Trap::new(TrapKind::IntegerDivideByZeroOrOverflow));
    }
    Ok(lhs.wrapping_rem(rhs))
}

/// Signed integer helpers the division paths need.
pub(crate) trait WrappingInt {
    const ZERO: Self;
    const MIN: Self;
    const NEG_ONE: Self;
    fn wrapping_div(self, rhs: Self) -> Self;
    fn wrapping_rem(self, rhs: Self) -> Self;
}

macro_rules! wrapping_int {
    ($ty:ty) => {
        impl WrappingInt for $ty {
            const ZERO: Self = 0;
            const MIN: Self = <$ty>::MIN;
            const NEG_ONE: Self = -1;

            fn wrapping_div(self, rhs: Self) -> Self {
                <$ty>::wrapping_div(self, rhs)
            }

            fn wrapping_rem(self, rhs: Self) -> Self {
                <$ty>::wrapping_rem(self, rhs)
            }
        }
    };
}

wrapping_int!(i32);
wrapping_int!(i64);

/// Unsigned division, trapping on zero.
pub(crate) fn div_u<T>(lhs: T, rhs: T) -> Result<T, Trap>
where
    T: Copy + PartialEq + From<u8> + std::ops::Div<Output = T>,
{
    if rhs == T::from(0) {
        return Err(Trap::new(TrapKind::IntegerDivideByZeroOrOverflow));
    }
    Ok(lhs / rhs)
}

/// Unsigned remainder, trapping on zero.
pub(crate) fn rem_u<T>(lhs: T, rhs: T) -> Result<T, Trap>
where
    T: Copy + PartialEq + From<u8> + std::ops::Rem<Output = T>,
{
    if rhs == T::from(0) {
        return Err(Trap::new(TrapKind::IntegerDivideByZeroOrOverflow));
    }
    Ok(lhs % rhs)
}

macro_rules! trunc_checked {
    ($name:ident, $float:ty, $int:ty) => {
        /// Trapping float-to-int truncation.
        pub(crate) fn $name(value: $float) -> Result<$int, Trap> {
            if value.is_nan() {
                return Err(Trap::new(TrapKind::InvalidFloatOperation));
            }
            let truncated = value.trunc();
            // The comparison happens in the float domain; the exact
            // bounds are the nearest representable values outside the
            // integer range.
            if truncated < <$int>::MIN as $float || truncated >= exclusive_max::<$int, $float>()
            {
                return Err(Trap::new(TrapKind::InvalidFloatOperation));
            }
            Ok(truncated as $int)
        }
    };
}

/// The smallest float strictly above `I::MAX`, used as the exclusive
/// upper bound of a trapping truncation.
fn exclusive_max<I, F>() -> F
where
    I: Bounded,
    F: FromExp2,
{
    F::from_exp2(I::BITS_MINUS_SIGN)
}

pub(crate) trait Bounded {
    const BITS_MINUS_SIGN: i32;
}

impl Bounded for i32 {
    const BITS_MINUS_SIGN: i32 = 31;
}
impl Bounded for u32 {
    const BITS_MINUS_SIGN: i32 = 32;
}
impl Bounded for i64 {
    const BITS_MINUS_SIGN: i32 = 63;
}
impl Bounded for u64 {
    const BITS_MINUS_SIGN: i32 = 64;
}

pub(crate) trait FromExp2 {
    fn from_exp2(exp: i32) -> Self;
}

impl FromExp2 for f32 {
    fn from_exp2(exp: i32) -> Self {
        (2.0f64.powi(exp)) as f32
    }
}

impl FromExp2 for f64 {
    fn from_exp2(exp: i32) -> Self {
        2.0f64.powi(exp)
    }
}

trunc_checked!(trunc_f32_to_i32, f32, i32);
trunc_checked!(trunc_f32_to_u32, f32, u32);
trunc_checked!(trunc_f64_to_i32, f64, i32);
trunc_checked!(trunc_f64_to_u32, f64, u32);
trunc_checked!(trunc_f32_to_i64, f32, i64);
trunc_checked!(trunc_f32_to_u64, f32, u64);
trunc_checked!(trunc_f64_to_i64, f64, i64);
trunc_checked!(trunc_f64_to_u64, f64, u64);

macro_rules! trunc_sat {
    ($name:ident, $float:ty, $int:ty) => {
        /// Saturating float-to-int truncation: NaN to zero, out-of-range
        /// to the nearest bound.
        pub(crate) fn $name(value: $float) -> $int {
            // `as` casts already saturate and map NaN to zero.
            value as $int
        }
    };
}

trunc_sat!(trunc_sat_f32_to_i32, f32, i32);
trunc_sat!(trunc_sat_f32_to_u32, f32, u32);
trunc_sat!(trunc_sat_f64_to_i32, f64, i32);
trunc_sat!(trunc_sat_f64_to_u32, f64, u32);
trunc_sat!(trunc_sat_f32_to_i64, f32, i64);
trunc_sat!(trunc_sat_f32_to_u64, f32, u64);
trunc_sat!(trunc_sat_f64_to_i64, f64, i64);
trunc_sat!(trunc_sat_f64_to_u64, f64, u64);

macro_rules! float_lattice {
    ($fmin:ident, $fmax:ident, $nearest:ident, $ty:ty, $canon:path) => {
        /// `min` with NaN propagation and `-0 < +0`.
        pub(crate) fn $fmin(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                return $canon(<$ty>::NAN);
            }
            if a < b {
                a
            } else if b < a {
                b
            } else if a.is_sign_negative() {
                a
            } else {
                b
            }
        }

        /// `max` with NaN propagation and `-0 < +0`.
        pub(crate) fn $fmax(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                return $canon(<$ty>::NAN);
            }
            if a > b {
                a
            } else if b > a {
                b
            } else if a.is_sign_positive() {
                a
            } else {
                b
            }
        }

        /// Round to nearest, ties to even, preserving the sign of zero.
        pub(crate) fn $nearest(value: $ty) -> $ty {
            let rounded = value.round();
            let result = if (value - value.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
                rounded - value.signum()
            } else {
                rounded
            };
            if result == 0.0 {
                (0.0 as $ty).copysign(value)
            } else {
                result
            }
        }
    };
}

float_lattice!(fmin32, fmax32, nearest32, f32, floats::canonicalize_f32);
float_lattice!(fmin64, fmax64, nearest64, f64, floats::canonicalize_f64);

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn signed_division_edges() {
        assert_eq!(div_s(7i32, -2).unwrap(), -3);
        assert!(div_s(1i32, 0).is_err());
        assert!(div_s(i32::MIN, -1).is_err());
        assert_eq!(rem_s(i32::MIN, -1).unwrap(), 0);
        assert!(div_s(i64::MIN, -1).is_err());
    }

    #[rstest]
    #[case(2147483520.0, true)] // largest f32 below i32::MAX
    #[case(2147483648.0, false)] // 2^31, first out of range
    #[case(-2147483648.0, true)] // i32::MIN is exactly representable
    #[case(-2147483904.0, false)]
    fn trapping_truncation_bounds(#[case] value: f32, #[case] ok: bool) {
        assert_eq!(trunc_f32_to_i32(value).is_ok(), ok);
    }

    #[test]
    fn truncation_rejects_nan() {
        assert!(trunc_f64_to_i64(f64::NAN).is_err());
        assert_eq!(trunc_sat_f64_to_i64(f64::NAN), 0);
    }

    #[test]
    fn saturation_clamps() {
        assert_eq!(trunc_sat_f32_to_u32(-1.0), 0);
        assert_eq!(trunc_sat_f32_to_i32(3.0e10), i32::MAX);
        assert_eq!(trunc_sat_f64_to_u64(2.0e20), u64::MAX);
    }

    #[test]
    fn min_max_handle_signed_zero_and_nan() {
        assert!(fmin32(f32::NAN, 1.0).is_nan());
        assert_eq!(fmin32(-0.0, 0.0).to_bits(), (-0.0f32).to_bits());
        assert_eq!(fmax32(-0.0, 0.0).to_bits(), (0.0f32).to_bits());
        assert_eq!(fmax64(3.0, 7.0), 7.0);
    }

    #[test]
    fn nearest_ties_to_even() {
        assert_eq!(nearest32(2.5), 2.0);
        assert_eq!(nearest32(3.5), 4.0);
        assert_eq!(nearest64(-2.5), -2.0);
        assert_eq!(nearest64(0.5), 0.0);
    }
}
