//! 16.16 fixed-point arithmetic.
//!
//! * `fixed_mul` keeps the full 64-bit product and wraps on overflow, like
//!   the original engine.
//! * `fixed_div` **saturates** when the quotient cannot be represented and
//!   only reports an error for a zero divisor.

use thiserror::Error;

/// 32-bit value with 16 fractional bits.
pub type Fixed = i32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedError {
    #[error("fixed_div: divide by zero ({0:#x} / 0)")]
    DivideByZero(Fixed),

    #[error("fixed_div2: quotient of {0:#x} / {1:#x} out of range")]
    Overflow(Fixed, Fixed),
}

/// Convert whole map units to fixed point.
#[inline(always)]
pub const fn to_fixed(units: i32) -> Fixed {
    units << FRACBITS
}

/// `a * b` in 16.16, rounding toward negative infinity.
#[inline(always)]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

/// `a / b` in 16.16.
///
/// Quotients that would not fit are clamped to `Fixed::MAX` / `Fixed::MIN`
/// (sign taken from the operands) instead of failing.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Result<Fixed, FixedError> {
    if b == 0 {
        return Err(FixedError::DivideByZero(a));
    }
    if (a.unsigned_abs() >> 14) >= b.unsigned_abs() {
        return Ok(if (a ^ b) < 0 { Fixed::MIN } else { Fixed::MAX });
    }
    fixed_div2(a, b)
}

/// Unchecked-range division: the exact quotient truncated toward zero.
pub fn fixed_div2(a: Fixed, b: Fixed) -> Result<Fixed, FixedError> {
    if b == 0 {
        return Err(FixedError::DivideByZero(a));
    }
    let q = ((a as i64) << FRACBITS) / b as i64;
    Fixed::try_from(q).map_err(|_| FixedError::Overflow(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mul_basics() {
        assert_eq!(fixed_mul(FRACUNIT, FRACUNIT), FRACUNIT);
        assert_eq!(fixed_mul(3 * FRACUNIT, FRACUNIT / 2), 3 * FRACUNIT / 2);
        assert_eq!(fixed_mul(-FRACUNIT, 2 * FRACUNIT), -2 * FRACUNIT);
        // arithmetic shift: -1 * 1/65536 rounds down, not toward zero
        assert_eq!(fixed_mul(-1, 1), -1);
    }

    #[test]
    fn mul_wraps_instead_of_failing() {
        let big = to_fixed(40_000);
        assert_eq!(fixed_mul(big, big), ((big as i64 * big as i64) >> 16) as i32);
    }

    #[test]
    fn div_basics() {
        assert_eq!(fixed_div(FRACUNIT, 2 * FRACUNIT), Ok(FRACUNIT / 2));
        assert_eq!(fixed_div(-6 * FRACUNIT, 3 * FRACUNIT), Ok(-2 * FRACUNIT));
        assert_eq!(fixed_div(0, 7), Ok(0));
    }

    #[test]
    fn div_saturates_on_overflow() {
        assert_eq!(fixed_div(0x7fff_ffff, 1), Ok(Fixed::MAX));
        assert_eq!(fixed_div(-0x7fff_ffff, 1), Ok(Fixed::MIN));
        assert_eq!(fixed_div(0x7fff_ffff, -1), Ok(Fixed::MIN));
        assert_eq!(fixed_div(Fixed::MIN, 1), Ok(Fixed::MIN));
        assert_eq!(fixed_div(4 * FRACUNIT, 1), Ok(Fixed::MAX));
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert_eq!(fixed_div(5, 0), Err(FixedError::DivideByZero(5)));
        assert_eq!(fixed_div(-1, 0), Err(FixedError::DivideByZero(-1)));
        // zero over zero is not special-cased
        assert_eq!(fixed_div(0, 0), Err(FixedError::DivideByZero(0)));
        assert_eq!(fixed_div2(0, 0), Err(FixedError::DivideByZero(0)));
        assert!(fixed_div2(FRACUNIT, 0).is_err());
    }

    #[test]
    fn div2_reports_overflow() {
        assert_eq!(fixed_div2(0x7fff_ffff, 1), Err(FixedError::Overflow(0x7fff_ffff, 1)));
    }

    proptest! {
        #[test]
        fn div_matches_div2_in_range(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(b != 0);
            prop_assume!((a.unsigned_abs() >> 14) < b.unsigned_abs());
            prop_assert_eq!(fixed_div(a, b), fixed_div2(a, b));
        }

        #[test]
        fn div_never_fails_for_nonzero_divisor(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(b != 0);
            prop_assert!(fixed_div(a, b).is_ok());
        }

        #[test]
        fn div2_tracks_float_quotient(a in -0x0100_0000i32..0x0100_0000, b in 0x1000i32..0x0100_0000) {
            let q = fixed_div2(a, b).unwrap();
            let f = a as f64 / b as f64 * FRACUNIT as f64;
            prop_assert!((q as f64 - f.trunc()).abs() <= 1.0);
        }
    }
}
