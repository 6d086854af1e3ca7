//! Two's-complement arithmetic helpers over arbitrary-precision integers.
//!
//! The wrapping operators, the bitwise operators, and the sized-integer casts
//! are all defined in terms of the N-bit two's-complement representation of a
//! value. These helpers round-trip values through that representation.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

/// Reduce `value` modulo `2^bits` and reinterpret the result as a `bits`-wide
/// two's-complement quantity, signed or unsigned. This is the little-endian
/// truncate-or-sign-extend byte round-trip in arithmetic form.
pub fn wrap_to_width(value: &BigInt, bits: u64, signed: bool) -> BigInt {
    debug_assert!(bits > 0);
    let modulus = BigInt::one() << bits;
    let mut wrapped = value % &modulus;
    if wrapped.is_negative() {
        wrapped += &modulus;
    }
    if signed && wrapped >= (BigInt::one() << (bits - 1)) {
        wrapped -= &modulus;
    }
    wrapped
}

/// The non-negative `bits`-wide two's-complement representation of `value`.
fn to_twos(value: &BigInt, bits: u64) -> BigInt {
    wrap_to_width(value, bits, false)
}

pub fn bit_and(lhs: &BigInt, rhs: &BigInt, bits: u64, signed: bool) -> BigInt {
    wrap_to_width(&(to_twos(lhs, bits) & to_twos(rhs, bits)), bits, signed)
}

pub fn bit_or(lhs: &BigInt, rhs: &BigInt, bits: u64, signed: bool) -> BigInt {
    wrap_to_width(&(to_twos(lhs, bits) | to_twos(rhs, bits)), bits, signed)
}

pub fn bit_xor(lhs: &BigInt, rhs: &BigInt, bits: u64, signed: bool) -> BigInt {
    wrap_to_width(&(to_twos(lhs, bits) ^ to_twos(rhs, bits)), bits, signed)
}

pub fn bit_not(value: &BigInt, bits: u64, signed: bool) -> BigInt {
    let mask = (BigInt::one() << bits) - BigInt::one();
    wrap_to_width(&(to_twos(value, bits) ^ mask), bits, signed)
}

/// Logical shift left reduced to the result width.
pub fn shift_left(value: &BigInt, count: u64, bits: u64, signed: bool) -> BigInt {
    if count >= bits {
        return BigInt::zero();
    }
    wrap_to_width(&(value << count), bits, signed)
}

/// Shift right with sign extension. For a value within its type's range this
/// equals floor division by `2^count`, which `BigInt`'s shift implements.
pub fn shift_right(value: &BigInt, count: u64) -> BigInt {
    if count > u32::MAX as u64 {
        // Shifting everything out: negative values saturate at -1, others 0.
        return if value.is_negative() {
            -BigInt::one()
        } else {
            BigInt::zero()
        };
    }
    value >> count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> BigInt {
        BigInt::from(value)
    }

    #[test]
    fn wrap_reduces_modulo_width() {
        assert_eq!(wrap_to_width(&int(256), 8, false), int(0));
        assert_eq!(wrap_to_width(&int(257), 8, false), int(1));
        assert_eq!(wrap_to_width(&int(-1), 8, false), int(255));
    }

    #[test]
    fn wrap_signed_reinterprets_high_bit() {
        assert_eq!(wrap_to_width(&int(128), 8, true), int(-128));
        assert_eq!(wrap_to_width(&int(255), 8, true), int(-1));
        assert_eq!(wrap_to_width(&int(127), 8, true), int(127));
    }

    #[test]
    fn wrapping_subtract_from_zero() {
        // 0 -% 1 == 255 for u8.
        assert_eq!(wrap_to_width(&int(0 - 1), 8, false), int(255));
    }

    #[test]
    fn truncating_cast_preserves_low_bits() {
        // (:u8) 0x1234 == 0x34
        assert_eq!(wrap_to_width(&int(0x1234), 8, false), int(0x34));
        // (:s8) 0xFF == -1
        assert_eq!(wrap_to_width(&int(0xff), 8, true), int(-1));
    }

    #[test]
    fn extending_cast_preserves_value() {
        assert_eq!(wrap_to_width(&int(-1), 64, true), int(-1));
        assert_eq!(wrap_to_width(&int(200), 64, false), int(200));
    }

    #[test]
    fn sign_to_unsign_cast_is_bit_exact() {
        // (:u16) -1s16 == 65535
        assert_eq!(wrap_to_width(&int(-1), 16, false), int(65535));
    }

    #[test]
    fn bitwise_on_negative_uses_twos_complement() {
        // -1 & 0x0F == 0x0F at any width.
        assert_eq!(bit_and(&int(-1), &int(0x0f), 8, true), int(0x0f));
        // ~0 == -1 for signed.
        assert_eq!(bit_not(&int(0), 8, true), int(-1));
        // ~0 == 255 for unsigned 8-bit.
        assert_eq!(bit_not(&int(0), 8, false), int(255));
        assert_eq!(bit_xor(&int(-1), &int(-1), 8, true), int(0));
        assert_eq!(bit_or(&int(0x80), &int(0x01), 8, false), int(0x81));
    }

    #[test]
    fn shift_left_wraps_to_width() {
        assert_eq!(shift_left(&int(1), 7, 8, false), int(128));
        assert_eq!(shift_left(&int(1), 8, 8, false), int(0));
        assert_eq!(shift_left(&int(1), 7, 8, true), int(-128));
    }

    #[test]
    fn shift_right_sign_extends() {
        assert_eq!(shift_right(&int(-8), 1), int(-4));
        assert_eq!(shift_right(&int(-1), 5), int(-1));
        assert_eq!(shift_right(&int(8), 2), int(2));
        assert_eq!(shift_right(&int(1), u64::MAX), int(0));
        assert_eq!(shift_right(&int(-1), u64::MAX), int(-1));
    }
}
