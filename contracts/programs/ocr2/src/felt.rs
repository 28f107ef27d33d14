//! Field elements, the unit every report and report context is encoded in.
//!
//! Values live in `[0, P)` with `P = 2^251 + 17 * 2^192 + 1`. Signed integers
//! are mapped into that range by wrapping negative values around the modulus,
//! so `-1` is encoded as `P - 1`.

use anchor_lang::prelude::*;
use primitive_types::U256;

use crate::ErrorCode;

/// `2^251 + 17 * 2^192 + 1`, little-endian limbs.
pub const MODULUS: U256 = U256([1, 0, 0, 0x0800_0000_0000_0011]);

pub const FELT_SIZE: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Felt(U256);

impl Felt {
    pub const ZERO: Felt = Felt(U256([0, 0, 0, 0]));

    /// Parses a canonical big-endian encoding. Values `>= P` are rejected.
    pub fn from_bytes_be(bytes: &[u8; FELT_SIZE]) -> Result<Self> {
        let value = U256::from_big_endian(bytes);
        require!(value < MODULUS, ErrorCode::InvalidInput);
        Ok(Self(value))
    }

    pub fn to_bytes_be(&self) -> [u8; FELT_SIZE] {
        let mut bytes = [0u8; FELT_SIZE];
        self.0.to_big_endian(&mut bytes);
        bytes
    }

    /// Wraps negative values around the modulus: `x < 0` is encoded as `P + x`.
    pub fn from_i128(value: i128) -> Self {
        if value >= 0 {
            Self(U256::from(value as u128))
        } else {
            // |i128::MIN| = 2^127 is far below P, so this never underflows
            Self(MODULUS - U256::from(value.unsigned_abs()))
        }
    }

    /// Inverse of [`Felt::from_i128`].
    ///
    /// Values in `(i128::MAX, P - 2^127)` have no signed interpretation and are
    /// rejected.
    pub fn to_i128(&self) -> Result<i128> {
        if self.0 <= U256::from(i128::MAX as u128) {
            return Ok(self.0.low_u128() as i128);
        }
        let magnitude = MODULUS - self.0;
        require!(magnitude <= U256::from(1u128 << 127), ErrorCode::InvalidInput);
        // 2^127 wraps onto i128::MIN, which is the intended value
        Ok((magnitude.low_u128() as i128).wrapping_neg())
    }

    pub fn to_u64(&self) -> Result<u64> {
        require!(self.0 <= U256::from(u64::MAX), ErrorCode::InvalidInput);
        Ok(self.0.low_u64())
    }

    pub fn to_u128(&self) -> Result<u128> {
        require!(self.0 <= U256::from(u128::MAX), ErrorCode::InvalidInput);
        Ok(self.0.low_u128())
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modulus_minus(n: u64) -> [u8; FELT_SIZE] {
        let mut bytes = [0u8; FELT_SIZE];
        (MODULUS - U256::from(n)).to_big_endian(&mut bytes);
        bytes
    }

    #[test]
    fn modulus_layout() {
        let mut bytes = [0u8; FELT_SIZE];
        MODULUS.to_big_endian(&mut bytes);
        assert_eq!(&bytes[..8], &[0x08, 0, 0, 0, 0, 0, 0, 0x11]);
        assert_eq!(&bytes[8..31], &[0u8; 23]);
        assert_eq!(bytes[31], 1);
    }

    #[test]
    fn negative_values_wrap_around_the_modulus() {
        assert_eq!(Felt::from_i128(-1).to_bytes_be(), modulus_minus(1));
        assert_eq!(Felt::from_i128(-10).to_bytes_be(), modulus_minus(10));
        assert_eq!(Felt::from_i128(0), Felt::ZERO);

        let mut expected = [0u8; FELT_SIZE];
        expected[31] = 99;
        assert_eq!(Felt::from_i128(99).to_bytes_be(), expected);
    }

    #[test]
    fn signed_boundaries() {
        for value in [
            i128::MIN,
            i128::MIN + 1,
            -1_000_000_000,
            -1,
            0,
            1,
            1_000_000_000,
            i128::MAX - 1,
            i128::MAX,
        ] {
            let felt = Felt::from_i128(value);
            assert_eq!(felt.to_i128().unwrap(), value);
            let parsed = Felt::from_bytes_be(&felt.to_bytes_be()).unwrap();
            assert_eq!(parsed, felt);
        }
    }

    #[test]
    fn ambiguous_range_has_no_signed_value() {
        // one past i128::MAX
        let felt = Felt::from(1u128 << 127);
        assert_eq!(felt.to_i128().unwrap_err(), ErrorCode::InvalidInput.into());

        // one below the encoding of i128::MIN
        let bytes = {
            let mut bytes = [0u8; FELT_SIZE];
            (MODULUS - U256::from(1u128 << 127) - U256::one()).to_big_endian(&mut bytes);
            bytes
        };
        let felt = Felt::from_bytes_be(&bytes).unwrap();
        assert_eq!(felt.to_i128().unwrap_err(), ErrorCode::InvalidInput.into());
    }

    #[test]
    fn non_canonical_encodings_are_rejected() {
        let mut bytes = [0u8; FELT_SIZE];
        MODULUS.to_big_endian(&mut bytes);
        assert_eq!(
            Felt::from_bytes_be(&bytes).unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
        assert_eq!(
            Felt::from_bytes_be(&[0xff; FELT_SIZE]).unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
        assert!(Felt::from_bytes_be(&modulus_minus(1)).is_ok());
    }

    #[test]
    fn unsigned_narrowing() {
        assert_eq!(Felt::from(u64::MAX).to_u64().unwrap(), u64::MAX);
        assert_eq!(
            Felt::from(u64::MAX as u128 + 1).to_u64().unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
        assert_eq!(Felt::from(u128::MAX).to_u128().unwrap(), u128::MAX);
        assert_eq!(
            Felt::from_i128(-1).to_u128().unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
    }
}
