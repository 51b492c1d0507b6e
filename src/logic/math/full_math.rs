use super::MathError;
use alloy_primitives::{U256, U512};

pub(super) fn widen(value: U256) -> U512 {
    U512::from_limbs_slice(value.as_limbs())
}

pub(super) fn narrow(value: U512) -> Result<U256, MathError> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return Err(MathError::Overflow);
    }
    Ok(U256::from_limbs_slice(&limbs[..4]))
}

/// floor(a * b / denominator) with a 512-bit intermediate product.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    narrow(widen(a) * widen(b) / widen(denominator))
}

/// ceil(a * b / denominator) with a 512-bit intermediate product.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = widen(a) * widen(b);
    let denominator = widen(denominator);
    let (quotient, remainder) = product.div_rem(denominator);
    let result = narrow(quotient)?;
    if remainder.is_zero() { Ok(result) } else { result.checked_add(U256::from(1)).ok_or(MathError::Overflow) }
}

/// ceil(a / b)
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() { Ok(quotient) } else { Ok(quotient + U256::from(1)) }
}

/// Integer square root, rounded down.
pub fn sqrt_512(value: U512) -> U512 {
    if value.is_zero() {
        return U512::ZERO;
    }
    let mut x = U512::from(1u8) << value.bit_len().div_ceil(2);
    loop {
        let y = (x + value / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_with_phantom_overflow() {
        let q128 = U256::from(1) << 128;
        // product exceeds 256 bits but the result does not
        assert_eq!(mul_div(q128, U256::from(35) * q128, U256::from(8) * q128).unwrap(), U256::from(4375) * q128 / U256::from(1000));
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::MAX).unwrap(), U256::MAX);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div(U256::from(1), U256::from(1), U256::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::from(1)), Err(MathError::Overflow));
    }

    #[test]
    fn test_rounding_up() {
        assert_eq!(mul_div_rounding_up(U256::from(7), U256::from(3), U256::from(2)).unwrap(), U256::from(11));
        assert_eq!(mul_div_rounding_up(U256::from(6), U256::from(3), U256::from(2)).unwrap(), U256::from(9));
        assert_eq!(mul_div_rounding_up(U256::MAX, U256::MAX, U256::MAX - U256::from(1)), Err(MathError::Overflow));
        assert_eq!(div_rounding_up(U256::from(7), U256::from(2)).unwrap(), U256::from(4));
        assert_eq!(div_rounding_up(U256::from(8), U256::from(2)).unwrap(), U256::from(4));
    }

    #[test]
    fn test_sqrt_512() {
        assert_eq!(sqrt_512(U512::from(0u8)), U512::ZERO);
        assert_eq!(sqrt_512(U512::from(15u8)), U512::from(3u8));
        assert_eq!(sqrt_512(U512::from(16u8)), U512::from(4u8));
        let big = U512::from(1u8) << 400;
        assert_eq!(sqrt_512(big), U512::from(1u8) << 200);
    }
}
