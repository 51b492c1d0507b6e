use super::MathError;
use super::full_math::{div_rounding_up, mul_div, mul_div_rounding_up, narrow, sqrt_512, widen};
use alloy_primitives::U256;

const RESOLUTION: usize = 96;

fn q96() -> U256 {
    U256::from(1) << RESOLUTION
}

fn max_u160() -> U256 {
    (U256::from(1) << 160) - U256::from(1)
}

/// Next sqrt price after adding `amount_in` of the input token, rounding in the pool's favour.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtPriceOutOfRange);
    }
    if liquidity == 0 {
        return Err(MathError::ZeroLiquidity);
    }
    if zero_for_one {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in)
    } else {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in)
    }
}

// price moves down: sqrtP' = L * sqrtP / (L + amount * sqrtP)
fn next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96: U256, liquidity: u128, amount: U256) -> Result<U256, MathError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    let numerator1 = U256::from(liquidity) << RESOLUTION;

    let (product, overflow) = amount.overflowing_mul(sqrt_price_x96);
    if !overflow {
        let (denominator, overflow) = numerator1.overflowing_add(product);
        if !overflow {
            return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator);
        }
    }

    let denominator = (numerator1 / sqrt_price_x96).checked_add(amount).ok_or(MathError::Overflow)?;
    div_rounding_up(numerator1, denominator)
}

// price moves up: sqrtP' = sqrtP + amount / L
fn next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96: U256, liquidity: u128, amount: U256) -> Result<U256, MathError> {
    let liquidity = U256::from(liquidity);
    let quotient = if amount <= max_u160() {
        (amount << RESOLUTION) / liquidity
    } else {
        mul_div(amount, q96(), liquidity)?
    };

    let next = sqrt_price_x96.checked_add(quotient).ok_or(MathError::Overflow)?;
    if next > max_u160() {
        return Err(MathError::SqrtPriceOutOfRange);
    }
    Ok(next)
}

/// Amount of token0 between two sqrt prices: L * (sqrtB - sqrtA) / (sqrtA * sqrtB).
pub fn get_amount0_delta(sqrt_ratio_a_x96: U256, sqrt_ratio_b_x96: U256, liquidity: u128, round_up: bool) -> Result<U256, MathError> {
    let (lower, upper) = if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    } else {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96)
    };
    if lower.is_zero() {
        return Err(MathError::SqrtPriceOutOfRange);
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = upper - lower;

    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower)
    } else {
        Ok(mul_div(numerator1, numerator2, upper)? / lower)
    }
}

/// Amount of token1 between two sqrt prices: L * (sqrtB - sqrtA).
pub fn get_amount1_delta(sqrt_ratio_a_x96: U256, sqrt_ratio_b_x96: U256, liquidity: u128, round_up: bool) -> Result<U256, MathError> {
    let (lower, upper) = if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
    } else {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96)
    };

    if round_up {
        mul_div_rounding_up(U256::from(liquidity), upper - lower, q96())
    } else {
        mul_div(U256::from(liquidity), upper - lower, q96())
    }
}

/// sqrt(amount1 / amount0) * 2^96, the price a pool initialised with these amounts would hold.
pub fn sqrt_price_x96_from_amounts(amount0: U256, amount1: U256) -> Result<U256, MathError> {
    if amount0.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let ratio_x192 = (widen(amount1) << (2 * RESOLUTION)) / widen(amount0);
    narrow(sqrt_512(ratio_x192))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_to_18_decimals(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_sqrt_price_from_amounts() {
        assert_eq!(sqrt_price_x96_from_amounts(U256::from(1), U256::from(1)).unwrap(), q96());
        assert_eq!(sqrt_price_x96_from_amounts(U256::from(1), U256::from(4)).unwrap(), q96() * U256::from(2));
        assert_eq!(sqrt_price_x96_from_amounts(U256::from(4), U256::from(1)).unwrap(), q96() / U256::from(2));
        assert_eq!(sqrt_price_x96_from_amounts(U256::ZERO, U256::from(1)), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_next_price_from_zero_input_is_unchanged() {
        let price = q96();
        assert_eq!(get_next_sqrt_price_from_input(price, 1_000, U256::ZERO, true).unwrap(), price);
        assert_eq!(get_next_sqrt_price_from_input(price, 1_000, U256::ZERO, false).unwrap(), price);
    }

    #[test]
    fn test_next_price_moves_in_swap_direction() {
        let price = q96();
        let liquidity = 10u128.pow(18);
        let amount = U256::from(10u64.pow(17));

        let down = get_next_sqrt_price_from_input(price, liquidity, amount, true).unwrap();
        let up = get_next_sqrt_price_from_input(price, liquidity, amount, false).unwrap();
        assert!(down < price);
        assert!(up > price);

        // amount1 path: sqrtP + amount / L = 1.1 * 2^96
        assert_eq!(up, q96() + q96() / U256::from(10));
    }

    #[test]
    fn test_next_price_requires_liquidity() {
        assert_eq!(get_next_sqrt_price_from_input(q96(), 0, U256::from(1), true), Err(MathError::ZeroLiquidity));
    }

    #[test]
    fn test_amount_deltas() {
        let price_a = q96();
        let price_b = q96() * U256::from(2);
        let liquidity = expand_to_18_decimals(1).to::<u128>();

        // token0: L * (1/sqrtA - 1/sqrtB) = L / 2
        let amount0_down = get_amount0_delta(price_a, price_b, liquidity, false).unwrap();
        let amount0_up = get_amount0_delta(price_b, price_a, liquidity, true).unwrap();
        assert_eq!(amount0_down, U256::from(500_000_000_000_000_000u64));
        assert_eq!(amount0_up, amount0_down);

        // token1: L * (sqrtB - sqrtA) = L
        let amount1_down = get_amount1_delta(price_a, price_b, liquidity, false).unwrap();
        let amount1_up = get_amount1_delta(price_b, price_a, liquidity, true).unwrap();
        assert_eq!(amount1_down, U256::from(liquidity));
        assert_eq!(amount1_up, amount1_down);

        assert_eq!(get_amount0_delta(price_a, price_a, liquidity, true).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_amount_delta_rounding() {
        // L = 1 over [1, 2] in sqrt price: exactly half a unit of token0
        let price_a = q96();
        let price_b = q96() * U256::from(2);
        assert_eq!(get_amount0_delta(price_a, price_b, 1, false).unwrap(), U256::ZERO);
        assert_eq!(get_amount0_delta(price_a, price_b, 1, true).unwrap(), U256::from(1));
    }
}
