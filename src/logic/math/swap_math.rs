use super::MathError;
use super::full_math::{mul_div, mul_div_rounding_up};
use super::sqrt_price_math::{get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input};
use crate::utils::constants::FEE_DENOMINATOR;
use alloy_primitives::U256;

/// Result of swapping within a single initialized-tick range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x96: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// Exact-input swap step from `sqrt_price_current_x96` toward `sqrt_price_target_x96`.
/// The direction is implied by the ordering of the two prices.
pub fn compute_swap_step(
    sqrt_price_current_x96: U256,
    sqrt_price_target_x96: U256,
    liquidity: u128,
    amount_remaining: U256,
    fee_pips: u32,
) -> Result<SwapStep, MathError> {
    let zero_for_one = sqrt_price_current_x96 >= sqrt_price_target_x96;
    let fee_denominator = U256::from(FEE_DENOMINATOR);
    let fee = U256::from(fee_pips);

    let amount_remaining_less_fee = mul_div(amount_remaining, fee_denominator - fee, fee_denominator)?;

    let amount_in_to_target = if zero_for_one {
        get_amount0_delta(sqrt_price_target_x96, sqrt_price_current_x96, liquidity, true)?
    } else {
        get_amount1_delta(sqrt_price_current_x96, sqrt_price_target_x96, liquidity, true)?
    };

    let sqrt_price_next_x96 = if amount_remaining_less_fee >= amount_in_to_target {
        sqrt_price_target_x96
    } else {
        get_next_sqrt_price_from_input(sqrt_price_current_x96, liquidity, amount_remaining_less_fee, zero_for_one)?
    };

    let reached_target = sqrt_price_next_x96 == sqrt_price_target_x96;

    let (amount_in, amount_out) = if zero_for_one {
        let amount_in = if reached_target {
            amount_in_to_target
        } else {
            get_amount0_delta(sqrt_price_next_x96, sqrt_price_current_x96, liquidity, true)?
        };
        (amount_in, get_amount1_delta(sqrt_price_next_x96, sqrt_price_current_x96, liquidity, false)?)
    } else {
        let amount_in = if reached_target {
            amount_in_to_target
        } else {
            get_amount1_delta(sqrt_price_current_x96, sqrt_price_next_x96, liquidity, true)?
        };
        (amount_in, get_amount0_delta(sqrt_price_current_x96, sqrt_price_next_x96, liquidity, false)?)
    };

    // the remainder of an unfinished step is all fee
    let fee_amount = if !reached_target {
        amount_remaining - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee, fee_denominator - fee)?
    };

    Ok(SwapStep { sqrt_price_next_x96, amount_in, amount_out, fee_amount })
}
