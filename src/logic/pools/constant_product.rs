use super::state::SwapError;
use crate::logic::math::{MathError, mul_div};
use crate::utils::constants::FEE_DENOMINATOR;
use crate::utils::token::u256_to_f64;
use alloy_primitives::{Address, B256, U256, keccak256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error("identical token addresses {0}")]
    IdenticalAddresses(Address),
    #[error("zero token address")]
    ZeroAddress,
}

/// Output of an exact-input swap against `x * y = k`, rounded down as the pair contract does.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee: u32) -> Result<U256, SwapError> {
    if amount_in.is_zero() {
        return Ok(U256::ZERO);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapError::NoLiquidity);
    }

    let fee_denominator = U256::from(FEE_DENOMINATOR);
    let amount_in_with_fee = amount_in.checked_mul(fee_denominator - U256::from(fee)).ok_or(MathError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(fee_denominator)
        .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
        .ok_or(MathError::Overflow)?;

    Ok(mul_div(amount_in_with_fee, reserve_out, denominator)?)
}

/// Chained outputs along a route of `(reserve_in, reserve_out)` pairs. The first element is `amount_in`.
pub fn get_amounts_out(amount_in: U256, reserves: &[(U256, U256)], fee: u32) -> Result<Vec<U256>, SwapError> {
    let mut amounts = Vec::with_capacity(reserves.len() + 1);
    amounts.push(amount_in);
    let mut amount = amount_in;
    for (reserve_in, reserve_out) in reserves {
        amount = get_amount_out(amount, *reserve_in, *reserve_out, fee)?;
        amounts.push(amount);
    }
    Ok(amounts)
}

/// Marginal rate for a trade of `amount_in`, computed in floating point so tiny raw reserves keep precision.
pub fn probe_rate(amount_in: U256, reserve_in: U256, reserve_out: U256, fee: u32) -> f64 {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return 0.0;
    }
    let gamma = 1.0 - fee as f64 / FEE_DENOMINATOR as f64;
    let reserve_in = u256_to_f64(reserve_in);
    gamma * u256_to_f64(reserve_out) / (reserve_in + gamma * u256_to_f64(amount_in))
}

pub fn spot_price(reserve_in: U256, reserve_out: U256) -> f64 {
    if reserve_in.is_zero() {
        return 0.0;
    }
    u256_to_f64(reserve_out) / u256_to_f64(reserve_in)
}

pub fn sort_tokens(token_a: Address, token_b: Address) -> Result<(Address, Address), PairError> {
    if token_a == token_b {
        return Err(PairError::IdenticalAddresses(token_a));
    }
    let (token0, token1) = if token_a < token_b { (token_a, token_b) } else { (token_b, token_a) };
    if token0.is_zero() {
        return Err(PairError::ZeroAddress);
    }
    Ok((token0, token1))
}

/// CREATE2 address of the pair for two tokens under a V2-style factory.
pub fn pair_for(factory: Address, token_a: Address, token_b: Address, init_code_hash: B256) -> Result<Address, PairError> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;
    let mut packed = [0u8; 40];
    packed[..20].copy_from_slice(token0.as_slice());
    packed[20..].copy_from_slice(token1.as_slice());
    let salt = keccak256(packed);
    Ok(factory.create2(salt, init_code_hash))
}
