use super::pool::ProtocolKind;
use super::{concentrated, constant_product};
use crate::logic::math::{MathError, mul_div};
use alloy_primitives::U256;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("pool has no liquidity in the requested direction")]
    NoLiquidity,
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Result of an exact-input swap simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Input actually consumed. Smaller than requested only on a partial fill.
    pub amount_in: U256,
    pub amount_out: U256,
    pub partial: bool,
}

impl SwapOutcome {
    pub fn empty() -> Self {
        Self { amount_in: U256::ZERO, amount_out: U256::ZERO, partial: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantProductState {
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Price, in-range liquidity and the initialized ticks of every bitmap word that was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcentratedState {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub tick_spacing: i32,
    /// liquidityNet per initialized tick
    pub ticks: BTreeMap<i32, i128>,
    /// Bitmap words whose initialized ticks are all present in `ticks`
    pub loaded_words: RangeInclusive<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolState {
    ConstantProduct(ConstantProductState),
    ConcentratedLiquidity(ConcentratedState),
}

impl PoolState {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            PoolState::ConstantProduct(_) => ProtocolKind::ConstantProduct,
            PoolState::ConcentratedLiquidity(_) => ProtocolKind::ConcentratedLiquidity,
        }
    }

    pub fn swap_exact_in(&self, zero_for_one: bool, amount_in: U256, fee: u32) -> Result<SwapOutcome, SwapError> {
        match self {
            PoolState::ConstantProduct(state) => {
                let (reserve_in, reserve_out) = state.oriented(zero_for_one);
                let amount_out = constant_product::get_amount_out(amount_in, reserve_in, reserve_out, fee)?;
                Ok(SwapOutcome { amount_in, amount_out, partial: false })
            }
            PoolState::ConcentratedLiquidity(state) => concentrated::swap_exact_in(state, zero_for_one, amount_in, fee),
        }
    }

    pub fn probe_rate(&self, zero_for_one: bool, amount_in: U256, fee: u32) -> f64 {
        match self {
            PoolState::ConstantProduct(state) => {
                let (reserve_in, reserve_out) = state.oriented(zero_for_one);
                constant_product::probe_rate(amount_in, reserve_in, reserve_out, fee)
            }
            PoolState::ConcentratedLiquidity(state) => concentrated::probe_rate(state, zero_for_one, amount_in, fee),
        }
    }

    /// Output per unit of input at the current price, before fees.
    pub fn spot_price(&self, zero_for_one: bool) -> f64 {
        match self {
            PoolState::ConstantProduct(state) => {
                let (reserve_in, reserve_out) = state.oriented(zero_for_one);
                constant_product::spot_price(reserve_in, reserve_out)
            }
            PoolState::ConcentratedLiquidity(state) => concentrated::spot_price(state, zero_for_one),
        }
    }

    /// Input-side reserve, virtual for concentrated pools. Bounds the trade sizes worth trying.
    pub fn reserve_in(&self, zero_for_one: bool) -> U256 {
        match self {
            PoolState::ConstantProduct(state) => state.oriented(zero_for_one).0,
            PoolState::ConcentratedLiquidity(state) => {
                let q96 = U256::from(1) << 96;
                let liquidity = U256::from(state.liquidity);
                let reserve = if zero_for_one {
                    mul_div(liquidity, q96, state.sqrt_price_x96)
                } else {
                    mul_div(liquidity, state.sqrt_price_x96, q96)
                };
                reserve.unwrap_or(U256::MAX)
            }
        }
    }

    pub fn has_liquidity(&self) -> bool {
        match self {
            PoolState::ConstantProduct(state) => !state.reserve0.is_zero() && !state.reserve1.is_zero(),
            PoolState::ConcentratedLiquidity(state) => state.liquidity > 0 || !state.ticks.is_empty(),
        }
    }
}

impl ConstantProductState {
    pub fn oriented(&self, zero_for_one: bool) -> (U256, U256) {
        if zero_for_one { (self.reserve0, self.reserve1) } else { (self.reserve1, self.reserve0) }
    }
}

/// Pool state as read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub state: PoolState,
    pub block_number: Option<u64>,
    pub refreshed_at: Instant,
}

impl PoolSnapshot {
    pub fn new(state: PoolState, block_number: Option<u64>) -> Self {
        Self { state, block_number, refreshed_at: Instant::now() }
    }

    pub fn constant_product(reserve0: U256, reserve1: U256) -> Self {
        Self::new(PoolState::ConstantProduct(ConstantProductState { reserve0, reserve1 }), None)
    }

    pub fn is_fresh(&self, max_age: std::time::Duration) -> bool {
        self.refreshed_at.elapsed() <= max_age
    }
}
