use crate::data_sync::abi::CodecError;
use crate::data_sync::rpc_error::RpcError;
use crate::logic::math::MathError;
use crate::logic::pools::{PoolSnapshot, PoolWrapper, SwapError};
use crate::utils::token::{Token, u256_to_f64};
use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("no liquidity for {asset_in} -> {asset_out}")]
    NoLiquidity { asset_in: Address, asset_out: Address },
    #[error("pool {pool} does not trade {token}")]
    TokenNotInPool { pool: Address, token: Address },
    #[error("unknown pool {0}")]
    UnknownPool(Address),
    #[error("pool {pool} returned {kind} state")]
    StateMismatch { pool: Address, kind: String },
    #[error("concentrated pool {0} has no tick spacing")]
    MissingTickSpacing(Address),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl QuoteError {
    pub fn from_swap(error: SwapError, asset_in: Address, asset_out: Address) -> Self {
        match error {
            SwapError::NoLiquidity => QuoteError::NoLiquidity { asset_in, asset_out },
            SwapError::Math(e) => QuoteError::Math(e),
        }
    }

    /// Failures that say something about the pool itself rather than about the request.
    pub fn degrades_pool(&self) -> bool {
        matches!(self, QuoteError::Rpc(_) | QuoteError::Codec(_) | QuoteError::StateMismatch { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Full,
    /// Input the pool could not absorb within its known liquidity
    Partial { unfilled_in: U256 },
}

/// Immutable result of pricing one swap against one pool snapshot.
/// A stale quote is replaced, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub pool: PoolWrapper,
    pub asset_in: Arc<Token>,
    pub asset_out: Arc<Token>,
    pub amount_in: U256,
    pub amount_out: U256,
    /// 1 - (amount_out / amount_in) / spot_price
    pub price_impact: f64,
    /// Fee-inclusive output per unit of input at `amount_in`
    pub rate: f64,
    /// Output per unit of input at the pool price before fees
    pub spot_price: f64,
    pub fill: Fill,
    pub block_number: Option<u64>,
    /// Refresh time of the snapshot this quote was priced from
    pub as_of: Instant,
}

impl Quote {
    /// Price an exact-input swap of `amount_in` of `asset_in` against `snapshot`.
    pub fn from_snapshot(pool: &PoolWrapper, snapshot: &PoolSnapshot, asset_in: &Address, amount_in: U256) -> Result<Quote, QuoteError> {
        let zero_for_one = pool.zero_for_one(asset_in).ok_or(QuoteError::TokenNotInPool { pool: pool.get_address(), token: *asset_in })?;
        let (token_in, token_out) =
            if zero_for_one { (pool.get_token0(), pool.get_token1()) } else { (pool.get_token1(), pool.get_token0()) };

        if !pool.state_matches_kind(&snapshot.state) {
            return Err(QuoteError::StateMismatch { pool: pool.get_address(), kind: snapshot.state.kind().to_string() });
        }

        let outcome = pool
            .swap_exact_in(snapshot, zero_for_one, amount_in)
            .map_err(|e| QuoteError::from_swap(e, token_in.get_address(), token_out.get_address()))?;

        let spot_price = pool.spot_price(snapshot, zero_for_one);
        let rate = pool.probe_rate(snapshot, zero_for_one, amount_in);
        let price_impact = if outcome.amount_in.is_zero() || spot_price == 0.0 {
            0.0
        } else {
            1.0 - (u256_to_f64(outcome.amount_out) / u256_to_f64(outcome.amount_in)) / spot_price
        };
        let fill = if outcome.partial { Fill::Partial { unfilled_in: amount_in - outcome.amount_in } } else { Fill::Full };

        Ok(Quote {
            pool: pool.clone(),
            asset_in: token_in.clone(),
            asset_out: token_out.clone(),
            amount_in,
            amount_out: outcome.amount_out,
            price_impact,
            rate,
            spot_price,
            fill,
            block_number: snapshot.block_number,
            as_of: snapshot.refreshed_at,
        })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.fill, Fill::Partial { .. })
    }

    /// Edge weight used by the path finder: -ln(rate). `None` when the rate is unusable.
    pub fn weight(&self) -> Option<f64> {
        if self.rate.is_finite() && self.rate > 0.0 { Some(-self.rate.ln()) } else { None }
    }
}
