//! Integer math for concentrated-liquidity pools, following the Uniswap V3 core libraries
//! (FullMath, TickMath, SqrtPriceMath, SwapMath). Prices are Q64.96 square roots, fees are pips.

pub mod full_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("tick {0} outside [MIN_TICK, MAX_TICK]")]
    TickOutOfRange(i32),
    #[error("sqrt price outside the valid Q64.96 range")]
    SqrtPriceOutOfRange,
    #[error("liquidity must be non-zero")]
    ZeroLiquidity,
}

pub use full_math::{div_rounding_up, mul_div, mul_div_rounding_up};
pub use sqrt_price_math::{get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input, sqrt_price_x96_from_amounts};
pub use swap_math::{SwapStep, compute_swap_step};
pub use tick_math::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, get_sqrt_ratio_at_tick};
