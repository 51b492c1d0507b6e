use super::state::{ConcentratedState, SwapError, SwapOutcome};
use crate::logic::math::{
    MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, MathError, compute_swap_step, get_sqrt_ratio_at_tick,
};
use crate::utils::constants::FEE_DENOMINATOR;
use crate::utils::token::u256_to_f64;
use alloy_primitives::U256;

const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

impl ConcentratedState {
    /// Bitmap word holding `tick`, as the pool's `tickBitmap` indexes it.
    pub fn word_of(tick: i32, tick_spacing: i32) -> i16 {
        (tick.div_euclid(tick_spacing) >> 8) as i16
    }

    /// Next initialized tick inside the bitmap word of `tick`, searching downwards when `lte`.
    /// Falls back to the word boundary when the word has none, and returns `None` when the
    /// word was never loaded.
    pub fn next_initialized_tick_within_one_word(&self, tick: i32, lte: bool) -> Option<(i32, bool)> {
        let spacing = self.tick_spacing;
        let mut compressed = tick.div_euclid(spacing);
        if !lte {
            compressed += 1;
        }
        let word = (compressed >> 8) as i16;
        if !self.loaded_words.contains(&word) {
            return None;
        }
        let word_start = (word as i32) * 256;

        if lte {
            let lower = word_start * spacing;
            match self.ticks.range(lower..=compressed * spacing).next_back() {
                Some((tick, _)) => Some((*tick, true)),
                None => Some((lower, false)),
            }
        } else {
            let upper = (word_start + 255) * spacing;
            match self.ticks.range(compressed * spacing..=upper).next() {
                Some((tick, _)) => Some((*tick, true)),
                None => Some((upper, false)),
            }
        }
    }

    fn has_ticks_beyond(&self, tick: i32, zero_for_one: bool) -> bool {
        if zero_for_one {
            self.ticks.range(..=tick).next_back().is_some()
        } else {
            self.ticks.range(tick + 1..).next().is_some()
        }
    }
}

fn add_liquidity_delta(liquidity: u128, delta: i128) -> Result<u128, MathError> {
    if delta < 0 {
        liquidity.checked_sub(delta.unsigned_abs()).ok_or(MathError::Overflow)
    } else {
        liquidity.checked_add(delta as u128).ok_or(MathError::Overflow)
    }
}

/// Exact-input swap walking initialized ticks. Input left over when the walk reaches the edge of the
/// loaded bitmap words, or runs out of liquidity, is reported as a partial fill.
pub fn swap_exact_in(state: &ConcentratedState, zero_for_one: bool, amount_in: U256, fee: u32) -> Result<SwapOutcome, SwapError> {
    if amount_in.is_zero() {
        return Ok(SwapOutcome::empty());
    }
    if state.liquidity == 0 && !state.has_ticks_beyond(state.tick, zero_for_one) {
        return Err(SwapError::NoLiquidity);
    }

    let sqrt_price_limit = if zero_for_one { MIN_SQRT_RATIO + U256::from(1) } else { MAX_SQRT_RATIO - U256::from(1) };

    let mut remaining = amount_in;
    let mut amount_out = U256::ZERO;
    let mut sqrt_price = state.sqrt_price_x96;
    let mut tick = state.tick;
    let mut liquidity = state.liquidity;

    while !remaining.is_zero() && sqrt_price != sqrt_price_limit {
        if liquidity == 0 && !state.has_ticks_beyond(tick, zero_for_one) {
            break;
        }
        let Some((tick_next, initialized)) = state.next_initialized_tick_within_one_word(tick, zero_for_one) else {
            break;
        };
        let tick_next = tick_next.clamp(MIN_TICK, MAX_TICK);
        let sqrt_price_next = get_sqrt_ratio_at_tick(tick_next)?;

        let target = if zero_for_one { sqrt_price_next.max(sqrt_price_limit) } else { sqrt_price_next.min(sqrt_price_limit) };

        let step = compute_swap_step(sqrt_price, target, liquidity, remaining, fee)?;
        remaining -= step.amount_in + step.fee_amount;
        amount_out += step.amount_out;
        sqrt_price = step.sqrt_price_next_x96;

        if sqrt_price == sqrt_price_next {
            if initialized {
                // crossing a tick applies its net liquidity, negated when moving left
                let net = state.ticks.get(&tick_next).copied().unwrap_or_default();
                let net = if zero_for_one { net.checked_neg().ok_or(MathError::Overflow)? } else { net };
                liquidity = add_liquidity_delta(liquidity, net)?;
            }
            tick = if zero_for_one { tick_next - 1 } else { tick_next };
        } else if !remaining.is_zero() {
            break;
        }
    }

    if amount_out.is_zero() && remaining == amount_in {
        return Err(SwapError::NoLiquidity);
    }

    Ok(SwapOutcome { amount_in: amount_in - remaining, amount_out, partial: !remaining.is_zero() })
}

fn sqrt_price(state: &ConcentratedState) -> f64 {
    u256_to_f64(state.sqrt_price_x96) / Q96
}

/// Closed-form rate within the current tick range.
pub fn probe_rate(state: &ConcentratedState, zero_for_one: bool, amount_in: U256, fee: u32) -> f64 {
    let liquidity = state.liquidity as f64;
    let sqrt_price = sqrt_price(state);
    if liquidity == 0.0 || sqrt_price == 0.0 {
        return 0.0;
    }
    let amount = u256_to_f64(amount_in).max(1.0);
    let effective = amount * (1.0 - fee as f64 / FEE_DENOMINATOR as f64);

    let amount_out = if zero_for_one {
        let next = liquidity * sqrt_price / (liquidity + effective * sqrt_price);
        liquidity * (sqrt_price - next)
    } else {
        let next = sqrt_price + effective / liquidity;
        liquidity * (1.0 / sqrt_price - 1.0 / next)
    };
    amount_out / amount
}

pub fn spot_price(state: &ConcentratedState, zero_for_one: bool) -> f64 {
    let sqrt_price = sqrt_price(state);
    if sqrt_price == 0.0 {
        return 0.0;
    }
    let price = sqrt_price * sqrt_price;
    if zero_for_one { price } else { 1.0 / price }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::math::sqrt_price_x96_from_amounts;
    use crate::logic::pools::constant_product;
    use std::collections::BTreeMap;

    const SPACING: i32 = 60;

    /// A single position over the whole usable range behaves like a constant product pool.
    fn full_range(reserve: u64) -> ConcentratedState {
        let (lower, upper) = crate::logic::math::tick_math::usable_tick_bounds(SPACING);
        let liquidity = reserve as u128;
        let mut ticks = BTreeMap::new();
        ticks.insert(lower, liquidity as i128);
        ticks.insert(upper, -(liquidity as i128));
        ConcentratedState {
            sqrt_price_x96: sqrt_price_x96_from_amounts(U256::from(1), U256::from(1)).unwrap(),
            tick: 0,
            liquidity,
            tick_spacing: SPACING,
            ticks,
            loaded_words: i16::MIN..=i16::MAX,
        }
    }

    fn narrow_range(liquidity: u128, loaded_words: std::ops::RangeInclusive<i16>) -> ConcentratedState {
        let mut ticks = BTreeMap::new();
        ticks.insert(-600, liquidity as i128);
        ticks.insert(600, -(liquidity as i128));
        ConcentratedState {
            sqrt_price_x96: get_sqrt_ratio_at_tick(0).unwrap(),
            tick: 0,
            liquidity,
            tick_spacing: SPACING,
            ticks,
            loaded_words,
        }
    }

    #[test]
    fn test_word_of() {
        assert_eq!(ConcentratedState::word_of(0, 60), 0);
        assert_eq!(ConcentratedState::word_of(-1, 60), -1);
        assert_eq!(ConcentratedState::word_of(256 * 60, 60), 1);
        assert_eq!(ConcentratedState::word_of(256 * 60 - 1, 60), 0);
    }

    #[test]
    fn test_next_tick_within_word() {
        let state = narrow_range(1_000, -1..=0);
        assert_eq!(state.next_initialized_tick_within_one_word(0, true), Some((0, false)));
        assert_eq!(state.next_initialized_tick_within_one_word(-1, true), Some((-600, true)));
        assert_eq!(state.next_initialized_tick_within_one_word(0, false), Some((600, true)));
        assert_eq!(state.next_initialized_tick_within_one_word(600, false), Some((255 * 60, false)));
        // word 1 was never loaded
        assert_eq!(state.next_initialized_tick_within_one_word(255 * 60, false), None);
        assert_eq!(state.next_initialized_tick_within_one_word(-256 * 60, true), Some((-256 * 60, false)));
        assert_eq!(state.next_initialized_tick_within_one_word(-256 * 60 - 1, true), None);
    }

    #[test]
    fn test_full_range_tracks_constant_product() {
        let reserve = 10u64.pow(15);
        let state = full_range(reserve);
        for amount in [10u64.pow(9), 10u64.pow(12), 10u64.pow(14)] {
            let cl = swap_exact_in(&state, true, U256::from(amount), 3000).unwrap();
            let cp = constant_product::get_amount_out(U256::from(amount), U256::from(reserve), U256::from(reserve), 3000).unwrap();
            assert!(!cl.partial);
            assert_eq!(cl.amount_in, U256::from(amount));
            let diff = u256_to_f64(cl.amount_out) - u256_to_f64(cp);
            assert!(diff.abs() / u256_to_f64(cp) < 1e-6, "amount {amount}: {} vs {}", cl.amount_out, cp);
        }
    }

    #[test]
    fn test_zero_amount_and_no_liquidity() {
        let state = full_range(10u64.pow(15));
        assert_eq!(swap_exact_in(&state, false, U256::ZERO, 3000).unwrap(), SwapOutcome::empty());

        let empty = ConcentratedState { liquidity: 0, ticks: BTreeMap::new(), ..state };
        assert_eq!(swap_exact_in(&empty, true, U256::from(1_000), 3000), Err(SwapError::NoLiquidity));
    }

    #[test]
    fn test_crossing_out_of_liquidity_is_partial() {
        let state = narrow_range(10u128.pow(18), i16::MIN..=i16::MAX);
        // far more than the [-600, 600] range can absorb
        let outcome = swap_exact_in(&state, true, U256::from(10u128.pow(20)), 3000).unwrap();
        assert!(outcome.partial);
        assert!(outcome.amount_in < U256::from(10u128.pow(20)));
        assert!(outcome.amount_out > U256::ZERO);
    }

    #[test]
    fn test_unloaded_word_is_partial() {
        // ticks beyond word 0 upwards are unknown
        let mut state = narrow_range(10u128.pow(18), -1..=0);
        state.ticks.insert(30_000, 10i128.pow(18));
        let outcome = swap_exact_in(&state, false, U256::from(10u128.pow(20)), 3000).unwrap();
        assert!(outcome.partial);
        assert!(outcome.amount_out > U256::ZERO);
    }

    #[test]
    fn test_probe_rate_close_to_swap() {
        let state = full_range(10u64.pow(15));
        let amount = U256::from(10u64.pow(9));
        for zero_for_one in [true, false] {
            let rate = probe_rate(&state, zero_for_one, amount, 3000);
            let out = swap_exact_in(&state, zero_for_one, amount, 3000).unwrap().amount_out;
            let integer_rate = u256_to_f64(out) / 1e9;
            assert!((rate - integer_rate).abs() < 1e-6, "{rate} vs {integer_rate}");
        }
        assert_eq!(spot_price(&state, true), 1.0);
    }
}
