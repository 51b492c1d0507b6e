use super::graph::{ArbitrageCandidate, FastHashMap};
use super::pools::PoolSnapshot;
use super::types::{EngineConfig, GasModel};
use crate::utils::constants::FEE_DENOMINATOR;
use crate::utils::token::u256_to_f64;
use alloy_primitives::{Address, I256, U256};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

// widest interval left over from the ternary search that is still scanned point by point
const FINAL_SCAN_WIDTH: u64 = 64;

/// Pool state the candidates were found on, keyed by pool address.
pub type SnapshotSet = FastHashMap<Address, Arc<PoolSnapshot>>;

/// A candidate priced at its best trade size, with costs broken down in raw base-asset units.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: ArbitrageCandidate,
    pub amount_in: U256,
    /// Output of every hop at `amount_in`; the last one is the cycle's return
    pub hop_amounts: Vec<U256>,
    pub amount_out: U256,
    /// Protocol fees paid along the cycle
    pub fee_cost: f64,
    /// Output lost to price impact compared with trading at the fee-adjusted spot price
    pub slippage_cost: f64,
    pub gas_cost: U256,
    pub gross_profit: U256,
    pub net_profit: U256,
}

impl ScoredCandidate {
    pub fn hops(&self) -> usize {
        self.candidate.len()
    }
}

/// Scores path-finder candidates: finds the input that maximizes output minus input by ternary search,
/// then charges gas. Anything that does not clear a positive net profit is dropped.
#[derive(Debug, Clone)]
pub struct Evaluator {
    max_input_amount: Option<U256>,
    max_search_rounds: u32,
    gas: GasModel,
}

impl Evaluator {
    pub fn new(max_input_amount: Option<U256>, max_search_rounds: u32, gas: GasModel) -> Self {
        Self { max_input_amount, max_search_rounds, gas }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_input_amount, config.max_search_rounds, config.gas.clone())
    }

    /// Score every candidate in parallel and rank the survivors.
    pub fn evaluate_all(&self, candidates: &[ArbitrageCandidate], snapshots: &SnapshotSet) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates.par_iter().filter_map(|candidate| self.evaluate(candidate, snapshots)).collect();
        rank(&mut scored);
        debug!(candidates = candidates.len(), profitable = scored.len(), "Evaluated arbitrage candidates");
        scored
    }

    pub fn evaluate(&self, candidate: &ArbitrageCandidate, snapshots: &SnapshotSet) -> Option<ScoredCandidate> {
        let base = candidate.base()?;
        let first = candidate.hops.first()?;
        let first_snapshot = snapshots.get(&first.pool.get_address())?;
        let zero_for_one = first.pool.zero_for_one(&first.asset_in.get_address())?;

        let mut upper = first_snapshot.state.reserve_in(zero_for_one);
        if let Some(max_input) = self.max_input_amount {
            upper = upper.min(max_input);
        }
        if upper.is_zero() {
            return None;
        }

        let Some((amount_in, hop_amounts)) = self.optimal_input(candidate, snapshots, upper) else {
            debug!(%candidate, "No trade size returns more than it puts in");
            return None;
        };
        let amount_out = hop_amounts.last().copied().unwrap_or_default();
        let gross_profit = amount_out.saturating_sub(amount_in);
        let gas_cost = self.gas.cost_in_base(candidate.len(), base.get_decimals());
        if gross_profit <= gas_cost {
            debug!(%candidate, %gross_profit, %gas_cost, "Gas eats the profit");
            return None;
        }

        let (fee_cost, slippage_cost) = cost_breakdown(candidate, snapshots, amount_in, amount_out);

        Some(ScoredCandidate {
            candidate: candidate.clone(),
            amount_in,
            hop_amounts,
            amount_out,
            fee_cost,
            slippage_cost,
            gas_cost,
            gross_profit,
            net_profit: gross_profit - gas_cost,
        })
    }

    /// Chain exact-input swaps along the cycle. `None` when a pool is missing or cannot absorb the whole amount.
    fn simulate(&self, candidate: &ArbitrageCandidate, snapshots: &SnapshotSet, amount_in: U256) -> Option<Vec<U256>> {
        let mut amount = amount_in;
        let mut outputs = Vec::with_capacity(candidate.len());
        for hop in candidate.hops.iter() {
            let snapshot = snapshots.get(&hop.pool.get_address())?;
            let zero_for_one = hop.pool.zero_for_one(&hop.asset_in.get_address())?;
            let outcome = hop.pool.swap_exact_in(snapshot, zero_for_one, amount).ok()?;
            if outcome.partial {
                return None;
            }
            amount = outcome.amount_out;
            outputs.push(amount);
        }
        Some(outputs)
    }

    /// Exact `out - in` at `amount_in` with the per-hop outputs. `None` when the size is not feasible.
    fn profit_at(&self, candidate: &ArbitrageCandidate, snapshots: &SnapshotSet, amount_in: U256) -> Option<(I256, Vec<U256>)> {
        let outputs = self.simulate(candidate, snapshots, amount_in)?;
        let amount_out = I256::try_from(outputs.last().copied().unwrap_or_default()).ok()?;
        let amount_in = I256::try_from(amount_in).ok()?;
        Some((amount_out - amount_in, outputs))
    }

    /// Ternary search over `[1, upper]`, keeping the best point seen. Returns only a strictly profitable input.
    fn optimal_input(&self, candidate: &ArbitrageCandidate, snapshots: &SnapshotSet, upper: U256) -> Option<(U256, Vec<U256>)> {
        let mut left = U256::from(1);
        let mut right = upper;
        let mut best: Option<(I256, U256, Vec<U256>)> = None;

        let mut keep_best = |amount: U256, result: Option<(I256, Vec<U256>)>| {
            if let Some((profit, outputs)) = result {
                if best.as_ref().is_none_or(|(best_profit, _, _)| profit > *best_profit) {
                    best = Some((profit, amount, outputs));
                }
            }
        };

        let mut rounds = 0;
        while right - left > U256::from(2) && rounds < self.max_search_rounds {
            let third = (right - left) / U256::from(3);
            let mid1 = left + third;
            let mid2 = right - third;

            let result1 = self.profit_at(candidate, snapshots, mid1);
            let result2 = self.profit_at(candidate, snapshots, mid2);
            // infeasible sizes compare below every feasible one
            let raise_left = result1.as_ref().map(|(profit, _)| *profit) < result2.as_ref().map(|(profit, _)| *profit);
            keep_best(mid1, result1);
            keep_best(mid2, result2);

            if raise_left {
                left = mid1;
            } else {
                right = mid2;
            }
            rounds += 1;
        }

        // out of rounds on a wide interval: only its ends are tried
        let remaining: Vec<U256> = if right - left <= U256::from(FINAL_SCAN_WIDTH) {
            let width = (right - left).to::<u64>();
            (0..=width).map(|offset| left + U256::from(offset)).collect()
        } else {
            vec![left, right]
        };
        for amount in remaining {
            keep_best(amount, self.profit_at(candidate, snapshots, amount));
        }

        best.filter(|(profit, _, _)| profit.is_positive()).map(|(_, amount, outputs)| (amount, outputs))
    }
}

/// Fees and slippage at `amount_in`, measured against the cycle's spot prices.
fn cost_breakdown(candidate: &ArbitrageCandidate, snapshots: &SnapshotSet, amount_in: U256, amount_out: U256) -> (f64, f64) {
    let mut spot = 1.0;
    let mut after_fees = 1.0;
    for hop in candidate.hops.iter() {
        let price = match (snapshots.get(&hop.pool.get_address()), hop.pool.zero_for_one(&hop.asset_in.get_address())) {
            (Some(snapshot), Some(zero_for_one)) => hop.pool.spot_price(snapshot, zero_for_one),
            _ => hop.spot_price,
        };
        let fee_rate = hop.pool.get_fee() as f64 / FEE_DENOMINATOR as f64;
        spot *= price;
        after_fees *= price * (1.0 - fee_rate);
    }

    let input = u256_to_f64(amount_in);
    let fee_cost = input * (spot - after_fees);
    let slippage_cost = (input * after_fees - u256_to_f64(amount_out)).max(0.0);
    (fee_cost, slippage_cost)
}

/// Net profit descending, then fewer hops, then pool addresses.
pub fn rank(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| {
        b.net_profit
            .cmp(&a.net_profit)
            .then_with(|| a.hops().cmp(&b.hops()))
            .then_with(|| a.candidate.pool_addresses().cmp(&b.candidate.pool_addresses()))
    });
}
