use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared stop flag. Once cancelled, no new RPC calls are issued and searches return early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed gas-cost estimate for executing a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GasModel {
    /// Gas charged once per transaction
    pub base_gas: u64,
    /// Additional gas per swap hop
    pub gas_per_hop: u64,
    pub gas_price_gwei: f64,
    /// Whole base-asset units one whole native token is worth
    pub native_price_in_base: f64,
}

impl Default for GasModel {
    fn default() -> Self {
        Self { base_gas: 21_000, gas_per_hop: 90_000, gas_price_gwei: 20.0, native_price_in_base: 1.0 }
    }
}

impl GasModel {
    pub fn gas_units(&self, hops: usize) -> u64 {
        self.base_gas.saturating_add(self.gas_per_hop.saturating_mul(hops as u64))
    }

    /// Gas cost of a `hops`-long cycle in raw base-asset units, rounded up.
    pub fn cost_in_base(&self, hops: usize, base_decimals: u8) -> U256 {
        let gwei_in_base = self.gas_units(hops) as f64 * self.gas_price_gwei * self.native_price_in_base;
        let raw = (gwei_in_base * 10f64.powi(base_decimals as i32) / 1e9).ceil();
        if raw.is_finite() && raw > 0.0 { U256::from(raw as u128) } else { U256::ZERO }
    }
}

/// Engine settings, the `[engine]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Cached pool state younger than this is reused without an RPC round trip
    pub freshness_ms: u64,
    /// Edge rates are probed with one whole unit of the input token divided by this
    pub probe_divisor: u64,
    /// Largest accepted `max_hops` for a search
    pub max_hops: usize,
    /// DFS node expansions before the search reports a budget cutoff
    pub max_iterations: u64,
    /// Wall-clock limit for one search
    pub search_timeout_ms: u64,
    /// Tick bitmap words loaded on each side of the current word of a concentrated pool
    pub tick_word_radius: i16,
    /// Upper bound on the trade size tried by the evaluator, in raw base-asset units
    pub max_input_amount: Option<U256>,
    /// Ternary search rounds per candidate
    pub max_search_rounds: u32,
    pub gas: GasModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness_ms: 3_000,
            probe_divisor: 1_000,
            max_hops: 4,
            max_iterations: 1_000_000,
            search_timeout_ms: 2_000,
            tick_word_radius: 2,
            max_input_amount: None,
            max_search_rounds: 200,
            gas: GasModel::default(),
        }
    }
}

impl EngineConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.max_hops < 2 {
            return Err(eyre::eyre!("max_hops must be at least 2, got {}", self.max_hops));
        }
        if self.probe_divisor == 0 {
            return Err(eyre::eyre!("probe_divisor must be positive"));
        }
        if self.tick_word_radius < 0 {
            return Err(eyre::eyre!("tick_word_radius must not be negative"));
        }
        if !(self.gas.gas_price_gwei >= 0.0 && self.gas.native_price_in_base >= 0.0) {
            return Err(eyre::eyre!("gas price and native price must be non-negative"));
        }
        Ok(())
    }
}
