use super::evaluator::{Evaluator, ScoredCandidate};
use super::graph::{CycleHash, QuoteGraph};
use super::pathfinder::{Pathfinder, SearchError};
use super::quote::{Quote, QuoteError};
use super::quote_engine::QuoteEngine;
use super::types::{CancelToken, EngineConfig, GasModel};
use crate::data_sync::markets::PoolRegistry;
use crate::data_sync::transport::{BlockTag, RpcTransport};
use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// One profitable cycle as reported to the caller. Amounts are raw base-asset units.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityReport {
    pub id: CycleHash,
    pub path: Vec<Address>,
    pub symbols: Vec<String>,
    pub pools: Vec<Address>,
    pub hops: usize,
    pub amount_in: U256,
    pub amount_out: U256,
    pub gross_profit: U256,
    pub gas_cost: U256,
    pub net_profit: U256,
    pub fee_cost: f64,
    pub slippage_cost: f64,
    /// Return per unit at the probe amount
    pub expected_return: f64,
}

impl From<&ScoredCandidate> for OpportunityReport {
    fn from(scored: &ScoredCandidate) -> Self {
        let candidate = &scored.candidate;
        Self {
            id: candidate.hash,
            path: candidate.tokens.iter().map(|token| token.get_address()).collect(),
            symbols: candidate.tokens.iter().map(|token| token.get_symbol()).collect(),
            pools: candidate.pool_addresses(),
            hops: candidate.len(),
            amount_in: scored.amount_in,
            amount_out: scored.amount_out,
            gross_profit: scored.gross_profit,
            gas_cost: scored.gas_cost,
            net_profit: scored.net_profit,
            fee_cost: scored.fee_cost,
            slippage_cost: scored.slippage_cost,
            expected_return: candidate.expected_return(),
        }
    }
}

/// Result of one scan, ranked by net profit.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub base: Address,
    pub block_number: Option<u64>,
    pub max_hops: usize,
    pub pools_priced: usize,
    pub degraded_pools: usize,
    pub candidates_found: usize,
    pub budget_exhausted: bool,
    pub iterations: u64,
    pub opportunities: Vec<OpportunityReport>,
}

impl ScanReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Ties the quote engine, path finder and evaluator together over one registry and transport.
pub struct ArbitrageEngine {
    config: EngineConfig,
    quote_engine: QuoteEngine,
    pathfinder: Pathfinder,
    evaluator: Evaluator,
}

impl ArbitrageEngine {
    /// Validate `config` and check that the endpoint answers `eth_blockNumber`.
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        registry: Arc<PoolRegistry>,
        block: BlockTag,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(|e| EngineError::Configuration(e.to_string()))?;

        let head = transport.block_number().await.map_err(|e| {
            error!(error = %e, "RPC endpoint unreachable");
            EngineError::Configuration(format!("rpc endpoint unreachable: {e}"))
        })?;
        info!(head, block = %block.to_param(), pools = registry.pools_len(), "Connected to RPC endpoint");

        Ok(Self {
            quote_engine: QuoteEngine::new(transport, registry, block, &config),
            pathfinder: Pathfinder::from_config(&config),
            evaluator: Evaluator::from_config(&config),
            config,
        })
    }

    pub fn quote_engine(&self) -> &QuoteEngine {
        &self.quote_engine
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        self.quote_engine.registry()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn quote(&self, asset_in: &Address, asset_out: &Address, amount_in: U256) -> Result<Quote, QuoteError> {
        self.quote_engine.quote(asset_in, asset_out, amount_in).await
    }

    /// Refresh every pool, search cycles through `base` and score them.
    pub async fn scan(&self, base: &Address, max_hops: usize, cancel: &CancelToken) -> Result<ScanReport, EngineError> {
        if max_hops < 2 || max_hops > self.pathfinder.ceiling() {
            return Err(SearchError::InvalidMaxHops { requested: max_hops, ceiling: self.pathfinder.ceiling() }.into());
        }

        let started = Instant::now();
        // only state fetched or confirmed fresh by this refresh is priced
        let snapshots = self.quote_engine.refresh_all(cancel).await;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled.into());
        }

        let graph = QuoteGraph::from_quotes(self.quote_engine.probe_quotes_for(&snapshots));
        let outcome = self.pathfinder.find_arbitrage(&graph, base, max_hops, cancel)?;
        let scored = self.evaluator.evaluate_all(&outcome.candidates, &snapshots);

        let registry = self.registry();
        let report = ScanReport {
            base: *base,
            block_number: self.quote_engine.block().block_number(),
            max_hops,
            pools_priced: snapshots.len(),
            degraded_pools: registry.degraded_pools_len(),
            candidates_found: outcome.candidates.len(),
            budget_exhausted: outcome.budget_exhausted,
            iterations: outcome.iterations,
            opportunities: scored.iter().map(OpportunityReport::from).collect(),
        };

        info!(
            %base,
            refreshed = report.pools_priced,
            degraded = report.degraded_pools,
            candidates = report.candidates_found,
            opportunities = report.opportunities.len(),
            elapsed = ?started.elapsed(),
            "Scan finished"
        );
        Ok(report)
    }

    pub fn get_statistics(&self) -> ArbitrageEngineStats {
        let registry = self.registry();
        ArbitrageEngineStats {
            pools: registry.pools_len(),
            degraded_pools: registry.degraded_pools_len(),
            max_hops: self.config.max_hops,
            block: self.quote_engine.block(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArbitrageEngineStats {
    pub pools: usize,
    pub degraded_pools: usize,
    pub max_hops: usize,
    pub block: BlockTag,
}

pub struct ArbitrageEngineBuilder {
    transport: Option<Arc<dyn RpcTransport>>,
    registry: Arc<PoolRegistry>,
    block: BlockTag,
    config: EngineConfig,
}

impl ArbitrageEngineBuilder {
    pub fn new() -> Self {
        Self { transport: None, registry: Arc::new(PoolRegistry::new()), block: BlockTag::Latest, config: EngineConfig::default() }
    }

    pub fn with_transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_registry(mut self, registry: Arc<PoolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_block(mut self, block: BlockTag) -> Self {
        self.block = block;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.config.max_hops = max_hops;
        self
    }

    pub fn with_gas(mut self, gas: GasModel) -> Self {
        self.config.gas = gas;
        self
    }

    pub fn with_max_input_amount(mut self, amount: U256) -> Self {
        self.config.max_input_amount = Some(amount);
        self
    }

    pub async fn build(self) -> Result<ArbitrageEngine, EngineError> {
        let transport = self.transport.ok_or_else(|| EngineError::Configuration("no rpc transport configured".to_string()))?;
        ArbitrageEngine::connect(transport, self.registry, self.block, self.config).await
    }
}

impl Default for ArbitrageEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
