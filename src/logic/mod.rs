/// Logic layer: pricing and arbitrage search over registry state.
///
/// - Constant-product and concentrated-liquidity swap math
/// - Quote engine with per-pool refresh serialization
/// - Asset graph, negative-cycle search and candidate scoring
pub mod arbitrage_engine;
pub mod evaluator;
pub mod graph;
pub mod math;
pub mod pathfinder;
pub mod pools;
pub mod quote;
pub mod quote_engine;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use arbitrage_engine::{ArbitrageEngine, ArbitrageEngineBuilder, ArbitrageEngineStats, EngineError, OpportunityReport, ScanReport};
pub use evaluator::{Evaluator, ScoredCandidate, SnapshotSet};
pub use graph::{ArbitrageCandidate, CycleHash, QuoteGraph};
pub use pathfinder::{Pathfinder, SearchError, SearchOutcome};
pub use pools::{Pool, PoolProtocol, PoolSnapshot, PoolState, PoolWrapper, ProtocolKind, get_protocol_by_factory};
pub use quote::{Fill, Quote, QuoteError};
pub use quote_engine::QuoteEngine;
pub use types::{CancelToken, EngineConfig, GasModel};
