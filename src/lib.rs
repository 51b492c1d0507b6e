// Two-layer architecture
pub mod data_sync; // Data Layer: RPC transport, ABI codec, pool registry
pub mod logic; // Logic Layer: quoting, path finding, arbitrage evaluation

// Common utilities and types
pub mod utils;

// Re-export key components from each layer
pub use data_sync::{BlockTag, HttpTransport, MarketConfigRoot, MarketLoader, MockTransport, PoolRegistry, RpcConfig, RpcError, RpcTransport};
pub use logic::{
    ArbitrageCandidate, ArbitrageEngine, ArbitrageEngineBuilder, CancelToken, EngineConfig, EngineError, Evaluator, GasModel, Pathfinder,
    Pool, PoolProtocol, PoolWrapper, ProtocolKind, Quote, QuoteEngine, QuoteError, QuoteGraph, ScanReport, SearchError, get_protocol_by_factory,
};
pub use utils::Token;
