pub mod candidate;
pub mod cycle_hash;
pub mod quote_graph;

pub use candidate::ArbitrageCandidate;
pub use cycle_hash::CycleHash;
pub use quote_graph::{FastHashMap, QuoteEdge, QuoteGraph};
