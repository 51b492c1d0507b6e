use crate::logic::quote::Quote;
use crate::utils::token::Token;
use ahash::RandomState;
use alloy_primitives::Address;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type FastHasher = RandomState;
/// FastHashMap using ahash
pub type FastHashMap<K, V> = HashMap<K, V, FastHasher>;

/// Directed edge priced by a probe quote. `weight = -ln(rate)`, so a cycle with negative total
/// weight returns more than it started with.
#[derive(Debug, Clone)]
pub struct QuoteEdge {
    pub quote: Quote,
    pub weight: f64,
}

/// Snapshot of the market as an asset graph. Built for one search and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct QuoteGraph {
    pub graph: DiGraph<Arc<Token>, QuoteEdge, usize>,
    // token -> node index
    pub token_index: FastHashMap<Address, NodeIndex<usize>>,
    min_edge_weight: f64,
}

impl QuoteGraph {
    /// Quotes whose rate is zero, negative or not finite are left out.
    pub fn from_quotes<I: IntoIterator<Item = Quote>>(quotes: I) -> Self {
        let mut graph = QuoteGraph { min_edge_weight: f64::INFINITY, ..QuoteGraph::default() };
        let mut skipped = 0usize;
        for quote in quotes {
            match quote.weight() {
                Some(weight) => graph.add_edge(quote, weight),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, "Left unusable quotes out of the graph");
        }
        graph
    }

    fn add_or_get_token_idx(&mut self, token: &Arc<Token>) -> NodeIndex<usize> {
        *self.token_index.entry(token.get_address()).or_insert_with(|| self.graph.add_node(token.clone()))
    }

    fn add_edge(&mut self, quote: Quote, weight: f64) {
        let from = self.add_or_get_token_idx(&quote.asset_in);
        let to = self.add_or_get_token_idx(&quote.asset_out);
        self.min_edge_weight = self.min_edge_weight.min(weight);
        self.graph.add_edge(from, to, QuoteEdge { quote, weight });
    }

    pub fn node(&self, token: &Address) -> Option<NodeIndex<usize>> {
        self.token_index.get(token).copied()
    }

    pub fn token(&self, node: NodeIndex<usize>) -> Option<&Arc<Token>> {
        self.graph.node_weight(node)
    }

    /// Smallest edge weight in the graph, `+inf` for an empty graph.
    pub fn min_edge_weight(&self) -> f64 {
        self.min_edge_weight
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::pools::{Pool, PoolProtocol, PoolSnapshot};
    use alloy_primitives::U256;

    #[test]
    fn test_graph_from_quotes() {
        let a = Arc::new(Token::new_with_data(Address::repeat_byte(1), None, None, Some(0)));
        let b = Arc::new(Token::new_with_data(Address::repeat_byte(2), None, None, Some(0)));
        let pool = Arc::new(Pool::new(Address::repeat_byte(0x10), PoolProtocol::Sushiswap, a.clone(), b.clone(), 3000));
        let snapshot = PoolSnapshot::constant_product(U256::from(1_000), U256::from(2_000));

        let forward = Quote::from_snapshot(&pool, &snapshot, &a.get_address(), U256::from(1)).unwrap();
        let backward = Quote::from_snapshot(&pool, &snapshot, &b.get_address(), U256::from(1)).unwrap();
        let mut dead = forward.clone();
        dead.rate = 0.0;

        let graph = QuoteGraph::from_quotes([forward, backward, dead]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        // a -> b doubles, so its weight is about -ln 2
        assert!((graph.min_edge_weight() + 2f64.ln()).abs() < 0.01);
        assert_eq!(graph.token(graph.node(&b.get_address()).unwrap()).unwrap().get_address(), b.get_address());
    }
}
