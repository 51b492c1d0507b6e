use super::graph::{ArbitrageCandidate, QuoteGraph};
use super::quote::Quote;
use super::types::{CancelToken, EngineConfig};
use crate::utils::token::Token;
use alloy_primitives::Address;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

// how often the clock is read during a search
const CLOCK_CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("max_hops must be between 2 and {ceiling}, got {requested}")]
    InvalidMaxHops { requested: usize, ceiling: usize },
    #[error("search cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Negative-weight cycles, best first
    pub candidates: Vec<ArbitrageCandidate>,
    /// The iteration or time budget ran out before the search space was exhausted
    pub budget_exhausted: bool,
    pub iterations: u64,
}

/// Depth-first enumeration of simple cycles through a base token over a [`QuoteGraph`].
///
/// Edges carry `-ln(rate)`, so a profitable cycle has a negative total weight. Pools are never
/// reused within a cycle and intermediate tokens are never revisited.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    /// Largest accepted `max_hops`
    ceiling: usize,
    max_iterations: u64,
    timeout: Duration,
}

impl Pathfinder {
    pub fn new(ceiling: usize, max_iterations: u64, timeout: Duration) -> Self {
        Self { ceiling, max_iterations, timeout }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_hops, config.max_iterations, config.search_timeout())
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Find cycles starting and ending at `base` with at most `max_hops` swaps.
    ///
    /// Results are ordered by total weight, then by hop count, then by pool addresses. A base token
    /// missing from the graph yields an empty outcome. Hitting the budget is reported through
    /// [`SearchOutcome::budget_exhausted`] together with whatever was found so far.
    pub fn find_arbitrage(&self, graph: &QuoteGraph, base: &Address, max_hops: usize, cancel: &CancelToken) -> Result<SearchOutcome, SearchError> {
        if max_hops < 2 || max_hops > self.ceiling {
            return Err(SearchError::InvalidMaxHops { requested: max_hops, ceiling: self.ceiling });
        }

        let Some(base_node) = graph.node(base) else {
            debug!(%base, "Base token has no edges, nothing to search");
            return Ok(SearchOutcome::default());
        };

        let started = Instant::now();
        let mut search = CycleSearch {
            graph,
            base: base_node,
            max_hops,
            min_edge_weight: graph.min_edge_weight(),
            cancel,
            deadline: started + self.timeout,
            max_iterations: self.max_iterations,
            iterations: 0,
            budget_exhausted: false,
            cancelled: false,
            path_nodes: vec![base_node],
            path_edges: Vec::with_capacity(max_hops),
            candidates: Vec::new(),
        };
        search.dfs(base_node, 0.0);

        if search.cancelled {
            info!(iterations = search.iterations, "Arbitrage search cancelled");
            return Err(SearchError::Cancelled);
        }
        if search.budget_exhausted {
            warn!(iterations = search.iterations, elapsed = ?started.elapsed(), "Arbitrage search budget exhausted, returning best so far");
        }

        let mut candidates = search.candidates;
        candidates.sort_by(|a, b| {
            a.weight
                .total_cmp(&b.weight)
                .then_with(|| a.len().cmp(&b.len()))
                .then_with(|| a.pool_addresses().cmp(&b.pool_addresses()))
        });

        info!(
            candidates = candidates.len(),
            iterations = search.iterations,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            elapsed = ?started.elapsed(),
            "Arbitrage search finished"
        );

        Ok(SearchOutcome { candidates, budget_exhausted: search.budget_exhausted, iterations: search.iterations })
    }
}

struct CycleSearch<'a> {
    graph: &'a QuoteGraph,
    base: NodeIndex<usize>,
    max_hops: usize,
    min_edge_weight: f64,
    cancel: &'a CancelToken,
    deadline: Instant,
    max_iterations: u64,
    iterations: u64,
    budget_exhausted: bool,
    cancelled: bool,
    path_nodes: Vec<NodeIndex<usize>>,
    path_edges: Vec<EdgeIndex<usize>>,
    candidates: Vec<ArbitrageCandidate>,
}

impl CycleSearch<'_> {
    fn should_stop(&mut self) -> bool {
        if self.cancelled || self.budget_exhausted {
            return true;
        }
        if self.cancel.is_cancelled() {
            self.cancelled = true;
            return true;
        }
        if self.iterations >= self.max_iterations
            || (self.iterations % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline)
        {
            self.budget_exhausted = true;
            return true;
        }
        false
    }

    /// Lowest weight any completion of `remaining` more hops could add.
    fn completion_bound(&self, remaining: usize) -> f64 {
        if self.min_edge_weight < 0.0 { remaining as f64 * self.min_edge_weight } else { self.min_edge_weight }
    }

    fn uses_pool(&self, pool: &Address) -> bool {
        self.path_edges.iter().any(|edge| self.graph.graph[*edge].quote.pool.get_address() == *pool)
    }

    fn dfs(&mut self, node: NodeIndex<usize>, weight: f64) {
        let graph = self.graph;
        for edge in graph.graph.edges(node) {
            if self.should_stop() {
                return;
            }
            self.iterations += 1;

            let target = edge.target();
            let quote_edge = edge.weight();
            if self.uses_pool(&quote_edge.quote.pool.get_address()) {
                continue;
            }

            let new_weight = weight + quote_edge.weight;
            let new_hops = self.path_edges.len() + 1;

            if target == self.base {
                if new_hops >= 2 && new_weight < 0.0 {
                    self.record(edge.id(), new_weight);
                }
                continue;
            }

            if new_hops >= self.max_hops || self.path_nodes.contains(&target) {
                continue;
            }
            if new_weight + self.completion_bound(self.max_hops - new_hops) >= 0.0 {
                continue;
            }

            self.path_nodes.push(target);
            self.path_edges.push(edge.id());
            self.dfs(target, new_weight);
            self.path_edges.pop();
            self.path_nodes.pop();
        }
    }

    fn record(&mut self, closing_edge: EdgeIndex<usize>, weight: f64) {
        let graph = &self.graph.graph;
        let mut tokens: Vec<Arc<Token>> = self.path_nodes.iter().map(|node| graph[*node].clone()).collect();
        tokens.push(graph[self.base].clone());

        let hops: Vec<Quote> =
            self.path_edges.iter().chain(std::iter::once(&closing_edge)).map(|edge| graph[*edge].quote.clone()).collect();

        let candidate = ArbitrageCandidate::new(tokens, hops, weight);
        debug!(%candidate, weight, "Found negative cycle");
        self.candidates.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::fixtures::TestMarket;

    fn pathfinder() -> Pathfinder {
        Pathfinder::new(4, 1_000_000, Duration::from_secs(5))
    }

    fn two_pool_market(fee: u32) -> (TestMarket, Address) {
        let mut market = TestMarket::new();
        let a = market.token(1, "A");
        let b = market.token(2, "B");
        market.cp_pool(0x10, &a, &b, 1_000, 1_000, fee);
        market.cp_pool(0x11, &a, &b, 1_000, 1_200, fee);
        (market, a.get_address())
    }

    #[test]
    fn test_finds_two_pool_cycle() {
        let (market, base) = two_pool_market(3000);
        let outcome = pathfinder().find_arbitrage(&market.graph(), &base, 2, &CancelToken::new()).unwrap();

        assert!(!outcome.budget_exhausted);
        assert_eq!(outcome.candidates.len(), 1);
        let candidate = &outcome.candidates[0];
        // buy B cheap in the 1200 pool, sell it back in the balanced one
        assert_eq!(candidate.pool_addresses(), vec![Address::repeat_byte(0x11), Address::repeat_byte(0x10)]);
        assert_eq!(candidate.tokens.first().unwrap().get_address(), base);
        assert_eq!(candidate.tokens.last().unwrap().get_address(), base);
        assert!(candidate.weight < 0.0);
        assert!(candidate.expected_return() > 1.18 && candidate.expected_return() < 1.2);
    }

    #[test]
    fn test_high_fee_still_profitable_at_probe() {
        // 1.2 * 0.95^2 = 1.083, the probe rate alone does not rule this cycle out
        let (market, base) = two_pool_market(50_000);
        let outcome = pathfinder().find_arbitrage(&market.graph(), &base, 2, &CancelToken::new()).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn test_max_hops_validation() {
        let (market, base) = two_pool_market(3000);
        let graph = market.graph();
        let cancel = CancelToken::new();

        assert_eq!(
            pathfinder().find_arbitrage(&graph, &base, 1, &cancel).unwrap_err(),
            SearchError::InvalidMaxHops { requested: 1, ceiling: 4 }
        );
        assert_eq!(
            pathfinder().find_arbitrage(&graph, &base, 5, &cancel).unwrap_err(),
            SearchError::InvalidMaxHops { requested: 5, ceiling: 4 }
        );
    }

    #[test]
    fn test_unknown_base_is_empty() {
        let (market, _) = two_pool_market(3000);
        let outcome = pathfinder().find_arbitrage(&market.graph(), &Address::repeat_byte(9), 3, &CancelToken::new()).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_triangle_respects_hop_limit() {
        let mut market = TestMarket::new();
        let a = market.token(1, "A");
        let b = market.token(2, "B");
        let c = market.token(3, "C");
        market.cp_pool(0x10, &a, &b, 1_000, 1_000, 3000);
        market.cp_pool(0x11, &b, &c, 1_000, 1_000, 3000);
        market.cp_pool(0x12, &c, &a, 1_000, 1_100, 3000);
        let graph = market.graph();

        let two = pathfinder().find_arbitrage(&graph, &a.get_address(), 2, &CancelToken::new()).unwrap();
        assert!(two.candidates.is_empty());

        let three = pathfinder().find_arbitrage(&graph, &a.get_address(), 3, &CancelToken::new()).unwrap();
        assert_eq!(three.candidates.len(), 1);
        let symbols: Vec<String> = three.candidates[0].tokens.iter().map(|t| t.get_symbol()).collect();
        assert_eq!(symbols, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn test_ties_ordered_by_pool_address() {
        let mut market = TestMarket::new();
        let a = market.token(1, "A");
        let b = market.token(2, "B");
        market.cp_pool(0x10, &a, &b, 1_000, 1_000, 3000);
        market.cp_pool(0x12, &a, &b, 1_000, 1_200, 3000);
        market.cp_pool(0x11, &a, &b, 1_000, 1_200, 3000);

        let outcome = pathfinder().find_arbitrage(&market.graph(), &a.get_address(), 2, &CancelToken::new()).unwrap();
        let pools: Vec<Vec<Address>> = outcome.candidates.iter().map(|c| c.pool_addresses()).collect();
        assert_eq!(
            pools,
            vec![
                vec![Address::repeat_byte(0x11), Address::repeat_byte(0x10)],
                vec![Address::repeat_byte(0x12), Address::repeat_byte(0x10)],
            ]
        );

        let again = pathfinder().find_arbitrage(&market.graph(), &a.get_address(), 2, &CancelToken::new()).unwrap();
        let hashes: Vec<_> = again.candidates.iter().map(|c| c.hash).collect();
        assert_eq!(hashes, outcome.candidates.iter().map(|c| c.hash).collect::<Vec<_>>());
    }

    #[test]
    fn test_budget_exhausted_returns_best_so_far() {
        let (market, base) = two_pool_market(3000);
        let outcome = Pathfinder::new(4, 1, Duration::from_secs(5)).find_arbitrage(&market.graph(), &base, 2, &CancelToken::new()).unwrap();
        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.iterations, 1);

        let timed_out = Pathfinder::new(4, 1_000, Duration::ZERO).find_arbitrage(&market.graph(), &base, 2, &CancelToken::new()).unwrap();
        assert!(timed_out.budget_exhausted);
        assert!(timed_out.candidates.is_empty());
    }

    #[test]
    fn test_cancelled_search() {
        let (market, base) = two_pool_market(3000);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(pathfinder().find_arbitrage(&market.graph(), &base, 2, &cancel).unwrap_err(), SearchError::Cancelled);
    }

    #[test]
    fn test_no_cycle_without_mispricing() {
        let mut market = TestMarket::new();
        let a = market.token(1, "A");
        let b = market.token(2, "B");
        market.cp_pool(0x10, &a, &b, 1_000, 1_000, 3000);
        market.cp_pool(0x11, &a, &b, 5_000, 5_000, 3000);
        let outcome = pathfinder().find_arbitrage(&market.graph(), &a.get_address(), 4, &CancelToken::new()).unwrap();
        assert!(outcome.candidates.is_empty());
        assert!(!outcome.budget_exhausted);
    }
}
