use super::cycle_hash::CycleHash;
use crate::logic::pools::PoolWrapper;
use crate::logic::quote::Quote;
use crate::utils::token::Token;
use alloy_primitives::{Address, U256};
use std::fmt::Display;
use std::sync::Arc;

/// A cycle through the base asset found by the path finder. `tokens` starts and ends at the base,
/// `hops[i]` is the probe quote for `tokens[i] -> tokens[i + 1]`.
#[derive(Clone, Debug)]
pub struct ArbitrageCandidate {
    pub hash: CycleHash,
    pub tokens: Vec<Arc<Token>>,
    pub hops: Vec<Quote>,
    /// Sum of edge weights, negative for a cycle that returns more than its input
    pub weight: f64,
}

impl ArbitrageCandidate {
    pub fn new(tokens: Vec<Arc<Token>>, hops: Vec<Quote>, weight: f64) -> Self {
        let pools: Vec<PoolWrapper> = hops.iter().map(|q| q.pool.clone()).collect();
        let hash = CycleHash::generate(&tokens, &pools);
        Self { hash, tokens, hops, weight }
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn base(&self) -> Option<&Arc<Token>> {
        self.tokens.first()
    }

    pub fn pools(&self) -> Vec<PoolWrapper> {
        self.hops.iter().map(|q| q.pool.clone()).collect()
    }

    pub fn pool_addresses(&self) -> Vec<Address> {
        self.hops.iter().map(|q| q.pool.get_address()).collect()
    }

    pub fn contains_pool(&self, pool: &Address) -> bool {
        self.hops.iter().any(|q| q.pool.get_address() == *pool)
    }

    /// Output per unit of input along the whole cycle at the probe amount.
    pub fn expected_return(&self) -> f64 {
        (-self.weight).exp()
    }

    pub fn probe_amount(&self) -> U256 {
        self.hops.first().map(|q| q.amount_in).unwrap_or_default()
    }
}

impl Display for ArbitrageCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens = self.tokens.iter().map(|t| t.get_symbol()).collect::<Vec<String>>().join("->");
        write!(f, "{} hops={} return={:.6}", tokens, self.len(), self.expected_return())
    }
}
