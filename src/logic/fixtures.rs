use crate::logic::graph::{FastHashMap, QuoteGraph};
use crate::logic::pools::{Pool, PoolProtocol, PoolSnapshot, PoolWrapper};
use crate::logic::quote::Quote;
use crate::utils::token::Token;
use alloy_primitives::{Address, U256};
use std::sync::Arc;

/// Constant-product market built in memory, with every token at zero decimals.
#[derive(Default)]
pub(crate) struct TestMarket {
    pub tokens: Vec<Arc<Token>>,
    pub pools: Vec<(PoolWrapper, Arc<PoolSnapshot>)>,
}

impl TestMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&mut self, byte: u8, symbol: &str) -> Arc<Token> {
        let token = Arc::new(Token::new_with_data(Address::repeat_byte(byte), Some(symbol.to_string()), None, Some(0)));
        self.tokens.push(token.clone());
        token
    }

    /// Adds a pool holding `reserve_a` of `a` and `reserve_b` of `b`.
    pub fn cp_pool(&mut self, byte: u8, a: &Arc<Token>, b: &Arc<Token>, reserve_a: u64, reserve_b: u64, fee: u32) -> PoolWrapper {
        let (t0, t1, r0, r1) = if a.get_address() < b.get_address() { (a, b, reserve_a, reserve_b) } else { (b, a, reserve_b, reserve_a) };
        let pool: PoolWrapper = Arc::new(Pool::new(Address::repeat_byte(byte), PoolProtocol::UniswapV2, t0.clone(), t1.clone(), fee));
        let snapshot = Arc::new(PoolSnapshot::constant_product(U256::from(r0), U256::from(r1)));
        self.pools.push((pool.clone(), snapshot));
        pool
    }

    pub fn snapshots(&self) -> FastHashMap<Address, Arc<PoolSnapshot>> {
        self.pools.iter().map(|(pool, snapshot)| (pool.get_address(), snapshot.clone())).collect()
    }

    pub fn probe_quotes(&self) -> Vec<Quote> {
        let mut quotes = Vec::new();
        for (pool, snapshot) in self.pools.iter() {
            for (token_in, _) in pool.get_swap_directions() {
                if let Ok(quote) = Quote::from_snapshot(pool, snapshot, &token_in.get_address(), U256::from(1)) {
                    quotes.push(quote);
                }
            }
        }
        quotes
    }

    pub fn graph(&self) -> QuoteGraph {
        QuoteGraph::from_quotes(self.probe_quotes())
    }
}
