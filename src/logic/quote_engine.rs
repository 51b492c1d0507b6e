use super::evaluator::SnapshotSet;
use super::quote::{Quote, QuoteError};
use super::types::{CancelToken, EngineConfig};
use crate::data_sync::abi::{DecodedValue, PoolCall};
use crate::data_sync::markets::PoolRegistry;
use crate::data_sync::transport::{BlockTag, RpcTransport};
use crate::logic::pools::{ConcentratedState, ConstantProductState, PoolSnapshot, PoolState, PoolWrapper, ProtocolKind};
use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use futures::future::{join_all, try_join_all};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reads pool state through the transport and prices swaps against it.
///
/// Cached state younger than the freshness window is reused. Refreshes of one pool are
/// serialized through a per-pool lock, so concurrent quotes on the same pool trigger at most
/// one fetch.
pub struct QuoteEngine {
    transport: Arc<dyn RpcTransport>,
    registry: Arc<PoolRegistry>,
    block: BlockTag,
    freshness: Duration,
    tick_word_radius: i16,
    probe_divisor: u64,
    refresh_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl QuoteEngine {
    pub fn new(transport: Arc<dyn RpcTransport>, registry: Arc<PoolRegistry>, block: BlockTag, config: &EngineConfig) -> Self {
        Self {
            transport,
            registry,
            block,
            freshness: config.freshness(),
            tick_word_radius: config.tick_word_radius.max(0),
            probe_divisor: config.probe_divisor.max(1),
            refresh_locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn block(&self) -> BlockTag {
        self.block
    }

    /// Refresh `pool` and quote the probe amount of token0 against it.
    pub async fn refresh(&self, pool: &PoolWrapper) -> Result<Quote, QuoteError> {
        let snapshot = self.refresh_snapshot(pool, None).await?;
        let token0 = pool.get_token0();
        Quote::from_snapshot(pool, &snapshot, &token0.get_address(), token0.probe_amount(self.probe_divisor))
    }

    /// Cached snapshot when fresh, otherwise a newly fetched one. Fetch failures mark the pool degraded,
    /// a degraded pool is always fetched again and restored once a fetch succeeds.
    pub async fn refresh_snapshot(&self, pool: &PoolWrapper, cancel: Option<&CancelToken>) -> Result<Arc<PoolSnapshot>, QuoteError> {
        let address = pool.get_address();
        if !self.registry.contains(&address) {
            return Err(QuoteError::UnknownPool(address));
        }
        if let Some(snapshot) = self.fresh_snapshot(&address) {
            return Ok(snapshot);
        }

        let lock = self.refresh_locks.entry(address).or_default().clone();
        let _guard = lock.lock().await;

        // another task may have refreshed while we waited
        if let Some(snapshot) = self.fresh_snapshot(&address) {
            return Ok(snapshot);
        }

        match self.fetch_state(pool, cancel).await {
            Ok(state) => {
                let snapshot = Arc::new(PoolSnapshot::new(state, self.block.block_number()));
                self.registry.store_snapshot(address, snapshot.clone());
                if self.registry.is_degraded(&address) {
                    let _ = self.registry.restore(address);
                }
                debug!(%pool, "Refreshed pool state");
                Ok(snapshot)
            }
            Err(error) => {
                if error.degrades_pool() {
                    warn!(%pool, %error, "Pool refresh failed");
                    let _ = self.registry.mark_degraded(address);
                }
                Err(error)
            }
        }
    }

    // cached state of a degraded pool is never reused
    fn fresh_snapshot(&self, address: &Address) -> Option<Arc<PoolSnapshot>> {
        if self.registry.is_degraded(address) {
            return None;
        }
        self.registry.snapshot(address).filter(|snapshot| snapshot.is_fresh(self.freshness))
    }

    /// Best quote for the pair by output amount. Pools whose refresh fails are left out of this quote only.
    /// Ties keep registration order.
    pub async fn quote(&self, asset_in: &Address, asset_out: &Address, amount_in: U256) -> Result<Quote, QuoteError> {
        let pools = self.registry.resolve(asset_in, asset_out);

        let results = join_all(pools.iter().map(|pool| self.quote_pool(pool, asset_in, amount_in))).await;

        let mut best: Option<Quote> = None;
        for (pool, result) in pools.iter().zip(results) {
            match result {
                Ok(quote) => {
                    if best.as_ref().is_none_or(|current| quote.amount_out > current.amount_out) {
                        best = Some(quote);
                    }
                }
                Err(error) => debug!(%pool, %error, "Pool skipped for quote"),
            }
        }
        best.ok_or(QuoteError::NoLiquidity { asset_in: *asset_in, asset_out: *asset_out })
    }

    pub async fn quote_pool(&self, pool: &PoolWrapper, asset_in: &Address, amount_in: U256) -> Result<Quote, QuoteError> {
        let snapshot = self.refresh_snapshot(pool, None).await?;
        Quote::from_snapshot(pool, &snapshot, asset_in, amount_in)
    }

    /// Refresh every registered pool in parallel, degraded ones included.
    /// Returns the state of the pools that refreshed successfully.
    pub async fn refresh_all(&self, cancel: &CancelToken) -> SnapshotSet {
        let pools: Vec<PoolWrapper> = self.registry.all_pools().collect();
        let results = join_all(pools.iter().map(|pool| self.refresh_snapshot(pool, Some(cancel)))).await;
        pools.iter().zip(results).filter_map(|(pool, result)| result.ok().map(|snapshot| (pool.get_address(), snapshot))).collect()
    }

    /// Cached state of every non-degraded pool that is still inside the freshness window.
    pub fn market_snapshot(&self) -> SnapshotSet {
        self.registry
            .enabled_pools()
            .filter_map(|pool| self.fresh_snapshot(&pool.get_address()).map(|snapshot| (pool.get_address(), snapshot)))
            .collect()
    }

    /// Probe quotes in both directions for every non-degraded pool with fresh cached state.
    pub fn probe_quotes(&self) -> Vec<Quote> {
        self.probe_quotes_for(&self.market_snapshot())
    }

    /// Probe quotes in both directions for every pool in `snapshots`, ordered by pool address.
    /// Pools that cannot be priced are left out.
    pub fn probe_quotes_for(&self, snapshots: &SnapshotSet) -> Vec<Quote> {
        let mut pools: Vec<PoolWrapper> = snapshots.keys().filter_map(|address| self.registry.get_pool(address)).collect();
        pools.sort();

        let mut quotes = Vec::with_capacity(pools.len() * 2);
        for pool in pools {
            let Some(snapshot) = snapshots.get(&pool.get_address()) else {
                continue;
            };
            for (token_in, _) in pool.get_swap_directions() {
                match Quote::from_snapshot(&pool, snapshot, &token_in.get_address(), token_in.probe_amount(self.probe_divisor)) {
                    Ok(quote) => quotes.push(quote),
                    Err(error) => debug!(%pool, %error, "No probe quote"),
                }
            }
        }
        quotes
    }

    async fn read(&self, to: Address, kind: ProtocolKind, call: PoolCall, cancel: Option<&CancelToken>) -> Result<DecodedValue, QuoteError> {
        if cancel.is_some_and(|cancel| cancel.is_cancelled()) {
            return Err(QuoteError::Cancelled);
        }
        let data = call.encode_for(kind)?;
        let raw = self.transport.call(to, data, self.block).await?;
        Ok(call.decode(&raw)?)
    }

    async fn fetch_state(&self, pool: &PoolWrapper, cancel: Option<&CancelToken>) -> Result<PoolState, QuoteError> {
        let address = pool.get_address();
        let kind = pool.get_kind();
        match kind {
            ProtocolKind::ConstantProduct => {
                let (reserve0, reserve1) = self.read(address, kind, PoolCall::GetReserves, cancel).await?.reserves()?;
                Ok(PoolState::ConstantProduct(ConstantProductState { reserve0, reserve1 }))
            }
            ProtocolKind::ConcentratedLiquidity => {
                let tick_spacing = pool.get_tick_spacing().ok_or(QuoteError::MissingTickSpacing(address))?;
                let (slot0, liquidity) = futures::try_join!(
                    self.read(address, kind, PoolCall::Slot0, cancel),
                    self.read(address, kind, PoolCall::Liquidity, cancel)
                )?;
                let (sqrt_price_x96, tick) = slot0.slot0()?;
                let liquidity = liquidity.liquidity()?;

                let center = ConcentratedState::word_of(tick, tick_spacing);
                let loaded_words = center.saturating_sub(self.tick_word_radius)..=center.saturating_add(self.tick_word_radius);

                let words = try_join_all(loaded_words.clone().map(|word_position| async move {
                    let bits = self.read(address, kind, PoolCall::TickBitmap(word_position), cancel).await?.word()?;
                    Ok::<_, QuoteError>((word_position, bits))
                }))
                .await?;

                let initialized: Vec<i32> = words
                    .iter()
                    .flat_map(|(word_position, bits)| {
                        (0..256usize)
                            .filter(|bit| bits.bit(*bit))
                            .map(move |bit| ((*word_position as i32) * 256 + bit as i32) * tick_spacing)
                    })
                    .collect();

                let nets = try_join_all(initialized.into_iter().map(|tick_index| async move {
                    let net = self.read(address, kind, PoolCall::Ticks(tick_index), cancel).await?.tick_liquidity_net()?;
                    Ok::<_, QuoteError>((tick_index, net))
                }))
                .await?;
                let ticks: BTreeMap<i32, i128> = nets.into_iter().filter_map(|(tick_index, net)| net.map(|net| (tick_index, net))).collect();

                debug!(pool = %address, tick, liquidity, initialized_ticks = ticks.len(), "Loaded tick window");
                Ok(PoolState::ConcentratedLiquidity(ConcentratedState {
                    sqrt_price_x96,
                    tick,
                    liquidity,
                    tick_spacing,
                    ticks,
                    loaded_words,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::mock_transport::MockTransport;
    use crate::data_sync::rpc_error::RpcError;
    use crate::logic::math::get_sqrt_ratio_at_tick;
    use crate::logic::pools::{Pool, PoolProtocol};
    use crate::logic::quote::Fill;
    use crate::utils::token::Token;

    fn token(byte: u8) -> Arc<Token> {
        Arc::new(Token::new_with_data(Address::repeat_byte(byte), None, None, Some(0)))
    }

    fn setup(transport: MockTransport, freshness_ms: u64) -> (Arc<MockTransport>, QuoteEngine) {
        let transport = Arc::new(transport);
        let registry = Arc::new(PoolRegistry::new());
        let config = EngineConfig { freshness_ms, ..EngineConfig::default() };
        let engine = QuoteEngine::new(transport.clone(), registry, BlockTag::Latest, &config);
        (transport, engine)
    }

    fn v2_pool(engine: &QuoteEngine, transport: &MockTransport, address: u8, reserve0: u64, reserve1: u64) -> PoolWrapper {
        let pool = Arc::new(Pool::new(Address::repeat_byte(address), PoolProtocol::Sushiswap, token(1), token(2), 3000));
        engine.registry().register(pool.clone()).unwrap();
        transport.set_reserves(pool.get_address(), U256::from(reserve0), U256::from(reserve1));
        pool
    }

    #[tokio::test]
    async fn test_concurrent_quotes_share_one_refresh() {
        let (transport, engine) = setup(MockTransport::new().with_delay(Duration::from_millis(20)), 60_000);
        let pool = v2_pool(&engine, &transport, 0x10, 1_000_000, 1_000_000);

        let (asset_in, asset_out) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let quotes = join_all((0..50).map(|_| engine.quote(&asset_in, &asset_out, U256::from(1_000)))).await;

        assert!(quotes.iter().all(|quote| quote.as_ref().is_ok_and(|q| q.amount_out == U256::from(996))));
        assert_eq!(transport.calls_to(&pool.get_address()), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent_within_window() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        let pool = v2_pool(&engine, &transport, 0x10, 5_000, 7_000);

        let first = engine.refresh(&pool).await.unwrap();
        transport.set_reserves(pool.get_address(), U256::from(1), U256::from(1));
        let second = engine.refresh(&pool).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_window_fetches_again() {
        let (transport, engine) = setup(MockTransport::new(), 0);
        let pool = v2_pool(&engine, &transport, 0x10, 5_000, 7_000);

        engine.refresh(&pool).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        transport.set_reserves(pool.get_address(), U256::from(7_000), U256::from(5_000));
        let quote = engine.refresh(&pool).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert!(quote.spot_price < 1.0);
    }

    #[tokio::test]
    async fn test_failing_pool_is_degraded_and_skipped() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        let bad = v2_pool(&engine, &transport, 0x10, 1_000_000, 1_000_000);
        let good = v2_pool(&engine, &transport, 0x11, 1_000_000, 900_000);
        transport.fail(bad.get_address(), RpcError::Revert { reason: Some("paused".to_string()), data: Default::default() });

        let quote = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::from(1_000)).await.unwrap();
        assert_eq!(quote.pool.get_address(), good.get_address());
        assert!(engine.registry().is_degraded(&bad.get_address()));

        // the next quote tries the degraded pool again and still falls back to the good one
        let calls = transport.calls_to(&bad.get_address());
        let quote = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::from(1_000)).await.unwrap();
        assert_eq!(quote.pool.get_address(), good.get_address());
        assert_eq!(transport.calls_to(&bad.get_address()), calls + 1);

        // once it answers again it is restored and wins on price
        transport.heal(&bad.get_address());
        let quote = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::from(1_000)).await.unwrap();
        assert_eq!(quote.pool.get_address(), bad.get_address());
        assert!(!engine.registry().is_degraded(&bad.get_address()));
    }

    #[tokio::test]
    async fn test_refresh_all_restores_healed_pool() {
        let (transport, engine) = setup(MockTransport::new(), 0);
        let pool = v2_pool(&engine, &transport, 0x10, 1_000, 1_000);
        v2_pool(&engine, &transport, 0x11, 1_000, 1_200);

        assert_eq!(engine.refresh_all(&CancelToken::new()).await.len(), 2);
        transport.fail(pool.get_address(), RpcError::Transient("connection reset".to_string()));
        tokio::time::sleep(Duration::from_millis(2)).await;

        let refreshed = engine.refresh_all(&CancelToken::new()).await;
        assert_eq!(refreshed.len(), 1);
        assert!(!refreshed.contains_key(&pool.get_address()));
        assert!(engine.registry().is_degraded(&pool.get_address()));

        transport.heal(&pool.get_address());
        tokio::time::sleep(Duration::from_millis(2)).await;
        let refreshed = engine.refresh_all(&CancelToken::new()).await;
        assert_eq!(refreshed.len(), 2);
        assert!(!engine.registry().is_degraded(&pool.get_address()));
        assert_eq!(transport.calls_to(&pool.get_address()), 3);
    }

    #[tokio::test]
    async fn test_market_snapshot_drops_stale_state() {
        let (transport, engine) = setup(MockTransport::new(), 20);
        v2_pool(&engine, &transport, 0x10, 1_000, 1_000);

        let refreshed = engine.refresh_all(&CancelToken::new()).await;
        assert_eq!(refreshed.len(), 1);
        assert_eq!(engine.market_snapshot().len(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.market_snapshot().is_empty());
        assert!(engine.probe_quotes().is_empty());
        // the set handed back by the refresh stays usable
        assert_eq!(engine.probe_quotes_for(&refreshed).len(), 2);
    }

    #[tokio::test]
    async fn test_quote_picks_best_pool() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        v2_pool(&engine, &transport, 0x10, 1_000_000, 1_000_000);
        let deep = v2_pool(&engine, &transport, 0x11, 1_000_000, 2_000_000);

        let quote = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::from(1_000)).await.unwrap();
        assert_eq!(quote.pool.get_address(), deep.get_address());
    }

    #[tokio::test]
    async fn test_zero_amount_and_no_liquidity() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        v2_pool(&engine, &transport, 0x10, 0, 0);

        let zero = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::ZERO).await.unwrap();
        assert_eq!(zero.amount_out, U256::ZERO);

        let empty = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(2), U256::from(10)).await;
        assert!(matches!(empty, Err(QuoteError::NoLiquidity { .. })));

        let unknown_pair = engine.quote(&Address::repeat_byte(1), &Address::repeat_byte(7), U256::from(10)).await;
        assert!(matches!(unknown_pair, Err(QuoteError::NoLiquidity { .. })));
    }

    #[tokio::test]
    async fn test_concentrated_pool_loads_tick_window() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        let address = Address::repeat_byte(0x20);
        let pool = Arc::new(Pool::new(address, PoolProtocol::UniswapV3, token(1), token(2), 3000).with_tick_spacing(60));
        engine.registry().register(pool.clone()).unwrap();

        let liquidity = 10u128.pow(18);
        transport.set_concentrated(
            address,
            get_sqrt_ratio_at_tick(0).unwrap(),
            0,
            liquidity,
            60,
            &[(-600, liquidity as i128), (600, -(liquidity as i128))],
        );

        let snapshot = engine.refresh_snapshot(&pool, None).await.unwrap();
        let PoolState::ConcentratedLiquidity(state) = &snapshot.state else {
            panic!("expected concentrated state");
        };
        assert_eq!(state.ticks.len(), 2);
        assert_eq!(state.loaded_words, -2..=2);
        assert_eq!(state.ticks.get(&-600), Some(&(liquidity as i128)));

        let small = engine.quote_pool(&pool, &Address::repeat_byte(1), U256::from(10u64.pow(15))).await.unwrap();
        assert_eq!(small.fill, Fill::Full);
        assert!(small.amount_out > U256::ZERO);

        let huge = engine.quote_pool(&pool, &Address::repeat_byte(1), U256::from(10u128.pow(20))).await.unwrap();
        assert!(huge.is_partial());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_issues_no_calls() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        v2_pool(&engine, &transport, 0x10, 1_000, 1_000);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(engine.refresh_all(&cancel).await.is_empty());
        assert_eq!(transport.calls(), 0);
        assert_eq!(engine.registry().degraded_pools_len(), 0);
    }

    #[tokio::test]
    async fn test_probe_quotes_sorted_by_pool() {
        let (transport, engine) = setup(MockTransport::new(), 60_000);
        v2_pool(&engine, &transport, 0x30, 1_000, 1_000);
        v2_pool(&engine, &transport, 0x10, 1_000, 1_200);
        assert_eq!(engine.refresh_all(&CancelToken::new()).await.len(), 2);

        let quotes = engine.probe_quotes();
        let pools: Vec<_> = quotes.iter().map(|quote| quote.pool.get_address()).collect();
        assert_eq!(pools, vec![Address::repeat_byte(0x10), Address::repeat_byte(0x10), Address::repeat_byte(0x30), Address::repeat_byte(0x30)]);
    }
}
