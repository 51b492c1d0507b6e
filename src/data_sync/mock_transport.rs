use super::abi::PoolCall;
use super::rpc_error::RpcError;
use super::transport::{BlockTag, RpcTransport};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`RpcTransport`] answering `eth_call` from scripted pool state.
/// Counts calls and tracks the peak number of concurrent calls.
#[derive(Default)]
pub struct MockTransport {
    responses: DashMap<(Address, Bytes), Result<Bytes, RpcError>>,
    // targets whose unknown tickBitmap reads return an empty word
    bitmap_targets: DashSet<Address>,
    failing: DashMap<Address, RpcError>,
    block_number: AtomicU64,
    unreachable: bool,
    delay: Duration,
    calls: AtomicUsize,
    calls_by_target: DashMap<Address, usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub fn word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

pub fn signed_word(value: i128) -> [u8; 32] {
    if value < 0 { word(U256::MAX - U256::from(value.unsigned_abs() - 1)) } else { word(U256::from(value as u128)) }
}

fn encode_words(words: &[[u8; 32]]) -> Bytes {
    words.concat().into()
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `eth_blockNumber` always fails, as an unreachable endpoint would.
    pub fn unreachable() -> Self {
        Self { unreachable: true, ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_block_number(&self, block_number: u64) {
        self.block_number.store(block_number, Ordering::Relaxed);
    }

    pub fn set_response(&self, to: Address, call: PoolCall, response: Result<Bytes, RpcError>) {
        if let Ok(data) = call.encode() {
            self.responses.insert((to, data), response);
        }
    }

    /// Every call to `to` fails with `error` until [`MockTransport::heal`] is called.
    pub fn fail(&self, to: Address, error: RpcError) {
        self.failing.insert(to, error);
    }

    pub fn heal(&self, to: &Address) {
        self.failing.remove(to);
    }

    pub fn set_reserves(&self, pool: Address, reserve0: U256, reserve1: U256) {
        let data = encode_words(&[word(reserve0), word(reserve1), word(U256::from(1_700_000_000u64))]);
        self.set_response(pool, PoolCall::GetReserves, Ok(data));
    }

    /// Scripts slot0, liquidity and the tick bitmap of a concentrated pool from its initialized ticks.
    pub fn set_concentrated(&self, pool: Address, sqrt_price_x96: U256, tick: i32, liquidity: u128, tick_spacing: i32, ticks: &[(i32, i128)]) {
        let slot0 = encode_words(&[
            word(sqrt_price_x96),
            signed_word(tick as i128),
            word(U256::ZERO),
            word(U256::from(1)),
            word(U256::from(1)),
            word(U256::ZERO),
            word(U256::from(1)),
        ]);
        self.set_response(pool, PoolCall::Slot0, Ok(slot0));
        self.set_response(pool, PoolCall::Liquidity, Ok(encode_words(&[word(U256::from(liquidity))])));
        self.set_response(pool, PoolCall::TickSpacing, Ok(encode_words(&[signed_word(tick_spacing as i128)])));

        let mut bitmap: std::collections::BTreeMap<i16, U256> = std::collections::BTreeMap::new();
        for (tick_index, liquidity_net) in ticks {
            let compressed = tick_index.div_euclid(tick_spacing);
            let word_position = (compressed >> 8) as i16;
            let bit = (compressed & 255) as usize;
            let entry = bitmap.entry(word_position).or_default();
            *entry |= U256::from(1) << bit;

            let tick_data = encode_words(&[
                word(U256::from(liquidity_net.unsigned_abs())),
                signed_word(*liquidity_net),
                word(U256::ZERO),
                word(U256::ZERO),
                word(U256::ZERO),
                word(U256::ZERO),
                word(U256::ZERO),
                word(U256::from(1)),
            ]);
            self.set_response(pool, PoolCall::Ticks(*tick_index), Ok(tick_data));
        }
        for (word_position, bits) in bitmap {
            self.set_response(pool, PoolCall::TickBitmap(word_position), Ok(encode_words(&[word(bits)])));
        }
        self.bitmap_targets.insert(pool);
    }

    pub fn set_token0(&self, pool: Address, token: Address) {
        self.set_response(pool, PoolCall::Token0, Ok(encode_words(&[word(U256::from_be_slice(token.as_slice()))])));
    }

    pub fn set_token1(&self, pool: Address, token: Address) {
        self.set_response(pool, PoolCall::Token1, Ok(encode_words(&[word(U256::from_be_slice(token.as_slice()))])));
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.set_response(token, PoolCall::Decimals, Ok(encode_words(&[word(U256::from(decimals))])));
    }

    /// Total `eth_call`s served, failures included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, to: &Address) -> usize {
        self.calls_by_target.get(to).map(|count| *count).unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        if let Some(error) = self.failing.get(&to) {
            return Err(error.clone());
        }
        if let Some(response) = self.responses.get(&(to, data.clone())) {
            return response.clone();
        }
        let is_bitmap_read = PoolCall::TickBitmap(0).encode().is_ok_and(|probe| data.get(..4) == probe.get(..4));
        if is_bitmap_read && self.bitmap_targets.contains(&to) {
            return Ok(encode_words(&[word(U256::ZERO)]));
        }
        Err(RpcError::revert(Bytes::new()))
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, to: Address, data: Bytes, _block: BlockTag) -> Result<Bytes, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_target.entry(to).or_default() += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self.respond(to, data);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        if self.unreachable {
            return Err(RpcError::RetriesExhausted { attempts: 1, last: "connection refused".to_string() });
        }
        Ok(self.block_number.load(Ordering::Relaxed))
    }
}
