use crate::logic::pools::{PoolSnapshot, PoolWrapper, ProtocolKind};
use crate::utils::constants::FEE_DENOMINATOR;
use crate::utils::token::Token;
use alloy_primitives::Address;
use dashmap::{DashMap, DashSet};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("pool {pool} fee {fee} is not below {FEE_DENOMINATOR} pips")]
    InvalidFee { pool: Address, fee: u32 },
    #[error("pool {0} trades a token against itself")]
    IdenticalTokens(Address),
    #[error("concentrated pool {0} needs a positive tick spacing")]
    MissingTickSpacing(Address),
    #[error("unknown pool {0}")]
    UnknownPool(Address),
}

fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a <= b { (a, b) } else { (b, a) }
}

/// All known pools and tokens. Pools are never removed. A pool that cannot be read is
/// marked degraded and skipped until restored.
#[derive(Default)]
pub struct PoolRegistry {
    tokens: DashMap<Address, Arc<Token>>,
    pools: DashMap<Address, PoolWrapper>,
    // registration order, shared by all_pools() and resolve()
    order: RwLock<Vec<PoolWrapper>>,
    // sorted token pair -> pools in registration order
    pairs: DashMap<(Address, Address), Vec<PoolWrapper>>,
    pools_degraded: DashSet<Address>,
    snapshots: DashMap<Address, Arc<PoolSnapshot>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a [`Token`] to the registry. An already known address keeps its first definition.
    pub fn add_token<T: Into<Arc<Token>>>(&self, token: T) -> Arc<Token> {
        let token: Arc<Token> = token.into();
        self.tokens.entry(token.get_address()).or_insert(token).clone()
    }

    pub fn get_token(&self, address: &Address) -> Option<Arc<Token>> {
        self.tokens.get(address).map(|token| token.clone())
    }

    /// Register a pool. Returns `false` when the address was already registered.
    pub fn register<T: Into<PoolWrapper>>(&self, pool: T) -> Result<bool, RegistryError> {
        let pool: PoolWrapper = pool.into();
        let address = pool.get_address();

        if pool.get_fee() >= FEE_DENOMINATOR {
            return Err(RegistryError::InvalidFee { pool: address, fee: pool.get_fee() });
        }
        let [token0, token1] = pool.get_tokens();
        if token0 == token1 {
            return Err(RegistryError::IdenticalTokens(address));
        }
        if pool.get_kind() == ProtocolKind::ConcentratedLiquidity && pool.get_tick_spacing().is_none_or(|spacing| spacing <= 0) {
            return Err(RegistryError::MissingTickSpacing(address));
        }

        let mut order = self.order.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.pools.contains_key(&address) {
            return Ok(false);
        }
        self.add_token(pool.get_token0().clone());
        self.add_token(pool.get_token1().clone());

        self.pools.insert(address, pool.clone());
        self.pairs.entry(pair_key(token0, token1)).or_default().push(pool.clone());
        order.push(pool.clone());
        debug!(%pool, "Registered pool");
        Ok(true)
    }

    /// Pools trading the pair in either direction, in registration order. Degraded pools are included.
    pub fn resolve(&self, token_a: &Address, token_b: &Address) -> Vec<PoolWrapper> {
        self.pairs.get(&pair_key(*token_a, *token_b)).map(|pools| pools.clone()).unwrap_or_default()
    }

    pub fn get_pool(&self, address: &Address) -> Option<PoolWrapper> {
        self.pools.get(address).map(|pool| pool.clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.pools.contains_key(address)
    }

    fn pool_at(&self, index: usize) -> Option<PoolWrapper> {
        self.order.read().unwrap_or_else(|poisoned| poisoned.into_inner()).get(index).cloned()
    }

    /// Lazily walks every registered pool in registration order. Each call starts from the beginning
    /// and sees pools registered while iterating.
    pub fn all_pools(&self) -> impl Iterator<Item = PoolWrapper> + '_ {
        (0..).map_while(move |index| self.pool_at(index))
    }

    pub fn enabled_pools(&self) -> impl Iterator<Item = PoolWrapper> + '_ {
        self.all_pools().filter(|pool| !self.is_degraded(&pool.get_address()))
    }

    pub fn pools_len(&self) -> usize {
        self.pools.len()
    }

    pub fn degraded_pools_len(&self) -> usize {
        self.pools_degraded.len()
    }

    pub fn is_degraded(&self, address: &Address) -> bool {
        self.pools_degraded.contains(address)
    }

    /// Exclude a pool from quoting. Returns an error if the pool is not registered.
    pub fn mark_degraded(&self, address: Address) -> Result<(), RegistryError> {
        if !self.contains(&address) {
            return Err(RegistryError::UnknownPool(address));
        }
        if self.pools_degraded.insert(address) {
            warn!(pool = %address, "Pool marked degraded");
        }
        Ok(())
    }

    pub fn restore(&self, address: Address) -> Result<(), RegistryError> {
        if !self.contains(&address) {
            return Err(RegistryError::UnknownPool(address));
        }
        if self.pools_degraded.remove(&address).is_some() {
            debug!(pool = %address, "Pool restored");
        }
        Ok(())
    }

    pub fn snapshot(&self, address: &Address) -> Option<Arc<PoolSnapshot>> {
        self.snapshots.get(address).map(|snapshot| snapshot.clone())
    }

    pub(crate) fn store_snapshot(&self, address: Address, snapshot: Arc<PoolSnapshot>) {
        self.snapshots.insert(address, snapshot);
    }
}
