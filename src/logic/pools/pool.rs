use super::state::{PoolSnapshot, PoolState, SwapError, SwapOutcome};
use crate::utils::constants::{EthereumFactoryAddress, SUSHISWAP_INIT_CODE_HASH, UNISWAP_V2_INIT_CODE_HASH};
use crate::utils::token::Token;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, VariantNames};

pub fn get_protocol_by_factory(factory_address: Address) -> Option<PoolProtocol> {
    if factory_address == EthereumFactoryAddress::UNISWAP_V2 {
        Some(PoolProtocol::UniswapV2)
    } else if factory_address == EthereumFactoryAddress::SUSHISWAP {
        Some(PoolProtocol::Sushiswap)
    } else if factory_address == EthereumFactoryAddress::UNISWAP_V3 {
        Some(PoolProtocol::UniswapV3)
    } else {
        None
    }
}

/// Pricing model of a pool. Every quote dispatches on this.
#[derive(Copy, Clone, Debug, Display, PartialEq, Hash, Eq, EnumString, VariantNames, Deserialize, Serialize, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolKind {
    ConstantProduct,
    ConcentratedLiquidity,
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Hash, Eq, EnumString, VariantNames, Deserialize, Serialize, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolProtocol {
    UniswapV2,
    Sushiswap,
    UniswapV3,
}

impl PoolProtocol {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            PoolProtocol::UniswapV2 | PoolProtocol::Sushiswap => ProtocolKind::ConstantProduct,
            PoolProtocol::UniswapV3 => ProtocolKind::ConcentratedLiquidity,
        }
    }

    pub fn factory(&self) -> Address {
        match self {
            PoolProtocol::UniswapV2 => EthereumFactoryAddress::UNISWAP_V2,
            PoolProtocol::Sushiswap => EthereumFactoryAddress::SUSHISWAP,
            PoolProtocol::UniswapV3 => EthereumFactoryAddress::UNISWAP_V3,
        }
    }

    /// Pair creation code hash for protocols whose pool address is derivable with CREATE2 from the token pair alone.
    pub fn pair_init_code_hash(&self) -> Option<B256> {
        match self {
            PoolProtocol::UniswapV2 => Some(UNISWAP_V2_INIT_CODE_HASH),
            PoolProtocol::Sushiswap => Some(SUSHISWAP_INIT_CODE_HASH),
            PoolProtocol::UniswapV3 => None,
        }
    }
}

/// Immutable identity of a liquidity pool. Mutable reserves and prices live in
/// [`PoolSnapshot`]s held by the registry.
#[derive(Clone, Serialize, Deserialize)]
pub struct Pool {
    address: Address,
    protocol: PoolProtocol,
    token0: Arc<Token>,
    token1: Arc<Token>,
    /// Swap fee in hundredths of a basis point (pips)
    fee: u32,
    tick_spacing: Option<i32>,
}

pub type PoolWrapper = Arc<Pool>;

impl Pool {
    pub fn new(address: Address, protocol: PoolProtocol, token0: Arc<Token>, token1: Arc<Token>, fee: u32) -> Self {
        Self { address, protocol, token0, token1, fee, tick_spacing: None }
    }

    pub fn with_tick_spacing(mut self, tick_spacing: i32) -> Self {
        self.tick_spacing = Some(tick_spacing);
        self
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn get_protocol(&self) -> PoolProtocol {
        self.protocol
    }

    pub fn get_kind(&self) -> ProtocolKind {
        self.protocol.kind()
    }

    pub fn get_fee(&self) -> u32 {
        self.fee
    }

    pub fn get_tick_spacing(&self) -> Option<i32> {
        self.tick_spacing
    }

    pub fn get_token0(&self) -> &Arc<Token> {
        &self.token0
    }

    pub fn get_token1(&self) -> &Arc<Token> {
        &self.token1
    }

    pub fn get_tokens(&self) -> [Address; 2] {
        [self.token0.get_address(), self.token1.get_address()]
    }

    pub fn contains_token(&self, token: &Address) -> bool {
        self.token0.get_address() == *token || self.token1.get_address() == *token
    }

    pub fn get_swap_directions(&self) -> [(Arc<Token>, Arc<Token>); 2] {
        [(self.token0.clone(), self.token1.clone()), (self.token1.clone(), self.token0.clone())]
    }

    /// `Some(true)` when `token_in` is token0, `None` when the pool does not trade it.
    pub fn zero_for_one(&self, token_in: &Address) -> Option<bool> {
        if self.token0.get_address() == *token_in {
            Some(true)
        } else if self.token1.get_address() == *token_in {
            Some(false)
        } else {
            None
        }
    }

    pub fn other_token(&self, token: &Address) -> Option<&Arc<Token>> {
        match self.zero_for_one(token)? {
            true => Some(&self.token1),
            false => Some(&self.token0),
        }
    }

    /// Exact-input swap against a snapshot of this pool.
    pub fn swap_exact_in(&self, snapshot: &PoolSnapshot, zero_for_one: bool, amount_in: U256) -> Result<SwapOutcome, SwapError> {
        snapshot.state.swap_exact_in(zero_for_one, amount_in, self.fee)
    }

    /// Marginal output per unit of input for a trade of `amount_in` raw units, fee included.
    pub fn probe_rate(&self, snapshot: &PoolSnapshot, zero_for_one: bool, amount_in: U256) -> f64 {
        snapshot.state.probe_rate(zero_for_one, amount_in, self.fee)
    }

    pub fn spot_price(&self, snapshot: &PoolSnapshot, zero_for_one: bool) -> f64 {
        snapshot.state.spot_price(zero_for_one)
    }

    pub fn state_matches_kind(&self, state: &PoolState) -> bool {
        state.kind() == self.get_kind()
    }
}

impl PartialOrd for Pool {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Pool {}

impl Ord for Pool {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Hash for Pool {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl Display for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(fee={})@{:?}", self.protocol, self.fee, self.address)
    }
}

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}/{}, fee={})@{:?}", self.protocol, self.token0, self.token1, self.fee, self.address)
    }
}
