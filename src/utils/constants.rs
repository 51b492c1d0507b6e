use alloy_primitives::{Address, B256, address, b256};

pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");

pub const NATIVE: Address = Address::ZERO;

#[non_exhaustive]
pub struct EthereumFactoryAddress;

impl EthereumFactoryAddress {
    // Uniswap V2 compatible
    pub const UNISWAP_V2: Address = address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");
    pub const SUSHISWAP: Address = address!("C0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac");

    // Uniswap V3 compatible
    pub const UNISWAP_V3: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
}

/// keccak256 of the UniswapV2Pair creation code, used for CREATE2 pair derivation.
pub const UNISWAP_V2_INIT_CODE_HASH: B256 = b256!("96e8ac4277198ff8b6f785478aa9a39f403cb768dd02cbee326c3e7da348845f");
pub const SUSHISWAP_INIT_CODE_HASH: B256 = b256!("e18a34eb0e04b04f7a0ac29a6e80748dca96319b42c520440cc9f5fa4d2da21c");

/// Uniswap V3 fee tiers in pips and their tick spacing.
pub const UNISWAP_V3_FEE_TIERS: [(u32, i32); 3] = [(500, 10), (3000, 60), (10000, 200)];

/// Fee denominator shared by all pools (hundredths of a basis point).
pub const FEE_DENOMINATOR: u32 = 1_000_000;

pub fn tick_spacing_for_fee(fee: u32) -> Option<i32> {
    UNISWAP_V3_FEE_TIERS.iter().find(|(tier_fee, _)| *tier_fee == fee).map(|(_, spacing)| *spacing)
}
