use super::abi::{DecodedValue, PoolCall};
use super::markets::{MarketConfigRoot, PoolConfig, PoolRegistry, TokenConfig};
use super::transport::{BlockTag, RpcTransport};
use crate::logic::pools::{Pool, PoolProtocol, PoolWrapper, ProtocolKind, get_protocol_by_factory, pair_for, sort_tokens};
use crate::utils::constants::tick_spacing_for_fee;
use crate::utils::token::Token;
use alloy_primitives::Address;
use eyre::{Result, WrapErr, eyre};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_CONSTANT_PRODUCT_FEE: u32 = 3000;

/// Fills in token metadata and pool immutables the configuration leaves out, then registers them.
pub struct MarketLoader {
    transport: Arc<dyn RpcTransport>,
    block: BlockTag,
}

impl MarketLoader {
    pub fn new(transport: Arc<dyn RpcTransport>, block: BlockTag) -> Self {
        Self { transport, block }
    }

    /// Load every configured token, then every configured pool, into `registry`.
    /// Pools are registered in configuration order. Returns the number of new pools.
    pub async fn load_market(&self, config: &MarketConfigRoot, registry: &PoolRegistry) -> Result<usize> {
        let tokens = try_join_all(config.tokens.iter().map(|token| self.load_token(token))).await?;
        for token in tokens {
            registry.add_token(token);
        }

        let pools = try_join_all(config.pools.iter().map(|pool| self.load_pool(pool, registry))).await?;
        let mut added = 0;
        for pool in pools {
            let address = pool.get_address();
            if registry.register(pool).wrap_err_with(|| format!("Cannot register pool {address}"))? {
                added += 1;
            }
        }

        info!(tokens = config.tokens.len(), pools = added, "Market loaded");
        Ok(added)
    }

    /// Decimals are required, symbol and name are best effort.
    pub async fn load_token(&self, config: &TokenConfig) -> Result<Token> {
        let decimals = match config.decimals {
            Some(decimals) => decimals,
            None => self
                .read(config.address, PoolCall::Decimals)
                .await?
                .decimals()
                .wrap_err_with(|| format!("Token {} returned no decimals", config.address))?,
        };

        let symbol = match &config.symbol {
            Some(symbol) => Some(symbol.clone()),
            None => self.read_text(config.address, PoolCall::Symbol).await,
        };
        let name = match &config.name {
            Some(name) => Some(name.clone()),
            None => self.read_text(config.address, PoolCall::Name).await,
        };

        debug!(address = %config.address, ?symbol, decimals, "Loaded token");
        Ok(Token::new_with_data(config.address, symbol, name, Some(decimals)))
    }

    pub async fn load_pool(&self, config: &PoolConfig, registry: &PoolRegistry) -> Result<PoolWrapper> {
        let protocol = match (config.protocol, config.factory) {
            (Some(protocol), _) => protocol,
            (None, Some(factory)) => get_protocol_by_factory(factory).ok_or_else(|| eyre!("Unknown factory {factory}"))?,
            (None, None) => return Err(eyre!("Pool {:?} needs a protocol or a factory", config.address)),
        };

        let address = match config.address {
            Some(address) => address,
            None => derive_pair_address(config, protocol)?,
        };

        let (token0, token1) = match (config.token0, config.token1) {
            (Some(token0), Some(token1)) => sort_tokens(token0, token1)?,
            _ => {
                let (token0, token1) =
                    futures::try_join!(self.read(address, PoolCall::Token0), self.read(address, PoolCall::Token1))?;
                (token0.address()?, token1.address()?)
            }
        };

        let token0 = self.token(token0, registry).await?;
        let token1 = self.token(token1, registry).await?;

        let mut pool = match protocol.kind() {
            ProtocolKind::ConstantProduct => {
                Pool::new(address, protocol, token0, token1, config.fee.unwrap_or(DEFAULT_CONSTANT_PRODUCT_FEE))
            }
            ProtocolKind::ConcentratedLiquidity => {
                let fee = match config.fee {
                    Some(fee) => fee,
                    None => self.read_for(address, protocol, PoolCall::Fee).await?.fee()?,
                };
                Pool::new(address, protocol, token0, token1, fee)
            }
        };

        if protocol.kind() == ProtocolKind::ConcentratedLiquidity {
            let tick_spacing = match config.tick_spacing.or_else(|| tick_spacing_for_fee(pool.get_fee())) {
                Some(tick_spacing) => tick_spacing,
                None => self.read_for(address, protocol, PoolCall::TickSpacing).await?.tick_spacing()?,
            };
            pool = pool.with_tick_spacing(tick_spacing);
        }

        debug!(%pool, "Loaded pool");
        Ok(Arc::new(pool))
    }

    // tokens not listed in the configuration are loaded on first use
    async fn token(&self, address: Address, registry: &PoolRegistry) -> Result<Arc<Token>> {
        if let Some(token) = registry.get_token(&address) {
            return Ok(token);
        }
        let token = self.load_token(&TokenConfig::new(address)).await?;
        Ok(registry.add_token(token))
    }

    async fn read(&self, to: Address, call: PoolCall) -> Result<DecodedValue> {
        let data = call.encode()?;
        let raw = self.transport.call(to, data, self.block).await.wrap_err_with(|| format!("{} on {to}", call.signature()))?;
        Ok(call.decode(&raw)?)
    }

    async fn read_for(&self, to: Address, protocol: PoolProtocol, call: PoolCall) -> Result<DecodedValue> {
        let data = call.encode_for(protocol.kind())?;
        let raw = self.transport.call(to, data, self.block).await.wrap_err_with(|| format!("{} on {to}", call.signature()))?;
        Ok(call.decode(&raw)?)
    }

    async fn read_text(&self, to: Address, call: PoolCall) -> Option<String> {
        match self.read(to, call).await.and_then(|value| Ok(value.text()?)) {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(%to, %error, "Token metadata unavailable");
                None
            }
        }
    }
}

fn derive_pair_address(config: &PoolConfig, protocol: PoolProtocol) -> Result<Address> {
    let (Some(token0), Some(token1)) = (config.token0, config.token1) else {
        return Err(eyre!("Pool without address needs token0 and token1"));
    };
    let init_code_hash = protocol.pair_init_code_hash().ok_or_else(|| eyre!("{protocol} pool addresses cannot be derived"))?;
    let factory = config.factory.unwrap_or_else(|| protocol.factory());
    Ok(pair_for(factory, token0, token1, init_code_hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::mock_transport::{MockTransport, word};
    use crate::utils::constants::{EthereumFactoryAddress, USDC, WETH};
    use alloy_primitives::{Bytes, U256, address};
    use alloy_sol_types::SolValue;

    fn loader(transport: Arc<MockTransport>) -> MarketLoader {
        MarketLoader::new(transport, BlockTag::Latest)
    }

    fn text_response(text: &str) -> Bytes {
        (text.to_string(),).abi_encode_params().into()
    }

    #[tokio::test]
    async fn test_load_token_reads_metadata() {
        let transport = Arc::new(MockTransport::new());
        transport.set_decimals(USDC, 6);
        transport.set_response(USDC, PoolCall::Symbol, Ok(text_response("USDC")));

        let token = loader(transport).load_token(&TokenConfig::new(USDC)).await.unwrap();
        assert_eq!(token.get_decimals(), 6);
        assert_eq!(token.get_symbol(), "USDC");
        // name() reverted on the mock, so it is left empty
        assert_eq!(token.get_name(), USDC.to_string());
    }

    #[tokio::test]
    async fn test_load_token_without_decimals_fails() {
        let transport = Arc::new(MockTransport::new());
        assert!(loader(transport).load_token(&TokenConfig::new(WETH)).await.is_err());
    }

    #[tokio::test]
    async fn test_derives_pair_address_from_factory() {
        let transport = Arc::new(MockTransport::new());
        let registry = PoolRegistry::new();
        registry.add_token(Token::new_with_data(USDC, Some("USDC".to_string()), None, Some(6)));
        registry.add_token(Token::new_with_data(WETH, Some("WETH".to_string()), None, Some(18)));

        let config = PoolConfig {
            address: None,
            protocol: None,
            factory: Some(EthereumFactoryAddress::UNISWAP_V2),
            token0: Some(WETH),
            token1: Some(USDC),
            fee: None,
            tick_spacing: None,
        };
        let pool = loader(transport.clone()).load_pool(&config, &registry).await.unwrap();
        assert_eq!(pool.get_address(), address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc"));
        assert_eq!(pool.get_protocol(), PoolProtocol::UniswapV2);
        assert_eq!(pool.get_tokens(), [USDC, WETH]);
        assert_eq!(pool.get_fee(), 3000);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_concentrated_pool_from_chain() {
        let transport = Arc::new(MockTransport::new());
        let pool_address = Address::repeat_byte(0x30);
        transport.set_token0(pool_address, USDC);
        transport.set_token1(pool_address, WETH);
        transport.set_decimals(USDC, 6);
        transport.set_decimals(WETH, 18);
        transport.set_response(pool_address, PoolCall::Fee, Ok(Bytes::from(word(U256::from(500)).to_vec())));

        let registry = PoolRegistry::new();
        let config = MarketConfigRoot {
            pools: vec![PoolConfig {
                address: Some(pool_address),
                protocol: Some(PoolProtocol::UniswapV3),
                factory: None,
                token0: None,
                token1: None,
                fee: None,
                tick_spacing: None,
            }],
            ..MarketConfigRoot::default()
        };

        let added = loader(transport).load_market(&config, &registry).await.unwrap();
        assert_eq!(added, 1);
        let pool = registry.get_pool(&pool_address).unwrap();
        assert_eq!(pool.get_fee(), 500);
        assert_eq!(pool.get_tick_spacing(), Some(10));
        assert_eq!(pool.get_token0().get_decimals(), 6);
        assert_eq!(registry.get_token(&WETH).unwrap().get_decimals(), 18);
    }

    #[tokio::test]
    async fn test_pool_needs_venue() {
        let transport = Arc::new(MockTransport::new());
        let config = PoolConfig {
            address: Some(Address::repeat_byte(0x30)),
            protocol: None,
            factory: Some(Address::repeat_byte(0x99)),
            token0: None,
            token1: None,
            fee: None,
            tick_spacing: None,
        };
        assert!(loader(transport).load_pool(&config, &PoolRegistry::new()).await.is_err());
    }
}
