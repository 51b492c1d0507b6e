use crate::data_sync::config::RpcConfig;
use crate::logic::pools::PoolProtocol;
use crate::logic::types::EngineConfig;
use crate::utils::config_loader::{ConfigSectionLoader, ConfigSectionLoaderSync, LoadConfigError, load_from_file, load_from_file_sync};
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

/// Whole configuration file: `[rpc]`, `[engine]`, `[[tokens]]` and `[[pools]]`.
#[derive(Clone, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct MarketConfigRoot {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Missing metadata is read from the token contract.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    pub address: Address,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
}

impl TokenConfig {
    pub fn new(address: Address) -> Self {
        Self { address, symbol: None, name: None, decimals: None }
    }
}

/// A pool entry. Either `protocol` or `factory` must identify the venue. Constant-product pools may
/// leave out `address` when both tokens are given; it is then derived from the factory with CREATE2.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    pub address: Option<Address>,
    pub protocol: Option<PoolProtocol>,
    pub factory: Option<Address>,
    pub token0: Option<Address>,
    pub token1: Option<Address>,
    /// Pips. Constant-product pools default to 3000, concentrated pools read it on chain.
    pub fee: Option<u32>,
    pub tick_spacing: Option<i32>,
}

#[async_trait]
impl ConfigSectionLoader for MarketConfigRoot {
    type SectionType = MarketConfigRoot;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: MarketConfigRoot = load_from_file(file_name).await?;
        Ok(root)
    }
}

impl ConfigSectionLoaderSync for MarketConfigRoot {
    type SectionType = MarketConfigRoot;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: MarketConfigRoot = load_from_file_sync(file_name)?;
        Ok(root)
    }
}

#[async_trait]
impl ConfigSectionLoader for EngineConfig {
    type SectionType = EngineConfig;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: MarketConfigRoot = load_from_file(file_name).await?;
        Ok(root.engine)
    }
}

impl ConfigSectionLoaderSync for RpcConfig {
    type SectionType = RpcConfig;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: MarketConfigRoot = load_from_file_sync(file_name)?;
        Ok(root.rpc)
    }
}
