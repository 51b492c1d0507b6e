pub mod market_config;
pub mod registry;

pub use market_config::{MarketConfigRoot, PoolConfig, TokenConfig};
pub use registry::{PoolRegistry, RegistryError};
