//! Load a market from a TOML file, price every pool over JSON-RPC and print the arbitrage report.
//!
//! ```text
//! RPC_HTTP_URL=http://127.0.0.1:8545 cargo run --example scan_arbitrage -- market.toml [base]
//! ```

use alloy_primitives::Address;
use eyre::{Result, eyre};
use std::sync::Arc;
use swap_arb::utils::{ConfigSectionLoader, WETH};
use swap_arb::{ArbitrageEngineBuilder, CancelToken, HttpTransport, MarketConfigRoot, MarketLoader, PoolRegistry, RpcConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "market.toml".to_string());
    let base_arg = args.next();

    let mut config = MarketConfigRoot::load_section_from_file(config_path.clone()).await?;
    // environment overrides the file endpoint
    if std::env::var("RPC_HTTP_URL").is_ok() {
        config.rpc = RpcConfig { block_number: config.rpc.block_number, ..RpcConfig::from_env()? };
    }
    info!(path = %config_path, tokens = config.tokens.len(), pools = config.pools.len(), "Loaded market configuration");

    let transport = Arc::new(HttpTransport::new(&config.rpc)?);
    let registry = Arc::new(PoolRegistry::new());
    MarketLoader::new(transport.clone(), config.rpc.block_tag()).load_market(&config, &registry).await?;

    let base = match base_arg {
        Some(base) => base.parse::<Address>()?,
        None if registry.get_token(&WETH).is_some() => WETH,
        None => config.tokens.first().map(|token| token.address).ok_or_else(|| eyre!("no base token configured"))?,
    };

    let max_hops = config.engine.max_hops;
    let engine = ArbitrageEngineBuilder::new()
        .with_transport(transport)
        .with_registry(registry)
        .with_block(config.rpc.block_tag())
        .with_config(config.engine)
        .build()
        .await?;

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = engine.scan(&base, max_hops, &cancel).await?;
    println!("{}", report.to_json()?);
    Ok(())
}
