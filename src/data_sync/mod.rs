/// Data layer: everything that talks to the chain.
///
/// - JSON-RPC transport with retry, backoff and a bounded connection pool
/// - ABI encoding and decoding of pool and ERC-20 calls
/// - Pool registry and the configuration it is loaded from
pub mod abi;
pub mod config;
pub mod loader;
pub mod markets;
pub mod mock_transport;
pub mod rpc_error;
pub mod transport;


pub use abi::{CodecError, DecodedValue, PoolCall, decode_revert};
pub use config::RpcConfig;
pub use loader::MarketLoader;
pub use markets::{MarketConfigRoot, PoolConfig, PoolRegistry, RegistryError, TokenConfig};
pub use mock_transport::MockTransport;
pub use rpc_error::RpcError;
pub use transport::{BlockTag, HttpTransport, RetryPolicy, RpcTransport};
