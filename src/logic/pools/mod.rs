pub mod concentrated;
pub mod constant_product;
mod pool;
mod state;

pub use constant_product::{PairError, get_amount_out, get_amounts_out, pair_for, sort_tokens};
pub use pool::{Pool, PoolProtocol, PoolWrapper, ProtocolKind, get_protocol_by_factory};
pub use state::{ConcentratedState, ConstantProductState, PoolSnapshot, PoolState, SwapError, SwapOutcome};
