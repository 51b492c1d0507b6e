use crate::logic::pools::ProtocolKind;
use alloy_primitives::aliases::{I24, U24};
use alloy_primitives::{Address, Bytes, Signed, U256, Uint};
use alloy_sol_types::{Panic, Revert, SolCall, SolError, sol};
use thiserror::Error;

sol! {
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }

    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function tickSpacing() external view returns (int24);
        function tickBitmap(int16 wordPosition) external view returns (uint256);
        function ticks(int24 tick) external view returns (
            uint128 liquidityGross,
            int128 liquidityNet,
            uint256 feeGrowthOutside0X128,
            uint256 feeGrowthOutside1X128,
            int56 tickCumulativeOutside,
            uint160 secondsPerLiquidityOutsideX128,
            uint32 secondsOutside,
            bool initialized
        );
        function token0() external view returns (address);
        function token1() external view returns (address);
    }

    interface IERC20Metadata {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
    }
}

const WORD: usize = 32;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed response for {function}: expected at least {expected_words} words, got {actual_bytes} bytes")]
    MalformedResponse { function: &'static str, expected_words: usize, actual_bytes: usize },
    #[error("failed to decode {function}: {reason}")]
    Decode { function: &'static str, reason: String },
    #[error("argument out of range for {function}: {value}")]
    InvalidArgument { function: &'static str, value: i64 },
    #[error("{function} is not part of the {kind} interface")]
    Unsupported { function: &'static str, kind: ProtocolKind },
    #[error("unexpected decoded value, wanted {expected}")]
    UnexpectedValue { expected: &'static str },
}

/// A contract read understood by the codec, together with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolCall {
    GetReserves,
    Token0,
    Token1,
    Slot0,
    Liquidity,
    Fee,
    TickSpacing,
    TickBitmap(i16),
    Ticks(i32),
    Decimals,
    Symbol,
    Name,
}

/// Typed values decoded from return data. Integers never pass through floats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Reserves { reserve0: U256, reserve1: U256, block_timestamp_last: u32 },
    Address(Address),
    Slot0 { sqrt_price_x96: U256, tick: i32 },
    Liquidity(u128),
    Fee(u32),
    TickSpacing(i32),
    Word(U256),
    Tick { liquidity_gross: u128, liquidity_net: i128, initialized: bool },
    Decimals(u8),
    Text(String),
}

impl PoolCall {
    pub fn signature(&self) -> &'static str {
        match self {
            PoolCall::GetReserves => IUniswapV2Pair::getReservesCall::SIGNATURE,
            PoolCall::Token0 => IUniswapV2Pair::token0Call::SIGNATURE,
            PoolCall::Token1 => IUniswapV2Pair::token1Call::SIGNATURE,
            PoolCall::Slot0 => IUniswapV3Pool::slot0Call::SIGNATURE,
            PoolCall::Liquidity => IUniswapV3Pool::liquidityCall::SIGNATURE,
            PoolCall::Fee => IUniswapV3Pool::feeCall::SIGNATURE,
            PoolCall::TickSpacing => IUniswapV3Pool::tickSpacingCall::SIGNATURE,
            PoolCall::TickBitmap(_) => IUniswapV3Pool::tickBitmapCall::SIGNATURE,
            PoolCall::Ticks(_) => IUniswapV3Pool::ticksCall::SIGNATURE,
            PoolCall::Decimals => IERC20Metadata::decimalsCall::SIGNATURE,
            PoolCall::Symbol => IERC20Metadata::symbolCall::SIGNATURE,
            PoolCall::Name => IERC20Metadata::nameCall::SIGNATURE,
        }
    }

    /// Whether the pool interface of `kind` exposes this function. ERC-20 metadata calls
    /// target token contracts and are accepted for every kind.
    pub fn is_supported_by(&self, kind: ProtocolKind) -> bool {
        match self {
            PoolCall::Token0 | PoolCall::Token1 | PoolCall::Decimals | PoolCall::Symbol | PoolCall::Name => true,
            PoolCall::GetReserves => kind == ProtocolKind::ConstantProduct,
            PoolCall::Slot0
            | PoolCall::Liquidity
            | PoolCall::Fee
            | PoolCall::TickSpacing
            | PoolCall::TickBitmap(_)
            | PoolCall::Ticks(_) => kind == ProtocolKind::ConcentratedLiquidity,
        }
    }

    pub fn encode_for(&self, kind: ProtocolKind) -> Result<Bytes, CodecError> {
        if !self.is_supported_by(kind) {
            return Err(CodecError::Unsupported { function: self.signature(), kind });
        }
        self.encode()
    }

    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let data = match *self {
            PoolCall::GetReserves => IUniswapV2Pair::getReservesCall {}.abi_encode(),
            PoolCall::Token0 => IUniswapV2Pair::token0Call {}.abi_encode(),
            PoolCall::Token1 => IUniswapV2Pair::token1Call {}.abi_encode(),
            PoolCall::Slot0 => IUniswapV3Pool::slot0Call {}.abi_encode(),
            PoolCall::Liquidity => IUniswapV3Pool::liquidityCall {}.abi_encode(),
            PoolCall::Fee => IUniswapV3Pool::feeCall {}.abi_encode(),
            PoolCall::TickSpacing => IUniswapV3Pool::tickSpacingCall {}.abi_encode(),
            PoolCall::TickBitmap(word_position) => IUniswapV3Pool::tickBitmapCall { wordPosition: word_position }.abi_encode(),
            PoolCall::Ticks(tick) => IUniswapV3Pool::ticksCall { tick: i24_from_i32(tick, self.signature())? }.abi_encode(),
            PoolCall::Decimals => IERC20Metadata::decimalsCall {}.abi_encode(),
            PoolCall::Symbol => IERC20Metadata::symbolCall {}.abi_encode(),
            PoolCall::Name => IERC20Metadata::nameCall {}.abi_encode(),
        };
        Ok(data.into())
    }

    /// Minimum number of 32-byte words a well-formed return buffer holds.
    pub fn min_return_words(&self) -> usize {
        match self {
            PoolCall::GetReserves => 3,
            PoolCall::Slot0 => 7,
            PoolCall::Ticks(_) => 8,
            // strings need offset + length, but legacy tokens return a bare bytes32
            _ => 1,
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedValue, CodecError> {
        let function = self.signature();
        let expected_words = self.min_return_words();
        if data.len() < expected_words * WORD {
            return Err(CodecError::MalformedResponse { function, expected_words, actual_bytes: data.len() });
        }
        let err = |e: alloy_sol_types::Error| CodecError::Decode { function, reason: e.to_string() };

        let value = match self {
            PoolCall::GetReserves => {
                let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(data).map_err(err)?;
                DecodedValue::Reserves {
                    reserve0: U256::from(reserves.reserve0),
                    reserve1: U256::from(reserves.reserve1),
                    block_timestamp_last: reserves.blockTimestampLast,
                }
            }
            PoolCall::Token0 => DecodedValue::Address(IUniswapV2Pair::token0Call::abi_decode_returns(data).map_err(err)?),
            PoolCall::Token1 => DecodedValue::Address(IUniswapV2Pair::token1Call::abi_decode_returns(data).map_err(err)?),
            PoolCall::Slot0 => {
                let slot0 = IUniswapV3Pool::slot0Call::abi_decode_returns(data).map_err(err)?;
                DecodedValue::Slot0 { sqrt_price_x96: U256::from(slot0.sqrtPriceX96), tick: i32_from_i24(slot0.tick) }
            }
            PoolCall::Liquidity => DecodedValue::Liquidity(IUniswapV3Pool::liquidityCall::abi_decode_returns(data).map_err(err)?),
            PoolCall::Fee => DecodedValue::Fee(u32_from_u24(IUniswapV3Pool::feeCall::abi_decode_returns(data).map_err(err)?)),
            PoolCall::TickSpacing => {
                DecodedValue::TickSpacing(i32_from_i24(IUniswapV3Pool::tickSpacingCall::abi_decode_returns(data).map_err(err)?))
            }
            PoolCall::TickBitmap(_) => DecodedValue::Word(IUniswapV3Pool::tickBitmapCall::abi_decode_returns(data).map_err(err)?),
            PoolCall::Ticks(_) => {
                let tick = IUniswapV3Pool::ticksCall::abi_decode_returns(data).map_err(err)?;
                DecodedValue::Tick {
                    liquidity_gross: tick.liquidityGross,
                    liquidity_net: tick.liquidityNet,
                    initialized: tick.initialized,
                }
            }
            PoolCall::Decimals => DecodedValue::Decimals(IERC20Metadata::decimalsCall::abi_decode_returns(data).map_err(err)?),
            PoolCall::Symbol => DecodedValue::Text(decode_text::<IERC20Metadata::symbolCall>(data).map_err(err)?),
            PoolCall::Name => DecodedValue::Text(decode_text::<IERC20Metadata::nameCall>(data).map_err(err)?),
        };
        Ok(value)
    }
}

impl DecodedValue {
    pub fn reserves(self) -> Result<(U256, U256), CodecError> {
        match self {
            DecodedValue::Reserves { reserve0, reserve1, .. } => Ok((reserve0, reserve1)),
            _ => Err(CodecError::UnexpectedValue { expected: "reserves" }),
        }
    }

    pub fn address(self) -> Result<Address, CodecError> {
        match self {
            DecodedValue::Address(address) => Ok(address),
            _ => Err(CodecError::UnexpectedValue { expected: "address" }),
        }
    }

    pub fn slot0(self) -> Result<(U256, i32), CodecError> {
        match self {
            DecodedValue::Slot0 { sqrt_price_x96, tick } => Ok((sqrt_price_x96, tick)),
            _ => Err(CodecError::UnexpectedValue { expected: "slot0" }),
        }
    }

    pub fn liquidity(self) -> Result<u128, CodecError> {
        match self {
            DecodedValue::Liquidity(liquidity) => Ok(liquidity),
            _ => Err(CodecError::UnexpectedValue { expected: "liquidity" }),
        }
    }

    pub fn fee(self) -> Result<u32, CodecError> {
        match self {
            DecodedValue::Fee(fee) => Ok(fee),
            _ => Err(CodecError::UnexpectedValue { expected: "fee" }),
        }
    }

    pub fn tick_spacing(self) -> Result<i32, CodecError> {
        match self {
            DecodedValue::TickSpacing(spacing) => Ok(spacing),
            _ => Err(CodecError::UnexpectedValue { expected: "tickSpacing" }),
        }
    }

    pub fn word(self) -> Result<U256, CodecError> {
        match self {
            DecodedValue::Word(word) => Ok(word),
            _ => Err(CodecError::UnexpectedValue { expected: "uint256" }),
        }
    }

    /// `liquidityNet` of an initialized tick, `None` for an uninitialized one.
    pub fn tick_liquidity_net(self) -> Result<Option<i128>, CodecError> {
        match self {
            DecodedValue::Tick { liquidity_net, initialized, .. } => Ok(initialized.then_some(liquidity_net)),
            _ => Err(CodecError::UnexpectedValue { expected: "tick" }),
        }
    }

    pub fn decimals(self) -> Result<u8, CodecError> {
        match self {
            DecodedValue::Decimals(decimals) => Ok(decimals),
            _ => Err(CodecError::UnexpectedValue { expected: "decimals" }),
        }
    }

    pub fn text(self) -> Result<String, CodecError> {
        match self {
            DecodedValue::Text(text) => Ok(text),
            _ => Err(CodecError::UnexpectedValue { expected: "string" }),
        }
    }
}

// Some early tokens (MKR, SAI) return bytes32 instead of string.
fn decode_text<C: SolCall<Return = String>>(data: &[u8]) -> Result<String, alloy_sol_types::Error> {
    match C::abi_decode_returns(data) {
        Ok(text) => Ok(text),
        Err(e) if data.len() == WORD => {
            let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
            String::from_utf8(trimmed).map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

/// Decodes `Error(string)` and `Panic(uint256)` revert payloads.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    if let Ok(revert) = Revert::abi_decode(data) {
        return Some(revert.reason);
    }
    if let Ok(panic) = Panic::abi_decode(data) {
        return Some(format!("panic code {:#x}", panic.code));
    }
    None
}

fn i32_from_i24(value: I24) -> i32 {
    let raw = value.into_raw().as_limbs()[0] as u32;
    ((raw << 8) as i32) >> 8
}

fn i24_from_i32(value: i32, function: &'static str) -> Result<I24, CodecError> {
    if !(-(1 << 23)..(1 << 23)).contains(&value) {
        return Err(CodecError::InvalidArgument { function, value: value as i64 });
    }
    let raw = Uint::<24, 1>::from_limbs([(value as u32 & 0x00ff_ffff) as u64]);
    Ok(Signed::from_raw(raw))
}

fn u32_from_u24(value: U24) -> u32 {
    value.as_limbs()[0] as u32
}
