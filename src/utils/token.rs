use alloy_primitives::utils::Unit;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// An on-chain asset. Immutable once loaded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Token {
    address: Address,
    decimals: u8,
    name: Option<String>,
    symbol: Option<String>,
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.get_address()
    }
}

impl Eq for Token {}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.get_address())
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_symbol())
    }
}

impl Token {
    pub fn new(address: Address) -> Token {
        Token { address, decimals: 18, ..Token::default() }
    }

    pub fn new_with_data(address: Address, symbol: Option<String>, name: Option<String>, decimals: Option<u8>) -> Token {
        Token { address, symbol, name, decimals: decimals.unwrap_or(18) }
    }

    // For testing purposes
    pub fn random() -> Token {
        Token::new(Address::random())
    }

    // For testing purposes
    pub fn repeat_byte(byte: u8) -> Token {
        Token::new(Address::repeat_byte(byte))
    }

    pub fn get_symbol(&self) -> String {
        self.symbol.clone().unwrap_or(self.address.to_string())
    }

    pub fn get_name(&self) -> String {
        self.name.clone().unwrap_or(self.address.to_string())
    }

    pub fn get_decimals(&self) -> u8 {
        self.decimals
    }

    pub fn get_exp(&self) -> U256 {
        if self.decimals == 18 { Unit::ETHER.wei() } else { U256::from(10).pow(U256::from(self.decimals)) }
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    /// Converts a raw amount into whole units. Precision is lost past `f64` range.
    pub fn to_float(&self, value: U256) -> f64 {
        if self.decimals == 0 {
            return u256_to_f64(value);
        }
        let (div, rem) = value.div_rem(self.get_exp());
        u256_to_f64(div) + u256_to_f64(rem) / 10f64.powi(self.decimals as i32)
    }

    /// Amount used to probe marginal rates: a `divisor`-th of one whole unit, at least one raw unit.
    pub fn probe_amount(&self, divisor: u64) -> U256 {
        let probe = self.get_exp() / U256::from(divisor.max(1));
        if probe.is_zero() { U256::from(1) } else { probe }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }
}

/// Lossy conversion used for rates and logging only. Never feed the result back into integer math.
pub fn u256_to_f64(value: U256) -> f64 {
    let limbs = value.as_limbs();
    let mut out = 0f64;
    for limb in limbs.iter().rev() {
        out = out * 18_446_744_073_709_551_616f64 + *limb as f64;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::constants::WETH;

    #[test]
    fn test_serialize() {
        let weth_token = Token::new_with_data(WETH, Some("WETH".to_string()), None, Some(18));

        let serialized = serde_json::to_string(&weth_token).unwrap();
        assert_eq!(
            serialized,
            "{\"address\":\"0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2\",\"decimals\":18,\"name\":null,\"symbol\":\"WETH\"}"
        );
    }

    #[test]
    fn test_to_float() {
        let usdc = Token::new_with_data(Address::repeat_byte(1), Some("USDC".to_string()), None, Some(6));
        assert_eq!(usdc.to_float(U256::from(1_500_000u64)), 1.5);
        assert_eq!(u256_to_f64(U256::from(u64::MAX)), u64::MAX as f64);
    }

    #[test]
    fn test_probe_amount() {
        let weth = Token::new(WETH);
        assert_eq!(weth.probe_amount(1000), U256::from(1_000_000_000_000_000u64));

        let raw = Token::new_with_data(Address::repeat_byte(2), None, None, Some(0));
        assert_eq!(raw.probe_amount(1000), U256::from(1));
    }
}
