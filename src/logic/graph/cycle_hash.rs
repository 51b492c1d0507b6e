use crate::logic::pools::PoolWrapper;
use crate::utils::token::Token;
use alloy_primitives::hex;
use serde::{Deserialize, Serialize};
use sha2::digest::Update;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Stable identifier of a cycle: sha256 over its token addresses followed by its pool addresses.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CycleHash(pub [u8; 32]);

impl CycleHash {
    pub fn generate(tokens: &[Arc<Token>], pools: &[PoolWrapper]) -> Self {
        let mut hasher = Sha256::new();

        for token in tokens.iter() {
            Update::update(&mut hasher, token.get_address().as_slice());
        }
        for pool in pools.iter() {
            Update::update(&mut hasher, pool.get_address().as_slice());
        }

        CycleHash(hasher.finalize().into())
    }
}

impl Display for CycleHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.0))
    }
}

impl Debug for CycleHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CycleHash({})", hex::encode_prefixed(self.0))
    }
}

impl From<[u8; 32]> for CycleHash {
    fn from(hash: [u8; 32]) -> Self {
        CycleHash(hash)
    }
}

impl Serialize for CycleHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode_prefixed(self.0))
    }
}

impl<'de> Deserialize<'de> for CycleHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let hash: [u8; 32] = bytes.try_into().map_err(|_| serde::de::Error::custom("cycle hash must be 32 bytes"))?;
        Ok(CycleHash(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::pools::{Pool, PoolProtocol};
    use alloy_primitives::Address;

    #[test]
    fn test_serialize_cycle_hash() {
        let cycle_hash = CycleHash([1; 32]);

        let serialized = serde_json::to_string(&cycle_hash).unwrap();
        let deserialized: CycleHash = serde_json::from_str(&serialized).unwrap();

        assert_eq!(cycle_hash, deserialized);
        assert!(serde_json::from_str::<CycleHash>("\"0x0102\"").is_err());
    }

    #[test]
    fn test_hash_depends_on_direction() {
        let a = Arc::new(Token::repeat_byte(1));
        let b = Arc::new(Token::repeat_byte(2));
        let p1: PoolWrapper = Arc::new(Pool::new(Address::repeat_byte(0x10), PoolProtocol::Sushiswap, a.clone(), b.clone(), 3000));
        let p2: PoolWrapper = Arc::new(Pool::new(Address::repeat_byte(0x11), PoolProtocol::UniswapV2, a.clone(), b.clone(), 3000));

        let forward = CycleHash::generate(&[a.clone(), b.clone(), a.clone()], &[p1.clone(), p2.clone()]);
        let backward = CycleHash::generate(&[a.clone(), b.clone(), a.clone()], &[p2, p1]);
        assert_ne!(forward, backward);
        assert_eq!(forward.to_string().len(), 66);
    }
}
