//! Hex helpers shared by the wire types.
//!
//! Everything that crosses the RPC boundary as bytes is a `0x`-prefixed
//! lowercase hex string. Decoding accepts the prefix as optional.

/// Strip an optional `0x` / `0X` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode hex with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_0x(s.trim()))
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// `#[serde(with = "crate::encoding::hex_bytes")]` for `Vec<u8>` fields.
pub mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex(&s).map_err(|e| D::Error::custom(format!("invalid hex: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_optional() {
        assert_eq!(decode_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_hex("DEAD").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_hex(" 0Xbeef ").unwrap(), vec![0xbe, 0xef]);
        assert!(decode_hex("0xabc").is_err());
    }

    #[test]
    fn test_encode_is_prefixed_lowercase() {
        assert_eq!(encode_hex(&[0xAB, 0x01]), "0xab01");
        assert_eq!(encode_hex(&[]), "0x");
    }
}
