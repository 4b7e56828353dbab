use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VaultError;
use crate::hash::to_hex_prefixed;

/// Recoverable secp256k1 signature in `r || s || v` layout, `v` in {27, 28}.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    pub fn to_hex(&self) -> String {
        to_hex_prefixed(&self.0)
    }

    /// Accepts exactly 65 bytes of hex, with or without `0x`.
    pub fn parse(input: &str) -> Result<Self, VaultError> {
        let digits = input.strip_prefix("0x").unwrap_or(input);
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|err| VaultError::InvalidSignature(err.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl FromStr for Signature {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_exactly_65_bytes() {
        let hex = format!("0x{}1b", "ab".repeat(64));
        let signature = Signature::parse(&hex).unwrap();
        assert_eq!(signature.v(), 27);
        assert_eq!(signature.to_hex(), hex);

        assert!(matches!(
            Signature::parse("0x00"),
            Err(VaultError::InvalidSignature(_))
        ));
        assert!(Signature::parse(&format!("0x{}", "ab".repeat(66))).is_err());
        assert!(Signature::parse(&"zz".repeat(65)).is_err());
    }

    #[test]
    fn deserializing_rejects_malformed_hex() {
        let ok: Signature = serde_json::from_value(serde_json::json!(format!(
            "0x{}1c",
            "01".repeat(64)
        )))
        .unwrap();
        assert_eq!(ok.v(), 28);
        assert!(serde_json::from_value::<Signature>(serde_json::json!("0x1234")).is_err());
    }
}
