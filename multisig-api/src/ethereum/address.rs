use rocket_okapi::okapi::schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Metadata, Schema, SchemaObject},
    JsonSchema,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};
use web3::types::H160;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must start with 0x")]
    MissingPrefix,
    #[error("Address must have 40 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("Address contains non-hex characters")]
    NotHex,
    #[error("Address checksum mismatch")]
    BadChecksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthAddress(pub H160);

impl From<H160> for EthAddress {
    fn from(value: H160) -> Self {
        EthAddress(value)
    }
}

impl From<EthAddress> for H160 {
    fn from(value: EthAddress) -> Self {
        value.0
    }
}

/// `true` for `0x` followed by 40 hex digits that are either single-case or
/// carry a valid EIP-55 checksum.
pub fn is_address(value: &str) -> bool {
    EthAddress::from_str(value).is_ok()
}

impl EthAddress {
    /// EIP-55 mixed-case rendering
    pub fn to_checksum(&self) -> String {
        let lower: String = self.0.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
        let mut hash = [0u8; 32];
        let mut hasher = Keccak::v256();
        hasher.update(lower.as_bytes());
        hasher.finalize(&mut hash);

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for EthAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;
        if digits.len() != 40 {
            return Err(AddressError::InvalidLength(digits.len()));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex);
        }
        let address = H160::from_str(digits)
            .map(EthAddress)
            .map_err(|_| AddressError::NotHex)?;

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum() != s {
            return Err(AddressError::BadChecksum);
        }
        Ok(address)
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EthAddress::from_str(&raw).map_err(de::Error::custom)
    }
}

impl JsonSchema for EthAddress {
    fn schema_name() -> String {
        "ethereum-address".to_owned()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("ethereum address".to_owned()),
            metadata: Some(Box::new(Metadata {
                examples: vec![
                    json!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
                    json!("0xb611C31e4284BF7A7daD3296e62880F14b3b15DD"),
                ],
                ..Metadata::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
