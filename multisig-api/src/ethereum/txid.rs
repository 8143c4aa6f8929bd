use rocket_okapi::okapi::schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Metadata, Schema, SchemaObject},
    JsonSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use web3::types::H256;

/// Hash of a sent transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TxHash(pub H256);

impl From<H256> for TxHash {
    fn from(value: H256) -> Self {
        TxHash(value)
    }
}

impl From<TxHash> for H256 {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl FromStr for TxHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 64 {
            return Err(format!("Transaction hash must have 64 hex digits, got {}", digits.len()));
        }
        H256::from_str(digits)
            .map(TxHash)
            .map_err(|e| format!("Malformed transaction hash: {e}"))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Debug of H256 is the full hex form, Display is abbreviated
        write!(f, "{:?}", self.0)
    }
}

impl JsonSchema for TxHash {
    fn schema_name() -> String {
        "ethereum-txid".to_owned()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("ethereum transaction hash".to_owned()),
            metadata: Some(Box::new(Metadata {
                examples: vec![json!(
                    "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
                )],
                ..Metadata::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
