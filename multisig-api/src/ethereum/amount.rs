use rocket_okapi::okapi::schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Metadata, Schema, SchemaObject},
    JsonSchema,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use thiserror::Error;
use web3::types::U256;

/// Decimals of ether relative to wei
pub const ETHER_DECIMALS: usize = 18;

pub const ETHER_SYMBOL: &str = "ETH";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,
    #[error("Amount '{0}' is not a decimal number")]
    Malformed(String),
    #[error("Amount has more than {0} fractional digits")]
    TooPrecise(usize),
    #[error("Amount is too large")]
    Overflow,
}

/// Amount in base units. Serialized as a decimal string, JSON numbers can't
/// hold 256 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(pub U256);

impl From<U256> for Wei {
    fn from(value: U256) -> Self {
        Wei(value)
    }
}

impl From<Wei> for U256 {
    fn from(value: Wei) -> Self {
        value.0
    }
}

impl Wei {
    pub fn zero() -> Self {
        Wei(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_ether(value: &str) -> Result<Self, AmountError> {
        parse_units(value, ETHER_DECIMALS).map(Wei)
    }

    pub fn to_ether(&self) -> String {
        format_units(self.0, ETHER_DECIMALS)
    }
}

pub fn parse_ether(value: &str) -> Result<Wei, AmountError> {
    Wei::from_ether(value)
}

pub fn format_ether(value: Wei) -> String {
    value.to_ether()
}

/// Exact decimal to base units conversion. No rounding: inputs with more
/// fractional digits than `decimals` are rejected.
pub fn parse_units(value: &str, decimals: usize) -> Result<U256, AmountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
    {
        return Err(AmountError::Malformed(value.to_owned()));
    }
    if frac_part.len() > decimals {
        return Err(AmountError::TooPrecise(decimals));
    }
    let padded = format!(
        "{int_part}{frac_part}{}",
        "0".repeat(decimals - frac_part.len())
    );
    let digits = padded.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| AmountError::Overflow)
}

/// Base units to the shortest exact decimal string
pub fn format_units(value: U256, decimals: usize) -> String {
    let digits = value.to_string();
    let (int_part, frac_part) = if digits.len() > decimals {
        let (i, f) = digits.split_at(digits.len() - decimals);
        (i.to_owned(), f.to_owned())
    } else {
        ("0".to_owned(), format!("{digits:0>decimals$}"))
    };
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac_part}")
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(&raw).map(Wei).map_err(de::Error::custom)
    }
}

impl JsonSchema for Wei {
    fn schema_name() -> String {
        "wei".to_owned()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("decimal amount of wei".to_owned()),
            metadata: Some(Box::new(Metadata {
                examples: vec![json!("1500000000000000000")],
                ..Metadata::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
