//! Bodies of write requests and their validation.
//!
//! Validation only decides whether an action can be submitted. Business
//! rules (quorum against owner count, balance, repeated approvals) are
//! enforced by the contracts.
use super::ethereum::*;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Owner address #{row} is invalid: {source}")]
    InvalidOwner { row: usize, source: AddressError },
    #[error("At least one owner address is required")]
    NoOwners,
    #[error("Quorum is required")]
    QuorumMissing,
    #[error("Quorum '{0}' is not a non-negative integer")]
    InvalidQuorum(String),
    #[error("Recipient address is invalid: {0}")]
    InvalidRecipient(AddressError),
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    #[error("Transaction id '{0}' is not a non-negative integer")]
    InvalidId(String),
}

fn parse_integer(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_positive_amount(value: &str) -> Result<Wei, RequestError> {
    let amount = parse_ether(value)?;
    if amount.is_zero() {
        return Err(RequestError::ZeroAmount);
    }
    Ok(amount)
}

/// Create wallet form: one row per owner address plus the quorum
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateWalletRequest {
    /// Owner rows, blank rows are skipped
    pub owners: Vec<String>,
    pub quorum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWallet {
    pub owners: Vec<EthAddress>,
    pub quorum: u64,
}

impl CreateWalletRequest {
    pub fn validate(&self) -> Result<CreateWallet, RequestError> {
        let mut owners = vec![];
        for (i, row) in self.owners.iter().enumerate() {
            let row = row.trim();
            if row.is_empty() {
                continue;
            }
            let owner = EthAddress::from_str(row)
                .map_err(|source| RequestError::InvalidOwner { row: i + 1, source })?;
            owners.push(owner);
        }
        if owners.is_empty() {
            return Err(RequestError::NoOwners);
        }
        if self.quorum.trim().is_empty() {
            return Err(RequestError::QuorumMissing);
        }
        let quorum = parse_integer(&self.quorum)
            .ok_or_else(|| RequestError::InvalidQuorum(self.quorum.clone()))?;
        Ok(CreateWallet { owners, quorum })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DepositRequest {
    /// Amount in ether
    pub amount: String,
}

impl DepositRequest {
    pub fn validate(&self) -> Result<Wei, RequestError> {
        parse_positive_amount(&self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WithdrawRequest {
    /// Recipient address
    pub to: String,
    /// Amount in ether
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdraw {
    pub to: EthAddress,
    pub amount: Wei,
}

impl WithdrawRequest {
    pub fn validate(&self) -> Result<Withdraw, RequestError> {
        let to = EthAddress::from_str(self.to.trim()).map_err(RequestError::InvalidRecipient)?;
        let amount = parse_positive_amount(&self.amount)?;
        Ok(Withdraw { to, amount })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApproveRequest {
    /// Position of the withdrawal request
    pub id: String,
}

impl ApproveRequest {
    pub fn validate(&self) -> Result<u64, RequestError> {
        parse_integer(&self.id).ok_or_else(|| RequestError::InvalidId(self.id.clone()))
    }
}
