use super::ethereum::*;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Withdrawal request stored in a wallet contract
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct WithdrawTx {
    /// Position in the on-chain list, used to approve the request
    pub id: u64,
    /// Recipient
    pub to: EthAddress,
    /// Amount to transfer
    pub amount: Wei,
    /// Number of owner approvals collected so far
    pub approvals: u64,
    /// Set by the contract once the quorum is reached
    pub sent: bool,
}

/// Requests that still wait for approvals. Order and ids are preserved.
pub fn pending_withdrawals(txs: &[WithdrawTx], quorum: u64) -> Vec<WithdrawTx> {
    txs.iter()
        .filter(|tx| tx.approvals < quorum)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WalletEntry {
    /// 1-based wallet number as shown in the selector
    pub index: u64,
    pub address: EthAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WalletList {
    /// Factory contract the list was read from
    pub factory: EthAddress,
    pub wallets: Vec<WalletEntry>,
}

impl WalletList {
    pub fn new(factory: EthAddress, wallets: &[EthAddress]) -> Self {
        WalletList {
            factory,
            wallets: wallets
                .iter()
                .enumerate()
                .map(|(i, address)| WalletEntry {
                    index: i as u64 + 1,
                    address: *address,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WalletStats {
    pub address: EthAddress,
    pub balance: Wei,
    /// Balance in ether
    pub balance_formatted: String,
    pub symbol: String,
    pub quorum: u64,
    pub owners: Vec<EthAddress>,
    /// Whether the acting account is one of the owners
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PendingWithdrawals {
    pub wallet: EthAddress,
    pub quorum: u64,
    pub txs: Vec<WithdrawTx>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum TxState {
    /// Not mined yet
    Pending,
    Confirmed,
    /// Mined but reverted
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TxSubmitted {
    pub hash: TxHash,
    /// Block explorer page of the transaction
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TxStatus {
    pub hash: TxHash,
    pub state: TxState,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionStatus {
    /// Acting account
    pub account: EthAddress,
    pub factory: EthAddress,
    pub chain_id: u64,
    /// Latest block seen by the node
    pub block: u64,
    /// Wallets currently displayed
    pub displayed: Vec<EthAddress>,
}
