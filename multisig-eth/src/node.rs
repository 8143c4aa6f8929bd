mod contracts;

pub use contracts::Web3Node;

use async_trait::async_trait;
use multisig_api::ethereum::*;
use multisig_api::events::ContractLog;
use multisig_api::requests::{CreateWallet, Withdraw};
use multisig_api::wallet::{TxState, WithdrawTx};
use thiserror::Error;
use web3::types::U256;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Node transport error: {0}")]
    Transport(#[from] web3::Error),
    #[error("Contract call failed: {0}")]
    Contract(#[from] web3::contract::Error),
    #[error("Failed to decode contract ABI: {0}")]
    Abi(#[from] web3::ethabi::Error),
    #[error("Transaction would fail: {0}")]
    Rejected(String),
    #[error("Unexpected contract output: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Typed calls to the factory and wallet contracts.
///
/// Writes are sent from an account unlocked on the node and return the hash
/// of the submitted transaction without waiting for it to be mined.
#[async_trait]
pub trait MultisigNode: Send + Sync {
    /// Accounts unlocked on the node
    async fn accounts(&self) -> Result<Vec<EthAddress>>;

    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    async fn balance(&self, address: EthAddress) -> Result<Wei>;

    /// Wallets deployed by the factory, in creation order
    async fn wallet_list(&self, factory: EthAddress) -> Result<Vec<EthAddress>>;

    async fn quorum(&self, wallet: EthAddress) -> Result<u64>;

    async fn owners(&self, wallet: EthAddress) -> Result<Vec<EthAddress>>;

    /// All withdrawal requests of the wallet, ids are positions in the list
    async fn withdraw_txes(&self, wallet: EthAddress) -> Result<Vec<WithdrawTx>>;

    async fn tx_state(&self, hash: TxHash) -> Result<TxState>;

    /// Decoded events of the factory and the given wallets within the
    /// inclusive block range. Logs of unknown events are skipped.
    async fn logs(
        &self,
        factory: EthAddress,
        wallets: &[EthAddress],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ContractLog>>;

    async fn create_wallet(
        &self,
        from: EthAddress,
        factory: EthAddress,
        call: &CreateWallet,
    ) -> Result<TxHash>;

    async fn deposit(&self, from: EthAddress, wallet: EthAddress, amount: Wei) -> Result<TxHash>;

    async fn create_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        call: &Withdraw,
    ) -> Result<TxHash>;

    async fn approve_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        id: u64,
    ) -> Result<TxHash>;
}

/// Contract counters are uint256 but never leave u64 range in practice
pub fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}
