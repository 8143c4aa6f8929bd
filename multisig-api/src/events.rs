use super::ethereum::*;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Events emitted by the factory and wallet contracts
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum MultisigEvent {
    /// Factory deployed a new wallet
    WalletCreated { sender: EthAddress, index: u64 },
    /// Funds were sent to a wallet
    Deposit { sender: EthAddress, amount: Wei },
    /// An owner proposed a withdrawal
    CreateWithdrawTx { amount: Wei, index: u64 },
    /// An owner approved a withdrawal
    ApproveWithdrawTx { index: u64 },
}

/// Identity of a log entry, stable across rescans of the same block range
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct EventId {
    pub tx_hash: TxHash,
    pub log_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ContractLog {
    pub id: EventId,
    /// Contract that emitted the event
    pub contract: EthAddress,
    pub block: u64,
    pub event: MultisigEvent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
}

/// Message for the user, shown once
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    /// Wallet the notification is about, if any
    pub wallet: Option<EthAddress>,
    /// Event that produced the notification, if any
    pub event: Option<EventId>,
}

impl Notification {
    pub fn info(message: String) -> Self {
        Notification {
            kind: NotificationKind::Info,
            message,
            wallet: None,
            event: None,
        }
    }

    pub fn success(log: &ContractLog, message: String) -> Self {
        Notification {
            kind: NotificationKind::Success,
            message,
            wallet: Some(log.contract),
            event: Some(log.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Notifications {
    /// Latest scanned block
    pub height: u64,
    /// Notifications queued since the previous poll
    pub events: Vec<Notification>,
}
