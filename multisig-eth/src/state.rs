use crate::node::{MultisigNode, Result};
use multisig_api::ethereum::*;
use multisig_api::events::{EventId, Notification};
use multisig_api::wallet::*;
use std::collections::{BTreeMap, HashMap};

/// Mounted view of a displayed wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletView {
    pub address: EthAddress,
    pub quorum: u64,
    pub owners: Vec<EthAddress>,
    pub balance: Wei,
    /// Full on-chain list, including requests already sent
    pub withdrawals: Vec<WithdrawTx>,
}

impl WalletView {
    pub async fn fetch(node: &dyn MultisigNode, address: EthAddress) -> Result<Self> {
        Ok(WalletView {
            address,
            quorum: node.quorum(address).await?,
            owners: node.owners(address).await?,
            balance: node.balance(address).await?,
            withdrawals: node.withdraw_txes(address).await?,
        })
    }

    pub fn is_owner(&self, account: EthAddress) -> bool {
        self.owners.contains(&account)
    }

    pub fn pending(&self) -> Vec<WithdrawTx> {
        pending_withdrawals(&self.withdrawals, self.quorum)
    }

    pub fn withdrawal(&self, id: u64) -> Option<&WithdrawTx> {
        self.withdrawals.iter().find(|tx| tx.id == id)
    }

    pub fn stats(&self, account: EthAddress) -> WalletStats {
        WalletStats {
            address: self.address,
            balance: self.balance,
            balance_formatted: format_ether(self.balance),
            symbol: ETHER_SYMBOL.to_owned(),
            quorum: self.quorum,
            owners: self.owners.clone(),
            is_owner: self.is_owner(account),
        }
    }

    pub fn pending_withdrawals(&self) -> PendingWithdrawals {
        PendingWithdrawals {
            wallet: self.address,
            quorum: self.quorum,
            txs: self.pending(),
        }
    }
}

/// Oldest notifications are dropped when nobody polls
pub const MAX_QUEUED_NOTIFICATIONS: usize = 256;

/// Handled events are remembered for this many blocks behind the cursor
pub const SEEN_BLOCK_WINDOW: u64 = 128;

pub struct ScanState {
    /// Account the service acts for
    pub account: EthAddress,
    pub factory: EthAddress,
    /// First block the next scan starts from
    pub next_block: u64,
    /// Latest head seen by the worker
    pub last_height: u64,
    /// Factory wallet list as of the last refresh
    pub wallets: Vec<EthAddress>,
    pub displayed: BTreeMap<EthAddress, WalletView>,
    /// Not yet delivered to a poller, at most `MAX_QUEUED_NOTIFICATIONS`
    pub notifications: Vec<Notification>,
    /// Handled events with their blocks
    seen: HashMap<EventId, u64>,
}

impl ScanState {
    pub fn new(account: EthAddress, factory: EthAddress, next_block: u64) -> Self {
        ScanState {
            account,
            factory,
            next_block,
            last_height: next_block.saturating_sub(1),
            wallets: vec![],
            displayed: BTreeMap::new(),
            notifications: vec![],
            seen: HashMap::new(),
        }
    }

    /// State of a freshly connected service that scans blocks after `head`
    pub fn connected(account: EthAddress, factory: EthAddress, head: u64) -> Self {
        let mut state = ScanState::new(account, factory, head + 1);
        state.notify(Notification::info(format!("Connected to {account}")));
        state
    }

    pub fn is_listed(&self, wallet: EthAddress) -> bool {
        self.wallets.contains(&wallet)
    }

    pub fn displayed_wallets(&self) -> Vec<EthAddress> {
        self.displayed.keys().copied().collect()
    }

    pub fn display(&mut self, view: WalletView) {
        self.displayed.insert(view.address, view);
    }

    /// Unmounts the view, its events are no longer watched
    pub fn close(&mut self, wallet: EthAddress) -> bool {
        self.displayed.remove(&wallet).is_some()
    }

    /// Returns `false` if the event was already handled
    pub fn mark_seen(&mut self, id: &EventId, block: u64) -> bool {
        self.seen.insert(id.clone(), block).is_none()
    }

    /// Forgets events older than the window behind the cursor
    pub fn prune_seen(&mut self) {
        let oldest = self.next_block.saturating_sub(SEEN_BLOCK_WINDOW);
        self.seen.retain(|_, block| *block >= oldest);
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn notify(&mut self, notification: Notification) {
        if self.notifications.len() >= MAX_QUEUED_NOTIFICATIONS {
            let excess = self.notifications.len() + 1 - MAX_QUEUED_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
        self.notifications.push(notification);
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
