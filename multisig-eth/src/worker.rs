use crate::constants::NODE_ERROR_BACKOFF;
use futures::future::{self, Either};
use std::future::Future;
use crate::node::{MultisigNode, Result};
use crate::state::{ScanState, WalletView};
use log::*;
use multisig_api::ethereum::*;
use multisig_api::events::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

pub async fn node_worker(
    node: Arc<dyn MultisigNode>,
    state: Arc<Mutex<ScanState>>,
    state_notify: Arc<Notify>,
    polling_sleep: Duration,
) -> () {
    loop {
        match scan(node.as_ref(), &state).await {
            Ok(queued) => {
                if queued > 0 {
                    info!("Queued {queued} notifications");
                    state_notify.notify_one();
                }
            }
            Err(e) => {
                error!("Failed to query node: {e}");
                tokio::time::sleep(NODE_ERROR_BACKOFF).await;
            }
        }
        tokio::time::sleep(polling_sleep).await;
    }
}

/// Runs the worker next to the API until either of them stops.
///
/// The worker never returns on its own, so its end is logged and treated as
/// a normal stop. Both outcomes let the caller restart the service.
pub async fn first_to_stop<W, A, E>(worker: W, api: A) -> std::result::Result<(), E>
where
    W: Future<Output = ()>,
    A: Future<Output = std::result::Result<(), E>>,
{
    match future::select(Box::pin(worker), Box::pin(api)).await {
        Either::Left(((), _)) => {
            warn!("Node worker stopped");
            Ok(())
        }
        Either::Right((res, _)) => {
            warn!("API server stopped");
            res
        }
    }
}

/// Reads wallets of the factory into the state
pub async fn refresh_wallet_list(node: &dyn MultisigNode, state: &Mutex<ScanState>) -> Result<()> {
    let factory = state.lock().await.factory;
    let wallets = node.wallet_list(factory).await?;
    state.lock().await.wallets = wallets;
    Ok(())
}

/// One pass over new blocks. Returns the number of queued notifications.
///
/// Node reads happen outside the state lock. A failure before the state
/// is updated leaves the cursor in place, so the range is scanned again on
/// the next pass and already handled events are filtered out.
pub async fn scan(node: &dyn MultisigNode, state: &Mutex<ScanState>) -> Result<usize> {
    let (factory, from_block, displayed) = {
        let state_r = state.lock().await;
        (state_r.factory, state_r.next_block, state_r.displayed_wallets())
    };
    let head = node.block_number().await?;
    let logs = if head >= from_block {
        debug!("Scanning blocks {from_block}..={head}");
        node.logs(factory, &displayed, from_block, head).await?
    } else {
        vec![]
    };

    let with_events: BTreeSet<EthAddress> = logs
        .iter()
        .filter(|log| log.contract != factory)
        .map(|log| log.contract)
        .collect();
    let mut views = BTreeMap::new();
    let mut balances = BTreeMap::new();
    for wallet in &displayed {
        if with_events.contains(wallet) {
            views.insert(*wallet, WalletView::fetch(node, *wallet).await?);
        } else {
            balances.insert(*wallet, node.balance(*wallet).await?);
        }
    }
    let wallet_created = logs
        .iter()
        .any(|log| matches!(log.event, MultisigEvent::WalletCreated { .. }));
    let wallets = if wallet_created {
        Some(node.wallet_list(factory).await?)
    } else {
        None
    };

    let mut state_rw = state.lock().await;
    if let Some(wallets) = wallets {
        state_rw.wallets = wallets;
    }
    for (wallet, view) in views {
        // closed while the pass was running
        if state_rw.displayed.contains_key(&wallet) {
            state_rw.display(view);
        }
    }
    for (wallet, balance) in balances {
        if let Some(view) = state_rw.displayed.get_mut(&wallet) {
            view.balance = balance;
        }
    }
    // the refreshed views already count approvals from later logs of the batch
    let mut approvals_left: HashMap<(EthAddress, u64), u64> = HashMap::new();
    for log in &logs {
        if let MultisigEvent::ApproveWithdrawTx { index } = log.event {
            *approvals_left.entry((log.contract, index)).or_default() += 1;
        }
    }
    let mut queued = 0;
    for log in &logs {
        let later_approvals = match log.event {
            MultisigEvent::ApproveWithdrawTx { index } => approvals_left
                .get_mut(&(log.contract, index))
                .map(|left| {
                    *left -= 1;
                    *left
                })
                .unwrap_or(0),
            _ => 0,
        };
        if !state_rw.mark_seen(&log.id, log.block) {
            trace!("Event {:?} already handled", log.id);
            continue;
        }
        info!("New event {:?} from {} at block {}", log.event, log.contract, log.block);
        if let Some(message) = notification_message(&state_rw, log, later_approvals) {
            state_rw.notify(Notification::success(log, message));
            queued += 1;
        }
    }
    state_rw.last_height = head;
    state_rw.next_block = state_rw.next_block.max(head + 1);
    state_rw.prune_seen();
    Ok(queued)
}

/// Text shown to the user for the event, if the user should see it.
///
/// `later_approvals` counts approvals of the same request that come after
/// this log but are already reflected in the mounted view.
pub fn notification_message(
    state: &ScanState,
    log: &ContractLog,
    later_approvals: u64,
) -> Option<String> {
    if log.contract == state.factory {
        return match &log.event {
            MultisigEvent::WalletCreated { sender, index } if *sender == state.account => {
                Some(format!("Wallet Id #{index} created!"))
            }
            _ => None,
        };
    }
    let view = state.displayed.get(&log.contract)?;
    match &log.event {
        MultisigEvent::Deposit { sender, amount } if *sender == state.account => {
            Some(format!("Deposited {} Eth!", format_ether(*amount)))
        }
        MultisigEvent::CreateWithdrawTx { amount, index } => Some(format!(
            "Withdrawal txnId: {index} with withdrawal amount: {} Eth created!",
            format_ether(*amount)
        )),
        MultisigEvent::ApproveWithdrawTx { index } => match view.withdrawal(*index) {
            Some(tx) if !tx.sent || later_approvals > 0 => Some(format!(
                "txnId: {index} is approved ({}/{})",
                tx.approvals.saturating_sub(later_approvals),
                view.quorum
            )),
            _ => Some(format!(
                "txnId: {index} is approved and sent to recipient!"
            )),
        },
        _ => None,
    }
}
