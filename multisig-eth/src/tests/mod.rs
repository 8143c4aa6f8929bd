mod chain;

use crate::node::MultisigNode;
use crate::state::{ScanState, WalletView, SEEN_BLOCK_WINDOW};
use crate::worker::scan;
use chain::{TestChain, CHAIN_ID};
use multisig_api::ethereum::*;
use multisig_api::events::NotificationKind;
use multisig_api::requests::*;
use multisig_api::wallet::TxState;
use multisig_client::client::{Error, MultisigClient};
use runner::*;
use tokio::sync::Mutex;

// Collect messages of the next `count` event notifications
async fn next_messages(api: &MultisigClient, count: usize) -> Vec<String> {
    let mut messages = vec![];
    for _ in 0..10 {
        let batch = api.notifications().await.expect("notifications");
        messages.extend(
            batch
                .events
                .into_iter()
                .filter(|n| n.kind == NotificationKind::Success)
                .map(|n| n.message),
        );
        if messages.len() >= count {
            break;
        }
    }
    messages
}

fn owners_request(owners: &[EthAddress], quorum: u64) -> CreateWalletRequest {
    CreateWalletRequest {
        owners: owners.iter().map(|o| o.to_string()).collect(),
        quorum: quorum.to_string(),
    }
}

// Wallet of the user and account 2 with quorum 2, displayed by the service
async fn displayed_wallet(api: &MultisigClient) -> EthAddress {
    api.create_wallet(&owners_request(&[user(), account(2)], 2))
        .await
        .expect("wallet created");
    next_messages(api, 1).await;
    let list = api.wallets().await.expect("wallet list");
    let wallet = list.wallets.last().expect("created wallet").address;
    api.display(&wallet).await.expect("displayed");
    wallet
}

fn api_code(err: Error) -> u16 {
    match err {
        Error::Api(msg) => msg.code,
        other => panic!("Expected API error, got {other}"),
    }
}

#[tokio::test]
async fn basic_test() {
    run_test(|_, api| async move {
        api.ping().await.expect("API ping");
        let status = api.status().await.expect("status");
        assert_eq!(status.account, user());
        assert_eq!(status.chain_id, CHAIN_ID);
        assert!(status.displayed.is_empty());
    })
    .await;
}

#[tokio::test]
async fn connected_notification_test() {
    run_test(|_, api| async move {
        let batch = api.notifications().await.expect("notifications");
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].kind, NotificationKind::Info);
        assert_eq!(batch.events[0].message, format!("Connected to {}", user()));
    })
    .await;
}

#[tokio::test]
async fn create_wallet_test() {
    run_test(|chain, api| async move {
        let tx = api
            .create_wallet(&CreateWalletRequest {
                owners: vec![user().to_string(), "  ".to_owned(), account(2).to_string()],
                quorum: "2".to_owned(),
            })
            .await
            .expect("wallet created");
        assert_eq!(tx.explorer_url, format!("{EXPLORER_URL}/tx/{}", tx.hash));
        assert_eq!(next_messages(&api, 1).await, vec!["Wallet Id #0 created!"]);

        let list = api.wallets().await.expect("wallet list");
        assert_eq!(list.factory, chain.factory());
        assert_eq!(list.wallets.len(), 1);
        assert_eq!(list.wallets[0].index, 1);

        let stats = api.stats(&list.wallets[0].address).await.expect("stats");
        assert_eq!(stats.quorum, 2);
        assert_eq!(stats.owners, vec![user(), account(2)]);
        assert!(stats.is_owner);
        assert_eq!(stats.balance_formatted, "0");
    })
    .await;
}

#[tokio::test]
async fn foreign_wallet_is_silent_test() {
    run_test(|chain, api| async move {
        chain
            .create_wallet(
                account(2),
                chain.factory(),
                &CreateWallet {
                    owners: vec![account(2)],
                    quorum: 1,
                },
            )
            .await
            .expect("wallet created");
        api.create_wallet(&owners_request(&[user()], 1))
            .await
            .expect("wallet created");
        assert_eq!(next_messages(&api, 1).await, vec!["Wallet Id #1 created!"]);
    })
    .await;
}

#[tokio::test]
async fn invalid_create_request_test() {
    run_test(|chain, api| async move {
        let err = api
            .create_wallet(&CreateWalletRequest {
                owners: vec![user().to_string(), "0x1234".to_owned()],
                quorum: "1".to_owned(),
            })
            .await
            .expect_err("invalid owner");
        match err {
            Error::Api(msg) => assert!(msg.message.starts_with("Owner address #2 is invalid")),
            other => panic!("Expected API error, got {other}"),
        }
        let err = api
            .create_wallet(&owners_request(&[user()], 0))
            .await
            .expect_err("rejected by contract");
        assert_eq!(api_code(err), 0);
        assert_eq!(chain.height(), 0);
    })
    .await;
}

#[tokio::test]
async fn unknown_wallet_test() {
    run_test(|_, api| async move {
        let unknown = account(77);
        assert_eq!(api_code(api.stats(&unknown).await.expect_err("unknown")), 4);
        assert_eq!(api_code(api.display(&unknown).await.expect_err("unknown")), 4);
    })
    .await;
}

#[tokio::test]
async fn deposit_test() {
    run_test(|_, api| async move {
        let wallet = displayed_wallet(&api).await;
        api.deposit(
            &wallet,
            &DepositRequest {
                amount: "1.5".to_owned(),
            },
        )
        .await
        .expect("deposit");
        assert_eq!(next_messages(&api, 1).await, vec!["Deposited 1.5 Eth!"]);
        let stats = api.stats(&wallet).await.expect("stats");
        assert_eq!(stats.balance, Wei(1_500_000_000_000_000_000u64.into()));
        assert_eq!(stats.balance_formatted, "1.5");

        let err = api
            .deposit(&wallet, &DepositRequest { amount: "0".to_owned() })
            .await
            .expect_err("zero amount");
        assert_eq!(api_code(err), 1);
    })
    .await;
}

#[tokio::test]
async fn withdrawal_flow_test() {
    run_test(|chain, api| async move {
        let wallet = displayed_wallet(&api).await;
        api.deposit(&wallet, &DepositRequest { amount: "2".to_owned() })
            .await
            .expect("deposit");
        next_messages(&api, 1).await;

        api.create_withdrawal(
            &wallet,
            &WithdrawRequest {
                to: account(3).to_string(),
                amount: "1".to_owned(),
            },
        )
        .await
        .expect("withdrawal created");
        assert_eq!(
            next_messages(&api, 1).await,
            vec!["Withdrawal txnId: 0 with withdrawal amount: 1 Eth created!"]
        );
        let pending = api.pending(&wallet).await.expect("pending");
        assert_eq!(pending.quorum, 2);
        assert_eq!(pending.txs.len(), 1);
        assert_eq!(pending.txs[0].id, 0);

        api.approve(&wallet, &ApproveRequest { id: "0".to_owned() })
            .await
            .expect("approved");
        assert_eq!(
            next_messages(&api, 1).await,
            vec!["txnId: 0 is approved (1/2)"]
        );
        assert_eq!(api.pending(&wallet).await.expect("pending").txs[0].approvals, 1);

        chain
            .approve_withdraw_tx(account(2), wallet, 0)
            .await
            .expect("second approval");
        assert_eq!(
            next_messages(&api, 1).await,
            vec!["txnId: 0 is approved and sent to recipient!"]
        );
        assert!(api.pending(&wallet).await.expect("pending").txs.is_empty());
        let stats = api.stats(&wallet).await.expect("stats");
        assert_eq!(stats.balance_formatted, "1");
    })
    .await;
}

#[tokio::test]
async fn owner_only_actions_test() {
    run_test(|chain, api| async move {
        chain
            .create_wallet(
                account(2),
                chain.factory(),
                &CreateWallet {
                    owners: vec![account(2), account(3)],
                    quorum: 1,
                },
            )
            .await
            .expect("wallet created");
        let list = api.wallets().await.expect("wallet list");
        let wallet = list.wallets[0].address;
        assert!(!api.stats(&wallet).await.expect("stats").is_owner);

        let err = api
            .create_withdrawal(
                &wallet,
                &WithdrawRequest {
                    to: account(3).to_string(),
                    amount: "1".to_owned(),
                },
            )
            .await
            .expect_err("not an owner");
        assert_eq!(api_code(err), 5);
        let err = api
            .approve(&wallet, &ApproveRequest { id: "0".to_owned() })
            .await
            .expect_err("not an owner");
        assert_eq!(api_code(err), 5);
        let err = api
            .approve(&wallet, &ApproveRequest { id: "-1".to_owned() })
            .await
            .expect_err("invalid id");
        assert_eq!(api_code(err), 1);
    })
    .await;
}

#[tokio::test]
async fn closed_wallet_is_not_watched_test() {
    run_test(|chain, api| async move {
        let wallet = displayed_wallet(&api).await;
        api.close(&wallet).await.expect("closed");
        assert!(api.status().await.expect("status").displayed.is_empty());
        chain
            .deposit(account(2), wallet, Wei(1000u64.into()))
            .await
            .expect("deposit");
        api.create_withdrawal(
            &wallet,
            &WithdrawRequest {
                to: account(3).to_string(),
                amount: "0.000000000000001".to_owned(),
            },
        )
        .await
        .expect("withdrawal created");
        let batch = api.notifications().await.expect("notifications");
        assert!(batch.events.is_empty());
        assert_eq!(api.pending(&wallet).await.expect("pending").txs.len(), 1);
    })
    .await;
}

#[tokio::test]
async fn tx_status_test() {
    run_test(|chain, api| async move {
        let tx = api
            .create_wallet(&owners_request(&[user()], 1))
            .await
            .expect("wallet created");
        let status = api.tx_status(&tx.hash).await.expect("tx status");
        assert_eq!(status.state, TxState::Confirmed);
        assert_eq!(status.explorer_url, tx.explorer_url);
        chain.set_receipt(tx.hash, TxState::Pending);
        let status = api.tx_status(&tx.hash).await.expect("tx status");
        assert_eq!(status.state, TxState::Pending);
    })
    .await;
}

async fn scanned_wallet() -> (TestChain, Mutex<ScanState>, EthAddress) {
    let chain = TestChain::new(vec![user(), account(2)]);
    let state = Mutex::new(ScanState::new(user(), chain.factory(), 1));
    chain
        .create_wallet(
            user(),
            chain.factory(),
            &CreateWallet {
                owners: vec![user(), account(2)],
                quorum: 2,
            },
        )
        .await
        .expect("wallet created");
    scan(&chain, &state).await.expect("scan");
    let wallet = state.lock().await.wallets[0];
    let view = WalletView::fetch(&chain, wallet).await.expect("view");
    state.lock().await.display(view);
    (chain, state, wallet)
}

#[tokio::test]
async fn rescan_notifies_once_test() {
    let (chain, state, wallet) = scanned_wallet().await;
    chain
        .deposit(user(), wallet, Wei(10u64.into()))
        .await
        .expect("deposit");
    assert_eq!(scan(&chain, &state).await.expect("scan"), 1);
    state.lock().await.next_block = 1;
    assert_eq!(scan(&chain, &state).await.expect("rescan"), 0);
    let messages: Vec<String> = state
        .lock()
        .await
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(messages, vec!["Wallet Id #0 created!", "Deposited 0.00000000000000001 Eth!"]);
}

#[tokio::test]
async fn node_failure_keeps_cursor_test() {
    let (chain, state, wallet) = scanned_wallet().await;
    let cursor = state.lock().await.next_block;
    chain
        .deposit(user(), wallet, Wei(10u64.into()))
        .await
        .expect("deposit");
    chain.set_offline(true);
    assert!(scan(&chain, &state).await.is_err());
    assert_eq!(state.lock().await.next_block, cursor);
    chain.set_offline(false);
    assert_eq!(scan(&chain, &state).await.expect("scan"), 1);
    assert_eq!(state.lock().await.displayed[&wallet].balance, Wei(10u64.into()));
}

#[tokio::test]
async fn balance_is_watched_test() {
    let (chain, state, wallet) = scanned_wallet().await;
    chain.set_balance(wallet, Wei(5u64.into()));
    chain.mine_block();
    assert_eq!(scan(&chain, &state).await.expect("scan"), 0);
    let state_r = state.lock().await;
    assert_eq!(state_r.displayed[&wallet].balance, Wei(5u64.into()));
    assert_eq!(state_r.next_block, chain.height() + 1);
}

async fn queued_messages(state: &Mutex<ScanState>) -> Vec<String> {
    state
        .lock()
        .await
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect()
}

#[tokio::test]
async fn approvals_in_one_pass_test() {
    let (chain, state, wallet) = scanned_wallet().await;
    chain
        .deposit(user(), wallet, Wei(20u64.into()))
        .await
        .expect("deposit");
    chain
        .create_withdraw_tx(
            user(),
            wallet,
            &Withdraw {
                to: account(3),
                amount: Wei(10u64.into()),
            },
        )
        .await
        .expect("withdraw");
    scan(&chain, &state).await.expect("scan");
    queued_messages(&state).await;

    chain
        .approve_withdraw_tx(user(), wallet, 0)
        .await
        .expect("first approval");
    chain
        .approve_withdraw_tx(account(2), wallet, 0)
        .await
        .expect("second approval");
    assert_eq!(scan(&chain, &state).await.expect("scan"), 2);
    assert_eq!(
        queued_messages(&state).await,
        vec![
            "txnId: 0 is approved (1/2)",
            "txnId: 0 is approved and sent to recipient!"
        ]
    );
}

#[tokio::test]
async fn handled_events_are_forgotten_test() {
    let (chain, state, wallet) = scanned_wallet().await;
    for _ in 0..3 {
        chain
            .deposit(user(), wallet, Wei(10u64.into()))
            .await
            .expect("deposit");
    }
    assert_eq!(scan(&chain, &state).await.expect("scan"), 3);
    assert_eq!(state.lock().await.seen_len(), 4);
    for _ in 0..SEEN_BLOCK_WINDOW + 10 {
        chain.mine_block();
    }
    assert_eq!(scan(&chain, &state).await.expect("scan"), 0);
    assert_eq!(state.lock().await.seen_len(), 0);
}
