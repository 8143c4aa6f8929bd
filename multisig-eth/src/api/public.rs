use crate::constants::explorer_tx_url;
use crate::node::MultisigNode;
use crate::state::{ScanState, WalletView};
use crate::worker::refresh_wallet_list;
use log::*;
use multisig_api::ethereum::*;
use multisig_api::events::*;
use multisig_api::requests::*;
use multisig_api::wallet::*;
use rocket::fairing::AdHoc;
use rocket::figment::{providers::Env, Figment};
use rocket::{get, post, serde::json::Json, Config, State};
use rocket_okapi::settings::UrlObject;
use rocket_okapi::{openapi, openapi_get_routes, rapidoc::*, swagger_ui::*};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use super::error;

/// Base URL of the block explorer used for transaction links
pub struct ExplorerUrl(pub String);

type Node = Arc<dyn MultisigNode>;

fn parse_wallet(address: &str) -> Result<EthAddress, error::Error> {
    Ok(EthAddress::from_str(address)?)
}

async fn ensure_listed(
    node: &Node,
    state: &Mutex<ScanState>,
    wallet: EthAddress,
) -> Result<(), error::Error> {
    let listed = state.lock().await.is_listed(wallet);
    if listed {
        return Ok(());
    }
    refresh_wallet_list(node.as_ref(), state).await?;
    let listed = state.lock().await.is_listed(wallet);
    if listed {
        Ok(())
    } else {
        Err(error::Error::UnknownWallet(wallet))
    }
}

/// Mounted view when the wallet is displayed, fresh reads otherwise
async fn wallet_view(
    node: &Node,
    state: &Mutex<ScanState>,
    wallet: EthAddress,
) -> Result<WalletView, error::Error> {
    let mounted = state.lock().await.displayed.get(&wallet).cloned();
    if let Some(view) = mounted {
        return Ok(view);
    }
    ensure_listed(node, state, wallet).await?;
    Ok(WalletView::fetch(node.as_ref(), wallet).await?)
}

async fn owned_view(
    node: &Node,
    state: &Mutex<ScanState>,
    wallet: EthAddress,
) -> Result<(EthAddress, WalletView), error::Error> {
    let view = wallet_view(node, state, wallet).await?;
    let account = state.lock().await.account;
    if !view.is_owner(account) {
        return Err(error::Error::NotOwner { account, wallet });
    }
    Ok((account, view))
}

fn submitted(explorer: &ExplorerUrl, hash: TxHash) -> TxSubmitted {
    TxSubmitted {
        hash,
        explorer_url: explorer_tx_url(&explorer.0, &hash),
    }
}

#[openapi(tag = "misc")]
#[get("/ping")]
fn ping() -> Json<()> {
    Json(())
}

/// Acting account, factory and chain the service is connected to
#[openapi(tag = "misc")]
#[get("/status")]
async fn get_status(
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<ConnectionStatus> {
    let chain_id = node.chain_id().await.map_err(error::Error::from)?;
    let block = node.block_number().await.map_err(error::Error::from)?;
    let state_r = state.lock().await;
    Ok(Json(ConnectionStatus {
        account: state_r.account,
        factory: state_r.factory,
        chain_id,
        block,
        displayed: state_r.displayed_wallets(),
    }))
}

/// Wallets deployed by the factory
#[openapi(tag = "wallets")]
#[get("/wallets")]
async fn get_wallets(
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<WalletList> {
    refresh_wallet_list(node.inner().as_ref(), state)
        .await
        .map_err(error::Error::from)?;
    let state_r = state.lock().await;
    Ok(Json(WalletList::new(state_r.factory, &state_r.wallets)))
}

/// Mount the wallet view and start watching its events
#[openapi(tag = "wallets")]
#[post("/wallet/<address>/display")]
async fn display_wallet(
    address: String,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<WalletStats> {
    let wallet = parse_wallet(&address)?;
    ensure_listed(node, state, wallet).await?;
    let view = WalletView::fetch(node.inner().as_ref(), wallet)
        .await
        .map_err(error::Error::from)?;
    let mut state_rw = state.lock().await;
    let stats = view.stats(state_rw.account);
    state_rw.display(view);
    info!("Displaying wallet {wallet}");
    Ok(Json(stats))
}

#[openapi(tag = "wallets")]
#[post("/wallet/<address>/close")]
async fn close_wallet(
    address: String,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<()> {
    let wallet = parse_wallet(&address)?;
    if state.lock().await.close(wallet) {
        info!("Closed wallet {wallet}");
    }
    Ok(Json(()))
}

/// Balance, quorum and owners of a wallet
#[openapi(tag = "wallets")]
#[get("/wallet/<address>/stats")]
async fn wallet_stats(
    address: String,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<WalletStats> {
    let wallet = parse_wallet(&address)?;
    let view = wallet_view(node, state, wallet).await?;
    let account = state.lock().await.account;
    Ok(Json(view.stats(account)))
}

/// Withdrawal requests that still need approvals
#[openapi(tag = "wallets")]
#[get("/wallet/<address>/pending")]
async fn wallet_pending(
    address: String,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
) -> error::Result<PendingWithdrawals> {
    let wallet = parse_wallet(&address)?;
    let view = wallet_view(node, state, wallet).await?;
    Ok(Json(view.pending_withdrawals()))
}

/// Deploy a new wallet through the factory
#[openapi(tag = "actions")]
#[post("/factory/wallets", data = "<request>")]
async fn create_wallet(
    request: Json<CreateWalletRequest>,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
    explorer: &State<ExplorerUrl>,
) -> error::Result<TxSubmitted> {
    let call = request.validate().map_err(error::Error::from)?;
    let (account, factory) = {
        let state_r = state.lock().await;
        (state_r.account, state_r.factory)
    };
    let hash = node
        .create_wallet(account, factory, &call)
        .await
        .map_err(error::Error::from)?;
    Ok(Json(submitted(explorer, hash)))
}

#[openapi(tag = "actions")]
#[post("/wallet/<address>/deposit", data = "<request>")]
async fn deposit(
    address: String,
    request: Json<DepositRequest>,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
    explorer: &State<ExplorerUrl>,
) -> error::Result<TxSubmitted> {
    let wallet = parse_wallet(&address)?;
    let amount = request.validate().map_err(error::Error::from)?;
    ensure_listed(node, state, wallet).await?;
    let account = state.lock().await.account;
    let hash = node
        .deposit(account, wallet, amount)
        .await
        .map_err(error::Error::from)?;
    Ok(Json(submitted(explorer, hash)))
}

/// Propose a withdrawal, only owners can do this
#[openapi(tag = "actions")]
#[post("/wallet/<address>/withdrawals", data = "<request>")]
async fn create_withdrawal(
    address: String,
    request: Json<WithdrawRequest>,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
    explorer: &State<ExplorerUrl>,
) -> error::Result<TxSubmitted> {
    let wallet = parse_wallet(&address)?;
    let call = request.validate().map_err(error::Error::from)?;
    let (account, _) = owned_view(node, state, wallet).await?;
    let hash = node
        .create_withdraw_tx(account, wallet, &call)
        .await
        .map_err(error::Error::from)?;
    Ok(Json(submitted(explorer, hash)))
}

/// Approve a pending withdrawal by its id, only owners can do this
#[openapi(tag = "actions")]
#[post("/wallet/<address>/approve", data = "<request>")]
async fn approve_withdrawal(
    address: String,
    request: Json<ApproveRequest>,
    node: &State<Node>,
    state: &State<Arc<Mutex<ScanState>>>,
    explorer: &State<ExplorerUrl>,
) -> error::Result<TxSubmitted> {
    let wallet = parse_wallet(&address)?;
    let id = request.validate().map_err(error::Error::from)?;
    let (account, _) = owned_view(node, state, wallet).await?;
    let hash = node
        .approve_withdraw_tx(account, wallet, id)
        .await
        .map_err(error::Error::from)?;
    Ok(Json(submitted(explorer, hash)))
}

/// Whether a submitted transaction is mined
#[openapi(tag = "actions")]
#[get("/tx/<hash>")]
async fn tx_status(
    hash: String,
    node: &State<Node>,
    explorer: &State<ExplorerUrl>,
) -> error::Result<TxStatus> {
    let hash = TxHash::from_str(&hash).map_err(error::Error::TxHash)?;
    let state = node.tx_state(hash).await.map_err(error::Error::from)?;
    Ok(Json(TxStatus {
        hash,
        state,
        explorer_url: explorer_tx_url(&explorer.0, &hash),
    }))
}

/// Long poll for notifications. Each notification is returned once.
#[openapi(tag = "events")]
#[post("/notifications")]
async fn poll_notifications(
    polling_timeout: &State<Duration>,
    state: &State<Arc<Mutex<ScanState>>>,
    state_notify: &State<Arc<Notify>>,
) -> Json<Notifications> {
    {
        let mut state_rw = state.lock().await;
        if !state_rw.notifications.is_empty() {
            return Json(Notifications {
                height: state_rw.last_height,
                events: state_rw.take_notifications(),
            });
        }
    }
    trace!("Awaiting notifications");
    match timeout(*polling_timeout.inner(), state_notify.notified()).await {
        Ok(_) => {
            debug!("Got new notifications");
        }
        Err(_) => {
            trace!("No new notifications but releasing long poll");
        }
    }
    let mut state_rw = state.lock().await;
    Json(Notifications {
        height: state_rw.last_height,
        events: state_rw.take_notifications(),
    })
}

pub async fn serve_public_api(
    node: Arc<dyn MultisigNode>,
    address: IpAddr,
    port: u16,
    start_notify: Arc<Notify>,
    state: Arc<Mutex<ScanState>>,
    state_notify: Arc<Notify>,
    polling_duration: Duration,
    explorer_url: String,
) -> Result<(), rocket::Error> {
    let figment = Figment::from(Config {
        address,
        port,
        ..Config::default()
    })
    .merge(Env::prefixed("MULTISIG_ETH_").global());

    let on_ready = AdHoc::on_liftoff("API Start!", |_| {
        Box::pin(async move {
            start_notify.notify_one();
        })
    });

    rocket::custom(figment)
        .mount(
            "/",
            openapi_get_routes![
                ping,
                get_status,
                get_wallets,
                display_wallet,
                close_wallet,
                wallet_stats,
                wallet_pending,
                create_wallet,
                deposit,
                create_withdrawal,
                approve_withdrawal,
                tx_status,
                poll_notifications
            ],
        )
        .mount(
            "/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("General", "../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .manage(node)
        .manage(polling_duration)
        .manage(state)
        .manage(state_notify)
        .manage(ExplorerUrl(explorer_url))
        .attach(on_ready)
        .launch()
        .await?;
    Ok(())
}
