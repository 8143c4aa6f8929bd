use clap::Parser;
use futures::future::{AbortHandle, Abortable, Aborted};
use log::*;
use multisig_api::ethereum::EthAddress;
use multisig_eth::api::public::serve_public_api;
use multisig_eth::constants::RESTART_DELAY;
use multisig_eth::node::{MultisigNode, NodeError, Web3Node};
use multisig_eth::state::ScanState;
use multisig_eth::worker::{first_to_stop, node_worker, refresh_wallet_list};
use std::error::Error;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;

#[derive(Parser, Debug, Clone)]
#[clap(about, version, author)]
struct Args {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    /// Start listening incoming API requests
    Serve(ServeArgs),
}

#[derive(Parser, Debug, Clone)]
struct ServeArgs {
    #[clap(long, short, default_value = "8560", env = "MULTISIG_ETH_API_PORT")]
    port: u16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MULTISIG_ETH_API_ADDRESS"
    )]
    address: IpAddr,
    #[clap(long, default_value = "http://127.0.0.1:8545", env = "MULTISIG_ETH_NODE_URL")]
    node_url: String,
    /// Address of the wallet factory contract
    #[clap(long, env = "MULTISIG_FACTORY_ADDRESS")]
    factory: EthAddress,
    /// Account to send transactions from, the first node account by default
    #[clap(long, env = "MULTISIG_ACCOUNT")]
    account: Option<EthAddress>,
    #[clap(long, default_value = "https://sepolia.basescan.org", env = "MULTISIG_EXPLORER_URL")]
    explorer_url: String,
    /// Seconds between scans of new blocks
    #[clap(long, default_value = "4", env = "MULTISIG_POLLING_SLEEP")]
    polling_sleep: u64,
    /// Seconds a notification long poll is held open
    #[clap(long, default_value = "30", env = "MULTISIG_POLLING_TIMEOUT")]
    polling_timeout: u64,
}

#[derive(Debug, Error)]
enum LogicError {
    #[error("API error: {0}")]
    Api(#[from] rocket::Error),
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
    #[error("Node has no unlocked accounts, set MULTISIG_ACCOUNT")]
    NoAccount,
}

async fn run_service(args: &ServeArgs) -> Result<(), LogicError> {
    let node: Arc<dyn MultisigNode> = Arc::new(Web3Node::new(&args.node_url)?);
    let account = match args.account {
        Some(account) => account,
        None => node
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or(LogicError::NoAccount)?,
    };
    let head = node.block_number().await?;
    info!("Connected to {} at block {head}, acting as {account}", args.node_url);

    let state = Arc::new(Mutex::new(ScanState::connected(account, args.factory, head)));
    refresh_wallet_list(node.as_ref(), &state).await?;

    let state_notify = Arc::new(Notify::new());
    let start_notify = Arc::new(Notify::new());
    let worker_fut = async {
        node_worker(
            node.clone(),
            state.clone(),
            state_notify.clone(),
            Duration::from_secs(args.polling_sleep),
        )
        .await
    };
    let public_api_fut = async {
        serve_public_api(
            node.clone(),
            args.address,
            args.port,
            start_notify.clone(),
            state.clone(),
            state_notify.clone(),
            Duration::from_secs(args.polling_timeout),
            args.explorer_url.clone(),
        )
        .await
        .map_err(LogicError::from)
    };
    first_to_stop(worker_fut, public_api_fut).await?;
    Ok(())
}

async fn serve_loop(args: ServeArgs) {
    loop {
        match run_service(&args).await {
            Ok(_) => info!("Service stopped"),
            Err(e) => error!("Terminated with: {e}"),
        }
        info!("Adding {:?} delay before restarting logic", RESTART_DELAY);
        sleep(RESTART_DELAY).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    match args.subcmd {
        SubCommand::Serve(serve_args) => {
            let (abort_handle, abort_reg) = AbortHandle::new_pair();
            ctrlc::set_handler(move || {
                abort_handle.abort();
            })?;
            match Abortable::new(serve_loop(serve_args), abort_reg).await {
                Ok(_) => (),
                Err(Aborted) => {
                    error!("API and worker aborted");
                }
            }
        }
    }
    Ok(())
}
