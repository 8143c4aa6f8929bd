use clap::Parser;
use log::*;
use multisig_api::ethereum::*;
use multisig_api::events::NotificationKind;
use multisig_api::requests::*;
use multisig_api::wallet::*;
use multisig_client::client::{MultisigClient, Result};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug, Clone)]
#[clap(about, version, author)]
struct Args {
    /// Base URL of the multisig-eth API
    #[clap(long, default_value = "http://127.0.0.1:8560", env = "MULTISIG_API_URL")]
    server: String,
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
struct WaitArg {
    /// Wait until the transaction is mined
    #[clap(long)]
    wait: bool,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    /// Show the connected account and chain
    Status,
    /// List wallets deployed by the factory
    Wallets,
    /// Display a wallet and watch its events
    Display { wallet: EthAddress },
    /// Stop watching a wallet
    Close { wallet: EthAddress },
    /// Show balance, quorum and owners of a wallet
    Stats { wallet: EthAddress },
    /// List withdrawal requests waiting for approvals
    Pending { wallet: EthAddress },
    /// Deploy a new wallet
    CreateWallet {
        /// Owner address, repeat for every owner
        #[clap(long = "owner", required = true)]
        owners: Vec<String>,
        #[clap(long)]
        quorum: String,
        #[clap(flatten)]
        wait: WaitArg,
    },
    /// Send ether to a wallet
    Deposit {
        wallet: EthAddress,
        /// Amount in ether
        amount: String,
        #[clap(flatten)]
        wait: WaitArg,
    },
    /// Propose a withdrawal from a wallet
    Withdraw {
        wallet: EthAddress,
        #[clap(long)]
        to: String,
        /// Amount in ether
        #[clap(long)]
        amount: String,
        #[clap(flatten)]
        wait: WaitArg,
    },
    /// Approve a withdrawal request
    Approve {
        wallet: EthAddress,
        id: String,
        #[clap(flatten)]
        wait: WaitArg,
    },
    /// Show the state of a transaction
    Tx { hash: TxHash },
    /// Print notifications as they arrive
    Watch,
}

fn print_stats(stats: &WalletStats) {
    println!("Wallet:  {}", stats.address);
    println!("Balance: {} {}", stats.balance_formatted, stats.symbol);
    println!("Quorum:  {}", stats.quorum);
    println!("Owners:");
    for owner in &stats.owners {
        println!("  {owner}");
    }
    if stats.is_owner {
        println!("You are an owner of this wallet");
    }
}

fn pending_row(tx: &WithdrawTx, quorum: u64) -> String {
    format!(
        "txnId: {} to {} amount {} {} approvals {}/{} sent: {}",
        tx.id,
        tx.to,
        format_ether(tx.amount),
        ETHER_SYMBOL,
        tx.approvals,
        quorum,
        if tx.sent { "yes" } else { "no" }
    )
}

/// `None` while the transaction still has to be mined, else whether it succeeded
fn wait_outcome(state: &TxState) -> Option<bool> {
    match state {
        TxState::Pending => None,
        TxState::Confirmed => Some(true),
        TxState::Failed => Some(false),
    }
}

/// Prints the success message once the transaction is through
async fn report(client: &MultisigClient, tx: TxSubmitted, wait: &WaitArg, success: String) -> Result<bool> {
    if !wait.wait {
        println!("Transaction {} submitted", tx.hash);
        println!("{}", tx.explorer_url);
        return Ok(true);
    }
    loop {
        let status = client.tx_status(&tx.hash).await?;
        match wait_outcome(&status.state) {
            None => {
                debug!("Transaction {} is pending", tx.hash);
                sleep(Duration::from_secs(2)).await;
            }
            Some(confirmed) => {
                if confirmed {
                    println!("{success}");
                } else {
                    println!("Error: transaction {} failed", tx.hash);
                }
                println!("{}", status.explorer_url);
                return Ok(confirmed);
            }
        }
    }
}

async fn run(client: &MultisigClient, subcmd: SubCommand) -> Result<bool> {
    match subcmd {
        SubCommand::Status => {
            let status = client.status().await?;
            println!("Connected to {}", status.account);
            println!("Factory: {}", status.factory);
            println!("Chain:   {} at block {}", status.chain_id, status.block);
            for wallet in status.displayed {
                println!("Displaying {wallet}");
            }
        }
        SubCommand::Wallets => {
            let list = client.wallets().await?;
            if list.wallets.is_empty() {
                println!("No wallets created by {}", list.factory);
            }
            for entry in list.wallets {
                println!("Wallet #{}: {}", entry.index, entry.address);
            }
        }
        SubCommand::Display { wallet } => {
            let stats = client.display(&wallet).await?;
            print_stats(&stats);
        }
        SubCommand::Close { wallet } => {
            client.close(&wallet).await?;
            println!("Closed {wallet}");
        }
        SubCommand::Stats { wallet } => {
            let stats = client.stats(&wallet).await?;
            print_stats(&stats);
        }
        SubCommand::Pending { wallet } => {
            let pending = client.pending(&wallet).await?;
            if pending.txs.is_empty() {
                println!("No pending withdrawals");
            }
            for tx in &pending.txs {
                println!("{}", pending_row(tx, pending.quorum));
            }
        }
        SubCommand::CreateWallet {
            owners,
            quorum,
            wait,
        } => {
            let tx = client
                .create_wallet(&CreateWalletRequest { owners, quorum })
                .await?;
            let success = "Created a new wallet successfully!".to_owned();
            return report(client, tx, &wait, success).await;
        }
        SubCommand::Deposit {
            wallet,
            amount,
            wait,
        } => {
            let tx = client
                .deposit(&wallet, &DepositRequest { amount: amount.clone() })
                .await?;
            let success = format!("Successfully deposited {} ETH!", amount.trim());
            return report(client, tx, &wait, success).await;
        }
        SubCommand::Withdraw {
            wallet,
            to,
            amount,
            wait,
        } => {
            let tx = client
                .create_withdrawal(&wallet, &WithdrawRequest { to, amount })
                .await?;
            let success = "Successfully created a withdrawal transaction!".to_owned();
            return report(client, tx, &wait, success).await;
        }
        SubCommand::Approve { wallet, id, wait } => {
            let tx = client
                .approve(&wallet, &ApproveRequest { id: id.clone() })
                .await?;
            let success = format!("Successfully approved transaction ID #{}!", id.trim());
            return report(client, tx, &wait, success).await;
        }
        SubCommand::Tx { hash } => {
            let status = client.tx_status(&hash).await?;
            println!("{:?}", status.state);
            println!("{}", status.explorer_url);
        }
        SubCommand::Watch => loop {
            let batch = client.notifications().await?;
            for notification in batch.events {
                let kind = match notification.kind {
                    NotificationKind::Info => "info",
                    NotificationKind::Success => "success",
                };
                println!("[{kind}] {}", notification.message);
            }
        },
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );
    let client = MultisigClient::new(&args.server);
    match run(&client, args.subcmd).await {
        Ok(true) => (),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            println!("Error: {e}");
            std::process::exit(1);
        }
    }
}
