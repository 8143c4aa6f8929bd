use crate::node::{MultisigNode, NodeError, Result};
use async_trait::async_trait;
use multisig_api::ethereum::*;
use multisig_api::events::*;
use multisig_api::requests::{CreateWallet, Withdraw};
use multisig_api::wallet::{TxState, WithdrawTx};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use web3::types::{H160, H256, U256};

pub const CHAIN_ID: u64 = 31337;

struct TestWallet {
    address: EthAddress,
    quorum: u64,
    owners: Vec<EthAddress>,
    txs: Vec<WithdrawTx>,
    approved: HashSet<(u64, EthAddress)>,
}

struct Chain {
    height: u64,
    accounts: Vec<EthAddress>,
    factory: EthAddress,
    wallets: Vec<TestWallet>,
    balances: HashMap<EthAddress, U256>,
    logs: Vec<ContractLog>,
    receipts: HashMap<TxHash, TxState>,
    sent: u64,
    offline: bool,
}

/// In-memory chain with factory and wallet contracts. Every write is mined
/// into its own block right away.
pub struct TestChain {
    chain: Mutex<Chain>,
}

fn reverted(reason: &str) -> NodeError {
    NodeError::Rejected(format!("execution reverted: {reason}"))
}

impl Chain {
    fn wallet_mut(&mut self, address: EthAddress) -> Result<&mut TestWallet> {
        self.wallets
            .iter_mut()
            .find(|w| w.address == address)
            .ok_or_else(|| reverted("not a wallet"))
    }

    fn wallet(&self, address: EthAddress) -> Result<&TestWallet> {
        self.wallets
            .iter()
            .find(|w| w.address == address)
            .ok_or_else(|| reverted("not a wallet"))
    }

    fn online(&self) -> Result<()> {
        if self.offline {
            Err(NodeError::Transport(web3::Error::Unreachable))
        } else {
            Ok(())
        }
    }

    fn balance(&self, address: EthAddress) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    fn mine(&mut self, contract: EthAddress, events: Vec<MultisigEvent>) -> TxHash {
        self.sent += 1;
        self.height += 1;
        let hash = TxHash(H256::from_low_u64_be(self.sent));
        for (i, event) in events.into_iter().enumerate() {
            self.logs.push(ContractLog {
                id: EventId {
                    tx_hash: hash,
                    log_index: i as u64,
                },
                contract,
                block: self.height,
                event,
            });
        }
        self.receipts.insert(hash, TxState::Confirmed);
        hash
    }
}

impl TestChain {
    pub fn new(accounts: Vec<EthAddress>) -> Self {
        let balances = accounts
            .iter()
            .map(|a| (*a, U256::exp10(21)))
            .collect();
        TestChain {
            chain: Mutex::new(Chain {
                height: 0,
                accounts,
                factory: EthAddress(H160::from_low_u64_be(0xfac)),
                wallets: vec![],
                balances,
                logs: vec![],
                receipts: HashMap::new(),
                sent: 0,
                offline: false,
            }),
        }
    }

    // Poisoning only happens after a panic in a test, which fails it anyway
    fn lock(&self) -> std::sync::MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn factory(&self) -> EthAddress {
        self.lock().factory
    }

    pub fn height(&self) -> u64 {
        self.lock().height
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Mines an empty block
    pub fn mine_block(&self) {
        self.lock().height += 1;
    }

    /// Moves the balance without emitting events, like a plain transfer
    pub fn set_balance(&self, address: EthAddress, amount: Wei) {
        self.lock().balances.insert(address, amount.0);
    }

    /// Overrides the receipt state of a transaction
    pub fn set_receipt(&self, hash: TxHash, state: TxState) {
        self.lock().receipts.insert(hash, state);
    }
}

#[async_trait]
impl MultisigNode for TestChain {
    async fn accounts(&self) -> Result<Vec<EthAddress>> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64> {
        self.lock().online()?;
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> Result<u64> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain.height)
    }

    async fn balance(&self, address: EthAddress) -> Result<Wei> {
        let chain = self.lock();
        chain.online()?;
        Ok(Wei(chain.balance(address)))
    }

    async fn wallet_list(&self, factory: EthAddress) -> Result<Vec<EthAddress>> {
        let chain = self.lock();
        chain.online()?;
        if factory != chain.factory {
            return Ok(vec![]);
        }
        Ok(chain.wallets.iter().map(|w| w.address).collect())
    }

    async fn quorum(&self, wallet: EthAddress) -> Result<u64> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain.wallet(wallet)?.quorum)
    }

    async fn owners(&self, wallet: EthAddress) -> Result<Vec<EthAddress>> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain.wallet(wallet)?.owners.clone())
    }

    async fn withdraw_txes(&self, wallet: EthAddress) -> Result<Vec<WithdrawTx>> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain.wallet(wallet)?.txs.clone())
    }

    async fn tx_state(&self, hash: TxHash) -> Result<TxState> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain
            .receipts
            .get(&hash)
            .cloned()
            .unwrap_or(TxState::Pending))
    }

    async fn logs(
        &self,
        factory: EthAddress,
        wallets: &[EthAddress],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ContractLog>> {
        let chain = self.lock();
        chain.online()?;
        Ok(chain
            .logs
            .iter()
            .filter(|log| log.block >= from_block && log.block <= to_block)
            .filter(|log| log.contract == factory || wallets.contains(&log.contract))
            .cloned()
            .collect())
    }

    async fn create_wallet(
        &self,
        from: EthAddress,
        factory: EthAddress,
        call: &CreateWallet,
    ) -> Result<TxHash> {
        let mut chain = self.lock();
        chain.online()?;
        if factory != chain.factory {
            return Err(reverted("not a factory"));
        }
        if call.quorum == 0 || call.quorum > call.owners.len() as u64 {
            return Err(reverted("invalid quorum"));
        }
        let index = chain.wallets.len() as u64;
        let address = EthAddress(H160::from_low_u64_be(0x1000 + index));
        chain.wallets.push(TestWallet {
            address,
            quorum: call.quorum,
            owners: call.owners.clone(),
            txs: vec![],
            approved: HashSet::new(),
        });
        Ok(chain.mine(
            factory,
            vec![MultisigEvent::WalletCreated { sender: from, index }],
        ))
    }

    async fn deposit(&self, from: EthAddress, wallet: EthAddress, amount: Wei) -> Result<TxHash> {
        let mut chain = self.lock();
        chain.online()?;
        chain.wallet(wallet)?;
        let funds = chain.balance(from);
        if funds < amount.0 {
            return Err(NodeError::Rejected("insufficient funds for transfer".to_owned()));
        }
        chain.balances.insert(from, funds - amount.0);
        let held = chain.balance(wallet);
        chain.balances.insert(wallet, held + amount.0);
        Ok(chain.mine(
            wallet,
            vec![MultisigEvent::Deposit {
                sender: from,
                amount,
            }],
        ))
    }

    async fn create_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        call: &Withdraw,
    ) -> Result<TxHash> {
        let mut chain = self.lock();
        chain.online()?;
        let test_wallet = chain.wallet_mut(wallet)?;
        if !test_wallet.owners.contains(&from) {
            return Err(reverted("not owner"));
        }
        let index = test_wallet.txs.len() as u64;
        test_wallet.txs.push(WithdrawTx {
            id: index,
            to: call.to,
            amount: call.amount,
            approvals: 0,
            sent: false,
        });
        Ok(chain.mine(
            wallet,
            vec![MultisigEvent::CreateWithdrawTx {
                amount: call.amount,
                index,
            }],
        ))
    }

    async fn approve_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        id: u64,
    ) -> Result<TxHash> {
        let mut chain = self.lock();
        chain.online()?;
        let held = chain.balance(wallet);
        let test_wallet = chain.wallet_mut(wallet)?;
        if !test_wallet.owners.contains(&from) {
            return Err(reverted("not owner"));
        }
        let quorum = test_wallet.quorum;
        let tx = test_wallet
            .txs
            .get(id as usize)
            .cloned()
            .ok_or_else(|| reverted("transaction does not exist"))?;
        if tx.sent {
            return Err(reverted("transaction already sent"));
        }
        if test_wallet.approved.contains(&(id, from)) {
            return Err(reverted("transaction already approved"));
        }
        let approvals = tx.approvals + 1;
        let sent = approvals >= quorum;
        if sent && held < tx.amount.0 {
            return Err(reverted("insufficient balance"));
        }
        test_wallet.approved.insert((id, from));
        test_wallet.txs[id as usize].approvals = approvals;
        test_wallet.txs[id as usize].sent = sent;
        if sent {
            chain.balances.insert(wallet, held - tx.amount.0);
            let received = chain.balance(tx.to);
            chain.balances.insert(tx.to, received + tx.amount.0);
        }
        Ok(chain.mine(wallet, vec![MultisigEvent::ApproveWithdrawTx { index: id }]))
    }
}
