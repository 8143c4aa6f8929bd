use super::{saturating_u64, MultisigNode, NodeError, Result};
use async_trait::async_trait;
use log::*;
use multisig_api::ethereum::*;
use multisig_api::events::{ContractLog, EventId, MultisigEvent};
use multisig_api::requests::{CreateWallet, Withdraw};
use multisig_api::wallet::{TxState, WithdrawTx};
use web3::contract::tokens::Tokenize;
use web3::contract::{Contract, Options};
use web3::ethabi::{self, RawLog, Token};
use web3::transports::Http;
use web3::types::{Address, BlockNumber, FilterBuilder, Log, U256};
use web3::Web3;

const FACTORY_ABI: &[u8] = include_bytes!("../../abi/Factory.json");
const WALLET_ABI: &[u8] = include_bytes!("../../abi/MultiSigWallet.json");

/// Contract access over JSON-RPC
#[derive(Clone)]
pub struct Web3Node {
    web3: Web3<Http>,
    factory_abi: ethabi::Contract,
    wallet_abi: ethabi::Contract,
}

impl Web3Node {
    pub fn new(node_url: &str) -> Result<Self> {
        let transport = Http::new(node_url)?;
        Ok(Web3Node {
            web3: Web3::new(transport),
            factory_abi: ethabi::Contract::load(FACTORY_ABI)?,
            wallet_abi: ethabi::Contract::load(WALLET_ABI)?,
        })
    }

    fn factory(&self, address: EthAddress) -> Contract<Http> {
        Contract::new(self.web3.eth(), address.0, self.factory_abi.clone())
    }

    fn wallet(&self, address: EthAddress) -> Contract<Http> {
        Contract::new(self.web3.eth(), address.0, self.wallet_abi.clone())
    }

    /// Estimates gas first so that a call the contract rejects fails with
    /// the node's revert message instead of a mined failed transaction.
    async fn send<P>(
        &self,
        contract: &Contract<Http>,
        func: &str,
        params: P,
        from: EthAddress,
        options: Options,
    ) -> Result<TxHash>
    where
        P: Tokenize + Clone + Send,
    {
        let gas = contract
            .estimate_gas(func, params.clone(), from.0, options.clone())
            .await
            .map_err(|e| NodeError::Rejected(e.to_string()))?;
        debug!("Estimated {gas} gas for {func} on {:?}", contract.address());
        let options = Options {
            gas: Some(gas),
            ..options
        };
        let hash = contract.call(func, params, from.0, options).await?;
        info!("Sent {func} to {:?}: {:?}", contract.address(), hash);
        Ok(hash.into())
    }

    fn decode_log(&self, factory: EthAddress, log: Log) -> Result<Option<ContractLog>> {
        if log.removed == Some(true) {
            return Ok(None);
        }
        let topic = match log.topics.first() {
            Some(topic) => *topic,
            None => return Ok(None),
        };
        let contract = EthAddress(log.address);
        let abi = if contract == factory {
            &self.factory_abi
        } else {
            &self.wallet_abi
        };
        let event = match abi.events().find(|e| e.signature() == topic) {
            Some(event) => event,
            None => {
                trace!("Skipping unknown log topic {:?} of {}", topic, contract);
                return Ok(None);
            }
        };
        let parsed = event.parse_log(RawLog {
            topics: log.topics.clone(),
            data: log.data.0.clone(),
        })?;
        let values: Vec<Token> = parsed.params.into_iter().map(|p| p.value).collect();
        let decoded = match (event.name.as_str(), values.as_slice()) {
            ("WalletCreated", [Token::Address(sender), Token::Uint(index)]) => {
                MultisigEvent::WalletCreated {
                    sender: (*sender).into(),
                    index: saturating_u64(*index),
                }
            }
            ("Deposit", [Token::Address(sender), Token::Uint(amount)]) => MultisigEvent::Deposit {
                sender: (*sender).into(),
                amount: Wei(*amount),
            },
            ("CreateWithdrawTx", [Token::Uint(amount), Token::Uint(index)]) => {
                MultisigEvent::CreateWithdrawTx {
                    amount: Wei(*amount),
                    index: saturating_u64(*index),
                }
            }
            ("ApproveWithdrawTx", [Token::Uint(index)]) => MultisigEvent::ApproveWithdrawTx {
                index: saturating_u64(*index),
            },
            (name, values) => {
                return Err(NodeError::Malformed(format!(
                    "event {name} with arguments {values:?}"
                )))
            }
        };
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| NodeError::Malformed("log without transaction hash".to_owned()))?;
        Ok(Some(ContractLog {
            id: EventId {
                tx_hash: tx_hash.into(),
                log_index: log.log_index.map(saturating_u64).unwrap_or_default(),
            },
            contract,
            block: log.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            event: decoded,
        }))
    }
}

fn decode_withdraw_txes(token: Token) -> Result<Vec<WithdrawTx>> {
    let items = match token {
        Token::Array(items) => items,
        other => {
            return Err(NodeError::Malformed(format!(
                "expected list of withdrawals, got {other:?}"
            )))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(id, item)| match item {
            Token::Tuple(fields) => match fields.as_slice() {
                [Token::Address(to), Token::Uint(amount), Token::Uint(approvals), Token::Bool(sent)] => {
                    Ok(WithdrawTx {
                        id: id as u64,
                        to: (*to).into(),
                        amount: Wei(*amount),
                        approvals: saturating_u64(*approvals),
                        sent: *sent,
                    })
                }
                other => Err(NodeError::Malformed(format!("withdrawal fields {other:?}"))),
            },
            other => Err(NodeError::Malformed(format!("withdrawal {other:?}"))),
        })
        .collect()
}

#[async_trait]
impl MultisigNode for Web3Node {
    async fn accounts(&self) -> Result<Vec<EthAddress>> {
        let accounts = self.web3.eth().accounts().await?;
        Ok(accounts.into_iter().map(EthAddress).collect())
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self.web3.eth().chain_id().await?;
        Ok(saturating_u64(id))
    }

    async fn block_number(&self) -> Result<u64> {
        let height = self.web3.eth().block_number().await?;
        Ok(height.as_u64())
    }

    async fn balance(&self, address: EthAddress) -> Result<Wei> {
        let balance = self.web3.eth().balance(address.0, None).await?;
        Ok(Wei(balance))
    }

    async fn wallet_list(&self, factory: EthAddress) -> Result<Vec<EthAddress>> {
        let wallets: Vec<Address> = self
            .factory(factory)
            .query("getWalletList", (), None, Options::default(), None)
            .await?;
        Ok(wallets.into_iter().map(EthAddress).collect())
    }

    async fn quorum(&self, wallet: EthAddress) -> Result<u64> {
        let quorum: U256 = self
            .wallet(wallet)
            .query("quoremRequired", (), None, Options::default(), None)
            .await?;
        Ok(saturating_u64(quorum))
    }

    async fn owners(&self, wallet: EthAddress) -> Result<Vec<EthAddress>> {
        let owners: Vec<Address> = self
            .wallet(wallet)
            .query("getOwners", (), None, Options::default(), None)
            .await?;
        Ok(owners.into_iter().map(EthAddress).collect())
    }

    async fn withdraw_txes(&self, wallet: EthAddress) -> Result<Vec<WithdrawTx>> {
        let raw: Token = self
            .wallet(wallet)
            .query("getWithdrawTxes", (), None, Options::default(), None)
            .await?;
        decode_withdraw_txes(raw)
    }

    async fn tx_state(&self, hash: TxHash) -> Result<TxState> {
        let receipt = self.web3.eth().transaction_receipt(hash.0).await?;
        let state = match receipt {
            None => TxState::Pending,
            Some(receipt) if receipt.block_number.is_none() => TxState::Pending,
            Some(receipt) => match receipt.status {
                Some(status) if status.is_zero() => TxState::Failed,
                _ => TxState::Confirmed,
            },
        };
        Ok(state)
    }

    async fn logs(
        &self,
        factory: EthAddress,
        wallets: &[EthAddress],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ContractLog>> {
        let mut addresses = vec![factory.0];
        addresses.extend(wallets.iter().map(|w| w.0));
        let filter = FilterBuilder::default()
            .address(addresses)
            .from_block(BlockNumber::Number(from_block.into()))
            .to_block(BlockNumber::Number(to_block.into()))
            .build();
        let logs = self.web3.eth().logs(filter).await?;
        debug!(
            "Got {} logs in blocks {from_block}..={to_block}",
            logs.len()
        );
        let mut result = vec![];
        for log in logs {
            if let Some(decoded) = self.decode_log(factory, log)? {
                result.push(decoded);
            }
        }
        Ok(result)
    }

    async fn create_wallet(
        &self,
        from: EthAddress,
        factory: EthAddress,
        call: &CreateWallet,
    ) -> Result<TxHash> {
        let owners: Vec<Address> = call.owners.iter().map(|o| o.0).collect();
        let params = (owners, U256::from(call.quorum));
        self.send(
            &self.factory(factory),
            "createNewWallet",
            params,
            from,
            Options::default(),
        )
        .await
    }

    async fn deposit(&self, from: EthAddress, wallet: EthAddress, amount: Wei) -> Result<TxHash> {
        let options = Options::with(|opt| opt.value = Some(amount.0));
        self.send(&self.wallet(wallet), "deposit", (), from, options)
            .await
    }

    async fn create_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        call: &Withdraw,
    ) -> Result<TxHash> {
        self.send(
            &self.wallet(wallet),
            "createWithdrawTx",
            (call.to.0, call.amount.0),
            from,
            Options::default(),
        )
        .await
    }

    async fn approve_withdraw_tx(
        &self,
        from: EthAddress,
        wallet: EthAddress,
        id: u64,
    ) -> Result<TxHash> {
        self.send(
            &self.wallet(wallet),
            "approveWithdrawTx",
            (U256::from(id),),
            from,
            Options::default(),
        )
        .await
    }
}
