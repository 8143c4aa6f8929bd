use log::*;
use multisig_api::error::ErrorMessage;
use multisig_api::ethereum::*;
use multisig_api::events::*;
use multisig_api::requests::*;
use multisig_api::wallet::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwesting server error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("JSON encoding/decoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{}", .0.message)]
    Api(ErrorMessage),
    #[error("Server responded with {0}: {1}")]
    Status(u16, String),
}

/// Alias for a `Result` with the error type `self::Error`.
pub type Result<T> = std::result::Result<T, Error>;

pub struct MultisigClient {
    pub client: reqwest::Client,
    pub server: String,
}

impl MultisigClient {
    pub fn new(url: &str) -> Self {
        MultisigClient {
            client: reqwest::Client::new(),
            server: url.trim_end_matches('/').to_owned(),
        }
    }

    async fn execute<T: DeserializeOwned>(&self, path: &str, request: reqwest::Request) -> Result<T> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Response {path}: {}", body);
        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorMessage>(&body) {
                Ok(message) => Error::Api(message),
                Err(_) => Error::Status(status.as_u16(), body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let endpoint = format!("{}{}", self.server, path);
        let request = self.client.get(endpoint).build()?;
        self.execute(path, request).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let endpoint = format!("{}{}", self.server, path);
        let request = self.client.post(endpoint).build()?;
        self.execute(path, request).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let endpoint = format!("{}{}", self.server, path);
        let request = self.client.post(endpoint).json(body).build()?;
        self.execute(path, request).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.get("/ping").await
    }

    pub async fn status(&self) -> Result<ConnectionStatus> {
        self.get("/status").await
    }

    pub async fn wallets(&self) -> Result<WalletList> {
        self.get("/wallets").await
    }

    /// Mounts the wallet view on the server, its events start producing
    /// notifications
    pub async fn display(&self, wallet: &EthAddress) -> Result<WalletStats> {
        self.post(&format!("/wallet/{wallet}/display")).await
    }

    pub async fn close(&self, wallet: &EthAddress) -> Result<()> {
        self.post(&format!("/wallet/{wallet}/close")).await
    }

    pub async fn stats(&self, wallet: &EthAddress) -> Result<WalletStats> {
        self.get(&format!("/wallet/{wallet}/stats")).await
    }

    pub async fn pending(&self, wallet: &EthAddress) -> Result<PendingWithdrawals> {
        self.get(&format!("/wallet/{wallet}/pending")).await
    }

    pub async fn create_wallet(&self, request: &CreateWalletRequest) -> Result<TxSubmitted> {
        self.post_json("/factory/wallets", request).await
    }

    pub async fn deposit(&self, wallet: &EthAddress, request: &DepositRequest) -> Result<TxSubmitted> {
        self.post_json(&format!("/wallet/{wallet}/deposit"), request)
            .await
    }

    pub async fn create_withdrawal(
        &self,
        wallet: &EthAddress,
        request: &WithdrawRequest,
    ) -> Result<TxSubmitted> {
        self.post_json(&format!("/wallet/{wallet}/withdrawals"), request)
            .await
    }

    pub async fn approve(&self, wallet: &EthAddress, request: &ApproveRequest) -> Result<TxSubmitted> {
        self.post_json(&format!("/wallet/{wallet}/approve"), request)
            .await
    }

    pub async fn tx_status(&self, hash: &TxHash) -> Result<TxStatus> {
        self.get(&format!("/tx/{hash}")).await
    }

    /// Long poll, returns at once if notifications are queued
    pub async fn notifications(&self) -> Result<Notifications> {
        self.post("/notifications").await
    }
}
