use crate::node::NodeError;
use multisig_api::error::ErrorMessage;
use multisig_api::ethereum::{AddressError, EthAddress};
use multisig_api::requests::RequestError;
use rocket::http::Status;
use rocket::serde::json::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to query Ethereum node: {0}")]
    Node(#[from] NodeError),
    #[error("{0}")]
    Request(#[from] RequestError),
    #[error("Invalid wallet address: {0}")]
    Address(#[from] AddressError),
    #[error("Invalid transaction hash: {0}")]
    TxHash(String),
    #[error("Wallet {0} is not created by the factory")]
    UnknownWallet(EthAddress),
    #[error("Account {account} is not an owner of wallet {wallet}")]
    NotOwner {
        account: EthAddress,
        wallet: EthAddress,
    },
}

impl Error {
    pub fn code(&self) -> u16 {
        match self {
            Error::Node(_) => 0,
            Error::Request(_) => 1,
            Error::Address(_) => 2,
            Error::TxHash(_) => 3,
            Error::UnknownWallet(_) => 4,
            Error::NotOwner { .. } => 5,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Error::Node(_) => Status::InternalServerError,
            Error::Request(_) | Error::Address(_) | Error::TxHash(_) => Status::BadRequest,
            Error::UnknownWallet(_) => Status::NotFound,
            Error::NotOwner { .. } => Status::Forbidden,
        }
    }
}

pub type Result<T> = std::result::Result<Json<T>, (Status, Json<ErrorMessage>)>;

impl From<Error> for ErrorMessage {
    fn from(value: Error) -> Self {
        ErrorMessage {
            message: format!("{value}"),
            code: value.code(),
        }
    }
}

impl From<Error> for (Status, Json<ErrorMessage>) {
    fn from(value: Error) -> Self {
        (value.status(), Json(value.into()))
    }
}
