pub mod error;
pub mod ethereum;
pub mod events;
pub mod requests;
pub mod wallet;
