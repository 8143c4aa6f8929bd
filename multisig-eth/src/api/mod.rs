pub mod error;
pub mod public;
