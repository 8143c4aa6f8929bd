pub mod address;
pub mod amount;
pub mod txid;

pub use address::*;
pub use amount::*;
pub use txid::*;
