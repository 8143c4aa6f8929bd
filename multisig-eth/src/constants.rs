use std::time::Duration;

// Pause after a failed node query before the next scan
pub const NODE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Link to a transaction page of the block explorer
pub fn explorer_tx_url(explorer: &str, hash: &multisig_api::ethereum::TxHash) -> String {
    format!("{}/tx/{}", explorer.trim_end_matches('/'), hash)
}
