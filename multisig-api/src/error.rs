use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Body of every failed API response
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct ErrorMessage {
    pub message: String,
    /// Internal code of the error
    pub code: u16,
}
