use serde::{Deserialize, Serialize};

/// Error envelope produced by this service.
///
/// Only emitted on the token-filter path; the generic proxy path relays
/// backend error bodies verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
