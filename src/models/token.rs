// Wire-level records for the backend's token listing.

use serde::{Deserialize, Serialize};

/// A single token entry as returned by the backend API.
///
/// Field names mirror the backend JSON exactly. Optional fields arrive as
/// `null` or are absent entirely; both decode to `None`. Missing string
/// fields decode to an empty string so partial backend payloads still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub address: String,
    pub address_hash: String,
    pub circulating_market_cap: Option<String>,
    pub decimals: String,
    pub exchange_rate: Option<String>,
    pub holders: String,
    pub holders_count: String,
    pub icon_url: Option<String>,
    pub name: String,
    pub symbol: String,
    pub total_supply: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub volume_24h: Option<String>,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            address: String::new(),
            address_hash: String::new(),
            circulating_market_cap: None,
            decimals: String::new(),
            exchange_rate: None,
            holders: String::new(),
            holders_count: String::new(),
            icon_url: None,
            name: String::new(),
            symbol: String::new(),
            total_supply: String::new(),
            token_type: String::new(),
            volume_24h: None,
        }
    }
}

/// The backend's token list envelope: `{"items": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub items: Vec<Token>,
}
