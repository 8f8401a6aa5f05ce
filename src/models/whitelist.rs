// Thread-safe token address whitelist, reloadable from a JSON file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("failed to read whitelist file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse whitelist file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid whitelist JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty address at index {0}")]
    EmptyAddress(usize),

    #[error("duplicate address found: {0}")]
    DuplicateAddress(String),

    #[error("address cannot be empty")]
    EmptyInput,

    #[error("address {0} already exists in whitelist")]
    AlreadyExists(String),
}

/// On-disk whitelist document.
///
/// Two shapes are accepted: the legacy `{"addresses": [...]}` list and the
/// extended `{"tokens": [{"address": ..., "icon_url": ...}]}` list with
/// per-token metadata. A non-empty `tokens` array takes precedence over
/// `addresses` when both are present. Neither key present means an empty
/// whitelist, which is not an error.
#[derive(Debug, Default, Deserialize)]
struct WhitelistFile {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    tokens: Vec<WhitelistedToken>,
}

#[derive(Debug, Deserialize)]
struct WhitelistedToken {
    address: String,
    #[serde(default)]
    #[allow(dead_code)]
    icon_url: Option<String>,
}

impl WhitelistFile {
    fn into_addresses(self) -> Vec<String> {
        if !self.tokens.is_empty() {
            self.tokens.into_iter().map(|t| t.address).collect()
        } else {
            self.addresses
        }
    }
}

/// In-memory set of whitelisted token addresses.
///
/// Reads take a shared lock, mutations an exclusive one. File loads parse
/// and extract addresses before the exclusive lock is taken; only the final
/// swap happens under it, so concurrent readers never observe a partial load.
/// Matching is byte-for-byte case-sensitive.
pub struct TokenWhitelist {
    addresses: RwLock<Vec<String>>,
}

impl TokenWhitelist {
    pub fn new() -> Self {
        Self {
            addresses: RwLock::new(Vec::new()),
        }
    }

    /// Parse whitelist JSON and replace the current contents wholesale.
    ///
    /// On parse failure the previous contents are left untouched.
    pub async fn load_from_json(&self, data: &[u8]) -> Result<(), WhitelistError> {
        debug!("Parsing whitelist JSON data ({} bytes)", data.len());

        // Parse outside the lock; only swap while holding it.
        let parsed: WhitelistFile = serde_json::from_slice(data)?;
        let addresses = parsed.into_addresses();

        debug!("Parsed whitelist with {} addresses", addresses.len());

        let mut guard = self.addresses.write().await;
        *guard = addresses;
        Ok(())
    }

    /// Load the whitelist from a JSON file.
    ///
    /// A missing file is not an error: the current contents are kept (usually
    /// empty at startup), which leaves the token endpoint unrestricted. Read
    /// or parse failures are reported and leave the previous contents intact.
    pub async fn load_from_path(&self, path: &str) -> Result<(), WhitelistError> {
        if !Path::new(path).exists() {
            warn!(
                "Whitelist file {} does not exist, continuing with current whitelist",
                path
            );
            return Ok(());
        }

        let data = std::fs::read(path).map_err(|source| WhitelistError::Read {
            path: path.to_string(),
            source,
        })?;

        self.load_from_json(&data).await.map_err(|err| match err {
            WhitelistError::Json(source) => WhitelistError::Parse {
                path: path.to_string(),
                source,
            },
            other => other,
        })?;

        self.validate().await?;

        info!(
            "Loaded whitelist from {} ({} addresses)",
            path,
            self.size().await
        );
        Ok(())
    }

    /// Case-sensitive membership test.
    pub async fn contains(&self, address: &str) -> bool {
        self.addresses.read().await.iter().any(|a| a == address)
    }

    pub async fn size(&self) -> usize {
        self.addresses.read().await.len()
    }

    /// Defensive copy of the current addresses, in insertion order.
    pub async fn snapshot(&self) -> Vec<String> {
        self.addresses.read().await.clone()
    }

    pub async fn add_address(&self, address: &str) -> Result<(), WhitelistError> {
        if address.is_empty() {
            return Err(WhitelistError::EmptyInput);
        }

        let mut guard = self.addresses.write().await;
        if guard.iter().any(|a| a == address) {
            return Err(WhitelistError::AlreadyExists(address.to_string()));
        }
        guard.push(address.to_string());
        Ok(())
    }

    /// Returns true if the address was present and removed.
    pub async fn remove_address(&self, address: &str) -> bool {
        let mut guard = self.addresses.write().await;
        if let Some(pos) = guard.iter().position(|a| a == address) {
            guard.remove(pos);
            true
        } else {
            false
        }
    }

    pub async fn clear(&self) {
        self.addresses.write().await.clear();
    }

    /// Explicit consistency check: no empty entries, no duplicates.
    ///
    /// Invoked after file loads, not by the mutating operations.
    pub async fn validate(&self) -> Result<(), WhitelistError> {
        let guard = self.addresses.read().await;
        let mut seen = HashSet::with_capacity(guard.len());
        for (index, address) in guard.iter().enumerate() {
            if address.is_empty() {
                return Err(WhitelistError::EmptyAddress(index));
            }
            if !seen.insert(address.as_str()) {
                return Err(WhitelistError::DuplicateAddress(address.clone()));
            }
        }
        Ok(())
    }
}

impl Default for TokenWhitelist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_load_addresses_round_trip() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["a", "b"]}"#)
            .await
            .unwrap();

        assert_eq!(whitelist.size().await, 2);
        assert!(whitelist.contains("a").await);
        assert!(whitelist.contains("b").await);
        assert!(!whitelist.contains("c").await);
        assert!(whitelist.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_matching_is_case_sensitive() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["0xabc"]}"#)
            .await
            .unwrap();

        assert!(whitelist.contains("0xabc").await);
        assert!(!whitelist.contains("0xABC").await);
    }

    #[tokio::test]
    async fn test_tokens_array_takes_precedence() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(
                br#"{
                    "addresses": ["legacy"],
                    "tokens": [
                        {"address": "a", "icon_url": "https://example.com/a.png"},
                        {"address": "b"}
                    ]
                }"#,
            )
            .await
            .unwrap();

        let snapshot = whitelist.snapshot().await;
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);
        assert!(!whitelist.contains("legacy").await);
    }

    #[tokio::test]
    async fn test_empty_tokens_array_falls_back_to_addresses() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["a"], "tokens": []}"#)
            .await
            .unwrap();

        assert_eq!(whitelist.snapshot().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_neither_key_present_means_empty() {
        let whitelist = TokenWhitelist::new();
        whitelist.load_from_json(br#"{"addresses": ["a"]}"#).await.unwrap();
        whitelist.load_from_json(b"{}").await.unwrap();
        assert_eq!(whitelist.size().await, 0);
    }

    #[tokio::test]
    async fn test_tokens_of_bare_strings_is_an_error() {
        let whitelist = TokenWhitelist::new();
        let result = whitelist
            .load_from_json(br#"{"tokens": ["addr1", "addr2"]}"#)
            .await;
        assert!(matches!(result, Err(WhitelistError::Json(_))));
        assert_eq!(whitelist.size().await, 0);
    }

    #[tokio::test]
    async fn test_validate_reports_duplicates() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["a", "a"]}"#)
            .await
            .unwrap();

        match whitelist.validate().await {
            Err(WhitelistError::DuplicateAddress(addr)) => assert_eq!(addr, "a"),
            other => panic!("expected duplicate address error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_validate_reports_empty_address() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["a", "", "b"]}"#)
            .await
            .unwrap();

        match whitelist.validate().await {
            Err(WhitelistError::EmptyAddress(index)) => assert_eq!(index, 1),
            other => panic!("expected empty address error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_load_from_path_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");

        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_path(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(whitelist.size().await, 0);
    }

    #[tokio::test]
    async fn test_load_from_path_malformed_json_keeps_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"{not valid json").unwrap();

        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["keep-me"]}"#)
            .await
            .unwrap();

        let result = whitelist.load_from_path(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(WhitelistError::Parse { .. })));
        assert!(whitelist.contains("keep-me").await);
    }

    #[tokio::test]
    async fn test_load_from_path_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist.json");
        std::fs::write(&path, br#"{"addresses": ["0x1", "0x2"]}"#).unwrap();

        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_path(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(whitelist.size().await, 2);
    }

    #[tokio::test]
    async fn test_add_address_rejects_empty_and_duplicates() {
        let whitelist = TokenWhitelist::new();

        assert!(matches!(
            whitelist.add_address("").await,
            Err(WhitelistError::EmptyInput)
        ));

        whitelist.add_address("x").await.unwrap();
        assert!(matches!(
            whitelist.add_address("x").await,
            Err(WhitelistError::AlreadyExists(_))
        ));
        assert_eq!(whitelist.size().await, 1);
    }

    #[tokio::test]
    async fn test_remove_address() {
        let whitelist = TokenWhitelist::new();
        whitelist.add_address("x").await.unwrap();

        assert!(whitelist.remove_address("x").await);
        assert!(!whitelist.remove_address("x").await);
        assert!(!whitelist.remove_address("never-there").await);
        assert_eq!(whitelist.size().await, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let whitelist = TokenWhitelist::new();
        whitelist
            .load_from_json(br#"{"addresses": ["a", "b"]}"#)
            .await
            .unwrap();
        whitelist.clear().await;
        assert_eq!(whitelist.size().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_defensive_copy() {
        let whitelist = TokenWhitelist::new();
        whitelist.add_address("a").await.unwrap();

        let mut snapshot = whitelist.snapshot().await;
        snapshot.push("injected".to_string());

        assert_eq!(whitelist.size().await, 1);
        assert!(!whitelist.contains("injected").await);
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_reloads() {
        let whitelist = Arc::new(TokenWhitelist::new());
        whitelist
            .load_from_json(br#"{"addresses": ["a", "b"]}"#)
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let wl = Arc::clone(&whitelist);
            tasks.push(tokio::spawn(async move {
                for _ in 0..100 {
                    // Every observed state is either the old or the new list,
                    // never a partial one.
                    let size = wl.size().await;
                    assert!(size == 2 || size == 3);
                    let _ = wl.contains("a").await;
                    let _ = wl.snapshot().await;
                }
            }));
        }
        for _ in 0..20 {
            whitelist
                .load_from_json(br#"{"addresses": ["a", "b", "c"]}"#)
                .await
                .unwrap();
            whitelist
                .load_from_json(br#"{"addresses": ["a", "b"]}"#)
                .await
                .unwrap();
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
