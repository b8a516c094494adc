// src/ledger.rs
//
// Boundary to the external collaborators: the remote ledger-query service and
// the bech32 address decoder. The engine only sees these traits.
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CollaboratorError;
use crate::models::{AddressDetails, AssetInfo, Delegation, PoolMetadata};

pub type LedgerResult<T> = std::result::Result<T, CollaboratorError>;

/// Read access to the ledger-query collaborator.
///
/// Retries, backoff and caching are the implementor's concern.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Decoded structured value of a datum, by datum hash.
    async fn datum(&self, datum_hash: &str) -> LedgerResult<Value>;

    async fn transaction_delegations(&self, tx_hash: &str) -> LedgerResult<Vec<Delegation>>;

    async fn pool_metadata(&self, pool_id: &str) -> LedgerResult<PoolMetadata>;

    /// Display metadata of a native asset unit (policy id + hex asset name).
    async fn asset_info(&self, unit: &str) -> LedgerResult<AssetInfo>;
}

#[async_trait]
pub trait AddressDecoder: Send + Sync {
    async fn credentials(&self, address: &str) -> LedgerResult<AddressDetails>;
}

/// The collaborator pair every classification runs against.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub ledger: &'a dyn LedgerQuery,
    pub addresses: &'a dyn AddressDecoder,
}

impl<'a> Collaborators<'a> {
    pub fn new(ledger: &'a dyn LedgerQuery, addresses: &'a dyn AddressDecoder) -> Self {
        Self { ledger, addresses }
    }
}

/// Decodes an on-chain hex byte string as UTF-8 text.
pub fn decode_bytes_to_text(hex_bytes: &str) -> LedgerResult<String> {
    let bytes = hex::decode(hex_bytes.trim_start_matches("0x"))
        .map_err(|e| CollaboratorError::Malformed(format!("byte string {hex_bytes}: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| CollaboratorError::Malformed(format!("byte string {hex_bytes}: {e}")))
}

pub fn encode_text_to_bytes(text: &str) -> String {
    hex::encode(text.as_bytes())
}

/// Ledger and address data captured ahead of time, served from memory.
///
/// Stands in for the remote collaborators in the CLI and in tests. Anything
/// missing answers `NotFound`; `offline` turns every call into `Unavailable`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureLedger {
    #[serde(default)]
    pub datums: HashMap<String, Value>,
    #[serde(default)]
    pub delegations: HashMap<String, Vec<Delegation>>,
    #[serde(default)]
    pub pools: HashMap<String, PoolMetadata>,
    #[serde(default)]
    pub assets: HashMap<String, AssetInfo>,
    #[serde(default)]
    pub credentials: HashMap<String, AddressDetails>,
    #[serde(default)]
    pub offline: bool,
}

impl FixtureLedger {
    fn lookup<T: Clone>(&self, map: &HashMap<String, T>, what: &str, key: &str) -> LedgerResult<T> {
        if self.offline {
            return Err(CollaboratorError::Unavailable(format!("{what} {key}")));
        }
        map.get(key)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("{what} {key}")))
    }

    pub fn with_datum(mut self, hash: &str, value: Value) -> Self {
        self.datums.insert(hash.to_string(), value);
        self
    }

    pub fn with_credentials(mut self, address: &str, details: AddressDetails) -> Self {
        self.credentials.insert(address.to_string(), details);
        self
    }
}

#[async_trait]
impl LedgerQuery for FixtureLedger {
    async fn datum(&self, datum_hash: &str) -> LedgerResult<Value> {
        self.lookup(&self.datums, "datum", datum_hash)
    }

    async fn transaction_delegations(&self, tx_hash: &str) -> LedgerResult<Vec<Delegation>> {
        self.lookup(&self.delegations, "delegations of", tx_hash)
    }

    async fn pool_metadata(&self, pool_id: &str) -> LedgerResult<PoolMetadata> {
        self.lookup(&self.pools, "pool", pool_id)
    }

    async fn asset_info(&self, unit: &str) -> LedgerResult<AssetInfo> {
        self.lookup(&self.assets, "asset", unit)
    }
}

#[async_trait]
impl AddressDecoder for FixtureLedger {
    async fn credentials(&self, address: &str) -> LedgerResult<AddressDetails> {
        self.lookup(&self.credentials, "address", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_strings_decode_to_text() {
        let encoded = encode_text_to_bytes("MIN-ADA");
        assert_eq!(encoded, "4d494e2d414441");
        assert_eq!(decode_bytes_to_text(&encoded).unwrap(), "MIN-ADA");
    }

    #[test]
    fn invalid_byte_strings_are_malformed() {
        assert!(matches!(decode_bytes_to_text("zz"), Err(CollaboratorError::Malformed(_))));
        assert!(matches!(decode_bytes_to_text("ff"), Err(CollaboratorError::Malformed(_))));
    }

    #[tokio::test]
    async fn fixture_answers_not_found_or_unavailable() {
        let ledger = FixtureLedger::default();
        assert!(matches!(ledger.datum("h").await, Err(CollaboratorError::NotFound(_))));

        let offline = FixtureLedger {
            offline: true,
            ..FixtureLedger::default()
        };
        let err = offline.credentials("addr1").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
