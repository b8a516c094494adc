// src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Native currency symbol after normalization (lovelace are rendered as ADA).
pub const ADA: &str = "ADA";

pub const USER_ADDRESS: &str = "User Address";
pub const UNKNOWN_SCRIPT: &str = "Unknown Script";
pub const UNKNOWN_ADDRESS: &str = "Unknown Address";

/// A signed net movement of one currency (negative = outflow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub currency: String,
    pub amount: Decimal,
}

impl Asset {
    pub fn new(currency: impl Into<String>, amount: Decimal) -> Self {
        Self {
            currency: currency.into(),
            amount,
        }
    }
}

/// An address touched by the transaction with its per-currency net movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub role: String, // "User Address", a counterparty script name, "Unknown Script" or "Unknown Address"
    #[serde(default)]
    pub total: Vec<Asset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accounts {
    #[serde(default)]
    pub user: Vec<Account>,
    #[serde(default)]
    pub other: Vec<Account>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub label: String,
    #[serde(default)]
    pub json_metadata: Value,
}

/// Normalized, currency-netted view of a transaction.
///
/// Built once per request by the normalizer and read-only to the classifiers,
/// which only derive new `type`/`description`/`confidence` values from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<u32>,
    #[serde(default)]
    pub accounts: Accounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_amount: Option<Asset>, // present iff the user's stake address withdrew rewards
    pub network_fee: Asset, // fee paid, as a positive ADA amount
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>, // on-chain order
}

/// Net amount per currency, keeping the order in which currencies were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    entries: Vec<Asset>,
}

impl Totals {
    /// Nets every currency across `accounts`.
    pub fn of(accounts: &[Account]) -> Self {
        let mut totals = Self::default();
        for account in accounts {
            totals.extend(&account.total);
        }
        totals
    }

    pub fn extend(&mut self, assets: &[Asset]) {
        for asset in assets {
            self.add(&asset.currency, asset.amount);
        }
    }

    pub fn add(&mut self, currency: &str, amount: Decimal) {
        match self.entries.iter_mut().find(|a| a.currency == currency) {
            Some(entry) => entry.amount += amount,
            None => self.entries.push(Asset::new(currency, amount)),
        }
    }

    pub fn get(&self, currency: &str) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|a| a.currency == currency)
            .map(|a| a.amount)
    }

    pub fn remove(&mut self, currency: &str) -> Option<Decimal> {
        let index = self.entries.iter().position(|a| a.currency == currency)?;
        Some(self.entries.remove(index).amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of currencies whose net amount satisfies `predicate`.
    pub fn count(&self, predicate: impl Fn(&str, Decimal) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|a| predicate(&a.currency, a.amount))
            .count()
    }
}

// ---------- ledger side data ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub unit: String, // "lovelace" or policy id + asset name
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    #[serde(default)]
    pub amount: Vec<Quantity>,
    #[serde(default)]
    pub data_hash: Option<String>,
    #[serde(default)]
    pub collateral: bool,
    #[serde(default)]
    pub reference: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxUtxos {
    #[serde(default)]
    pub inputs: Vec<Utxo>,
    #[serde(default)]
    pub outputs: Vec<Utxo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxInfo {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub delegation_count: u32,
    #[serde(default)]
    pub stake_cert_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    Key,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    pub hash: String,
}

/// Payment and stake credentials decoded from an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    #[serde(default)]
    pub payment_credential: Option<Credential>,
    #[serde(default)]
    pub stake_credential: Option<Credential>,
}

impl AddressDetails {
    pub fn is_script(&self) -> bool {
        let script = |c: &Option<Credential>| {
            c.as_ref()
                .map(|c| c.kind == CredentialKind::Script)
                .unwrap_or(false)
        };
        script(&self.payment_credential) || script(&self.stake_credential)
    }

    pub fn payment_hash(&self) -> Option<&str> {
        self.payment_credential.as_ref().map(|c| c.hash.as_str())
    }

    pub fn stake_hash(&self) -> Option<&str> {
        self.stake_credential.as_ref().map(|c| c.hash.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub address: String, // stake address
    pub pool_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolMetadata {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Registry entry for a known counterparty contract address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRole {
    pub name: String,
    pub project_name: String,
    pub category: String,
    pub description: String,
    pub role: String,
}

/// Everything besides the transaction that classifiers may consult.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideData {
    /// Credentials of the querying user's address.
    #[serde(default)]
    pub address_details: AddressDetails,
    #[serde(default)]
    pub tx_info: TxInfo,
    #[serde(default)]
    pub tx_utxos: TxUtxos,
    /// Registry roles of counterparty addresses, keyed by address.
    #[serde(default)]
    pub counterparty: BTreeMap<String, AddressRole>,
}

impl SideData {
    /// Distinct counterparty projects touched by `tx`'s other accounts, in account order.
    pub fn candidate_projects(&self, tx: &Transaction) -> Vec<String> {
        let mut projects: Vec<String> = Vec::new();
        for account in &tx.accounts.other {
            if let Some(role) = self.counterparty.get(&account.address) {
                if !projects.contains(&role.project_name) {
                    projects.push(role.project_name.clone());
                }
            }
        }
        projects
    }
}
