// src/registry.rs
//
// Known counterparty contract addresses, loaded once from a directory of
// project descriptor files and only read afterwards.
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ClassifyError, Result};
use crate::models::{AddressRole, SideData, Transaction};

static REGISTRY: OnceCell<Registry> = OnceCell::new();

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDescriptor {
    project_name: String,
    category: String,
    #[serde(default)]
    sub_category: Option<String>,
    #[serde(default)]
    scripts: Vec<ScriptDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ScriptDescriptor {
    name: String,
    #[serde(default)]
    versions: Vec<ScriptVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptVersion {
    contract_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Names {
    pub names: Vec<String>,
    pub count: usize,
}

/// Aggregate view over the loaded registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub category: Names,
    pub merchant: Names,
}

#[derive(Debug, Default)]
pub struct Registry {
    roles: HashMap<String, AddressRole>,
    projects: BTreeSet<String>,
    categories: BTreeSet<String>,
}

impl Registry {
    /// Reads every descriptor file in `dir`. Any unreadable or malformed file fails the load.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Registry::default();

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let text = fs::read_to_string(&path)?;
            let descriptor: ProjectDescriptor = serde_json::from_str(&text).map_err(|e| {
                ClassifyError::Registry(format!("{}: {}", path.display(), e))
            })?;
            debug!("Registering {} from {}", descriptor.project_name, path.display());
            registry.register(descriptor);
        }

        info!(
            "Registry loaded: {} addresses, {} projects, {} categories",
            registry.roles.len(),
            registry.projects.len(),
            registry.categories.len()
        );
        Ok(registry)
    }

    fn register(&mut self, descriptor: ProjectDescriptor) {
        let category = match descriptor.sub_category.as_deref() {
            Some(sub) if !sub.is_empty() && sub != "-" => sub.to_lowercase(),
            _ => descriptor.category.to_lowercase(),
        };
        let project = descriptor.project_name;

        for script in descriptor.scripts {
            let role = if script.name.starts_with(&project) {
                script.name.clone()
            } else {
                format!("{} {}", project, script.name)
            };
            for version in script.versions {
                self.roles.insert(
                    version.contract_address,
                    AddressRole {
                        name: script.name.clone(),
                        project_name: project.clone(),
                        category: category.clone(),
                        description: format!("{} on {}", script.name, project),
                        role: role.clone(),
                    },
                );
            }
            self.projects.insert(project.clone());
            self.categories.insert(category.clone());
        }
    }

    pub fn role_of(&self, address: &str) -> Option<&AddressRole> {
        self.roles.get(address)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            category: Names {
                names: self.categories.iter().cloned().collect(),
                count: self.categories.len(),
            },
            merchant: Names {
                names: self.projects.iter().cloned().collect(),
                count: self.projects.len(),
            },
        }
    }

    /// Side data carrying the registry roles of every `other` account in `tx`.
    pub fn side_data_for(&self, tx: &Transaction, mut side: SideData) -> SideData {
        for account in &tx.accounts.other {
            if let Some(role) = self.role_of(&account.address) {
                side.counterparty.insert(account.address.clone(), role.clone());
            }
        }
        side
    }
}

/// Builds the process-wide registry. Only the first call loads anything.
pub fn init(dir: impl AsRef<Path>) -> Result<&'static Registry> {
    REGISTRY.get_or_try_init(|| Registry::load(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Accounts, Account, Asset, ADA, UNKNOWN_ADDRESS};
    use chrono::Utc;
    use rust_decimal::Decimal;

    const MINSWAP: &str = r#"{
        "projectName": "Minswap",
        "category": "DEX",
        "subCategory": "AMM DEX",
        "scripts": [
            { "name": "Minswap Batch Order", "versions": [{ "contractAddress": "addr_order_v1" }, { "contractAddress": "addr_order_v2" }] },
            { "name": "Liquidity Pool", "versions": [{ "contractAddress": "addr_pool" }] }
        ]
    }"#;

    const JPG: &str = r#"{
        "projectName": "jpg.store",
        "category": "Marketplace",
        "subCategory": "-",
        "scripts": [{ "name": "Ask", "versions": [{ "contractAddress": "addr_ask" }] }]
    }"#;

    fn write_registry() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("minswap.json"), MINSWAP).unwrap();
        fs::write(dir.path().join("jpg.json"), JPG).unwrap();
        dir
    }

    #[test]
    fn roles_prefix_the_project_name_once() {
        let dir = write_registry();
        let registry = Registry::load(dir.path()).unwrap();

        let order = registry.role_of("addr_order_v2").unwrap();
        assert_eq!(order.role, "Minswap Batch Order");
        assert_eq!(order.category, "amm dex");

        let pool = registry.role_of("addr_pool").unwrap();
        assert_eq!(pool.role, "Minswap Liquidity Pool");
        assert_eq!(pool.description, "Liquidity Pool on Minswap");

        let ask = registry.role_of("addr_ask").unwrap();
        assert_eq!(ask.category, "marketplace");
        assert!(registry.role_of("addr_unknown").is_none());
    }

    #[test]
    fn stats_are_sorted_and_distinct() {
        let dir = write_registry();
        let stats = Registry::load(dir.path()).unwrap().stats();

        assert_eq!(stats.category.names, vec!["amm dex", "marketplace"]);
        assert_eq!(stats.merchant.names, vec!["Minswap", "jpg.store"]);
        assert_eq!(stats.merchant.count, 2);
    }

    #[test]
    fn malformed_descriptor_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(matches!(Registry::load(dir.path()), Err(ClassifyError::Registry(_))));
    }

    #[test]
    fn side_data_collects_candidate_projects() {
        let dir = write_registry();
        let registry = Registry::load(dir.path()).unwrap();
        let other = |address: &str| Account {
            address: address.to_string(),
            role: UNKNOWN_ADDRESS.to_string(),
            total: vec![Asset::new(ADA, Decimal::ONE)],
        };
        let tx = Transaction {
            transaction_id: "tx".to_string(),
            timestamp: Utc::now(),
            kind: None,
            description: None,
            confidence: None,
            accounts: Accounts {
                user: vec![],
                other: vec![other("addr_pool"), other("addr_x"), other("addr_order_v1")],
            },
            withdrawal_amount: None,
            network_fee: Asset::new(ADA, Decimal::ZERO),
            metadata: vec![],
        };

        let side = registry.side_data_for(&tx, SideData::default());
        assert_eq!(side.counterparty.len(), 2);
        assert_eq!(side.candidate_projects(&tx), vec!["Minswap"]);
    }
}
