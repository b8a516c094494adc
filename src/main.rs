use std::{env, fs};

use eyre::{bail, WrapErr};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tx_describer::ledger::{Collaborators, FixtureLedger};
use tx_describer::models::{SideData, Transaction};
use tx_describer::{classify, config, registry};

const USAGE: &str = "usage: tx-describer stats | tx-describer classify <request.json>";

/// A transaction to classify together with everything the classifiers may ask
/// the ledger about it.
#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    transaction: Transaction,
    /// Derived from the registry when absent.
    #[serde(default)]
    candidate_projects: Option<Vec<String>>,
    #[serde(flatten)]
    side: SideData,
    #[serde(default)]
    ledger: FixtureLedger,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Loaded config: {:?}", cfg);

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["stats"] => {
            let registry = registry::init(&cfg.dapps_path)?;
            println!("{}", serde_json::to_string_pretty(&registry.stats())?);
        }
        ["classify", path] => {
            let text = fs::read_to_string(path).wrap_err_with(|| format!("reading request {path}"))?;
            let request: ClassifyRequest =
                serde_json::from_str(&text).wrap_err_with(|| format!("parsing request {path}"))?;

            let registry = registry::init(&cfg.dapps_path)?;
            let side = registry.side_data_for(&request.transaction, request.side);
            let candidates = request
                .candidate_projects
                .unwrap_or_else(|| side.candidate_projects(&request.transaction));
            info!(
                "Classifying {} against {:?}",
                request.transaction.transaction_id, candidates
            );

            let ledger = request.ledger;
            let described = classify(
                &request.transaction,
                &candidates,
                &side,
                Collaborators::new(&ledger, &ledger),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
