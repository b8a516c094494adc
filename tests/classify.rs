use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use tx_describer::aggregator::{confidence_of, PRIMARY_MAX_CONFIDENCE};
use tx_describer::ledger::{Collaborators, FixtureLedger};
use tx_describer::models::{Account, Accounts, Asset, MetadataEntry, SideData, Transaction, ADA};
use tx_describer::scoring::groups;
use tx_describer::scoring::ScoringContext;
use tx_describer::{classify, ClassifyError, CollaboratorError};

fn account(address: &str, role: &str, currencies: &[(&str, &str)]) -> Account {
    Account {
        address: address.to_string(),
        role: role.to_string(),
        total: currencies
            .iter()
            .map(|(currency, amount)| Asset::new(*currency, amount.parse::<Decimal>().unwrap()))
            .collect(),
    }
}

fn message(text: &str) -> MetadataEntry {
    MetadataEntry {
        label: "674".to_string(),
        json_metadata: json!({ "msg": [text] }),
    }
}

fn transaction(user: Vec<Account>, other: Vec<Account>, metadata: Vec<MetadataEntry>) -> Transaction {
    Transaction {
        transaction_id: "3a7d1e".to_string(),
        timestamp: Utc.timestamp_millis_opt(1_690_000_000_000).unwrap(),
        kind: None,
        description: None,
        confidence: None,
        accounts: Accounts { user, other },
        withdrawal_amount: None,
        network_fee: Asset::new(ADA, "0.17".parse().unwrap()),
        metadata,
    }
}

/// The user sends 5 ADA and nothing else is known.
fn lone_send() -> Transaction {
    transaction(vec![account("addr_u", "User Address", &[("ADA", "-5")])], vec![], vec![])
}

/// A market order placed through the Minswap batch-order script.
fn minswap_order() -> Transaction {
    transaction(
        vec![account("addr_u", "User Address", &[("ADA", "-50.17")])],
        vec![account("addr_o", "Minswap Batch Order", &[("ADA", "50")])],
        vec![message("Minswap: Market Order")],
    )
}

async fn run(tx: &Transaction, candidates: &[&str], ledger: &FixtureLedger) -> Result<Transaction, ClassifyError> {
    let candidates: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
    classify(tx, &candidates, &SideData::default(), Collaborators::new(ledger, ledger)).await
}

#[tokio::test]
async fn default_group_reads_a_lone_ada_outflow_as_a_send() {
    let tx = lone_send();
    let side = SideData::default();
    let ledger = FixtureLedger::default();
    let ctx = ScoringContext::new(&tx, &side, Collaborators::new(&ledger, &ledger));

    let verdict = confidence_of(groups::default_group().classifiers, PRIMARY_MAX_CONFIDENCE, &ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verdict.kind.as_deref(), Some("send_ada"));
    assert_eq!(verdict.description.as_deref(), Some("Sent 4.83 ADA"));
    assert!(verdict.confidence > 0);
}

#[tokio::test]
async fn weak_default_answer_falls_back_to_unknown_activity() {
    let described = run(&lone_send(), &[], &FixtureLedger::default()).await.unwrap();
    assert_eq!(described.kind.as_deref(), Some("unknown_activity"));
    assert_eq!(described.description.as_deref(), Some("Unknown Activity"));
    assert_eq!(described.confidence, Some(0));
    assert_eq!(described.accounts, lone_send().accounts);
}

#[tokio::test]
async fn project_group_outscores_the_generic_fallback() {
    let tx = minswap_order();
    let ledger = FixtureLedger::default();

    let minswap = run(&tx, &["Minswap"], &ledger).await.unwrap();
    assert_eq!(minswap.kind.as_deref(), Some("amm_dex"));
    assert_eq!(minswap.description.as_deref(), Some("Created a swap transaction on Minswap"));
    assert_eq!(minswap.confidence, Some(99));

    let generic = run(&tx, &[], &ledger).await.unwrap();
    assert_eq!(generic.kind.as_deref(), Some("unknown_activity"));
    assert!(minswap.confidence > generic.confidence);
}

#[tokio::test]
async fn unregistered_projects_are_skipped() {
    let tx = minswap_order();
    let ledger = FixtureLedger::default();

    let both = run(&tx, &["SundaeSwap", "minswap"], &ledger).await.unwrap();
    assert_eq!(both.description.as_deref(), Some("Created a swap transaction on Minswap"));

    let none = run(&tx, &["SundaeSwap"], &ledger).await.unwrap();
    assert_eq!(none.confidence, None);
    assert_eq!(none.kind, None);
    assert_eq!(none.description, None);
}

#[tokio::test]
async fn weak_project_answer_uses_the_project_fallback() {
    let tx = transaction(
        vec![],
        vec![account("addr_o", "Minswap Batch Order", &[("ADA", "-4")])],
        vec![message("Minswap: Cancel Order")],
    );
    let described = run(&tx, &["Minswap"], &FixtureLedger::default()).await.unwrap();
    assert_eq!(described.kind.as_deref(), Some("amm_dex"));
    assert_eq!(described.description.as_deref(), Some("Executed an order on Minswap"));
    assert_eq!(described.confidence, Some(50));
}

#[tokio::test]
async fn unreachable_ledger_fails_the_classification() {
    let tx = transaction(
        vec![account("addr_u", "User Address", &[("ADA", "-5.17")])],
        vec![account("addr_w", "Unknown Address", &[("ADA", "5")])],
        vec![],
    );
    let offline = FixtureLedger {
        offline: true,
        ..FixtureLedger::default()
    };
    let err = run(&tx, &[], &offline).await.unwrap_err();
    assert!(matches!(
        err,
        ClassifyError::Collaborator(CollaboratorError::Unavailable(_))
    ));
}

#[tokio::test]
async fn classification_is_deterministic() {
    let ledger = FixtureLedger::default();
    for (tx, candidates) in [(minswap_order(), vec!["Minswap"]), (lone_send(), vec![])] {
        let first = run(&tx, &candidates, &ledger).await.unwrap();
        let second = run(&tx, &candidates, &ledger).await.unwrap();
        assert_eq!(first, second);
    }
}
