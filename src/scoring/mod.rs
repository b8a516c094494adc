// src/scoring/mod.rs
//
// A classifier is a declarative list of weighted signals plus a description
// template. Signals run concurrently, each yields a partial score in [0, 1]
// and optional extracted data; the classifier sums `weight * partial` and
// renders its description from the extracted data.
pub mod groups;
pub mod signals;
pub mod text;

mod minswap;
mod wallet;
mod wingriders;

use futures_util::future::{try_join_all, BoxFuture};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::Result;
use crate::ledger::Collaborators;
use crate::models::{Asset, PoolMetadata, SideData, Totals, Transaction};

pub type SignalFuture<'a> = BoxFuture<'a, Result<Evaluation>>;

/// One signal evaluator. Only collaborator outages may surface as `Err`.
pub type Evaluator = for<'a> fn(&'a ScoringContext<'a>) -> SignalFuture<'a>;

/// Renders `(type, description)` from the signals' findings; `None` when the
/// prerequisite data is missing.
pub type Describe = fn(&ScoringContext<'_>, &Findings) -> Option<Label>;

/// Immutable view every signal reads from.
pub struct ScoringContext<'a> {
    pub tx: &'a Transaction,
    pub side: &'a SideData,
    pub collaborators: Collaborators<'a>,
}

impl<'a> ScoringContext<'a> {
    pub fn new(tx: &'a Transaction, side: &'a SideData, collaborators: Collaborators<'a>) -> Self {
        Self {
            tx,
            side,
            collaborators,
        }
    }

    /// The incoming type when the normalizer already set one, else `default`.
    pub fn kind_or(&self, default: &str) -> String {
        self.tx.kind.clone().unwrap_or_else(|| default.to_string())
    }
}

/// Data a signal pulls out of the transaction for the description template.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Nothing,
    Amount(Decimal),
    Totals(Totals),
    Assets(Vec<Asset>),
    Text(String),
    Phrases(Vec<String>),
    Pool(PoolMetadata),
    /// An LP position released by the user together with what the user received.
    Position {
        currency: String,
        amount: Decimal,
        received: Totals,
    },
    /// LP names recovered from pool datums, keyed by the LP asset they describe.
    Labels(Vec<(Asset, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub data: Extracted,
}

impl Evaluation {
    pub fn zero() -> Self {
        Self::of(0.0)
    }

    pub fn of(score: f64) -> Self {
        Self {
            score,
            data: Extracted::Nothing,
        }
    }

    pub fn when(condition: bool) -> Self {
        Self::of(if condition { 1.0 } else { 0.0 })
    }

    /// `matching / total`, or 0 when there is nothing to count.
    pub fn fraction(matching: usize, total: usize) -> Self {
        if total == 0 {
            return Self::zero();
        }
        Self::of(matching as f64 / total as f64)
    }

    pub fn with(mut self, data: Extracted) -> Self {
        self.data = data;
        self
    }
}

pub struct Signal {
    pub name: &'static str,
    pub weight: f64,
    pub eval: Evaluator,
}

/// Evaluations keyed by signal name, in declaration order.
#[derive(Debug, Default)]
pub struct Findings {
    entries: Vec<(&'static str, Evaluation)>,
}

impl Findings {
    pub fn get(&self, signal: &str) -> Option<&Extracted> {
        self.entries
            .iter()
            .find(|(name, _)| *name == signal)
            .map(|(_, evaluation)| &evaluation.data)
    }

    pub fn amount(&self, signal: &str) -> Option<Decimal> {
        match self.get(signal)? {
            Extracted::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn totals(&self, signal: &str) -> Option<&Totals> {
        match self.get(signal)? {
            Extracted::Totals(totals) => Some(totals),
            _ => None,
        }
    }

    pub fn assets(&self, signal: &str) -> Option<&[Asset]> {
        match self.get(signal)? {
            Extracted::Assets(assets) => Some(assets),
            _ => None,
        }
    }

    pub fn text(&self, signal: &str) -> Option<&str> {
        match self.get(signal)? {
            Extracted::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn phrases(&self, signal: &str) -> Option<&[String]> {
        match self.get(signal)? {
            Extracted::Phrases(phrases) => Some(phrases),
            _ => None,
        }
    }

    pub fn pool(&self, signal: &str) -> Option<&PoolMetadata> {
        match self.get(signal)? {
            Extracted::Pool(pool) => Some(pool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub kind: Option<String>,
    pub description: String,
}

impl Label {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            description: description.into(),
        }
    }

    /// Keeps the incoming type, whatever it is.
    pub fn keeping(ctx: &ScoringContext<'_>, description: impl Into<String>) -> Self {
        Self {
            kind: ctx.tx.kind.clone(),
            description: description.into(),
        }
    }
}

/// Outcome of one classifier on one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub kind: Option<String>,
    pub description: Option<String>,
    pub score: f64,
}

impl Scored {
    /// Zero score, keeping whatever the transaction already carried.
    pub fn passthrough(tx: &Transaction) -> Self {
        Self {
            kind: tx.kind.clone(),
            description: tx.description.clone(),
            score: 0.0,
        }
    }
}

/// An activity template: weighted signals plus a description.
pub struct Classifier {
    pub name: &'static str,
    pub signals: &'static [Signal],
    pub describe: Describe,
}

impl Classifier {
    pub fn weight_total(&self) -> f64 {
        self.signals.iter().map(|s| s.weight).sum()
    }

    pub async fn score(&self, ctx: &ScoringContext<'_>) -> Result<Scored> {
        let evaluations = try_join_all(self.signals.iter().map(|signal| (signal.eval)(ctx))).await?;

        let score = self
            .signals
            .iter()
            .zip(&evaluations)
            .map(|(signal, evaluation)| signal.weight * evaluation.score.clamp(0.0, 1.0))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let findings = Findings {
            entries: self
                .signals
                .iter()
                .map(|signal| signal.name)
                .zip(evaluations)
                .collect(),
        };

        let scored = match (self.describe)(ctx, &findings) {
            Some(label) => Scored {
                kind: label.kind,
                description: Some(label.description),
                score,
            },
            None => Scored::passthrough(ctx.tx),
        };
        debug!("{} scored {:.4} on {}", self.name, scored.score, ctx.tx.transaction_id);
        Ok(scored)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builders shared by the classifier tests.
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::Value;

    use crate::ledger::{Collaborators, FixtureLedger};
    use crate::models::{
        Account, Accounts, Asset, MetadataEntry, SideData, Transaction, ADA, UNKNOWN_ADDRESS,
        UNKNOWN_SCRIPT, USER_ADDRESS,
    };

    use super::{ScoringContext, Scored};

    pub fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    pub fn assets(pairs: &[(&str, &str)]) -> Vec<Asset> {
        pairs.iter().map(|(c, a)| Asset::new(*c, dec(a))).collect()
    }

    pub fn account(address: &str, role: &str, pairs: &[(&str, &str)]) -> Account {
        Account {
            address: address.to_string(),
            role: role.to_string(),
            total: assets(pairs),
        }
    }

    pub fn user(address: &str, pairs: &[(&str, &str)]) -> Account {
        account(address, USER_ADDRESS, pairs)
    }

    pub fn wallet(address: &str, pairs: &[(&str, &str)]) -> Account {
        account(address, UNKNOWN_ADDRESS, pairs)
    }

    pub fn script(address: &str, pairs: &[(&str, &str)]) -> Account {
        account(address, UNKNOWN_SCRIPT, pairs)
    }

    pub fn message(label: &str, msg: &[&str]) -> MetadataEntry {
        MetadataEntry {
            label: label.to_string(),
            json_metadata: serde_json::json!({ "msg": msg }),
        }
    }

    pub fn entry(label: &str, json_metadata: Value) -> MetadataEntry {
        MetadataEntry {
            label: label.to_string(),
            json_metadata,
        }
    }

    pub fn tx(user: Vec<Account>, other: Vec<Account>, metadata: Vec<MetadataEntry>) -> Transaction {
        Transaction {
            transaction_id: "8f1c0ffee".to_string(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            kind: None,
            description: None,
            confidence: None,
            accounts: Accounts { user, other },
            withdrawal_amount: None,
            network_fee: Asset::new(ADA, dec("0.17")),
            metadata,
        }
    }

    pub async fn score_with(
        classifier: &super::Classifier,
        tx: &Transaction,
        side: &SideData,
        ledger: &FixtureLedger,
    ) -> Scored {
        let ctx = ScoringContext::new(tx, side, Collaborators::new(ledger, ledger));
        classifier.score(&ctx).await.unwrap()
    }

    pub async fn score(classifier: &super::Classifier, tx: &Transaction) -> Scored {
        score_with(classifier, tx, &SideData::default(), &FixtureLedger::default()).await
    }

    pub fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::signals::ready;
    use super::testing::*;
    use super::*;

    fn overshoot<'a>(_: &'a ScoringContext<'a>) -> SignalFuture<'a> {
        ready(Evaluation::of(1.5))
    }

    fn undershoot<'a>(_: &'a ScoringContext<'a>) -> SignalFuture<'a> {
        ready(Evaluation::of(-0.3))
    }

    static OUT_OF_RANGE: Classifier = Classifier {
        name: "out_of_range",
        signals: &[
            Signal { name: "overshoot", weight: 0.7, eval: overshoot },
            Signal { name: "undershoot", weight: 0.3, eval: undershoot },
        ],
        describe: |_, _| Some(Label::new("out_of_range", "Out of range")),
    };

    static OVERWEIGHT: Classifier = Classifier {
        name: "overweight",
        signals: &[
            Signal { name: "first", weight: 0.8, eval: overshoot },
            Signal { name: "second", weight: 0.8, eval: overshoot },
        ],
        describe: |_, _| None,
    };

    #[tokio::test]
    async fn partial_scores_are_clamped() {
        let scored = score(&OUT_OF_RANGE, &tx(vec![], vec![], vec![])).await;
        assert!(close(scored.score, 0.7));
        assert_eq!(scored.description.as_deref(), Some("Out of range"));
    }

    #[tokio::test]
    async fn total_never_exceeds_one() {
        let scored = score(&OVERWEIGHT, &tx(vec![], vec![], vec![])).await;
        assert_eq!(scored.score, 1.0);
    }

    #[tokio::test]
    async fn passthrough_keeps_the_incoming_label() {
        let mut incoming = tx(vec![], vec![], vec![]);
        incoming.kind = Some("nft_sale".to_string());
        incoming.description = Some("Sold an NFT".to_string());

        let scored = score(&OVERWEIGHT, &incoming).await;
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.kind.as_deref(), Some("nft_sale"));
        assert_eq!(scored.description.as_deref(), Some("Sold an NFT"));
    }
}
