// src/scoring/signals.rs
//
// Building blocks shared by the classifier library: account netting, role
// checks, metadata message matching, and checked access into datums.
use futures_util::future::{self, FutureExt};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::ledger::{decode_bytes_to_text, LedgerResult};
use crate::models::{Account, AddressDetails, MetadataEntry, Totals, Utxo, ADA, UNKNOWN_ADDRESS, UNKNOWN_SCRIPT};

use super::{Evaluation, Extracted, ScoringContext, SignalFuture};

/// Metadata label carrying free-text transaction messages (CIP-20).
pub const MESSAGE_LABEL: &str = "674";

/// Wraps a synchronous evaluation for the signal table.
pub fn ready<'a>(evaluation: Evaluation) -> SignalFuture<'a> {
    future::ready(Ok(evaluation)).boxed()
}

/// Maps a collaborator answer to `None` when it is a signal-level fault.
pub fn soften<T>(what: &str, result: LedgerResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            debug!("{} degraded to no signal: {}", what, e);
            Ok(None)
        }
    }
}

// ---------- currencies ----------

/// Minswap LP receipts: `... LP` names or bare 44-character asset fingerprints.
pub fn is_minswap_lp(currency: &str) -> bool {
    currency.ends_with(" LP") || is_fingerprint(currency)
}

pub fn is_fingerprint(currency: &str) -> bool {
    currency.starts_with("asset") && currency.len() == 44
}

pub fn is_wingriders_lp(currency: &str) -> bool {
    currency.contains("-LPT-")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Inflow,
    Outflow,
}

/// The accounts net to ADA alone, moving in `flow`; extracts the absolute ADA amount.
pub fn ada_only(accounts: &[Account], flow: Flow) -> Evaluation {
    let totals = Totals::of(accounts);
    let ada = totals.get(ADA).unwrap_or(Decimal::ZERO);
    let wrong_way = match flow {
        Flow::Outflow => ada > Decimal::ZERO,
        Flow::Inflow => ada < Decimal::ZERO,
    };
    if totals.is_empty() || wrong_way {
        return Evaluation::zero();
    }
    Evaluation::fraction(totals.count(|currency, _| currency == ADA), totals.len())
        .with(Extracted::Amount(ada.abs()))
}

// ---------- roles and accounts ----------

pub fn no_accounts(accounts: &[Account]) -> Evaluation {
    Evaluation::when(accounts.is_empty())
}

/// Share of accounts that are plain key addresses with no known role.
pub fn unknown_address_share(other: &[Account]) -> Evaluation {
    Evaluation::fraction(
        other.iter().filter(|a| a.role == UNKNOWN_ADDRESS).count(),
        other.len(),
    )
}

/// 1 when some role satisfies `known`, ½ when there is at least an unknown script.
pub fn counterparty_presence(other: &[Account], known: impl Fn(&str) -> bool) -> Evaluation {
    if other.iter().any(|a| known(&a.role)) {
        Evaluation::of(1.0)
    } else if other.iter().any(|a| a.role == UNKNOWN_SCRIPT) {
        Evaluation::of(0.5)
    } else {
        Evaluation::zero()
    }
}

pub fn no_withdrawal(ctx: &ScoringContext<'_>) -> Evaluation {
    Evaluation::when(ctx.tx.withdrawal_amount.is_none())
}

pub fn without_withdrawal<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(no_withdrawal(ctx))
}

pub fn without_metadata<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(no_metadata(&ctx.tx.metadata))
}

pub fn without_other_accounts<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(no_accounts(&ctx.tx.accounts.other))
}

// ---------- metadata ----------

pub fn no_metadata(metadata: &[MetadataEntry]) -> Evaluation {
    Evaluation::when(metadata.is_empty())
}

/// Text messages of a metadata entry; `msg` may be a list or a single string.
pub fn messages(entry: &MetadataEntry) -> Vec<&str> {
    match entry.json_metadata.get("msg") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(text)) => vec![text.as_str()],
        _ => Vec::new(),
    }
}

/// Share of metadata entries that are messages whose first line satisfies `accept`.
pub fn first_message_share(metadata: &[MetadataEntry], accept: impl Fn(&str) -> bool) -> Evaluation {
    let matching = metadata
        .iter()
        .filter(|entry| entry.label == MESSAGE_LABEL)
        .filter(|entry| messages(entry).first().map(|m| accept(m)).unwrap_or(false))
        .count();
    Evaluation::fraction(matching, metadata.len())
}

/// Share of metadata entries that are messages with any line satisfying `accept`.
pub fn any_message_share(metadata: &[MetadataEntry], accept: impl Fn(&str) -> bool) -> Evaluation {
    let matching = metadata
        .iter()
        .filter(|entry| entry.label == MESSAGE_LABEL)
        .filter(|entry| messages(entry).into_iter().any(|m| accept(m)))
        .count();
    Evaluation::fraction(matching, metadata.len())
}

/// Label share of entries whose label is one of `labels`.
pub fn label_share(metadata: &[MetadataEntry], labels: &[&str]) -> Evaluation {
    Evaluation::fraction(
        metadata.iter().filter(|e| labels.contains(&e.label.as_str())).count(),
        metadata.len(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub how: Match,
    pub ignore_case: bool,
    pub points: u32,
}

impl Rule {
    pub const fn exact(how: Match, points: u32) -> Self {
        Self { how, ignore_case: false, points }
    }

    pub const fn loose(how: Match, points: u32) -> Self {
        Self { how, ignore_case: true, points }
    }

    fn matches(&self, message: &str, text: &str) -> bool {
        let (message, text) = if self.ignore_case {
            (message.to_lowercase(), text.to_lowercase())
        } else {
            (message.to_string(), text.to_string())
        };
        match self.how {
            Match::StartsWith => message.starts_with(&text),
            Match::EndsWith => message.ends_with(&text),
            Match::Contains => message.contains(&text),
        }
    }
}

/// A word to look for; the first matching rule awards its points.
#[derive(Debug, Clone, Copy)]
pub struct Term {
    pub text: &'static str,
    pub rules: &'static [Rule],
}

const LEADING: &[Rule] = &[
    Rule::exact(Match::StartsWith, 10),
    Rule::loose(Match::StartsWith, 5),
    Rule::exact(Match::Contains, 2),
    Rule::loose(Match::Contains, 1),
];

/// The usual gradient for a project name at the head of a message.
pub const fn leading(text: &'static str) -> Term {
    Term { text, rules: LEADING }
}

/// Graduated scoring of label-674 messages against a fixed set of terms.
///
/// Within one entry the first message that earns any points is the one that
/// counts. The sum is normalized by the best attainable total and capped at 1.
#[derive(Debug, Clone, Copy)]
pub struct MessagePattern {
    pub terms: &'static [Term],
}

impl MessagePattern {
    pub fn max_points(&self) -> u32 {
        self.terms
            .iter()
            .map(|t| t.rules.iter().map(|r| r.points).max().unwrap_or(0))
            .sum()
    }

    pub fn points(&self, message: &str) -> u32 {
        self.terms
            .iter()
            .map(|term| {
                term.rules
                    .iter()
                    .find(|rule| rule.matches(message, term.text))
                    .map(|rule| rule.points)
                    .unwrap_or(0)
            })
            .sum()
    }

    pub fn evaluate(&self, metadata: &[MetadataEntry]) -> Evaluation {
        let max = self.max_points();
        if metadata.is_empty() || max == 0 {
            return Evaluation::zero();
        }

        let mut score = 0;
        for entry in metadata.iter().filter(|e| e.label == MESSAGE_LABEL) {
            for message in messages(entry) {
                score += self.points(message);
                if score > 0 {
                    break;
                }
            }
        }
        Evaluation::of((score as f64 / max as f64).min(1.0))
    }
}

// ---------- datums ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Field(usize),
    List(usize),
}

/// Walks a decoded constructor datum (`{"fields": [...]}` / `{"list": [...]}`).
pub fn datum_at<'v>(datum: &'v Value, path: &[Step]) -> Option<&'v Value> {
    path.iter().try_fold(datum, |node, step| match step {
        Step::Field(i) => node.get("fields")?.get(*i),
        Step::List(i) => node.get("list")?.get(*i),
    })
}

pub fn datum_int(datum: &Value, path: &[Step]) -> Option<Decimal> {
    let int = datum_at(datum, path)?.get("int")?;
    match int {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn datum_bytes<'v>(datum: &'v Value, path: &[Step]) -> Option<&'v str> {
    datum_at(datum, path)?.get("bytes")?.as_str()
}

/// Text stored as a byte string at `path`, when present and valid UTF-8.
pub fn datum_text(datum: &Value, path: &[Step]) -> Option<String> {
    let bytes = datum_bytes(datum, path)?;
    decode_bytes_to_text(bytes)
        .map_err(|e| debug!("datum text unreadable: {}", e))
        .ok()
        .filter(|text| !text.is_empty())
}

impl<'a> ScoringContext<'a> {
    /// Datum attached to `utxo`; `None` when absent or not retrievable.
    pub async fn datum_of(&self, utxo: &Utxo) -> Result<Option<Value>> {
        let Some(hash) = utxo.data_hash.as_deref() else {
            return Ok(None);
        };
        soften("datum", self.collaborators.ledger.datum(hash).await)
    }

    /// Datum of the first transaction input spent from `address`.
    pub async fn input_datum(&self, address: &str) -> Result<Option<Value>> {
        match self.side.tx_utxos.inputs.iter().find(|u| u.address == address) {
            Some(utxo) => self.datum_of(utxo).await,
            None => Ok(None),
        }
    }

    /// Datum of the first transaction output paid to `address`.
    pub async fn output_datum(&self, address: &str) -> Result<Option<Value>> {
        match self.side.tx_utxos.outputs.iter().find(|u| u.address == address) {
            Some(utxo) => self.datum_of(utxo).await,
            None => Ok(None),
        }
    }

    /// Credentials of `address`; decoding failures read as "unknown".
    pub async fn credentials(&self, address: &str) -> Result<Option<AddressDetails>> {
        soften("credentials", self.collaborators.addresses.credentials(address).await)
    }

    /// Splits accounts into (script-controlled, key-controlled).
    ///
    /// Accounts whose address cannot be decoded are left out of both.
    pub async fn split_by_credential<'t>(
        &self,
        accounts: &'t [Account],
    ) -> Result<(Vec<&'t Account>, Vec<&'t Account>)> {
        let mut scripts = Vec::new();
        let mut keys = Vec::new();
        for account in accounts {
            match self.credentials(&account.address).await? {
                Some(details) if details.is_script() => scripts.push(account),
                Some(_) => keys.push(account),
                None => continue,
            }
        }
        Ok((scripts, keys))
    }

    /// What the user's script addresses receive and key addresses pay,
    /// restricted to currencies accepted by `keep`.
    pub async fn script_flows(&self, keep: fn(&str) -> bool) -> Result<(Totals, Totals)> {
        let (scripts, keys) = self.split_by_credential(&self.tx.accounts.user).await?;
        let mut received = Totals::default();
        for asset in scripts.iter().flat_map(|a| &a.total) {
            if keep(&asset.currency) && asset.amount >= Decimal::ZERO {
                received.add(&asset.currency, asset.amount);
            }
        }
        let mut paid = Totals::default();
        for asset in keys.iter().flat_map(|a| &a.total) {
            if keep(&asset.currency) && asset.amount <= Decimal::ZERO {
                paid.add(&asset.currency, asset.amount);
            }
        }
        Ok((received, paid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::testing::*;
    use serde_json::json;

    const STAKE_MIN: MessagePattern = MessagePattern {
        terms: &[
            leading("Minswap"),
            Term {
                text: "Stake",
                rules: &[Rule::exact(Match::Contains, 2), Rule::loose(Match::Contains, 1)],
            },
        ],
    };

    #[test]
    fn message_points_follow_the_gradient() {
        assert_eq!(STAKE_MIN.max_points(), 12);
        assert_eq!(STAKE_MIN.points("Minswap: Stake MIN"), 12);
        assert_eq!(STAKE_MIN.points("minswap: stake"), 6);
        assert_eq!(STAKE_MIN.points("via Minswap"), 2);
        assert_eq!(STAKE_MIN.points("via MINSWAP"), 1);
        assert_eq!(STAKE_MIN.points("hello"), 0);
    }

    #[test]
    fn message_pattern_is_normalized_and_capped() {
        let one = vec![message("674", &["Minswap: Stake MIN"])];
        assert!(close(STAKE_MIN.evaluate(&one).score, 1.0));

        let twice = vec![message("674", &["Minswap: Stake"]), message("674", &["Minswap: Stake"])];
        assert!(close(STAKE_MIN.evaluate(&twice).score, 1.0));

        let other_label = vec![message("721", &["Minswap: Stake MIN"])];
        assert_eq!(STAKE_MIN.evaluate(&other_label).score, 0.0);
        assert_eq!(STAKE_MIN.evaluate(&[]).score, 0.0);
    }

    #[test]
    fn first_message_share_ignores_later_lines() {
        let metadata = vec![
            message("674", &["Minswap: Market Order", "extra"]),
            message("674", &["other", "Minswap: Market Order"]),
        ];
        let share = first_message_share(&metadata, |m| m == "Minswap: Market Order");
        assert!(close(share.score, 0.5));
        let any = any_message_share(&metadata, |m| m == "Minswap: Market Order");
        assert!(close(any.score, 1.0));
    }

    #[test]
    fn single_string_messages_are_read() {
        let metadata = vec![entry("674", json!({ "msg": "WingRiders: Swap" })), entry("674", json!({ "other": 1 }))];
        assert_eq!(messages(&metadata[0]), vec!["WingRiders: Swap"]);
        assert!(messages(&metadata[1]).is_empty());
    }

    #[test]
    fn datum_paths_are_checked() {
        let datum = json!({
            "fields": [
                { "fields": [{ "bytes": "abcd" }] },
                { "list": [{ "fields": [{ "int": 42 }] }] }
            ]
        });
        assert_eq!(datum_bytes(&datum, &[Step::Field(0), Step::Field(0)]), Some("abcd"));
        assert_eq!(
            datum_int(&datum, &[Step::Field(1), Step::List(0), Step::Field(0)]),
            Some(Decimal::from(42))
        );
        assert_eq!(datum_int(&datum, &[Step::Field(6), Step::Field(1)]), None);
        assert_eq!(datum_bytes(&json!("not a datum"), &[Step::Field(0)]), None);
    }

    #[test]
    fn ada_only_respects_direction() {
        let sent = vec![user("u", &[("ADA", "-5")])];
        let out = ada_only(&sent, Flow::Outflow);
        assert!(close(out.score, 1.0));
        assert_eq!(out.data, Extracted::Amount(dec("5")));
        assert_eq!(ada_only(&sent, Flow::Inflow).score, 0.0);

        let mixed = vec![user("u", &[("ADA", "-5"), ("MIN", "-1")])];
        assert!(close(ada_only(&mixed, Flow::Outflow).score, 0.5));
        assert_eq!(ada_only(&[], Flow::Outflow).score, 0.0);
    }

    #[test]
    fn presence_prefers_known_roles() {
        let known = vec![script("s", &[]), account("m", "Minswap Batch Order", &[])];
        assert_eq!(counterparty_presence(&known, |r| r.contains("Minswap")).score, 1.0);
        let unknown = vec![script("s", &[])];
        assert_eq!(counterparty_presence(&unknown, |r| r.contains("Minswap")).score, 0.5);
        assert_eq!(counterparty_presence(&[], |r| r.contains("Minswap")).score, 0.0);
    }
}
