// src/scoring/wallet/staking.rs
use futures_util::FutureExt;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::{Totals, ADA};
use crate::scoring::signals::{self, ada_only, label_share, ready, soften, Flow};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

pub static CATALYST_REGISTRATION: Classifier = Classifier {
    name: "catalyst_registration",
    signals: &[Signal { name: "registration_labels", weight: 1.0, eval: registration_labels }],
    describe: |_, _| Some(Label::new("catalyst_registration", "Catalyst Registration")),
};

pub static CATALYST_DEREGISTRATION: Classifier = Classifier {
    name: "catalyst_deregistration",
    signals: &[Signal { name: "deregistration_labels", weight: 1.0, eval: deregistration_labels }],
    describe: |_, _| Some(Label::new("catalyst_deregistration", "Catalyst Deregistration")),
};

pub static STAKE_DELEGATION: Classifier = Classifier {
    name: "stake_delegation",
    signals: &[
        Signal { name: "delegation", weight: 0.50, eval: user_delegation },
        Signal { name: "ada_outflow", weight: 0.25, eval: ada_outflow },
        Signal { name: "no_other_accounts", weight: 0.15, eval: signals::without_other_accounts },
        Signal { name: "no_withdrawal", weight: 0.05, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.05, eval: signals::without_metadata },
    ],
    describe: describe_delegation,
};

pub static STAKE_REGISTRATION: Classifier = Classifier {
    name: "stake_registration",
    signals: &[
        Signal { name: "registration", weight: 0.25, eval: registration_only },
        Signal { name: "ada_outflow", weight: 0.20, eval: ada_outflow },
        Signal { name: "no_other_accounts", weight: 0.20, eval: signals::without_other_accounts },
        Signal { name: "no_withdrawal", weight: 0.25, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: |_, _| Some(Label::new("stake_registration", "Stake Registration")),
};

pub static MULTI_STAKE_DELEGATION: Classifier = Classifier {
    name: "multi_stake_delegation",
    signals: &[
        Signal { name: "delegations", weight: 0.50, eval: several_delegations },
        Signal { name: "ada_share", weight: 0.15, eval: ada_share },
        Signal { name: "no_other_accounts", weight: 0.10, eval: signals::without_other_accounts },
        Signal { name: "pool_list", weight: 0.25, eval: pool_list },
    ],
    describe: |_, _| {
        Some(Label::new(
            "multi_stake_delegation",
            "Delegated stake to multiple pools",
        ))
    },
};

/// Metadata label of a multi-pool delegation portfolio (CIP-17 style).
const POOL_LIST_LABEL: &str = "6862";

fn registration_labels<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(label_share(&ctx.tx.metadata, &["61284", "61285"]))
}

fn deregistration_labels<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(label_share(&ctx.tx.metadata, &["61286", "61285"]))
}

fn ada_outflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(ada_only(&ctx.tx.accounts.user, Flow::Outflow))
}

/// Full marks when one of the transaction's delegation certificates is for the
/// user's stake credential and its pool resolves; half when certificates exist
/// but none can be tied to a known pool.
fn user_delegation<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let Some(stake) = ctx.side.address_details.stake_hash() else {
            return Ok(Evaluation::zero());
        };
        let info = &ctx.side.tx_info;
        if info.delegation_count == 0 {
            return Ok(Evaluation::zero());
        }

        let delegations = soften(
            "delegations",
            ctx.collaborators.ledger.transaction_delegations(&info.hash).await,
        )?
        .unwrap_or_default();

        for delegation in &delegations {
            let delegator = ctx.credentials(&delegation.address).await?;
            if delegator.as_ref().and_then(|d| d.stake_hash()) != Some(stake) {
                continue;
            }
            let pool = ctx.collaborators.ledger.pool_metadata(&delegation.pool_id).await;
            if let Some(pool) = soften("pool metadata", pool)? {
                return Ok(Evaluation::of(1.0).with(Extracted::Pool(pool)));
            }
        }
        Ok(Evaluation::of(0.5))
    }
    .boxed()
}

fn registration_only<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let info = &ctx.side.tx_info;
    ready(Evaluation::when(info.stake_cert_count > 0 && info.delegation_count == 0))
}

fn several_delegations<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(Evaluation::when(
        ctx.side.address_details.stake_hash().is_some() && ctx.side.tx_info.delegation_count > 1,
    ))
}

/// ADA's share of the user currencies that actually moved.
fn ada_share<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    let ada = totals.get(ADA).unwrap_or(Decimal::ZERO);
    if totals.is_empty() || ada > Decimal::ZERO {
        return ready(Evaluation::zero());
    }
    let moving = totals.count(|_, amount| !amount.is_zero());
    ready(Evaluation::fraction(
        totals.count(|currency, amount| currency == ADA && !amount.is_zero()),
        moving,
    ))
}

/// Agreement between the portfolio listed in metadata and the delegation count.
fn pool_list<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let portfolios: Vec<_> = ctx
        .tx
        .metadata
        .iter()
        .filter(|e| e.label == POOL_LIST_LABEL)
        .collect();
    let pools = portfolios
        .iter()
        .filter_map(|e| e.json_metadata.get("pools").and_then(Value::as_array))
        .map(Vec::len)
        .find(|&count| count > 1)
        .unwrap_or(0);

    let delegations = ctx.side.tx_info.delegation_count as usize;
    let (low, high) = (pools.min(delegations), pools.max(delegations));
    if pools == 0 || high == 0 {
        return ready(Evaluation::zero());
    }
    ready(Evaluation::of(
        low as f64 / high as f64 / portfolios.len() as f64,
    ))
}

fn describe_delegation(_: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let pool = findings.pool("delegation").and_then(|pool| {
        let name = pool.name.as_deref()?;
        Some(match pool.ticker.as_deref() {
            Some(ticker) => format!("[{ticker}] {name}"),
            None => name.to_string(),
        })
    });
    let description = match pool {
        Some(pool) => format!("Delegated stake to pool: {pool}"),
        None => "Stake Delegation".to_string(),
    };
    Some(Label::new("stake_delegation", description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FixtureLedger;
    use crate::models::{AddressDetails, Credential, CredentialKind, Delegation, PoolMetadata, SideData, TxInfo};
    use crate::scoring::testing::*;
    use serde_json::json;

    fn staker(hash: &str) -> AddressDetails {
        AddressDetails {
            payment_credential: Some(Credential { kind: CredentialKind::Key, hash: "pay".to_string() }),
            stake_credential: Some(Credential { kind: CredentialKind::Key, hash: hash.to_string() }),
        }
    }

    fn side(delegations: u32, certs: u32) -> SideData {
        SideData {
            address_details: staker("stake_u"),
            tx_info: TxInfo {
                hash: "8f1c0ffee".to_string(),
                delegation_count: delegations,
                stake_cert_count: certs,
            },
            ..SideData::default()
        }
    }

    fn ledger() -> FixtureLedger {
        let mut ledger = FixtureLedger::default().with_credentials("stake_addr_u", staker("stake_u"));
        ledger.delegations.insert(
            "8f1c0ffee".to_string(),
            vec![Delegation { address: "stake_addr_u".to_string(), pool_id: "pool1".to_string() }],
        );
        ledger.pools.insert(
            "pool1".to_string(),
            PoolMetadata { ticker: Some("ADAPT".to_string()), name: Some("Adapt Pool".to_string()) },
        );
        ledger
    }

    #[tokio::test]
    async fn delegation_names_the_pool() {
        let tx = tx(vec![user("addr_u", &[("ADA", "-2.17")])], vec![], vec![]);
        let scored = score_with(&STAKE_DELEGATION, &tx, &side(1, 1), &ledger()).await;
        assert!(close(scored.score, 1.0));
        assert_eq!(
            scored.description.as_deref(),
            Some("Delegated stake to pool: [ADAPT] Adapt Pool")
        );
    }

    #[tokio::test]
    async fn unresolved_pool_still_counts_half() {
        let tx = tx(vec![user("addr_u", &[("ADA", "-2.17")])], vec![], vec![]);
        let scored = score_with(&STAKE_DELEGATION, &tx, &side(1, 1), &FixtureLedger::default()).await;
        assert!(close(scored.score, 0.75));
        assert_eq!(scored.description.as_deref(), Some("Stake Delegation"));
    }

    #[tokio::test]
    async fn no_certificate_earns_no_delegation_credit() {
        let tx = tx(vec![user("addr_u", &[("ADA", "-2.17")])], vec![], vec![]);
        let scored = score_with(&STAKE_DELEGATION, &tx, &side(0, 0), &ledger()).await;
        assert!(close(scored.score, 0.50));
        assert_eq!(scored.description.as_deref(), Some("Stake Delegation"));
    }

    #[tokio::test]
    async fn registration_without_delegation() {
        let tx = tx(vec![user("addr_u", &[("ADA", "-2.17")])], vec![], vec![]);
        let scored = score_with(&STAKE_REGISTRATION, &tx, &side(0, 1), &FixtureLedger::default()).await;
        assert!(close(scored.score, 1.0));

        let delegating = score_with(&STAKE_REGISTRATION, &tx, &side(1, 1), &FixtureLedger::default()).await;
        assert!(close(delegating.score, 0.75));
    }

    #[tokio::test]
    async fn portfolio_matching_the_delegations() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "-4.2")])],
            vec![],
            vec![entry("6862", json!({ "pools": [{ "id": "a" }, { "id": "b" }] }))],
        );
        let scored = score_with(&MULTI_STAKE_DELEGATION, &tx, &side(2, 2), &FixtureLedger::default()).await;
        assert!(close(scored.score, 1.0));
        assert_eq!(scored.description.as_deref(), Some("Delegated stake to multiple pools"));

        let partial = score_with(&MULTI_STAKE_DELEGATION, &tx, &side(4, 4), &FixtureLedger::default()).await;
        assert!(close(partial.score, 0.875));
    }

    #[tokio::test]
    async fn catalyst_labels() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "-0.2")])],
            vec![],
            vec![entry("61284", json!({})), entry("61285", json!({}))],
        );
        assert!(close(score(&CATALYST_REGISTRATION, &tx).await.score, 1.0));
        assert!(close(score(&CATALYST_DEREGISTRATION, &tx).await.score, 0.5));
    }
}
