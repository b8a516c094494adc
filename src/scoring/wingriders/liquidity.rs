// src/scoring/wingriders/liquidity.rs
use rust_decimal::Decimal;

use crate::models::{Account, Asset, Totals, ADA, UNKNOWN_ADDRESS};
use crate::scoring::signals::{self, first_message_share, is_wingriders_lp, ready};
use crate::scoring::text::{amount, join_words, quantity};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

use super::{lp_pair, LP_PREFIX};

const REQUEST: &str = "Wingriders Request";

pub static WITHDRAW_LP: Classifier = Classifier {
    name: "wingriders_withdraw_lp",
    signals: &[
        Signal { name: "lp_holders", weight: 0.80, eval: lp_holders },
        Signal { name: "no_withdrawal", weight: 0.10, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: |_, findings| {
        let lps = findings.phrases("lp_holders").filter(|p| !p.is_empty())?;
        Some(Label::new(
            "amm_dex",
            format!("Withdrew {} LP Tokens from Wingriders", join_words(lps)),
        ))
    },
};

pub static CREATE_LIQUIDITY_REMOVAL: Classifier = Classifier {
    name: "wingriders_create_liquidity_removal",
    signals: &[
        Signal { name: "pair_paid", weight: 0.40, eval: pair_paid },
        Signal { name: "request_deposit", weight: 0.50, eval: request_deposit },
        Signal { name: "message", weight: 0.10, eval: removal_message },
    ],
    describe: |ctx, findings| {
        let description = match findings.text("pair_paid") {
            Some(pair) => format!("Created a liquidity removal / {pair} withdraw order on Wingriders"),
            None => "Created a liquidity removal order on Wingriders".to_string(),
        };
        Some(Label::new(ctx.kind_or("amm_dex"), description))
    },
};

pub static LIQUIDITY_REMOVAL: Classifier = Classifier {
    name: "wingriders_liquidity_removal",
    signals: &[
        Signal { name: "received", weight: 0.10, eval: received },
        Signal { name: "request", weight: 0.80, eval: request_execution },
        Signal { name: "no_withdrawal", weight: 0.05, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.05, eval: signals::without_metadata },
    ],
    describe: describe_removal,
};

/// Counterparties give up LP tokens; the signal is the share of Wingriders
/// accounts holding any.
fn lp_holders<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let other = &ctx.tx.accounts.other;
    let mut released = Totals::default();
    for asset in other.iter().flat_map(|a| &a.total) {
        released.add(&asset.currency, -asset.amount);
    }
    let lps: Vec<String> = released
        .iter()
        .filter(|a| a.amount > Decimal::ZERO && a.currency.starts_with(LP_PREFIX))
        .map(|a| format!("{} {}", amount(a.amount), lp_pair(&a.currency)))
        .collect();
    let holders = other
        .iter()
        .filter(|a| a.role.starts_with(super::PROJECT) && holds_lp(a))
        .count();
    ready(Evaluation::fraction(holders, other.len()).with(Extracted::Phrases(lps)))
}

fn holds_lp(account: &Account) -> bool {
    account.total.iter().any(|a| is_wingriders_lp(&a.currency))
}

/// Share of user currencies that are ADA or LP tokens being paid; names the pair.
fn pair_paid<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    let paying = totals.count(|currency, net| {
        currency == ADA || (is_wingriders_lp(currency) && net < Decimal::ZERO)
    });
    let evaluation = Evaluation::fraction(paying, totals.len());
    let pair = totals
        .iter()
        .find(|a| a.currency.starts_with("WR-LPT") && a.amount < Decimal::ZERO)
        .map(|a| lp_pair(&a.currency));
    ready(match pair {
        Some(pair) => evaluation.with(Extracted::Text(pair)),
        None => evaluation,
    })
}

/// Wingriders accounts receiving exactly ADA and the LP token.
fn request_deposit<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let other = &ctx.tx.accounts.other;
    let deposits = other
        .iter()
        .filter(|account| {
            account.role.starts_with(super::PROJECT)
                && account.total.len() == 2
                && account.total.iter().all(|a| {
                    (a.currency.starts_with("WR-LPT") || a.currency == ADA) && a.amount > Decimal::ZERO
                })
        })
        .count();
    ready(Evaluation::fraction(deposits, other.len()))
}

fn removal_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| {
        m.to_uppercase().starts_with("WINGRIDERS") && m.to_lowercase().ends_with("liquidity")
    }))
}

fn received<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let positive = Totals::of(&ctx.tx.accounts.user).count(|_, net| net > Decimal::ZERO);
    ready(Evaluation::of(positive.min(2) as f64 / 2.0))
}

/// A request spends LP tokens that a pool script takes in, one point each
/// for the request, its LP token and the matching script.
fn request_execution<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let other = &ctx.tx.accounts.other;
    if other.is_empty() {
        return ready(Evaluation::zero());
    }
    let request = other.iter().find(|a| a.role == REQUEST);
    let lpt = request.and_then(|r| r.total.iter().find(|a| is_wingriders_lp(&a.currency)));
    let pool = lpt.and_then(|lpt| {
        other.iter().find(|account| {
            account.role != UNKNOWN_ADDRESS
                && account
                    .total
                    .iter()
                    .any(|a| a.currency == lpt.currency && -a.amount == lpt.amount)
        })
    });

    let points = [request.is_some(), lpt.is_some(), pool.is_some()]
        .iter()
        .filter(|hit| **hit)
        .count();
    let evaluation = Evaluation::fraction(points, 3);
    ready(match pool {
        Some(pool) => evaluation.with(Extracted::Assets(pool.total.clone())),
        None => evaluation,
    })
}

fn describe_removal(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let pool = findings.assets("request").filter(|p| !p.is_empty())?;
    let (lps, tokens): (Vec<&Asset>, Vec<&Asset>) = pool.iter().partition(|a| is_wingriders_lp(&a.currency));
    let tokens: Vec<String> = tokens.iter().map(|a| quantity(&a.currency, -a.amount)).collect();
    let pairs: Vec<String> = lps.iter().map(|a| lp_pair(&a.currency)).collect();
    let plural = if pairs.len() > 1 { "s" } else { "" };
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!(
            "Withdrew {} from {} LP{} on Wingriders",
            join_words(&tokens),
            join_words(&pairs),
            plural
        ),
    ))
}
