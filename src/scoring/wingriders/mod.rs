// src/scoring/wingriders/mod.rs
//
// Wingriders AMM: farm harvests, LP withdrawals, and swap orders.
mod liquidity;

use futures_util::FutureExt;
use rust_decimal::Decimal;

use crate::models::Totals;
use crate::scoring::signals::{self, any_message_share, counterparty_presence, is_wingriders_lp, leading, ready, Match, MessagePattern, Rule, Term};
use crate::scoring::text::{join_words, pair_name, quantity};
use crate::scoring::{Classifier, Evaluation, Extracted, Label, ScoringContext, Signal, SignalFuture};

pub const PROJECT: &str = "Wingriders";

const LP_PREFIX: &str = "WR-LPT-";

/// `WR-LPT-MIN/ADA` → `MIN-ADA`.
fn lp_pair(currency: &str) -> String {
    pair_name(&currency.replacen(LP_PREFIX, "", 1))
}

fn is_farm(role: &str) -> bool {
    role.starts_with("Wingriders Farm")
}

pub static CLASSIFIERS: [&Classifier; 5] = [
    &HARVEST,
    &liquidity::WITHDRAW_LP,
    &liquidity::CREATE_LIQUIDITY_REMOVAL,
    &liquidity::LIQUIDITY_REMOVAL,
    &CREATE_SWAP,
];

pub static HARVEST: Classifier = Classifier {
    name: "wingriders_harvest",
    signals: &[
        Signal { name: "harvested", weight: 0.80, eval: harvested },
        Signal { name: "no_withdrawal", weight: 0.10, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: |_, findings| {
        let tokens = findings.phrases("harvested").filter(|t| !t.is_empty())?;
        Some(Label::new(
            "yield_farming",
            format!("Harvested {} from Wingriders", join_words(tokens)),
        ))
    },
};

pub static CREATE_SWAP: Classifier = Classifier {
    name: "wingriders_create_swap",
    signals: &[
        Signal { name: "order_funding", weight: 0.75, eval: order_funding },
        Signal { name: "message", weight: 0.25, eval: swap_message },
    ],
    describe: |ctx, _| Some(Label::new(ctx.kind_or("amm_dex"), "Created a swap transaction on Wingriders")),
};

pub static FALLBACK: Classifier = Classifier {
    name: "wingriders_default",
    signals: &[
        Signal { name: "wingriders_counterparty", weight: 0.65, eval: wingriders_counterparty },
        Signal { name: "wingriders_message", weight: 0.35, eval: wingriders_message },
    ],
    describe: |ctx, _| Some(Label::new(ctx.kind_or("amm_dex"), "Executed an order on Wingriders")),
};

const SWAP_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading("WingRiders"),
        Term {
            text: "Swap",
            rules: &[
                Rule::exact(Match::EndsWith, 10),
                Rule::loose(Match::EndsWith, 5),
                Rule::exact(Match::Contains, 2),
                Rule::loose(Match::Contains, 1),
            ],
        },
    ],
};

/// Non-LP tokens the farms pay out, as a share of every currency they move.
fn harvested<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let mut released = Totals::default();
    for account in ctx.tx.accounts.other.iter().filter(|a| is_farm(&a.role)) {
        for asset in &account.total {
            released.add(&asset.currency, -asset.amount);
        }
    }
    let tokens: Vec<String> = released
        .iter()
        .filter(|a| a.amount > Decimal::ZERO && !is_wingriders_lp(&a.currency))
        .map(|a| quantity(&a.currency, a.amount))
        .collect();
    ready(Evaluation::fraction(tokens.len(), released.len()).with(Extracted::Phrases(tokens)))
}

/// A user script address holds the order while a key address pays for it.
fn order_funding<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let (received, paid) = ctx.script_flows(|currency| !is_wingriders_lp(currency)).await?;
        Ok(Evaluation::when(!received.is_empty() && !paid.is_empty()))
    }
    .boxed()
}

fn swap_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(SWAP_MESSAGE.evaluate(&ctx.tx.metadata))
}

fn wingriders_counterparty<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(counterparty_presence(&ctx.tx.accounts.other, |role| {
        role.to_uppercase().contains("WINGRIDERS")
    }))
}

fn wingriders_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(any_message_share(&ctx.tx.metadata, |m| m.to_uppercase().contains("WINGRIDERS")))
}
