// src/scoring/minswap/farming.rs
//
// Yield farming and MIN staking on Minswap. These actions carry free-form
// messages, so the graduated message patterns do most of the work.
use futures_util::FutureExt;
use rust_decimal::Decimal;

use crate::models::{Account, Totals, ADA, UNKNOWN_SCRIPT};
use crate::scoring::signals::{datum_text, is_fingerprint, is_minswap_lp, leading, ready, Match, MessagePattern, Rule, Term};
use crate::scoring::text::{amount, join_words, quantity};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

use super::{is_yield_farm, FARM_TOKEN, PROJECT};

/// Display name of the MIN token after normalization.
const MIN: &str = "Minswap";

pub static CREATE_WITHDRAW_LIQUIDITY: Classifier = Classifier {
    name: "minswap_create_withdraw_liquidity",
    signals: &[
        Signal { name: "receipts", weight: 0.10, eval: lp_receipts },
        Signal { name: "farm", weight: 0.40, eval: farm_input },
        Signal { name: "message", weight: 0.50, eval: withdraw_liquidity_message },
    ],
    describe: describe_create_withdraw_liquidity,
};

pub static WITHDRAW_LIQUIDITY: Classifier = Classifier {
    name: "minswap_withdraw_liquidity",
    signals: &[
        Signal { name: "lp_tokens", weight: 0.10, eval: lp_tokens },
        Signal { name: "farm", weight: 0.40, eval: farm_release },
        Signal { name: "message", weight: 0.50, eval: withdraw_liquidity_message },
    ],
    describe: describe_withdraw_liquidity,
};

pub static STAKE_LIQUIDITY: Classifier = Classifier {
    name: "minswap_stake_liquidity",
    signals: &[
        Signal { name: "receipts_paid", weight: 0.40, eval: receipts_paid },
        Signal { name: "farm", weight: 0.50, eval: farm_output },
        Signal { name: "message", weight: 0.10, eval: stake_liquidity_message },
    ],
    describe: describe_stake_liquidity,
};

pub static STAKE_MIN: Classifier = Classifier {
    name: "minswap_stake_min",
    signals: &[
        Signal { name: "min_spent", weight: 0.40, eval: min_spent },
        Signal { name: "staking_receives", weight: 0.10, eval: staking_receives },
        Signal { name: "message", weight: 0.50, eval: stake_min_message },
    ],
    describe: |ctx, findings| {
        let staked = findings.amount("min_spent")?;
        Some(Label::new(
            ctx.kind_or("amm_dex"),
            format!("Staked {} MIN on Minswap", amount(staked)),
        ))
    },
};

pub static UNSTAKE_MIN: Classifier = Classifier {
    name: "minswap_unstake_min",
    signals: &[
        Signal { name: "min_received", weight: 0.40, eval: min_received },
        Signal { name: "staking_releases", weight: 0.10, eval: staking_releases },
        Signal { name: "message", weight: 0.50, eval: unstake_min_message },
    ],
    describe: |ctx, findings| {
        let unstaked = findings.amount("min_received")?;
        Some(Label::new(
            ctx.kind_or("amm_dex"),
            format!("Unstaked {} MIN from Minswap", amount(unstaked)),
        ))
    },
};

pub static RECEIVE_STAKING_REWARDS: Classifier = Classifier {
    name: "minswap_receive_staking_rewards",
    signals: &[
        Signal { name: "movement", weight: 0.10, eval: user_movement },
        Signal { name: "message", weight: 0.90, eval: rewards_message },
    ],
    describe: describe_rewards,
};

const CONTAINS: &[Rule] = &[Rule::exact(Match::Contains, 2), Rule::loose(Match::Contains, 1)];

const WITHDRAW_LIQUIDITY_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term {
            text: "Withdraw",
            rules: &[Rule::exact(Match::Contains, 10), Rule::loose(Match::Contains, 1)],
        },
        Term {
            text: "liquidity",
            rules: &[Rule::exact(Match::EndsWith, 10), Rule::exact(Match::Contains, 2)],
        },
    ],
};

const STAKE_LIQUIDITY_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term {
            text: "Stake liquidity",
            rules: &[
                Rule::exact(Match::EndsWith, 10),
                Rule::loose(Match::EndsWith, 5),
                Rule::exact(Match::Contains, 2),
                Rule::loose(Match::Contains, 1),
            ],
        },
    ],
};

const STAKE_MIN_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term { text: "Stake", rules: CONTAINS },
        Term { text: "MIN", rules: CONTAINS },
    ],
};

const UNSTAKE_MIN_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term { text: "Unstake", rules: CONTAINS },
        Term { text: "MIN", rules: CONTAINS },
    ],
};

const REWARDS_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term {
            text: "staking",
            rules: &[Rule::loose(Match::Contains, 5)],
        },
        Term {
            text: "rewards",
            rules: &[Rule::loose(Match::EndsWith, 5), Rule::loose(Match::Contains, 1)],
        },
    ],
};

fn withdraw_liquidity_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(WITHDRAW_LIQUIDITY_MESSAGE.evaluate(&ctx.tx.metadata))
}

fn stake_liquidity_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(STAKE_LIQUIDITY_MESSAGE.evaluate(&ctx.tx.metadata))
}

fn stake_min_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(STAKE_MIN_MESSAGE.evaluate(&ctx.tx.metadata))
}

fn unstake_min_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(UNSTAKE_MIN_MESSAGE.evaluate(&ctx.tx.metadata))
}

fn rewards_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(REWARDS_MESSAGE.evaluate(&ctx.tx.metadata))
}

// ---------- liquidity farms ----------

/// LP receipts coming back to the user.
fn received_receipts(ctx: &ScoringContext<'_>) -> Totals {
    let mut receipts = Totals::default();
    for asset in ctx.tx.accounts.user.iter().flat_map(|a| &a.total) {
        if is_minswap_lp(&asset.currency) && asset.amount > Decimal::ZERO {
            receipts.add(&asset.currency, asset.amount);
        }
    }
    receipts
}

fn releasing_farm<'c>(ctx: &'c ScoringContext<'_>) -> Option<&'c Account> {
    ctx.tx.accounts.other.iter().find(|account| {
        is_yield_farm(&account.role)
            && account
                .total
                .iter()
                .any(|a| is_minswap_lp(&a.currency) && a.amount < Decimal::ZERO)
    })
}

fn lp_receipts<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let total: Decimal = received_receipts(ctx).iter().map(|a| a.amount).sum();
    ready(Evaluation::when(!total.is_zero()).with(Extracted::Amount(total)))
}

fn lp_tokens<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let receipts = received_receipts(ctx);
    ready(Evaluation::when(!receipts.is_empty()).with(Extracted::Totals(receipts)))
}

/// The farm being withdrawn from, named by the datum it spends.
fn farm_input<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let Some(farm) = releasing_farm(ctx) else {
            return Ok(Evaluation::zero());
        };
        let name = ctx
            .input_datum(&farm.address)
            .await?
            .and_then(|datum| datum_text(&datum, &FARM_TOKEN));
        Ok(match name {
            Some(name) => Evaluation::of(1.0).with(Extracted::Text(name)),
            None => Evaluation::zero(),
        })
    }
    .boxed()
}

fn farm_release<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(match releasing_farm(ctx) {
        Some(farm) => Evaluation::of(1.0).with(Extracted::Text(farm.role.clone())),
        None => Evaluation::zero(),
    })
}

/// Share of the user's non-ADA currencies that are LP receipts being paid in.
fn receipts_paid<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let mut totals = Totals::of(&ctx.tx.accounts.user);
    totals.remove(ADA);
    let paid = totals.count(|currency, amount| is_fingerprint(currency) && amount < Decimal::ZERO);
    ready(Evaluation::fraction(paid, totals.len()))
}

/// The token being staked, named by the datum of the farm's new output.
fn farm_output<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        for farm in ctx.tx.accounts.other.iter().filter(|a| is_yield_farm(&a.role)) {
            let name = ctx
                .output_datum(&farm.address)
                .await?
                .and_then(|datum| datum_text(&datum, &FARM_TOKEN));
            if let Some(name) = name {
                return Ok(Evaluation::of(1.0).with(Extracted::Text(name)));
            }
        }
        Ok(Evaluation::zero())
    }
    .boxed()
}

fn describe_create_withdraw_liquidity(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let receipts = findings.amount("receipts").filter(|qty| !qty.is_zero());
    let farm = findings.text("farm");
    Some(match (receipts, farm) {
        (Some(qty), Some(farm)) => {
            let plural = if qty > Decimal::ONE { "s" } else { "" };
            Label::new(
                "yield_farming",
                format!(
                    "Created a withdraw {} LP Token{} from {} farm on Minswap",
                    amount(qty),
                    plural,
                    farm
                ),
            )
        }
        _ => Label::keeping(ctx, "Created a withdraw liquidity order on Minswap"),
    })
}

fn describe_withdraw_liquidity(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let tokens: Vec<String> = findings
        .totals("lp_tokens")
        .map(|t| t.iter().map(|a| quantity(&a.currency, a.amount)).collect())
        .unwrap_or_default();
    let withdrew = if tokens.is_empty() {
        "liquidity".to_string()
    } else {
        join_words(&tokens)
    };
    let description = format!("Withdrew {withdrew} from Minswap");
    Some(match findings.text("farm") {
        Some(_) => Label::new("yield_farming", description),
        None => Label::keeping(ctx, description),
    })
}

fn describe_stake_liquidity(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    Some(match findings.text("farm") {
        Some(token) => Label::new("yield_farming", format!("Staked {token} on Minswap")),
        None => Label::keeping(ctx, "Staked liquidity on Minswap"),
    })
}

// ---------- MIN staking ----------

fn min_movement(ctx: &ScoringContext<'_>) -> Decimal {
    Totals::of(&ctx.tx.accounts.user).get(MIN).unwrap_or(Decimal::ZERO)
}

fn min_spent<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let spent = -min_movement(ctx);
    ready(Evaluation::when(spent > Decimal::ZERO).with(Extracted::Amount(spent)))
}

fn min_received<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let received = min_movement(ctx);
    ready(Evaluation::when(received > Decimal::ZERO).with(Extracted::Amount(received)))
}

fn is_min_staking(role: &str) -> bool {
    role.to_uppercase().starts_with("MINSWAP MIN STAKING")
}

fn moves_min(ctx: &ScoringContext<'_>, role: fn(&str) -> bool, incoming: bool) -> Evaluation {
    Evaluation::when(ctx.tx.accounts.other.iter().any(|account| {
        role(&account.role)
            && account.total.iter().any(|a| {
                a.currency == MIN && if incoming { a.amount > Decimal::ZERO } else { a.amount < Decimal::ZERO }
            })
    }))
}

fn staking_receives<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(moves_min(ctx, |role| is_min_staking(role) || role == UNKNOWN_SCRIPT, true))
}

fn staking_releases<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(moves_min(ctx, is_min_staking, false))
}

// ---------- rewards ----------

fn user_movement<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    ready(Evaluation::when(!totals.is_empty()).with(Extracted::Totals(totals)))
}

fn describe_rewards(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let tokens: Vec<String> = findings
        .totals("movement")?
        .iter()
        .map(|a| quantity(&a.currency, a.amount))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!("Received {} as staking rewards from Minswap", join_words(&tokens)),
    ))
}
