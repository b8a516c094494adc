// src/scoring/minswap/orders.rs
//
// Order lifecycle on the Minswap DEX: the user's order creation and the
// batcher's execution of it.
use futures_util::FutureExt;
use rust_decimal::Decimal;

use crate::models::{Asset, Totals, ADA, UNKNOWN_ADDRESS, UNKNOWN_SCRIPT};
use crate::scoring::signals::{
    self, any_message_share, datum_bytes, datum_int, datum_text, first_message_share, is_fingerprint,
    is_minswap_lp, leading, ready, Match, MessagePattern, Rule, Term,
};
use crate::scoring::text::{amount, join_words, pair_name, pluralize, quantity, truncated};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

use super::{BATCH_ORDER, LIQUIDITY_POOL, ORDER_EXECUTED, ORDER_OWNER, PAID_AMOUNT, POOL_LP_NAME, PROJECT};

const LOVELACE_PER_ADA: u32 = 1_000_000;

/// ADA the DEX dashboard keeps back from a withdrawal (batcher fee and deposit).
const ADA_HELD_BACK: Decimal = Decimal::TWO;

pub static CREATE_SWAP: Classifier = Classifier {
    name: "minswap_create_swap",
    signals: &[
        Signal { name: "user_pays", weight: 0.40, eval: user_pays },
        Signal { name: "order_accounts", weight: 0.50, eval: order_accounts },
        Signal { name: "market_order", weight: 0.10, eval: market_order },
    ],
    describe: |ctx, _| {
        Some(Label::new(
            ctx.kind_or("amm_dex"),
            "Created a swap transaction on Minswap",
        ))
    },
};

pub static SWAP: Classifier = Classifier {
    name: "minswap_swap",
    signals: &[
        Signal { name: "user_receives", weight: 0.40, eval: user_receives },
        Signal { name: "paid_orders", weight: 0.30, eval: paid_orders },
        Signal { name: "no_withdrawal", weight: 0.20, eval: signals::without_withdrawal },
        Signal { name: "order_executed", weight: 0.10, eval: order_executed },
    ],
    describe: describe_swap,
};

pub static CREATE_WITHDRAW: Classifier = Classifier {
    name: "minswap_create_withdraw",
    signals: &[
        Signal { name: "pair_paid", weight: 0.50, eval: pair_paid },
        Signal { name: "pair_deposited", weight: 0.40, eval: pair_deposited },
        Signal { name: "withdraw_order", weight: 0.10, eval: withdraw_order },
    ],
    describe: describe_create_withdraw,
};

pub static WITHDRAW: Classifier = Classifier {
    name: "minswap_withdraw",
    signals: &[
        Signal { name: "pair_received", weight: 0.30, eval: pair_received },
        Signal { name: "liquidity_pool", weight: 0.40, eval: liquidity_pool },
        Signal { name: "no_withdrawal", weight: 0.20, eval: signals::without_withdrawal },
        Signal { name: "order_executed", weight: 0.10, eval: order_executed },
    ],
    describe: describe_withdraw,
};

pub static CREATE_DEPOSIT: Classifier = Classifier {
    name: "minswap_create_deposit",
    signals: &[
        Signal { name: "deposit", weight: 0.75, eval: deposit },
        Signal { name: "deposit_order", weight: 0.25, eval: deposit_order },
    ],
    describe: describe_deposit,
};

pub static CREATE_ZAP_OUT: Classifier = Classifier {
    name: "minswap_create_zap_out",
    signals: &[
        Signal { name: "lp_escrowed", weight: 0.50, eval: lp_escrowed },
        Signal { name: "zap_out_message", weight: 0.50, eval: zap_out_message },
    ],
    describe: |ctx, _| Some(Label::new(ctx.kind_or("amm_dex"), "Created a zap-out order on Minswap")),
};

pub static ZAP_OUT: Classifier = Classifier {
    name: "minswap_zap_out",
    signals: &[
        Signal { name: "lp_released", weight: 0.40, eval: lp_released },
        Signal { name: "pool_names", weight: 0.30, eval: pool_names },
        Signal { name: "no_withdrawal", weight: 0.20, eval: signals::without_withdrawal },
        Signal { name: "executed", weight: 0.10, eval: executed_anywhere },
    ],
    describe: describe_zap_out,
};

const ZAP_OUT_MESSAGE: MessagePattern = MessagePattern {
    terms: &[
        leading(PROJECT),
        Term {
            text: "Zap",
            rules: &[Rule::exact(Match::Contains, 2), Rule::loose(Match::Contains, 1)],
        },
        Term {
            text: "Out",
            rules: &[Rule::exact(Match::Contains, 2), Rule::loose(Match::Contains, 1)],
        },
    ],
};

// ---------- messages ----------

fn market_order<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| m == "Minswap: Market Order"))
}

fn order_executed<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| m == ORDER_EXECUTED))
}

fn executed_anywhere<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(any_message_share(&ctx.tx.metadata, |m| m == ORDER_EXECUTED))
}

fn withdraw_order<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| m == "Minswap: Withdraw Order"))
}

fn deposit_order<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| m == "Minswap: Deposit Order"))
}

fn zap_out_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(ZAP_OUT_MESSAGE.evaluate(&ctx.tx.metadata))
}

// ---------- swaps ----------

/// Share of the user's currencies paid in. Named LP tokens do not count, but
/// fingerprint-named tokens do.
fn user_pays<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    let paying = totals.count(|currency, amount| !is_lp_name(currency) && amount < Decimal::ZERO);
    ready(Evaluation::fraction(paying, totals.len()))
}

/// Counterparties that look like freshly created orders: the batch-order
/// script itself, or an unknown script whose new datum carries a paid amount.
fn order_accounts<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let other = &ctx.tx.accounts.other;
        let mut orders = 0;
        for account in other {
            if account.role == BATCH_ORDER {
                orders += 1;
                continue;
            }
            let funded = account.total.iter().all(|a| a.amount > Decimal::ZERO);
            if account.role != UNKNOWN_SCRIPT || !funded {
                continue;
            }
            let Some(datum) = ctx.output_datum(&account.address).await? else {
                continue;
            };
            if datum_int(&datum, &PAID_AMOUNT).map(|paid| !paid.is_zero()).unwrap_or(false) {
                orders += 1;
            }
        }
        Ok(Evaluation::fraction(orders, other.len()))
    }
    .boxed()
}

/// What the user swapped into: the tokens, or ADA when tokens were sold.
fn user_receives<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    let receiving = totals.count(|_, amount| amount > Decimal::ZERO);
    let evaluation = Evaluation::fraction(receiving, totals.len());

    let tokens: Vec<Asset> = totals.iter().filter(|a| a.currency != ADA).cloned().collect();
    let bought = if tokens.is_empty() {
        totals.iter().filter(|a| a.currency == ADA).cloned().collect()
    } else {
        tokens
    };
    ready(evaluation.with(Extracted::Assets(bought)))
}

/// Lovelace paid by the user's own orders that the batcher consumed.
fn paid_orders<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let owner = ctx.side.address_details.payment_hash();
        let mut paid = Decimal::ZERO;
        for account in &ctx.tx.accounts.other {
            let spent_ada_only = matches!(
                account.total.as_slice(),
                [only] if only.currency == ADA && only.amount < Decimal::ZERO
            );
            if account.role != UNKNOWN_SCRIPT || !spent_ada_only {
                continue;
            }
            let Some(datum) = ctx.input_datum(&account.address).await? else {
                continue;
            };
            if owner.is_none() || datum_bytes(&datum, &ORDER_OWNER) != owner {
                continue;
            }
            paid += datum_int(&datum, &PAID_AMOUNT).unwrap_or(Decimal::ZERO);
        }
        Ok(Evaluation::when(!paid.is_zero()).with(Extracted::Amount(paid)))
    }
    .boxed()
}

fn describe_swap(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let bought: Vec<String> = findings
        .assets("user_receives")?
        .iter()
        .map(|a| quantity(&a.currency, a.amount))
        .collect();
    if bought.is_empty() {
        return None;
    }

    let description = match findings.amount("paid_orders").filter(|paid| !paid.is_zero()) {
        Some(lovelace) => format!(
            "Swapped {} ADA for {} on Minswap",
            amount(lovelace / Decimal::from(LOVELACE_PER_ADA)),
            join_words(&bought)
        ),
        None => format!("Swapped for {} on Minswap", join_words(&bought)),
    };
    Some(Label::new(ctx.kind_or("amm_dex"), description))
}

// ---------- liquidity withdrawal ----------

fn is_lp_name(currency: &str) -> bool {
    currency.ends_with(" LP")
}

/// ADA plus the LP tokens being returned, as a share of everything the user moved.
fn pair_paid<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.user);
    let returning = |currency: &str, amount: Decimal| is_lp_name(currency) && amount < Decimal::ZERO;
    let pair = totals.count(|currency, amount| currency == ADA || returning(currency, amount));
    let evaluation = Evaluation::fraction(pair, totals.len());

    let lp = totals
        .iter()
        .find(|a| returning(&a.currency, a.amount))
        .map(|lp| pair_name(lp.currency.trim_end_matches(" LP")));
    match lp {
        Some(name) => ready(evaluation.with(Extracted::Text(name))),
        None => ready(evaluation),
    }
}

/// Script accounts receiving exactly ADA and LP tokens.
fn pair_deposited<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let other = &ctx.tx.accounts.other;
    let deposits = other
        .iter()
        .filter(|account| {
            account.role != UNKNOWN_ADDRESS
                && account.total.len() == 2
                && account
                    .total
                    .iter()
                    .all(|a| (is_lp_name(&a.currency) || a.currency == ADA) && a.amount > Decimal::ZERO)
        })
        .count();
    ready(Evaluation::fraction(deposits, other.len()))
}

fn describe_create_withdraw(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let pair = findings.text("pair_paid")?;
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!("Created a withdraw {pair} order on Minswap"),
    ))
}

/// The two assets of a pair coming back to the user; ADA is the deposit when
/// a third currency shows up.
fn pair_received<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let mut totals = Totals::of(&ctx.tx.accounts.user);
    match totals.len() {
        2 => {}
        3 => {
            totals.remove(ADA);
        }
        _ => return ready(Evaluation::zero()),
    }
    let phrases = totals
        .iter()
        .map(|a| {
            let received = if a.currency == ADA { a.amount - ADA_HELD_BACK } else { a.amount };
            quantity(&a.currency, received)
        })
        .collect();
    ready(Evaluation::of(1.0).with(Extracted::Phrases(phrases)))
}

/// 5 points for the pool script (1 for an unknown script), 2 more when it holds LP tokens.
fn liquidity_pool<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let other = &ctx.tx.accounts.other;
    let (pool, mut points) = match other.iter().find(|a| a.role == LIQUIDITY_POOL) {
        Some(pool) => (Some(pool), 5),
        None => match other.iter().find(|a| a.role == UNKNOWN_SCRIPT) {
            Some(script) => (Some(script), 1),
            None => (None, 0),
        },
    };
    let lp = pool.and_then(|p| p.total.iter().find(|a| is_lp_name(&a.currency)));
    if lp.is_some() {
        points += 2;
    }

    let evaluation = Evaluation::of(f64::from(points) / 7.0);
    match lp {
        Some(lp) => ready(evaluation.with(Extracted::Text(pair_name(&lp.currency)))),
        None => ready(evaluation),
    }
}

fn describe_withdraw(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let received = findings.phrases("pair_received")?;
    let lp = findings.text("liquidity_pool")?;
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!("Withdrew {} from {} on Minswap", join_words(received), lp),
    ))
}

// ---------- deposits and zaps ----------

/// The user's script address receives what its key address pays in.
fn deposit<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let (received, paid) = ctx.script_flows(|currency| !is_lp_name(currency)).await?;
        let mut currencies: Vec<String> = received.iter().map(|a| a.currency.clone()).collect();
        if currencies.len() > 2 {
            currencies.retain(|currency| currency != ADA);
        }
        Ok(Evaluation::when(!received.is_empty() && !paid.is_empty()).with(Extracted::Phrases(currencies)))
    }
    .boxed()
}

fn describe_deposit(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let currencies = findings.phrases("deposit").filter(|c| !c.is_empty())?;
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!("Created a deposit request of {} on Minswap", join_words(currencies)),
    ))
}

fn lp_escrowed<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let (received, paid) = ctx.script_flows(is_minswap_lp).await?;
        Ok(Evaluation::when(!received.is_empty() || !paid.is_empty()))
    }
    .boxed()
}

/// An LP receipt leaving the user's script address, with what the key address got back.
fn lp_released<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let (scripts, keys) = ctx.split_by_credential(&ctx.tx.accounts.user).await?;
        let released = scripts
            .iter()
            .flat_map(|a| &a.total)
            .filter(|a| is_fingerprint(&a.currency) && a.amount < Decimal::ZERO)
            .last();
        let Some(lp) = released else {
            return Ok(Evaluation::zero());
        };

        let mut received = Totals::default();
        for account in keys {
            received.extend(&account.total);
        }
        Ok(Evaluation::of(1.0).with(Extracted::Position {
            currency: lp.currency.clone(),
            amount: -lp.amount,
            received,
        }))
    }
    .boxed()
}

/// LP names read from the datums of pool outputs that took in LP receipts.
fn pool_names<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let mut labels = Vec::new();
        for account in ctx.tx.accounts.other.iter().filter(|a| a.role != UNKNOWN_ADDRESS) {
            for asset in &account.total {
                if !is_fingerprint(&asset.currency) || asset.amount < Decimal::ZERO {
                    continue;
                }
                for output in ctx.side.tx_utxos.outputs.iter().filter(|o| o.address == account.address) {
                    let Some(datum) = ctx.datum_of(output).await? else {
                        continue;
                    };
                    if let Some(name) = datum_text(&datum, &POOL_LP_NAME) {
                        labels.push((asset.clone(), name));
                    }
                }
            }
        }
        Ok(Evaluation::when(!labels.is_empty()).with(Extracted::Labels(labels)))
    }
    .boxed()
}

fn describe_zap_out(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let Some(Extracted::Position { currency, amount: released, received }) = findings.get("lp_released") else {
        return None;
    };
    let name = match findings.get("pool_names") {
        Some(Extracted::Labels(labels)) => labels
            .iter()
            .find(|(asset, _)| asset.currency == *currency && asset.amount == *released)
            .map(|(_, name)| name.as_str()),
        _ => None,
    }
    .unwrap_or(currency.as_str());

    let tokens: Vec<String> = received
        .iter()
        .map(|a| {
            let qty = if a.currency == ADA { a.amount - ADA_HELD_BACK } else { a.amount };
            format!("{} {}", truncated(qty), pluralize(&a.currency, qty))
        })
        .collect();
    let plural = if *released > Decimal::ONE { "s" } else { "" };
    Some(Label::new(
        ctx.kind_or("amm_dex"),
        format!(
            "Zapped-out {} {} LP Token{} for {} on Minswap",
            amount(*released),
            name,
            plural,
            join_words(&tokens)
        ),
    ))
}
