// src/scoring/minswap/mod.rs
//
// Minswap AMM: order creation and batcher execution, liquidity and MIN
// staking, yield farming.
mod farming;
mod orders;

use crate::scoring::signals::{self, counterparty_presence, first_message_share, ready, Step};
use crate::scoring::{Classifier, Label, ScoringContext, Signal, SignalFuture};

pub const PROJECT: &str = "Minswap";

/// Order datum: amount of lovelace the order pays.
const PAID_AMOUNT: [Step; 3] = [Step::Field(6), Step::Field(1), Step::Field(0)];
/// Order datum: payment credential of the order owner.
const ORDER_OWNER: [Step; 2] = [Step::Field(0), Step::Field(0)];
/// Farm datum: name of the staked token.
const FARM_TOKEN: [Step; 4] = [Step::Field(3), Step::List(0), Step::Field(0), Step::Field(1)];
/// Pool datum: LP asset name.
const POOL_LP_NAME: [Step; 2] = [Step::Field(2), Step::Field(1)];

const BATCH_ORDER: &str = "Minswap Batch Order";
const LIQUIDITY_POOL: &str = "Minswap Liquidity Pool";
const ORDER_EXECUTED: &str = "Minswap: Order Executed";

fn is_yield_farm(role: &str) -> bool {
    role.starts_with("Minswap Yield Farming")
}

pub static CLASSIFIERS: [&Classifier; 13] = [
    &orders::CREATE_SWAP,
    &orders::SWAP,
    &farming::CREATE_WITHDRAW_LIQUIDITY,
    &farming::WITHDRAW_LIQUIDITY,
    &orders::CREATE_WITHDRAW,
    &orders::WITHDRAW,
    &farming::STAKE_MIN,
    &farming::UNSTAKE_MIN,
    &farming::RECEIVE_STAKING_REWARDS,
    &orders::CREATE_DEPOSIT,
    &farming::STAKE_LIQUIDITY,
    &orders::CREATE_ZAP_OUT,
    &orders::ZAP_OUT,
];

pub static FALLBACK: Classifier = Classifier {
    name: "minswap_default",
    signals: &[
        Signal { name: "minswap_counterparty", weight: 0.50, eval: minswap_counterparty },
        Signal { name: "no_withdrawal", weight: 0.15, eval: signals::without_withdrawal },
        Signal { name: "minswap_message", weight: 0.35, eval: minswap_message },
    ],
    describe: |ctx, _| Some(Label::new(ctx.kind_or("amm_dex"), "Executed an order on Minswap")),
};

fn minswap_counterparty<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(counterparty_presence(&ctx.tx.accounts.other, |role| role.contains(PROJECT)))
}

fn minswap_message<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(first_message_share(&ctx.tx.metadata, |m| m.starts_with(PROJECT)))
}
