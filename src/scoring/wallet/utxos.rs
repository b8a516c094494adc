// src/scoring/wallet/utxos.rs
//
// Templates that look past the netted accounts into the raw inputs/outputs.
use futures_util::FutureExt;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{Totals, Utxo, ADA};
use crate::scoring::signals::{self, ready, soften};
use crate::scoring::text::{join_words, quantity};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

const LOVELACE: &str = "lovelace";

/// The canonical collateral output, in lovelace.
const COLLATERAL_LOVELACE: &str = "5000000";

pub static TOKEN_MINTING: Classifier = Classifier {
    name: "token_minting",
    signals: &[Signal { name: "minted", weight: 1.0, eval: minted }],
    describe: describe_minting,
};

pub static SETUP_COLLATERAL: Classifier = Classifier {
    name: "setup_collateral",
    signals: &[
        Signal { name: "collateral_output", weight: 0.50, eval: collateral_output },
        Signal { name: "fee_only", weight: 0.20, eval: fee_only },
        Signal { name: "own_counterparties", weight: 0.20, eval: own_counterparties },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: |_, _| Some(Label::new("setup_collateral", "Setup Collateral")),
};

/// Native-asset units whose outputs differ from their inputs, in first-seen order.
fn imbalanced_units(inputs: &[Utxo], outputs: &[Utxo]) -> Vec<(String, i128)> {
    let mut units: Vec<(String, i128)> = Vec::new();
    let sides = inputs.iter().map(|u| (u, -1)).chain(outputs.iter().map(|u| (u, 1)));
    for (utxo, sign) in sides {
        for amount in utxo.amount.iter().filter(|q| q.unit != LOVELACE) {
            let Ok(quantity) = amount.quantity.parse::<i128>() else {
                debug!("skipping unreadable quantity {} of {}", amount.quantity, amount.unit);
                continue;
            };
            match units.iter_mut().find(|(unit, _)| *unit == amount.unit) {
                Some((_, net)) => *net += sign * quantity,
                None => units.push((amount.unit.clone(), sign * quantity)),
            }
        }
    }
    units.retain(|(_, net)| *net != 0);
    units
}

/// The user's movement in every currency the transaction mints or burns.
fn minted<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let utxos = &ctx.side.tx_utxos;
        let mut minted = Totals::default();
        for (unit, net) in imbalanced_units(&utxos.inputs, &utxos.outputs) {
            let info = soften("asset info", ctx.collaborators.ledger.asset_info(&unit).await)?
                .unwrap_or_default();
            let decimals = info.decimals.unwrap_or(0);
            let Ok(amount) = Decimal::try_from_i128_with_scale(net, decimals) else {
                debug!("{} has an unusable scale of {}", unit, decimals);
                continue;
            };
            let currency = info.name.or(info.fingerprint).unwrap_or(unit);
            minted.add(&currency, amount);
        }

        let mut user = Totals::default();
        for asset in ctx.tx.accounts.user.iter().flat_map(|a| &a.total) {
            let touched = minted.get(&asset.currency).map(|m| !m.is_zero()).unwrap_or(false);
            if asset.currency != ADA && touched {
                user.add(&asset.currency, asset.amount);
            }
        }

        Ok(Evaluation::when(!user.is_empty()).with(Extracted::Totals(user)))
    }
    .boxed()
}

/// A 5 ADA output back to an address sharing the user's payment or stake credential.
fn collateral_output<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let own = &ctx.side.address_details;
        for output in &ctx.side.tx_utxos.outputs {
            let Some(details) = ctx.credentials(&output.address).await? else {
                continue;
            };
            let same_payment = details.payment_hash().is_some() && details.payment_hash() == own.payment_hash();
            let same_stake = details.stake_hash().is_some() && details.stake_hash() == own.stake_hash();
            if !(same_payment || same_stake) {
                continue;
            }
            if output
                .amount
                .iter()
                .any(|q| q.unit == LOVELACE && q.quantity == COLLATERAL_LOVELACE)
            {
                return Ok(Evaluation::of(1.0));
            }
        }
        Ok(Evaluation::zero())
    }
    .boxed()
}

/// The user's ADA moved by exactly the fee.
fn fee_only<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let ada = Totals::of(&ctx.tx.accounts.user).get(ADA).unwrap_or(Decimal::ZERO);
    ready(Evaluation::when((ada + ctx.tx.network_fee.amount).is_zero()))
}

/// Every counterparty shares the user's payment credential.
fn own_counterparties<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    async move {
        let own = ctx.side.address_details.payment_hash();
        for account in &ctx.tx.accounts.other {
            let details = ctx.credentials(&account.address).await?;
            let payment = details.as_ref().and_then(|d| d.payment_hash());
            if payment.is_none() || payment != own {
                return Ok(Evaluation::zero());
            }
        }
        Ok(Evaluation::of(1.0))
    }
    .boxed()
}

fn describe_minting(_: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let phrases: Vec<String> = findings
        .totals("minted")
        .map(|user| {
            user.iter()
                .map(|a| {
                    let verb = if a.amount < Decimal::ZERO { "burned" } else { "minted" };
                    format!("{} {}", verb, quantity(&a.currency, a.amount.abs()))
                })
                .collect()
        })
        .unwrap_or_default();
    let description = if phrases.is_empty() {
        "Token Minting/Burning".to_string()
    } else {
        format!("Token {}", join_words(&phrases))
    };
    Some(Label::new("token_minting", description))
}
