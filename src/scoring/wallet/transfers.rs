// src/scoring/wallet/transfers.rs
use rust_decimal::Decimal;

use crate::models::{Totals, ADA};
use crate::scoring::signals::{self, ada_only, ready, unknown_address_share, Flow};
use crate::scoring::text::{amount, join_words, quantity};
use crate::scoring::{Classifier, Evaluation, Extracted, Findings, Label, ScoringContext, Signal, SignalFuture};

pub static RECEIVE_ADA: Classifier = Classifier {
    name: "receive_ada",
    signals: &[
        Signal { name: "ada_inflow", weight: 0.80, eval: ada_inflow },
        Signal { name: "plain_counterparties", weight: 0.15, eval: plain_counterparties },
        Signal { name: "no_metadata", weight: 0.05, eval: signals::without_metadata },
    ],
    describe: describe_receive_ada,
};

pub static SEND_ADA: Classifier = Classifier {
    name: "send_ada",
    signals: &[
        Signal { name: "ada_outflow", weight: 0.80, eval: ada_outflow },
        Signal { name: "plain_counterparties", weight: 0.15, eval: plain_counterparties },
        Signal { name: "no_metadata", weight: 0.05, eval: signals::without_metadata },
    ],
    describe: describe_send_ada,
};

pub static RECEIVE_TOKENS: Classifier = Classifier {
    name: "receive_tokens",
    signals: &[
        Signal { name: "user_inflow", weight: 0.40, eval: user_inflow },
        Signal { name: "counterparty_outflow", weight: 0.30, eval: counterparty_outflow },
        Signal { name: "no_withdrawal", weight: 0.20, eval: signals::without_withdrawal },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: describe_receive_tokens,
};

pub static SEND_TOKENS: Classifier = Classifier {
    name: "send_tokens",
    signals: &[
        Signal { name: "user_outflow", weight: 0.45, eval: user_outflow },
        Signal { name: "counterparty_inflow", weight: 0.45, eval: counterparty_inflow },
        Signal { name: "no_metadata", weight: 0.10, eval: signals::without_metadata },
    ],
    describe: describe_send_tokens,
};

fn ada_inflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(ada_only(&ctx.tx.accounts.user, Flow::Inflow))
}

fn ada_outflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(ada_only(&ctx.tx.accounts.user, Flow::Outflow))
}

fn plain_counterparties<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(unknown_address_share(&ctx.tx.accounts.other))
}

/// Share of the user's currencies moving the given way; a single currency is
/// left to the ADA-only templates.
fn several_moving(totals: Totals, inflow: bool) -> Evaluation {
    let matching = totals.count(|_, amount| {
        if inflow {
            amount > Decimal::ZERO
        } else {
            amount < Decimal::ZERO
        }
    });
    let score = if totals.len() > 1 {
        Evaluation::fraction(matching, totals.len()).score
    } else {
        0.0
    };
    Evaluation::of(score).with(Extracted::Totals(totals))
}

fn user_inflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(several_moving(Totals::of(&ctx.tx.accounts.user), true))
}

fn user_outflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(several_moving(Totals::of(&ctx.tx.accounts.user), false))
}

fn counterparty_inflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(several_moving(Totals::of(&ctx.tx.accounts.other), true))
}

/// Counterparties paying out tokens; ADA is ignored so this does not overlap receive_ada.
fn counterparty_outflow<'a>(ctx: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    let totals = Totals::of(&ctx.tx.accounts.other);
    let tokens = totals.count(|currency, amount| currency != ADA && !amount.is_zero());
    let paying = totals.count(|currency, amount| currency != ADA && amount < Decimal::ZERO);
    ready(Evaluation::fraction(paying, tokens))
}

fn describe_receive_ada(_: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let received = findings.amount("ada_inflow")?;
    Some(Label::new("receive_ada", format!("Received {} ADA", amount(received))))
}

fn describe_send_ada(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let outflow = findings.amount("ada_outflow")?;
    let sent = outflow - ctx.tx.network_fee.amount;
    Some(Label::new("send_ada", format!("Sent {} ADA", amount(sent))))
}

fn describe_receive_tokens(_: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let received: Vec<String> = findings
        .totals("user_inflow")?
        .iter()
        .filter(|a| a.currency != ADA && a.amount > Decimal::ZERO)
        .map(|a| quantity(&a.currency, a.amount))
        .collect();
    if received.is_empty() {
        return None;
    }
    Some(Label::new("receive_tokens", format!("Received {}", join_words(&received))))
}

fn describe_send_tokens(ctx: &ScoringContext<'_>, findings: &Findings) -> Option<Label> {
    let user = findings.totals("user_outflow")?;

    let mut sent = Vec::new();
    if let Some(ada) = user.get(ADA) {
        let ada = -ada - ctx.tx.network_fee.amount;
        if ada > Decimal::ZERO {
            sent.push(quantity(ADA, ada));
        }
    }
    sent.extend(
        user.iter()
            .filter(|a| a.currency != ADA && a.amount < Decimal::ZERO)
            .map(|a| quantity(&a.currency, -a.amount)),
    );
    if sent.is_empty() {
        return None;
    }
    Some(Label::new("sent_tokens", format!("Sent {}", join_words(&sent))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::testing::*;

    #[tokio::test]
    async fn sending_ada_to_a_wallet() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "-10.17")])],
            vec![wallet("addr_w", &[("ADA", "10")])],
            vec![],
        );
        let scored = score(&SEND_ADA, &tx).await;
        assert!(close(scored.score, 1.0));
        assert_eq!(scored.kind.as_deref(), Some("send_ada"));
        assert_eq!(scored.description.as_deref(), Some("Sent 10 ADA"));

        let other_way = score(&RECEIVE_ADA, &tx).await;
        assert_eq!(other_way.score, 0.0);
        assert!(other_way.description.is_none());
    }

    #[tokio::test]
    async fn lone_ada_outflow_without_counterparties() {
        let tx = tx(vec![user("addr_u", &[("ADA", "-5")])], vec![], vec![]);
        let scored = score(&SEND_ADA, &tx).await;
        assert!(close(scored.score, 0.85));
        assert_eq!(scored.description.as_deref(), Some("Sent 4.83 ADA"));
    }

    #[tokio::test]
    async fn receiving_ada_with_a_message() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "25")])],
            vec![wallet("addr_w", &[("ADA", "-25.17")])],
            vec![message("674", &["thanks"])],
        );
        let scored = score(&RECEIVE_ADA, &tx).await;
        assert!(close(scored.score, 0.95));
        assert_eq!(scored.description.as_deref(), Some("Received 25 ADA"));
    }

    #[tokio::test]
    async fn receiving_tokens_lists_only_tokens() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "1.5"), ("HOSKY", "1000"), ("SomeToken", "2")])],
            vec![wallet("addr_w", &[("ADA", "-1.67"), ("HOSKY", "-1000"), ("SomeToken", "-2")])],
            vec![],
        );
        let scored = score(&RECEIVE_TOKENS, &tx).await;
        assert!(close(scored.score, 1.0));
        assert_eq!(
            scored.description.as_deref(),
            Some("Received 1000 HOSKY and 2 SomeTokens")
        );
    }

    #[tokio::test]
    async fn sending_tokens_nets_the_fee_out_of_ada() {
        let tx = tx(
            vec![user("addr_u", &[("ADA", "-2.17"), ("MIN", "-40")])],
            vec![wallet("addr_w", &[("ADA", "2"), ("MIN", "40")])],
            vec![],
        );
        let scored = score(&SEND_TOKENS, &tx).await;
        assert!(close(scored.score, 1.0));
        assert_eq!(scored.kind.as_deref(), Some("sent_tokens"));
        assert_eq!(scored.description.as_deref(), Some("Sent 2 ADA and 40 MIN"));
    }

    #[tokio::test]
    async fn single_currency_is_not_a_token_transfer() {
        let tx = tx(vec![user("addr_u", &[("MIN", "-40")])], vec![], vec![]);
        let scored = score(&SEND_TOKENS, &tx).await;
        assert!(close(scored.score, 0.10));
    }
}
