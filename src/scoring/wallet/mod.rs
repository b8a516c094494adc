// src/scoring/wallet/mod.rs
//
// Activities that need no known counterparty: plain transfers, staking
// certificates, governance registrations, minting and collateral setup.
mod staking;
mod transfers;
mod utxos;

use super::{Classifier, Findings, Label, ScoringContext, Signal, SignalFuture};
use super::{signals::ready, Evaluation};

pub static CLASSIFIERS: [&Classifier; 11] = [
    &transfers::RECEIVE_ADA,
    &transfers::SEND_ADA,
    &transfers::RECEIVE_TOKENS,
    &transfers::SEND_TOKENS,
    &utxos::TOKEN_MINTING,
    &staking::CATALYST_REGISTRATION,
    &staking::CATALYST_DEREGISTRATION,
    &staking::STAKE_DELEGATION,
    &staking::STAKE_REGISTRATION,
    &staking::MULTI_STAKE_DELEGATION,
    &utxos::SETUP_COLLATERAL,
];

/// Catches everything; only ever run on the fallback tier.
pub static UNKNOWN_ACTIVITY: Classifier = Classifier {
    name: "unknown_activity",
    signals: &[Signal {
        name: "always",
        weight: 1.0,
        eval: always,
    }],
    describe: describe_unknown,
};

fn always<'a>(_: &'a ScoringContext<'a>) -> SignalFuture<'a> {
    ready(Evaluation::of(1.0))
}

fn describe_unknown(_: &ScoringContext<'_>, _: &Findings) -> Option<Label> {
    Some(Label::new("unknown_activity", "Unknown Activity"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::testing::*;

    #[tokio::test]
    async fn unknown_activity_always_fires() {
        let scored = score(&UNKNOWN_ACTIVITY, &tx(vec![], vec![], vec![])).await;
        assert_eq!(scored.kind.as_deref(), Some("unknown_activity"));
        assert_eq!(scored.description.as_deref(), Some("Unknown Activity"));
        assert_eq!(scored.score, 1.0);
    }
}
