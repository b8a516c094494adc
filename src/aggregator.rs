// src/aggregator.rs
//
// Runs the classifier groups for a transaction, keeps the best result and
// turns its score into a bounded confidence. Weak answers are retried on the
// coarser fallback tier.
use futures_util::future::try_join_all;
use tracing::{debug, info};

use crate::error::Result;
use crate::ledger::Collaborators;
use crate::models::{SideData, Transaction};
use crate::scoring::groups::{self, ClassifierGroup};
use crate::scoring::{Classifier, Scored, ScoringContext};

pub const PRIMARY_MAX_CONFIDENCE: u32 = 99;
pub const FALLBACK_MAX_CONFIDENCE: u32 = 50;
/// The default group's fallback only ever names the activity.
pub const DEFAULT_FALLBACK_MAX_CONFIDENCE: u32 = 0;
pub const ESCALATION_THRESHOLD: u32 = 50;

/// Two-segment map rewarding near-total signal agreement: below 0.9 a score
/// is halved, `[0.9, 1]` is stretched onto `[0.5, 1]`.
pub fn adjusted_score(score: f64) -> f64 {
    if score < 0.9 {
        score / 2.0
    } else {
        (score - 0.9) * 5.0 + 0.5
    }
}

pub fn to_confidence(score: f64, max_confidence: u32) -> u32 {
    let adjusted = adjusted_score(score.clamp(0.0, 1.0));
    (adjusted * f64::from(max_confidence)).round() as u32
}

/// Confidence 0 never escalates, nor does a missing one.
pub fn should_escalate(confidence: Option<u32>) -> bool {
    matches!(confidence, Some(c) if c > 0 && c <= ESCALATION_THRESHOLD)
}

/// The winning classification of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub kind: Option<String>,
    pub description: Option<String>,
    pub score: f64,
    pub confidence: u32,
}

impl Verdict {
    fn new(scored: Scored, max_confidence: u32) -> Self {
        Self {
            confidence: to_confidence(scored.score, max_confidence),
            kind: scored.kind,
            description: scored.description,
            score: scored.score,
        }
    }

    fn apply(self, tx: &Transaction) -> Transaction {
        Transaction {
            kind: self.kind,
            description: self.description,
            confidence: Some(self.confidence),
            ..tx.clone()
        }
    }
}

/// Highest score wins; on equal scores the earliest entry is kept.
fn first_best<T>(candidates: impl IntoIterator<Item = T>, score: impl Fn(&T) -> f64) -> Option<T> {
    let mut best: Option<T> = None;
    for candidate in candidates {
        let better = match &best {
            Some(current) => score(&candidate) > score(current),
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Scores every classifier concurrently and keeps the best; `None` for an empty group.
pub async fn confidence_of(
    classifiers: &[&Classifier],
    max_confidence: u32,
    ctx: &ScoringContext<'_>,
) -> Result<Option<Verdict>> {
    if classifiers.is_empty() {
        return Ok(None);
    }
    let scores = try_join_all(classifiers.iter().map(|classifier| classifier.score(ctx))).await?;
    Ok(first_best(scores, |scored| scored.score).map(|best| Verdict::new(best, max_confidence)))
}

/// Best verdict across groups, in candidate order on ties.
async fn best_across(
    groups: &[Option<&'static ClassifierGroup>],
    pick: fn(&'static ClassifierGroup) -> Vec<&'static Classifier>,
    max_confidence: u32,
    ctx: &ScoringContext<'_>,
) -> Result<Option<Verdict>> {
    let verdicts = try_join_all(groups.iter().copied().map(|group| async move {
        match group {
            Some(group) => {
                let verdict = confidence_of(&pick(group), max_confidence, ctx).await;
                if let Ok(Some(best)) = &verdict {
                    debug!(
                        "{} best: {:?} score {:.4} confidence {}",
                        group.name, best.description, best.score, best.confidence
                    );
                }
                verdict
            }
            None => Ok(None),
        }
    }))
    .await?;
    Ok(first_best(verdicts.into_iter().flatten(), |verdict| verdict.score))
}

fn every_classifier(group: &'static ClassifierGroup) -> Vec<&'static Classifier> {
    group.classifiers.to_vec()
}

fn fallback_only(group: &'static ClassifierGroup) -> Vec<&'static Classifier> {
    vec![group.fallback]
}

/// Classifies `tx` and returns it with `type`, `description` and `confidence` set.
///
/// Candidate projects without a registered group contribute nothing. When no
/// group produces a verdict the transaction comes back unchanged with no
/// confidence. Only an unavailable collaborator fails the call.
pub async fn classify(
    tx: &Transaction,
    candidates: &[String],
    side: &SideData,
    collaborators: Collaborators<'_>,
) -> Result<Transaction> {
    let ctx = ScoringContext::new(tx, side, collaborators);

    let selected: Vec<Option<&'static ClassifierGroup>> = if candidates.is_empty() {
        vec![Some(groups::default_group())]
    } else {
        candidates.iter().map(|project| groups::project(project)).collect()
    };

    let primary = best_across(&selected, every_classifier, PRIMARY_MAX_CONFIDENCE, &ctx).await?;
    let confidence = primary.as_ref().map(|verdict| verdict.confidence);
    if !should_escalate(confidence) {
        return Ok(match primary {
            Some(verdict) => verdict.apply(tx),
            None => Transaction {
                confidence: None,
                ..tx.clone()
            },
        });
    }

    info!(
        "{} confidence {:?} too weak, escalating to fallback classifiers",
        tx.transaction_id, confidence
    );
    let max_confidence = if candidates.is_empty() {
        DEFAULT_FALLBACK_MAX_CONFIDENCE
    } else {
        FALLBACK_MAX_CONFIDENCE
    };
    let fallback = best_across(&selected, fallback_only, max_confidence, &ctx).await?;

    Ok(match fallback.or(primary) {
        Some(verdict) => verdict.apply(tx),
        None => tx.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_score_has_fixed_points() {
        assert_eq!(adjusted_score(0.0), 0.0);
        assert!((adjusted_score(0.9) - 0.5).abs() < 1e-12);
        assert!((adjusted_score(1.0) - 1.0).abs() < 1e-12);
        assert!((adjusted_score(0.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn adjusted_score_never_decreases() {
        let mut previous = adjusted_score(0.0);
        for step in 1..=1000 {
            let current = adjusted_score(step as f64 / 1000.0);
            assert!(current >= previous, "dropped at {}", step);
            previous = current;
        }
    }

    #[test]
    fn confidence_spans_the_ceiling() {
        assert_eq!(to_confidence(0.0, PRIMARY_MAX_CONFIDENCE), 0);
        assert_eq!(to_confidence(1.0, PRIMARY_MAX_CONFIDENCE), 99);
        assert_eq!(to_confidence(0.85, PRIMARY_MAX_CONFIDENCE), 42);
        assert_eq!(to_confidence(0.95, PRIMARY_MAX_CONFIDENCE), 74);
        assert_eq!(to_confidence(1.0, FALLBACK_MAX_CONFIDENCE), 50);
        assert_eq!(to_confidence(1.0, DEFAULT_FALLBACK_MAX_CONFIDENCE), 0);
    }

    #[test]
    fn escalation_only_for_weak_but_nonzero_confidence() {
        assert!(!should_escalate(None));
        assert!(!should_escalate(Some(0)));
        assert!(should_escalate(Some(1)));
        assert!(should_escalate(Some(50)));
        assert!(!should_escalate(Some(51)));
        assert!(!should_escalate(Some(99)));
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let best = first_best(vec![("a", 0.4), ("b", 0.7), ("c", 0.7)], |c| c.1);
        assert_eq!(best, Some(("b", 0.7)));
        assert_eq!(first_best(Vec::<(&str, f64)>::new(), |c| c.1), None);
    }
}
