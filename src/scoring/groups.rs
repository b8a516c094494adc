// src/scoring/groups.rs
//
// Classifier groups: one per counterparty project plus the default group for
// transactions without a detected counterparty. Immutable once built.
use once_cell::sync::Lazy;

use super::{minswap, wallet, wingriders, Classifier};

/// A project's classifiers plus the single coarser classifier run on the
/// fallback tier.
pub struct ClassifierGroup {
    pub name: &'static str,
    pub classifiers: &'static [&'static Classifier],
    pub fallback: &'static Classifier,
}

pub static DEFAULT: ClassifierGroup = ClassifierGroup {
    name: "default",
    classifiers: &wallet::CLASSIFIERS,
    fallback: &wallet::UNKNOWN_ACTIVITY,
};

pub static MINSWAP: ClassifierGroup = ClassifierGroup {
    name: minswap::PROJECT,
    classifiers: &minswap::CLASSIFIERS,
    fallback: &minswap::FALLBACK,
};

pub static WINGRIDERS: ClassifierGroup = ClassifierGroup {
    name: wingriders::PROJECT,
    classifiers: &wingriders::CLASSIFIERS,
    fallback: &wingriders::FALLBACK,
};

static PROJECTS: Lazy<Vec<(String, &'static ClassifierGroup)>> = Lazy::new(|| {
    [&MINSWAP, &WINGRIDERS]
        .into_iter()
        .map(|group| (group.name.to_lowercase(), group))
        .collect()
});

/// The group registered for a project, matched case-insensitively.
pub fn project(name: &str) -> Option<&'static ClassifierGroup> {
    let key = name.to_lowercase();
    PROJECTS
        .iter()
        .find(|(project, _)| *project == key)
        .map(|(_, group)| *group)
}

pub fn default_group() -> &'static ClassifierGroup {
    &DEFAULT
}

/// Every group, the default one first.
#[cfg(test)]
fn all() -> impl Iterator<Item = &'static ClassifierGroup> {
    std::iter::once(&DEFAULT).chain(PROJECTS.iter().map(|(_, group)| *group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_match_case_insensitively() {
        assert_eq!(project("minswap").map(|g| g.name), Some("Minswap"));
        assert_eq!(project("WINGRIDERS").map(|g| g.name), Some("Wingriders"));
        assert!(project("SundaeSwap").is_none());
        assert_eq!(default_group().name, "default");
    }

    #[test]
    fn every_classifier_has_weights_summing_to_one() {
        for group in all() {
            for classifier in group.classifiers.iter().chain(std::iter::once(&group.fallback)) {
                let total = classifier.weight_total();
                assert!(
                    (total - 1.0).abs() < 1e-9,
                    "{} weights sum to {}",
                    classifier.name,
                    total
                );
            }
        }
    }

    #[test]
    fn classifier_names_are_unique() {
        let mut names: Vec<&str> = all()
            .flat_map(|g| g.classifiers.iter().chain(std::iter::once(&g.fallback)))
            .map(|c| c.name)
            .collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }
}
