//! Three-variant record classification.
//!
//! An identical triple is looked up exactly in the reference set; any other
//! triple is tagged with the single pair of variants that agrees, if any.

use crate::models::{Agreement, BestMatch};
use crate::scoring::NameScorer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// All three equal and some reference name (either field) equals them.
    Exact(BestMatch),
    /// All three equal, no exact reference hit.
    Identity,
    Mismatch(Agreement),
}

/// Which pair agrees, or `None` when all three are equal.
///
/// Two disjoint pairs cannot agree while the third differs, so at most one
/// tag applies outside the all-equal case.
pub fn agreement(a: &str, b: &str, c: &str) -> Option<Agreement> {
    if a == b && b == c {
        None
    } else if a == b {
        Some(Agreement::OrgConf)
    } else if a == c {
        Some(Agreement::OrgForay)
    } else if b == c {
        Some(Agreement::ConfForay)
    } else {
        Some(Agreement::AllDifferent)
    }
}

/// Classify a trimmed triple. Runs on the calling thread.
pub fn classify<S>(scorer: &S, a: &str, b: &str, c: &str) -> Classification
where
    S: NameScorer + ?Sized,
{
    match agreement(a, b, c) {
        Some(tag) => Classification::Mismatch(tag),
        None => match scorer.exact_match(a) {
            Some(best) => Classification::Exact(best),
            None => Classification::Identity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::models::{NameField, ReferenceEntry};
    use crate::scoring::Scorer;

    fn scorer() -> Scorer {
        Scorer::new(
            build_index(vec![
                ReferenceEntry::new("100", "Psalliota campestris", "Agaricus campestris"),
                ReferenceEntry::new("200", "Boletus edulis", ""),
            ]),
            64,
        )
    }

    #[test]
    fn test_agreement_tags() {
        assert_eq!(agreement("x", "x", "x"), None);
        assert_eq!(agreement("x", "x", "y"), Some(Agreement::OrgConf));
        assert_eq!(agreement("x", "y", "x"), Some(Agreement::OrgForay));
        assert_eq!(agreement("y", "x", "x"), Some(Agreement::ConfForay));
        assert_eq!(agreement("x", "y", "z"), Some(Agreement::AllDifferent));
        assert_eq!(agreement("", "", ""), None);
        assert_eq!(agreement("", "", "x"), Some(Agreement::OrgConf));
    }

    #[test]
    fn test_agreement_is_case_sensitive() {
        assert_eq!(
            agreement("Amanita", "amanita", "Amanita"),
            Some(Agreement::OrgForay)
        );
    }

    #[test]
    fn test_classification_is_total_and_deterministic() {
        let s = scorer();
        // Every non-empty historical or current name in the reference set
        let known = ["Psalliota campestris", "Agaricus campestris", "Boletus edulis"];
        let names = [
            "",
            "Boletus edulis",
            "Agaricus campestris",
            "boletus edulis",
            "Psalliota campestris",
        ];
        for a in names {
            for b in names {
                for c in names {
                    let first = classify(&s, a, b, c);
                    assert_eq!(first, classify(&s, a, b, c));
                    let all_equal = a == b && b == c;
                    match &first {
                        Classification::Exact(best) => {
                            assert!(all_equal);
                            assert!(known.contains(&a));
                            assert_eq!(best.score, 100);
                            assert_eq!(best.entry.name(best.field), a);
                        }
                        Classification::Identity => {
                            assert!(all_equal);
                            assert!(!known.contains(&a));
                        }
                        Classification::Mismatch(tag) => {
                            assert!(!all_equal);
                            assert_eq!(Some(*tag), agreement(a, b, c));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_exact_match_on_current_name() {
        let name = "Agaricus campestris";
        match classify(&scorer(), name, name, name) {
            Classification::Exact(best) => {
                assert_eq!(best.entry.id, "100");
                assert_eq!(best.score, 100);
                assert_eq!(best.field, NameField::Current);
            }
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_match_on_historical_name() {
        let name = "Boletus edulis";
        match classify(&scorer(), name, name, name) {
            Classification::Exact(best) => {
                assert_eq!(best.entry.id, "200");
                assert_eq!(best.field, NameField::Historical);
            }
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_match_on_historical_name_in_other_bucket() {
        // Entry 100 is bucketed under its current name ('A')
        let name = "Psalliota campestris";
        match classify(&scorer(), name, name, name) {
            Classification::Exact(best) => {
                assert_eq!(best.entry.id, "100");
                assert_eq!(best.field, NameField::Historical);
            }
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn test_identity_without_exact_hit() {
        let name = "Agaricus campestri";
        assert_eq!(classify(&scorer(), name, name, name), Classification::Identity);
        assert_eq!(classify(&scorer(), "", "", ""), Classification::Identity);
    }

    #[test]
    fn test_mismatch_first_second_agree() {
        let result = classify(
            &scorer(),
            "Agaricus campestris",
            "Agaricus campestris",
            "Meadow mushroom",
        );
        assert_eq!(result, Classification::Mismatch(Agreement::OrgConf));
    }

    #[test]
    fn test_author_suffix_is_not_equal() {
        // Equality is byte-exact after trimming; an authority suffix differs
        let result = classify(
            &scorer(),
            "Agaricus campestris",
            " Agaricus campestris L. ",
            "Meadow mushroom",
        );
        assert_eq!(result, Classification::Mismatch(Agreement::AllDifferent));
    }
}
