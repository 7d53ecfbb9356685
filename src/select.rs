//! Candidate selection for mismatched triples.
//!
//! Scores the three variants concurrently on the shared worker pool, joins,
//! then reduces to one overall best candidate. The reduction depends only on
//! the scores, never on completion order.

use rayon::ThreadPool;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::ScoreError;
use crate::models::{
    BestMatch, CandidateRef, ScoredCandidate, Variant, Winner, NO_MATCH_EXPLANATION,
};
use crate::scoring::NameScorer;

/// Per-variant results plus the chosen winner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub results: [(Variant, Option<BestMatch>); 3],
    pub winner: Option<(Variant, BestMatch)>,
}

impl Selection {
    pub fn score(&self, variant: Variant) -> u8 {
        self.results
            .iter()
            .find(|(v, _)| *v == variant)
            .and_then(|(_, best)| best.as_ref())
            .map_or(0, |best| best.score)
    }

    pub fn into_scored(self, observation_id: &str) -> ScoredCandidate {
        let winner = self.winner.as_ref().map(|(variant, best)| Winner {
            variant: *variant,
            field: best.field,
        });
        ScoredCandidate {
            observation_id: observation_id.to_string(),
            org_score: self.score(Variant::Org),
            conf_score: self.score(Variant::Conf),
            foray_score: self.score(Variant::Foray),
            explanation: winner.map_or_else(|| NO_MATCH_EXPLANATION.to_string(), Winner::explanation),
            winner,
            candidate: self
                .winner
                .map(|(_, best)| CandidateRef::from(best.entry.as_ref())),
        }
    }
}

/// Strictly highest score wins; ties go to the earlier variant in
/// ORG > CONF > FORAY order. Absent or zero scores never win.
pub fn pick_winner(results: &[(Variant, Option<BestMatch>)]) -> Option<(Variant, BestMatch)> {
    let mut winner: Option<(Variant, &BestMatch)> = None;

    for variant in Variant::ALL {
        let Some(best) = results
            .iter()
            .find(|(v, _)| *v == variant)
            .and_then(|(_, best)| best.as_ref())
        else {
            continue;
        };
        if best.score == 0 {
            continue;
        }
        if winner.map_or(true, |(_, w)| best.score > w.score) {
            winner = Some((variant, best));
        }
    }

    winner.map(|(variant, best)| (variant, best.clone()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One scoring call, with a panic turned into an error for this record.
fn score_task<S>(scorer: &S, variant: Variant, query: &str) -> Result<Option<BestMatch>, ScoreError>
where
    S: NameScorer + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| scorer.best_match(query))).map_err(|payload| {
        ScoreError::TaskPanicked {
            variant,
            query: query.to_string(),
            message: panic_message(payload.as_ref()),
        }
    })
}

/// Score `a` (ORG), `b` (CONF) and `c` (FORAY) as three tasks on `pool`
/// and block until all three finish.
pub fn select_candidate<S>(
    pool: &ThreadPool,
    scorer: &S,
    a: &str,
    b: &str,
    c: &str,
) -> Result<Selection, ScoreError>
where
    S: NameScorer + ?Sized,
{
    let (org, (conf, foray)) = pool.install(|| {
        rayon::join(
            || score_task(scorer, Variant::Org, a),
            || {
                rayon::join(
                    || score_task(scorer, Variant::Conf, b),
                    || score_task(scorer, Variant::Foray, c),
                )
            },
        )
    });

    let results = [
        (Variant::Org, org?),
        (Variant::Conf, conf?),
        (Variant::Foray, foray?),
    ];
    let winner = pick_winner(&results);
    Ok(Selection { results, winner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::models::{NameField, ReferenceEntry};
    use crate::scoring::Scorer;
    use rayon::ThreadPoolBuilder;
    use std::sync::Arc;

    fn pool(threads: usize) -> ThreadPool {
        ThreadPoolBuilder::new().num_threads(threads).build().unwrap()
    }

    fn best(id: &str, score: u8, field: NameField) -> BestMatch {
        BestMatch {
            entry: Arc::new(ReferenceEntry::new(id, "Amanita", "Amanita")),
            score,
            field,
        }
    }

    fn reference_set() -> Vec<ReferenceEntry> {
        vec![
            ReferenceEntry::new("1", "Agaricus campestris", "Agaricus campestris"),
            ReferenceEntry::new("2", "Psalliota arvensis", "Agaricus arvensis"),
            ReferenceEntry::new("3", "Marasmius oreades", ""),
            ReferenceEntry::new("4", "Boletus edulis", "Boletus edulis"),
        ]
    }

    #[test]
    fn test_pick_winner_highest_score() {
        let results = [
            (Variant::Org, Some(best("1", 70, NameField::Current))),
            (Variant::Conf, Some(best("2", 85, NameField::Historical))),
            (Variant::Foray, None),
        ];
        let (variant, winner) = pick_winner(&results).unwrap();
        assert_eq!(variant, Variant::Conf);
        assert_eq!(winner.entry.id, "2");
    }

    #[test]
    fn test_pick_winner_tie_priority() {
        let results = [
            (Variant::Foray, Some(best("3", 80, NameField::Current))),
            (Variant::Conf, Some(best("2", 80, NameField::Current))),
            (Variant::Org, Some(best("1", 79, NameField::Current))),
        ];
        let (variant, winner) = pick_winner(&results).unwrap();
        assert_eq!(variant, Variant::Conf);
        assert_eq!(winner.entry.id, "2");

        let results = [
            (Variant::Org, Some(best("1", 80, NameField::Current))),
            (Variant::Conf, Some(best("2", 80, NameField::Current))),
            (Variant::Foray, Some(best("3", 80, NameField::Current))),
        ];
        assert_eq!(pick_winner(&results).unwrap().0, Variant::Org);
    }

    #[test]
    fn test_pick_winner_none() {
        let results = [
            (Variant::Org, None),
            (Variant::Conf, Some(best("2", 0, NameField::Current))),
            (Variant::Foray, None),
        ];
        assert!(pick_winner(&results).is_none());
    }

    #[test]
    fn test_only_third_variant_finds_candidate() {
        let scorer = Scorer::new(build_index(reference_set()), 64);
        let selection = select_candidate(
            &pool(2),
            &scorer,
            "Xylaria polymorpha",
            "",
            "Marasmius oreadis",
        )
        .unwrap();

        assert_eq!(selection.score(Variant::Org), 0);
        assert_eq!(selection.score(Variant::Conf), 0);
        assert!(selection.score(Variant::Foray) > 0);

        let scored = selection.into_scored("obs-3");
        assert_eq!(scored.org_score, 0);
        assert_eq!(scored.conf_score, 0);
        assert_eq!(
            scored.winner,
            Some(Winner {
                variant: Variant::Foray,
                field: NameField::Historical
            })
        );
        assert_eq!(scored.explanation, "FORAY → HISTORICAL");
        let candidate = scored.candidate.unwrap();
        assert_eq!(candidate.reference_id, "3");
        assert_eq!(candidate.reference_name, "Marasmius oreades");
    }

    #[test]
    fn test_empty_reference_set_no_candidate() {
        let scorer = Scorer::new(build_index(Vec::new()), 64);
        let scored = select_candidate(&pool(1), &scorer, "Amanita", "Boletus", "Cortinarius")
            .unwrap()
            .into_scored("obs-4");

        assert_eq!((scored.org_score, scored.conf_score, scored.foray_score), (0, 0, 0));
        assert!(scored.winner.is_none());
        assert!(scored.candidate.is_none());
        assert_eq!(scored.explanation, NO_MATCH_EXPLANATION);
    }

    #[test]
    fn test_deterministic_across_pool_sizes() {
        let triples = [
            ("Agaricus campestri", "Agaricus arvensis", "Agaricus campestris L."),
            ("Boletus eduli", "Boletus edulis", "Boletus"),
            ("Agaricus", "Agaricus", "Marasmius"),
            ("", "Agaricus arvensi", "Agaricus arvensiss"),
        ];

        for (a, b, c) in triples {
            let reference = {
                let scorer = Scorer::new(build_index(reference_set()), 0);
                select_candidate(&pool(1), &scorer, a, b, c)
                    .unwrap()
                    .into_scored("x")
            };
            for threads in [1, 2, 8] {
                let pool = pool(threads);
                let scorer = Scorer::new(build_index(reference_set()), 64);
                for _ in 0..5 {
                    let scored = select_candidate(&pool, &scorer, a, b, c)
                        .unwrap()
                        .into_scored("x");
                    assert_eq!(scored, reference, "triple ({a}, {b}, {c}) threads {threads}");
                }
            }
        }
    }

    struct PanickingScorer;

    impl NameScorer for PanickingScorer {
        fn best_match(&self, query: &str) -> Option<BestMatch> {
            if query == "boom" {
                panic!("scorer exploded");
            }
            None
        }
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let err = select_candidate(&pool(2), &PanickingScorer, "fine", "boom", "also fine")
            .unwrap_err();
        assert_eq!(
            err,
            ScoreError::TaskPanicked {
                variant: Variant::Conf,
                query: "boom".to_string(),
                message: "scorer exploded".to_string(),
            }
        );
    }
}
