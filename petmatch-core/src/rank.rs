use crate::compare::{try_score_pair, ScoreError};
use crate::features::ImageDescriptor;
use serde::Serialize;
use std::cmp::Ordering;

/// A candidate that passed the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch<I> {
    pub id: I,
    pub score: f64,
}

/// Result of scoring one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Scored(f64),
    Skipped(ScoreError),
}

impl From<Result<f64, ScoreError>> for CandidateOutcome {
    fn from(result: Result<f64, ScoreError>) -> Self {
        match result {
            Ok(score) => CandidateOutcome::Scored(score),
            Err(e) => CandidateOutcome::Skipped(e),
        }
    }
}

/// Counts from one ranking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RankSummary {
    pub scored: usize,
    pub skipped: usize,
    pub returned: usize,
}

/// Order by descending score, then ascending id
fn by_score_then_id<I: Ord>(a: &ScoredMatch<I>, b: &ScoredMatch<I>) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

/// Filter, sort and truncate pre-computed outcomes.
///
/// Skipped candidates never reach the output. Ties keep a stable order by id.
pub fn select_top<I, It>(outcomes: It, threshold: f64, limit: usize) -> (Vec<ScoredMatch<I>>, RankSummary)
where
    I: Ord + std::fmt::Debug,
    It: IntoIterator<Item = (I, CandidateOutcome)>,
{
    let mut summary = RankSummary::default();
    let mut kept = Vec::new();

    for (id, outcome) in outcomes {
        match outcome {
            CandidateOutcome::Scored(score) => {
                summary.scored += 1;
                if score >= threshold {
                    kept.push(ScoredMatch { id, score });
                }
            }
            CandidateOutcome::Skipped(reason) => {
                summary.skipped += 1;
                log::warn!("Skipping candidate {:?}: {}", id, reason);
            }
        }
    }

    kept.sort_by(by_score_then_id);
    kept.truncate(limit);
    summary.returned = kept.len();

    (kept, summary)
}

/// Score every candidate descriptor against the query and return the best
/// matches at or above `threshold`, at most `limit` of them.
pub fn rank_candidates<'a, I, It>(
    query: &ImageDescriptor,
    candidates: It,
    threshold: f64,
    limit: usize,
) -> Vec<ScoredMatch<I>>
where
    I: Ord + std::fmt::Debug,
    It: IntoIterator<Item = (I, &'a ImageDescriptor)>,
{
    rank_candidates_with_summary(query, candidates, threshold, limit).0
}

/// Same as [`rank_candidates`] but also reports how many candidates were
/// scored and skipped
pub fn rank_candidates_with_summary<'a, I, It>(
    query: &ImageDescriptor,
    candidates: It,
    threshold: f64,
    limit: usize,
) -> (Vec<ScoredMatch<I>>, RankSummary)
where
    I: Ord + std::fmt::Debug,
    It: IntoIterator<Item = (I, &'a ImageDescriptor)>,
{
    let outcomes = candidates.into_iter().map(|(id, descriptor)| {
        let outcome = CandidateOutcome::from(try_score_pair(query, descriptor));
        (id, outcome)
    });

    let (matches, summary) = select_top(outcomes, threshold, limit);
    log::debug!(
        "Ranked {} candidates ({} skipped), returning {}",
        summary.scored,
        summary.skipped,
        summary.returned
    );
    (matches, summary)
}

/// Find the single best match above threshold
pub fn find_best_match<'a, I, It>(
    query: &ImageDescriptor,
    candidates: It,
    threshold: f64,
) -> Option<ScoredMatch<I>>
where
    I: Ord + std::fmt::Debug,
    It: IntoIterator<Item = (I, &'a ImageDescriptor)>,
{
    rank_candidates(query, candidates, threshold, 1).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_features;
    use crate::metadata::ImageMetadata;

    fn scored(items: &[(u32, f64)]) -> Vec<(u32, CandidateOutcome)> {
        items
            .iter()
            .map(|&(id, score)| (id, CandidateOutcome::Scored(score)))
            .collect()
    }

    #[test]
    fn test_threshold_filter() {
        let (matches, summary) = select_top(scored(&[(1, 0.9), (2, 0.5), (3, 0.2)]), 0.6, 10);

        assert_eq!(matches, vec![ScoredMatch { id: 1, score: 0.9 }]);
        assert_eq!(summary.scored, 3);
        assert_eq!(summary.returned, 1);
    }

    #[test]
    fn test_threshold_inclusive() {
        let (matches, _) = select_top(scored(&[(1, 0.7), (2, 0.69)]), 0.7, 10);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, 1);
    }

    #[test]
    fn test_limit_truncation() {
        let items: Vec<(u32, f64)> = (0..10).map(|i| (i, 0.8 + i as f64 * 0.01)).collect();
        let (matches, _) = select_top(scored(&items), 0.5, 3);

        let ids: Vec<u32> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![9, 8, 7]);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let (matches, _) = select_top(scored(&[(3, 0.8), (1, 0.8), (2, 0.9)]), 0.0, 10);
        let ids: Vec<u32> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_skipped_candidate_excluded() {
        let outcomes = vec![
            (1, CandidateOutcome::Scored(0.9)),
            (2, CandidateOutcome::Skipped(ScoreError::NonFiniteDescriptor)),
            (3, CandidateOutcome::Scored(0.8)),
        ];
        let (matches, summary) = select_top(outcomes, 0.0, 10);

        let ids: Vec<u32> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_rank_tolerates_broken_descriptor() {
        let query = extract_features(&ImageMetadata::new(200, 150, 3));
        let first = extract_features(&ImageMetadata::new(200, 150, 3));
        let mut broken = extract_features(&ImageMetadata::new(210, 150, 3));
        broken.texture_features[1] = f64::NAN;
        let third = extract_features(&ImageMetadata::new(400, 300, 3));

        let candidates = vec![("a", &first), ("b", &broken), ("c", &third)];
        let (matches, summary) = rank_candidates_with_summary(&query, candidates, 0.0, 10);

        let ids: Vec<&str> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(summary.skipped, 1);
        assert!((matches[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_candidates() {
        let query = extract_features(&ImageMetadata::new(200, 150, 3));
        let candidates: Vec<(u32, &ImageDescriptor)> = Vec::new();
        assert!(rank_candidates(&query, candidates, 0.0, 10).is_empty());
    }

    #[test]
    fn test_zero_limit() {
        let (matches, summary) = select_top(scored(&[(1, 0.9)]), 0.0, 0);
        assert!(matches.is_empty());
        assert_eq!(summary.scored, 1);
    }

    #[test]
    fn test_find_best_match() {
        let query = extract_features(&ImageMetadata::new(640, 480, 3));
        let exact = extract_features(&ImageMetadata::new(640, 480, 3));
        let other = extract_features(&ImageMetadata::new(100, 900, 1));

        let best = find_best_match(&query, vec![(1, &other), (2, &exact)], 0.5).unwrap();
        assert_eq!(best.id, 2);

        assert!(find_best_match(&query, vec![(1, &other)], 1.1).is_none());
    }
}
