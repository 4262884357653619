use crate::rank::{RankSummary, ScoredMatch};
use serde::Serialize;

/// Round a score to two decimal places for display
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// One ranked hit as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub id: String,
    pub score: f64,
}

impl From<ScoredMatch<String>> for SimilarityResult {
    fn from(m: ScoredMatch<String>) -> Self {
        Self {
            id: m.id,
            score: round_score(m.score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub threshold: f64,
    pub limit: usize,
    pub count: usize,
    /// Candidates that failed scoring and were left out
    pub skipped: usize,
    pub results: Vec<SimilarityResult>,
}

impl SearchResponse {
    pub fn new(
        matches: Vec<ScoredMatch<String>>,
        summary: RankSummary,
        threshold: f64,
        limit: usize,
    ) -> Self {
        let results: Vec<SimilarityResult> = matches.into_iter().map(Into::into).collect();
        Self {
            threshold,
            limit,
            count: results.len(),
            skipped: summary.skipped,
            results,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.876), 0.88);
        assert_eq!(round_score(0.5), 0.5);
        assert_eq!(round_score(1.0), 1.0);
    }

    #[test]
    fn test_json_shape() {
        let matches = vec![
            ScoredMatch { id: "pet_3".to_string(), score: 0.91234 },
            ScoredMatch { id: "pet_1".to_string(), score: 0.7049 },
        ];
        let summary = RankSummary { scored: 4, skipped: 1, returned: 2 };
        let response = SearchResponse::new(matches, summary, 0.7, 10);

        let value: serde_json::Value = serde_json::from_str(&response.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["skipped"], 1);
        assert_eq!(value["results"][0]["id"], "pet_3");
        assert_eq!(value["results"][0]["score"], 0.91);
        assert_eq!(value["results"][1]["score"], 0.7);
    }

    #[test]
    fn test_empty_response() {
        let response = SearchResponse::new(Vec::new(), RankSummary::default(), 0.7, 10);
        assert!(response.is_empty());
        assert_eq!(response.count, 0);
    }
}
