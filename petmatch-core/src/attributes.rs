use crate::compare::{try_score_pair, ScoreError};
use crate::features::ImageDescriptor;
use crate::rank::{select_top, CandidateOutcome, RankSummary, ScoredMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const BREED_EXACT: f64 = 0.30;
pub const BREED_MIXED: f64 = 0.15;
pub const COLOR_EXACT: f64 = 0.25;
pub const COLOR_PARTIAL: f64 = 0.15;
pub const SIZE_EXACT: f64 = 0.20;
pub const SIZE_ADJACENT: f64 = 0.10;
pub const AGE_EXACT: f64 = 0.15;
pub const AGE_WITHIN_ONE: f64 = 0.10;
pub const AGE_WITHIN_THREE: f64 = 0.05;
pub const GENDER_EXACT: f64 = 0.10;
pub const IMAGE_WEIGHT: f64 = 0.30;

const MIXED_BREED_MARKER: &str = "mixed breed";

/// Stored values are read case-insensitively, the same way as CLI input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Size {
    Small,
    Medium,
    Large,
    /// Any value outside the known scale
    Unknown,
}

impl Size {
    /// Position on the small..large scale
    pub fn ordinal(self) -> Option<u8> {
        match self {
            Size::Small => Some(0),
            Size::Medium => Some(1),
            Size::Large => Some(2),
            Size::Unknown => None,
        }
    }
}

impl FromStr for Size {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "small" => Size::Small,
            "medium" => Size::Medium,
            "large" => Size::Large,
            _ => Size::Unknown,
        })
    }
}

impl From<String> for Size {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(size) => size,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
            Size::Unknown => "unknown",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetStatus {
    #[default]
    Lost,
    Found,
    Reunited,
}

impl FromStr for PetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lost" => Ok(PetStatus::Lost),
            "found" => Ok(PetStatus::Found),
            "reunited" => Ok(PetStatus::Reunited),
            other => Err(format!("unknown pet status: {}", other)),
        }
    }
}

impl fmt::Display for PetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PetStatus::Lost => "lost",
            PetStatus::Found => "found",
            PetStatus::Reunited => "reunited",
        };
        f.pad(name)
    }
}

/// A lost or found pet report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetRecord {
    pub id: String,
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub color: Option<String>,
    pub size: Option<Size>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    #[serde(default)]
    pub status: PetStatus,
    pub description: Option<String>,
    /// Persisted separately by the store, never inlined in the record file
    #[serde(skip)]
    pub image_features: Option<ImageDescriptor>,
    pub created_at: DateTime<Utc>,
}

impl PetRecord {
    /// Empty record with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            species: None,
            breed: None,
            color: None,
            size: None,
            age: None,
            gender: None,
            status: PetStatus::default(),
            description: None,
            image_features: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-factor contributions to an attribute score. `None` means the factor
/// was not comparable because one side lacked it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeBreakdown {
    pub breed: Option<f64>,
    pub color: Option<f64>,
    pub size: Option<f64>,
    pub age: Option<f64>,
    pub gender: Option<f64>,
    pub image: Option<f64>,
}

impl AttributeBreakdown {
    /// True if at least one factor was present on both sides
    pub fn any_comparable(&self) -> bool {
        self.factors().iter().any(|(_, v)| v.is_some())
    }

    /// Sum of contributions capped at 1, or 0 when nothing was comparable
    pub fn total(&self) -> f64 {
        if !self.any_comparable() {
            return 0.0;
        }
        let sum: f64 = self.factors().iter().filter_map(|(_, v)| *v).sum();
        sum.min(1.0)
    }

    pub fn factors(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("breed", self.breed),
            ("color", self.color),
            ("size", self.size),
            ("age", self.age),
            ("gender", self.gender),
            ("image", self.image),
        ]
    }
}

/// Non-empty text value
fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn breed_score(a: &str, b: &str) -> f64 {
    if a == b {
        BREED_EXACT
    } else if a.to_lowercase().contains(MIXED_BREED_MARKER)
        && b.to_lowercase().contains(MIXED_BREED_MARKER)
    {
        BREED_MIXED
    } else {
        0.0
    }
}

fn color_score(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        COLOR_EXACT
    } else if a.contains(&b) || b.contains(&a) {
        COLOR_PARTIAL
    } else {
        0.0
    }
}

fn size_score(a: Size, b: Size) -> f64 {
    match (a.ordinal(), b.ordinal()) {
        (Some(x), Some(y)) => match x.abs_diff(y) {
            0 => SIZE_EXACT,
            1 => SIZE_ADJACENT,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

fn age_score(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if diff == 0.0 {
        AGE_EXACT
    } else if diff <= 1.0 {
        AGE_WITHIN_ONE
    } else if diff <= 3.0 {
        AGE_WITHIN_THREE
    } else {
        0.0
    }
}

/// Per-factor comparison of two records, failing only if the image
/// descriptors cannot be scored
pub fn attribute_breakdown(a: &PetRecord, b: &PetRecord) -> Result<AttributeBreakdown, ScoreError> {
    let mut breakdown = AttributeBreakdown::default();

    if let (Some(x), Some(y)) = (populated(&a.breed), populated(&b.breed)) {
        breakdown.breed = Some(breed_score(x, y));
    }
    if let (Some(x), Some(y)) = (populated(&a.color), populated(&b.color)) {
        breakdown.color = Some(color_score(x, y));
    }
    if let (Some(x), Some(y)) = (a.size, b.size) {
        breakdown.size = Some(size_score(x, y));
    }
    if let (Some(x), Some(y)) = (a.age, b.age) {
        breakdown.age = Some(age_score(x, y));
    }
    if let (Some(x), Some(y)) = (populated(&a.gender), populated(&b.gender)) {
        breakdown.gender = Some(if x == y { GENDER_EXACT } else { 0.0 });
    }
    if let (Some(x), Some(y)) = (&a.image_features, &b.image_features) {
        breakdown.image = Some(IMAGE_WEIGHT * try_score_pair(x, y)?);
    }

    Ok(breakdown)
}

/// Additive attribute similarity in [0, 1]. Errors when any factor cannot
/// be computed.
pub fn try_score_attributes(a: &PetRecord, b: &PetRecord) -> Result<f64, ScoreError> {
    let total = attribute_breakdown(a, b)?.total();
    if !total.is_finite() {
        return Err(ScoreError::NonFiniteScore(total));
    }
    Ok(total)
}

/// Additive attribute similarity; any internal failure scores the pair 0
pub fn score_attributes(a: &PetRecord, b: &PetRecord) -> f64 {
    try_score_attributes(a, b).unwrap_or_else(|e| {
        log::warn!("Scoring {} against {} failed: {}", a.id, b.id, e);
        0.0
    })
}

/// Rank stored records by attribute similarity to `query`, skipping the
/// query record itself
pub fn rank_records<'a, It>(
    query: &PetRecord,
    candidates: It,
    threshold: f64,
    limit: usize,
) -> (Vec<ScoredMatch<String>>, RankSummary)
where
    It: IntoIterator<Item = &'a PetRecord>,
{
    let outcomes = candidates
        .into_iter()
        .filter(|candidate| candidate.id != query.id)
        .map(|candidate| {
            let outcome = CandidateOutcome::from(try_score_attributes(query, candidate));
            (candidate.id.clone(), outcome)
        });

    let (matches, summary) = select_top(outcomes, threshold, limit);
    log::debug!(
        "Record match for {}: {} scored, {} skipped, {} returned",
        query.id,
        summary.scored,
        summary.skipped,
        summary.returned
    );
    (matches, summary)
}
