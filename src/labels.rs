//! Ordered priority tables that turn a ranked free-text label list into a
//! `Classification`.
//!
//! For every dimension the first variant in `order` that is present in the
//! label set wins, regardless of how the endpoint ranked the labels. A label
//! is present when its score (if any) reaches `min_score`.

use serde::Deserialize;

use crate::model::{Classification, EditorialBias, Factuality, LabelScores, PoliticalLeaning};

/// One label returned by the inference endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredLabel {
    pub label: String,
    #[serde(default)]
    pub score: Option<f32>,
}

impl ScoredLabel {
    pub fn new(label: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

pub struct PriorityTable<T: 'static> {
    pub order: &'static [T],
    pub fallback: T,
    parse: fn(&str) -> T,
}

impl<T: Copy + PartialEq> PriorityTable<T> {
    /// First-match-wins pick; returns the winning value and its label score.
    pub fn pick(&self, labels: &[ScoredLabel], min_score: f32) -> (T, Option<f32>) {
        for wanted in self.order {
            let hit = labels
                .iter()
                .filter(|l| l.score.map_or(true, |s| s >= min_score))
                .find(|l| (self.parse)(&l.label) == *wanted);
            if let Some(l) = hit {
                return (*wanted, l.score);
            }
        }
        (self.fallback, None)
    }
}

pub const FACTUALITY_PRIORITY: PriorityTable<Factuality> = PriorityTable {
    order: &[Factuality::High, Factuality::Mixed, Factuality::Low],
    fallback: Factuality::Low,
    parse: Factuality::parse,
};

pub const LEANING_PRIORITY: PriorityTable<PoliticalLeaning> = PriorityTable {
    order: &[
        PoliticalLeaning::Left,
        PoliticalLeaning::Right,
        PoliticalLeaning::Center,
        PoliticalLeaning::Political,
        PoliticalLeaning::NonPolitical,
    ],
    fallback: PoliticalLeaning::Unknown,
    parse: PoliticalLeaning::parse,
};

pub const BIAS_PRIORITY: PriorityTable<EditorialBias> = PriorityTable {
    order: &[
        EditorialBias::News,
        EditorialBias::Opinion,
        EditorialBias::Educational,
        EditorialBias::Conspiracy,
    ],
    fallback: EditorialBias::Entertainment,
    parse: EditorialBias::parse,
};

/// Normalize a label set into a `Classification` using the fixed tables above.
pub fn classify_labels(labels: &[ScoredLabel], min_score: f32) -> Classification {
    let (factuality, f_score) = FACTUALITY_PRIORITY.pick(labels, min_score);
    let (leaning, l_score) = LEANING_PRIORITY.pick(labels, min_score);
    let (bias, b_score) = BIAS_PRIORITY.pick(labels, min_score);
    Classification::with_scores(
        factuality,
        leaning,
        bias,
        LabelScores {
            factuality: f_score,
            political_leaning: l_score,
            editorial_bias: b_score,
        },
    )
}
