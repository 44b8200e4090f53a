//! # Item & Classification model
//!
//! - `Item` is what the caller hands us: an opaque id plus channel/title metadata.
//! - `Classification` is the normalized label set (factuality, political leaning,
//!   editorial bias) together with its rendered `text`/`tooltip`.
//!
//! The rendered strings are never set directly: they are derived from the enum
//! fields, the optional per-dimension confidence, and the failure marker.
//! Every label parser is lenient; anything unrecognized becomes `Unknown`.

use serde::{Deserialize, Serialize};

/// Short text rendered for a failure-shaped classification.
pub const FAILED_TEXT: &str = "AI Failed";

/// A single content entity. Identity is `id` only; `channel` and `title` may
/// change between observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(alias = "source")]
    pub channel: String,
    #[serde(default)]
    pub title: String,
}

impl Item {
    pub fn new(id: impl Into<String>, channel: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            title: title.into(),
        }
    }

    /// Short anonymized digest of the title, safe for logs.
    pub fn title_digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.title.as_bytes());
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

/// Lowercase, trim, map `_` to space and collapse whitespace.
/// Dashes and slashes are kept so composite labels stay recognizable.
pub(crate) fn normalize_label(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accepts any JSON value; only strings can carry a label.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientLabel {
    Text(String),
    Other(serde_json::Value),
}

impl LenientLabel {
    fn text(&self) -> &str {
        match self {
            LenientLabel::Text(s) => s,
            LenientLabel::Other(_) => "",
        }
    }
}

/* ----------------------------
Factuality
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "LenientLabel", into = "&'static str")]
pub enum Factuality {
    High,
    Mixed,
    Low,
    #[default]
    Unknown,
}

impl Factuality {
    pub fn parse(raw: &str) -> Self {
        match normalize_label(raw).as_str() {
            "high" | "very high" | "high factuality" | "mostly factual" => Self::High,
            "mixed" | "mixed factuality" => Self::Mixed,
            "low" | "very low" | "low factuality" => Self::Low,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Mixed => "Mixed",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Mixed => "M",
            Self::Low => "L",
            Self::Unknown => "?",
        }
    }
}

impl From<LenientLabel> for Factuality {
    fn from(raw: LenientLabel) -> Self {
        Self::parse(raw.text())
    }
}

impl From<Factuality> for &'static str {
    fn from(v: Factuality) -> Self {
        v.as_str()
    }
}

/* ----------------------------
Political leaning
---------------------------- */

/// `Center` and `Political` extend the basic Left/Right/Non-Political set:
/// catalogs rate outlets as "Center", inference only says "Political".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "LenientLabel", into = "&'static str")]
pub enum PoliticalLeaning {
    Left,
    Right,
    Center,
    Political,
    NonPolitical,
    #[default]
    Unknown,
}

impl PoliticalLeaning {
    pub fn parse(raw: &str) -> Self {
        match normalize_label(raw).as_str() {
            "left" | "lean left" | "left-center" | "left center" | "far left" => Self::Left,
            "right" | "lean right" | "right-center" | "right center" | "far right" => Self::Right,
            "center" | "centre" | "least biased" => Self::Center,
            "political" => Self::Political,
            "non-political" | "non political" | "nonpolitical" | "apolitical" => {
                Self::NonPolitical
            }
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Center => "Center",
            Self::Political => "Political",
            Self::NonPolitical => "Non-Political",
            Self::Unknown => "Unknown",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
            Self::Center => "C",
            Self::Political => "P",
            Self::NonPolitical => "N",
            Self::Unknown => "?",
        }
    }
}

impl From<LenientLabel> for PoliticalLeaning {
    fn from(raw: LenientLabel) -> Self {
        Self::parse(raw.text())
    }
}

impl From<PoliticalLeaning> for &'static str {
    fn from(v: PoliticalLeaning) -> Self {
        v.as_str()
    }
}

/* ----------------------------
Editorial bias
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "LenientLabel", into = "&'static str")]
pub enum EditorialBias {
    News,
    Opinion,
    Educational,
    Conspiracy,
    Entertainment,
    #[default]
    Unknown,
}

impl EditorialBias {
    pub fn parse(raw: &str) -> Self {
        match normalize_label(raw).as_str() {
            "news" => Self::News,
            "opinion" | "commentary" | "opinion/commentary" => Self::Opinion,
            "educational" | "instructional" | "educational/instructional" => Self::Educational,
            "conspiracy" | "pseudoscience" | "conspiracy/pseudoscience" => Self::Conspiracy,
            "entertainment" => Self::Entertainment,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "News",
            Self::Opinion => "Opinion",
            Self::Educational => "Educational",
            Self::Conspiracy => "Conspiracy",
            Self::Entertainment => "Entertainment",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<LenientLabel> for EditorialBias {
    fn from(raw: LenientLabel) -> Self {
        Self::parse(raw.text())
    }
}

impl From<EditorialBias> for &'static str {
    fn from(v: EditorialBias) -> Self {
        v.as_str()
    }
}

/* ----------------------------
Classification
---------------------------- */

/// Confidence of the label that decided each dimension (0.0..=1.0), when known.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factuality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub political_leaning: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editorial_bias: Option<f32>,
}

impl LabelScores {
    pub fn is_empty(&self) -> bool {
        self.factuality.is_none() && self.political_leaning.is_none() && self.editorial_bias.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClassificationRecord")]
pub struct Classification {
    factuality: Factuality,
    political_leaning: PoliticalLeaning,
    editorial_bias: EditorialBias,
    #[serde(skip_serializing_if = "LabelScores::is_empty")]
    scores: LabelScores,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    text: String,
    tooltip: String,
}

/// Wire shape accepted from catalogs and the cache. Stored `text`/`tooltip`
/// are ignored and re-rendered.
#[derive(Deserialize)]
struct ClassificationRecord {
    #[serde(default)]
    factuality: Factuality,
    #[serde(default, alias = "politicalLeaning", alias = "politicalness")]
    political_leaning: PoliticalLeaning,
    #[serde(default, alias = "editorialBias")]
    editorial_bias: EditorialBias,
    #[serde(default)]
    scores: LabelScores,
    #[serde(default)]
    failure: Option<String>,
}

impl From<ClassificationRecord> for Classification {
    fn from(r: ClassificationRecord) -> Self {
        let mut c = Self {
            factuality: r.factuality,
            political_leaning: r.political_leaning,
            editorial_bias: r.editorial_bias,
            scores: r.scores,
            failure: r.failure,
            text: String::new(),
            tooltip: String::new(),
        };
        c.render();
        c
    }
}

impl Classification {
    pub fn new(
        factuality: Factuality,
        political_leaning: PoliticalLeaning,
        editorial_bias: EditorialBias,
    ) -> Self {
        Self::with_scores(
            factuality,
            political_leaning,
            editorial_bias,
            LabelScores::default(),
        )
    }

    pub fn with_scores(
        factuality: Factuality,
        political_leaning: PoliticalLeaning,
        editorial_bias: EditorialBias,
        scores: LabelScores,
    ) -> Self {
        ClassificationRecord {
            factuality,
            political_leaning,
            editorial_bias,
            scores,
            failure: None,
        }
        .into()
    }

    /// Failure-shaped value: every dimension `Unknown`, text `"AI Failed"`.
    pub fn failed(reason: impl Into<String>) -> Self {
        ClassificationRecord {
            factuality: Factuality::Unknown,
            political_leaning: PoliticalLeaning::Unknown,
            editorial_bias: EditorialBias::Unknown,
            scores: LabelScores::default(),
            failure: Some(reason.into()),
        }
        .into()
    }

    pub fn factuality(&self) -> Factuality {
        self.factuality
    }

    pub fn political_leaning(&self) -> PoliticalLeaning {
        self.political_leaning
    }

    pub fn editorial_bias(&self) -> EditorialBias {
        self.editorial_bias
    }

    pub fn scores(&self) -> LabelScores {
        self.scores
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn display_text(&self) -> &str {
        &self.text
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    fn render(&mut self) {
        if let Some(reason) = &self.failure {
            self.text = FAILED_TEXT.to_string();
            self.tooltip = format!("AI analysis could not be completed ({reason}).");
            return;
        }

        let mut text = format!(
            "{} · {}",
            self.political_leaning.code(),
            self.factuality.code()
        );
        if self.editorial_bias != EditorialBias::Unknown {
            text.push_str(" · ");
            text.push_str(self.editorial_bias.as_str());
        }
        self.text = text;

        self.tooltip = [
            ("Political Leaning", self.political_leaning.as_str(), self.scores.political_leaning),
            ("Factuality", self.factuality.as_str(), self.scores.factuality),
            ("Editorial Bias", self.editorial_bias.as_str(), self.scores.editorial_bias),
        ]
        .iter()
        .map(|(name, value, score)| match score {
            Some(s) => format!("{name}: {value} ({:.2}%)", s * 100.0),
            None => format!("{name}: {value}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    }
}
