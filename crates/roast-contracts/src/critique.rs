use serde::{Deserialize, Deserializer, Serialize};

/// Display emphasis for a single finding. Carries no other meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Bad,
    Nitpick,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Bad, Severity::Nitpick];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Bad => "bad",
            Severity::Nitpick => "nitpick",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub content: String,
    pub severity: Severity,
}

/// The validated answer for one screenshot.
///
/// `score` is advisory: values outside 0..=100 are kept as returned.
/// `sections` keeps the order the model produced, which is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: i64,
    #[serde(rename = "oneLiner")]
    pub one_liner: String,
    pub sections: Vec<Finding>,
    pub verdict: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Good,
    Meh,
    Trash,
}

impl ScoreTier {
    pub fn for_score(score: i64) -> Self {
        if score > 80 {
            ScoreTier::Good
        } else if score > 50 {
            ScoreTier::Meh
        } else {
            ScoreTier::Trash
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreTier::Good => "good",
            ScoreTier::Meh => "meh",
            ScoreTier::Trash => "trash",
        }
    }
}

impl Critique {
    pub fn tier(&self) -> ScoreTier {
        ScoreTier::for_score(self.score)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.sections
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }
}

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

// Models declared with a NUMBER score occasionally answer `42.0`.
fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    // `as` saturates, so anything outside i64 is refused rather than pinned.
    match number.as_f64().map(f64::round) {
        Some(value) if value >= -(I64_BOUND) && value < I64_BOUND => Ok(value as i64),
        _ => Err(serde::de::Error::custom(format!(
            "score is not a representable integer: {number}"
        ))),
    }
}
