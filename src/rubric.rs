//! The 9-category design rubric and its typed result.
//!
//! The scoring service answers with loosely-typed JSON. [`RubricResult::from_json_str`]
//! is the single place where that JSON is validated: everything downstream
//! (flattening, export) works with `Option<u8>` scores and `Option<String>`
//! notes and never touches `serde_json::Value` again.
//!
//! A field can be *absent* (missing key or `null`) or *present but invalid*
//! (a score of `"eight"`, `7.5` or `14`). Both end up as `None`, but the
//! second case is logged so a misbehaving model is visible in the logs.

use crate::error::ScoreError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// One of the 9 fixed design-quality dimensions, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    CompositionLayout,
    ColourUsage,
    Typography,
    VisualHierarchy,
    Creativity,
    TechnicalExecution,
    BriefAlignment,
    Accessibility,
    OverallClarity,
}

impl Category {
    /// All categories in canonical (export) order.
    pub const ALL: [Category; 9] = [
        Category::CompositionLayout,
        Category::ColourUsage,
        Category::Typography,
        Category::VisualHierarchy,
        Category::Creativity,
        Category::TechnicalExecution,
        Category::BriefAlignment,
        Category::Accessibility,
        Category::OverallClarity,
    ];

    /// JSON key used by the scoring service.
    pub fn key(self) -> &'static str {
        match self {
            Category::CompositionLayout => "compositionLayout",
            Category::ColourUsage => "colourUsage",
            Category::Typography => "typography",
            Category::VisualHierarchy => "visualHierarchy",
            Category::Creativity => "creativity",
            Category::TechnicalExecution => "technicalExecution",
            Category::BriefAlignment => "briefAlignment",
            Category::Accessibility => "accessibility",
            Category::OverallClarity => "overallClarity",
        }
    }

    /// Human-readable label used in column names and the review summary.
    pub fn label(self) -> &'static str {
        match self {
            Category::CompositionLayout => "Composition & Layout",
            Category::ColourUsage => "Colour Usage",
            Category::Typography => "Typography",
            Category::VisualHierarchy => "Visual Hierarchy",
            Category::Creativity => "Creativity",
            Category::TechnicalExecution => "Technical Execution",
            Category::BriefAlignment => "Brief Alignment",
            Category::Accessibility => "Accessibility",
            Category::OverallClarity => "Overall Clarity",
        }
    }

    /// Common failure patterns the reviewer is told to penalise.
    pub fn donts(self) -> &'static str {
        match self {
            Category::CompositionLayout => {
                "Crowding, imbalance, no focal point, awkward empty space"
            }
            Category::ColourUsage => {
                "Clashing hues, insufficient contrast, colour overload, off-brand palette"
            }
            Category::Typography => {
                "Too many fonts, illegible sizes, poor kerning/leading, decorative abuse"
            }
            Category::VisualHierarchy => {
                "Competing elements, unclear reading order, equal emphasis on everything"
            }
            Category::Creativity => {
                "Clichéd stock imagery, copy-paste icons, lack of original concept"
            }
            Category::TechnicalExecution => {
                "Pixelation, jagged edges, inconsistent shadows, low-res exports"
            }
            Category::BriefAlignment => {
                "Ignoring the objective, wrong dimensions, missing mandatory logos/text"
            }
            Category::Accessibility => {
                "Tiny text, colour-blind traps, low readability, flashing elements"
            }
            Category::OverallClarity => {
                "Message muddled, too much text, visual noise distracting from intent"
            }
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Score and notes for one category. Both parts may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    /// Integer score 0–10.
    pub score: Option<u8>,
    /// Free-text notes; may be present and empty.
    pub notes: Option<String>,
}

impl CategoryScore {
    pub fn new(score: Option<u8>, notes: Option<&str>) -> Self {
        Self {
            score,
            notes: notes.map(str::to_string),
        }
    }
}

/// Validated rubric returned by the scoring service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RubricResult {
    scores: [CategoryScore; 9],
}

impl RubricResult {
    pub fn get(&self, category: Category) -> &CategoryScore {
        &self.scores[category.index()]
    }

    pub fn set(&mut self, category: Category, score: CategoryScore) {
        self.scores[category.index()] = score;
    }

    /// Builder-style [`RubricResult::set`], handy in tests and fakes.
    pub fn with(mut self, category: Category, score: CategoryScore) -> Self {
        self.set(category, score);
        self
    }

    /// Iterate categories in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryScore)> {
        Category::ALL.iter().map(move |&c| (c, self.get(c)))
    }

    /// Parse the message content returned by the scoring service.
    pub fn from_json_str(content: &str) -> Result<Self, ScoreError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| ScoreError::InvalidRubric(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, ScoreError> {
        let object = value.as_object().ok_or_else(|| {
            ScoreError::InvalidRubric(format!("expected a JSON object, got {}", kind(value)))
        })?;

        let mut result = RubricResult::default();
        for category in Category::ALL {
            result.set(category, parse_category(object, category));
        }
        Ok(result)
    }
}

impl Serialize for RubricResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, score) in self.iter() {
            map.serialize_entry(category.key(), score)?;
        }
        map.end()
    }
}

fn parse_category(object: &Map<String, Value>, category: Category) -> CategoryScore {
    let entry = match object.get(category.key()) {
        None | Some(Value::Null) => return CategoryScore::default(),
        Some(Value::Object(entry)) => entry,
        Some(other) => {
            warn!(
                "Rubric category '{}' is {} instead of an object; ignoring it",
                category.key(),
                kind(other)
            );
            return CategoryScore::default();
        }
    };

    CategoryScore {
        score: parse_score(entry.get("score"), category),
        notes: parse_notes(entry.get("notes"), category),
    }
}

fn parse_score(value: Option<&Value>, category: Category) -> Option<u8> {
    let value = match value {
        None | Some(Value::Null) => return None,
        Some(v) => v,
    };

    let integral = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        _ => None,
    };

    match integral {
        Some(score) if score <= 10 => Some(score as u8),
        _ => {
            warn!(
                "Rubric category '{}' has invalid score {}; treating it as absent",
                category.key(),
                value
            );
            None
        }
    }
}

fn parse_notes(value: Option<&Value>, category: Category) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            warn!(
                "Rubric category '{}' has non-text notes ({}); ignoring them",
                category.key(),
                kind(other)
            );
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
