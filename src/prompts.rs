//! Prompt text sent to the vision model.
//!
//! All prompt wording lives here so it can be inspected by tests and changed
//! without touching the HTTP client.

use crate::rubric::Category;

/// Reviewer instruction, including the exact JSON shape expected back.
pub const RUBRIC_INSTRUCTION: &str = r#"You are a senior graphic design reviewer. Score the provided graphic 0-10 (integer) in each category. Consider these specific "Don'ts" and penalize when present. If a category is not applicable, still return a score.
Return strictly JSON with this shape:
{
  "compositionLayout": {"score": 0, "notes": ""},
  "colourUsage": {"score": 0, "notes": ""},
  "typography": {"score": 0, "notes": ""},
  "visualHierarchy": {"score": 0, "notes": ""},
  "creativity": {"score": 0, "notes": ""},
  "technicalExecution": {"score": 0, "notes": ""},
  "briefAlignment": {"score": 0, "notes": ""},
  "accessibility": {"score": 0, "notes": ""},
  "overallClarity": {"score": 0, "notes": ""}
}"#;

/// Build the text part of the scoring request.
///
/// The brief line is omitted entirely when `brief` is blank.
pub fn rubric_prompt(brief: &str) -> String {
    let mut lines = vec![RUBRIC_INSTRUCTION.to_string(), "\nCategories and Don'ts:".to_string()];
    lines.extend(
        Category::ALL
            .iter()
            .map(|c| format!("- {}: {}", c.label(), c.donts())),
    );

    let brief = brief.trim();
    if !brief.is_empty() {
        lines.push(format!("\nDesign brief/context: {brief}"));
    }
    lines.join("\n")
}
