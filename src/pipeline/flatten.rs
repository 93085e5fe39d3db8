//! Flattening: [`RubricResult`] → export columns plus a one-line review.
//!
//! Pure and deterministic; the same rubric always yields the same fields in
//! the same order.

use crate::rubric::RubricResult;

/// Columns derived from a rubric, in export order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    /// `"<Label> Score"` / `"<Label> Notes"` for each category, then
    /// `Total Score` and `Average Score` when any score is present.
    pub fields: Vec<(String, String)>,
    /// `"<Label>: <notes>"` for each category with non-empty notes, joined by `" | "`.
    pub summary: String,
    /// Sum of present scores.
    pub total: Option<u32>,
}

/// Flatten a rubric into export columns.
pub fn flatten(rubric: &RubricResult) -> Flattened {
    let mut fields = Vec::with_capacity(2 * 9 + 2);
    let mut snippets = Vec::new();
    let mut total = 0u32;
    let mut count = 0u32;

    for (category, entry) in rubric.iter() {
        let label = category.label();

        let score = match entry.score {
            Some(s) => {
                total += u32::from(s);
                count += 1;
                s.to_string()
            }
            None => String::new(),
        };
        let notes = entry.notes.clone().unwrap_or_default();

        if !notes.is_empty() {
            snippets.push(format!("{label}: {notes}"));
        }

        fields.push((format!("{label} Score"), score));
        fields.push((format!("{label} Notes"), notes));
    }

    let total = (count > 0).then(|| {
        fields.push(("Total Score".to_string(), total.to_string()));
        fields.push(("Average Score".to_string(), format_average(total, count)));
        total
    });

    Flattened {
        fields,
        summary: snippets.join(" | "),
        total,
    }
}

/// `total / count` with exactly two decimals, ties rounded away from zero.
///
/// Integer arithmetic avoids binary float artefacts (`1/8` is `0.13`, not `0.12`).
pub fn format_average(total: u32, count: u32) -> String {
    if count == 0 {
        return String::new();
    }
    let (total, count) = (u64::from(total), u64::from(count));
    let hundredths = (total * 200 + count) / (2 * count);
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}
