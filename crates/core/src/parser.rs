//! Recipe text segmentation.
//!
//! Turns the raw text recognised from a recipe photo into a [`ParsedRecipe`] with a title, an
//! ingredient list and preparation steps. Recognised text is noisy, mixes Estonian and English,
//! and is labelled inconsistently, so segmentation is a best-effort heuristic keyed on a small
//! set of section labels at the start of a line:
//!
//! | Field        | Labels                              |
//! |--------------|-------------------------------------|
//! | title        | `nimi`, `title`                     |
//! | ingredients  | `koostisosad`, `ingredients`        |
//! | steps        | `valmistamine`, `steps`, `juhend`   |
//!
//! Labels are matched case-insensitively and may be followed by one of `:`, `=` or `-`. The
//! separator is optional, so a line such as `Stepsize 3` counts as a steps label whose value is
//! `ize 3`.
//!
//! Parsing runs in two passes. The first pass locates every ingredients/steps label line in a
//! single scan; the second slices the text between the located boundaries. The input is never
//! modified, and parsing never fails: text without labels simply yields empty sections.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::FALLBACK_TITLE;

/// Longest title taken from the first line when no title label is present.
pub const MAX_FALLBACK_TITLE_CHARS: usize = 80;

/// A labelled title line. The label may be indented; the value is the rest of the line.
///
/// Whitespace around the label never crosses a line break (`[\s&&[^\n]]`), so a label with
/// nothing after it yields an empty title instead of the next line.
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[\s&&[^\n]]*(?:nimi|title)[\s&&[^\n]]*[:=-]?[\s&&[^\n]]*([^\n]*)").unwrap()
});

/// Ingredients and steps labels, which must start in the first column.
static SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(?:(koostisosad|ingredients)|(valmistamine|steps|juhend))[\s&&[^\n]]*[:=-]?")
        .unwrap()
});

/// Adjacent `\n` characters only; `\r\n\r\n` and whitespace-only lines are left alone.
static NEWLINE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());

/// Structured fields extracted from one recipe text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecipe {
    pub title: String,
    pub ingredients: String,
    pub steps: String,
}

impl ParsedRecipe {
    /// The title, or `"Retsept"` when none could be extracted.
    pub fn title_or_fallback(&self) -> &str {
        if self.title.is_empty() {
            FALLBACK_TITLE
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Ingredients,
    Steps,
}

/// A section label found by the first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionLabel {
    kind: SectionKind,
    /// Byte offset of the start of the label line.
    line_start: usize,
    /// Byte offset just past the label and its optional separator.
    value_start: usize,
}

/// Splits recognised recipe text into title, ingredients and steps.
///
/// # Arguments
///
/// * `text` - Raw text, typically one recognised fragment per line.
///
/// # Returns
///
/// A [`ParsedRecipe`]. Every field may be empty; the function never fails.
///
/// # Example
///
/// ```
/// let recipe = techcard_core::parser::parse(
///     "Title: Pancakes\nKoostisosad:\nFlour\nMilk\nValmistamine:\nMix\nFry",
/// );
/// assert_eq!(recipe.title, "Pancakes");
/// assert_eq!(recipe.ingredients, "Flour\nMilk");
/// assert_eq!(recipe.steps, "Mix\nFry");
/// ```
pub fn parse(text: &str) -> ParsedRecipe {
    let labels = locate_section_labels(text);

    ParsedRecipe {
        title: extract_title(text),
        ingredients: normalize(ingredients_block(text, &labels)),
        steps: normalize(steps_block(text, &labels)),
    }
}

fn extract_title(text: &str) -> String {
    if let Some(caps) = TITLE_RE.captures(text) {
        // A labelled title wins even when its value is blank.
        return caps
            .get(1)
            .map_or("", |m| m.as_str())
            .trim()
            .to_string();
    }

    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_FALLBACK_TITLE_CHARS).collect())
        .unwrap_or_default()
}

fn locate_section_labels(text: &str) -> Vec<SectionLabel> {
    SECTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = if caps.get(1).is_some() {
                SectionKind::Ingredients
            } else {
                SectionKind::Steps
            };
            Some(SectionLabel {
                kind,
                line_start: whole.start(),
                value_start: whole.end(),
            })
        })
        .collect()
}

/// From the first ingredients label to the first steps label on a later line, or to the end
/// of the text when there is none.
fn ingredients_block<'a>(text: &'a str, labels: &[SectionLabel]) -> &'a str {
    let Some(start) = labels
        .iter()
        .find(|l| l.kind == SectionKind::Ingredients)
    else {
        return "";
    };

    let end = labels
        .iter()
        .find(|l| l.kind == SectionKind::Steps && l.line_start > start.line_start)
        .map_or(text.len(), |l| l.line_start);

    &text[start.value_start..end]
}

/// From the first steps label to the end of the text.
fn steps_block<'a>(text: &'a str, labels: &[SectionLabel]) -> &'a str {
    labels
        .iter()
        .find(|l| l.kind == SectionKind::Steps)
        .map_or("", |l| &text[l.value_start..])
}

fn normalize(block: &str) -> String {
    NEWLINE_RUN_RE.replace_all(block, "\n").trim().to_string()
}
