//! Output types for search results
//!
//! [`MatchResult`] is what the engine produces. [`DisplayLines`] renders
//! results as a text table one line at a time, and [`CharMatch`] is the
//! serializable record used for JSON output.

use serde::{Deserialize, Serialize};

use super::engine::FuzzyUsage;
use super::query::{FuzzyMode, MatchQuery};
use crate::index::CodePointEntry;

/// Column widths of the text table
const CODE_WIDTH: usize = 10;
const CHAR_WIDTH: usize = 3;
const NAME_WIDTH: usize = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

/// One matched code point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub code_point: u32,
    /// The canonical name
    pub display_name: String,
    /// `1.0` for exact matches
    pub score: f64,
    pub match_kind: MatchKind,
}

impl MatchResult {
    pub(crate) fn new(entry: &CodePointEntry, score: f64, match_kind: MatchKind) -> Self {
        Self {
            code_point: entry.code_point,
            display_name: entry.canonical_name.clone(),
            score,
            match_kind,
        }
    }

    /// `U+XXXX`, at least four hex digits
    pub fn code_label(&self) -> String {
        format!("U+{:04X}", self.code_point)
    }

    /// The character, or an empty string for control characters
    pub fn printable_char(&self) -> String {
        match char::from_u32(self.code_point) {
            Some(c) if !c.is_control() => c.to_string(),
            _ => String::new(),
        }
    }

    /// Name followed by the escaped code point, e.g. `SNOWMAN  (\u2603)`
    pub fn annotated_name(&self) -> String {
        format!("{}  (\\u{:04x})", self.display_name, self.code_point)
    }

    /// Exact matches carry no meaningful score
    pub fn is_fuzzy(&self) -> bool {
        self.match_kind == MatchKind::Fuzzy
    }

    /// JSON record; `score` is only present for fuzzy matches
    pub fn to_char_match(&self) -> CharMatch {
        CharMatch {
            code: self.code_label(),
            char: self.printable_char(),
            name: self.annotated_name(),
            score: self.is_fuzzy().then(|| round3(self.score)),
            match_kind: self.match_kind,
        }
    }
}

/// JSON record for one result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharMatch {
    pub code: String,
    pub char: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f64>,
    pub match_kind: MatchKind,
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Header and divider lines of the result table
pub fn format_header(with_score: bool) -> [String; 2] {
    let header = if with_score {
        format!(
            "{:<CODE_WIDTH$} {:<CHAR_WIDTH$} {:<NAME_WIDTH$} SCORE",
            "CODE", "CHAR", "NAME"
        )
    } else {
        format!("{:<CODE_WIDTH$} {:<CHAR_WIDTH$} NAME", "CODE", "CHAR")
    };
    let divider = "-".repeat(header.chars().count());
    [header, divider]
}

/// One table row. With a score column, exact rows leave the cell blank.
pub fn format_row(result: &MatchResult, with_score: bool) -> String {
    let score = if with_score && result.is_fuzzy() {
        format!("{:>6.3}", result.score)
    } else {
        String::new()
    };
    let row = format!(
        "{:<CODE_WIDTH$} {:<CHAR_WIDTH$} {:<NAME_WIDTH$} {}",
        result.code_label(),
        result.printable_char(),
        result.annotated_name(),
        score
    );
    row.trim_end().to_string()
}

/// Lazily formatted table lines: header and divider, then one row per
/// result. Yields nothing at all when there are no results.
///
/// The `SCORE` column is shown when the first result is a fuzzy match, or
/// always when `mixed_kinds` says fuzzy rows may follow exact ones.
#[derive(Debug)]
pub struct DisplayLines<I> {
    results: I,
    mixed_kinds: bool,
    with_score: bool,
    header_emitted: bool,
    pending: Vec<String>,
}

impl<I: Iterator<Item = MatchResult>> DisplayLines<I> {
    pub fn new(results: I, mixed_kinds: bool) -> Self {
        Self {
            results,
            mixed_kinds,
            with_score: mixed_kinds,
            header_emitted: false,
            pending: Vec::new(),
        }
    }
}

impl<I: Iterator<Item = MatchResult>> Iterator for DisplayLines<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(line) = self.pending.pop() {
            return Some(line);
        }
        let result = self.results.next()?;
        if self.header_emitted {
            return Some(format_row(&result, self.with_score));
        }

        self.header_emitted = true;
        self.with_score = self.mixed_kinds || result.is_fuzzy();
        let row = format_row(&result, self.with_score);
        let [header, divider] = format_header(self.with_score);
        // popped from the back
        self.pending = vec![row, divider];
        Some(header)
    }
}

/// Describe how `query` was matched, for `--debug` output
pub fn match_strategy_lines(query: &MatchQuery, usage: FuzzyUsage) -> Vec<String> {
    let mut lines = vec![
        "Match strategy:".to_string(),
        format!("  exact mode:   {}", query.exact_mode()),
        format!("  fuzzy:        {usage}"),
    ];
    if usage == FuzzyUsage::NotRequested {
        return lines;
    }

    let algorithms: Vec<String> = query.algorithms().iter().map(ToString::to_string).collect();
    lines.push(format!("  fuzzy mode:   {}", query.fuzzy_mode()));
    lines.push(format!("  algorithms:   {}", algorithms.join(", ")));
    if query.fuzzy_mode() == FuzzyMode::Hybrid {
        lines.push(format!("  aggregation:  {}", query.aggregation()));
    }
    lines.push(format!("  threshold:    {:.2}", query.threshold()));
    if query.prefer_fuzzy() {
        lines.push("  prefer fuzzy: yes".to_string());
    }
    lines
}
