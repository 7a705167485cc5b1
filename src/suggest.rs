//! Minimal suggestion extraction.
//!
//! Given the "original" lines of a small code window and the "suggested"
//! replacement for the same window, works out the smallest block of lines
//! worth putting inside a GitHub suggestion. Every function here is total:
//! any pair of inputs, including empty ones, produces an answer.

use tracing::debug;

/// Default upper bound on the number of lines in a rendered suggestion.
pub const DEFAULT_MAX_LINES: usize = 3;

/// Default number of unchanged lines kept either side of the changed core
/// by [`extract_minimal_changes`].
pub const DEFAULT_CONTEXT_LINES: usize = 1;

/// Tunables for suggestion extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionConfig {
    pub max_lines: usize,
    pub context_lines: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// Half-open range `[start, end)` over a line sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffSpan {
    pub start: usize,
    pub end: usize,
}

impl DiffSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn single(index: usize) -> Self {
        Self::new(index, index + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn clamp_to(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

/// Lines to render in a suggestion block, and the original lines they
/// replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub span: DiffSpan,
    pub lines: Vec<String>,
}

/// Returns the first index at which the two sequences differ.
///
/// When one sequence is a prefix of the other, the index of the first extra
/// line (the shorter length) is returned. Identical sequences yield `None`.
pub fn find_first_different_line_index(original: &[String], suggested: &[String]) -> Option<usize> {
    let common = original.len().min(suggested.len());

    if let Some(index) = (0..common).find(|&i| original[i] != suggested[i]) {
        return Some(index);
    }

    (original.len() != suggested.len()).then_some(common)
}

/// Locates the single contiguous block of differing lines starting at the
/// first difference. `end` is inclusive.
fn smallest_diff_bounds(original: &[String], suggested: &[String]) -> Option<(usize, usize)> {
    let start = find_first_different_line_index(original, suggested)?;
    let common = original.len().min(suggested.len());

    let mut end = start;
    while end + 1 < common && original[end + 1] != suggested[end + 1] {
        end += 1;
    }

    Some((start, end))
}

fn smallest_diff(
    original: &[String],
    suggested: &[String],
    config: &SuggestionConfig,
) -> Option<Suggestion> {
    let (start, end) = smallest_diff_bounds(original, suggested)?;

    // Pure deletion: nothing left on the suggested side to show.
    if start >= suggested.len() {
        return None;
    }

    let diff_length = end - start + 1;
    let (span, lines) = if diff_length <= config.max_lines {
        (DiffSpan::new(start, end + 1), suggested[start..=end].to_vec())
    } else {
        (DiffSpan::single(start), vec![suggested[start].clone()])
    };

    Some(Suggestion {
        span: span.clamp_to(original.len()),
        lines,
    })
}

/// Returns the suggested lines of the smallest contiguous changed block.
///
/// Blocks longer than `config.max_lines` degrade to their first line only.
/// Identical inputs give an empty result.
pub fn find_smallest_diff(
    original: &[String],
    suggested: &[String],
    config: &SuggestionConfig,
) -> Vec<String> {
    smallest_diff(original, suggested, config)
        .map(|s| s.lines)
        .unwrap_or_default()
}

fn common_prefix_len(original: &[String], suggested: &[String]) -> usize {
    original
        .iter()
        .zip(suggested)
        .take_while(|(a, b)| a == b)
        .count()
}

fn common_suffix_len(original: &[String], suggested: &[String], prefix: usize) -> usize {
    let limit = original.len().min(suggested.len()) - prefix;
    original
        .iter()
        .rev()
        .zip(suggested.iter().rev())
        .take(limit)
        .take_while(|(a, b)| a == b)
        .count()
}

fn minimal_changes(
    original: &[String],
    suggested: &[String],
    config: &SuggestionConfig,
) -> Option<Suggestion> {
    let prefix = common_prefix_len(original, suggested);
    let suffix = common_suffix_len(original, suggested, prefix);

    let original_core_end = original.len() - suffix;
    let suggested_core_end = suggested.len() - suffix;

    if prefix == original_core_end && prefix == suggested_core_end {
        return None;
    }

    let start = prefix.saturating_sub(config.context_lines);
    let suggested_end = (suggested_core_end + config.context_lines).min(suggested.len());
    let original_end = (original_core_end + config.context_lines).min(original.len());

    Some(Suggestion {
        span: DiffSpan::new(start.min(original.len()), original_end),
        lines: suggested[start..suggested_end].to_vec(),
    })
}

/// Trims the common prefix and suffix and returns the changed core of
/// `suggested` widened by `config.context_lines` on each side.
///
/// Identical inputs give an empty result. The output is not capped; callers
/// truncate it to `config.max_lines`.
pub fn extract_minimal_changes(
    original: &[String],
    suggested: &[String],
    config: &SuggestionConfig,
) -> Vec<String> {
    minimal_changes(original, suggested, config)
        .map(|s| s.lines)
        .unwrap_or_default()
}

/// Inputs shared by every strategy in the chain.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionInput<'a> {
    pub original: &'a [String],
    pub suggested: &'a [String],
    pub keyword: Option<&'a str>,
    pub config: &'a SuggestionConfig,
}

/// One step of the suggestion fallback chain.
pub trait SuggestionStrategy: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Returns a bounded suggestion, or `None` to defer to the next step.
    fn propose(&self, input: &SuggestionInput<'_>) -> Option<Suggestion>;
}

/// Targets the first original line containing the keyword whose suggested
/// counterpart actually changed.
#[derive(Debug, Clone)]
pub struct KeywordLine;

impl SuggestionStrategy for KeywordLine {
    fn name(&self) -> &'static str {
        "keyword-line"
    }

    fn propose(&self, input: &SuggestionInput<'_>) -> Option<Suggestion> {
        let keyword = input.keyword.filter(|k| !k.is_empty())?;
        input
            .original
            .iter()
            .enumerate()
            .find(|(i, line)| {
                line.contains(keyword)
                    && input.suggested.get(*i).is_some_and(|s| s != *line)
            })
            .map(|(i, _)| Suggestion {
                span: DiffSpan::single(i),
                lines: vec![input.suggested[i].clone()],
            })
    }
}

#[derive(Debug, Clone)]
pub struct SmallestDiff;

impl SuggestionStrategy for SmallestDiff {
    fn name(&self) -> &'static str {
        "smallest-diff"
    }

    fn propose(&self, input: &SuggestionInput<'_>) -> Option<Suggestion> {
        smallest_diff(input.original, input.suggested, input.config)
            .filter(|s| !s.lines.is_empty() && s.lines.len() <= input.config.max_lines)
    }
}

#[derive(Debug, Clone)]
pub struct FirstDifference;

impl SuggestionStrategy for FirstDifference {
    fn name(&self) -> &'static str {
        "first-difference"
    }

    fn propose(&self, input: &SuggestionInput<'_>) -> Option<Suggestion> {
        let index = find_first_different_line_index(input.original, input.suggested)?;
        let line = input.suggested.get(index)?;
        Some(Suggestion {
            span: DiffSpan::single(index).clamp_to(input.original.len()),
            lines: vec![line.clone()],
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrimmedWindow;

impl SuggestionStrategy for TrimmedWindow {
    fn name(&self) -> &'static str {
        "trimmed-window"
    }

    fn propose(&self, input: &SuggestionInput<'_>) -> Option<Suggestion> {
        let mut suggestion = minimal_changes(input.original, input.suggested, input.config)?;
        let cap = input.config.max_lines;
        suggestion.lines.truncate(cap);
        suggestion.span.end = suggestion.span.end.min(suggestion.span.start + cap);
        (!suggestion.lines.is_empty()).then_some(suggestion)
    }
}

/// Ordered fallback chain used when rendering review suggestions.
#[derive(Debug)]
pub struct SuggestionChain {
    strategies: Vec<Box<dyn SuggestionStrategy + Send + Sync>>,
}

impl Default for SuggestionChain {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(KeywordLine),
                Box::new(SmallestDiff),
                Box::new(FirstDifference),
                Box::new(TrimmedWindow),
            ],
        }
    }
}

impl SuggestionChain {
    /// Runs each strategy in order and returns the first bounded result.
    ///
    /// Identical inputs never produce a suggestion, and the returned lines
    /// never exceed `config.max_lines`.
    pub fn select(&self, input: &SuggestionInput<'_>) -> Option<Suggestion> {
        if input.original == input.suggested {
            return None;
        }

        let cap = input.config.max_lines.max(1);
        self.strategies.iter().find_map(|strategy| {
            let suggestion = strategy
                .propose(input)
                .filter(|s| !s.lines.is_empty() && s.lines.len() <= cap)?;
            debug!(
                strategy = strategy.name(),
                lines = suggestion.lines.len(),
                start = suggestion.span.start,
                end = suggestion.span.end,
                "Selected suggestion"
            );
            Some(suggestion)
        })
    }
}

/// Runs the default chain over a pair of windows.
pub fn select_suggestion(
    original: &[String],
    suggested: &[String],
    keyword: Option<&str>,
    config: &SuggestionConfig,
) -> Option<Suggestion> {
    SuggestionChain::default().select(&SuggestionInput {
        original,
        suggested,
        keyword,
        config,
    })
}
