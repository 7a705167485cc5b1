//! Autoreview: automated pull request review with compact suggestions.
//!
//! Fetches a pull request's diff from GitHub, runs literal and regex
//! pattern rules over the added lines, and turns each hit into an inline
//! review comment. Where a rule carries a replacement, the comment includes
//! the smallest committable suggestion block the minimal-diff extractor can
//! find. Also aggregates repository-wide pull request statistics.

pub mod cli;
pub mod diff;
pub mod github;
pub mod pipeline;
pub mod review;
pub mod rules;
pub mod stats;
pub mod suggest;
pub mod types;

pub use cli::parse_args;
pub use github::GitHub;
pub use pipeline::{collect_stats, load_rules, run_review};
pub use review::plan_review;
pub use rules::{Rule, RuleMatch, RuleSet};
pub use stats::{AuthorStats, OpenPullRequest, RepoStats, WeeklyStats};
pub use suggest::{
    DiffSpan, Suggestion, SuggestionChain, SuggestionConfig, extract_minimal_changes,
    find_first_different_line_index, find_smallest_diff, select_suggestion,
};
pub use types::{
    Command, FilePatch, Forge, PrState, PullRequest, Repo, RepoError, Review, ReviewComment,
    ReviewOutcome, ReviewRequest, StatsRequest, Verdict,
};
