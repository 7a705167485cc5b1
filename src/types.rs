use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::suggest::SuggestionConfig;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Repo {
    owner: String,
    name: String,
}

/// Reasons a repository string could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    EmptyOwner,
    EmptyName,
    InvalidFormat(String),
    InvalidUrl(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::EmptyOwner => write!(f, "repository owner cannot be empty"),
            RepoError::EmptyName => write!(f, "repository name cannot be empty"),
            RepoError::InvalidFormat(s) => {
                write!(f, "expected 'owner/repo', got '{s}'")
            }
            RepoError::InvalidUrl(s) => {
                write!(
                    f,
                    "expected https://github.com/owner/repo/pull/123, got '{s}'"
                )
            }
        }
    }
}

impl std::error::Error for RepoError {}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.trim().is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(RepoError::EmptyName);
        }
        Ok(Self { owner, name })
    }

    /// Parses `owner/repo`.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 2 {
            return Err(RepoError::InvalidFormat(s.to_string()));
        }
        Self::new(parts[0], parts[1])
    }

    /// Parses a GitHub repository or pull request URL, returning the pull
    /// request number when the URL points at one.
    pub fn parse_url(s: &str) -> Result<(Self, Option<u64>), RepoError> {
        let url = url::Url::parse(s).map_err(|_| RepoError::InvalidUrl(s.to_string()))?;
        if url.host_str() != Some("github.com") {
            return Err(RepoError::InvalidUrl(s.to_string()));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, name] => Ok((Self::new(*owner, *name)?, None)),
            [owner, name, "pull", number, ..] => {
                let number = number
                    .parse()
                    .map_err(|_| RepoError::InvalidUrl(s.to_string()))?;
                Ok((Self::new(*owner, *name)?, Some(number)))
            }
            _ => Err(RepoError::InvalidUrl(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Pull request metadata as used for review and statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequest {
    pub repo: Repo,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub state: PrState,
    pub draft: bool,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub head_sha: String,
}

impl PullRequest {
    pub fn time_to_merge(&self) -> Option<chrono::Duration> {
        self.merged_at.map(|merged| merged - self.created_at)
    }
}

/// One changed file of a pull request. `patch` is absent for binary files
/// and for diffs GitHub considers too large to inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub filename: String,
    pub status: String,
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approve,
    Comment,
}

impl Verdict {
    pub fn as_event(&self) -> &'static str {
        match self {
            Verdict::Approve => "APPROVE",
            Verdict::Comment => "COMMENT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_event())
    }
}

/// An inline review comment anchored on the new side of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewComment {
    pub path: String,
    pub line: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u64>,
    #[serde(skip)]
    pub rule_id: String,
    pub body: String,
}

/// A complete review ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub verdict: Verdict,
    pub body: String,
    pub comments: Vec<ReviewComment>,
}

/// Everything needed to review one pull request.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub repo: Repo,
    pub number: u64,
    pub rules_file: Option<std::path::PathBuf>,
    pub builtin_rules: bool,
    pub submit: bool,
    pub include_drafts: bool,
    pub suggestion: SuggestionConfig,
}

#[derive(Debug, Clone)]
pub struct StatsRequest {
    pub repo: Repo,
    pub limit: usize,
    pub json: bool,
    pub truncate_titles: bool,
}

#[derive(Debug, Clone)]
pub enum Command {
    Review(ReviewRequest),
    Stats(StatsRequest),
}

/// Outcome of running a review against one pull request.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub pull_request: PullRequest,
    pub review: Option<Review>,
    pub submitted: bool,
    pub skipped_files: Vec<String>,
}

/// Code hosting operations the review and statistics pipelines need.
#[async_trait]
pub trait Forge {
    async fn fetch_pull_request(&self, repo: &Repo, number: u64) -> Result<PullRequest>;

    async fn fetch_changed_files(&self, repo: &Repo, number: u64) -> Result<Vec<FilePatch>>;

    /// Lists pull requests in any state, newest first, up to `limit`.
    async fn list_pull_requests(&self, repo: &Repo, limit: usize) -> Result<Vec<PullRequest>>;

    async fn submit_review(&self, pr: &PullRequest, review: &Review) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_parse() {
        let repo = Repo::parse("owner/repo").unwrap();
        assert_eq!(repo.owner(), "owner");
        assert_eq!(repo.name(), "repo");
        assert_eq!(repo.to_string(), "owner/repo");
    }

    #[test]
    fn test_repo_parse_rejects_bad_input() {
        assert!(matches!(
            Repo::parse("owner"),
            Err(RepoError::InvalidFormat(_))
        ));
        assert!(matches!(
            Repo::parse("a/b/c"),
            Err(RepoError::InvalidFormat(_))
        ));
        assert_eq!(Repo::parse("/repo"), Err(RepoError::EmptyOwner));
        assert_eq!(Repo::parse("owner/"), Err(RepoError::EmptyName));
    }

    #[test]
    fn test_repo_parse_url() {
        let (repo, number) = Repo::parse_url("https://github.com/owner/repo/pull/42").unwrap();
        assert_eq!(repo, Repo::new("owner", "repo").unwrap());
        assert_eq!(number, Some(42));

        let (repo, number) = Repo::parse_url("https://github.com/owner/repo").unwrap();
        assert_eq!(repo.to_string(), "owner/repo");
        assert_eq!(number, None);

        let (_, number) = Repo::parse_url("https://github.com/owner/repo/pull/7/files").unwrap();
        assert_eq!(number, Some(7));
    }

    #[test]
    fn test_repo_parse_url_rejects_other_hosts() {
        assert!(Repo::parse_url("https://gitlab.com/owner/repo/pull/1").is_err());
        assert!(Repo::parse_url("https://github.com/owner/repo/issues/1").is_err());
        assert!(Repo::parse_url("https://github.com/owner/repo/pull/abc").is_err());
        assert!(Repo::parse_url("not a url").is_err());
    }

    #[test]
    fn test_verdict_event_names() {
        assert_eq!(Verdict::Approve.as_event(), "APPROVE");
        assert_eq!(Verdict::Comment.to_string(), "COMMENT");
    }
}
