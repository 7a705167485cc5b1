use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{
    Octocrab, Page,
    models::{IssueState, pulls::PullRequest as ApiPullRequest, repos::DiffEntry},
    params,
};
use serde_json::json;
use tracing::{debug, info};

use crate::types::{FilePatch, Forge, PrState, PullRequest, Repo, Review, ReviewComment};

const PER_PAGE: u8 = 100;

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client using available credentials.
pub fn setup_github_client() -> Result<Octocrab> {
    let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

fn convert_state(pr: &ApiPullRequest) -> PrState {
    if pr.merged_at.is_some() {
        PrState::Merged
    } else if matches!(pr.state, Some(IssueState::Open)) {
        PrState::Open
    } else {
        PrState::Closed
    }
}

/// Maps octocrab's pull request model onto ours.
pub fn convert_pull_request(repo: &Repo, pr: ApiPullRequest) -> Result<PullRequest> {
    let created_at = pr
        .created_at
        .with_context(|| format!("PR #{} in {} has no creation time", pr.number, repo))?;
    let state = convert_state(&pr);

    Ok(PullRequest {
        repo: repo.clone(),
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author: pr.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_else(|| {
            format!(
                "https://github.com/{}/{}/pull/{}",
                repo.owner(),
                repo.name(),
                pr.number
            )
        }),
        state,
        draft: pr.draft.unwrap_or(false),
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| l.name)
            .collect(),
        created_at,
        closed_at: pr.closed_at,
        merged_at: pr.merged_at,
        head_sha: pr.head.sha,
    })
}

fn convert_diff_entry(entry: DiffEntry) -> FilePatch {
    FilePatch {
        filename: entry.filename,
        status: format!("{:?}", entry.status).to_lowercase(),
        patch: entry.patch,
    }
}

/// Renders a review comment in the shape the pull request reviews endpoint
/// expects.
pub fn review_comment_payload(comment: &ReviewComment) -> serde_json::Value {
    let mut payload = json!({
        "path": comment.path,
        "line": comment.line,
        "side": "RIGHT",
        "body": comment.body,
    });
    if let Some(start) = comment.start_line {
        payload["start_line"] = json!(start);
        payload["start_side"] = json!("RIGHT");
    }
    payload
}

pub fn review_payload(pr: &PullRequest, review: &Review) -> serde_json::Value {
    json!({
        "commit_id": pr.head_sha,
        "event": review.verdict.as_event(),
        "body": review.body,
        "comments": review
            .comments
            .iter()
            .map(review_comment_payload)
            .collect::<Vec<_>>(),
    })
}

/// GitHub REST API backed [`Forge`].
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    pub fn connect() -> Result<Self> {
        Ok(Self::new(setup_github_client()?))
    }

    async fn collect_pages<T>(&self, first: Page<T>, limit: usize) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = Some(first);

        while let Some(mut current) = page {
            items.append(&mut current.items);
            if items.len() >= limit {
                items.truncate(limit);
                break;
            }
            page = self
                .client
                .get_page::<T>(&current.next)
                .await
                .context("Failed to fetch next page")?;
        }

        Ok(items)
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_pull_request(&self, repo: &Repo, number: u64) -> Result<PullRequest> {
        debug!(%repo, number, "Fetching pull request");
        let pr = self
            .client
            .pulls(repo.owner(), repo.name())
            .get(number)
            .await
            .with_context(|| format!("Failed to fetch PR #{number} from {repo}"))?;
        convert_pull_request(repo, pr)
    }

    async fn fetch_changed_files(&self, repo: &Repo, number: u64) -> Result<Vec<FilePatch>> {
        let first = self
            .client
            .pulls(repo.owner(), repo.name())
            .list_files(number)
            .await
            .with_context(|| format!("Failed to list files of PR #{number} in {repo}"))?;
        let entries = self.collect_pages(first, usize::MAX).await?;
        debug!(%repo, number, files = entries.len(), "Fetched changed files");
        Ok(entries.into_iter().map(convert_diff_entry).collect())
    }

    async fn list_pull_requests(&self, repo: &Repo, limit: usize) -> Result<Vec<PullRequest>> {
        let first = self
            .client
            .pulls(repo.owner(), repo.name())
            .list()
            .state(params::State::All)
            .sort(params::pulls::Sort::Created)
            .direction(params::Direction::Descending)
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Failed to list pull requests for {repo}"))?;

        self.collect_pages(first, limit)
            .await?
            .into_iter()
            .map(|pr| convert_pull_request(repo, pr))
            .collect()
    }

    async fn submit_review(&self, pr: &PullRequest, review: &Review) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            pr.repo.owner(),
            pr.repo.name(),
            pr.number
        );
        let _: serde_json::Value = self
            .client
            .post(route, Some(&review_payload(pr, review)))
            .await
            .with_context(|| format!("Failed to submit review on {}", pr.url))?;

        info!(
            url = %pr.url,
            verdict = %review.verdict,
            comments = review.comments.len(),
            "Submitted review"
        );
        Ok(())
    }
}
