use anyhow::Result;
use tracing::{info, warn};

use crate::{
    review::plan_review,
    rules::RuleSet,
    stats::RepoStats,
    types::{Forge, PrState, ReviewOutcome, ReviewRequest, StatsRequest},
};

/// Assembles the rule set a review request asks for: the built-in rules
/// (unless disabled) followed by those from the rules file.
pub fn load_rules(request: &ReviewRequest) -> Result<RuleSet> {
    let mut rules = if request.builtin_rules {
        RuleSet::builtin()
    } else {
        RuleSet::default()
    };

    if let Some(path) = &request.rules_file {
        rules.extend(RuleSet::load(path)?)?;
    }

    if rules.is_empty() {
        anyhow::bail!("No rules to run: pass --rules or drop --no-builtin-rules");
    }

    Ok(rules)
}

/// Fetches a pull request and its diff, plans a review, and submits it
/// when the request asks for that.
///
/// Draft and non-open pull requests are left alone; the outcome then
/// carries no review.
pub async fn run_review<F>(request: &ReviewRequest, forge: &F) -> Result<ReviewOutcome>
where
    F: Forge + Sync,
{
    let rules = load_rules(request)?;
    let pull_request = forge
        .fetch_pull_request(&request.repo, request.number)
        .await?;

    let skip_reason = if pull_request.state != PrState::Open {
        Some("not open")
    } else if pull_request.draft && !request.include_drafts {
        Some("draft")
    } else {
        None
    };

    if let Some(reason) = skip_reason {
        warn!(url = %pull_request.url, reason, "Skipping pull request");
        return Ok(ReviewOutcome {
            pull_request,
            review: None,
            submitted: false,
            skipped_files: Vec::new(),
        });
    }

    let files = forge
        .fetch_changed_files(&request.repo, request.number)
        .await?;
    let skipped_files = files
        .iter()
        .filter(|f| f.patch.is_none())
        .map(|f| f.filename.clone())
        .collect();

    let review = plan_review(&files, &rules, &request.suggestion);
    info!(
        url = %pull_request.url,
        files = files.len(),
        comments = review.comments.len(),
        verdict = %review.verdict,
        "Planned review"
    );

    let submitted = if request.submit {
        forge.submit_review(&pull_request, &review).await?;
        true
    } else {
        false
    };

    Ok(ReviewOutcome {
        pull_request,
        review: Some(review),
        submitted,
        skipped_files,
    })
}

/// Lists recent pull requests and aggregates them.
pub async fn collect_stats<F>(request: &StatsRequest, forge: &F) -> Result<RepoStats>
where
    F: Forge + Sync,
{
    let prs = forge.list_pull_requests(&request.repo, request.limit).await?;
    info!(repo = %request.repo, count = prs.len(), "Fetched pull requests for statistics");
    Ok(RepoStats::from_pull_requests(&prs))
}
