use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::types::{PrState, PullRequest};

/// Pull request counts for one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorStats {
    pub author: String,
    pub opened: usize,
    pub merged: usize,
    pub open: usize,
}

/// Pull requests opened and merged in one ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyStats {
    /// ISO week label, e.g. `2025-W07`.
    pub week: String,
    pub opened: usize,
    pub merged: usize,
}

/// Number of open pull requests listed in [`RepoStats::oldest_open`].
pub const OLDEST_OPEN_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenPullRequest {
    pub number: u64,
    pub url: String,
    pub author: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Repository-wide pull request statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoStats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub merged: usize,
    pub drafts: usize,
    /// Merged share of the pull requests that are no longer open.
    pub merge_rate: Option<f64>,
    pub average_hours_to_merge: Option<f64>,
    pub median_hours_to_merge: Option<f64>,
    pub authors: Vec<AuthorStats>,
    pub weekly: Vec<WeeklyStats>,
    pub oldest_open: Vec<OpenPullRequest>,
}

fn hours(d: Duration) -> f64 {
    d.num_seconds() as f64 / 3600.0
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn week_entry(
    weeks: &mut BTreeMap<(i32, u32), WeeklyStats>,
    date: DateTime<Utc>,
) -> &mut WeeklyStats {
    let week = date.iso_week();
    weeks
        .entry((week.year(), week.week()))
        .or_insert_with(|| WeeklyStats {
            week: format!("{}-W{:02}", week.year(), week.week()),
            opened: 0,
            merged: 0,
        })
}

impl RepoStats {
    pub fn from_pull_requests(prs: &[PullRequest]) -> Self {
        let count = |state: PrState| prs.iter().filter(|pr| pr.state == state).count();
        let open = count(PrState::Open);
        let closed = count(PrState::Closed);
        let merged = count(PrState::Merged);

        let finished = closed + merged;
        let merge_rate = (finished > 0).then(|| merged as f64 / finished as f64);

        let mut merge_hours: Vec<f64> = prs
            .iter()
            .filter_map(PullRequest::time_to_merge)
            .map(hours)
            .collect();
        merge_hours.sort_by(f64::total_cmp);
        let average_hours_to_merge = (!merge_hours.is_empty())
            .then(|| merge_hours.iter().sum::<f64>() / merge_hours.len() as f64);

        let mut by_author: HashMap<&str, AuthorStats> = HashMap::new();
        for pr in prs {
            let entry = by_author
                .entry(pr.author.as_str())
                .or_insert_with(|| AuthorStats {
                    author: pr.author.clone(),
                    opened: 0,
                    merged: 0,
                    open: 0,
                });
            entry.opened += 1;
            match pr.state {
                PrState::Merged => entry.merged += 1,
                PrState::Open => entry.open += 1,
                PrState::Closed => {}
            }
        }
        let mut authors: Vec<AuthorStats> = by_author.into_values().collect();
        authors.sort_by(|a, b| b.opened.cmp(&a.opened).then_with(|| a.author.cmp(&b.author)));

        let mut weeks: BTreeMap<(i32, u32), WeeklyStats> = BTreeMap::new();
        for pr in prs {
            week_entry(&mut weeks, pr.created_at).opened += 1;
            if let Some(merged_at) = pr.merged_at {
                week_entry(&mut weeks, merged_at).merged += 1;
            }
        }

        let mut open_prs: Vec<&PullRequest> =
            prs.iter().filter(|pr| pr.state == PrState::Open).collect();
        open_prs.sort_by_key(|pr| (pr.created_at, pr.number));
        let oldest_open = open_prs
            .into_iter()
            .take(OLDEST_OPEN_LIMIT)
            .map(|pr| OpenPullRequest {
                number: pr.number,
                url: pr.url.clone(),
                author: pr.author.clone(),
                title: pr.title.clone(),
                created_at: pr.created_at,
            })
            .collect();

        Self {
            total: prs.len(),
            open,
            closed,
            merged,
            drafts: prs.iter().filter(|pr| pr.draft).count(),
            merge_rate,
            average_hours_to_merge,
            median_hours_to_merge: median(&merge_hours),
            authors,
            weekly: weeks.into_values().collect(),
            oldest_open,
        }
    }
}
