use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use autoreview::{OpenPullRequest, PrState, RepoStats, Review, ReviewOutcome};
#[cfg(test)]
use autoreview::{PullRequest, Repo, ReviewComment, Verdict};
use chrono::{DateTime, Utc};

const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 3;

const AUTHOR_HEADERS: &[&str] = &["AUTHOR", "OPENED", "MERGED", "OPEN"];
const WEEKLY_HEADERS: &[&str] = &["WEEK", "OPENED", "MERGED"];
const OLDEST_OPEN_HEADERS: &[&str] = &["URL", "AUTHOR", "AGE", "TITLE"];
const TITLE_COLUMN_INDEX: usize = OLDEST_OPEN_HEADERS.len() - 1;

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(h) if h >= 48.0 => format!("{:.1}d", h / 24.0),
        Some(h) => format!("{h:.1}h"),
        None => "n/a".to_string(),
    }
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_string(), |r| format!("{:.0}%", r * 100.0))
}

fn tree_prefix(index: usize, len: usize) -> &'static str {
    if index == len - 1 { "└─" } else { "├─" }
}

fn write_indented_body<W: Write>(body: &str, indent: &str, writer: &mut W) -> Result<()> {
    for line in body.lines() {
        if line.is_empty() {
            writeln!(writer, "{}", indent.trim_end())?;
        } else {
            writeln!(writer, "{indent}{line}")?;
        }
    }
    Ok(())
}

fn write_review<W: Write>(review: &Review, submitted: bool, writer: &mut W) -> Result<()> {
    let note = if submitted {
        "submitted"
    } else {
        "not submitted, re-run with --submit to post"
    };
    writeln!(writer, "├─Verdict: {} ({note})", review.verdict)?;
    writeln!(writer, "├─Summary: {}", review.body)?;
    writeln!(writer, "└─Comments")?;

    if review.comments.is_empty() {
        writeln!(writer, "  └─None")?;
        return Ok(());
    }

    for (i, comment) in review.comments.iter().enumerate() {
        let last = i == review.comments.len() - 1;
        let lines = match comment.start_line {
            Some(start) => format!("{start}-{}", comment.line),
            None => comment.line.to_string(),
        };
        writeln!(
            writer,
            "  {}{}:{} [{}]",
            tree_prefix(i, review.comments.len()),
            comment.path,
            lines,
            comment.rule_id
        )?;
        let indent = if last { "      " } else { "  │   " };
        write_indented_body(&comment.body, indent, writer)?;
    }

    Ok(())
}

/// Prints the outcome of a review run as a tree rooted at the PR URL.
pub fn display_review_outcome<W: Write>(outcome: &ReviewOutcome, writer: &mut W) -> Result<()> {
    let pr = &outcome.pull_request;
    writeln!(writer, "● {}", pr.url)?;
    writeln!(writer, "├─Title: {} ({})", pr.title, pr.author)?;
    writeln!(writer, "├─PR #{}", pr.number)?;
    if !pr.labels.is_empty() {
        writeln!(writer, "├─Labels: {}", pr.labels.join(", "))?;
    }

    let Some(review) = &outcome.review else {
        let reason = if pr.state != PrState::Open {
            format!("{}, nothing to review", pr.state)
        } else {
            "draft, pass --include-drafts to review".to_string()
        };
        writeln!(writer, "└─Skipped: {reason}")?;
        return Ok(());
    };

    if !outcome.skipped_files.is_empty() {
        writeln!(writer, "├─Files without a patch")?;
        for (i, file) in outcome.skipped_files.iter().enumerate() {
            writeln!(
                writer,
                "│ {}{file}",
                tree_prefix(i, outcome.skipped_files.len())
            )?;
        }
    }

    write_review(review, outcome.submitted, writer)
}

/// Query terminal width from /dev/tty using ioctl.
/// This works even when stdout is redirected (e.g., in watch or pager).
#[cfg(unix)]
fn query_tty_width() -> Option<usize> {
    use std::{fs::File, os::unix::io::AsRawFd};

    if let Ok(tty) = File::open("/dev/tty") {
        unsafe {
            let mut winsize: libc::winsize = std::mem::zeroed();
            if libc::ioctl(tty.as_raw_fd(), libc::TIOCGWINSZ, &mut winsize) == 0
                && winsize.ws_col > 0
            {
                return Some(winsize.ws_col as usize);
            }
        }
    }
    None
}

#[cfg(not(unix))]
fn query_tty_width() -> Option<usize> {
    None
}

fn get_terminal_width(width_override: Option<usize>, force_truncate: bool) -> usize {
    if let Some(width) = width_override {
        width
    } else if io::stdout().is_terminal() {
        terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(usize::MAX)
    } else if force_truncate {
        query_tty_width()
            .or_else(|| std::env::var("COLUMNS").ok().and_then(|c| c.parse().ok()))
            .unwrap_or(usize::MAX)
    } else {
        usize::MAX
    }
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    widths
}

fn truncate_title(title: &str, width: usize) -> String {
    let keep = width - TITLE_TRUNCATION_SUFFIX.len();
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(TITLE_TRUNCATION_SUFFIX);
    truncated
}

fn apply_title_truncation(rows: &mut [Vec<String>], widths: &mut [usize], terminal_width: usize) {
    if terminal_width == usize::MAX {
        return;
    }

    let separator_width = COLUMN_SEPARATOR.len() * (widths.len() - 1);
    let non_title_width: usize =
        widths[..TITLE_COLUMN_INDEX].iter().sum::<usize>() + separator_width;

    if non_title_width >= terminal_width {
        return;
    }

    let available_title_width = terminal_width - non_title_width;
    let max_title_width = rows
        .iter()
        .map(|row| row.get(TITLE_COLUMN_INDEX).map_or(0, |s| s.chars().count()))
        .max()
        .unwrap_or(0);

    if max_title_width > available_title_width
        && available_title_width > MIN_TITLE_WIDTH_FOR_TRUNCATION
    {
        widths[TITLE_COLUMN_INDEX] = available_title_width;

        for row in rows {
            if let Some(title) = row.get_mut(TITLE_COLUMN_INDEX)
                && title.chars().count() > available_title_width
            {
                *title = truncate_title(title, available_title_width);
            }
        }
    }
}

fn render_row<W: Write>(cells: &[&str], widths: &[usize], writer: &mut W) -> Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if i < cells.len() - 1 {
            write!(writer, "{:<width$}{COLUMN_SEPARATOR}", cell, width = widths[i])?;
        } else {
            // No padding on the last column so lines carry no trailing blanks.
            write!(writer, "{cell}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table<W: Write>(
    headers: &[&str],
    rows: &[Vec<String>],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    render_row(headers, widths, writer)?;

    let separators: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let separators: Vec<&str> = separators.iter().map(String::as_str).collect();
    render_row(&separators, widths, writer)?;

    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        render_row(&cells, widths, writer)?;
    }
    Ok(())
}

fn write_simple_table<W: Write>(
    headers: &[&str],
    rows: &[Vec<String>],
    writer: &mut W,
) -> Result<()> {
    let widths = calculate_column_widths(headers, rows);
    render_table(headers, rows, &widths, writer)
}

fn oldest_open_rows(prs: &[OpenPullRequest]) -> Vec<Vec<String>> {
    prs.iter()
        .map(|pr| {
            vec![
                pr.url.clone(),
                pr.author.clone(),
                format_relative_time(pr.created_at),
                pr.title.clone(),
            ]
        })
        .collect()
}

fn display_stats_with_width<W: Write>(
    stats: &RepoStats,
    writer: &mut W,
    width_override: Option<usize>,
    force_truncate: bool,
) -> Result<()> {
    writeln!(
        writer,
        "Pull requests: {} ({} open, {} merged, {} closed, {} drafts)",
        stats.total, stats.open, stats.merged, stats.closed, stats.drafts
    )?;
    writeln!(writer, "Merge rate: {}", format_rate(stats.merge_rate))?;
    writeln!(
        writer,
        "Time to merge: {} average, {} median",
        format_hours(stats.average_hours_to_merge),
        format_hours(stats.median_hours_to_merge)
    )?;

    if stats.total == 0 {
        return Ok(());
    }

    writeln!(writer)?;
    let author_rows: Vec<Vec<String>> = stats
        .authors
        .iter()
        .map(|a| {
            vec![
                a.author.clone(),
                a.opened.to_string(),
                a.merged.to_string(),
                a.open.to_string(),
            ]
        })
        .collect();
    write_simple_table(AUTHOR_HEADERS, &author_rows, writer)?;

    writeln!(writer)?;
    let weekly_rows: Vec<Vec<String>> = stats
        .weekly
        .iter()
        .map(|w| vec![w.week.clone(), w.opened.to_string(), w.merged.to_string()])
        .collect();
    write_simple_table(WEEKLY_HEADERS, &weekly_rows, writer)?;

    if !stats.oldest_open.is_empty() {
        writeln!(writer)?;
        let terminal_width = get_terminal_width(width_override, force_truncate);
        let mut rows = oldest_open_rows(&stats.oldest_open);
        let mut widths = calculate_column_widths(OLDEST_OPEN_HEADERS, &rows);
        apply_title_truncation(&mut rows, &mut widths, terminal_width);
        render_table(OLDEST_OPEN_HEADERS, &rows, &widths, writer)?;
    }

    Ok(())
}

pub fn display_stats<W: Write>(
    stats: &RepoStats,
    truncate_titles: bool,
    writer: &mut W,
) -> Result<()> {
    display_stats_with_width(stats, writer, None, truncate_titles)
}

pub fn display_stats_json<W: Write>(stats: &RepoStats, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, stats)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn test_pr(state: PrState, draft: bool) -> PullRequest {
        PullRequest {
            repo: Repo::new("owner", "repo").unwrap(),
            number: 101,
            title: "Add settings dialog".to_string(),
            author: "alice".to_string(),
            url: "https://github.com/owner/repo/pull/101".to_string(),
            state,
            draft,
            labels: vec![],
            created_at: Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
            closed_at: None,
            merged_at: None,
            head_sha: "abc123".to_string(),
        }
    }

    fn render_outcome(outcome: &ReviewOutcome) -> String {
        let mut output = Vec::new();
        display_review_outcome(outcome, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_review_outcome_with_comments() {
        let outcome = ReviewOutcome {
            pull_request: test_pr(PrState::Open, false),
            review: Some(Review {
                verdict: Verdict::Comment,
                body: "Found 2 issue(s) in 1 of 2 file(s).".to_string(),
                comments: vec![
                    ReviewComment {
                        path: "src/app.js".to_string(),
                        line: 12,
                        start_line: None,
                        rule_id: "accessible-confirm".to_string(),
                        body: "**Use an accessible dialog** (`accessible-confirm`)".to_string(),
                    },
                    ReviewComment {
                        path: "src/app.js".to_string(),
                        line: 20,
                        start_line: Some(19),
                        rule_id: "img-alt".to_string(),
                        body: "**Images need alt text** (`img-alt`)\n\n```suggestion\n<img alt=\"\" src=\"a.png\">\n```".to_string(),
                    },
                ],
            }),
            submitted: false,
            skipped_files: vec!["logo.png".to_string()],
        };

        let result = render_outcome(&outcome);

        assert!(result.starts_with("● https://github.com/owner/repo/pull/101\n"));
        assert!(result.contains("├─Title: Add settings dialog (alice)"));
        assert!(result.contains("├─PR #101"));
        assert!(result.contains("├─Files without a patch\n│ └─logo.png"));
        assert!(result.contains("├─Verdict: COMMENT (not submitted, re-run with --submit to post)"));
        assert!(result.contains("  ├─src/app.js:12 [accessible-confirm]"));
        assert!(result.contains("  │   **Use an accessible dialog** (`accessible-confirm`)"));
        assert!(result.contains("  └─src/app.js:19-20 [img-alt]"));
        assert!(result.contains("      ```suggestion"));
    }

    #[test]
    fn test_review_outcome_approved_and_submitted() {
        let outcome = ReviewOutcome {
            pull_request: test_pr(PrState::Open, false),
            review: Some(Review {
                verdict: Verdict::Approve,
                body: "No issues found in 1 file(s).".to_string(),
                comments: vec![],
            }),
            submitted: true,
            skipped_files: vec![],
        };

        let result = render_outcome(&outcome);

        assert!(result.contains("├─Verdict: APPROVE (submitted)"));
        assert!(result.contains("└─Comments\n  └─None"));
        assert!(!result.contains("Files without a patch"));
    }

    #[test]
    fn test_review_outcome_skipped() {
        let draft = ReviewOutcome {
            pull_request: test_pr(PrState::Open, true),
            review: None,
            submitted: false,
            skipped_files: vec![],
        };
        assert!(render_outcome(&draft).contains("└─Skipped: draft, pass --include-drafts"));

        let merged = ReviewOutcome {
            pull_request: test_pr(PrState::Merged, false),
            review: None,
            submitted: false,
            skipped_files: vec![],
        };
        assert!(render_outcome(&merged).contains("└─Skipped: merged, nothing to review"));
    }

    #[test]
    fn test_closed_draft_is_reported_as_closed() {
        let closed_draft = ReviewOutcome {
            pull_request: test_pr(PrState::Closed, true),
            review: None,
            submitted: false,
            skipped_files: vec![],
        };

        let result = render_outcome(&closed_draft);
        assert!(result.contains("└─Skipped: closed, nothing to review"));
        assert!(!result.contains("--include-drafts"));
    }

    #[test]
    fn test_review_outcome_shows_labels() {
        let mut pr = test_pr(PrState::Open, false);
        pr.labels = vec!["a11y".to_string(), "ui".to_string()];
        let outcome = ReviewOutcome {
            pull_request: pr,
            review: None,
            submitted: false,
            skipped_files: vec![],
        };

        assert!(render_outcome(&outcome).contains("├─PR #101\n├─Labels: a11y, ui\n"));

        let unlabelled = ReviewOutcome {
            pull_request: test_pr(PrState::Open, true),
            review: None,
            submitted: false,
            skipped_files: vec![],
        };
        assert!(!render_outcome(&unlabelled).contains("Labels"));
    }

    fn sample_stats() -> RepoStats {
        let now = Utc::now();
        let mut open = test_pr(PrState::Open, false);
        open.title = "A very long title that will not fit in a narrow terminal".to_string();
        open.created_at = now - Duration::days(3);

        let mut merged = test_pr(PrState::Merged, false);
        merged.number = 100;
        merged.author = "bob".to_string();
        merged.created_at = now - Duration::days(10);
        merged.merged_at = Some(merged.created_at + Duration::hours(6));

        RepoStats::from_pull_requests(&[open, merged])
    }

    #[test]
    fn test_display_stats_tables() {
        let mut output = Vec::new();

        // Use a large fixed width in tests to prevent truncation and make tests deterministic.
        display_stats_with_width(&sample_stats(), &mut output, Some(usize::MAX), false).unwrap();
        let result = String::from_utf8(output).unwrap();

        assert!(result.contains("Pull requests: 2 (1 open, 1 merged, 0 closed, 0 drafts)"));
        assert!(result.contains("Merge rate: 100%"));
        assert!(result.contains("Time to merge: 6.0h average, 6.0h median"));
        assert!(result.contains("AUTHOR  OPENED  MERGED  OPEN"));
        assert!(result.contains("WEEK"));
        assert!(result.contains("URL"));
        assert!(result.contains("3 days ago"));
        assert!(result.contains("A very long title that will not fit in a narrow terminal"));
        assert!(result.lines().all(|line| !line.ends_with(' ')));
    }

    #[test]
    fn test_display_stats_truncates_titles() {
        let mut output = Vec::new();
        display_stats_with_width(&sample_stats(), &mut output, Some(80), true).unwrap();
        let result = String::from_utf8(output).unwrap();

        let row = result
            .lines()
            .find(|line| line.starts_with("https://github.com/owner/repo/pull/101"))
            .unwrap();
        assert!(row.ends_with(TITLE_TRUNCATION_SUFFIX));
        assert_eq!(row.chars().count(), 80);
    }

    #[test]
    fn test_display_empty_stats() {
        let mut output = Vec::new();
        display_stats_with_width(&RepoStats::from_pull_requests(&[]), &mut output, None, false)
            .unwrap();
        let result = String::from_utf8(output).unwrap();

        assert!(result.contains("Pull requests: 0"));
        assert!(result.contains("Merge rate: n/a"));
        assert!(!result.contains("AUTHOR"));
    }

    #[test]
    fn test_display_stats_json() {
        let mut output = Vec::new();
        display_stats_json(&sample_stats(), &mut output).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["authors"][0]["author"], "alice");
        assert_eq!(value["oldest_open"][0]["number"], 101);
    }
}
