use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::{
    diff::{NewSideLine, parse_patch},
    rules::{RuleMatch, RuleSet},
    suggest::{DiffSpan, Suggestion, SuggestionConfig, select_suggestion},
    types::{FilePatch, Review, ReviewComment, Verdict},
};

/// Number of new-side lines taken either side of a match when building the
/// window handed to the suggestion chain.
pub const WINDOW_RADIUS: usize = 3;

/// Renders a comment body, with a suggestion block when there is one.
pub fn format_comment_body(rule_id: &str, message: &str, suggestion: Option<&[String]>) -> String {
    let mut body = format!("**{message}** (`{rule_id}`)");
    if let Some(lines) = suggestion {
        body.push_str("\n\n```suggestion\n");
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str("```");
    }
    body
}

/// Builds the original and suggested windows around `target` and picks the
/// suggestion for it.
fn suggest_for_match(
    side: &[NewSideLine],
    target: usize,
    matched: &RuleMatch<'_>,
    config: &SuggestionConfig,
) -> Option<(u64, Option<u64>, Suggestion)> {
    let rewritten = matched.rewritten.as_deref()?;

    let replacement: Vec<String> = rewritten.split('\n').map(str::to_string).collect();
    if replacement.len() > 1 {
        return replace_matched_line(side, target, replacement, config);
    }

    let lo = target.saturating_sub(WINDOW_RADIUS);
    let hi = (target + WINDOW_RADIUS + 1).min(side.len());
    let window = &side[lo..hi];

    let original: Vec<String> = window.iter().map(|l| l.content.clone()).collect();
    let mut suggested = original.clone();
    suggested[target - lo] = rewritten.to_string();

    let suggestion =
        select_suggestion(&original, &suggested, Some(matched.keyword.as_str()), config)?;

    let (start, end) = if suggestion.span.is_empty() {
        (target, target)
    } else {
        (lo + suggestion.span.start, lo + suggestion.span.end - 1)
    };
    let line = side[end].line;
    let start_line = (start != end).then(|| side[start].line);

    Some((line, start_line, suggestion))
}

/// A replacement spanning several lines changes the window length, so the
/// positional chain cannot pair it with original lines. It replaces the
/// matched line as a whole, or is dropped when it exceeds the cap.
fn replace_matched_line(
    side: &[NewSideLine],
    target: usize,
    replacement: Vec<String>,
    config: &SuggestionConfig,
) -> Option<(u64, Option<u64>, Suggestion)> {
    if replacement.len() > config.max_lines {
        debug!(
            line = side[target].line,
            lines = replacement.len(),
            max_lines = config.max_lines,
            "Replacement too long for a suggestion"
        );
        return None;
    }

    let suggestion = Suggestion {
        span: DiffSpan::single(target),
        lines: replacement,
    };
    Some((side[target].line, None, suggestion))
}

fn review_hunk_lines(
    path: &str,
    side: &[NewSideLine],
    rules: &RuleSet,
    config: &SuggestionConfig,
    comments: &mut Vec<ReviewComment>,
    seen: &mut BTreeSet<(String, u64, String)>,
) {
    for (index, line) in side.iter().enumerate() {
        if !line.added {
            continue;
        }

        for matched in rules.find_matches(&line.content) {
            let (anchor, start_line, lines) = match suggest_for_match(side, index, &matched, config)
            {
                Some((anchor, start_line, suggestion)) => {
                    (anchor, start_line, Some(suggestion.lines))
                }
                None => (line.line, None, None),
            };

            if !seen.insert((path.to_string(), anchor, matched.rule_id.to_string())) {
                continue;
            }

            debug!(
                path,
                line = anchor,
                rule = matched.rule_id,
                with_suggestion = lines.is_some(),
                "Rule matched"
            );

            comments.push(ReviewComment {
                path: path.to_string(),
                line: anchor,
                start_line,
                rule_id: matched.rule_id.to_string(),
                body: format_comment_body(matched.rule_id, matched.message, lines.as_deref()),
            });
        }
    }
}

/// Scans the added lines of every file and assembles the review.
///
/// Files without a patch are skipped. A review with no comments approves
/// the pull request; otherwise it is submitted as a plain comment.
pub fn plan_review(files: &[FilePatch], rules: &RuleSet, config: &SuggestionConfig) -> Review {
    let mut comments = Vec::new();
    let mut seen = BTreeSet::new();
    let mut reviewed_files = 0;

    for file in files {
        let Some(patch) = &file.patch else {
            warn!(path = %file.filename, "No patch available, skipping file");
            continue;
        };
        reviewed_files += 1;

        for hunk in parse_patch(patch) {
            let side = hunk.new_side();
            review_hunk_lines(
                &file.filename,
                &side,
                rules,
                config,
                &mut comments,
                &mut seen,
            );
        }
    }

    let flagged_files: BTreeSet<&str> = comments.iter().map(|c| c.path.as_str()).collect();
    let (verdict, body) = if comments.is_empty() {
        (
            Verdict::Approve,
            format!("No issues found in {reviewed_files} file(s)."),
        )
    } else {
        (
            Verdict::Comment,
            format!(
                "Found {} issue(s) in {} of {} file(s).",
                comments.len(),
                flagged_files.len(),
                reviewed_files
            ),
        )
    };

    Review {
        verdict,
        body,
        comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;

    fn file(name: &str, patch: &str) -> FilePatch {
        FilePatch {
            filename: name.to_string(),
            status: "modified".to_string(),
            patch: Some(patch.to_string()),
        }
    }

    #[test]
    fn test_confirm_gets_single_line_suggestion() {
        let patch = "@@ -10,3 +10,3 @@\n function remove() {\n-  doIt();\n+  if (confirm('Are you sure?')) {\n }";
        let review = plan_review(
            &[file("src/app.js", patch)],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );

        assert_eq!(review.verdict, Verdict::Comment);
        assert_eq!(review.comments.len(), 1);
        let comment = &review.comments[0];
        assert_eq!(comment.path, "src/app.js");
        assert_eq!(comment.line, 11);
        assert_eq!(comment.start_line, None);
        assert_eq!(comment.rule_id, "accessible-confirm");
        assert!(comment.body.ends_with(
            "```suggestion\n  if (showAccessibleConfirmDialog('Are you sure?')) {\n```"
        ));
    }

    #[test]
    fn test_clean_diff_is_approved() {
        let patch = "@@ -1,1 +1,2 @@\n a\n+b";
        let review = plan_review(
            &[file("a.rs", patch)],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );
        assert_eq!(review.verdict, Verdict::Approve);
        assert!(review.comments.is_empty());
        assert_eq!(review.body, "No issues found in 1 file(s).");
    }

    #[test]
    fn test_context_lines_are_not_flagged() {
        let patch = "@@ -1,2 +1,3 @@\n alert('old');\n+let x = 1;\n confirm('old');";
        let review = plan_review(
            &[file("a.js", patch)],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );
        assert!(review.comments.is_empty());
    }

    #[test]
    fn test_rule_without_replacement_has_no_suggestion() {
        let rules = RuleSet::new(vec![Rule::literal(
            "no-console",
            "console.log(",
            "Remove debug logging.",
            None,
        )])
        .unwrap();
        let patch = "@@ -4,0 +5,1 @@\n+console.log(value);";
        let review = plan_review(&[file("a.js", patch)], &rules, &SuggestionConfig::default());

        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].line, 5);
        assert_eq!(review.comments[0].body, "**Remove debug logging.** (`no-console`)");
    }

    /// Applies a comment's suggestion block to the new-side file content the
    /// way GitHub commits it: lines `start_line..=line` are replaced.
    fn commit_suggestion(file_lines: &[&str], comment: &ReviewComment) -> Vec<String> {
        let block = comment
            .body
            .split_once("```suggestion\n")
            .and_then(|(_, rest)| rest.strip_suffix("```"))
            .expect("comment carries a suggestion");
        let first = comment.start_line.unwrap_or(comment.line) as usize - 1;
        let last = comment.line as usize;

        let mut committed: Vec<String> =
            file_lines[..first].iter().map(|l| l.to_string()).collect();
        committed.extend(block.lines().map(str::to_string));
        committed.extend(file_lines[last..].iter().map(|l| l.to_string()));
        committed
    }

    fn single_rule(pattern: &str, replacement: &str) -> RuleSet {
        RuleSet::new(vec![Rule::literal(
            "rewrite",
            pattern,
            "Rewrite this call.",
            Some(replacement),
        )])
        .unwrap()
    }

    #[test]
    fn test_appended_line_keeps_surrounding_code() {
        let rules = single_rule("foo();", "foo();\nbar();");
        let patch = "@@ -1,3 +1,4 @@\n a();\n+foo();\n c();\n d();";
        let review = plan_review(&[file("a.js", patch)], &rules, &SuggestionConfig::default());

        let comment = &review.comments[0];
        assert_eq!(comment.line, 2);
        assert_eq!(comment.start_line, None);
        assert_eq!(
            commit_suggestion(&["a();", "foo();", "c();", "d();"], comment),
            vec!["a();", "foo();", "bar();", "c();", "d();"]
        );
    }

    #[test]
    fn test_multiline_replacement_within_cap_is_kept_whole() {
        let rules = single_rule("oneLiner();", "first();\nsecond();");
        let patch = "@@ -1,1 +1,2 @@\n keep();\n+oneLiner();";
        let review = plan_review(&[file("a.js", patch)], &rules, &SuggestionConfig::default());

        let comment = &review.comments[0];
        assert_eq!(comment.line, 2);
        assert!(comment.body.ends_with("```suggestion\nfirst();\nsecond();\n```"));
        assert_eq!(
            commit_suggestion(&["keep();", "oneLiner();"], comment),
            vec!["keep();", "first();", "second();"]
        );
    }

    #[test]
    fn test_multiline_replacement_over_cap_has_no_suggestion() {
        let rules = single_rule("oneLiner();", "first();\nsecond();\nthird();\nfourth();");
        let patch = "@@ -1,1 +1,2 @@\n keep();\n+oneLiner();";
        let review = plan_review(&[file("a.js", patch)], &rules, &SuggestionConfig::default());

        let comment = &review.comments[0];
        assert_eq!(comment.line, 2);
        assert_eq!(comment.start_line, None);
        assert_eq!(comment.body, "**Rewrite this call.** (`rewrite`)");
    }

    #[test]
    fn test_single_line_rewrite_commits_cleanly() {
        let patch = "@@ -10,3 +10,3 @@\n function remove() {\n-  doIt();\n+  if (confirm('Are you sure?')) {\n }";
        let review = plan_review(
            &[file("src/app.js", patch)],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );

        // File lines 10..=12 shifted down to index 0.
        let mut comment = review.comments[0].clone();
        comment.line -= 9;
        comment.start_line = comment.start_line.map(|l| l - 9);
        assert_eq!(
            commit_suggestion(
                &["function remove() {", "  if (confirm('Are you sure?')) {", "}"],
                &comment
            ),
            vec![
                "function remove() {",
                "  if (showAccessibleConfirmDialog('Are you sure?')) {",
                "}",
            ]
        );
    }

    #[test]
    fn test_files_without_patch_are_skipped() {
        let binary = FilePatch {
            filename: "logo.png".to_string(),
            status: "added".to_string(),
            patch: None,
        };
        let review = plan_review(
            &[binary],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );
        assert_eq!(review.verdict, Verdict::Approve);
        assert_eq!(review.body, "No issues found in 0 file(s).");
    }

    #[test]
    fn test_summary_counts_flagged_files() {
        let flagged = "@@ -1,0 +1,2 @@\n+alert('a');\n+confirm('b');";
        let clean = "@@ -1,0 +1,1 @@\n+ok();";
        let review = plan_review(
            &[file("a.js", flagged), file("b.js", clean)],
            &RuleSet::builtin(),
            &SuggestionConfig::default(),
        );
        assert_eq!(review.comments.len(), 2);
        assert_eq!(review.body, "Found 2 issue(s) in 1 of 2 file(s).");
        assert_eq!(review.comments[0].line, 1);
        assert_eq!(review.comments[1].line, 2);
    }

    #[test]
    fn test_format_comment_body() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            format_comment_body("r", "Msg", Some(&lines)),
            "**Msg** (`r`)\n\n```suggestion\na\nb\n```"
        );
        assert_eq!(format_comment_body("r", "Msg", None), "**Msg** (`r`)");
    }
}
