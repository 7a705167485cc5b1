use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    suggest::{DEFAULT_CONTEXT_LINES, DEFAULT_MAX_LINES, SuggestionConfig},
    types::{Command, Repo, ReviewRequest, StatsRequest},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Args, Debug, Clone)]
struct SuggestionArgs {
    /// Largest suggestion block to post; bigger changes shrink to one line
    #[arg(
        long = "max-suggestion-lines",
        help_heading = "Suggestions",
        value_name = "NUM",
        default_value_t = DEFAULT_MAX_LINES
    )]
    pub max_lines: usize,

    /// Unchanged lines kept around a change when trimming a window
    #[arg(
        long = "context-lines",
        help_heading = "Suggestions",
        value_name = "NUM",
        default_value_t = DEFAULT_CONTEXT_LINES
    )]
    pub context_lines: usize,
}

#[derive(Args, Debug, Clone)]
struct ReviewArgs {
    /// GitHub repository in format 'owner/repo' (required for numeric PR arguments)
    #[arg(short = 'r', long = "repo", value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// PR-NUMBER|PR-URL
    pub pr: String,

    /// Additional rules file (TOML, [[rule]] tables)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Only run rules from --rules
    #[arg(long = "no-builtin-rules")]
    pub no_builtin_rules: bool,

    /// Post the review to GitHub instead of printing it
    #[arg(long)]
    pub submit: bool,

    /// Review draft pull requests too
    #[arg(long = "include-drafts")]
    pub include_drafts: bool,

    #[command(flatten)]
    pub suggestion: SuggestionArgs,
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    /// GitHub repository in format 'owner/repo'
    #[arg(short = 'r', long = "repo", value_name = "OWNER/REPO")]
    pub repo: String,

    /// Limit the number of PRs to aggregate (newest first)
    #[arg(short = 'L', long, default_value = "200", value_name = "NUM")]
    pub limit: usize,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Truncate titles to terminal width (useful with watch)
    #[arg(long = "no-wrap")]
    pub no_wrap: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum CliCommand {
    /// Check a pull request's diff against the rules and build a review
    Review(ReviewArgs),
    /// Aggregate pull request statistics for a repository
    Stats(StatsArgs),
}

#[derive(Parser, Debug)]
#[command(
    name = "autoreview",
    about = "Check GitHub pull request diffs against pattern rules and post compact, committable suggestions"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

impl SuggestionArgs {
    fn to_config(&self) -> Result<SuggestionConfig> {
        if self.max_lines == 0 {
            anyhow::bail!("--max-suggestion-lines must be at least 1");
        }
        Ok(SuggestionConfig {
            max_lines: self.max_lines,
            context_lines: self.context_lines,
        })
    }
}

fn parse_repo(repo: &str) -> Result<Repo> {
    Repo::parse(repo).map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", repo, e))
}

/// Resolves a PR argument (number or URL) against the optional `--repo`.
fn parse_pr_arg(repo: Option<&str>, pr: &str) -> Result<(Repo, u64)> {
    let pr = pr.trim();

    if pr.starts_with("https://") {
        let (pr_repo, number) = Repo::parse_url(pr)
            .map_err(|e| anyhow::anyhow!("Invalid PR URL '{}': {}", pr, e))?;
        let number =
            number.ok_or_else(|| anyhow::anyhow!("URL must contain '/pull/' in the path"))?;

        if let Some(repo) = repo {
            let expected = parse_repo(repo)?;
            if pr_repo != expected {
                anyhow::bail!(
                    "PR URL {} is from {} but --repo specifies {}",
                    pr,
                    pr_repo,
                    expected
                );
            }
        }
        return Ok((pr_repo, number));
    }

    let Some(repo) = repo else {
        anyhow::bail!("--repo is required when using PR numbers (not URLs)");
    };
    let number: u64 = pr
        .trim_start_matches('#')
        .parse()
        .with_context(|| format!("Invalid PR number: '{}'", pr))?;
    Ok((parse_repo(repo)?, number))
}

fn build_review_request(args: ReviewArgs) -> Result<ReviewRequest> {
    let (repo, number) = parse_pr_arg(args.repo.as_deref(), &args.pr)?;

    if args.no_builtin_rules && args.rules.is_none() {
        anyhow::bail!("--no-builtin-rules requires --rules");
    }

    Ok(ReviewRequest {
        repo,
        number,
        rules_file: args.rules,
        builtin_rules: !args.no_builtin_rules,
        submit: args.submit,
        include_drafts: args.include_drafts,
        suggestion: args.suggestion.to_config()?,
    })
}

fn build_stats_request(args: StatsArgs) -> Result<StatsRequest> {
    if args.limit == 0 {
        anyhow::bail!("--limit must be at least 1");
    }
    Ok(StatsRequest {
        repo: parse_repo(&args.repo)?,
        limit: args.limit,
        json: args.json,
        truncate_titles: args.no_wrap,
    })
}

/// Parses command-line arguments into a validated command.
///
/// clap errors (including `--help` and `--version`) are returned as
/// `clap::Error` inside the `anyhow::Error` so the caller can decide the
/// exit code.
pub fn parse_args<I, T>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    match cli.command {
        CliCommand::Review(args) => build_review_request(args).map(Command::Review),
        CliCommand::Stats(args) => build_stats_request(args).map(Command::Stats),
    }
}
