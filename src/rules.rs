use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use serde::Deserialize;

/// A single pattern check applied to added diff lines.
///
/// A literal `pattern` doubles as the keyword used to locate the line when
/// building a suggestion; for regex rules the matched text plays that role.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub message: String,
    /// Substituted for the first match as plain text; `$` is not a capture
    /// reference. A `\n` splits it over several lines.
    pub replacement: Option<String>,
    /// Suppresses the rule on lines containing this text.
    pub unless: Option<String>,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern(Regex),
}

/// A rule hit on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub rule_id: &'a str,
    pub message: &'a str,
    pub keyword: String,
    /// The line with the replacement applied, when the rule carries one.
    pub rewritten: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    id: String,
    pattern: String,
    message: String,
    #[serde(default)]
    regex: bool,
    replacement: Option<String>,
    unless: Option<String>,
}

impl Rule {
    pub fn literal(
        id: impl Into<String>,
        pattern: impl Into<String>,
        message: impl Into<String>,
        replacement: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            replacement: replacement.map(str::to_string),
            unless: None,
            matcher: Matcher::Literal(pattern.into()),
        }
    }

    pub fn regex(
        id: impl Into<String>,
        pattern: &str,
        message: impl Into<String>,
        replacement: Option<&str>,
    ) -> Result<Self> {
        let id = id.into();
        let regex = Regex::new(pattern)
            .with_context(|| format!("Invalid regex for rule '{}': '{}'", id, pattern))?;
        Ok(Self {
            id,
            message: message.into(),
            replacement: replacement.map(str::to_string),
            unless: None,
            matcher: Matcher::Pattern(regex),
        })
    }

    pub fn unless(mut self, text: impl Into<String>) -> Self {
        self.unless = Some(text.into());
        self
    }

    /// Checks a line, returning the keyword that matched and the rewritten
    /// line if this rule suggests a replacement.
    pub fn check(&self, line: &str) -> Option<RuleMatch<'_>> {
        if self.unless.as_deref().is_some_and(|u| line.contains(u)) {
            return None;
        }

        let (keyword, rewritten) = match &self.matcher {
            Matcher::Literal(needle) => {
                if needle.is_empty() || !line.contains(needle.as_str()) {
                    return None;
                }
                let rewritten = self
                    .replacement
                    .as_deref()
                    .map(|r| line.replacen(needle.as_str(), r, 1));
                (needle.clone(), rewritten)
            }
            Matcher::Pattern(re) => {
                let found = re.find(line)?;
                let rewritten = self
                    .replacement
                    .as_deref()
                    .map(|r| re.replacen(line, 1, NoExpand(r)).into_owned());
                (found.as_str().to_string(), rewritten)
            }
        };

        Some(RuleMatch {
            rule_id: &self.id,
            message: &self.message,
            keyword,
            rewritten,
        })
    }
}

/// An ordered collection of rules with unique ids.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut set = Self::default();
        for rule in rules {
            set.push(rule)?;
        }
        Ok(set)
    }

    /// The accessibility checks run by default.
    pub fn builtin() -> Self {
        let rules = vec![
            Rule::literal(
                "accessible-confirm",
                "confirm(",
                "Use showAccessibleConfirmDialog() instead of the native confirm() dialog.",
                Some("showAccessibleConfirmDialog("),
            ),
            Rule::literal(
                "accessible-alert",
                "alert(",
                "Use showAccessibleAlertDialog() instead of the native alert() dialog.",
                Some("showAccessibleAlertDialog("),
            ),
            Rule::literal(
                "accessible-prompt",
                "prompt(",
                "Use showAccessiblePromptDialog() instead of the native prompt() dialog.",
                Some("showAccessiblePromptDialog("),
            ),
            Rule::literal(
                "img-alt",
                "<img",
                "Images need an alt attribute for screen readers.",
                Some("<img alt=\"\""),
            )
            .unless("alt="),
            Rule {
                id: "positive-tabindex".to_string(),
                message: "Avoid positive tabindex values; they break the natural focus order."
                    .to_string(),
                replacement: Some("tabindex=\"0\"".to_string()),
                unless: None,
                matcher: Matcher::Pattern(
                    Regex::new(r#"tabindex="[1-9][0-9]*""#).expect("valid builtin regex"),
                ),
            },
        ];
        Self { rules }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(content).context("Failed to parse rules file")?;
        let rules = file
            .rules
            .into_iter()
            .map(|spec| {
                let rule = if spec.regex {
                    Rule::regex(
                        spec.id,
                        &spec.pattern,
                        spec.message,
                        spec.replacement.as_deref(),
                    )?
                } else if spec.pattern.is_empty() {
                    anyhow::bail!("Rule '{}' has an empty pattern", spec.id)
                } else {
                    Rule::literal(
                        spec.id,
                        spec.pattern,
                        spec.message,
                        spec.replacement.as_deref(),
                    )
                };
                Ok(match spec.unless {
                    Some(unless) => rule.unless(unless),
                    None => rule,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file '{}'", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid rules file '{}'", path.display()))
    }

    pub fn push(&mut self, rule: Rule) -> Result<()> {
        if self.rules.iter().any(|r| r.id == rule.id) {
            anyhow::bail!("Duplicate rule id '{}'", rule.id);
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Appends `other`, rejecting ids already present.
    pub fn extend(&mut self, other: RuleSet) -> Result<()> {
        let mut seen: HashSet<String> = self.rules.iter().map(|r| r.id.clone()).collect();
        for rule in other.rules {
            if !seen.insert(rule.id.clone()) {
                anyhow::bail!("Duplicate rule id '{}'", rule.id);
            }
            self.rules.push(rule);
        }
        Ok(())
    }

    pub fn find_matches<'a>(&'a self, line: &str) -> Vec<RuleMatch<'a>> {
        self.rules.iter().filter_map(|r| r.check(line)).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
