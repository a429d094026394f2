use crate::rule::RuleFlags;
use serde::Deserialize;
use std::fmt;

/// A plan file as written on disk.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlanConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub fixes: Vec<FixDefinition>,
}

impl PlanConfig {
    /// Structural checks that do not need regex compilation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.fixes.is_empty() {
            issues.push(ValidationIssue::EmptyFixList);
        }

        for (idx, fix) in self.fixes.iter().enumerate() {
            if fix.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingFile { fix: idx + 1 });
            }
            if fix.rules.is_empty() {
                issues.push(ValidationIssue::EmptyRuleList {
                    file: fix.file.clone(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version_range: Option<String>,
    /// Default for every rule that does not set its own
    #[serde(default)]
    pub multiline: bool,
    /// Default for every rule that does not set its own
    #[serde(default)]
    pub dot_matches_new_line: bool,
}

impl Metadata {
    pub fn default_flags(&self) -> RuleFlags {
        RuleFlags {
            multiline: self.multiline,
            dot_matches_new_line: self.dot_matches_new_line,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FixDefinition {
    pub file: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    #[serde(default)]
    pub description: Option<String>,
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub multiline: Option<bool>,
    #[serde(default)]
    pub dot_matches_new_line: Option<bool>,
}

impl RuleDefinition {
    /// Per-rule flags, falling back to the plan defaults.
    pub fn flags(&self, defaults: RuleFlags) -> RuleFlags {
        RuleFlags {
            multiline: self.multiline.unwrap_or(defaults.multiline),
            dot_matches_new_line: self
                .dot_matches_new_line
                .unwrap_or(defaults.dot_matches_new_line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyFixList,
    MissingFile { fix: usize },
    EmptyRuleList { file: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyFixList => write!(f, "plan contains no fixes"),
            ValidationIssue::MissingFile { fix } => {
                write!(f, "fix #{fix} missing required field 'file'")
            }
            ValidationIssue::EmptyRuleList { file } => {
                write!(f, "fix for '{file}' has no rules")
            }
        }
    }
}
