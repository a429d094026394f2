//! Run plans: the ordered list of per-file rule sets one invocation applies.

use crate::config::version::{matches_requirement, VersionError};
use crate::rule::RuleSet;
use std::path::{Path, PathBuf};

/// A target file plus the rules to apply to it.
#[derive(Debug, Clone)]
pub struct FixSpec {
    target: PathBuf,
    rules: RuleSet,
}

impl FixSpec {
    /// Relative targets are resolved against the engine root when applied.
    pub fn new(target: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            target: target.into(),
            rules,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

/// An immutable, ordered sequence of [`FixSpec`]s.
///
/// The same file may appear more than once; each entry is a separate
/// read/transform/write cycle that sees the previous entry's output.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    name: String,
    description: Option<String>,
    version_range: Option<String>,
    fixes: Vec<FixSpec>,
}

impl RunPlan {
    pub fn new(name: impl Into<String>, fixes: Vec<FixSpec>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version_range: None,
            fixes,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict the plan to projects whose version satisfies `range`.
    #[must_use]
    pub fn with_version_range(mut self, range: impl Into<String>) -> Self {
        self.version_range = Some(range.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version_range(&self) -> Option<&str> {
        self.version_range.as_deref()
    }

    pub fn fixes(&self) -> &[FixSpec] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FixSpec> {
        self.fixes.iter()
    }

    /// Total number of rules across every fix.
    pub fn rule_count(&self) -> usize {
        self.fixes.iter().map(|fix| fix.rules().len()).sum()
    }

    /// Whether this plan targets the given project version.
    ///
    /// Plans without a version range apply to every version.
    pub fn applies_to(&self, project_version: &str) -> Result<bool, VersionError> {
        matches_requirement(project_version, self.version_range.as_deref())
    }
}

impl<'a> IntoIterator for &'a RunPlan {
    type Item = &'a FixSpec;
    type IntoIter = std::slice::Iter<'a, FixSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.fixes.iter()
    }
}
