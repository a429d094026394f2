use crate::config::schema::{PlanConfig, ValidationError};
use crate::plan::{FixSpec, RunPlan};
use crate::rule::{DefinitionError, Rule, RuleSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    /// A rule failed to compile; `rule` is 1-based within its fix.
    Definition {
        path: Option<PathBuf>,
        file: String,
        rule: usize,
        source: DefinitionError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml { path, source },
            ConfigError::Validation { path: None, source } => {
                ConfigError::Validation { path, source }
            }
            ConfigError::Definition {
                path: None,
                file,
                rule,
                source,
            } => ConfigError::Definition {
                path,
                file,
                rule,
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read plan from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse plan TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse plan TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid plan ({}): {}", path.display(), source),
                None => write!(f, "invalid plan: {}", source),
            },
            ConfigError::Definition {
                path,
                file,
                rule,
                source,
            } => match path {
                Some(path) => write!(
                    f,
                    "invalid rule #{rule} for '{file}' ({}): {source}",
                    path.display()
                ),
                None => write!(f, "invalid rule #{rule} for '{file}': {source}"),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Definition { source, .. } => Some(source),
        }
    }
}

/// Parse plan TOML without compiling rules.
pub fn parse_config(input: &str) -> Result<PlanConfig, ConfigError> {
    let config: PlanConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Compile every rule of a parsed config into a runnable plan.
pub fn build_plan(config: &PlanConfig) -> Result<RunPlan, ConfigError> {
    let defaults = config.meta.default_flags();

    let fixes = config
        .fixes
        .iter()
        .map(|fix| -> Result<FixSpec, ConfigError> {
            let rules = fix
                .rules
                .iter()
                .enumerate()
                .map(|(idx, def)| -> Result<Rule, ConfigError> {
                    let rule = Rule::with_flags(&def.pattern, &def.replacement, def.flags(defaults))
                        .map_err(|source| ConfigError::Definition {
                            path: None,
                            file: fix.file.clone(),
                            rule: idx + 1,
                            source,
                        })?;
                    Ok(match &def.description {
                        Some(description) => rule.describe(description),
                        None => rule,
                    })
                })
                .collect::<Result<RuleSet, ConfigError>>()?;
            Ok(FixSpec::new(&fix.file, rules))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let mut plan = RunPlan::new(config.meta.name.clone(), fixes);
    if let Some(description) = &config.meta.description {
        plan = plan.with_description(description);
    }
    if let Some(range) = &config.meta.version_range {
        plan = plan.with_version_range(range);
    }
    Ok(plan)
}

/// Parse, validate and compile a plan.
pub fn load_from_str(input: &str) -> Result<RunPlan, ConfigError> {
    build_plan(&parse_config(input)?)
}

/// Load a plan file. A plan without a `meta.name` is named after its file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RunPlan, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&contents).map_err(|error| error.with_path(path))?;
    if config.meta.name.trim().is_empty() {
        if let Some(stem) = path.file_stem() {
            config.meta.name = stem.to_string_lossy().into_owned();
        }
    }
    build_plan(&config).map_err(|error| error.with_path(path))
}
