//! TOML plan files.
//!
//! A plan file declares, in order, which files to patch and the rules to
//! apply to each. Loading a plan parses it, checks its structure and
//! compiles every rule, so a plan that loads is safe to run.

pub mod loader;
pub mod schema;
pub mod version;

pub use loader::{build_plan, load_from_path, load_from_str, parse_config, ConfigError};
pub use schema::{
    FixDefinition, Metadata, PlanConfig, RuleDefinition, ValidationError, ValidationIssue,
};
pub use version::{matches_requirement, read_project_version, VersionError};
