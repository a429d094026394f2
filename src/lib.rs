//! Rulefix: deterministic regex patching of source files
//!
//! Given an ordered list of textual correction rules per file, rulefix
//! loads each file's full text, folds its rules over it in sequence and
//! writes the result back. It exists to mechanically clear a known batch of
//! compiler or lint errors without hand editing.
//!
//! # Architecture
//!
//! - [`Rule`]: compiled pattern + replacement template with backreferences
//! - [`RuleSet`]: rules for one file, applied left to right
//! - [`FixSpec`] / [`RunPlan`]: which files get which rules, in order
//! - [`PatchEngine`]: read → fold → atomic write for one fix
//! - [`Runner`]: drives the engine over a plan under a [`FailurePolicy`]
//!
//! Rules are validated when built, so a plan that exists can only fail on
//! I/O. A rule that matches nothing leaves the text unchanged.
//!
//! # Example
//!
//! ```no_run
//! use rulefix::{FixSpec, PatchEngine, RuleFlags, RuleSet, RunPlan, Runner};
//!
//! let rules = RuleSet::from_pairs(
//!     RuleFlags::NONE,
//!     [(r"\(state, action\)", "(state, _action)")],
//! )?;
//! let plan = RunPlan::new(
//!     "unused-params",
//!     vec![FixSpec::new("src/store/NotificationSlice.ts", rules)],
//! );
//!
//! let summary = Runner::new(PatchEngine::new(".")).run(&plan);
//! println!("{summary}");
//! # Ok::<(), rulefix::DefinitionError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod plan;
pub mod rule;
pub mod runner;
pub mod safety;
pub mod suggest;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, VersionError};
pub use engine::{ContentChange, PatchEngine, PatchResult, WriteMode};
pub use error::{ErrorKind, PatchError};
pub use plan::{FixSpec, RunPlan};
pub use rule::{DefinitionError, Rule, RuleFlags, RuleSet, Template};
pub use runner::{FailurePolicy, Runner, Summary};
pub use safety::{SafetyError, WorkspaceGuard};
pub use suggest::suggest_similar;
