//! Version gating for fix plans.
//!
//! A plan may declare `version_range = ">=1.2.0, <2.0.0"`; it is only run
//! against projects whose own version satisfies that range. The project
//! version comes from `package.json` or, failing that, `Cargo.toml`.

use semver::{Version, VersionReq};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors during version gating
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
    /// No manifest under the project root declares a version
    Unavailable { root: PathBuf, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
            VersionError::Unavailable { root, reason } => {
                write!(f, "cannot determine project version in {}: {}", root.display(), reason)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use rulefix::config::version::matches_requirement;
///
/// assert!(matches_requirement("1.4.0", Some(">=1.2.0")).unwrap());
/// assert!(!matches_requirement("1.1.9", Some(">=1.2.0")).unwrap());
///
/// // No requirement means "apply to all versions"
/// assert!(matches_requirement("0.1.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let req_str = requirement.map(str::trim).unwrap_or("");
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}

/// Read the project version from `package.json`, then `Cargo.toml`.
pub fn read_project_version(root: &Path) -> Result<String, VersionError> {
    let unavailable = |reason: String| VersionError::Unavailable {
        root: root.to_path_buf(),
        reason,
    };

    let package_json = root.join("package.json");
    if package_json.is_file() {
        let text = fs::read_to_string(&package_json)
            .map_err(|e| unavailable(format!("{}: {e}", package_json.display())))?;
        let manifest: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| unavailable(format!("{}: {e}", package_json.display())))?;
        if let Some(version) = manifest.get("version").and_then(|v| v.as_str()) {
            return Ok(version.to_string());
        }
    }

    let cargo_toml = root.join("Cargo.toml");
    if cargo_toml.is_file() {
        let text = fs::read_to_string(&cargo_toml)
            .map_err(|e| unavailable(format!("{}: {e}", cargo_toml.display())))?;
        let doc = text
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| unavailable(format!("{}: {e}", cargo_toml.display())))?;
        let version = doc
            .get("package")
            .and_then(|pkg| pkg.get("version"))
            .or_else(|| {
                doc.get("workspace")
                    .and_then(|ws| ws.get("package"))
                    .and_then(|pkg| pkg.get("version"))
            })
            .and_then(|v| v.as_str());
        if let Some(version) = version {
            return Ok(version.to_string());
        }
    }

    Err(unavailable(
        "no version in package.json or Cargo.toml".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_requirement() {
        assert!(matches_requirement("0.88.0", None).unwrap());
        assert!(matches_requirement("1.0.0", Some("   ")).unwrap());
    }

    #[test]
    fn test_compound_requirement() {
        let req = ">=1.2.0, <2.0.0";
        assert!(matches_requirement("1.2.0", Some(req)).unwrap());
        assert!(matches_requirement("1.9.9", Some(req)).unwrap());
        assert!(!matches_requirement("1.1.0", Some(req)).unwrap());
        assert!(!matches_requirement("2.0.0", Some(req)).unwrap());
    }

    #[test]
    fn test_caret_requirement() {
        let req = "^1.0";
        assert!(matches_requirement("1.0.0", Some(req)).unwrap());
        assert!(matches_requirement("1.7.3", Some(req)).unwrap());
        assert!(!matches_requirement("2.0.0", Some(req)).unwrap());
    }

    #[test]
    fn test_invalid_inputs() {
        let result = matches_requirement("not-a-version", Some(">=1.0.0"));
        assert!(matches!(result, Err(VersionError::InvalidVersion { .. })));

        let result = matches_requirement("1.0.0", Some(">=bad-version"));
        assert!(matches!(result, Err(VersionError::InvalidRequirement { .. })));
    }

    #[test]
    fn test_reads_package_json_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "field-app", "version": "1.4.2", "private": true }"#,
        )
        .unwrap();
        assert_eq!(read_project_version(dir.path()).unwrap(), "1.4.2");
    }

    #[test]
    fn test_falls_back_to_cargo_toml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{ "name": "no-version" }"#).unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[workspace.package]\nversion = \"0.9.0\"\n",
        )
        .unwrap();
        assert_eq!(read_project_version(dir.path()).unwrap(), "0.9.0");
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_project_version(dir.path());
        assert!(matches!(result, Err(VersionError::Unavailable { .. })));
    }
}
