//! Applies one [`FixSpec`] to the file it targets.
//!
//! Each application is a single read → fold → write cycle. The file is read
//! once, every rule is folded over the in-memory text, and the result is
//! written back once, atomically (tempfile + fsync + rename). The write
//! happens even when no rule matched.

use crate::error::{ErrorKind, PatchError};
use crate::plan::FixSpec;
use crate::safety::WorkspaceGuard;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Whether the engine persists its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Write the patched content back to the target.
    #[default]
    Write,
    /// Compute the patched content but leave the file untouched.
    DryRun,
}

/// Original and patched content of a target, kept for diff output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub original: String,
    pub patched: String,
}

/// Outcome of applying one fix.
#[derive(Debug)]
#[must_use = "PatchResult should be checked for success/failure"]
pub struct PatchResult {
    /// Target path as declared in the fix
    pub path: PathBuf,
    pub succeeded: bool,
    pub error: Option<PatchError>,
    /// Content differs after the fold
    pub changed: bool,
    /// Total matches across every rule
    pub matches: usize,
    /// Present when the engine captures diffs and the fix succeeded
    pub diff: Option<ContentChange>,
}

impl PatchResult {
    fn success(path: &Path, matches: usize, change: ContentChange, keep: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            succeeded: true,
            error: None,
            changed: change.original != change.patched,
            matches,
            diff: keep.then_some(change),
        }
    }

    fn failure(path: &Path, error: PatchError) -> Self {
        Self {
            path: path.to_path_buf(),
            succeeded: false,
            error: Some(error),
            changed: false,
            matches: 0,
            diff: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(PatchError::kind)
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "Fixed: {}", self.path.display()),
            Some(error) => write!(
                f,
                "Failed: {} ({}): {}",
                self.path.display(),
                error.kind(),
                error
            ),
        }
    }
}

/// Reads, transforms and writes back the target of a [`FixSpec`].
#[derive(Debug, Clone)]
pub struct PatchEngine {
    root: PathBuf,
    guard: Option<WorkspaceGuard>,
    mode: WriteMode,
    capture_diff: bool,
}

impl PatchEngine {
    /// Relative fix targets are resolved against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            guard: None,
            mode: WriteMode::Write,
            capture_diff: false,
        }
    }

    /// Reject targets that resolve outside the guard's workspace.
    #[must_use]
    pub fn with_guard(mut self, guard: WorkspaceGuard) -> Self {
        self.root = guard.workspace_root().to_path_buf();
        self.guard = Some(guard);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep original and patched text in each successful [`PatchResult`].
    #[must_use]
    pub fn capture_diff(mut self, capture: bool) -> Self {
        self.capture_diff = capture;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Apply `fix` to its target file.
    ///
    /// Never panics; every failure is reported in the returned result and
    /// leaves the target untouched.
    pub fn apply_fix(&self, fix: &FixSpec) -> PatchResult {
        match self.try_apply(fix) {
            Ok((matches, change)) => {
                log::debug!(
                    "{}: {} match(es), changed={}",
                    fix.target().display(),
                    matches,
                    change.original != change.patched
                );
                PatchResult::success(fix.target(), matches, change, self.capture_diff)
            }
            Err(error) => {
                log::debug!("{}: {}", fix.target().display(), error);
                PatchResult::failure(fix.target(), error)
            }
        }
    }

    fn try_apply(&self, fix: &FixSpec) -> Result<(usize, ContentChange), PatchError> {
        let path = self.resolve(fix.target())?;

        let bytes = fs::read(&path).map_err(|source| PatchError::io(&path, source))?;
        let original =
            String::from_utf8(bytes).map_err(|source| PatchError::Encoding {
                path: path.clone(),
                source,
            })?;

        let (patched, matches) = fix.rules().apply_counted(&original);

        if self.mode == WriteMode::Write {
            atomic_write(&path, patched.as_bytes())
                .map_err(|source| PatchError::io(&path, source))?;
        }

        Ok((matches, ContentChange { original, patched }))
    }

    /// Resolve a fix target to the canonical path that gets rewritten.
    fn resolve(&self, target: &Path) -> Result<PathBuf, PatchError> {
        let absolute = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.root.join(target)
        };

        if !absolute.exists() {
            return Err(PatchError::FileNotFound { path: absolute });
        }

        match &self.guard {
            Some(guard) => Ok(guard.validate_path(&absolute)?),
            None => absolute
                .canonicalize()
                .map_err(|source| PatchError::io(&absolute, source)),
        }
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the target keeps its old content. The
/// target's permissions carry over and its mtime is bumped so downstream
/// incremental tooling notices the rewrite.
///
/// A target that is not writable is refused with `PermissionDenied` before
/// anything is created. When the directory refuses the tempfile but the
/// target itself is writable, the content is written in place instead.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )
    })?;

    let permissions = fs::metadata(path)?.permissions();
    if permissions.readonly() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "target is read-only",
        ));
    }
    // Opening without truncation checks ownership-based write access
    drop(OpenOptions::new().write(true).open(path)?);

    // Same directory keeps the rename on one filesystem
    let mut temp = match tempfile::NamedTempFile::new_in(parent) {
        Ok(temp) => temp,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            log::warn!(
                "{}: directory is not writable, rewriting in place",
                path.display()
            );
            return write_in_place(path, content);
        }
        Err(e) => return Err(e),
    };
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;

    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}

fn write_in_place(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    filetime::set_file_mtime(path, filetime::FileTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleFlags, RuleSet};

    fn fix(target: &str, pairs: &[(&str, &str)]) -> FixSpec {
        FixSpec::new(
            target,
            RuleSet::from_pairs(RuleFlags::MULTILINE_DOTALL, pairs.iter().copied()).unwrap(),
        )
    }

    #[test]
    fn test_apply_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("slice.ts"), "state.checkin = null;\n").unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("slice.ts", &[(r"state\.checkin", "state.checkIn")]));

        assert!(result.succeeded);
        assert!(result.changed);
        assert_eq!(result.matches, 1);
        assert_eq!(result.to_string(), "Fixed: slice.ts");
        assert_eq!(
            fs::read_to_string(dir.path().join("slice.ts")).unwrap(),
            "state.checkIn = null;\n"
        );
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("missing.ts", &[("a", "b")]));

        assert!(!result.succeeded);
        assert_eq!(result.error_kind(), Some(ErrorKind::FileNotFound));
        assert!(result.to_string().starts_with("Failed: missing.ts (FileNotFound)"));
    }

    #[test]
    fn test_invalid_utf8_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.ts");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("binary.ts", &[("a", "b")]));

        assert_eq!(result.error_kind(), Some(ErrorKind::Io));
        assert_eq!(fs::read(&path).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn test_directory_target_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("src", &[("a", "b")]));

        assert_eq!(result.error_kind(), Some(ErrorKind::Io));
    }

    #[test]
    fn test_no_match_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.ts");
        fs::write(&path, "const ok = true;\n").unwrap();
        let old = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&path, old).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("clean.ts", &[("nothing-here", "x")]));

        assert!(result.succeeded);
        assert!(!result.changed);
        assert_eq!(result.matches, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "const ok = true;\n");
        let mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert!(mtime > old);
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icons.tsx");
        fs::write(&path, r#"<Icon name="wifi-off" />"#).unwrap();

        let engine = PatchEngine::new(dir.path())
            .mode(WriteMode::DryRun)
            .capture_diff(true);
        let result = engine.apply_fix(&fix("icons.tsx", &[(r#""wifi-off""#, r#""wifi""#)]));

        assert!(result.succeeded);
        assert!(result.changed);
        let diff = result.diff.unwrap();
        assert_eq!(diff.patched, r#"<Icon name="wifi" />"#);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"<Icon name="wifi-off" />"#);
    }

    #[test]
    #[cfg(unix)]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "echo old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("script.sh", &[("old", "new")]));

        assert!(result.succeeded);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    #[cfg(unix)]
    fn test_read_only_target_is_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.ts");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("locked.ts", &[("old", "new")]));

        assert!(!result.succeeded);
        assert_eq!(result.error_kind(), Some(ErrorKind::Io));
        assert_eq!(fs::read(&path).unwrap(), b"old");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    #[cfg(unix)]
    fn test_writable_target_in_read_only_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        let path = src.join("open.ts");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o555)).unwrap();

        let engine = PatchEngine::new(dir.path());
        let result = engine.apply_fix(&fix("src/open.ts", &[("old", "new")]));

        fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(result.succeeded, "{result}");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(&src).unwrap().count(), 1);
    }

    #[test]
    fn test_guard_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("app");
        fs::create_dir(&workspace).unwrap();
        fs::write(dir.path().join("secret.ts"), "a").unwrap();

        let engine = PatchEngine::new(&workspace).with_guard(WorkspaceGuard::new(&workspace).unwrap());
        let result = engine.apply_fix(&fix("../secret.ts", &[("a", "b")]));

        assert_eq!(result.error_kind(), Some(ErrorKind::OutsideWorkspace));
        assert_eq!(fs::read_to_string(dir.path().join("secret.ts")).unwrap(), "a");
    }
}
