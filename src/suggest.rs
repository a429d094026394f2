//! "Did you mean" hints for fix targets that do not exist.

use std::fs;
use std::path::{Path, PathBuf};

/// Minimum Jaro-Winkler similarity for a sibling to count as a suggestion.
const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Find the sibling of `missing` whose file name is closest to it.
///
/// Returns `None` when the parent directory is unreadable or nothing is
/// similar enough.
pub fn suggest_similar(missing: &Path) -> Option<PathBuf> {
    let wanted = missing.file_name()?.to_str()?;
    let parent = match missing.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    fs::read_dir(parent)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let score = strsim::jaro_winkler(wanted, &name);
            (score >= SIMILARITY_THRESHOLD).then_some((score, entry.path()))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, path)| path)
}
