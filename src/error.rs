use crate::rule::DefinitionError;
use crate::safety::SafetyError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse classification of a patch failure, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A rule failed to compile or references a missing group.
    Definition,
    /// The target file does not exist.
    FileNotFound,
    /// Reading, decoding or writing the target failed.
    Io,
    /// The target resolves outside the project root, or into a protected directory.
    OutsideWorkspace,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Definition => "DefinitionError",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::Io => "IOError",
            ErrorKind::OutsideWorkspace => "OutsideWorkspace",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    /// Not produced by the engine, since rules are validated when built.
    /// Lets callers that build rules lazily report through the same type.
    #[error("invalid rule: {0}")]
    Definition(#[from] DefinitionError),

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatchError::Definition(_) => ErrorKind::Definition,
            PatchError::FileNotFound { .. } => ErrorKind::FileNotFound,
            PatchError::Io { .. } | PatchError::Encoding { .. } => ErrorKind::Io,
            PatchError::Safety(SafetyError::Canonicalize(_)) => ErrorKind::Io,
            PatchError::Safety(_) => ErrorKind::OutsideWorkspace,
        }
    }

    /// The file the error concerns, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            PatchError::FileNotFound { path }
            | PatchError::Io { path, .. }
            | PatchError::Encoding { path, .. } => Some(path),
            PatchError::Safety(SafetyError::OutsideWorkspace { path, .. })
            | PatchError::Safety(SafetyError::ForbiddenPath { path, .. }) => Some(path),
            _ => None,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            PatchError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PatchError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
