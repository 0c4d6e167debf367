//! Global error handling for dirprune
//!
//! This module provides a centralized error type shared by the walker,
//! both pruners and the archive pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ArchiveStage;

/// Global error type for dirprune operations
#[derive(Error, Debug)]
pub enum PruneError {
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A directory tree or file could not be removed
    #[error("Failed to remove '{}': {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Archive pipeline failure before the archive was published
    #[error("Archive failed while {stage}: {message}")]
    Archive { stage: ArchiveStage, message: String },

    /// Member count of the written archive does not match the manifest
    #[error(
        "Archive '{}' contains {found} files but expected {expected} (writer reported {written})",
        .archive.display()
    )]
    Verification {
        archive: PathBuf,
        expected: usize,
        written: usize,
        found: usize,
    },

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PruneError {
    /// Process exit code for this error: 2 for bad arguments, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            PruneError::PathNotFound(_) | PruneError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }

    /// Whether the failure happened before any original file could be touched
    pub fn is_before_publish(&self) -> bool {
        match self {
            PruneError::Archive { stage, .. } => stage.is_before_publish(),
            PruneError::Verification { .. } => true,
            _ => false,
        }
    }
}

/// Specialized Result type for dirprune operations
pub type Result<T> = std::result::Result<T, PruneError>;

/// Creates a PruneError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::PruneError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for tagging errors with the archive stage they happened in
pub trait ResultExt<T> {
    /// Convert the error into `PruneError::Archive` for the given stage
    fn at_stage<C, F>(self, stage: ArchiveStage, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: std::error::Error + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn at_stage<C, F>(self, stage: ArchiveStage, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| PruneError::Archive {
            stage,
            message: format!("{}: {}", f(), e),
        })
    }
}
