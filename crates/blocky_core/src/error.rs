//! Error types for map documents and stores.

use crate::types::{AssetId, ElementId, TextId};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Errors that can occur while working with map documents and stores.
#[derive(Debug, Error)]
pub enum MapError {
    /// Embedded database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The map has no open connection.
    #[error("map is not open")]
    NotOpen,

    /// The map already holds an open connection.
    #[error("map is already open")]
    AlreadyOpen,

    /// The backing file is missing or the location was never set.
    #[error("map file missing: {}", .path.display())]
    FileMissing {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// A document already exists at the target location.
    #[error("map already exists: {}", .path.display())]
    AlreadyExists {
        /// The occupied path.
        path: PathBuf,
    },

    /// The given path cannot be used as a document location.
    #[error("invalid path: '{}'", .path.display())]
    InvalidPath {
        /// The rejected path.
        path: PathBuf,
    },

    /// The store location exists but is not a directory.
    #[error("store location must be a directory: {}", .path.display())]
    NotADirectory {
        /// The store location.
        path: PathBuf,
    },

    /// A schema or init template file could not be found.
    #[error("map template missing: {}", .path.display())]
    TemplateMissing {
        /// The template path.
        path: PathBuf,
    },

    /// The metadata row is missing or unreadable.
    #[error("metadata of '{}' is malformed, cannot read map", .path.display())]
    MalformedMetadata {
        /// The document path.
        path: PathBuf,
    },

    /// The document predates the supported schema version.
    #[error(
        "map '{}' is outdated: found version {}, supported version is {supported}",
        .path.display(),
        .found.map_or_else(|| "none".to_string(), |v| v.to_string())
    )]
    OutdatedDocument {
        /// The document path.
        path: PathBuf,
        /// The stored version, if the document has a version column at all.
        found: Option<i64>,
        /// The version this engine reads.
        supported: i64,
    },

    /// No element with the given id exists.
    #[error("element for id '{0}' not found")]
    ElementNotFound(ElementId),

    /// No asset with the given id exists.
    #[error("asset for id '{0}' not found")]
    AssetNotFound(AssetId),

    /// No text object with the given id exists.
    #[error("text for id '{0}' not found")]
    TextNotFound(TextId),

    /// The asset is still used as a background by at least one element.
    #[error("asset '{asset_id}' is referenced by {references} element(s)")]
    AssetInUse {
        /// The asset that was to be removed.
        asset_id: AssetId,
        /// Number of elements referencing it.
        references: i64,
    },

    /// A payload failed validation before reaching the database.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },
}

impl MapError {
    /// Creates a file missing error.
    pub fn file_missing(path: impl AsRef<Path>) -> Self {
        Self::FileMissing {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl AsRef<Path>) -> Self {
        Self::InvalidPath {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a malformed metadata error.
    pub fn malformed(path: impl AsRef<Path>) -> Self {
        Self::MalformedMetadata {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates an outdated document error.
    pub fn outdated(path: impl AsRef<Path>, found: Option<i64>, supported: i64) -> Self {
        Self::OutdatedDocument {
            path: path.as_ref().to_path_buf(),
            found,
            supported,
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true for errors describing an unreadable document
    /// (malformed metadata or an outdated version).
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::MalformedMetadata { .. } | Self::OutdatedDocument { .. }
        )
    }

    /// Returns true for element, asset and text not-found errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound(_) | Self::AssetNotFound(_) | Self::TextNotFound(_)
        )
    }
}
