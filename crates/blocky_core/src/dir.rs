//! Store folder management.
//!
//! A store is a flat folder of map documents:
//!
//! ```text
//! <store_folder>/
//! ├─ crypt.dmap
//! ├─ tower.dmap
//! └─ 0b9f...-4c1e.dmap   # imported copy
//! ```
//!
//! Only regular files carrying the document extension are considered maps.
//! Anything else in the folder is ignored.

use crate::error::{MapError, MapResult};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// The folder a [`MapStore`](crate::MapStore) manages.
#[derive(Debug, Clone)]
pub struct StoreDir {
    /// Root folder path.
    path: PathBuf,
    /// Document extension, without the dot.
    extension: String,
}

impl StoreDir {
    /// Opens or creates a store folder.
    ///
    /// # Errors
    ///
    /// - `FileMissing` if the folder doesn't exist and `create_if_missing` is false
    /// - `NotADirectory` if the path exists but is not a folder
    pub fn open(path: &Path, extension: &str, create_if_missing: bool) -> MapResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(MapError::file_missing(path));
            }
        }

        if !path.is_dir() {
            return Err(MapError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    /// Returns the folder path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the document extension, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Lists the document files in the folder, sorted by file name.
    pub fn document_paths(&self) -> MapResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if self.has_document_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    /// Resolves a file name to a path inside the folder.
    ///
    /// # Errors
    ///
    /// `InvalidPath` unless `filename` is a single plain path component.
    pub fn document_path(&self, filename: &str) -> MapResult<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.path.join(filename)),
            _ => Err(MapError::invalid_path(filename)),
        }
    }

    /// Appends the document extension to `filename` unless it already has it.
    #[must_use]
    pub fn with_extension(&self, filename: &str) -> String {
        if self.has_document_extension(Path::new(filename)) {
            filename.to_string()
        } else {
            format!("{filename}.{}", self.extension)
        }
    }

    /// Returns a fresh, collision-free document file name.
    #[must_use]
    pub fn fresh_file_name(&self) -> String {
        format!("{}.{}", Uuid::new_v4(), self.extension)
    }

    /// Matches on the file name suffix, so a bare `.dmap` counts as a document.
    fn has_document_extension(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(self.extension.as_str()))
            .is_some_and(|stem| stem.ends_with('.'))
    }

    /// Syncs the folder so created or removed documents are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> MapResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs the folder so created or removed documents are durable.
    #[cfg(not(unix))]
    pub fn sync(&self) -> MapResult<()> {
        // NTFS journals directory metadata
        Ok(())
    }
}
