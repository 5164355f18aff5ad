//! Store and document configuration.

use crate::error::{MapError, MapResult};
use crate::schema::{DEFAULT_INIT, DEFAULT_SCHEMA, DOCUMENT_EXTENSION};
use std::fs;
use std::path::PathBuf;

/// Source of a SQL template applied when a new document is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// Template text held in memory.
    Inline(String),
    /// Template read from a file when the store is opened.
    File(PathBuf),
}

impl Template {
    /// Loads the template text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateMissing` if a file template does not exist.
    pub fn load(&self) -> MapResult<String> {
        match self {
            Self::Inline(sql) => Ok(sql.clone()),
            Self::File(path) => {
                if !path.is_file() {
                    return Err(MapError::TemplateMissing { path: path.clone() });
                }
                Ok(fs::read_to_string(path)?)
            }
        }
    }
}

/// What happens to an element's background asset when the element is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetRetention {
    /// Leave the asset in the document.
    #[default]
    Keep,
    /// Delete the asset unless another element still references it.
    RemoveOrphans,
}

/// Configuration of a [`MapStore`](crate::MapStore) and the maps it opens.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// DDL applied to a fresh document.
    pub schema: Template,

    /// Statements applied after the schema (seeds the metadata row).
    pub init: Template,

    /// Extension, without the dot, that marks a file as a map document.
    pub extension: String,

    /// Whether to create the store folder if it doesn't exist.
    pub create_if_missing: bool,

    /// Background asset policy for removed elements.
    pub asset_retention: AssetRetention,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: Template::Inline(DEFAULT_SCHEMA.to_string()),
            init: Template::Inline(DEFAULT_INIT.to_string()),
            extension: DOCUMENT_EXTENSION.to_string(),
            create_if_missing: true,
            asset_retention: AssetRetention::Keep,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with the built-in templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema template.
    #[must_use]
    pub fn schema(mut self, template: Template) -> Self {
        self.schema = template;
        self
    }

    /// Sets the init template.
    #[must_use]
    pub fn init(mut self, template: Template) -> Self {
        self.init = template;
        self
    }

    /// Reads both templates from files.
    #[must_use]
    pub fn template_files(self, schema: impl Into<PathBuf>, init: impl Into<PathBuf>) -> Self {
        self.schema(Template::File(schema.into()))
            .init(Template::File(init.into()))
    }

    /// Sets the document extension.
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Sets whether to create the store folder if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the background asset policy for removed elements.
    #[must_use]
    pub const fn asset_retention(mut self, retention: AssetRetention) -> Self {
        self.asset_retention = retention;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.extension, "dmap");
        assert!(config.create_if_missing);
        assert_eq!(config.asset_retention, AssetRetention::Keep);
        assert_eq!(config.schema.load().unwrap(), DEFAULT_SCHEMA);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .extension(".map")
            .create_if_missing(false)
            .asset_retention(AssetRetention::RemoveOrphans);

        assert_eq!(config.extension, "map");
        assert!(!config.create_if_missing);
        assert_eq!(config.asset_retention, AssetRetention::RemoveOrphans);
    }

    #[test]
    fn file_template_loads_contents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("schema.sql");
        fs::write(&path, "CREATE TABLE Meta (id INTEGER);").unwrap();

        let template = Template::File(path);
        assert_eq!(template.load().unwrap(), "CREATE TABLE Meta (id INTEGER);");
    }

    #[test]
    fn missing_file_template_fails() {
        let temp = tempdir().unwrap();
        let template = Template::File(temp.path().join("missing.sql"));
        assert!(matches!(
            template.load(),
            Err(MapError::TemplateMissing { .. })
        ));
    }
}
