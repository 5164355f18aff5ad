//! Test fixtures and document helpers.
//!
//! Provides temporary stores, sample payloads, and writers for the kinds of
//! broken documents a store has to tolerate.

use blocky_core::schema::{DEFAULT_INIT, DEFAULT_SCHEMA};
use blocky_core::{BackgroundImage, ElementEditable, MapStore, StoreConfig, TextEditable};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A store in a temporary folder, removed on drop.
pub struct TestStore {
    /// The store instance.
    pub store: MapStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with a custom configuration.
    ///
    /// The store lives in a `maps` sub-folder, leaving the temporary root
    /// free for files that must sit outside the store.
    pub fn with_config(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store =
            MapStore::open(temp_dir.path().join("maps"), config).expect("Failed to open store");
        Self { store, temp_dir }
    }

    /// Returns the store folder.
    pub fn folder(&self) -> &Path {
        self.store.store_folder()
    }

    /// Returns a path outside the store folder.
    pub fn outside(&self, file_name: &str) -> PathBuf {
        self.temp_dir.path().join(file_name)
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = MapStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test with a temporary store.
///
/// # Example
///
/// ```rust,ignore
/// use blocky_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         store.create("Dungeon A", "a").unwrap();
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut MapStore) -> R,
{
    let mut test_store = TestStore::new();
    f(&mut test_store.store)
}

/// A few bytes standing in for an image.
pub fn sample_image() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d]
}

/// A one-cell room.
pub fn sample_room(name: &str) -> ElementEditable {
    ElementEditable::new(name, 0, 0, 1, 1)
}

/// A room with a freshly uploaded background image.
pub fn sample_room_with_background(name: &str) -> ElementEditable {
    sample_room(name).background_image(BackgroundImage::new(
        format!("{name}.png"),
        sample_image(),
    ))
}

/// A restyled sign.
pub fn sample_sign() -> TextEditable {
    TextEditable::new("Sign", "Beware", 10, 10)
        .color("#fff")
        .font_size(48)
}

/// Writes a complete document at `version`, typically an older one.
pub fn write_document_with_version(path: &Path, name: &str, version: i64) {
    let conn = Connection::open(path).expect("Failed to create document");
    conn.execute_batch(DEFAULT_SCHEMA).expect("Failed to apply schema");
    conn.execute_batch(DEFAULT_INIT).expect("Failed to apply init");
    conn.execute(
        "UPDATE Meta SET version = ?1, name = ?2 WHERE id = 1",
        rusqlite::params![version, name],
    )
    .expect("Failed to write metadata");
}

/// Writes a document from before the metadata table carried a version.
pub fn write_versionless_document(path: &Path, name: &str) {
    let conn = Connection::open(path).expect("Failed to create document");
    conn.execute_batch("CREATE TABLE Meta (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
        .expect("Failed to create metadata table");
    conn.execute("INSERT INTO Meta (id, name) VALUES (1, ?1)", [name])
        .expect("Failed to write metadata");
}

/// Writes an SQLite database that isn't a map document.
pub fn write_foreign_database(path: &Path) {
    let conn = Connection::open(path).expect("Failed to create database");
    conn.execute_batch(
        "CREATE TABLE Notes (id INTEGER PRIMARY KEY, body TEXT);
         INSERT INTO Notes (body) VALUES ('not a map');",
    )
    .expect("Failed to write database");
}

/// Writes a file that isn't a database at all.
pub fn write_garbage_file(path: &Path) {
    fs::write(path, b"this is not an sqlite database, it is just text bytes")
        .expect("Failed to write file");
}

/// Lists the file names in a folder, sorted.
pub fn file_names(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .expect("Failed to read folder")
        .map(|entry| {
            entry
                .expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
