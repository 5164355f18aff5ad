//! The map store: a folder of map documents.
//!
//! [`MapStore`] is the top-level entry point. It lists, creates, imports,
//! exports and deletes documents in its folder, and caches the [`Map`]s it
//! has opened by file name.
//!
//! # Failure semantics
//!
//! - folder and template problems are fatal when the store is opened
//! - a document that cannot be opened during [`MapStore::list`] is logged
//!   and skipped, so one corrupt file never hides the rest of the store
//! - everything else is returned to the caller
//!
//! # Example
//!
//! ```rust,ignore
//! use blocky_core::{MapStore, StoreConfig};
//!
//! let mut store = MapStore::open("maps", StoreConfig::default())?;
//! store.create("Dungeon A", "dungeon-a")?;
//!
//! for map in store.list(false)? {
//!     println!("{:?}: {:?}", map.file_name(), map.name());
//! }
//! store.close();
//! ```

use crate::config::{AssetRetention, StoreConfig};
use crate::dir::StoreDir;
use crate::error::{MapError, MapResult};
use crate::map::Map;
use rusqlite::Connection;
use std::collections::btree_map::{BTreeMap, Entry};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A folder of map documents with a cache of open maps.
///
/// The store is meant for single-threaded use: it hands out `&mut Map`
/// borrows tied to itself.
#[derive(Debug)]
pub struct MapStore {
    dir: StoreDir,
    /// Schema DDL applied to new documents.
    schema: String,
    /// Seed statements applied after the schema.
    init: String,
    asset_retention: AssetRetention,
    /// Open maps keyed by file name.
    maps: BTreeMap<String, Map>,
}

impl MapStore {
    /// Opens a store folder with the default configuration.
    pub fn new(path: impl AsRef<Path>) -> MapResult<Self> {
        Self::open(path, StoreConfig::default())
    }

    /// Opens a store folder.
    ///
    /// The folder is created if missing (unless disabled in `config`) and
    /// both document templates are loaded up front.
    ///
    /// # Errors
    ///
    /// - `NotADirectory` if the path is not a folder
    /// - `TemplateMissing` if a template file doesn't exist
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> MapResult<Self> {
        let path = path.as_ref();
        let dir = StoreDir::open(path, &config.extension, config.create_if_missing)?;
        let schema = config.schema.load()?;
        let init = config.init.load()?;

        info!(path = %path.display(), "opened map store");
        Ok(Self {
            dir,
            schema,
            init,
            asset_retention: config.asset_retention,
            maps: BTreeMap::new(),
        })
    }

    /// Returns the store folder.
    #[must_use]
    pub fn store_folder(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the number of cached maps.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.maps.len()
    }

    fn new_map(&self, path: PathBuf) -> Map {
        Map::new(path).with_asset_retention(self.asset_retention)
    }

    /// Lists the maps in the store, ordered by file name.
    ///
    /// With `no_refresh` the cache is returned as is, which may be stale if
    /// files were changed behind the store's back. Otherwise every cached map
    /// is closed and the folder is rescanned. Documents that fail to open are
    /// logged and left out.
    pub fn list(&mut self, no_refresh: bool) -> MapResult<Vec<&mut Map>> {
        if !no_refresh {
            self.rescan()?;
        }
        Ok(self.maps.values_mut().collect())
    }

    fn rescan(&mut self) -> MapResult<()> {
        self.close();

        for path in self.dir.document_paths()? {
            let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                warn!(path = %path.display(), "skipping map with non UTF-8 file name");
                continue;
            };
            let filename = filename.to_string();

            let mut map = self.new_map(path);
            match map.open() {
                Ok(()) => {
                    self.maps.insert(filename, map);
                }
                Err(err) => {
                    warn!(path = %map.path().display(), error = %err, "skipping unreadable map");
                }
            }
        }

        debug!(path = %self.dir.path().display(), count = self.maps.len(), "rescanned map store");
        Ok(())
    }

    /// Returns the map stored under `filename`, opening and caching it if
    /// needed. Returns `None` if there is no such file.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if `filename` is not a plain file name, or whatever
    /// [`Map::open`] fails with.
    pub fn get(&mut self, filename: &str) -> MapResult<Option<&mut Map>> {
        let path = self.dir.document_path(filename)?;

        match self.maps.entry(filename.to_string()) {
            Entry::Occupied(entry) => {
                let map = entry.into_mut();
                if !map.is_open() {
                    map.open()?;
                }
                Ok(Some(map))
            }
            Entry::Vacant(entry) => {
                if !path.is_file() {
                    return Ok(None);
                }
                let mut map = Map::new(path).with_asset_retention(self.asset_retention);
                map.open()?;
                Ok(Some(entry.insert(map)))
            }
        }
    }

    /// Creates a new document named `name` in `filename`.
    ///
    /// The document extension is appended to `filename` if missing. The new
    /// map is open and cached.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for an empty or nested `filename`, `AlreadyExists` if the
    /// file exists. On any failure while provisioning, the partial file is
    /// removed.
    pub fn create(&mut self, name: &str, filename: &str) -> MapResult<&mut Map> {
        if filename.is_empty() {
            return Err(MapError::invalid_path(filename));
        }
        let filename = self.dir.with_extension(filename);
        let path = self.dir.document_path(&filename)?;
        if path.exists() {
            return Err(MapError::already_exists(&path));
        }

        let map = match self.provision(&path, name) {
            Ok(map) => map,
            Err(err) => {
                remove_partial(&path);
                return Err(err);
            }
        };
        self.dir.sync()?;
        info!(path = %path.display(), name, "created map");

        Ok(self.cache(filename, map))
    }

    fn provision(&self, path: &Path, name: &str) -> MapResult<Map> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&self.schema)?;
        conn.execute_batch(&self.init)?;

        let mut map = Map::from_connection(path, conn)?.with_asset_retention(self.asset_retention);
        map.set_name(name)?;
        Ok(map)
    }

    fn cache(&mut self, filename: String, map: Map) -> &mut Map {
        match self.maps.entry(filename) {
            Entry::Occupied(mut entry) => {
                entry.insert(map).close();
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(map),
        }
    }

    /// Copies the document stored under `filename` to `destination`.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if `destination` has no file name or is the document
    /// itself, `FileMissing` if the document doesn't exist.
    pub fn export(&self, filename: &str, destination: impl AsRef<Path>) -> MapResult<()> {
        let destination = destination.as_ref();
        if destination.file_name().is_none() {
            return Err(MapError::invalid_path(destination));
        }
        let source = self.dir.document_path(filename)?;
        if !source.is_file() {
            return Err(MapError::file_missing(&source));
        }
        // Copying a file onto itself truncates it before anything is read
        if fs::canonicalize(destination).ok() == Some(fs::canonicalize(&source)?) {
            return Err(MapError::invalid_path(destination));
        }

        fs::copy(&source, destination)?;
        info!(source = %source.display(), destination = %destination.display(), "exported map");
        Ok(())
    }

    /// Imports an external document under a fresh file name.
    ///
    /// The source is opened once to validate it. Returns `None` without
    /// copying anything if it is malformed or outdated.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for an empty path, `FileMissing` if the source doesn't exist.
    pub fn add(&mut self, source: impl AsRef<Path>) -> MapResult<Option<&mut Map>> {
        let source = source.as_ref();
        if source.as_os_str().is_empty() {
            return Err(MapError::invalid_path(source));
        }
        if !source.is_file() {
            return Err(MapError::file_missing(source));
        }

        let mut candidate = Map::new(source);
        match candidate.open() {
            Ok(()) => candidate.close(),
            Err(err) if err.is_integrity() => {
                error!(path = %source.display(), error = %err, "refusing to import map");
                return Ok(None);
            }
            Err(err) => return Err(err),
        }

        let filename = self.dir.fresh_file_name();
        let target = self.dir.document_path(&filename)?;
        fs::copy(source, &target)?;

        let mut map = self.new_map(target);
        if let Err(err) = map.open() {
            remove_partial(map.path());
            return Err(err);
        }
        self.dir.sync()?;
        info!(source = %source.display(), filename = %filename, "imported map");

        Ok(Some(self.cache(filename, map)))
    }

    /// Closes the map stored under `filename`, drops it from the cache and
    /// deletes its file.
    pub fn delete(&mut self, filename: &str) -> MapResult<()> {
        let path = self.dir.document_path(filename)?;

        match self.maps.remove(filename) {
            Some(mut map) => map.delete()?,
            None => match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(MapError::file_missing(&path));
                }
                Err(err) => return Err(err.into()),
            },
        }
        self.dir.sync()?;
        info!(path = %path.display(), "deleted map");
        Ok(())
    }

    /// Closes every cached map and empties the cache.
    pub fn close(&mut self) {
        for map in self.maps.values_mut() {
            map.close();
        }
        self.maps.clear();
    }
}

fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove partial map");
        }
    }
}
