//! A single map document.
//!
//! A [`Map`] wraps one `.dmap` file, an SQLite database holding the metadata
//! row, elements, assets and text objects. It is either closed (no connection)
//! or open (connection established and metadata version-checked). All CRUD
//! requires the open state and fails with [`MapError::NotOpen`] otherwise.
//!
//! Every mutating operation runs in its own transaction, commits before
//! returning, and then announces itself on the map's [`ChangeFeed`].
//!
//! ```rust,ignore
//! let mut map = Map::new("maps/crypt.dmap");
//! map.open()?;
//!
//! let room = map.create_element(&ElementEditable::new("Room", 0, 0, 2, 2))?;
//! map.edit_element(room.id, &room.to_editable().rotation(90))?;
//!
//! map.close();
//! ```

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ListenerId};
use crate::config::AssetRetention;
use crate::error::{MapError, MapResult};
use crate::meta::Metadata;
use crate::model::{Asset, BackgroundImage, Element, ElementEditable, MapText, TextEditable};
use crate::schema::{self, DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR};
use crate::types::{AssetId, ElementId, TextId};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use tracing::{debug, trace, warn};

/// One map document on disk.
#[derive(Debug)]
pub struct Map {
    /// Location of the document file.
    path: PathBuf,
    /// Display name from the metadata row. `None` until opened.
    name: Option<String>,
    /// Schema version from the metadata row. `None` until opened.
    version: Option<i64>,
    /// Elements as of the last refresh, kept in step with element mutations.
    elements: Option<Vec<Element>>,
    /// Open connection, owned exclusively.
    conn: Option<Connection>,
    /// Change notification.
    feed: ChangeFeed,
    /// Background asset policy for removed elements.
    asset_retention: AssetRetention,
}

impl Map {
    /// Creates a closed map referencing a document file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            version: None,
            elements: None,
            conn: None,
            feed: ChangeFeed::new(),
            asset_retention: AssetRetention::default(),
        }
    }

    /// Creates an open map from an already established connection.
    ///
    /// Used when a document has just been provisioned. The metadata row is
    /// read and version-checked exactly as [`open`](Self::open) would.
    pub fn from_connection(path: impl Into<PathBuf>, conn: Connection) -> MapResult<Self> {
        let mut map = Self::new(path);
        let meta = Metadata::read(&conn, &map.path)?;
        enforce_foreign_keys(&conn)?;
        map.name = Some(meta.name);
        map.version = Some(meta.version);
        map.conn = Some(conn);
        Ok(map)
    }

    /// Sets the background asset policy for removed elements.
    #[must_use]
    pub fn with_asset_retention(mut self, retention: AssetRetention) -> Self {
        self.asset_retention = retention;
        self
    }

    /// Returns the document location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the document's file name, its identifier within a store.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Returns the display name, if the map has been opened.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the document version, if the map has been opened.
    #[must_use]
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    /// Returns true while a connection is held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns the elements as of the last [`refresh_elements`](Self::refresh_elements).
    ///
    /// Empty until refreshed. Element mutations made through this map keep it
    /// up to date once loaded.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        self.elements.as_deref().unwrap_or(&[])
    }

    /// Opens the document.
    ///
    /// # Errors
    ///
    /// - `FileMissing` if the file does not exist
    /// - `AlreadyOpen` if the map holds a connection
    /// - `MalformedMetadata` / `OutdatedDocument` if the metadata row is
    ///   unreadable or too old; the map stays closed and unchanged
    pub fn open(&mut self) -> MapResult<()> {
        if !self.path.is_file() {
            return Err(MapError::file_missing(&self.path));
        }
        if self.conn.is_some() {
            return Err(MapError::AlreadyOpen);
        }

        // Never create: a missing file was checked above and must stay missing
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let meta = Metadata::read(&conn, &self.path)?;
        enforce_foreign_keys(&conn)?;

        debug!(path = %self.path.display(), name = %meta.name, version = meta.version, "opened map");
        self.name = Some(meta.name);
        self.version = Some(meta.version);
        self.conn = Some(conn);
        Ok(())
    }

    /// Releases the connection. Does nothing if the map is closed.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(path = %self.path.display(), error = %err, "failed to close map cleanly");
            }
            debug!(path = %self.path.display(), "closed map");
        }
        self.elements = None;
    }

    /// Closes the map and permanently removes its file.
    pub fn delete(&mut self) -> MapResult<()> {
        self.close();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "deleted map");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(MapError::file_missing(&self.path))
            }
            Err(err) => Err(err.into()),
        }
    }

    // Change notification

    /// Registers the change listener, replacing any previously registered ones.
    pub fn register_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + 'static,
    {
        self.feed.replace_listeners(listener)
    }

    /// Adds a change listener alongside the existing ones.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + 'static,
    {
        self.feed.on_change(listener)
    }

    /// Removes a change listener. Returns false if it was not registered.
    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.feed.remove_listener(id)
    }

    /// Subscribes to change events describing what changed.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Returns the change feed.
    #[must_use]
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn conn(&self) -> MapResult<&Connection> {
        self.conn.as_ref().ok_or(MapError::NotOpen)
    }

    // Metadata

    /// Renames the map. Returns the new name.
    pub fn set_name(&mut self, name: impl Into<String>) -> MapResult<&str> {
        let name = name.into();
        self.conn()?
            .prepare_cached(schema::SET_NAME)?
            .execute([&name])?;
        trace!(path = %self.path.display(), name = %name, "renamed map");
        Ok(self.name.insert(name).as_str())
    }

    // Elements

    /// Returns every element with its background asset joined in, in
    /// insertion order.
    pub fn get_elements(&self) -> MapResult<Vec<Element>> {
        let mut stmt = self.conn()?.prepare_cached(schema::GET_ELEMENTS)?;
        let elements = stmt
            .query_map([], Element::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(elements)
    }

    /// Reloads the element cache and returns it.
    pub fn refresh_elements(&mut self) -> MapResult<&[Element]> {
        let elements = self.get_elements()?;
        Ok(self.elements.insert(elements).as_slice())
    }

    /// Returns an element by id.
    pub fn get_element(&self, id: ElementId) -> MapResult<Option<Element>> {
        query_element(self.conn()?, id)
    }

    /// Checks if an element exists.
    pub fn element_exists(&self, id: ElementId) -> MapResult<bool> {
        row_exists(self.conn()?, schema::ELEMENT_EXISTS, id)
    }

    /// Creates an element, storing its background payload as a new asset if
    /// one is given.
    ///
    /// # Errors
    ///
    /// `AssetNotFound` if the payload references an asset that doesn't exist.
    pub fn create_element(&mut self, editable: &ElementEditable) -> MapResult<Element> {
        editable.validate()?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let background = match &editable.background_image {
            Some(BackgroundImage::New { name, data }) => Some(insert_asset(&tx, name, data)?),
            Some(BackgroundImage::Existing { id }) => {
                if !row_exists(&tx, schema::ASSET_EXISTS, *id)? {
                    return Err(MapError::AssetNotFound(*id));
                }
                Some(*id)
            }
            None => None,
        };

        tx.prepare_cached(schema::CREATE_ELEMENT)?.execute(params![
            editable.name,
            editable.x,
            editable.y,
            editable.width,
            editable.height,
            editable.rotation,
            background,
            editable.background_color,
        ])?;
        let id = ElementId::new(tx.last_insert_rowid());
        tx.commit()?;

        let element = query_element(conn, id)?.ok_or(MapError::ElementNotFound(id))?;
        trace!(path = %self.path.display(), %id, "created element");

        if let Some(cache) = &mut self.elements {
            cache.push(element.clone());
        }
        self.feed.emit(ChangeKind::ElementCreated(id));
        Ok(element)
    }

    /// Replaces every editable field of an element.
    ///
    /// Background handling:
    /// - a payload with an asset id references that asset as-is
    /// - a payload with new bytes stores them as a new asset
    /// - with new bytes or no background at all, the previous background asset
    ///   is deleted unless another element still uses it
    ///
    /// # Errors
    ///
    /// `ElementNotFound` if the element doesn't exist, `AssetNotFound` if the
    /// payload references an asset that doesn't exist.
    pub fn edit_element(&mut self, id: ElementId, editable: &ElementEditable) -> MapResult<Element> {
        editable.validate()?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if !row_exists(&tx, schema::ELEMENT_EXISTS, id)? {
            return Err(MapError::ElementNotFound(id));
        }
        let current: Option<AssetId> = tx
            .prepare_cached(schema::ELEMENT_BACKGROUND)?
            .query_row([id], |row| row.get(0))?;

        // The previous asset is retired only once the row no longer points at it
        let (background, retired) = match &editable.background_image {
            Some(BackgroundImage::Existing { id: asset_id }) => {
                if !row_exists(&tx, schema::ASSET_EXISTS, *asset_id)? {
                    return Err(MapError::AssetNotFound(*asset_id));
                }
                (Some(*asset_id), None)
            }
            Some(BackgroundImage::New { name, data }) => {
                (Some(insert_asset(&tx, name, data)?), current)
            }
            None => (None, current),
        };

        tx.prepare_cached(schema::EDIT_ELEMENT)?.execute(params![
            editable.name,
            editable.x,
            editable.y,
            editable.width,
            editable.height,
            editable.rotation,
            background,
            editable.background_color,
            id,
        ])?;
        if let Some(old) = retired {
            remove_unshared_asset(&tx, old, id)?;
        }
        tx.commit()?;

        let element = query_element(conn, id)?.ok_or(MapError::ElementNotFound(id))?;
        trace!(path = %self.path.display(), %id, "edited element");

        if let Some(cache) = &mut self.elements {
            if let Some(slot) = cache.iter_mut().find(|cached| cached.id == id) {
                *slot = element.clone();
            }
        }
        self.feed.emit(ChangeKind::ElementEdited(id));
        Ok(element)
    }

    /// Removes an element.
    ///
    /// The background asset is kept unless the map was configured with
    /// [`AssetRetention::RemoveOrphans`].
    pub fn remove_element(&mut self, id: ElementId) -> MapResult<()> {
        let retention = self.asset_retention;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if !row_exists(&tx, schema::ELEMENT_EXISTS, id)? {
            return Err(MapError::ElementNotFound(id));
        }
        let background: Option<AssetId> = tx
            .prepare_cached(schema::ELEMENT_BACKGROUND)?
            .query_row([id], |row| row.get(0))?;

        tx.prepare_cached(schema::REMOVE_ELEMENT)?.execute([id])?;
        if let (AssetRetention::RemoveOrphans, Some(asset_id)) = (retention, background) {
            remove_unshared_asset(&tx, asset_id, id)?;
        }
        tx.commit()?;
        trace!(path = %self.path.display(), %id, "removed element");

        if let Some(cache) = &mut self.elements {
            cache.retain(|cached| cached.id != id);
        }
        self.feed.emit(ChangeKind::ElementRemoved(id));
        Ok(())
    }

    // Assets

    /// Stores a new asset.
    pub fn create_asset(&mut self, name: &str, data: &[u8]) -> MapResult<Asset> {
        let id = insert_asset(self.conn()?, name, data)?;
        trace!(path = %self.path.display(), %id, "created asset");
        Ok(Asset {
            id,
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    /// Checks if an asset exists.
    pub fn asset_exists(&self, id: AssetId) -> MapResult<bool> {
        row_exists(self.conn()?, schema::ASSET_EXISTS, id)
    }

    /// Returns every stored asset, in insertion order.
    pub fn get_assets(&self) -> MapResult<Vec<Asset>> {
        let mut stmt = self.conn()?.prepare_cached(schema::GET_ASSETS)?;
        let assets = stmt
            .query_map([], Asset::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    /// Returns how many elements use the asset as their background.
    pub fn asset_references(&self, id: AssetId) -> MapResult<i64> {
        let count = self
            .conn()?
            .prepare_cached(schema::ASSET_REFERENCES)?
            .query_row([id], |row| row.get(0))?;
        Ok(count)
    }

    /// Removes an asset.
    ///
    /// # Errors
    ///
    /// `AssetNotFound` if it doesn't exist, `AssetInUse` while any element
    /// still references it.
    pub fn remove_asset(&mut self, id: AssetId) -> MapResult<()> {
        if !self.asset_exists(id)? {
            return Err(MapError::AssetNotFound(id));
        }
        let references = self.asset_references(id)?;
        if references > 0 {
            return Err(MapError::AssetInUse {
                asset_id: id,
                references,
            });
        }
        self.conn()?
            .prepare_cached(schema::REMOVE_ASSET)?
            .execute([id])?;
        trace!(path = %self.path.display(), %id, "removed asset");
        Ok(())
    }

    // Texts

    /// Creates a text object with default styling at pixel coordinates.
    pub fn create_text(&mut self, name: &str, value: &str, x: i64, y: i64) -> MapResult<MapText> {
        let conn = self.conn()?;
        conn.prepare_cached(schema::CREATE_TEXT)?.execute(params![
            name,
            value,
            DEFAULT_TEXT_COLOR,
            DEFAULT_FONT_SIZE,
            x,
            y,
        ])?;
        let id = TextId::new(conn.last_insert_rowid());
        let text = query_text(conn, id)?.ok_or(MapError::TextNotFound(id))?;
        trace!(path = %self.path.display(), %id, "created text");

        self.feed.emit(ChangeKind::TextCreated(id));
        Ok(text)
    }

    /// Returns a text object by id.
    pub fn get_text(&self, id: TextId) -> MapResult<Option<MapText>> {
        query_text(self.conn()?, id)
    }

    /// Returns every text object, in insertion order.
    pub fn get_text_list(&self) -> MapResult<Vec<MapText>> {
        let mut stmt = self.conn()?.prepare_cached(schema::GET_TEXTS)?;
        let texts = stmt
            .query_map([], MapText::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(texts)
    }

    /// Checks if a text object exists.
    pub fn text_exists(&self, id: TextId) -> MapResult<bool> {
        row_exists(self.conn()?, schema::TEXT_EXISTS, id)
    }

    /// Replaces every editable field of a text object.
    pub fn edit_text(&mut self, id: TextId, editable: &TextEditable) -> MapResult<MapText> {
        editable.validate()?;
        if !self.text_exists(id)? {
            return Err(MapError::TextNotFound(id));
        }
        let conn = self.conn()?;
        conn.prepare_cached(schema::EDIT_TEXT)?.execute(params![
            editable.name,
            editable.value,
            editable.color,
            editable.font_size,
            editable.x,
            editable.y,
            editable.rotation,
            id,
        ])?;
        let text = query_text(conn, id)?.ok_or(MapError::TextNotFound(id))?;
        trace!(path = %self.path.display(), %id, "edited text");

        self.feed.emit(ChangeKind::TextEdited(id));
        Ok(text)
    }

    /// Removes a text object.
    pub fn remove_text(&mut self, id: TextId) -> MapResult<()> {
        if !self.text_exists(id)? {
            return Err(MapError::TextNotFound(id));
        }
        self.conn()?
            .prepare_cached(schema::REMOVE_TEXT)?
            .execute([id])?;
        trace!(path = %self.path.display(), %id, "removed text");

        self.feed.emit(ChangeKind::TextRemoved(id));
        Ok(())
    }
}

/// Background references are checked regardless of the SQLite build's default.
fn enforce_foreign_keys(conn: &Connection) -> MapResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn row_exists<I: ToSql>(conn: &Connection, sql: &str, id: I) -> MapResult<bool> {
    let exists = conn.prepare_cached(sql)?.query_row([id], |row| row.get(0))?;
    Ok(exists)
}

fn query_element(conn: &Connection, id: ElementId) -> MapResult<Option<Element>> {
    let element = conn
        .prepare_cached(schema::GET_ELEMENT)?
        .query_row([id], Element::from_row)
        .optional()?;
    Ok(element)
}

fn query_text(conn: &Connection, id: TextId) -> MapResult<Option<MapText>> {
    let text = conn
        .prepare_cached(schema::GET_TEXT)?
        .query_row([id], MapText::from_row)
        .optional()?;
    Ok(text)
}

fn insert_asset(conn: &Connection, name: &str, data: &[u8]) -> MapResult<AssetId> {
    conn.prepare_cached(schema::CREATE_ASSET)?
        .execute(params![name, data])?;
    Ok(AssetId::new(conn.last_insert_rowid()))
}

/// Deletes `asset_id` unless an element other than `owner` references it.
fn remove_unshared_asset(conn: &Connection, asset_id: AssetId, owner: ElementId) -> MapResult<bool> {
    let others: i64 = conn
        .prepare_cached(schema::ASSET_REFERENCES_EXCEPT)?
        .query_row(params![asset_id, owner], |row| row.get(0))?;
    if others > 0 {
        trace!(%asset_id, others, "keeping shared background asset");
        return Ok(false);
    }
    conn.prepare_cached(schema::REMOVE_ASSET)?
        .execute([asset_id])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CURRENT_MAP_VERSION, DEFAULT_INIT, DEFAULT_SCHEMA};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn provision(dir: &TempDir, file: &str) -> PathBuf {
        let path = dir.path().join(file);
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(DEFAULT_SCHEMA).unwrap();
        conn.execute_batch(DEFAULT_INIT).unwrap();
        conn.execute("UPDATE Meta SET name = 'Crypt' WHERE id = 1", [])
            .unwrap();
        path
    }

    fn open_map() -> (TempDir, Map) {
        let temp = tempdir().unwrap();
        let path = provision(&temp, "crypt.dmap");
        let mut map = Map::new(path);
        map.open().unwrap();
        (temp, map)
    }

    #[test]
    fn open_reads_metadata() {
        let (_temp, map) = open_map();
        assert!(map.is_open());
        assert_eq!(map.name(), Some("Crypt"));
        assert_eq!(map.version(), Some(CURRENT_MAP_VERSION));
        assert_eq!(map.file_name(), Some("crypt.dmap"));
        assert!(map.elements().is_empty());
    }

    #[test]
    fn open_twice_fails() {
        let (_temp, mut map) = open_map();
        assert!(matches!(map.open(), Err(MapError::AlreadyOpen)));
    }

    #[test]
    fn open_missing_file_fails_without_creating_it() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.dmap");
        let mut map = Map::new(&path);

        assert!(matches!(map.open(), Err(MapError::FileMissing { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn outdated_document_leaves_map_closed() {
        let temp = tempdir().unwrap();
        let path = provision(&temp, "old.dmap");
        Connection::open(&path)
            .unwrap()
            .execute("UPDATE Meta SET version = 1 WHERE id = 1", [])
            .unwrap();

        let mut map = Map::new(&path);
        let err = map.open().unwrap_err();
        assert!(matches!(err, MapError::OutdatedDocument { .. }));
        assert!(!map.is_open());
        assert!(map.name().is_none());
        assert!(map.version().is_none());
    }

    #[test]
    fn garbage_file_is_malformed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("garbage.dmap");
        fs::write(&path, b"definitely not a database, just some bytes....").unwrap();

        let mut map = Map::new(&path);
        assert!(matches!(map.open(), Err(MapError::MalformedMetadata { .. })));
    }

    #[test]
    fn close_is_idempotent_and_blocks_crud() {
        let (_temp, mut map) = open_map();
        map.close();
        map.close();
        assert!(!map.is_open());
        assert!(matches!(map.get_elements(), Err(MapError::NotOpen)));
        assert!(matches!(
            map.create_text("a", "b", 0, 0),
            Err(MapError::NotOpen)
        ));
    }

    #[test]
    fn delete_removes_file() {
        let (_temp, mut map) = open_map();
        let path = map.path().to_path_buf();
        map.delete().unwrap();
        assert!(!path.exists());
        assert!(!map.is_open());
        assert!(matches!(map.delete(), Err(MapError::FileMissing { .. })));
    }

    #[test]
    fn set_name_persists() {
        let (_temp, mut map) = open_map();
        assert_eq!(map.set_name("Tomb").unwrap(), "Tomb");
        map.close();
        map.open().unwrap();
        assert_eq!(map.name(), Some("Tomb"));
    }

    #[test]
    fn create_element_with_new_background() {
        let (_temp, mut map) = open_map();
        let editable = ElementEditable::new("Room", -2, 3, 2, 1)
            .rotation(90)
            .background_image(BackgroundImage::new("floor.png", vec![1, 2, 3]))
            .background_color("#a0b1c2");

        let element = map.create_element(&editable).unwrap();
        let asset = element.background_image.clone().unwrap();
        assert_eq!(asset.name, "floor.png");
        assert_eq!(asset.data, vec![1, 2, 3]);
        assert_eq!(element.x, -2);
        assert_eq!(element.rotation, 90);
        assert_eq!(element.background_color.as_deref(), Some("#a0b1c2"));
        assert_eq!(map.get_element(element.id).unwrap(), Some(element));
    }

    #[test]
    fn create_element_with_unknown_asset_fails() {
        let (_temp, mut map) = open_map();
        let editable = ElementEditable::new("Room", 0, 0, 1, 1)
            .background_image(BackgroundImage::existing(AssetId::new(99)));

        assert!(matches!(
            map.create_element(&editable),
            Err(MapError::AssetNotFound(_))
        ));
        assert!(map.get_elements().unwrap().is_empty());
    }

    #[test]
    fn edit_replacing_background_removes_old_asset() {
        let (_temp, mut map) = open_map();
        let element = map
            .create_element(
                &ElementEditable::new("Room", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("old.png", vec![1])),
            )
            .unwrap();
        let old = element.background_asset_id().unwrap();

        let edited = map
            .edit_element(
                element.id,
                &element
                    .to_editable()
                    .background_image(BackgroundImage::new("new.png", vec![2])),
            )
            .unwrap();

        let new = edited.background_asset_id().unwrap();
        assert_ne!(old, new);
        assert!(!map.asset_exists(old).unwrap());
        assert!(map.asset_exists(new).unwrap());
    }

    #[test]
    fn edit_clearing_background_removes_asset() {
        let (_temp, mut map) = open_map();
        let element = map
            .create_element(
                &ElementEditable::new("Room", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("old.png", vec![1])),
            )
            .unwrap();
        let old = element.background_asset_id().unwrap();

        let mut editable = element.to_editable();
        editable.background_image = None;
        let edited = map.edit_element(element.id, &editable).unwrap();

        assert!(edited.background_image.is_none());
        assert!(!map.asset_exists(old).unwrap());
    }

    #[test]
    fn edit_keeps_asset_shared_with_other_element() {
        let (_temp, mut map) = open_map();
        let first = map
            .create_element(
                &ElementEditable::new("A", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("shared.png", vec![7])),
            )
            .unwrap();
        let shared = first.background_asset_id().unwrap();
        let second = map
            .create_element(
                &ElementEditable::new("B", 1, 0, 1, 1)
                    .background_image(BackgroundImage::existing(shared)),
            )
            .unwrap();

        let mut editable = second.to_editable();
        editable.background_image = None;
        map.edit_element(second.id, &editable).unwrap();

        assert!(map.asset_exists(shared).unwrap());
        assert_eq!(map.asset_references(shared).unwrap(), 1);
    }

    fn foreign_keys_enabled(map: &Map) -> bool {
        map.conn
            .as_ref()
            .unwrap()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap()
    }

    fn dangling_backgrounds(map: &Map) -> i64 {
        map.conn
            .as_ref()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM Elements
                 WHERE background_image IS NOT NULL
                 AND background_image NOT IN (SELECT id FROM Assets)",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn open_enforces_foreign_keys() {
        let (temp, map) = open_map();
        assert!(foreign_keys_enabled(&map));

        let path = provision(&temp, "fresh.dmap");
        let conn = Connection::open(&path).unwrap();
        conn.pragma_update(None, "foreign_keys", false).unwrap();
        let map = Map::from_connection(&path, conn).unwrap();
        assert!(foreign_keys_enabled(&map));
    }

    #[test]
    fn background_swap_leaves_no_dangling_reference() {
        for enforce in [true, false] {
            let (_temp, mut map) = open_map();
            map.conn
                .as_ref()
                .unwrap()
                .pragma_update(None, "foreign_keys", enforce)
                .unwrap();
            assert_eq!(foreign_keys_enabled(&map), enforce);

            let element = map
                .create_element(
                    &ElementEditable::new("Room", 0, 0, 1, 1)
                        .background_image(BackgroundImage::new("old.png", vec![1])),
                )
                .unwrap();
            let old = element.background_asset_id().unwrap();

            let swapped = map
                .edit_element(
                    element.id,
                    &element
                        .to_editable()
                        .background_image(BackgroundImage::new("new.png", vec![2])),
                )
                .unwrap();
            let new = swapped.background_asset_id().unwrap();
            assert!(!map.asset_exists(old).unwrap(), "enforce = {enforce}");
            assert!(map.asset_exists(new).unwrap());
            assert_eq!(map.asset_references(new).unwrap(), 1);
            assert_eq!(
                map.get_element(element.id).unwrap().unwrap().background_asset_id(),
                Some(new)
            );
            assert_eq!(dangling_backgrounds(&map), 0);

            let mut cleared = swapped.to_editable();
            cleared.background_image = None;
            map.edit_element(element.id, &cleared).unwrap();
            assert!(!map.asset_exists(new).unwrap());
            assert!(map.get_assets().unwrap().is_empty());
            assert_eq!(dangling_backgrounds(&map), 0);
        }
    }

    #[test]
    fn edit_missing_element_fails() {
        let (_temp, mut map) = open_map();
        let result = map.edit_element(ElementId::new(5), &ElementEditable::new("x", 0, 0, 1, 1));
        assert!(matches!(result, Err(MapError::ElementNotFound(_))));
    }

    #[test]
    fn remove_element_keeps_asset_by_default() {
        let (_temp, mut map) = open_map();
        let element = map
            .create_element(
                &ElementEditable::new("Room", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("floor.png", vec![1])),
            )
            .unwrap();
        let asset = element.background_asset_id().unwrap();

        map.remove_element(element.id).unwrap();
        assert!(!map.element_exists(element.id).unwrap());
        assert!(map.asset_exists(asset).unwrap());
    }

    #[test]
    fn remove_element_can_remove_orphaned_asset() {
        let temp = tempdir().unwrap();
        let path = provision(&temp, "crypt.dmap");
        let mut map = Map::new(path).with_asset_retention(AssetRetention::RemoveOrphans);
        map.open().unwrap();

        let element = map
            .create_element(
                &ElementEditable::new("Room", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("floor.png", vec![1])),
            )
            .unwrap();
        let asset = element.background_asset_id().unwrap();

        map.remove_element(element.id).unwrap();
        assert!(!map.asset_exists(asset).unwrap());
    }

    #[test]
    fn remove_asset_guards() {
        let (_temp, mut map) = open_map();
        assert!(matches!(
            map.remove_asset(AssetId::new(1)),
            Err(MapError::AssetNotFound(_))
        ));

        let element = map
            .create_element(
                &ElementEditable::new("Room", 0, 0, 1, 1)
                    .background_image(BackgroundImage::new("floor.png", vec![1])),
            )
            .unwrap();
        let asset = element.background_asset_id().unwrap();
        assert!(matches!(
            map.remove_asset(asset),
            Err(MapError::AssetInUse { references: 1, .. })
        ));

        let loose = map.create_asset("loose.png", &[9, 9]).unwrap();
        assert_eq!(map.get_assets().unwrap().len(), 2);
        map.remove_asset(loose.id).unwrap();
        assert!(!map.asset_exists(loose.id).unwrap());
    }

    #[test]
    fn element_cache_follows_mutations_once_loaded() {
        let (_temp, mut map) = open_map();
        map.create_element(&ElementEditable::new("A", 0, 0, 1, 1))
            .unwrap();
        assert!(map.elements().is_empty());

        assert_eq!(map.refresh_elements().unwrap().len(), 1);
        let b = map
            .create_element(&ElementEditable::new("B", 1, 1, 1, 1))
            .unwrap();
        assert_eq!(map.elements().len(), 2);

        map.edit_element(b.id, &b.to_editable().rotation(180))
            .unwrap();
        assert_eq!(map.elements()[1].rotation, 180);

        map.remove_element(b.id).unwrap();
        assert_eq!(map.elements().len(), 1);
    }

    #[test]
    fn text_crud() {
        let (_temp, mut map) = open_map();
        let text = map.create_text("Sign", "Beware", 10, 10).unwrap();
        assert_eq!(text.color, DEFAULT_TEXT_COLOR);
        assert_eq!(text.font_size, DEFAULT_FONT_SIZE);

        let edited = map
            .edit_text(text.id, &text.to_editable().color("#fff").font_size(48))
            .unwrap();
        assert_eq!(edited.color, "#fff");
        assert_eq!(edited.font_size, 48);
        assert_eq!(map.get_text_list().unwrap(), vec![edited]);

        map.remove_text(text.id).unwrap();
        assert!(!map.text_exists(text.id).unwrap());
        assert!(matches!(
            map.remove_text(text.id),
            Err(MapError::TextNotFound(_))
        ));
    }

    #[test]
    fn mutations_notify_but_asset_operations_do_not() {
        let (_temp, mut map) = open_map();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        map.register_change_listener(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        let rx = map.subscribe();

        let element = map
            .create_element(&ElementEditable::new("Room", 0, 0, 1, 1))
            .unwrap();
        let asset = map.create_asset("loose.png", &[1]).unwrap();
        map.remove_asset(asset.id).unwrap();
        map.set_name("Renamed").unwrap();
        map.remove_element(element.id).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        let kinds: Vec<_> = rx.try_iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::ElementCreated(element.id),
                ChangeKind::ElementRemoved(element.id)
            ]
        );
    }

    #[test]
    fn failed_mutation_does_not_notify() {
        let (_temp, mut map) = open_map();
        let rx = map.subscribe();
        assert!(map.remove_element(ElementId::new(1)).is_err());
        assert!(rx.try_recv().is_err());
    }
}
