//! Document schema: version constants, default templates and statements.
//!
//! Every statement a [`Map`](crate::Map) issues lives here. Statements are
//! parameterized with positional `?` placeholders and are prepared through the
//! connection's statement cache.

/// Document version written by the default templates and required by `open`.
pub const CURRENT_MAP_VERSION: i64 = 2;

/// Minimum number of columns the `Meta` table must have (id, version, name).
///
/// Documents from before the version column existed have fewer.
pub const META_COLUMN_COUNT: i64 = 3;

/// Default file extension of map documents.
pub const DOCUMENT_EXTENSION: &str = "dmap";

/// Text color used when a text object is created without one.
pub const DEFAULT_TEXT_COLOR: &str = "#000";

/// Font size used when a text object is created without one.
pub const DEFAULT_FONT_SIZE: i64 = 36;

/// Default schema template (DDL).
pub const DEFAULT_SCHEMA: &str = include_str!("../sql/schema.sql");

/// Default initialization template (seeds the metadata row).
pub const DEFAULT_INIT: &str = include_str!("../sql/init.sql");

// Metadata

pub(crate) const GET_META_SIZE: &str = "SELECT COUNT(*) FROM pragma_table_info('Meta')";

pub(crate) const GET_META: &str = "SELECT version, name FROM Meta WHERE id = 1";

pub(crate) const SET_NAME: &str = "UPDATE Meta SET name = ? WHERE id = 1";

// Elements

macro_rules! element_select {
    () => {
        "SELECT
        Elements.id,
        Elements.name,
        Elements.x,
        Elements.y,
        Elements.width,
        Elements.height,
        Elements.rotation,
        Elements.background_image,
        Assets.name,
        Assets.value,
        Elements.background_color
    FROM Elements
    LEFT JOIN Assets ON Elements.background_image = Assets.id"
    };
}

pub(crate) const GET_ELEMENTS: &str = concat!(element_select!(), " ORDER BY Elements.rowid");

pub(crate) const GET_ELEMENT: &str = concat!(element_select!(), " WHERE Elements.id = ?");

pub(crate) const CREATE_ELEMENT: &str = "
    INSERT INTO Elements (name, x, y, width, height, rotation, background_image, background_color)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

pub(crate) const EDIT_ELEMENT: &str = "
    UPDATE Elements SET
        name = ?,
        x = ?,
        y = ?,
        width = ?,
        height = ?,
        rotation = ?,
        background_image = ?,
        background_color = ?
    WHERE id = ?";

pub(crate) const REMOVE_ELEMENT: &str = "DELETE FROM Elements WHERE id = ?";

pub(crate) const ELEMENT_EXISTS: &str = "SELECT EXISTS (SELECT id FROM Elements WHERE id = ?)";

pub(crate) const ELEMENT_BACKGROUND: &str = "SELECT background_image FROM Elements WHERE id = ?";

// Assets

pub(crate) const CREATE_ASSET: &str = "INSERT INTO Assets (name, value) VALUES (?, ?)";

pub(crate) const GET_ASSETS: &str = "SELECT id, name, value FROM Assets ORDER BY rowid";

pub(crate) const ASSET_EXISTS: &str = "SELECT EXISTS (SELECT id FROM Assets WHERE id = ?)";

pub(crate) const ASSET_REFERENCES: &str =
    "SELECT COUNT(*) FROM Elements WHERE background_image = ?";

pub(crate) const ASSET_REFERENCES_EXCEPT: &str =
    "SELECT COUNT(*) FROM Elements WHERE background_image = ? AND id != ?";

pub(crate) const REMOVE_ASSET: &str = "DELETE FROM Assets WHERE id = ?";

// Texts

macro_rules! text_select {
    () => {
        "SELECT id, name, value, color, font_size, x, y, rotation FROM Texts"
    };
}

pub(crate) const GET_TEXTS: &str = concat!(text_select!(), " ORDER BY rowid");

pub(crate) const GET_TEXT: &str = concat!(text_select!(), " WHERE id = ?");

pub(crate) const CREATE_TEXT: &str =
    "INSERT INTO Texts (name, value, color, font_size, x, y, rotation) VALUES (?, ?, ?, ?, ?, ?, 0)";

pub(crate) const EDIT_TEXT: &str = "
    UPDATE Texts SET
        name = ?,
        value = ?,
        color = ?,
        font_size = ?,
        x = ?,
        y = ?,
        rotation = ?
    WHERE id = ?";

pub(crate) const REMOVE_TEXT: &str = "DELETE FROM Texts WHERE id = ?";

pub(crate) const TEXT_EXISTS: &str = "SELECT EXISTS (SELECT id FROM Texts WHERE id = ?)";
