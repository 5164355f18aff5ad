//! Map objects and their editable forms.
//!
//! [`Element`], [`Asset`] and [`MapText`] are what a document stores.
//! [`ElementEditable`] and [`TextEditable`] are the payloads the editor sends
//! for create and edit. All of them serialize to the dict-like shape the
//! editor's property panels work with (asset bytes become a list of integers).

use crate::error::{MapError, MapResult};
use crate::schema::{DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR};
use crate::types::{AssetId, ElementId, TextId};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A named binary blob, typically an image, owned by a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Database-assigned id.
    pub id: AssetId,
    /// Display name, usually the original file name.
    pub name: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Asset {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            data: row.get::<_, Option<Vec<u8>>>(2)?.unwrap_or_default(),
        })
    }
}

/// Background image of an element in an editable payload.
///
/// A payload carrying an `id` reuses that stored asset untouched; a payload
/// without one creates a new asset from `name` and `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundImage {
    /// Reference an asset already stored in the document.
    Existing {
        /// The stored asset.
        id: AssetId,
    },
    /// Store new bytes as an asset and reference it.
    New {
        /// Asset name.
        name: String,
        /// Asset bytes.
        data: Vec<u8>,
    },
}

impl BackgroundImage {
    /// Creates a payload that stores new bytes.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::New {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Creates a payload that reuses a stored asset.
    #[must_use]
    pub const fn existing(id: AssetId) -> Self {
        Self::Existing { id }
    }
}

/// A rectangular grid cell on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Database-assigned id.
    pub id: ElementId,
    /// Optional display name.
    pub name: Option<String>,
    /// Grid column.
    pub x: i64,
    /// Grid row.
    pub y: i64,
    /// Width in grid units.
    pub width: i64,
    /// Height in grid units.
    pub height: i64,
    /// Rotation of the content in degrees.
    pub rotation: i64,
    /// Background asset, joined in on read.
    pub background_image: Option<Asset>,
    /// Flat background color. Stored independently of the image; the image
    /// wins when rendering.
    pub background_color: Option<String>,
}

impl Element {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let asset_id: Option<AssetId> = row.get(7)?;
        let background_image = match asset_id {
            Some(id) => Some(Asset {
                id,
                name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                data: row.get::<_, Option<Vec<u8>>>(9)?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            x: row.get(2)?,
            y: row.get(3)?,
            width: row.get(4)?,
            height: row.get(5)?,
            rotation: row.get(6)?,
            background_image,
            background_color: row.get(10)?,
        })
    }

    /// Returns the editable form of this element.
    ///
    /// The background, if any, is referenced by id so that submitting the
    /// payload unchanged does not duplicate the asset.
    #[must_use]
    pub fn to_editable(&self) -> ElementEditable {
        ElementEditable {
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            background_image: self
                .background_image
                .as_ref()
                .map(|asset| BackgroundImage::existing(asset.id)),
            background_color: self.background_color.clone(),
        }
    }

    /// Returns the id of the background asset, if any.
    #[must_use]
    pub fn background_asset_id(&self) -> Option<AssetId> {
        self.background_image.as_ref().map(|asset| asset.id)
    }
}

/// Create/edit payload for an element. Edits replace every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementEditable {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Grid column.
    pub x: i64,
    /// Grid row.
    pub y: i64,
    /// Width in grid units.
    pub width: i64,
    /// Height in grid units.
    pub height: i64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: i64,
    /// Background image to reference or create.
    #[serde(default)]
    pub background_image: Option<BackgroundImage>,
    /// Flat background color.
    #[serde(default)]
    pub background_color: Option<String>,
}

impl ElementEditable {
    /// Creates a payload with no rotation and no background.
    pub fn new(name: impl Into<String>, x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            name: Some(name.into()),
            x,
            y,
            width,
            height,
            rotation: 0,
            background_image: None,
            background_color: None,
        }
    }

    /// Sets the rotation.
    #[must_use]
    pub fn rotation(mut self, rotation: i64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the background image.
    #[must_use]
    pub fn background_image(mut self, image: BackgroundImage) -> Self {
        self.background_image = Some(image);
        self
    }

    /// Sets the background color.
    #[must_use]
    pub fn background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    /// Checks the payload before it reaches the database.
    pub fn validate(&self) -> MapResult<()> {
        if let Some(color) = &self.background_color {
            validate_color("background_color", color)?;
        }
        Ok(())
    }
}

/// A freely positioned text label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapText {
    /// Database-assigned id.
    pub id: TextId,
    /// Optional display name.
    pub name: Option<String>,
    /// The text content.
    pub value: Option<String>,
    /// Hex color.
    pub color: String,
    /// Font size in pixels.
    pub font_size: i64,
    /// Pixel x coordinate.
    pub x: i64,
    /// Pixel y coordinate.
    pub y: i64,
    /// Rotation in degrees.
    pub rotation: i64,
}

impl MapText {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            value: row.get(2)?,
            color: row
                .get::<_, Option<String>>(3)?
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            font_size: row.get::<_, Option<i64>>(4)?.unwrap_or(DEFAULT_FONT_SIZE),
            x: row.get(5)?,
            y: row.get(6)?,
            rotation: row.get(7)?,
        })
    }

    /// Returns the editable form of this text object.
    #[must_use]
    pub fn to_editable(&self) -> TextEditable {
        TextEditable {
            name: self.name.clone(),
            value: self.value.clone(),
            color: self.color.clone(),
            font_size: self.font_size,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
        }
    }
}

/// Edit payload for a text object. Edits replace every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEditable {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// The text content.
    #[serde(default)]
    pub value: Option<String>,
    /// Hex color.
    #[serde(default = "default_color")]
    pub color: String,
    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: i64,
    /// Pixel x coordinate.
    pub x: i64,
    /// Pixel y coordinate.
    pub y: i64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: i64,
}

impl TextEditable {
    /// Creates a payload with default styling.
    pub fn new(name: impl Into<String>, value: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            color: default_color(),
            font_size: DEFAULT_FONT_SIZE,
            x,
            y,
            rotation: 0,
        }
    }

    /// Sets the color.
    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Sets the font size.
    #[must_use]
    pub fn font_size(mut self, font_size: i64) -> Self {
        self.font_size = font_size;
        self
    }

    /// Sets the rotation.
    #[must_use]
    pub fn rotation(mut self, rotation: i64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Checks the payload before it reaches the database.
    pub fn validate(&self) -> MapResult<()> {
        validate_color("color", &self.color)?;
        if self.font_size <= 0 {
            return Err(MapError::invalid_input(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        Ok(())
    }
}

fn default_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

fn default_font_size() -> i64 {
    DEFAULT_FONT_SIZE
}

/// Accepts `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa`.
pub(crate) fn validate_color(field: &str, color: &str) -> MapResult<()> {
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(MapError::invalid_input(format!(
            "{field} must be a hex color like #000 or #a0b1c2, got '{color}'"
        )))
    }
}
