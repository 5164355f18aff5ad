//! Document metadata row and the version gate.
//!
//! Every document has a single `Meta` row holding its schema version and
//! display name. Documents are never upgraded: anything older than
//! [`CURRENT_MAP_VERSION`] is rejected.

use crate::error::{MapError, MapResult};
use crate::schema::{self, CURRENT_MAP_VERSION, META_COLUMN_COUNT};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Contents of the metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Schema version the document was written at.
    pub version: i64,
    /// Display name of the map.
    pub name: String,
}

impl Metadata {
    /// Reads and validates the metadata row of a document.
    ///
    /// `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// - `MalformedMetadata` if the connection does not hold a readable map
    ///   document: not a database, no `Meta` table, or no metadata row.
    /// - `OutdatedDocument` if the `Meta` table lacks the version column or
    ///   the stored version is older than [`CURRENT_MAP_VERSION`].
    pub fn read(conn: &Connection, path: &Path) -> MapResult<Self> {
        // Any failure at this point means the file is not a database we can read
        let column_count: i64 = conn
            .query_row(schema::GET_META_SIZE, [], |row| row.get(0))
            .map_err(|_| MapError::malformed(path))?;

        if column_count == 0 {
            return Err(MapError::malformed(path));
        }
        // Some old map files don't have a version column
        if column_count < META_COLUMN_COUNT {
            return Err(MapError::outdated(path, None, CURRENT_MAP_VERSION));
        }

        let row: Option<(Option<i64>, Option<String>)> = conn
            .query_row(schema::GET_META, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(|_| MapError::malformed(path))?;

        let Some((version, name)) = row else {
            return Err(MapError::malformed(path));
        };

        match version {
            Some(version) if version >= CURRENT_MAP_VERSION => Ok(Self {
                version,
                name: name.unwrap_or_default(),
            }),
            found => Err(MapError::outdated(path, found, CURRENT_MAP_VERSION)),
        }
    }
}
