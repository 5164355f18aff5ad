//! # Blocky Core
//!
//! Map document storage engine for Blocky Dungeon Mapper.
//!
//! This crate provides:
//! - [`Map`]: one `.dmap` document holding grid elements, binary assets and
//!   free-positioned text, with per-operation transactions
//! - [`MapStore`]: a folder of documents that lists, creates, imports,
//!   exports and deletes them
//! - a schema version gate that rejects malformed or outdated documents
//! - change notification through listeners and channel subscriptions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blocky_core::{ElementEditable, MapStore};
//!
//! let mut store = MapStore::new("maps")?;
//! let map = store.create("Dungeon A", "dungeon-a")?;
//!
//! map.on_change(|| println!("changed"));
//! let room = map.create_element(&ElementEditable::new("Room", 0, 0, 1, 1))?;
//! map.remove_element(room.id)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod dir;
mod error;
mod map;
mod meta;
mod model;
pub mod schema;
mod store;
mod types;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ListenerId};
pub use config::{AssetRetention, StoreConfig, Template};
pub use dir::StoreDir;
pub use error::{MapError, MapResult};
pub use map::Map;
pub use meta::Metadata;
pub use model::{Asset, BackgroundImage, Element, ElementEditable, MapText, TextEditable};
pub use schema::{CURRENT_MAP_VERSION, DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR, DOCUMENT_EXTENSION};
pub use store::MapStore;
pub use types::{AssetId, ElementId, TextId};
