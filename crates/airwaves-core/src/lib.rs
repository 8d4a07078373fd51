//! Browsing core of the airwaves radio plugin: directory lookups with mirror
//! fallback, a TTL result cache, view navigation, favorites and custom
//! stations, and the bridge to the host player.

pub mod cache;
pub mod core;
pub mod directory;
pub mod error;
pub mod host;
pub mod library;
pub mod navigation;
pub mod persist;
pub mod playback;
pub mod storage;

pub use crate::core::{PluginCore, PluginEvent, PluginHandle, UiSnapshot};
pub use crate::error::{DirectoryError, PersistenceError, PlaybackError, ValidationError};
