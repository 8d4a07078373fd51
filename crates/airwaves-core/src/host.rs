//! Seams to the host media player. The host hands these in on init; any of
//! them may be missing, in which case the dependent feature degrades
//! (no persistence, no playback, no launcher) instead of failing.

use std::sync::Arc;

use airwaves_proto::protocol::TrackRequest;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::{PersistenceError, PlaybackError};

/// Async string key/value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;
}

/// The host's playback entry point.
#[async_trait]
pub trait HostPlayer: Send + Sync {
    async fn set_track(&self, track: TrackRequest) -> Result<(), PlaybackError>;
}

/// Toolbar slot registration.
pub trait HostUi: Send + Sync {
    fn register_slot(&self, slot: &str, control: LauncherControl);
}

/// Slot the launcher is injected into.
pub const LAUNCHER_SLOT: &str = "playerbar:menu";

/// The single control the plugin places in the host toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherControl {
    pub id: String,
    pub label: String,
    pub icon: String,
}

impl Default for LauncherControl {
    fn default() -> Self {
        Self {
            id: "airwaves-launcher".to_string(),
            label: "Radio".to_string(),
            icon: "radio".to_string(),
        }
    }
}

/// Everything the host provides.
#[derive(Clone, Default)]
pub struct HostApi {
    pub player: Option<Arc<dyn HostPlayer>>,
    pub storage: Option<Arc<dyn KeyValueStore>>,
    pub ui: Option<Arc<dyn HostUi>>,
}

impl HostApi {
    pub fn with_player(mut self, player: Arc<dyn HostPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn HostUi>) -> Self {
        self.ui = Some(ui);
        self
    }
}
