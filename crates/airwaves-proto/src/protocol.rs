use serde::{Deserialize, Serialize};

/// Prefix carried by every locally created station id.
pub const CUSTOM_ID_PREFIX: &str = "custom-";

/// Badge shown in place of a country flag for user-added stations.
pub const CUSTOM_FLAG: &str = "🔧";

/// Group label used for user-added stations in mixed lists.
pub const CUSTOM_GROUP: &str = "My Stations";

/// `source_type` the host uses to tell radio streams from library tracks.
pub const RADIO_SOURCE_TYPE: &str = "radio";

/// A playable station, either from the directory or added by the user.
///
/// Field names are camelCase on the wire so records written by older
/// installs (`countryName`, `countryFlag`) still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Directory UUID, or `custom-…` for user-added stations.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Playable stream URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl Station {
    pub fn is_custom(&self) -> bool {
        self.id.starts_with(CUSTOM_ID_PREFIX)
    }

    /// Every station that reaches a rendered list must satisfy this.
    pub fn is_playable(&self) -> bool {
        !self.id.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Case-insensitive substring match on name, genre and country name.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(&q)
            || self
                .genre
                .as_deref()
                .is_some_and(|g| g.to_lowercase().contains(&q))
            || self
                .country_name
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&q))
    }
}

/// Country summary; station lists are fetched lazily per country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    /// ISO 3166-1 alpha-2, upper case.
    pub code: String,
    pub name: String,
    pub station_count: u32,
}

/// Genre tag summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub station_count: u32,
}

/// Form input for a user-added station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomStationFields {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Messages sent from the renderer to the plugin core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum UiCommand {
    Open,
    Close,
    Home,
    Back,
    OpenRegion { id: String },
    OpenCountry {
        code: String,
        #[serde(default)]
        name: Option<String>,
    },
    OpenTag { name: String },
    /// Raw search box contents; debounced by the core.
    SearchInput { text: String },
    ShowAddStation,
    AddCustomStation { fields: CustomStationFields },
    DeleteCustomStation { id: String },
    ToggleFavorite { id: String },
    Play { id: String },
}

/// Metadata handed to the host's `setTrack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Always 0: live streams have no length.
    pub duration: u32,
    pub cover_url: String,
    pub source_type: String,
    /// The stream URL doubles as the host-side identifier.
    pub external_id: String,
}

/// The host's view of the track it just switched to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostTrack {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl HostTrack {
    pub fn is_radio(&self) -> bool {
        self.source_type.as_deref() == Some(RADIO_SOURCE_TYPE)
    }
}

/// Events pushed by the host player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum HostEvent {
    PlaybackState { is_playing: bool },
    TrackChange { track: Option<HostTrack> },
}

/// Messages broadcast from the plugin core to every listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Transient notification.
    Toast { message: String, is_error: bool },
    /// WARN/ERROR log line forwarded from the tracing layer.
    Log { message: String },
}
