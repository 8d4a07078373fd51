//! Hands stations to the host player and mirrors what the host reports back.
//!
//! `NowPlaying` follows a pending/confirmed split: it is only set after the
//! host accepted the track, and only cleared when the host says it moved on
//! to something that is not a radio stream.

use std::sync::Arc;

use airwaves_proto::protocol::{HostTrack, Station, TrackRequest, RADIO_SOURCE_TYPE};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::host::HostPlayer;

const FALLBACK_ARTIST: &str = "Online Radio";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub station: Station,
    pub is_playing: bool,
}

/// Map a station onto the host's track metadata.
pub fn track_request(station: &Station) -> TrackRequest {
    let artist = station
        .genre
        .as_deref()
        .filter(|g| !g.trim().is_empty())
        .unwrap_or(FALLBACK_ARTIST)
        .to_string();

    let album = match (station.country_flag.as_deref(), station.country_name.as_deref()) {
        (Some(flag), Some(country)) => format!("📻 {} {}", flag, country),
        (None, Some(country)) => format!("📻 {}", country),
        _ => format!("📻 {}", FALLBACK_ARTIST),
    };

    TrackRequest {
        title: station.name.clone(),
        artist,
        album,
        duration: 0,
        cover_url: station.favicon.clone().unwrap_or_default(),
        source_type: RADIO_SOURCE_TYPE.to_string(),
        external_id: station.url.clone(),
    }
}

#[derive(Default)]
pub struct PlaybackBridge {
    now_playing: Option<NowPlaying>,
}

impl PlaybackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn is_current(&self, id: &str) -> bool {
        self.now_playing
            .as_ref()
            .is_some_and(|np| np.station.id == id)
    }

    /// Ask the host to play `station`. On failure the previous `NowPlaying`
    /// stays as it was.
    pub async fn play(
        &mut self,
        station: &Station,
        player: Option<&Arc<dyn HostPlayer>>,
    ) -> Result<(), PlaybackError> {
        let player = player.ok_or(PlaybackError::HostUnavailable)?;
        let track = track_request(station);
        debug!("playback: set_track {} -> {}", station.name, station.url);

        if let Err(e) = player.set_track(track).await {
            warn!("playback: host rejected {}: {}", station.name, e);
            return Err(e);
        }

        info!("playback: now playing {}", station.name);
        self.now_playing = Some(NowPlaying {
            station: station.clone(),
            is_playing: true,
        });
        Ok(())
    }

    /// Host play/pause notification. Returns true if anything changed.
    pub fn on_host_playback_state(&mut self, is_playing: bool) -> bool {
        match &mut self.now_playing {
            Some(np) if np.is_playing != is_playing => {
                np.is_playing = is_playing;
                true
            }
            _ => false,
        }
    }

    /// Host switched tracks. Anything that is not a radio stream clears
    /// `NowPlaying`. Returns true if it was cleared.
    pub fn on_host_track_change(&mut self, track: Option<&HostTrack>) -> bool {
        if track.is_some_and(HostTrack::is_radio) || self.now_playing.is_none() {
            return false;
        }
        debug!("playback: host moved to a non-radio track");
        self.now_playing = None;
        true
    }
}
