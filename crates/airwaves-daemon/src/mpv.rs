//! Host player backed by a plain `mpv --no-video <url>` child.
//!
//! One child at a time: `set_track` kills the previous one before spawning.
//! Each child gets a watcher task that owns it; when the stream ends on its
//! own the watcher reports `PlaybackState { is_playing: false }` to the core.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use airwaves_core::error::PlaybackError;
use airwaves_core::host::HostPlayer;
use airwaves_core::PluginEvent;
use airwaves_proto::protocol::{HostEvent, TrackRequest};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

pub struct MpvPlayer {
    binary: Option<PathBuf>,
    volume: f32,
    event_tx: mpsc::Sender<PluginEvent>,
    /// Stop signal for the running child's watcher.
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl MpvPlayer {
    pub fn new(binary: Option<PathBuf>, volume: f32, event_tx: mpsc::Sender<PluginEvent>) -> Self {
        match &binary {
            Some(path) => info!("mpv: using {}", path.display()),
            None => warn!("mpv: binary not found, playback disabled"),
        }
        Self {
            binary,
            volume,
            event_tx,
            current: Mutex::new(None),
        }
    }

    /// Stop whatever is playing.
    pub async fn stop(&self) {
        if let Some(stop) = self.current.lock().await.take() {
            let _ = stop.send(());
        }
    }

    fn spawn_child(&self, binary: &Path, track: &TrackRequest) -> std::io::Result<Child> {
        let vol_arg = format!(
            "--volume={}",
            (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        Command::new(binary)
            .arg("--no-video")
            .arg("--quiet")
            .arg(vol_arg)
            .arg(format!("--force-media-title={}", track.title))
            .arg(&track.external_id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

#[async_trait]
impl HostPlayer for MpvPlayer {
    async fn set_track(&self, track: TrackRequest) -> Result<(), PlaybackError> {
        let binary = self.binary.as_ref().ok_or(PlaybackError::HostUnavailable)?;

        let mut current = self.current.lock().await;
        if let Some(stop) = current.take() {
            let _ = stop.send(());
        }

        let child = self
            .spawn_child(binary, &track)
            .map_err(|e| PlaybackError::Rejected(e.to_string()))?;
        info!("mpv: playing {} ({})", track.title, track.external_id);

        let (stop_tx, stop_rx) = oneshot::channel();
        *current = Some(stop_tx);
        tokio::spawn(watch_child(child, stop_rx, self.event_tx.clone(), track.title));
        Ok(())
    }
}

async fn watch_child(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    event_tx: mpsc::Sender<PluginEvent>,
    title: String,
) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!("mpv: {} ended ({})", title, status),
                Err(e) => warn!("mpv: waiting on {} failed: {}", title, e),
            }
            let _ = event_tx
                .send(PluginEvent::Host(HostEvent::PlaybackState { is_playing: false }))
                .await;
        }
        _ = stop_rx => {
            debug!("mpv: stopping {}", title);
            let _ = child.kill().await;
        }
    }
}
