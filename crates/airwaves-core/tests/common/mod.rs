#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airwaves_core::error::PlaybackError;
use airwaves_core::host::{HostApi, HostPlayer, HostUi, LauncherControl};
use airwaves_core::{PluginCore, PluginHandle, UiSnapshot};
use airwaves_proto::config::Config;
use airwaves_proto::protocol::TrackRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

// ── Mock directory mirror ─────────────────────────────────────────────────────

#[derive(Clone)]
struct MirrorState {
    hits: Arc<AtomicUsize>,
    failing: bool,
    search_delays: Arc<HashMap<String, Duration>>,
}

/// A radio-browser lookalike on 127.0.0.1 with canned data.
pub struct MockMirror {
    pub url: String,
    hits: Arc<AtomicUsize>,
    server: JoinHandle<()>,
}

impl MockMirror {
    pub async fn healthy() -> Result<Self> {
        Self::start(false, HashMap::new()).await
    }

    /// Answers every request with 503.
    pub async fn failing() -> Result<Self> {
        Self::start(true, HashMap::new()).await
    }

    /// Healthy, but `search?name=<term>` waits `delay` before answering.
    pub async fn with_search_delays(delays: &[(&str, Duration)]) -> Result<Self> {
        let delays = delays
            .iter()
            .map(|(term, d)| (term.to_string(), *d))
            .collect();
        Self::start(false, delays).await
    }

    async fn start(failing: bool, search_delays: HashMap<String, Duration>) -> Result<Self> {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = MirrorState {
            hits: hits.clone(),
            failing,
            search_delays: Arc::new(search_delays),
        };
        let app = Router::new()
            .route("/json/countries", get(countries))
            .route("/json/tags", get(tags))
            .route("/json/stations/bycountrycodeexact/:code", get(by_country))
            .route("/json/stations/bytagexact/:tag", get(by_tag))
            .route("/json/stations/search", get(search))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock mirror")?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            url: format!("http://{}", addr),
            hits,
            server,
        })
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockMirror {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A URL nothing listens on.
pub async fn refused_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

fn station_json(uuid: &str, name: &str, tags: &str, country: &str, code: &str) -> Value {
    json!({
        "stationuuid": uuid,
        "name": name,
        "url": format!("http://raw.example/{}", uuid),
        "url_resolved": format!("https://stream.example/{}", uuid),
        "tags": tags,
        "country": country,
        "countrycode": code,
        "bitrate": 128,
        "favicon": ""
    })
}

const COUNTRIES: &[(&str, &str, u32)] = &[
    ("US", "United States", 900),
    ("DE", "Germany", 500),
    ("FR", "France", 300),
    ("BR", "Brazil", 200),
    ("JP", "Japan", 100),
];

fn country_name(code: &str) -> &'static str {
    COUNTRIES
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, n, _)| *n)
        .unwrap_or("Unknown")
}

fn hit(state: &MirrorState) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .failing
        .then(|| StatusCode::SERVICE_UNAVAILABLE.into_response())
}

async fn countries(State(state): State<MirrorState>) -> Response {
    if let Some(err) = hit(&state) {
        return err;
    }
    let list: Vec<Value> = COUNTRIES
        .iter()
        .map(|(code, name, count)| json!({ "name": name, "iso_3166_1": code, "stationcount": count }))
        .collect();
    Json(list).into_response()
}

async fn tags(State(state): State<MirrorState>) -> Response {
    if let Some(err) = hit(&state) {
        return err;
    }
    Json(json!([
        { "name": "pop", "stationcount": 3000 },
        { "name": "rock", "stationcount": 2500 },
        { "name": "jazz", "stationcount": 900 },
    ]))
    .into_response()
}

async fn by_country(State(state): State<MirrorState>, Path(code): Path<String>) -> Response {
    if let Some(err) = hit(&state) {
        return err;
    }
    let code = code.to_uppercase();
    let name = country_name(&code);
    let lower = code.to_lowercase();
    Json(json!([
        station_json(&format!("{}-1", lower), &format!("{} One", name), "news,talk", name, &code),
        station_json(&format!("{}-2", lower), &format!("{} Two", name), "pop", name, &lower),
        station_json(&format!("{}-3", lower), &format!("{} Three", name), "", name, &code),
        // Mislabelled record, must be filtered out.
        station_json(&format!("{}-x", lower), "Elsewhere FM", "rock", "Elsewhere", "XX"),
        // No stream URL at all, must be dropped.
        json!({ "stationuuid": format!("{}-nourl", lower), "name": "Broken", "countrycode": code }),
    ]))
    .into_response()
}

async fn by_tag(State(state): State<MirrorState>, Path(tag): Path<String>) -> Response {
    if let Some(err) = hit(&state) {
        return err;
    }
    Json(json!([
        station_json(&format!("{}-a", tag), &format!("{} Alpha", tag), &tag, "Germany", "DE"),
        station_json(&format!("{}-b", tag), &format!("{} Beta", tag), &tag, "France", "FR"),
    ]))
    .into_response()
}

async fn search(
    State(state): State<MirrorState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(err) = hit(&state) {
        return err;
    }
    let term = params.get("name").cloned().unwrap_or_default();
    if let Some(delay) = state.search_delays.get(&term) {
        tokio::time::sleep(*delay).await;
    }
    Json(json!([
        station_json(&format!("s-{}-1", term), &format!("{} Radio", term), &term, "Germany", "DE"),
        station_json(&format!("s-{}-2", term), &format!("{} FM", term), &term, "France", "FR"),
    ]))
    .into_response()
}

// ── Fake host ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPlayer {
    pub tracks: Mutex<Vec<TrackRequest>>,
    pub reject: bool,
}

#[async_trait]
impl HostPlayer for RecordingPlayer {
    async fn set_track(&self, track: TrackRequest) -> Result<(), PlaybackError> {
        self.tracks.lock().unwrap().push(track);
        if self.reject {
            return Err(PlaybackError::Rejected("host refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub slots: Mutex<Vec<(String, LauncherControl)>>,
}

impl HostUi for RecordingUi {
    fn register_slot(&self, slot: &str, control: LauncherControl) {
        self.slots.lock().unwrap().push((slot.to_string(), control));
    }
}

// ── Core harness ──────────────────────────────────────────────────────────────

pub fn config_for(mirrors: &[&str]) -> Config {
    let mut config = Config::default();
    config.directory.mirrors = mirrors.iter().map(|m| m.to_string()).collect();
    config.directory.request_timeout_secs = 5;
    config.ui.search_debounce_ms = 20;
    config
}

pub struct Harness {
    pub handle: PluginHandle,
    pub toasts: broadcast::Receiver<airwaves_proto::protocol::Broadcast>,
    pub core: JoinHandle<()>,
}

pub async fn start_core(config: &Config, host: HostApi) -> Result<Harness> {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (broadcast_tx, toasts) = broadcast::channel(64);
    let core = PluginCore::init(config, host, broadcast_tx, event_tx).await?;
    let handle = core.handle();
    let core = tokio::spawn(core.run(event_rx));
    Ok(Harness {
        handle,
        toasts,
        core,
    })
}

/// Wait (up to 5s) for a snapshot satisfying `pred`.
pub async fn wait_for(
    handle: &PluginHandle,
    pred: impl FnMut(&UiSnapshot) -> bool,
) -> Result<UiSnapshot> {
    let mut rx = handle.watch();
    let snap = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .context("timed out waiting for snapshot")?
        .context("core stopped")?
        .clone();
    Ok(snap)
}

/// Next toast message, skipping forwarded log lines.
pub async fn next_toast(
    rx: &mut broadcast::Receiver<airwaves_proto::protocol::Broadcast>,
) -> Result<(String, bool)> {
    use airwaves_proto::protocol::Broadcast;
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .context("timed out waiting for toast")??;
        if let Broadcast::Toast { message, is_error } = msg {
            return Ok((message, is_error));
        }
    }
}
