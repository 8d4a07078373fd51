//! PluginCore: single-owner event loop for all plugin state.
//!
//! Created on init and dropped on shutdown. Navigation, favorites, custom
//! stations and now-playing live here and nowhere else; renderers, the host
//! player and background fetches talk to it by sending `PluginEvent`s.
//!
//! Directory fetches and the search debounce timer run as spawned tasks and
//! report back with a token. The navigation controller decides whether the
//! token still belongs to a frame; the debounce timer is aborted outright
//! when a newer keystroke arrives.
//!
//! After each event the core publishes a fresh `UiSnapshot` on a `watch`
//! channel. Toasts go out on the broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use airwaves_proto::config::Config;
use airwaves_proto::protocol::{
    Broadcast, CustomStationFields, HostEvent, Station, UiCommand,
};
use airwaves_proto::regions::{self, Region, REGIONS};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::directory::{flag_emoji, DirectoryClient};
use crate::error::{DirectoryError, ValidationError};
use crate::host::{HostApi, LauncherControl, LAUNCHER_SLOT};
use crate::library::Library;
use crate::navigation::{
    Header, NavigationController, View, ViewData, ViewKind, ADD_STATION_TITLE,
};
use crate::persist::Persister;
use crate::playback::{NowPlaying, PlaybackBridge};

// ── PluginEvent ───────────────────────────────────────────────────────────────

/// All inputs into the PluginCore loop.
#[derive(Debug)]
pub enum PluginEvent {
    /// A command from the renderer.
    Command(UiCommand),
    /// Form submission that wants the outcome back (HTTP API).
    AddCustomStation {
        fields: CustomStationFields,
        reply: oneshot::Sender<Result<Station, ValidationError>>,
    },
    /// Notification from the host player.
    Host(HostEvent),
    /// A directory fetch finished; `token` names the frame it was for.
    FetchSettled { token: u64, data: ViewData },
    /// The search debounce timer fired.
    SearchDue { token: u64, query: String },
    Shutdown,
}

// ── UiSnapshot ────────────────────────────────────────────────────────────────

/// Everything a renderer needs to draw the panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    pub is_open: bool,
    pub header: Header,
    pub view: View,
    pub data: ViewData,
    pub search_text: String,
    pub favorites: Vec<Station>,
    pub favorite_ids: Vec<String>,
    /// Favorites saved without a snapshot that no listing has shown yet.
    pub unresolved_favorites: usize,
    pub custom: Vec<Station>,
    pub regions: &'static [Region],
    pub now_playing: Option<NowPlaying>,
    pub form_error: Option<String>,
}

// ── PluginHandle ──────────────────────────────────────────────────────────────

/// Cloneable front door to a running core.
#[derive(Clone)]
pub struct PluginHandle {
    event_tx: mpsc::Sender<PluginEvent>,
    snapshot_rx: watch::Receiver<UiSnapshot>,
    broadcast_tx: broadcast::Sender<Broadcast>,
}

impl PluginHandle {
    /// Returns false once the core has stopped.
    pub async fn send(&self, cmd: UiCommand) -> bool {
        self.event_tx.send(PluginEvent::Command(cmd)).await.is_ok()
    }

    pub async fn host_event(&self, event: HostEvent) -> bool {
        self.event_tx.send(PluginEvent::Host(event)).await.is_ok()
    }

    /// Submit the add-station form and wait for the result. `None` if the
    /// core is gone.
    pub async fn add_custom_station(
        &self,
        fields: CustomStationFields,
    ) -> Option<Result<Station, ValidationError>> {
        let (reply, rx) = oneshot::channel();
        self.event_tx
            .send(PluginEvent::AddCustomStation { fields, reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<UiSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.broadcast_tx.subscribe()
    }

    pub async fn shutdown(&self) {
        let _ = self.event_tx.send(PluginEvent::Shutdown).await;
    }
}

// ── PluginCore ────────────────────────────────────────────────────────────────

pub struct PluginCore {
    host: HostApi,
    directory: Arc<DirectoryClient>,
    library: Library,
    nav: NavigationController,
    playback: PlaybackBridge,
    /// Our own sender, handed to spawned fetches and timers.
    event_tx: mpsc::Sender<PluginEvent>,
    broadcast_tx: broadcast::Sender<Broadcast>,
    snapshot_tx: watch::Sender<UiSnapshot>,
    is_open: bool,
    search_text: String,
    search_seq: u64,
    search_timer: Option<AbortHandle>,
    form_error: Option<String>,
    debounce: Duration,
    search_min_chars: usize,
    tag_limit: usize,
}

impl PluginCore {
    /// Build the directory client from `config` and initialise.
    pub async fn init(
        config: &Config,
        host: HostApi,
        broadcast_tx: broadcast::Sender<Broadcast>,
        event_tx: mpsc::Sender<PluginEvent>,
    ) -> anyhow::Result<Self> {
        let cache = Arc::new(crate::cache::ResultCache::from_config(&config.cache));
        let directory = Arc::new(DirectoryClient::new(&config.directory, cache)?);
        Ok(Self::with_directory(config, host, directory, broadcast_tx, event_tx).await)
    }

    /// Load the library, register the launcher and publish the first snapshot.
    pub async fn with_directory(
        config: &Config,
        host: HostApi,
        directory: Arc<DirectoryClient>,
        broadcast_tx: broadcast::Sender<Broadcast>,
        event_tx: mpsc::Sender<PluginEvent>,
    ) -> Self {
        let persister = Persister::spawn(host.storage.clone());
        let library = Library::load(host.storage.as_ref(), persister).await;

        match &host.ui {
            Some(ui) => ui.register_slot(LAUNCHER_SLOT, LauncherControl::default()),
            None => debug!("PluginCore: host has no UI slots, launcher not registered"),
        }

        let nav = NavigationController::new();
        let (snapshot_tx, _) = watch::channel(UiSnapshot {
            is_open: false,
            header: nav.header(),
            view: nav.current().view.clone(),
            data: nav.current().data.clone(),
            search_text: String::new(),
            favorites: library.favorites().stations(),
            favorite_ids: library.favorites().ids().map(String::from).collect(),
            unresolved_favorites: library.favorites().unresolved(),
            custom: library.custom().list().to_vec(),
            regions: REGIONS,
            now_playing: None,
            form_error: None,
        });

        Self {
            host,
            directory,
            library,
            nav,
            playback: PlaybackBridge::new(),
            event_tx,
            broadcast_tx,
            snapshot_tx,
            is_open: false,
            search_text: String::new(),
            search_seq: 0,
            search_timer: None,
            form_error: None,
            debounce: config.ui.search_debounce(),
            search_min_chars: config.ui.search_min_chars.max(1),
            tag_limit: config.directory.tag_limit,
        }
    }

    pub fn handle(&self) -> PluginHandle {
        PluginHandle {
            event_tx: self.event_tx.clone(),
            snapshot_rx: self.snapshot_tx.subscribe(),
            broadcast_tx: self.broadcast_tx.clone(),
        }
    }

    /// Run the event loop. Returns on `Shutdown` or when every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PluginEvent>) {
        info!("PluginCore: starting event loop");

        loop {
            match event_rx.recv().await {
                None => {
                    info!("PluginCore: event channel closed, shutting down");
                    break;
                }

                Some(PluginEvent::Shutdown) => {
                    info!("PluginCore: shutdown requested");
                    break;
                }

                Some(PluginEvent::Command(cmd)) => {
                    debug!("PluginCore: command {:?}", cmd);
                    self.handle_command(cmd).await;
                }

                Some(PluginEvent::AddCustomStation { fields, reply }) => {
                    // Publish first so the caller sees the new state on return.
                    let result = self.add_custom_station(fields);
                    self.publish();
                    let _ = reply.send(result);
                    continue;
                }

                Some(PluginEvent::Host(event)) => {
                    if !self.handle_host_event(event) {
                        continue;
                    }
                }

                Some(PluginEvent::FetchSettled { token, data }) => {
                    let stations = data.stations().to_vec();
                    if !self.nav.settle(token, data) {
                        continue;
                    }
                    self.library.hydrate_favorites(&stations);
                }

                Some(PluginEvent::SearchDue { token, query }) => {
                    if token != self.search_seq {
                        debug!("PluginCore: stale search timer for {:?}", query);
                        continue;
                    }
                    self.search_timer = None;
                    self.run_search(query);
                }
            }
            self.publish();
        }

        self.cleanup().await;
    }

    async fn cleanup(&mut self) {
        self.cancel_search_timer();
        self.library.persister().flush().await;
        info!("PluginCore: stopped");
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Open => {
                self.is_open = true;
                if self.nav.current().view == View::Home {
                    self.go_home();
                } else if self.nav.current().data.is_unavailable() {
                    self.nav.reissue();
                    self.load_current();
                }
            }

            UiCommand::Close => {
                self.is_open = false;
            }

            UiCommand::Home => self.go_home(),

            UiCommand::Back => {
                self.cancel_search_timer();
                if self.nav.go_back() {
                    self.nav.reissue();
                    self.load_current();
                }
                if self.nav.current().view.kind() != ViewKind::Search {
                    self.search_text.clear();
                }
            }

            UiCommand::OpenRegion { id } => match regions::find(&id) {
                Some(region) => {
                    self.nav
                        .push_nav(View::region(region), ViewData::Loading, region.title());
                    self.load_current();
                }
                None => warn!("PluginCore: unknown region {:?}", id),
            },

            UiCommand::OpenCountry { code, name } => {
                let code = code.trim().to_ascii_uppercase();
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| self.nav.find_country(&code).map(|c| c.name.clone()))
                    .unwrap_or_else(|| code.clone());
                let title = match flag_emoji(&code) {
                    Some(flag) => format!("{} {}", flag, name),
                    None => name.clone(),
                };
                self.nav
                    .push_nav(View::Country { code, name }, ViewData::Loading, title);
                self.load_current();
            }

            UiCommand::OpenTag { name } => {
                let name = name.trim().to_lowercase();
                let title = format!("🏷️ {}", name);
                self.nav.push_nav(View::Tag { name }, ViewData::Loading, title);
                self.load_current();
            }

            UiCommand::SearchInput { text } => self.on_search_input(text),

            UiCommand::ShowAddStation => {
                self.form_error = None;
                if self.nav.current().view != View::AddStation {
                    self.nav
                        .push_nav(View::AddStation, ViewData::Form, ADD_STATION_TITLE);
                }
            }

            UiCommand::AddCustomStation { fields } => {
                let _ = self.add_custom_station(fields);
            }

            UiCommand::DeleteCustomStation { id } => {
                if self.library.delete_custom_station(&id).is_some() {
                    self.nav.forget_station(&id);
                    self.toast("Station removed", false);
                } else {
                    warn!("PluginCore: no custom station {:?}", id);
                }
            }

            UiCommand::ToggleFavorite { id } => {
                let snapshot = self.resolve(&id);
                if snapshot.is_none() && !self.library.is_favorite(&id) {
                    warn!("PluginCore: cannot favorite unknown station {:?}", id);
                    return;
                }
                if self.library.toggle_favorite(&id, snapshot.as_ref()) {
                    self.toast("Added to favorites ⭐", false);
                } else {
                    self.toast("Removed from favorites", false);
                }
            }

            UiCommand::Play { id } => match self.resolve(&id) {
                Some(station) => {
                    if let Err(e) = self.playback.play(&station, self.host.player.as_ref()).await {
                        self.toast(e.to_string(), true);
                    }
                }
                None => {
                    warn!("PluginCore: play for unknown station {:?}", id);
                    self.toast("Station not found", true);
                }
            },
        }
    }

    fn handle_host_event(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::PlaybackState { is_playing } => {
                self.playback.on_host_playback_state(is_playing)
            }
            HostEvent::TrackChange { track } => self.playback.on_host_track_change(track.as_ref()),
        }
    }

    fn add_custom_station(
        &mut self,
        fields: CustomStationFields,
    ) -> Result<Station, ValidationError> {
        match self.library.add_custom_station(&fields) {
            Ok(station) => {
                self.form_error = None;
                self.toast(format!("Added: {}", station.name), false);
                self.go_home();
                Ok(station)
            }
            Err(e) => {
                debug!("PluginCore: rejected custom station: {}", e);
                self.form_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Custom stations, favorite snapshots, then whatever is on screen or in
    /// the back-stack, then the station playing right now.
    fn resolve(&self, id: &str) -> Option<Station> {
        self.library
            .resolve(id)
            .or_else(|| self.nav.visible_stations().find(|s| s.id == id).cloned())
            .or_else(|| {
                self.playback
                    .now_playing()
                    .filter(|np| np.station.id == id)
                    .map(|np| np.station.clone())
            })
    }

    // ── Navigation helpers ────────────────────────────────────────────────────

    fn go_home(&mut self) {
        self.cancel_search_timer();
        self.search_text.clear();
        self.nav.show_home();
        self.load_current();
    }

    fn cancel_search_timer(&mut self) {
        if let Some(timer) = self.search_timer.take() {
            timer.abort();
        }
        // Also invalidates a SearchDue already sitting in the queue.
        self.search_seq += 1;
    }

    fn on_search_input(&mut self, text: String) {
        let query = text.trim().to_string();
        self.search_text = text;
        if query.is_empty() {
            self.go_home();
            return;
        }
        self.cancel_search_timer();
        if query.chars().count() < self.search_min_chars {
            return;
        }

        // An open search switches to the new query right away so its frame
        // token moves on; only the fetch waits for the debounce.
        if let View::Search { query: shown } = &self.nav.current().view {
            if *shown != query {
                self.nav.enter_search(&query, ViewData::Loading);
            }
        }

        let token = self.search_seq;
        let tx = self.event_tx.clone();
        let delay = self.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(PluginEvent::SearchDue { token, query }).await;
        });
        self.search_timer = Some(timer.abort_handle());
    }

    fn run_search(&mut self, query: String) {
        info!("PluginCore: search {:?}", query);
        self.nav.enter_search(&query, ViewData::Loading);
        self.load_current();
    }

    /// Spawn the fetch that fills the current frame, tagged with its token.
    fn load_current(&self) {
        let frame = self.nav.current();
        let token = frame.token;
        let view = frame.view.clone();
        if view == View::AddStation {
            return;
        }

        let custom_matches = match &view {
            View::Search { query } => self.library.custom().search(query),
            _ => Vec::new(),
        };
        let directory = Arc::clone(&self.directory);
        let tx = self.event_tx.clone();
        let tag_limit = self.tag_limit;

        tokio::spawn(async move {
            let data = fetch_view(&directory, &view, tag_limit, custom_matches).await;
            if tx
                .send(PluginEvent::FetchSettled { token, data })
                .await
                .is_err()
            {
                debug!("PluginCore: fetch for {:?} finished after shutdown", view.kind());
            }
        });
    }

    // ── Output ────────────────────────────────────────────────────────────────

    fn toast(&self, message: impl Into<String>, is_error: bool) {
        let _ = self.broadcast_tx.send(Broadcast::Toast {
            message: message.into(),
            is_error,
        });
    }

    fn publish(&self) {
        let current = self.nav.current();
        let favorites = self.library.favorites();
        self.snapshot_tx.send_replace(UiSnapshot {
            is_open: self.is_open,
            header: self.nav.header(),
            view: current.view.clone(),
            data: current.data.clone(),
            search_text: self.search_text.clone(),
            favorites: favorites.stations(),
            favorite_ids: favorites.ids().map(String::from).collect(),
            unresolved_favorites: favorites.unresolved(),
            custom: self.library.custom().list().to_vec(),
            regions: REGIONS,
            now_playing: self.playback.now_playing().cloned(),
            form_error: self.form_error.clone(),
        });
    }
}

// ── Fetching ──────────────────────────────────────────────────────────────────

/// Split a lookup into the list to show and the unavailable flag.
fn listing<T>(result: Result<Vec<T>, DirectoryError>) -> (Vec<T>, bool) {
    match result {
        Ok(items) => (items, false),
        Err(e) => {
            warn!("PluginCore: {}", e);
            (Vec::new(), true)
        }
    }
}

async fn fetch_view(
    directory: &DirectoryClient,
    view: &View,
    tag_limit: usize,
    custom_matches: Vec<Station>,
) -> ViewData {
    match view {
        View::Home => {
            let (tags, unavailable) = listing(directory.fetch_tags(tag_limit).await);
            ViewData::Tags { tags, unavailable }
        }
        View::Region { id } => {
            let (mut countries, unavailable) = listing(directory.fetch_countries().await);
            match regions::find(id) {
                Some(region) => countries.retain(|c| region.contains(&c.code)),
                None => countries.clear(),
            }
            ViewData::Countries {
                countries,
                unavailable,
            }
        }
        View::Country { code, .. } => {
            let (stations, unavailable) = listing(directory.fetch_by_country(code).await);
            ViewData::Stations {
                stations,
                unavailable,
            }
        }
        View::Tag { name } => {
            let (stations, unavailable) = listing(directory.fetch_by_tag(name).await);
            ViewData::Stations {
                stations,
                unavailable,
            }
        }
        View::Search { query } => {
            let (found, unavailable) = listing(directory.search(query).await);
            let mut stations = custom_matches;
            stations.extend(found);
            ViewData::Stations {
                stations,
                unavailable,
            }
        }
        View::AddStation => ViewData::Form,
    }
}
