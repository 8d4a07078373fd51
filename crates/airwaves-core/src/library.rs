//! Favorites and user-added stations.
//!
//! Favorites keep a snapshot of the station next to its id, so a favorited
//! directory station stays playable after the listing it came from has
//! expired from the cache. Entries saved by older installs as bare ids get
//! their snapshot the next time a listing containing them is shown.

use std::sync::Arc;

use airwaves_proto::protocol::{CustomStationFields, Station, CUSTOM_FLAG, CUSTOM_ID_PREFIX};
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{PersistenceError, ValidationError};
use crate::host::KeyValueStore;
use crate::persist::Persister;

pub const FAVORITES_KEY: &str = "airwaves-favorites";
pub const CUSTOM_KEY: &str = "airwaves-custom";

/// Keys used by installs that predate the current names. Read only when the
/// current key is absent; the first load copies the value forward.
pub const LEGACY_FAVORITES_KEY: &str = "or-favorites";
pub const LEGACY_CUSTOM_KEY: &str = "or-custom";

const CUSTOM_DEFAULT_LABEL: &str = "Custom";
const CUSTOM_DEFAULT_BITRATE: u32 = 128;

// ── Favorites ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredFavorite {
    Id(String),
    Entry(Favorite),
}

/// Ordered set of favorite ids, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FavoritesStore {
    entries: Vec<Favorite>,
}

impl FavoritesStore {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let stored: Vec<StoredFavorite> = serde_json::from_str(raw)?;
        let mut store = Self::default();
        for item in stored {
            let fav = match item {
                StoredFavorite::Id(id) => Favorite { id, station: None },
                StoredFavorite::Entry(fav) => fav,
            };
            if !fav.id.is_empty() && !store.contains(&fav.id) {
                store.entries.push(fav);
            }
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|f| f.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|f| f.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now a
    /// favorite.
    pub fn toggle(&mut self, id: &str, snapshot: Option<&Station>) -> bool {
        if self.remove(id) {
            return false;
        }
        self.entries.push(Favorite {
            id: id.to_string(),
            station: snapshot.filter(|s| s.id == id).cloned(),
        });
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|f| f.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.entries
            .iter()
            .find(|f| f.id == id)
            .and_then(|f| f.station.as_ref())
    }

    /// Attach snapshots to id-only entries found in `stations`. Returns the
    /// number of entries filled in.
    pub fn hydrate(&mut self, stations: &[Station]) -> usize {
        let mut filled = 0;
        for fav in self.entries.iter_mut().filter(|f| f.station.is_none()) {
            if let Some(st) = stations.iter().find(|s| s.id == fav.id) {
                fav.station = Some(st.clone());
                filled += 1;
            }
        }
        filled
    }

    /// Favorites that can be displayed right now.
    pub fn stations(&self) -> Vec<Station> {
        self.entries
            .iter()
            .filter_map(|f| f.station.clone())
            .collect()
    }

    /// Favorites still waiting for a snapshot.
    pub fn unresolved(&self) -> usize {
        self.entries.iter().filter(|f| f.station.is_none()).count()
    }
}

// ── Custom stations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CustomStationStore {
    stations: Vec<Station>,
}

impl CustomStationStore {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut stations: Vec<Station> = serde_json::from_str(raw)?;
        stations.retain(Station::is_playable);
        Ok(Self { stations })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.stations)
    }

    pub fn list(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Validate `fields` and append a new station.
    pub fn add(&mut self, fields: &CustomStationFields) -> Result<Station, ValidationError> {
        let name = fields.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let url = validate_stream_url(&fields.url)?;

        let label = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(CUSTOM_DEFAULT_LABEL)
                .to_string()
        };

        let station = Station {
            id: self.next_id(),
            name: name.to_string(),
            genre: Some(label(&fields.genre)),
            url,
            bitrate: Some(CUSTOM_DEFAULT_BITRATE),
            country_name: Some(label(&fields.country)),
            country_flag: Some(CUSTOM_FLAG.to_string()),
            country_code: None,
            favicon: None,
        };
        self.stations.push(station.clone());
        Ok(station)
    }

    pub fn remove(&mut self, id: &str) -> Option<Station> {
        let idx = self.stations.iter().position(|s| s.id == id)?;
        Some(self.stations.remove(idx))
    }

    pub fn search(&self, query: &str) -> Vec<Station> {
        self.stations
            .iter()
            .filter(|s| s.matches(query))
            .cloned()
            .collect()
    }

    /// `custom-<unix millis>-<random>`, re-rolled on the off chance it is taken.
    fn next_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id = format!(
                "{}{}-{:08x}",
                CUSTOM_ID_PREFIX,
                chrono::Utc::now().timestamp_millis(),
                rng.gen::<u32>()
            );
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

/// Value under `key`, else under `legacy`. The flag is set when the value
/// came from `legacy`.
async fn read_key(
    storage: &dyn KeyValueStore,
    key: &str,
    legacy: &str,
) -> Result<Option<(String, bool)>, PersistenceError> {
    if let Some(raw) = storage.get(key).await? {
        return Ok(Some((raw, false)));
    }
    Ok(storage.get(legacy).await?.map(|raw| (raw, true)))
}

/// Accept only absolute http(s) URLs with a host.
fn validate_stream_url(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.trim();
    let invalid = || ValidationError::InvalidUrl(raw.to_string());
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    Ok(raw.to_string())
}

// ── Library ───────────────────────────────────────────────────────────────────

/// Favorites + custom stations, persisted through a `Persister`.
pub struct Library {
    favorites: FavoritesStore,
    custom: CustomStationStore,
    persister: Persister,
}

impl Library {
    pub fn new(favorites: FavoritesStore, custom: CustomStationStore, persister: Persister) -> Self {
        Self {
            favorites,
            custom,
            persister,
        }
    }

    /// Read both keys from host storage. Unreadable values start empty.
    pub async fn load(storage: Option<&Arc<dyn KeyValueStore>>, persister: Persister) -> Self {
        let Some(storage) = storage else {
            return Self::new(FavoritesStore::default(), CustomStationStore::default(), persister);
        };

        let (favorites, favorites_legacy) =
            match read_key(&**storage, FAVORITES_KEY, LEGACY_FAVORITES_KEY).await {
                Ok(Some((raw, legacy))) => match FavoritesStore::from_json(&raw) {
                    Ok(store) => (store, legacy),
                    Err(e) => {
                        warn!("library: unreadable favorites: {}", e);
                        (FavoritesStore::default(), false)
                    }
                },
                Ok(None) => (FavoritesStore::default(), false),
                Err(e) => {
                    warn!("library: loading favorites failed: {}", e);
                    (FavoritesStore::default(), false)
                }
            };
        let (custom, custom_legacy) =
            match read_key(&**storage, CUSTOM_KEY, LEGACY_CUSTOM_KEY).await {
                Ok(Some((raw, legacy))) => match CustomStationStore::from_json(&raw) {
                    Ok(store) => (store, legacy),
                    Err(e) => {
                        warn!("library: unreadable custom stations: {}", e);
                        (CustomStationStore::default(), false)
                    }
                },
                Ok(None) => (CustomStationStore::default(), false),
                Err(e) => {
                    warn!("library: loading custom stations failed: {}", e);
                    (CustomStationStore::default(), false)
                }
            };

        info!(
            "library: {} favorite(s), {} custom station(s)",
            favorites.len(),
            custom.len()
        );
        let library = Self::new(favorites, custom, persister);
        if favorites_legacy {
            info!("library: migrating {} to {}", LEGACY_FAVORITES_KEY, FAVORITES_KEY);
            library.save_favorites();
        }
        if custom_legacy {
            info!("library: migrating {} to {}", LEGACY_CUSTOM_KEY, CUSTOM_KEY);
            library.save_custom();
        }
        library
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn custom(&self) -> &CustomStationStore {
        &self.custom
    }

    pub fn persister(&self) -> &Persister {
        &self.persister
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    /// Flip `id` in the favorites set and queue a save.
    pub fn toggle_favorite(&mut self, id: &str, snapshot: Option<&Station>) -> bool {
        let now = self.favorites.toggle(id, snapshot);
        debug!("library: favorite {} -> {}", id, now);
        self.save_favorites();
        now
    }

    pub fn add_custom_station(
        &mut self,
        fields: &CustomStationFields,
    ) -> Result<Station, ValidationError> {
        let station = self.custom.add(fields)?;
        info!("library: added custom station {} ({})", station.name, station.id);
        self.save_custom();
        Ok(station)
    }

    /// Remove a custom station and any favorite pointing at it.
    pub fn delete_custom_station(&mut self, id: &str) -> Option<Station> {
        let removed = self.custom.remove(id);
        let unfavorited = self.favorites.remove(id);
        if removed.is_some() {
            self.save_custom();
        }
        if unfavorited {
            self.save_favorites();
        }
        removed
    }

    /// Fill snapshots for id-only favorites seen in `stations`.
    pub fn hydrate_favorites(&mut self, stations: &[Station]) {
        if self.favorites.hydrate(stations) > 0 {
            self.save_favorites();
        }
    }

    /// Custom stations first, then favorite snapshots.
    pub fn resolve(&self, id: &str) -> Option<Station> {
        self.custom
            .get(id)
            .or_else(|| self.favorites.get(id))
            .cloned()
    }

    fn save_favorites(&self) {
        match self.favorites.to_json() {
            Ok(json) => self.persister.save(FAVORITES_KEY, json),
            Err(source) => error!(
                "library: {}",
                PersistenceError::Encode {
                    key: FAVORITES_KEY.to_string(),
                    source
                }
            ),
        }
    }

    fn save_custom(&self) {
        match self.custom.to_json() {
            Ok(json) => self.persister.save(CUSTOM_KEY, json),
            Err(source) => error!(
                "library: {}",
                PersistenceError::Encode {
                    key: CUSTOM_KEY.to_string(),
                    source
                }
            ),
        }
    }
}
