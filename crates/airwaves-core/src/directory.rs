//! Station directory client (radio-browser compatible API).
//!
//! Every lookup walks the configured mirrors in order, treating transport
//! errors, non-2xx statuses and undecodable bodies as "mirror unusable".
//! The mirror that answers first becomes preferred for the next call; the
//! rest of the list is still tried behind it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use airwaves_proto::config::DirectoryConfig;
use airwaves_proto::protocol::{Country, Station, Tag};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, Listing, ResultCache, TtlClass};
use crate::error::{DirectoryError, MirrorError};

/// `preferred` value meaning "no mirror has answered yet".
const NO_PREFERENCE: usize = usize::MAX;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiStation {
    #[serde(default)]
    stationuuid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    url_resolved: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    countrycode: String,
    #[serde(default)]
    bitrate: u32,
    #[serde(default)]
    favicon: String,
}

#[derive(Debug, Deserialize)]
struct ApiCountry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    iso_3166_1: String,
    #[serde(default)]
    stationcount: u32,
}

#[derive(Debug, Deserialize)]
struct ApiTag {
    #[serde(default)]
    name: String,
    #[serde(default)]
    stationcount: u32,
}

// ── Normalisation ─────────────────────────────────────────────────────────────

/// Flag emoji for an ISO 3166-1 alpha-2 code, built from regional indicators.
pub fn flag_emoji(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    code.to_ascii_uppercase()
        .chars()
        .map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn normalize_station(raw: ApiStation) -> Option<Station> {
    let url = non_empty(&raw.url_resolved).or_else(|| non_empty(&raw.url))?;
    let id = non_empty(&raw.stationuuid)?;
    let country_code = non_empty(&raw.countrycode).map(|c| c.to_ascii_uppercase());

    Some(Station {
        id,
        name: non_empty(&raw.name).unwrap_or_else(|| url.clone()),
        genre: raw.tags.split(',').find_map(non_empty),
        url,
        bitrate: (raw.bitrate > 0).then_some(raw.bitrate),
        country_name: non_empty(&raw.country),
        country_flag: country_code.as_deref().and_then(flag_emoji),
        country_code,
        favicon: non_empty(&raw.favicon),
    })
}

fn normalize_stations(raw: Vec<ApiStation>) -> Vec<Station> {
    let total = raw.len();
    let stations: Vec<Station> = raw.into_iter().filter_map(normalize_station).collect();
    if stations.len() < total {
        debug!(
            "directory: dropped {} record(s) without id or url",
            total - stations.len()
        );
    }
    stations
}

fn normalize_countries(raw: Vec<ApiCountry>, limit: usize) -> Vec<Country> {
    let mut countries: Vec<Country> = raw
        .into_iter()
        .filter_map(|c| {
            let code = c.iso_3166_1.trim().to_ascii_uppercase();
            flag_emoji(&code)?;
            Some(Country {
                name: non_empty(&c.name).unwrap_or_else(|| code.clone()),
                code,
                station_count: c.stationcount,
            })
        })
        .collect();
    countries.sort_by(|a, b| b.station_count.cmp(&a.station_count));

    let mut seen = std::collections::HashSet::new();
    countries.retain(|c| seen.insert(c.code.clone()));
    countries.truncate(limit);
    countries
}

fn normalize_tags(raw: Vec<ApiTag>, limit: usize) -> Vec<Tag> {
    let mut tags: Vec<Tag> = raw
        .into_iter()
        .filter_map(|t| {
            Some(Tag {
                name: non_empty(&t.name)?,
                station_count: t.stationcount,
            })
        })
        .collect();
    tags.sort_by(|a, b| b.station_count.cmp(&a.station_count));
    tags.truncate(limit);
    tags
}

/// Query parameters shared by every station listing: hide broken streams,
/// most popular first.
fn station_query(limit: usize) -> Vec<(&'static str, String)> {
    vec![
        ("hidebroken", "true".to_string()),
        ("order", "clickcount".to_string()),
        ("reverse", "true".to_string()),
        ("limit", limit.to_string()),
    ]
}

fn summary_query() -> Vec<(&'static str, String)> {
    vec![
        ("hidebroken", "true".to_string()),
        ("order", "stationcount".to_string()),
        ("reverse", "true".to_string()),
    ]
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct DirectoryClient {
    http: Client,
    mirrors: Vec<String>,
    preferred: AtomicUsize,
    cache: Arc<ResultCache>,
    country_limit: usize,
    station_limit: usize,
    search_limit: usize,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig, cache: Arc<ResultCache>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, config, cache))
    }

    /// Use a caller-supplied reqwest client (shared pool, custom proxy).
    pub fn with_client(http: Client, config: &DirectoryConfig, cache: Arc<ResultCache>) -> Self {
        Self {
            http,
            mirrors: config.mirrors.clone(),
            preferred: AtomicUsize::new(NO_PREFERENCE),
            cache,
            country_limit: config.country_limit,
            station_limit: config.station_limit,
            search_limit: config.search_limit,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Mirror that answered most recently, if any.
    pub fn preferred_mirror(&self) -> Option<&str> {
        self.mirrors
            .get(self.preferred.load(Ordering::Relaxed))
            .map(String::as_str)
    }

    /// Configured mirrors with the preferred one moved to the front.
    pub fn mirror_order(&self) -> Vec<(usize, &str)> {
        let preferred = self.preferred.load(Ordering::Relaxed);
        let mut order: Vec<(usize, &str)> = Vec::with_capacity(self.mirrors.len());
        if let Some(m) = self.mirrors.get(preferred) {
            order.push((preferred, m.as_str()));
        }
        order.extend(
            self.mirrors
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != preferred)
                .map(|(i, m)| (i, m.as_str())),
        );
        order
    }

    // ── Read API ──────────────────────────────────────────────────────────────

    /// Countries by descending station count, truncated to `country_limit`.
    pub async fn fetch_countries(&self) -> Result<Vec<Country>, DirectoryError> {
        let key = CacheKey::countries();
        if let Some(listing) = self.cache.get(&key).await {
            if let Listing::Countries(countries) = &*listing {
                return Ok(countries.clone());
            }
        }

        let raw: Vec<ApiCountry> = self
            .get_json("countries", &["json", "countries"], &summary_query())
            .await?;
        let countries = normalize_countries(raw, self.country_limit);
        info!("directory: {} countries", countries.len());
        self.cache
            .put(key, Listing::Countries(countries.clone()), TtlClass::Listing)
            .await;
        Ok(countries)
    }

    /// Top `limit` tags by descending station count.
    pub async fn fetch_tags(&self, limit: usize) -> Result<Vec<Tag>, DirectoryError> {
        let key = CacheKey::tags(limit);
        if let Some(listing) = self.cache.get(&key).await {
            if let Listing::Tags(tags) = &*listing {
                return Ok(tags.clone());
            }
        }

        let mut query = summary_query();
        query.push(("limit", limit.to_string()));
        let raw: Vec<ApiTag> = self.get_json("tags", &["json", "tags"], &query).await?;
        let tags = normalize_tags(raw, limit);
        self.cache
            .put(key, Listing::Tags(tags.clone()), TtlClass::Listing)
            .await;
        Ok(tags)
    }

    /// Stations broadcasting from `code`. Records tagged with any other
    /// country are dropped, so every result's flag matches `code`.
    pub async fn fetch_by_country(&self, code: &str) -> Result<Vec<Station>, DirectoryError> {
        let code = code.trim().to_ascii_uppercase();
        let key = CacheKey::country(&code);
        if let Some(stations) = self.cached_stations(&key).await {
            return Ok(stations);
        }

        let operation = format!("country {}", code);
        let raw: Vec<ApiStation> = self
            .get_json(
                &operation,
                &["json", "stations", "bycountrycodeexact", code.as_str()],
                &station_query(self.station_limit),
            )
            .await?;
        let mut stations = normalize_stations(raw);
        stations.retain(|s| s.country_code.as_deref() == Some(code.as_str()));
        self.store_stations(key, &stations, TtlClass::Listing).await;
        Ok(stations)
    }

    pub async fn fetch_by_tag(&self, tag: &str) -> Result<Vec<Station>, DirectoryError> {
        let tag = tag.trim().to_lowercase();
        let key = CacheKey::tag(&tag);
        if let Some(stations) = self.cached_stations(&key).await {
            return Ok(stations);
        }

        let operation = format!("tag {}", tag);
        let raw: Vec<ApiStation> = self
            .get_json(
                &operation,
                &["json", "stations", "bytagexact", tag.as_str()],
                &station_query(self.station_limit),
            )
            .await?;
        let stations = normalize_stations(raw);
        self.store_stations(key, &stations, TtlClass::Listing).await;
        Ok(stations)
    }

    /// Name search. A blank query returns nothing without touching the network.
    pub async fn search(&self, query: &str) -> Result<Vec<Station>, DirectoryError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let key = CacheKey::search(query);
        if let Some(stations) = self.cached_stations(&key).await {
            return Ok(stations);
        }

        let mut params = station_query(self.search_limit);
        params.push(("name", query.to_string()));
        let operation = format!("search {:?}", query);
        let raw: Vec<ApiStation> = self
            .get_json(&operation, &["json", "stations", "search"], &params)
            .await?;
        let stations = normalize_stations(raw);
        self.store_stations(key, &stations, TtlClass::Search).await;
        Ok(stations)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn cached_stations(&self, key: &CacheKey) -> Option<Vec<Station>> {
        match &*self.cache.get(key).await? {
            Listing::Stations(stations) => Some(stations.clone()),
            _ => None,
        }
    }

    async fn store_stations(&self, key: CacheKey, stations: &[Station], class: TtlClass) {
        self.cache
            .put(key, Listing::Stations(stations.to_vec()), class)
            .await;
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, DirectoryError> {
        let order = self.mirror_order();
        for (idx, base) in &order {
            match self.try_mirror(base, segments, query).await {
                Ok(value) => {
                    let previous = self.preferred.swap(*idx, Ordering::Relaxed);
                    if previous != *idx {
                        info!("directory: preferring mirror {}", base);
                    }
                    return Ok(value);
                }
                Err(e) => warn!("directory: mirror {} failed for {}: {}", base, operation, e),
            }
        }
        warn!("directory: all {} mirror(s) failed for {}", order.len(), operation);
        Err(DirectoryError::unavailable(operation, order.len()))
    }

    async fn try_mirror<T: DeserializeOwned>(
        &self,
        base: &str,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, MirrorError> {
        let mut url = Url::parse(base).map_err(|e| MirrorError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MirrorError::InvalidUrl(base.to_string()))?
            .pop_if_empty()
            .extend(segments);

        debug!("directory: GET {}", url);
        let response = self.http.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::Status(response.status()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MirrorError::Decode(e.to_string()))
    }
}
