//! View state machine and back-stack.
//!
//! The stack holds predecessors only: `push_nav` saves the current frame
//! and then switches. Every frame carries the request token of the fetch
//! that fills it; a result is applied only to the frame holding its token,
//! so a late answer for a view the user already left (or re-issued) is
//! dropped instead of overwriting what is on screen.

use airwaves_proto::protocol::{Country, Station, Tag};
use airwaves_proto::regions::Region;
use serde::Serialize;
use tracing::debug;

pub const HOME_TITLE: &str = "📻 Online Radio";
pub const ADD_STATION_TITLE: &str = "Add Custom Station";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Home,
    Region,
    Country,
    Tag,
    Search,
    Add,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Home,
    Region { id: String },
    Country { code: String, name: String },
    Tag { name: String },
    Search { query: String },
    AddStation,
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Home => ViewKind::Home,
            View::Region { .. } => ViewKind::Region,
            View::Country { .. } => ViewKind::Country,
            View::Tag { .. } => ViewKind::Tag,
            View::Search { .. } => ViewKind::Search,
            View::AddStation => ViewKind::Add,
        }
    }

    pub fn region(region: &Region) -> Self {
        View::Region {
            id: region.id.to_string(),
        }
    }
}

/// What a frame displays. `unavailable` marks an empty list caused by the
/// directory being unreachable, as opposed to a genuinely empty result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewData {
    Loading,
    Tags { tags: Vec<Tag>, unavailable: bool },
    Countries { countries: Vec<Country>, unavailable: bool },
    Stations { stations: Vec<Station>, unavailable: bool },
    Form,
}

impl ViewData {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewData::Loading)
    }

    pub fn is_unavailable(&self) -> bool {
        match self {
            ViewData::Tags { unavailable, .. }
            | ViewData::Countries { unavailable, .. }
            | ViewData::Stations { unavailable, .. } => *unavailable,
            ViewData::Loading | ViewData::Form => false,
        }
    }

    pub fn stations(&self) -> &[Station] {
        match self {
            ViewData::Stations { stations, .. } => stations,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavEntry {
    pub view: View,
    pub data: ViewData,
    pub title: String,
    #[serde(skip)]
    pub token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub title: String,
    pub show_back: bool,
}

pub struct NavigationController {
    current: NavEntry,
    stack: Vec<NavEntry>,
    next_token: u64,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    /// Start on home, loading, with token 1.
    pub fn new() -> Self {
        let mut nav = Self {
            current: Self::home_entry(0),
            stack: Vec::new(),
            next_token: 0,
        };
        nav.current.token = nav.alloc_token();
        nav
    }

    fn home_entry(token: u64) -> NavEntry {
        NavEntry {
            view: View::Home,
            data: ViewData::Loading,
            title: HOME_TITLE.to_string(),
            token,
        }
    }

    fn alloc_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn current(&self) -> &NavEntry {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn header(&self) -> Header {
        Header {
            title: self.current.title.clone(),
            show_back: !self.stack.is_empty() || self.current.view.kind() == ViewKind::Search,
        }
    }

    /// Save the current frame and switch to `view`. Returns the new frame's
    /// token, to be attached to the fetch that fills `data` when it is
    /// `Loading`.
    pub fn push_nav(&mut self, view: View, data: ViewData, title: impl Into<String>) -> u64 {
        let token = self.alloc_token();
        let next = NavEntry {
            view,
            data,
            title: title.into(),
            token,
        };
        let prev = std::mem::replace(&mut self.current, next);
        debug!("nav: push {:?} over {:?}", self.current.view.kind(), prev.view.kind());
        self.stack.push(prev);
        token
    }

    /// Restore the previous frame, or go home when there is none. Returns
    /// true if the restored frame has to be fetched again (see `reissue`).
    pub fn go_back(&mut self) -> bool {
        match self.stack.pop() {
            Some(prev) => {
                debug!("nav: back to {:?}", prev.view.kind());
                self.current = prev;
                self.current.data.is_unavailable()
            }
            None => {
                self.show_home();
                true
            }
        }
    }

    /// Home is the root: the stack is dropped.
    pub fn show_home(&mut self) -> u64 {
        self.stack.clear();
        let token = self.alloc_token();
        self.current = Self::home_entry(token);
        token
    }

    /// Search replaces whatever is shown and clears history; typing into an
    /// open search only swaps the query.
    pub fn enter_search(&mut self, query: &str, data: ViewData) -> u64 {
        self.stack.clear();
        let token = self.alloc_token();
        self.current = NavEntry {
            view: View::Search {
                query: query.to_string(),
            },
            data,
            title: format!("Search: \"{}\"", query),
            token,
        };
        token
    }

    /// Give the current frame a fresh token and mark it loading. Any fetch
    /// still in flight for it is superseded.
    pub fn reissue(&mut self) -> u64 {
        let token = self.alloc_token();
        self.current.token = token;
        self.current.data = ViewData::Loading;
        token
    }

    /// Apply a fetch result. Frames lower in the stack accept their own
    /// results too, so going back shows what finished while away. Returns
    /// false when no frame holds `token`.
    pub fn settle(&mut self, token: u64, data: ViewData) -> bool {
        let frame = std::iter::once(&mut self.current)
            .chain(self.stack.iter_mut())
            .find(|f| f.token == token);
        match frame {
            Some(f) => {
                f.data = data;
                true
            }
            None => {
                debug!("nav: dropping stale result for token {}", token);
                false
            }
        }
    }

    /// Replace the current frame's data without changing its token.
    pub fn replace_current_data(&mut self, data: ViewData) {
        self.current.data = data;
    }

    /// Every station held by any frame, current first.
    pub fn visible_stations(&self) -> impl Iterator<Item = &Station> {
        std::iter::once(&self.current)
            .chain(self.stack.iter().rev())
            .flat_map(|f| f.data.stations().iter())
    }

    /// Countries held by any frame, for region views.
    pub fn find_country(&self, code: &str) -> Option<&Country> {
        std::iter::once(&self.current)
            .chain(self.stack.iter())
            .find_map(|f| match &f.data {
                ViewData::Countries { countries, .. } => {
                    countries.iter().find(|c| c.code.eq_ignore_ascii_case(code))
                }
                _ => None,
            })
    }

    /// Drop `id` from every list, e.g. after a custom station is deleted.
    pub fn forget_station(&mut self, id: &str) {
        for frame in std::iter::once(&mut self.current).chain(self.stack.iter_mut()) {
            if let ViewData::Stations { stations, .. } = &mut frame.data {
                stations.retain(|s| s.id != id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations(ids: &[&str]) -> ViewData {
        ViewData::Stations {
            stations: ids
                .iter()
                .map(|id| Station {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    url: format!("https://{}.example", id),
                    ..Station::default()
                })
                .collect(),
            unavailable: false,
        }
    }

    fn country(code: &str) -> View {
        View::Country {
            code: code.into(),
            name: code.into(),
        }
    }

    fn settled_home() -> NavigationController {
        let mut nav = NavigationController::new();
        let token = nav.current().token;
        assert!(nav.settle(
            token,
            ViewData::Tags {
                tags: vec![Tag { name: "jazz".into(), station_count: 10 }],
                unavailable: false,
            }
        ));
        nav
    }

    #[test]
    fn test_push_then_back_restores_exact_frame() {
        let mut nav = settled_home();
        let before = nav.current().clone();

        nav.push_nav(country("DE"), stations(&["a"]), "🇩🇪 Germany");
        assert_eq!(nav.header(), Header { title: "🇩🇪 Germany".into(), show_back: true });

        assert!(!nav.go_back());
        assert_eq!(nav.current(), &before);
        assert_eq!(nav.header(), Header { title: HOME_TITLE.into(), show_back: false });
    }

    #[test]
    fn test_push_push_back_back_lands_on_home() {
        let mut nav = settled_home();
        let home = nav.current().clone();

        nav.push_nav(View::Region { id: "europe".into() }, ViewData::Loading, "🇪🇺 Europe");
        let region = nav.current().clone();
        nav.push_nav(country("FR"), ViewData::Loading, "🇫🇷 France");
        assert_eq!(nav.depth(), 2);

        nav.go_back();
        assert_eq!(nav.current(), &region);
        nav.go_back();
        assert_eq!(nav.current(), &home);
        assert_eq!(nav.depth(), 0);
    }

    #[test]
    fn test_back_on_empty_stack_goes_home() {
        let mut nav = NavigationController::new();
        nav.enter_search("jazz", ViewData::Loading);
        assert!(nav.header().show_back);
        assert_eq!(nav.depth(), 0);

        assert!(nav.go_back());
        assert_eq!(nav.current().view, View::Home);
        assert!(!nav.header().show_back);
    }

    #[test]
    fn test_home_clears_stack() {
        let mut nav = NavigationController::new();
        nav.push_nav(View::Tag { name: "rock".into() }, ViewData::Loading, "rock");
        nav.push_nav(View::AddStation, ViewData::Form, ADD_STATION_TITLE);
        nav.show_home();
        assert_eq!(nav.depth(), 0);
        assert_eq!(nav.current().view.kind(), ViewKind::Home);
    }

    #[test]
    fn test_stale_token_is_discarded() {
        let mut nav = NavigationController::new();
        let jazz = nav.enter_search("jazz", ViewData::Loading);
        let rock = nav.enter_search("rock", ViewData::Loading);
        assert_ne!(jazz, rock);

        assert!(nav.settle(rock, stations(&["rock1"])));
        assert!(!nav.settle(jazz, stations(&["jazz1"])));
        assert_eq!(nav.current().data, stations(&["rock1"]));
        assert_eq!(nav.current().view, View::Search { query: "rock".into() });
    }

    #[test]
    fn test_result_for_buried_frame_is_kept_for_back() {
        let mut nav = settled_home();
        let de = nav.push_nav(country("DE"), ViewData::Loading, "Germany");
        nav.push_nav(View::AddStation, ViewData::Form, ADD_STATION_TITLE);

        assert!(nav.settle(de, stations(&["de1"])));
        assert_eq!(nav.current().data, ViewData::Form);

        nav.go_back();
        assert_eq!(nav.current().data, stations(&["de1"]));
    }

    #[test]
    fn test_back_to_unavailable_frame_asks_for_refetch() {
        let mut nav = settled_home();
        let de = nav.push_nav(country("DE"), ViewData::Loading, "Germany");
        nav.settle(de, ViewData::Stations { stations: vec![], unavailable: true });
        nav.push_nav(View::AddStation, ViewData::Form, ADD_STATION_TITLE);

        assert!(nav.go_back());
        let fresh = nav.reissue();
        assert!(fresh > de);
        assert!(nav.current().data.is_loading());
        assert!(!nav.settle(de, stations(&["late"])));
        assert!(nav.settle(fresh, stations(&["de1"])));
    }

    #[test]
    fn test_forget_station_and_visible_stations() {
        let mut nav = NavigationController::new();
        nav.push_nav(country("DE"), stations(&["a", "b"]), "Germany");
        nav.push_nav(View::Tag { name: "x".into() }, stations(&["c"]), "x");

        let ids: Vec<&str> = nav.visible_stations().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        nav.forget_station("a");
        let ids: Vec<&str> = nav.visible_stations().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
