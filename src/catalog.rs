use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{cache_busted, Endpoints, NetClient, NetError, SortMode, Zone};

#[derive(Error, Debug)]
pub(crate) enum CatalogError {
    #[error("{0}")]
    Fetch(#[from] NetError),

    #[error("manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Hit counts keyed by zone id. Missing ids score zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PopularityMap {
    hits: HashMap<i64, u64>,
}

impl PopularityMap {
    /// Placeholder held when the statistics endpoint is unavailable.
    pub(crate) fn degraded() -> Self {
        let mut hits = HashMap::new();
        hits.insert(0, 0);
        Self { hits }
    }

    pub(crate) fn insert(&mut self, id: i64, total: u64) {
        self.hits.insert(id, total);
    }

    pub(crate) fn score(&self, id: i64) -> u64 {
        self.hits.get(&id).copied().unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.hits.len()
    }
}

#[derive(Debug, Deserialize)]
struct StatFile {
    name: String,
    #[serde(default)]
    hits: StatHits,
}

#[derive(Debug, Default, Deserialize)]
struct StatHits {
    #[serde(default)]
    total: u64,
}

fn stat_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/(\d+)\.html$").expect("static regex"))
}

pub(crate) fn zone_id_from_stat_name(name: &str) -> Option<i64> {
    stat_name_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

pub(crate) fn parse_manifest(body: &str) -> Result<Vec<Zone>, serde_json::Error> {
    serde_json::from_str(body)
}

pub(crate) fn parse_popularity(body: &str) -> Result<PopularityMap, serde_json::Error> {
    let files: Vec<StatFile> = serde_json::from_str(body)?;
    let mut map = PopularityMap::default();
    for file in files {
        if let Some(id) = zone_id_from_stat_name(&file.name) {
            map.insert(id, file.hits.total);
        }
    }
    Ok(map)
}

/// The session's zones plus their popularity, owned by whichever task renders them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    zones: Vec<Zone>,
    popularity: PopularityMap,
}

impl Catalog {
    pub(crate) fn new(zones: Vec<Zone>, popularity: PopularityMap) -> Self {
        Self { zones, popularity }
    }

    pub(crate) fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub(crate) fn popularity(&self) -> &PopularityMap {
        &self.popularity
    }

    pub(crate) fn len(&self) -> usize {
        self.zones.len()
    }

    /// Reorder in place, then float the featured zone to the front.
    pub(crate) fn sort(&mut self, mode: SortMode) {
        match mode {
            SortMode::Name => self
                .zones
                .sort_by_cached_key(|zone| zone.name.to_lowercase()),
            SortMode::Id => self.zones.sort_by_key(|zone| zone.id),
            SortMode::Popular => {
                let popularity = &self.popularity;
                self.zones
                    .sort_by_key(|zone| std::cmp::Reverse(popularity.score(zone.id)));
            }
        }
        self.zones.sort_by_key(|zone| !zone.is_featured());
    }

    pub(crate) fn filter(&self, query: &str) -> Vec<Zone> {
        let needle = query.to_lowercase();
        self.zones
            .iter()
            .filter(|zone| zone.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Deep-link lookup; ids compare by their decimal text like the page parameter.
    pub(crate) fn find_by_param(&self, raw: &str) -> Option<&Zone> {
        let wanted = raw.trim();
        self.zones.iter().find(|zone| zone.id.to_string() == wanted)
    }
}

/// Fetch the manifest, then popularity. Only the manifest can fail the load.
pub(crate) async fn load_catalog(
    net: &NetClient,
    endpoints: &Endpoints,
) -> Result<Catalog, CatalogError> {
    let body = net.fetch_text(&cache_busted(&endpoints.manifest)).await?;
    let zones = parse_manifest(&body)?;
    info!(count = zones.len(), "[catalog] manifest loaded");
    let popularity = load_popularity(net, endpoints).await;
    Ok(Catalog::new(zones, popularity))
}

async fn load_popularity(net: &NetClient, endpoints: &Endpoints) -> PopularityMap {
    let Some(request) = net.open_request(&endpoints.popularity) else {
        debug!("[catalog] popularity request declined, using empty stats");
        return PopularityMap::degraded();
    };
    debug!(url = %request.url(), "[catalog] loading popularity");
    let body = match request.send().await {
        Ok(body) => body,
        Err(err) => {
            warn!("[catalog] popularity unavailable: {err}");
            return PopularityMap::degraded();
        }
    };
    match parse_popularity(&body) {
        Ok(map) => {
            debug!(entries = map.len(), "[catalog] popularity loaded");
            map
        }
        Err(err) => {
            warn!("[catalog] popularity unreadable: {err}");
            PopularityMap::degraded()
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_zone(id: i64, name: &str) -> Zone {
    Zone {
        id,
        name: name.to_string(),
        cover: format!("{{COVER_URL}}/{id}.png"),
        url: format!("{{HTML_URL}}/{id}.html"),
        author: Some("tester".to_string()),
        author_link: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::net::testing::{client_with, StubTransport};

    fn names(zones: &[Zone]) -> Vec<&str> {
        zones.iter().map(|z| z.name.as_str()).collect()
    }

    fn sample() -> Catalog {
        Catalog::new(
            vec![sample_zone(1, "B"), sample_zone(2, "A"), sample_zone(-1, "Z")],
            PopularityMap::default(),
        )
    }

    #[test]
    fn name_sort_pins_featured_first() {
        let mut catalog = sample();
        catalog.sort(SortMode::Name);
        assert_eq!(names(catalog.zones()), vec!["Z", "A", "B"]);
    }

    #[test]
    fn featured_first_for_every_mode() {
        for mode in SortMode::ALL {
            let mut catalog = Catalog::new(
                vec![sample_zone(5, "e"), sample_zone(3, "c"), sample_zone(-1, "zz"), sample_zone(9, "a")],
                PopularityMap::default(),
            );
            catalog.sort(mode);
            assert_eq!(catalog.zones()[0].id, -1, "mode {mode}");
        }
    }

    #[test]
    fn name_sort_ignores_case() {
        let mut catalog = Catalog::new(
            vec![sample_zone(1, "banana"), sample_zone(2, "Apple"), sample_zone(3, "cherry")],
            PopularityMap::default(),
        );
        catalog.sort(SortMode::Name);
        assert_eq!(names(catalog.zones()), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn id_sort_is_non_decreasing_after_pin() {
        let mut catalog = Catalog::new(
            vec![sample_zone(40, "a"), sample_zone(-1, "f"), sample_zone(3, "b"), sample_zone(17, "c"), sample_zone(3, "d")],
            PopularityMap::default(),
        );
        catalog.sort(SortMode::Id);
        let ids: Vec<i64> = catalog.zones().iter().map(|z| z.id).collect();
        assert_eq!(ids[0], -1);
        assert!(ids[1..].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn popular_sort_descends_with_zero_default() {
        let mut popularity = PopularityMap::default();
        popularity.insert(2, 50);
        popularity.insert(3, 900);
        let mut catalog = Catalog::new(vec![sample_zone(1, "one"), sample_zone(2, "two"), sample_zone(3, "three")], popularity);
        catalog.sort(SortMode::Popular);
        assert_eq!(names(catalog.zones()), vec!["three", "two", "one"]);
    }

    #[test]
    fn degraded_popularity_keeps_fetch_order() {
        let mut catalog = Catalog::new(
            vec![sample_zone(8, "h"), sample_zone(-1, "f"), sample_zone(2, "b"), sample_zone(5, "e")],
            PopularityMap::degraded(),
        );
        catalog.sort(SortMode::Popular);
        assert_eq!(names(catalog.zones()), vec!["f", "h", "b", "e"]);
    }

    #[test]
    fn filter_is_case_insensitive_and_non_mutating() {
        let catalog = Catalog::new(
            vec![sample_zone(1, "Slope Run"), sample_zone(2, "Retro Bowl"), sample_zone(3, "slope 2")],
            PopularityMap::default(),
        );
        let hits = catalog.filter("SLOPE");
        assert_eq!(names(&hits), vec!["Slope Run", "slope 2"]);
        assert_eq!(names(catalog.zones()), vec!["Slope Run", "Retro Bowl", "slope 2"]);
        assert_eq!(catalog.filter("").len(), 3);
        assert!(catalog.filter("tetris").is_empty());
    }

    #[test]
    fn deep_link_matches_id_text() {
        let catalog = sample();
        assert_eq!(catalog.find_by_param("2").map(|z| z.name.as_str()), Some("A"));
        assert_eq!(catalog.find_by_param("-1").map(|z| z.name.as_str()), Some("Z"));
        assert!(catalog.find_by_param("02").is_none());
        assert!(catalog.find_by_param("99").is_none());
    }

    #[test]
    fn stat_names_yield_ids() {
        assert_eq!(zone_id_from_stat_name("/12.html"), Some(12));
        assert_eq!(zone_id_from_stat_name("/games/305.html"), Some(305));
        assert_eq!(zone_id_from_stat_name("/305.htm"), None);
        assert_eq!(zone_id_from_stat_name("/a305.html"), None);
        assert_eq!(zone_id_from_stat_name("/cover/7.png"), None);
    }

    #[test]
    fn popularity_parses_hits() {
        let body = r#"[
            {"name":"/1.html","hits":{"total":10}},
            {"name":"/2.html","hits":{"total":25}},
            {"name":"/README.md","hits":{"total":99}}
        ]"#;
        let map = parse_popularity(body).unwrap();
        assert_eq!(map.score(1), 10);
        assert_eq!(map.score(2), 25);
        assert_eq!(map.score(3), 0);
        assert_eq!(map.len(), 2);
    }

    const MANIFEST: &str = "https://m.example/zones.json";
    const STATS: &str = "https://s.example/files";

    fn endpoints() -> Endpoints {
        Endpoints {
            manifest: MANIFEST.into(),
            popularity: STATS.into(),
            ..Endpoints::default()
        }
    }

    #[tokio::test]
    async fn load_merges_manifest_and_popularity() {
        let stub = Arc::new(
            StubTransport::default()
                .with_route(
                    MANIFEST,
                    r#"[{"id":1,"name":"B","cover":"c","url":"u","author":"x"},{"id":2,"name":"A","cover":"c","url":"u","author":"y"}]"#,
                )
                .with_route(STATS, r#"[{"name":"/2.html","hits":{"total":7}}]"#),
        );
        let net = client_with(Arc::clone(&stub));
        let catalog = load_catalog(&net, &endpoints()).await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.popularity().score(2), 7);
        assert!(stub.seen()[0].starts_with("https://m.example/zones.json?t="));
    }

    #[tokio::test]
    async fn popularity_failure_degrades() {
        let stub = Arc::new(
            StubTransport::default()
                .with_route(MANIFEST, r#"[{"id":1,"name":"B","cover":"c","url":"u"}]"#)
                .with_failure(STATS, "connection reset"),
        );
        let net = client_with(stub);
        let catalog = load_catalog(&net, &endpoints()).await.unwrap();
        assert_eq!(catalog.popularity(), &PopularityMap::degraded());
    }

    #[tokio::test]
    async fn blocked_popularity_degrades_without_request() {
        let stub = Arc::new(
            StubTransport::default()
                .with_route(MANIFEST, r#"[{"id":1,"name":"B","cover":"c","url":"u"}]"#),
        );
        let net = client_with(Arc::clone(&stub));
        let mut eps = endpoints();
        eps.popularity = "https://stats.lightspeed.io/files".into();
        let catalog = load_catalog(&net, &eps).await.unwrap();
        assert_eq!(catalog.popularity(), &PopularityMap::degraded());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn manifest_failure_is_an_error() {
        let stub = Arc::new(StubTransport::default().with_route(MANIFEST, "not json"));
        let net = client_with(stub);
        let err = load_catalog(&net, &endpoints()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Manifest(_)));
    }
}
