use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_WORKSPACE_DIR: &str = ".zonedeck";

pub(crate) const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/ten8mystery/Holy-Salmon/refs/heads/main/data/zones.json";
pub(crate) const DEFAULT_POPULARITY_URL: &str =
    "https://data.jsdelivr.com/v1/stats/packages/gh/gn-math/html@main/files?period=year";
pub(crate) const DEFAULT_COVER_BASE: &str = "https://cdn.jsdelivr.net/gh/gn-math/covers@main";
pub(crate) const DEFAULT_HTML_BASE: &str = "https://cdn.jsdelivr.net/gh/gn-math/html@main";
pub(crate) const DEFAULT_NEW_HTML_BASE: &str =
    "https://raw.githubusercontent.com/ten8mystery/Holy-Salmon-New-Html-Games-/refs/heads/main/";

pub(crate) const DEFAULT_PAGE_URL: &str = "http://127.0.0.1:8787/";
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 8787;

/// Id of the featured zone, pinned first after every sort.
pub(crate) const FEATURED_ZONE_ID: i64 = -1;

pub(crate) const COVER_PLACEHOLDER: &str = "{COVER_URL}";
pub(crate) const HTML_PLACEHOLDER: &str = "{HTML_URL}";
pub(crate) const NEW_HTML_PLACEHOLDER: &str = "{NEWHTML_URL}";

pub(crate) const NO_ZONES_MESSAGE: &str = "No zones found.";

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Zone {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) cover: String,
    pub(crate) url: String,
    /// Absent and `null` both read as no author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) author: Option<String>,
    #[serde(default, rename = "authorLink", skip_serializing_if = "Option::is_none")]
    pub(crate) author_link: Option<String>,
}

impl Zone {
    pub(crate) fn is_featured(&self) -> bool {
        self.id == FEATURED_ZONE_ID
    }

    /// Absolute external zones are opened in a new browsing context instead of the frame.
    pub(crate) fn is_external(&self) -> bool {
        self.url.starts_with("http")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SortMode {
    #[default]
    Name,
    Id,
    Popular,
}

impl SortMode {
    pub(crate) const ALL: [SortMode; 3] = [SortMode::Name, SortMode::Id, SortMode::Popular];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Id => "id",
            Self::Popular => "popular",
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Id => "ID",
            Self::Popular => "Popular",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "id" => Ok(Self::Id),
            "popular" | "popularity" => Ok(Self::Popular),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// Metadata shown above the frame while a zone is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ZoneMeta {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) author_link: Option<String>,
}

impl ZoneMeta {
    pub(crate) fn from_zone(zone: &Zone) -> Self {
        Self {
            id: zone.id,
            name: zone.name.clone(),
            author: format!("by {}", zone.author.as_deref().unwrap_or_default()),
            author_link: zone.author_link.clone().filter(|link| !link.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ListResponse {
    pub(crate) sort: SortMode,
    pub(crate) query: Option<String>,
    pub(crate) count: usize,
    pub(crate) zones: Vec<GridItem>,
}

/// A single rendered grid entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct GridItem {
    pub(crate) id: i64,
    pub(crate) label: String,
    pub(crate) cover_src: String,
    pub(crate) external: bool,
}
