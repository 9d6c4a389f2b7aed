use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    BlocklistPolicy, DEFAULT_BIND, DEFAULT_COVER_BASE, DEFAULT_HTML_BASE, DEFAULT_MANIFEST_URL,
    DEFAULT_NEW_HTML_BASE, DEFAULT_PAGE_URL, DEFAULT_POPULARITY_URL, DEFAULT_PORT,
};

pub(crate) const DEFAULT_CONTACT_TEXT: &str = "Contact info or form here.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Endpoints {
    pub(crate) manifest: String,
    pub(crate) popularity: String,
    pub(crate) cover_base: String,
    pub(crate) html_base: String,
    pub(crate) new_html_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            manifest: DEFAULT_MANIFEST_URL.to_string(),
            popularity: DEFAULT_POPULARITY_URL.to_string(),
            cover_base: DEFAULT_COVER_BASE.to_string(),
            html_base: DEFAULT_HTML_BASE.to_string(),
            new_html_base: DEFAULT_NEW_HTML_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub(crate) endpoints: Endpoints,
    pub(crate) blocklist: BlocklistPolicy,
    /// Address the page is reachable at; relative requests and deep links resolve here.
    pub(crate) page_url: String,
    pub(crate) bind: String,
    pub(crate) port: u16,
    /// Command used to open external zones, e.g. `firefox --new-tab`.
    pub(crate) browser_command: Option<String>,
    pub(crate) contact_text: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            blocklist: BlocklistPolicy::default(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            browser_command: None,
            contact_text: DEFAULT_CONTACT_TEXT.to_string(),
        }
    }
}

pub(crate) fn config_file_path(workspace: &Path) -> PathBuf {
    workspace.join("config.json")
}

pub(crate) fn load_file_config(path: &Path) -> FileConfig {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
            warn!(path = %path.display(), "[config] invalid config, using defaults: {err}");
            FileConfig::default()
        }),
        Err(_) => FileConfig::default(),
    }
}

pub(crate) fn save_file_config(
    path: &Path,
    config: &FileConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
