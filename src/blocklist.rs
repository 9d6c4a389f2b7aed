use serde::{Deserialize, Serialize};
use url::Url;

/// Host fragments whose requests are suppressed. Matched as plain substrings of
/// `host + "/"`, so `.edu/` only hits hosts ending in `.edu`.
pub(crate) const DEFAULT_BLOCKLIST: [&str; 6] = [
    "deledao",
    "goguardian",
    "lightspeed",
    "linewize",
    "securly",
    ".edu/",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct BlocklistPolicy {
    entries: Vec<String>,
}

impl Default for BlocklistPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()))
    }
}

impl BlocklistPolicy {
    pub(crate) fn new(entries: impl IntoIterator<Item = String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &[String] {
        &self.entries
    }

    pub(crate) fn is_host_blocked(&self, host: &str) -> bool {
        let candidate = format!("{}/", host.to_ascii_lowercase());
        self.entries.iter().any(|entry| candidate.contains(entry.as_str()))
    }

    /// Resolved URLs without a host (data:, about:) are never blocked.
    pub(crate) fn is_blocked(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| self.is_host_blocked(host))
    }
}

/// Resolve a possibly-relative request target against the page origin.
pub(crate) fn resolve_against(origin: &Url, target: &str) -> Result<Url, url::ParseError> {
    origin.join(target)
}
