//! The zone viewer: an embedded frame, its metadata, and the page location
//! that records which zone is open.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
    build_external_command, cache_busted, fill_content_template, system_open_command, Endpoints,
    NetClient, NetError, Zone, ZoneMeta,
};

pub(crate) const ZONE_PARAM: &str = "id";

#[derive(Error, Debug)]
pub(crate) enum ViewerError {
    #[error("Failed to load zone: {0}")]
    Load(#[from] NetError),

    #[error("Failed to open {url}: {source}")]
    Launch { url: String, source: io::Error },
}

/// The frame's document. Writing always discards the previous document entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Frame {
    document: String,
}

impl Frame {
    pub(crate) fn with_document(document: String) -> Self {
        Self { document }
    }

    pub(crate) fn document(&self) -> &str {
        &self.document
    }

    pub(crate) fn replace_document(&mut self, markup: &str) {
        self.document.clear();
        self.document.push_str(markup);
    }

    pub(crate) fn clear(&mut self) {
        self.document.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ViewerState {
    pub(crate) visible: bool,
    #[serde(default)]
    pub(crate) meta: Option<ZoneMeta>,
}

/// The addressable page URL. Only the `id` parameter is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub(crate) fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(raw)?,
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn zone_param(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == ZONE_PARAM)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn set_zone(&mut self, id: i64) {
        self.rewrite(Some(id.to_string()));
    }

    pub(crate) fn clear_zone(&mut self) {
        self.rewrite(None);
    }

    /// The same path and query under another page URL.
    pub(crate) fn rebased(&self, page_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(page_url)?.join(&self.relative())?,
        })
    }

    /// Path plus query, suitable for a same-origin redirect.
    pub(crate) fn relative(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{q}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    fn rewrite(&mut self, zone: Option<String>) {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| k != ZONE_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() && zone.is_none() {
            self.url.set_query(None);
            return;
        }
        let mut pairs = self.url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        if let Some(id) = &zone {
            pairs.append_pair(ZONE_PARAM, id);
        }
    }
}

/// Opens external zones in a new browsing context.
pub(crate) trait Launcher {
    fn launch(&self, url: &str) -> io::Result<()>;
}

pub(crate) struct SystemLauncher {
    command: Vec<String>,
}

impl SystemLauncher {
    /// `browser_command` is shell-split; an unusable value falls back to the platform opener.
    pub(crate) fn new(browser_command: Option<&str>) -> Self {
        let command = browser_command
            .and_then(shlex::split)
            .filter(|parts| !parts.is_empty())
            .unwrap_or_else(system_open_command);
        Self { command }
    }
}

impl Launcher for SystemLauncher {
    fn launch(&self, url: &str) -> io::Result<()> {
        let mut args: Vec<String> = self.command[1..].to_vec();
        args.push(url.to_string());
        build_external_command(&self.command[0], &args).spawn()?;
        Ok(())
    }
}

/// Identifies one open request. Only the most recently issued ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OpenPlan {
    External(String),
    Fetch { ticket: OpenTicket, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OpenOutcome {
    Shown(ZoneMeta),
    External(String),
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FullscreenApi {
    Standard,
    Moz,
    Webkit,
    Ms,
}

pub(crate) const FULLSCREEN_FALLBACK: [FullscreenApi; 4] = [
    FullscreenApi::Standard,
    FullscreenApi::Moz,
    FullscreenApi::Webkit,
    FullscreenApi::Ms,
];

impl FullscreenApi {
    pub(crate) fn method(&self) -> &'static str {
        match self {
            Self::Standard => "requestFullscreen",
            Self::Moz => "mozRequestFullScreen",
            Self::Webkit => "webkitRequestFullscreen",
            Self::Ms => "msRequestFullscreen",
        }
    }
}

/// Script for the page's fullscreen button, trying entry points in fallback order.
pub(crate) fn fullscreen_script(frame_id: &str) -> String {
    let mut script = format!("var f=document.getElementById('{frame_id}');if(!f){{}}");
    for api in FULLSCREEN_FALLBACK {
        let m = api.method();
        script.push_str(&format!("else if(f.{m}){{f.{m}();}}"));
    }
    script
}

#[derive(Debug, Default)]
pub(crate) struct Viewer {
    state: ViewerState,
    frame: Frame,
    issued: u64,
}

impl Viewer {
    pub(crate) fn restore(state: ViewerState, frame: Frame) -> Self {
        Self {
            state,
            frame,
            issued: 0,
        }
    }

    pub(crate) fn state(&self) -> &ViewerState {
        &self.state
    }

    pub(crate) fn frame(&self) -> &Frame {
        &self.frame
    }

    pub(crate) fn is_showing(&self, id: i64) -> bool {
        self.state.visible && self.state.meta.as_ref().is_some_and(|m| m.id == id)
    }

    /// Decide how to open `zone`. Fetch plans carry a fresh ticket that
    /// supersedes every earlier one.
    pub(crate) fn begin_open(&mut self, zone: &Zone, endpoints: &Endpoints) -> OpenPlan {
        if zone.is_external() {
            return OpenPlan::External(zone.url.clone());
        }
        self.issued += 1;
        let url = fill_content_template(&zone.url, endpoints);
        debug!(zone = zone.id, ticket = self.issued, "[viewer] open requested");
        OpenPlan::Fetch {
            ticket: OpenTicket(self.issued),
            url,
        }
    }

    /// Apply a completed fetch. Stale tickets are dropped; failures leave state untouched.
    pub(crate) fn finish_open(
        &mut self,
        ticket: OpenTicket,
        zone: &Zone,
        fetched: Result<String, NetError>,
        location: &mut PageLocation,
    ) -> Result<OpenOutcome, ViewerError> {
        if ticket.0 != self.issued {
            debug!(zone = zone.id, ticket = ticket.0, latest = self.issued, "[viewer] stale open discarded");
            return Ok(OpenOutcome::Superseded);
        }
        let markup = fetched?;
        self.frame.replace_document(&markup);
        let meta = ZoneMeta::from_zone(zone);
        self.state.meta = Some(meta.clone());
        self.state.visible = true;
        location.set_zone(zone.id);
        info!(zone = zone.id, name = %zone.name, "[viewer] zone opened");
        Ok(OpenOutcome::Shown(meta))
    }

    /// Plan, fetch and apply in one sequence.
    pub(crate) async fn open(
        &mut self,
        zone: &Zone,
        net: &NetClient,
        endpoints: &Endpoints,
        location: &mut PageLocation,
        launcher: &dyn Launcher,
    ) -> Result<OpenOutcome, ViewerError> {
        match self.begin_open(zone, endpoints) {
            OpenPlan::External(url) => {
                launcher
                    .launch(&url)
                    .map_err(|source| ViewerError::Launch {
                        url: url.clone(),
                        source,
                    })?;
                info!(zone = zone.id, url = %url, "[viewer] external zone launched");
                Ok(OpenOutcome::External(url))
            }
            OpenPlan::Fetch { ticket, url } => {
                let fetched = net.fetch_document(&cache_busted(&url)).await;
                self.finish_open(ticket, zone, fetched, location)
            }
        }
    }

    pub(crate) fn close(&mut self, location: &mut PageLocation) {
        self.state.visible = false;
        self.frame.clear();
        location.clear_zone();
        debug!("[viewer] closed");
    }
}
