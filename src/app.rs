use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config_file_path, load_catalog, load_file_config, storage_db_path, Catalog, FileConfig,
    HttpTransport, Launcher, NetClient, OpenOutcome, PageLocation, SortMode, StateStore, Viewer,
    ViewerError,
};

/// Process-wide collaborators, built once at startup.
pub(crate) struct AppContext {
    pub(crate) workspace: PathBuf,
    pub(crate) config: FileConfig,
    pub(crate) net: NetClient,
}

impl AppContext {
    pub(crate) fn build(workspace: PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_file_config(&config_file_path(&workspace));
        let origin = Url::parse(&config.page_url)?;
        debug!(
            origin = %origin,
            blocked = config.blocklist.entries().len(),
            "[app] network policy ready"
        );
        let transport = Arc::new(HttpTransport::new()?);
        let net = NetClient::new(transport, config.blocklist.clone(), origin);
        Ok(Self {
            workspace,
            config,
            net,
        })
    }

    /// Apply `serve --bind/--port` overrides. The page origin follows the listen
    /// address; returns whether anything changed.
    pub(crate) fn rebind(
        &mut self,
        bind: Option<String>,
        port: Option<u16>,
    ) -> Result<bool, url::ParseError> {
        if bind.is_none() && port.is_none() {
            return Ok(false);
        }
        if let Some(bind) = bind {
            self.config.bind = bind;
        }
        if let Some(port) = port {
            self.config.port = port;
        }
        let origin = Url::parse(&listen_page_url(&self.config.bind, self.config.port))?;
        debug!(origin = %origin, "[app] page origin follows listen address");
        self.config.page_url = origin.to_string();
        self.net = self.net.clone().with_origin(origin);
        Ok(true)
    }

    pub(crate) fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub(crate) fn open_store(&self) -> Result<StateStore, Box<dyn std::error::Error>> {
        Ok(StateStore::open(&storage_db_path(&self.workspace))?)
    }
}

/// Page URL served at `bind:port`.
pub(crate) fn listen_page_url(bind: &str, port: u16) -> String {
    if bind.contains(':') && !bind.starts_with('[') {
        format!("http://[{bind}]:{port}/")
    } else {
        format!("http://{bind}:{port}/")
    }
}

/// Result of the startup sequence: catalog load, initial sort, deep link.
pub(crate) struct Startup {
    pub(crate) catalog: Result<Catalog, String>,
    pub(crate) deep_link: Option<Result<OpenOutcome, ViewerError>>,
}

/// Load the catalog, sort it, then open the zone named by the location's `id`.
pub(crate) async fn startup(
    net: &NetClient,
    config: &FileConfig,
    sort: SortMode,
    viewer: &mut Viewer,
    location: &mut PageLocation,
    launcher: &dyn Launcher,
) -> Startup {
    let mut catalog = match load_catalog(net, &config.endpoints).await {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!("[startup] catalog unavailable: {err}");
            return Startup {
                catalog: Err(err.to_string()),
                deep_link: None,
            };
        }
    };
    catalog.sort(sort);
    info!(
        zones = catalog.len(),
        scored = catalog.popularity().len(),
        sort = sort.as_str(),
        "[startup] catalog ready"
    );

    let requested = location.zone_param();
    let deep_link = match requested
        .as_deref()
        .and_then(|id| catalog.find_by_param(id))
        .cloned()
    {
        Some(zone) => {
            info!(zone = zone.id, "[startup] deep link");
            Some(
                viewer
                    .open(&zone, net, &config.endpoints, location, launcher)
                    .await,
            )
        }
        None => None,
    };

    Startup {
        catalog: Ok(catalog),
        deep_link,
    }
}
