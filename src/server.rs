//! Local single-page front end.
//!
//! tiny_http accepts connections on a blocking thread and forwards each request
//! to one UI task that owns every piece of state. Zone fetches run as spawned
//! tasks and report back through the same channel, so all mutation happens in
//! one place and open ordering is decided by tickets.

use std::collections::HashMap;
use std::io::{self, Cursor};

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cache_busted, export_filename, inject_canvas_guard, now_ms, render, render_page,
    save_session, save_viewer, toggle_dark_mode, AppContext, Catalog, CatalogRender, NetClient,
    NetError, OpenOutcome, OpenPlan, OpenTicket, PageLocation, PageModel, Popup, Session,
    SortMode, StateStore, Viewer, Zone, IMPORT_DONE_MESSAGE, ZONE_PARAM,
};

type HttpResponse = Response<Cursor<Vec<u8>>>;

const UI_QUEUE_DEPTH: usize = 64;

pub(crate) enum UiEvent {
    Request(Request),
    ZoneFetched {
        ticket: OpenTicket,
        zone: Zone,
        fetched: Result<String, NetError>,
        request: Request,
    },
}

fn header(name: &str, value: &str) -> io::Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid header {name}")))
}

fn html_response(body: String) -> HttpResponse {
    let mut response = Response::from_string(body);
    if let Ok(h) = header("Content-Type", "text/html; charset=utf-8") {
        response.add_header(h);
    }
    response
}

fn text_response(body: &str, status: u16) -> HttpResponse {
    let mut response = Response::from_string(body).with_status_code(StatusCode(status));
    if let Ok(h) = header("Content-Type", "text/plain; charset=utf-8") {
        response.add_header(h);
    }
    response
}

fn redirect(location: &str) -> HttpResponse {
    let mut response = Response::from_string("").with_status_code(StatusCode(303));
    if let Ok(h) = header("Location", location) {
        response.add_header(h);
    }
    response
}

fn respond(request: Request, response: HttpResponse) {
    let url = request.url().to_string();
    if let Err(err) = request.respond(response) {
        warn!(url = %url, "[server] respond failed: {err}");
    }
}

/// Path and decoded query parameters of a request target.
pub(crate) fn parse_target(raw: &str) -> (String, HashMap<String, String>) {
    let base = Url::parse("http://localhost/").ok();
    match base.and_then(|b| b.join(raw).ok()) {
        Some(url) => (
            url.path().to_string(),
            url.query_pairs().into_owned().collect(),
        ),
        None => (raw.to_string(), HashMap::new()),
    }
}

/// How the UI task answers a request. `Fetch` defers the answer until the zone
/// document arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    Html(String),
    Text { status: u16, body: String },
    Attachment { filename: String, body: String },
    Redirect(String),
    Fetch {
        ticket: OpenTicket,
        zone: Zone,
        url: String,
    },
}

pub(crate) struct UiState {
    ctx: AppContext,
    catalog: Result<Catalog, String>,
    session: Session,
    viewer: Viewer,
    location: PageLocation,
    store: StateStore,
}

impl UiState {
    pub(crate) fn new(
        ctx: AppContext,
        catalog: Result<Catalog, String>,
        session: Session,
        viewer: Viewer,
        location: PageLocation,
        store: StateStore,
    ) -> Self {
        Self {
            ctx,
            catalog,
            session,
            viewer,
            location,
            store,
        }
    }

    fn persist(&mut self) {
        self.session.location = Some(self.location.url().to_string());
        if let Err(err) = save_viewer(&self.ctx.workspace, &mut self.session, &self.viewer) {
            warn!("[server] saving viewer failed: {err}");
        }
        if let Err(err) = save_session(&self.ctx.workspace, &self.session) {
            warn!("[server] saving session failed: {err}");
        }
    }

    fn page(&mut self, query: &str, popup: Option<Popup>, alert: Option<String>) -> String {
        let sort = self.session.sort;
        let grid = match &mut self.catalog {
            Ok(catalog) => {
                catalog.sort(sort);
                render(&catalog.filter(query), &self.ctx.config.endpoints)
            }
            Err(err) => CatalogRender::Failed(err.clone()),
        };
        let state = self.viewer.state();
        let viewer = if state.visible { state.meta.as_ref() } else { None };
        render_page(&PageModel {
            grid: &grid,
            query,
            sort,
            viewer,
            dark_mode: self.session.dark_mode,
            popup,
            alert,
        })
    }

    fn find_zone(&self, raw_id: &str) -> Option<Zone> {
        self.catalog
            .as_ref()
            .ok()
            .and_then(|catalog| catalog.find_by_param(raw_id))
            .cloned()
    }

    fn open_reply(&mut self, zone: Zone) -> Reply {
        match self.viewer.begin_open(&zone, &self.ctx.config.endpoints) {
            OpenPlan::External(url) => {
                info!(zone = zone.id, url = %url, "[server] external zone");
                Reply::Redirect(url)
            }
            OpenPlan::Fetch { ticket, url } => Reply::Fetch { ticket, zone, url },
        }
    }

    /// Apply one request to the UI state.
    pub(crate) fn route(&mut self, method: &Method, target: &str, body: &str) -> Reply {
        let (path, params) = parse_target(target);
        debug!(method = %method, path = %path, "[server] request");

        match (method, path.as_str()) {
            (Method::Get, "/") => {
                if let Some(sort) = params.get("sort").and_then(|s| s.parse::<SortMode>().ok()) {
                    self.session.sort = sort;
                }
                let query = params.get("q").cloned().unwrap_or_default();
                let popup = params
                    .get("panel")
                    .and_then(|p| Popup::from_param(p, &self.ctx.config.contact_text));

                match params.get(ZONE_PARAM) {
                    Some(raw_id) => {
                        if let Some(zone) = self.find_zone(raw_id) {
                            if !self.viewer.is_showing(zone.id) {
                                return self.open_reply(zone);
                            }
                        }
                    }
                    None => {
                        if self.viewer.state().visible {
                            self.viewer.close(&mut self.location);
                        }
                    }
                }
                self.persist();
                Reply::Html(self.page(&query, popup, None))
            }
            (Method::Get, "/open") => {
                match params.get(ZONE_PARAM).and_then(|id| self.find_zone(id)) {
                    Some(zone) => self.open_reply(zone),
                    None => Reply::Text {
                        status: 404,
                        body: "zone not found".into(),
                    },
                }
            }
            (Method::Get, "/frame") => {
                Reply::Html(inject_canvas_guard(self.viewer.frame().document()))
            }
            (Method::Get, "/close") => {
                self.viewer.close(&mut self.location);
                self.persist();
                Reply::Redirect(self.location.relative())
            }
            (Method::Get, "/settings/dark-mode") => {
                let on = toggle_dark_mode(&mut self.session);
                debug!(dark_mode = on, "[server] dark mode toggled");
                self.persist();
                Reply::Redirect("/?panel=settings".into())
            }
            (Method::Get, "/settings/export") => match self.store.export_blob() {
                Ok(blob) => Reply::Attachment {
                    filename: export_filename(now_ms()),
                    body: blob,
                },
                Err(err) => {
                    warn!("[server] export failed: {err}");
                    Reply::Text {
                        status: 500,
                        body: format!("export failed: {err}"),
                    }
                }
            },
            (Method::Post, "/settings/import") => match self.store.import_blob(body) {
                Ok(report) => {
                    info!(keys = report.keys, cookies = report.cookies, "[server] data imported");
                    Reply::Text {
                        status: 200,
                        body: IMPORT_DONE_MESSAGE.into(),
                    }
                }
                Err(err) => {
                    warn!("[server] import failed: {err}");
                    Reply::Text {
                        status: 500,
                        body: format!("import failed: {err}"),
                    }
                }
            },
            _ => Reply::Text {
                status: 404,
                body: "not found".into(),
            },
        }
    }

    /// Apply a finished zone fetch. Superseded opens change nothing.
    pub(crate) fn complete_open(
        &mut self,
        ticket: OpenTicket,
        zone: Zone,
        fetched: Result<String, NetError>,
    ) -> Reply {
        match self
            .viewer
            .finish_open(ticket, &zone, fetched, &mut self.location)
        {
            Ok(OpenOutcome::Superseded) => Reply::Redirect(self.location.relative()),
            Ok(_) => {
                self.persist();
                Reply::Redirect(self.location.relative())
            }
            Err(err) => {
                warn!(zone = zone.id, "[server] {err}");
                Reply::Html(self.page("", None, Some(err.to_string())))
            }
        }
    }

    fn answer(&self, reply: Reply, request: Request, tx: &mpsc::Sender<UiEvent>) {
        match reply {
            Reply::Html(body) => respond(request, html_response(body)),
            Reply::Text { status, body } => respond(request, text_response(&body, status)),
            Reply::Attachment { filename, body } => {
                let mut response = text_response(&body, 200);
                let disposition = format!("attachment; filename=\"{filename}\"");
                if let Ok(h) = header("Content-Disposition", &disposition) {
                    response.add_header(h);
                }
                respond(request, response);
            }
            Reply::Redirect(location) => respond(request, redirect(&location)),
            Reply::Fetch { ticket, zone, url } => {
                let net: NetClient = self.ctx.net.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let fetched = net.fetch_document(&cache_busted(&url)).await;
                    let event = UiEvent::ZoneFetched {
                        ticket,
                        zone,
                        fetched,
                        request,
                    };
                    if tx.send(event).await.is_err() {
                        debug!("[server] ui loop gone, dropping fetch result");
                    }
                });
            }
        }
    }

    fn handle_request(&mut self, mut request: Request, tx: &mpsc::Sender<UiEvent>) {
        let mut body = String::new();
        if *request.method() == Method::Post {
            if let Err(err) = request.as_reader().read_to_string(&mut body) {
                respond(request, text_response(&format!("read body: {err}"), 400));
                return;
            }
        }
        let method = request.method().clone();
        let target = request.url().to_string();
        let reply = self.route(&method, &target, &body);
        self.answer(reply, request, tx);
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<UiEvent>, tx: mpsc::Sender<UiEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                UiEvent::Request(request) => self.handle_request(request, &tx),
                UiEvent::ZoneFetched {
                    ticket,
                    zone,
                    fetched,
                    request,
                } => {
                    let reply = self.complete_open(ticket, zone, fetched);
                    self.answer(reply, request, &tx);
                }
            }
        }
    }
}

/// Bind, start the accept thread, and run the UI loop until the listener stops.
pub(crate) async fn serve(
    state: UiState,
    bind: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{bind}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| io::Error::other(format!("server: {e}")))?;
    info!("zone browser listening on http://{addr}");
    eprintln!("Serving zones on http://{addr}");

    let (tx, rx) = mpsc::channel(UI_QUEUE_DEPTH);
    let accept_tx = tx.clone();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            if accept_tx.blocking_send(UiEvent::Request(request)).is_err() {
                break;
            }
        }
    });

    state.run(rx, tx).await;
    Ok(())
}
