//! Network client shared by every component.
//!
//! All outgoing requests resolve against the page origin and pass the
//! [`BlocklistPolicy`] before reaching the transport. Two entry points mirror the
//! two browser request primitives: `fetch_text` rejects blocked targets with an
//! error, `open_request` silently declines to build a request for them.
//! `fetch_document` is the fetch-style call for zone documents, which take the
//! response body whatever the status.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{now_ms, resolve_against, BlocklistPolicy};

pub(crate) type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TextResponse, NetError>> + Send + 'a>>;

#[derive(Error, Debug)]
pub(crate) enum NetError {
    #[error("request blocked: {0}")]
    Blocked(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transport: {0}")]
    Transport(String),
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl TextResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response, otherwise a `Status` error.
    pub(crate) fn into_success(self, url: &Url) -> Result<String, NetError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(NetError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// The dispatch primitive underneath [`NetClient`]. Only transport failures are
/// errors here; status handling belongs to the caller.
pub(crate) trait Transport: Send + Sync {
    fn get_text<'a>(&'a self, url: &'a Url) -> TransportFuture<'a>;
}

pub(crate) struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub(crate) fn new() -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("zonedeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get_text<'a>(&'a self, url: &'a Url) -> TransportFuture<'a> {
        Box::pin(async move {
            let resp = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| NetError::Transport(e.to_string()))?;
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| NetError::Transport(e.to_string()))?;
            Ok(TextResponse { status, body })
        })
    }
}

#[derive(Clone)]
pub(crate) struct NetClient {
    transport: Arc<dyn Transport>,
    policy: BlocklistPolicy,
    origin: Url,
}

impl NetClient {
    pub(crate) fn new(transport: Arc<dyn Transport>, policy: BlocklistPolicy, origin: Url) -> Self {
        Self {
            transport,
            policy,
            origin,
        }
    }

    /// Same transport and policy, resolving against a different page origin.
    pub(crate) fn with_origin(self, origin: Url) -> Self {
        Self { origin, ..self }
    }

    async fn dispatch(&self, target: &str) -> Result<(Url, TextResponse), NetError> {
        let url = resolve_against(&self.origin, target)?;
        if self.policy.is_blocked(&url) {
            warn!(url = %url, "[net] blocked fetch");
            return Err(NetError::Blocked(url.host_str().unwrap_or_default().to_string()));
        }
        debug!(url = %url, "[net] fetch");
        let response = self.transport.get_text(&url).await?;
        Ok((url, response))
    }

    /// Fetch-style request for data: blocked targets reject without touching the
    /// transport, non-2xx responses are errors.
    pub(crate) async fn fetch_text(&self, target: &str) -> Result<String, NetError> {
        let (url, response) = self.dispatch(target).await?;
        response.into_success(&url)
    }

    /// Fetch-style request for a document: the body is returned for any status.
    pub(crate) async fn fetch_document(&self, target: &str) -> Result<String, NetError> {
        let (url, response) = self.dispatch(target).await?;
        if !response.is_success() {
            debug!(url = %url, status = response.status, "[net] document served with error status");
        }
        Ok(response.body)
    }

    /// Request-object-style open: blocked or unparseable targets yield `None`.
    pub(crate) fn open_request(&self, target: &str) -> Option<PendingRequest> {
        let url = match resolve_against(&self.origin, target) {
            Ok(url) => url,
            Err(err) => {
                warn!(target, "[net] cannot resolve request target: {err}");
                return None;
            }
        };
        if self.policy.is_blocked(&url) {
            warn!(url = %url, "[net] blocked request");
            return None;
        }
        Some(PendingRequest {
            url,
            transport: Arc::clone(&self.transport),
        })
    }
}

pub(crate) struct PendingRequest {
    url: Url,
    transport: Arc<dyn Transport>,
}

impl PendingRequest {
    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) async fn send(self) -> Result<String, NetError> {
        debug!(url = %self.url, "[net] send");
        self.transport.get_text(&self.url).await?.into_success(&self.url)
    }
}

/// Append a `t=<epoch-ms>` cache-buster, keeping any existing query pairs.
pub(crate) fn cache_busted(target: &str) -> String {
    match Url::parse(target) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("t", &now_ms().to_string());
            url.to_string()
        }
        Err(_) => {
            let sep = if target.contains('?') { '&' } else { '?' };
            format!("{target}{sep}t={}", now_ms())
        }
    }
}

pub(crate) const CANVAS_GUARD_SCRIPT: &str =
    "<script>HTMLCanvasElement.prototype.toDataURL=function(){return \"\";};</script>";

/// Insert the canvas guard so it runs before any script in `document`.
pub(crate) fn inject_canvas_guard(document: &str) -> String {
    let lower = document.to_ascii_lowercase();
    let head = lower.match_indices("<head").map(|(i, _)| i).find(|&i| {
        matches!(lower.as_bytes().get(i + 5), Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n'))
    });
    if let Some(start) = head {
        if let Some(close) = lower[start..].find('>') {
            let at = start + close + 1;
            let mut out = String::with_capacity(document.len() + CANVAS_GUARD_SCRIPT.len());
            out.push_str(&document[..at]);
            out.push_str(CANVAS_GUARD_SCRIPT);
            out.push_str(&document[at..]);
            return out;
        }
    }
    format!("{CANVAS_GUARD_SCRIPT}{document}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Canned responses keyed by URL without its query string.
    #[derive(Default)]
    pub(crate) struct StubTransport {
        routes: Mutex<HashMap<String, Result<TextResponse, String>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl StubTransport {
        pub(crate) fn with_route(self, url: &str, body: &str) -> Self {
            self.with_status(url, 200, body)
        }

        pub(crate) fn with_status(self, url: &str, status: u16, body: &str) -> Self {
            self.routes.lock().unwrap().insert(
                url.to_string(),
                Ok(TextResponse {
                    status,
                    body: body.to_string(),
                }),
            );
            self
        }

        pub(crate) fn with_failure(self, url: &str, message: &str) -> Self {
            self.routes
                .lock()
                .unwrap()
                .insert(url.to_string(), Err(message.to_string()));
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn get_text<'a>(&'a self, url: &'a Url) -> TransportFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            let mut key = url.clone();
            key.set_query(None);
            let outcome = self.routes.lock().unwrap().get(key.as_str()).cloned();
            Box::pin(async move {
                match outcome {
                    Some(Ok(response)) => Ok(response),
                    Some(Err(message)) => Err(NetError::Transport(message)),
                    None => Ok(TextResponse {
                        status: 404,
                        body: String::new(),
                    }),
                }
            })
        }
    }

    pub(crate) fn client_with(stub: Arc<StubTransport>) -> NetClient {
        NetClient::new(
            stub,
            BlocklistPolicy::default(),
            Url::parse("http://127.0.0.1:8787/").unwrap(),
        )
    }
}
