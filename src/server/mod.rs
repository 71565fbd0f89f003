//! Embedded HTTP server.
//!
//! Serves the single-page UI plus a small JSON API: server profiles, local
//! and remote directory listings, transfer start, and an SSE progress feed.
//! Every JSON response is wrapped in the same `{success, data?, error?}`
//! envelope so the UI has one error path.

pub mod bind;

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{error, warn};

use crate::listing;
use crate::progress::ProgressBroadcaster;
use crate::registry::{AuthMode, ServerRegistry};
use crate::sftp::{run_transfer, TransferControl, TransferError, TransferRequest};

/// Shared state behind every handler.
pub struct AppState {
    pub registry: ServerRegistry,
    pub progress: ProgressBroadcaster,
}

impl AppState {
    pub fn new(registry: ServerRegistry) -> Arc<Self> {
        Arc::new(Self {
            registry,
            progress: ProgressBroadcaster::new(),
        })
    }
}

/// Uniform JSON response shape.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.into()),
        })
    }
}

impl Envelope<()> {
    fn done() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Profile fields exposed to the UI. The identity file path stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerSummary {
    name: String,
    host: String,
    port: u16,
    user: String,
    auth_mode: AuthMode,
}

#[derive(Debug, Deserialize)]
struct LocalQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteQuery {
    server: String,
    #[serde(default)]
    path: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/servers", get(get_servers))
        .route("/api/local", get(get_local))
        .route("/api/remote", get(get_remote))
        .route("/api/transfer", post(post_transfer))
        .route("/api/progress", get(get_progress))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Run the server on an already-bound listener until it is shut down.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

async fn get_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summaries: Vec<ServerSummary> = state
        .registry
        .load()
        .await
        .into_iter()
        .map(|p| ServerSummary {
            name: p.name,
            host: p.host,
            port: p.port,
            user: p.user,
            auth_mode: p.auth_mode,
        })
        .collect();
    Envelope::ok(summaries)
}

async fn get_local(Query(query): Query<LocalQuery>) -> impl IntoResponse {
    match listing::local::list_local(query.path.as_deref()).await {
        Ok(listing) => Envelope::ok(listing),
        Err(e) => {
            warn!("local listing failed: {}", e);
            Envelope::err(e.to_string())
        }
    }
}

async fn get_remote(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoteQuery>,
) -> impl IntoResponse {
    let Some(profile) = state.registry.get(&query.server).await else {
        return Envelope::err("Server not found");
    };

    match listing::remote::list_remote(&profile, &query.path).await {
        Ok(listing) => Envelope::ok(listing),
        Err(e) => {
            warn!(server = %query.server, "remote listing failed: {}", e);
            Envelope::err(e.to_string())
        }
    }
}

async fn post_transfer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> impl IntoResponse {
    // A body that fails to parse still gets the envelope, not a bare 4xx.
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => return Envelope::err(rejection.body_text()),
    };

    let Some(profile) = state.registry.get(&request.server).await else {
        return Envelope::err("Server not found");
    };

    let control = TransferControl::new();
    // Held across the await below. If the client disconnects, axum drops
    // this future, the guard fires, and the spawned walk stops at its next
    // chunk boundary.
    let _guard = control.cancel_guard();

    let task = tokio::spawn(run_transfer(
        profile,
        request,
        state.progress.clone(),
        control.clone(),
    ));

    match task.await {
        Ok(Ok(())) => Envelope::done(),
        Ok(Err(TransferError::Canceled)) => Envelope::err(TransferError::Canceled.to_string()),
        Ok(Err(e)) => {
            error!("transfer failed: {}", e);
            Envelope::err(e.to_string())
        }
        Err(e) => {
            error!("transfer task panicked: {}", e);
            Envelope::err("Transfer failed unexpectedly")
        }
    }
}

async fn get_progress(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.progress.subscribe()).filter_map(|item| match item {
        Ok(event) => Event::default().json_data(&event).ok().map(Ok),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("progress subscriber lagged, dropped {} events", n);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Permissive CORS for the local UI. Preflights are answered here; everything
/// else passes through and gets the allow headers stamped on the response.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ok_omits_error() {
        let json = serde_json::to_value(&Envelope::ok(vec![1, 2, 3]).0).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn envelope_err_omits_data() {
        let json = serde_json::to_value(&Envelope::<()>::err("Server not found").0).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Server not found");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn envelope_done_is_bare_success() {
        let json = serde_json::to_value(&Envelope::done().0).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));
    }
}
