use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::broadcaster::{Broadcaster, Subscription};
use crate::error::TraceError;
use crate::processor::load_spans;
use crate::record::SpanRecord;

/// Default port of the live view.
pub const DEFAULT_PORT: u16 = 8765;

/// Idle time after which a keepalive comment is sent to subscribers.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
struct AppState {
    broadcaster: Broadcaster,
    db_path: Option<PathBuf>,
    shutdown: watch::Receiver<bool>,
}

/// HTTP server streaming span events to trace viewers.
///
/// Routes:
///
/// - `GET /api/spans/stream`: one `span` event per lifecycle change.
/// - `GET /api/spans/history`: every stored span, oldest first.
/// - `GET /api/health`: liveness probe.
pub struct LiveServer {
    broadcaster: Broadcaster,
    port: u16,
    db_path: Option<PathBuf>,
}

impl LiveServer {
    /// Creates a server streaming the events of `broadcaster`.
    #[inline]
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            broadcaster,
            port: DEFAULT_PORT,
            db_path: None,
        }
    }

    /// Sets the port to listen on, `0` picks a free one.
    #[inline]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the database the history endpoint reads from.
    #[inline]
    pub fn with_db_path<P: Into<PathBuf>>(mut self, db_path: P) -> Self {
        self.db_path = Some(db_path.into());
        self
    }

    /// Binds to `127.0.0.1` and serves in a background task.
    pub async fn bind(self) -> Result<RunningServer, TraceError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, self.port)).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = router(AppState {
            broadcaster: self.broadcaster,
            db_path: self.db_path,
            shutdown: shutdown_rx.clone(),
        });

        let handle = tokio::spawn(async move {
            let mut shutdown = shutdown_rx;
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stopped| *stopped).await;
                })
                .await;
            if let Err(err) = served {
                error!("live server failed: {err}");
            }
        });
        info!("live server listening on {local_addr}");

        Ok(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            handle,
        })
    }
}

/// A live server serving in the background.
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    /// Returns the bound address.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the base URL of the server.
    #[inline]
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Closes open streams and waits for the server to stop.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            warn!("live server task failed: {err}");
        }
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("last-event-id"),
        ]);
    Router::new()
        .route("/api/spans/stream", get(stream_spans))
        .route("/api/spans/history", get(span_history))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn stream_spans(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broadcaster.subscribe();
    let mut shutdown = state.shutdown;
    // The subscription lives inside the stream and is dropped, which
    // unsubscribes, as soon as the client goes away.
    let events = span_events(subscription).take_until(async move {
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    });
    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEPALIVE_INTERVAL).text("ping"))
}

fn span_events(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((subscription, 0u64), |(mut subscription, id)| async move {
        let record = subscription.recv().await?;
        let id = id + 1;
        let event = match Event::default()
            .id(id.to_string())
            .event("span")
            .json_data(&record)
        {
            Ok(event) => event,
            Err(err) => {
                warn!("failed to encode span event: {err}");
                Event::default().comment("encoding failed")
            }
        };
        Some((Ok(event), (subscription, id)))
    })
}

#[derive(Serialize)]
struct History {
    spans: Vec<SpanRecord>,
}

async fn span_history(State(state): State<AppState>) -> Response {
    let Some(db_path) = state.db_path else {
        return Json(History { spans: vec![] }).into_response();
    };
    let loaded = tokio::task::spawn_blocking(move || load_spans(db_path)).await;
    match loaded {
        Ok(Ok(spans)) => Json(History { spans }).into_response(),
        Ok(Err(err)) => {
            error!("failed to load span history: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
