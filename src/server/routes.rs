//! HTTP routes for the desktop UI surface

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{future, stream, Stream, StreamExt};
use std::convert::Infallible;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::codec;
use crate::config::{BridgeConfig, Network};
use crate::engine::Engine;
use crate::error::Error;
use crate::router::EventRouter;
use crate::runtime::Shutdown;
use crate::ui::{Notification, UiDispatcher};

/// Serves `GET /img/{address}` as a PNG QR code of the payment URI.
#[derive(Debug, Clone, Copy)]
pub struct ImageEndpoint {
    network: Network,
    size: u32,
}

impl ImageEndpoint {
    pub fn new(network: Network, size: u32) -> Self { Self { network, size } }

    pub fn respond(&self, raw: &str) -> Response {
        let address = match codec::decode_for_network(raw, self.network) {
            Ok(address) => address,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        match codec::encode_payment_image(&address, self.size) {
            Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
            Err(e) => {
                error!(error = %e, %address, "QR encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

pub struct AppState<E: Engine> {
    pub router: Arc<EventRouter<E>>,
    pub ui: UiDispatcher,
    pub images: ImageEndpoint,
    pub app_name: String,
    /// Ends open event streams so graceful shutdown can finish.
    pub shutdown: Shutdown,
}

impl<E: Engine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            ui: self.ui.clone(),
            images: self.images,
            app_name: self.app_name.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<E: Engine> AppState<E> {
    pub fn new(router: Arc<EventRouter<E>>, ui: UiDispatcher, config: &BridgeConfig) -> Self {
        Self {
            router,
            ui,
            images: ImageEndpoint::new(config.network, config.qr_size),
            app_name: config.app.clone(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Image route alone, for surfaces without a wallet session.
pub fn image_routes(images: ImageEndpoint) -> Router {
    Router::new().route("/img/:address", get(image_only)).with_state(images)
}

/// Full UI surface. Unmatched paths fall through to the static assets.
pub fn create_router<E: Engine>(state: AppState<E>, assets_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/health", get(health::<E>))
        .route("/img/:address", get(image::<E>))
        .route("/api", post(action::<E>))
        .route("/events", get(events::<E>))
        .route("/state", get(view_state::<E>))
        .fallback_service(ServeDir::new(assets_dir))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health<E: Engine>(State(s): State<AppState<E>>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": s.app_name, "network": s.images.network.as_str()}))
}

async fn image_only(State(images): State<ImageEndpoint>, Path(address): Path<String>) -> Response {
    images.respond(&address)
}

async fn image<E: Engine>(State(s): State<AppState<E>>, Path(address): Path<String>) -> Response {
    s.images.respond(&address)
}

async fn view_state<E: Engine>(State(s): State<AppState<E>>) -> impl IntoResponse {
    Json(s.ui.view())
}

/// Body is the raw `{"fn":..,"data":..}` message.
async fn action<E: Engine>(State(s): State<AppState<E>>, body: Bytes) -> Result<StatusCode, (StatusCode, String)> {
    let raw = std::str::from_utf8(&body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    match s.router.dispatch(raw).await {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(e @ Error::DecodeFailure(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}

/// Replays the current view, then streams every notification as a script line
/// until the dispatcher stops or the server shuts down.
async fn events<E: Engine>(State(s): State<AppState<E>>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut stop = s.shutdown.subscribe();
    let stopped = s.shutdown.is_triggered().await;
    let closed = async move {
        if !stopped {
            let _ = stop.recv().await;
        }
    };

    let (replay, live) = s.ui.subscribe();
    let live = stream::unfold(live, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => return Some((notification, rx)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let events = stream::iter(replay).chain(live).take_until(closed).filter_map(|n: Notification| {
        future::ready(match n.to_script() {
            Ok(script) => Some(Ok(Event::default().data(script))),
            Err(e) => {
                warn!(error = %e, "unrenderable notification");
                None
            }
        })
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
