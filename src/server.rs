//! HTTP API: read the current zone colors, change the layout.
//!
//! The server runs on the tokio async runtime while sampling runs on a
//! plain `std::thread`. Colors are read straight from the shared
//! [`SampleStore`]; anything that needs the frame source goes to the
//! refresh thread as a [`SamplerCommand`].
//!
//! ## Rust concepts
//! - axum extractors: `State`, `Json`
//! - Awaiting a `oneshot` reply from a synchronous thread
//! - `tower-http` middleware for tracing and CORS

use crate::layout::{Zone, ZoneSet};
use crate::refresh::{SamplerCommand, SamplerState, SamplerStatus};
use crate::store::SampleStore;
use crate::{Color, ScreenSize, StripConfig, ZoneError};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type ApiError = (StatusCode, String);

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Channel to the refresh thread
    pub command_tx: Sender<SamplerCommand>,
    /// Refresh thread status (refresh thread writes, handlers read)
    pub status: Arc<Mutex<SamplerStatus>>,
    /// Latest zone colors
    pub store: Arc<SampleStore>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_status, get_zones, get_colors, post_layout, post_fps),
    components(schemas(
        SamplerStatus,
        SamplerState,
        StripConfig,
        ScreenSize,
        ZoneSet,
        Zone,
        Color,
        ColorsResponse,
        LayoutRequest,
        FpsRequest,
    )),
    tags(
        (name = "colors", description = "Current zone colors"),
        (name = "config", description = "Layout and refresh settings"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Ambilight Zones API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Per-zone screen colors for an ambient LED strip"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

/// Colors in the order a strip expects them.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ColorsResponse {
    /// LEDs on each of the left and right edges
    pub vertical: u32,
    /// LEDs on each of the top and bottom edges
    pub horizontal: u32,
    /// Edge colors, clockwise from the bottom of the left edge
    pub edges: Vec<Color>,
    /// Top-left, top-right, bottom-right, bottom-left
    #[schema(value_type = Vec<Color>)]
    pub corners: [Color; 4],
}

impl From<&ZoneSet> for ColorsResponse {
    fn from(set: &ZoneSet) -> Self {
        Self {
            vertical: set.num_vertical_leds(),
            horizontal: set.num_horizontal_leds(),
            edges: set.edge_colors(),
            corners: set.corner_colors(),
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LayoutRequest {
    /// LEDs on each of the left and right edges
    #[schema(example = 10)]
    vertical: u32,
    /// LEDs on each of the top and bottom edges
    #[schema(example = 16)]
    horizontal: u32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct FpsRequest {
    /// Refresh cycles per second. Values below 1 are raised to 1.
    #[schema(example = 30, minimum = 1)]
    fps: u32,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/zones", get(get_zones))
        .route("/api/v1/colors", get(get_colors))
        .route("/api/v1/layout", post(post_layout))
        .route("/api/v1/fps", post(post_fps))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn refresh_thread_gone() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Refresh thread gone".to_string(),
    )
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status — refresh thread state and counters
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current sampler status", body = SamplerStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<SamplerStatus> {
    let status = state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(status)
}

/// GET /api/v1/zones — every zone with its rectangle and color
#[utoipa::path(
    get,
    path = "/api/v1/zones",
    tag = "colors",
    responses(
        (status = 200, description = "Current zone layout and colors", body = ZoneSet)
    )
)]
async fn get_zones(State(state): State<AppState>) -> Json<ZoneSet> {
    Json(ZoneSet::clone(&state.store.snapshot()))
}

/// GET /api/v1/colors — colors only, in strip order
#[utoipa::path(
    get,
    path = "/api/v1/colors",
    tag = "colors",
    responses(
        (status = 200, description = "Edge and corner colors", body = ColorsResponse)
    )
)]
async fn get_colors(State(state): State<AppState>) -> Json<ColorsResponse> {
    Json(ColorsResponse::from(&*state.store.snapshot()))
}

/// POST /api/v1/layout — change the LED counts
///
/// The new layout is computed against the screen's current resolution.
/// If the screen is too small for the requested density the previous
/// layout stays active and 422 is returned.
#[utoipa::path(
    post,
    path = "/api/v1/layout",
    tag = "config",
    request_body = LayoutRequest,
    responses(
        (status = 200, description = "New layout is active", body = ZoneSet),
        (status = 422, description = "Screen too small for the requested LEDs")
    )
)]
async fn post_layout(
    State(state): State<AppState>,
    Json(req): Json<LayoutRequest>,
) -> Result<Json<ZoneSet>, ApiError> {
    let (reply, rx) = oneshot::channel();
    state
        .command_tx
        .send(SamplerCommand::Reconfigure {
            strip: StripConfig::new(req.vertical, req.horizontal),
            reply,
        })
        .map_err(|_| refresh_thread_gone())?;

    match rx.await.map_err(|_| refresh_thread_gone())? {
        Ok(()) => Ok(Json(ZoneSet::clone(&state.store.snapshot()))),
        Err(e @ ZoneError::InvalidLayout { .. }) => {
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// POST /api/v1/fps — change the refresh rate
#[utoipa::path(
    post,
    path = "/api/v1/fps",
    tag = "config",
    request_body = FpsRequest,
    responses(
        (status = 200, description = "Refresh rate updated"),
    )
)]
async fn post_fps(
    State(state): State<AppState>,
    Json(req): Json<FpsRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .command_tx
        .send(SamplerCommand::SetFps(req.fps))
        .map_err(|_| refresh_thread_gone())?;

    Ok(StatusCode::OK)
}
