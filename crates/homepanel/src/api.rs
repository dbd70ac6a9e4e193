use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::camera::CameraStatus;
use crate::engine::ControlError;
use crate::engine::PanelHandle;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

#[derive(Serialize)]
struct CameraResponse {
    active: bool,
    status: CameraStatus,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct AlarmRequest {
    enabled: bool,
}

#[derive(Deserialize)]
struct OpenRequest {
    open: bool,
}

#[derive(Deserialize)]
struct CameraRequest {
    active: bool,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SliderPhase {
    /// Finger still on the slider
    Drag,
    #[default]
    Commit,
}

#[derive(Deserialize)]
struct BrightnessRequest {
    value: f64,
    #[serde(default)]
    phase: SliderPhase,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    panel: PanelHandle,
}

struct ApiError(ControlError);

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ControlError::UnknownRoom(_) => StatusCode::NOT_FOUND,
            ControlError::LightOff(_) => StatusCode::CONFLICT,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.panel.state()))
}

/// Intent accepted; the body is the panel as it looks right after it.
fn accepted(state: &AppState) -> Response {
    (StatusCode::ACCEPTED, Json(state.panel.state())).into_response()
}

async fn put_alarm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AlarmRequest>,
) -> Response {
    state.panel.dispatcher().toggle_alarm(req.enabled);
    accepted(&state)
}

async fn put_door(State(state): State<Arc<AppState>>, Json(req): Json<OpenRequest>) -> Response {
    state.panel.dispatcher().toggle_door(req.open);
    accepted(&state)
}

async fn put_garage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenRequest>,
) -> Response {
    state.panel.dispatcher().toggle_garage(req.open);
    accepted(&state)
}

async fn toggle_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Response, ApiError> {
    state.panel.dispatcher().toggle_light(id)?;
    Ok(accepted(&state))
}

async fn put_brightness(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<BrightnessRequest>,
) -> Result<Response, ApiError> {
    let dispatcher = state.panel.dispatcher();
    match req.phase {
        SliderPhase::Drag => {
            dispatcher.change_brightness(id, req.value)?;
        }
        SliderPhase::Commit => {
            dispatcher.commit_brightness(id, req.value)?;
        }
    }
    Ok(accepted(&state))
}

fn camera_response(state: &AppState) -> CameraResponse {
    CameraResponse {
        active: state.panel.state().camera_active,
        status: state.panel.camera_feed().status,
    }
}

async fn get_camera(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(camera_response(&state)))
}

async fn put_camera(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CameraRequest>,
) -> impl IntoResponse {
    state.panel.dispatcher().set_camera_active(req.active);
    (StatusCode::OK, Json(camera_response(&state)))
}

/// Handler for GET /v1/camera/frame: the latest still, or 503 with no signal
async fn get_frame(State(state): State<Arc<AppState>>) -> Response {
    match state.panel.camera_feed().frame {
        Some(frame) => (
            StatusCode::OK,
            [(CONTENT_TYPE, frame.content_type)],
            frame.data,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(camera_response(&state)),
        )
            .into_response(),
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(get_state))
        .route("/v1/alarm", put(put_alarm))
        .route("/v1/door", put(put_door))
        .route("/v1/garage", put(put_garage))
        .route("/v1/rooms/:id/toggle", post(toggle_room))
        .route("/v1/rooms/:id/brightness", put(put_brightness))
        .route("/v1/camera", get(get_camera).put(put_camera))
        .route("/v1/camera/frame", get(get_frame))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for a mounted panel
pub fn router(panel: PanelHandle) -> Router {
    let version = env!("CARGO_PKG_VERSION");
    create_router(Arc::new(AppState { version, panel }))
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves the panel until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    panel: PanelHandle,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(panel);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting panel API on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("Panel API shutting down gracefully");
        })
        .await?;

    Ok(())
}
