use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use thermostat_common::{ControllerError, Pin, PinStatus, ThermostatController};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ThermostatController>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TargetBody {
    target: f32,
}

#[derive(Debug, Deserialize)]
struct OverrideRequest {
    pin: Pin,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct SensorStatusUpdate {
    name: String,
    temperature: f32,
    #[serde(default)]
    humidity: Option<f32>,
}

/// HTTP surface. Handlers only translate between JSON and controller calls;
/// relay commands follow from the controller's commits, not from here.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_get_status))
        .route("/status", get(handle_get_status))
        .route(
            "/target_temperature",
            get(handle_get_target).put(handle_put_target),
        )
        .route("/override", post(handle_post_override))
        .route("/usable", put(handle_put_usable))
        .route("/sensor-status", put(handle_put_sensor_status))
        .route("/sensors/{name}", get(handle_get_sensor))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.snapshot())
}

async fn handle_get_target(State(state): State<AppState>) -> impl IntoResponse {
    Json(TargetBody {
        target: state.controller.target(),
    })
}

async fn handle_put_target(
    State(state): State<AppState>,
    payload: Result<Json<TargetBody>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    match state.controller.set_target_temperature(update.target) {
        Ok(_) => handle_get_target(State(state)).await.into_response(),
        Err(err) => controller_error_response(&err),
    }
}

async fn handle_post_override(
    State(state): State<AppState>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    state
        .controller
        .set_manual_override(request.pin, request.enabled);
    handle_get_status(State(state)).await.into_response()
}

async fn handle_put_usable(
    State(state): State<AppState>,
    payload: Result<Json<PinStatus>, JsonRejection>,
) -> Response {
    let Json(usable) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    state.controller.set_usable(usable);
    handle_get_status(State(state)).await.into_response()
}

async fn handle_put_sensor_status(
    State(state): State<AppState>,
    payload: Result<Json<SensorStatusUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    match state
        .controller
        .report_reading(&update.name, update.temperature, update.humidity)
    {
        Ok(_) => handle_get_status(State(state)).await.into_response(),
        Err(err) => controller_error_response(&err),
    }
}

async fn handle_get_sensor(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.controller.sensor(&name) {
        Ok(sensor) => Json(sensor).into_response(),
        Err(err) => controller_error_response(&err),
    }
}

fn controller_error_response(err: &ControllerError) -> Response {
    let status = match err {
        ControllerError::InvalidReading { .. } | ControllerError::InvalidTarget(_) => {
            StatusCode::BAD_REQUEST
        }
        ControllerError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    error_response(status, &err.to_string())
}

fn bad_json(rejection: JsonRejection) -> Response {
    warn!("rejected request body: {rejection}");
    error_response(StatusCode::BAD_REQUEST, &rejection.body_text())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
