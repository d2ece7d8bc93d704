use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        services,
    },
    error::{ApiError, Envelope},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/seguridad/registro", post(register))
        .route("/seguridad/verificacion/:token", get(verify))
        .route("/seguridad/login", post(login))
}

#[instrument(skip(state, headers, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<()>>), ApiError> {
    let Json(payload) = payload?;
    let base_url = state.base_url(&headers);
    services::register(&state, &base_url, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("Registro creado correctamente")),
    ))
}

/// Consumes the token and sends the browser on to the frontend.
#[instrument(skip(state, token))]
pub async fn verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    services::verify(&state, &token).await?;
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.config.frontend_url.clone())],
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(services::login(&state, payload).await?))
}
