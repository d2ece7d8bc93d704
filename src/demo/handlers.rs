use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection}, multipart::MultipartRejection,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    error::{ApiError, Envelope},
    recipes::handlers::UPLOAD_LIMIT,
    state::AppState,
    upload::{file_name_extension, timestamped_name, MultipartForm},
};

/// Storage folder of demo uploads, below the public directory.
const UPLOAD_DIR: &str = "uploads/fotos";

pub fn demo_routes() -> Router<AppState> {
    Router::new()
        .route("/ejemplo", get(example_get).post(example_post))
        .route(
            "/ejemplo/:id",
            get(example_get_param).put(example_put).delete(example_delete),
        )
        .route("/ejemplo-querystring", get(example_querystring))
        .route(
            "/upload",
            post(example_upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
}

/// `{correo, password}`. The password is accepted but never echoed.
#[derive(Debug, Deserialize)]
pub struct ExampleRequest {
    #[serde(rename = "correo")]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ExampleEcho {
    #[serde(rename = "correo")]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExampleQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct UploadedName {
    pub archivo: String,
}

pub async fn example_get() -> Json<Envelope<()>> {
    Json(Envelope::message("Método GET"))
}

pub async fn example_get_param(Path(id): Path<String>) -> Json<Envelope<()>> {
    Json(Envelope::message(format!("Método GET Parametros | id={}", id)))
}

#[instrument(skip(payload))]
pub async fn example_post(
    payload: Result<Json<ExampleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<ExampleEcho>>), ApiError> {
    let Json(req) = payload?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Método POST",
            ExampleEcho { email: req.email },
        )),
    ))
}

pub async fn example_put(Path(id): Path<String>) -> Json<Envelope<()>> {
    Json(Envelope::message(format!("Método PUT | id={}", id)))
}

pub async fn example_delete(Path(id): Path<String>) -> Json<Envelope<()>> {
    Json(Envelope::message(format!("Método DELETE | id={}", id)))
}

pub async fn example_querystring(
    query: Result<Query<ExampleQuery>, QueryRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Query(q) = query?;
    Ok(Json(Envelope::message(format!(
        "Método GET querystring | id={} | slug={}",
        q.id, q.slug
    ))))
}

/// POST /upload (multipart): foto
#[instrument(skip(state, mp))]
pub async fn example_upload(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<UploadedName>>, ApiError> {
    let mut form = MultipartForm::read(mp?).await?;
    let file = form.take_file("foto").ok_or_else(|| {
        ApiError::bad_request("No se recibió ningún archivo o el parámetro es incorrecto")
    })?;

    let name = file
        .file_name
        .as_deref()
        .filter(|n| !n.starts_with('.'))
        .ok_or_else(|| ApiError::bad_request("El archivo no tiene un nombre válido"))?;
    let ext = file_name_extension(name)
        .ok_or_else(|| ApiError::bad_request("El archivo no tiene extensión"))?;

    let stored = timestamped_name("upload_", ext);
    state
        .storage
        .put_object(
            &format!("{}/{}", UPLOAD_DIR, stored),
            file.body.clone(),
            &file.content_type,
        )
        .await
        .with_context(|| format!("store upload {}", stored))?;

    info!(file = %stored, bytes = file.body.len(), "file uploaded");
    Ok(Json(Envelope::with_message(
        "Archivo subido correctamente",
        UploadedName { archivo: stored },
    )))
}
