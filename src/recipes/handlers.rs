use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection}, multipart::MultipartRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    error::{ApiError, Envelope},
    extract::IdPath,
    recipes::{
        dto::{Pagination, RecipeFields, RecipeResponse},
        repo_types::Recipe,
        services::{self, recipe_not_found},
    },
    state::AppState,
    upload::MultipartForm,
};

/// Upper bound for multipart bodies carrying a photo.
pub const UPLOAD_LIMIT: usize = 20 * 1024 * 1024; // 20MB

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recetas", get(list_recipes).post(create_recipe))
        .route(
            "/recetas/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

#[instrument(skip(state, headers, query))]
pub async fn list_recipes(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Envelope<Vec<RecipeResponse>>>, ApiError> {
    let Query(p) = query?;
    let (limit, offset) = p.clamped();
    let rows = Recipe::list(&state.db, limit, offset).await?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_rows(rows, &base))))
}

#[instrument(skip(state, headers))]
pub async fn get_recipe(
    State(state): State<AppState>,
    headers: HeaderMap,
    IdPath(id): IdPath,
) -> Result<Json<Envelope<RecipeResponse>>, ApiError> {
    let row = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_row(row, &base))))
}

/// POST /recetas (multipart): foto, nombre, categoria_id, tiempo, descripcion
#[instrument(skip(state, headers, mp))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Envelope<RecipeResponse>>), ApiError> {
    let form = MultipartForm::read(mp?).await?;
    let row = services::create_recipe(&state, user_id, form).await?;
    let base = state.base_url(&headers);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Registro creado correctamente",
            RecipeResponse::from_row(row, &base),
        )),
    ))
}

#[instrument(skip(state, headers, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    IdPath(id): IdPath,
    payload: Result<Json<RecipeFields>, JsonRejection>,
) -> Result<Json<Envelope<RecipeResponse>>, ApiError> {
    let Json(fields) = payload?;
    let row = services::update_recipe(&state, id, &fields).await?;
    info!(recipe_id = %id, %user_id, "recipe updated");
    let base = state.base_url(&headers);
    Ok(Json(Envelope::with_message(
        "Registro actualizado correctamente",
        RecipeResponse::from_row(row, &base),
    )))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<Envelope<()>>, ApiError> {
    services::delete_recipe(&state, id).await?;
    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(Json(Envelope::message("Registro eliminado correctamente")))
}
