use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::AuthUser,
    categories::{dto::CategoryRequest, repo::Category},
    error::{is_foreign_key_violation, is_unique_violation, ApiError, Envelope},
    extract::IdPath,
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categorias", get(list_categories).post(create_category))
        .route(
            "/categorias/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Category>>>, ApiError> {
    let rows = Category::list(&state.db).await?;
    Ok(Json(Envelope::data(rows)))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Envelope<Category>>, ApiError> {
    let row = Category::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("La categoría especificada no existe"))?;
    Ok(Json(Envelope::data(row)))
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Category>>), ApiError> {
    let Json(payload) = payload?;
    let name = payload.validated_name()?;

    if Category::name_taken(&state.db, name, None).await? {
        warn!(name, "category name taken");
        return Err(ApiError::name_taken(name));
    }

    let row = match Category::create(&state.db, name, &slug::slugify(name)).await {
        Ok(row) => row,
        Err(e) if is_unique_violation(&e) => return Err(ApiError::name_taken(name)),
        Err(e) => return Err(e.into()),
    };

    info!(category_id = %row.id, %user_id, "category created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message("Registro creado correctamente", row)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdPath(id): IdPath,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<Envelope<Category>>, ApiError> {
    let Json(payload) = payload?;
    let name = payload.validated_name()?;

    if Category::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("La categoría especificada no existe"));
    }
    if Category::name_taken(&state.db, name, Some(id)).await? {
        return Err(ApiError::name_taken(name));
    }

    let row = match Category::update(&state.db, id, name, &slug::slugify(name)).await {
        Ok(Some(row)) => row,
        Ok(None) => return Err(ApiError::not_found("La categoría especificada no existe")),
        Err(e) if is_unique_violation(&e) => return Err(ApiError::name_taken(name)),
        Err(e) => return Err(e.into()),
    };

    info!(category_id = %row.id, %user_id, "category updated");
    Ok(Json(Envelope::with_message(
        "Registro actualizado correctamente",
        row,
    )))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<Envelope<()>>, ApiError> {
    if Category::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("La categoría especificada no existe"));
    }

    let in_use =
        || ApiError::bad_request("No se puede eliminar la categoria porque tiene recetas asociadas");
    if Category::has_recipes(&state.db, id).await? {
        return Err(in_use());
    }

    match Category::delete(&state.db, id).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::not_found("La categoría especificada no existe")),
        Err(e) if is_foreign_key_violation(&e) => return Err(in_use()),
        Err(e) => return Err(e.into()),
    }

    info!(category_id = %id, %user_id, "category deleted");
    Ok(Json(Envelope::message("Registro eliminado correctamente")))
}
