use axum::{
    extract::{
        rejection::QueryRejection, multipart::MultipartRejection,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{repo_types::User, AuthUser},
    categories::repo::Category,
    error::{ApiError, Envelope},
    extract::{parse_optional_id, IdPath},
    recipes::{
        dto::{photo_url, PhotoResponse, RecipeResponse, SearchQuery},
        handlers::UPLOAD_LIMIT,
        repo_types::Recipe,
        services::{self, recipe_not_found},
    },
    state::AppState,
    upload::MultipartForm,
};

const HOME_COUNT: i64 = 3;

pub fn helper_routes() -> Router<AppState> {
    Router::new()
        .route("/recetas-helpers/home", get(home))
        .route("/recetas-helpers/usuarios/:id", get(recipes_by_user))
        .route("/recetas-helpers/slug/:slug", get(recipe_by_slug))
        .route("/recetas-helpers/buscador", get(search))
        .route(
            "/recetas-helpers/foto",
            post(replace_photo).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
}

#[instrument(skip(state, headers))]
pub async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Vec<RecipeResponse>>>, ApiError> {
    let rows = Recipe::latest(&state.db, HOME_COUNT).await?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_rows(rows, &base))))
}

#[instrument(skip(state, headers))]
pub async fn recipes_by_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    headers: HeaderMap,
    IdPath(user_id): IdPath,
) -> Result<Json<Envelope<Vec<RecipeResponse>>>, ApiError> {
    if User::find_by_id(&state.db, user_id).await?.is_none() {
        return Err(ApiError::not_found("El usuario especificado no existe"));
    }
    let rows = Recipe::list_by_user(&state.db, user_id).await?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_rows(rows, &base))))
}

#[instrument(skip(state, headers))]
pub async fn recipe_by_slug(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<RecipeResponse>>, ApiError> {
    let row = Recipe::find_by_slug(&state.db, slug.trim())
        .await?
        .ok_or_else(recipe_not_found)?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_row(row, &base))))
}

/// GET /recetas-helpers/buscador?search=flan&categoria_id=<uuid>
#[instrument(skip(state, headers, query))]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<RecipeResponse>>>, ApiError> {
    let Query(q) = query?;
    let unknown_category = || ApiError::bad_request("La categoría especificada no existe");

    let category_id =
        parse_optional_id(q.categoria_id.as_deref()).map_err(|_| unknown_category())?;
    if let Some(id) = category_id {
        if Category::find_by_id(&state.db, id).await?.is_none() {
            return Err(unknown_category());
        }
    }

    let term = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let rows = Recipe::search(&state.db, term, category_id).await?;
    let base = state.base_url(&headers);
    Ok(Json(Envelope::data(RecipeResponse::from_rows(rows, &base))))
}

/// POST /recetas-helpers/foto (multipart): foto, receta_id
#[instrument(skip(state, headers, mp))]
pub async fn replace_photo(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    headers: HeaderMap,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<PhotoResponse>, ApiError> {
    let form = MultipartForm::read(mp?).await?;
    let file = services::replace_photo(&state, form).await?;
    Ok(Json(PhotoResponse {
        estado: "ok",
        mensaje: "Foto actualizada correctamente".into(),
        foto: photo_url(&state.base_url(&headers), &file),
    }))
}
