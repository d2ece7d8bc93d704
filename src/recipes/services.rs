use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    categories::repo::Category,
    error::{is_foreign_key_violation, is_unique_violation, ApiError, FieldErrors},
    extract::parse_optional_id,
    recipes::{
        dto::RecipeFields,
        repo_types::{Recipe, RecipeDraft},
    },
    state::AppState,
    upload::{photo_extension, timestamped_name, MultipartForm, UploadedFile},
};

/// Storage folder of recipe photos, below the public directory.
pub const PHOTO_DIR: &str = "recetas";

const FORM_FAILED: &str = "Ocurrió un error inesperado";

fn photo_key(file: &str) -> String {
    format!("{}/{}", PHOTO_DIR, file)
}

pub(crate) fn recipe_not_found() -> ApiError {
    ApiError::not_found("La receta especificada no existe")
}

fn category_not_found() -> ApiError {
    ApiError::not_found("La categoría especificada no existe")
}

fn check_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors
            .entry(field)
            .or_default()
            .push(format!("El campo {} es obligatorio", field));
    } else if value.chars().count() > max_chars {
        errors.entry(field).or_default().push(format!(
            "El campo {} no debe tener más de {} caracteres",
            field, max_chars
        ));
    }
    value.to_owned()
}

/// Checks every field and reports all failures at once.
pub fn validate_fields(fields: &RecipeFields) -> Result<RecipeDraft, ApiError> {
    let mut errors = FieldErrors::new();

    let name = check_text(&mut errors, "nombre", &fields.name, 50);
    let duration = check_text(&mut errors, "tiempo", &fields.duration, 50);
    let description = check_text(&mut errors, "descripcion", &fields.description, 1000);
    let category_id = match parse_optional_id(Some(fields.category_id.as_str())) {
        Ok(Some(id)) => Some(id),
        Ok(None) => {
            errors
                .entry("categoria_id")
                .or_default()
                .push("El campo categoria_id es obligatorio".into());
            None
        }
        Err(_) => {
            errors
                .entry("categoria_id")
                .or_default()
                .push("El campo categoria_id debe ser un identificador válido".into());
            None
        }
    };

    match category_id {
        Some(category_id) if errors.is_empty() => Ok(RecipeDraft {
            name,
            category_id,
            duration,
            description,
        }),
        _ => Err(ApiError::InvalidFields(errors)),
    }
}

/// The `foto` part of a form with its stored extension.
fn take_photo(form: &mut MultipartForm) -> Result<(UploadedFile, &'static str), ApiError> {
    let photo = form
        .take_file("foto")
        .ok_or_else(|| ApiError::bad_request_with(FORM_FAILED, "El campo foto es obligatorio"))?;
    let ext = photo_extension(&photo.content_type).ok_or_else(|| {
        ApiError::bad_request_with(FORM_FAILED, "La foto debe ser de tipo JPG o PNG")
    })?;
    Ok((photo, ext))
}

fn fields_from_form(form: &MultipartForm) -> RecipeFields {
    let text = |name: &str| form.text(name).unwrap_or_default().to_owned();
    RecipeFields {
        name: text("nombre"),
        category_id: text("categoria_id"),
        duration: text("tiempo"),
        description: text("descripcion"),
    }
}

async fn ensure_category(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    match Category::find_by_id(&state.db, id).await? {
        Some(_) => Ok(()),
        None => Err(category_not_found()),
    }
}

/// Stores a photo under a fresh name and returns that name.
async fn store_photo(
    state: &AppState,
    photo: UploadedFile,
    ext: &str,
) -> Result<String, ApiError> {
    let file = timestamped_name("", ext);
    state
        .storage
        .put_object(&photo_key(&file), photo.body, &photo.content_type)
        .await
        .with_context(|| format!("store recipe photo {}", file))?;
    Ok(file)
}

/// Removes a photo file. Failures are logged only.
pub(crate) async fn remove_photo(state: &AppState, file: &str) {
    let key = photo_key(file);
    match state.storage.exists(&key).await {
        Ok(true) => {
            if let Err(e) = state.storage.delete_object(&key).await {
                warn!(error = %format!("{e:#}"), key, "photo not removed");
            }
        }
        Ok(false) => warn!(key, "photo already missing"),
        Err(e) => warn!(error = %format!("{e:#}"), key, "photo lookup failed"),
    }
}

pub async fn create_recipe(
    state: &AppState,
    user_id: Uuid,
    mut form: MultipartForm,
) -> Result<Recipe, ApiError> {
    let (photo, ext) = take_photo(&mut form)?;
    let draft = validate_fields(&fields_from_form(&form))?;

    ensure_category(state, draft.category_id).await?;
    if Recipe::name_taken(&state.db, &draft.name, None).await? {
        return Err(ApiError::name_taken(&draft.name));
    }

    let file = store_photo(state, photo, ext).await?;
    let slug = slug::slugify(&draft.name);
    match Recipe::create(&state.db, user_id, &draft, &slug, &file).await {
        Ok(row) => {
            info!(recipe_id = %row.id, %user_id, photo = %file, "recipe created");
            Ok(row)
        }
        Err(e) => {
            remove_photo(state, &file).await;
            if is_unique_violation(&e) {
                Err(ApiError::name_taken(&draft.name))
            } else if is_foreign_key_violation(&e) {
                Err(category_not_found())
            } else {
                Err(e.into())
            }
        }
    }
}

pub async fn update_recipe(
    state: &AppState,
    id: Uuid,
    fields: &RecipeFields,
) -> Result<Recipe, ApiError> {
    let draft = validate_fields(fields)?;

    if Recipe::find_by_id(&state.db, id).await?.is_none() {
        return Err(recipe_not_found());
    }
    ensure_category(state, draft.category_id).await?;
    if Recipe::name_taken(&state.db, &draft.name, Some(id)).await? {
        return Err(ApiError::name_taken(&draft.name));
    }

    let slug = slug::slugify(&draft.name);
    match Recipe::update(&state.db, id, &draft, &slug).await {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(recipe_not_found()),
        Err(e) if is_unique_violation(&e) => Err(ApiError::name_taken(&draft.name)),
        Err(e) if is_foreign_key_violation(&e) => Err(category_not_found()),
        Err(e) => Err(e.into()),
    }
}

/// Deletes the row, then its photo file.
pub async fn delete_recipe(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    let photo = Recipe::delete(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    remove_photo(state, &photo).await;
    Ok(())
}

/// Swaps the photo of an existing recipe and returns the new file name.
pub async fn replace_photo(state: &AppState, mut form: MultipartForm) -> Result<String, ApiError> {
    let (photo, ext) = take_photo(&mut form)?;
    let id = match parse_optional_id(form.text("receta_id")) {
        Ok(Some(id)) => id,
        Ok(None) => {
            return Err(ApiError::bad_request_with(
                FORM_FAILED,
                "El campo receta_id es obligatorio",
            ))
        }
        Err(_) => {
            return Err(ApiError::bad_request_with(
                FORM_FAILED,
                "El campo receta_id debe ser un identificador válido",
            ))
        }
    };

    let current = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;

    let file = store_photo(state, photo, ext).await?;
    match Recipe::update_photo(&state.db, id, &file).await {
        Ok(true) => {}
        Ok(false) => {
            remove_photo(state, &file).await;
            return Err(recipe_not_found());
        }
        Err(e) => {
            remove_photo(state, &file).await;
            return Err(e.into());
        }
    }

    remove_photo(state, &current.photo).await;
    info!(recipe_id = %id, photo = %file, "recipe photo replaced");
    Ok(file)
}
