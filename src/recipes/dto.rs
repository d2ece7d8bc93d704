use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description};
use uuid::Uuid;

use crate::recipes::repo_types::Recipe;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[day]/[month]/[year]");

/// Public URL of a stored recipe photo.
pub fn photo_url(base_url: &str, photo: &str) -> String {
    format!("{}/public/recetas/{}", base_url, photo)
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    pub slug: String,
    #[serde(rename = "categoria_id")]
    pub category_id: Uuid,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "usuario_id")]
    pub user_id: Uuid,
    #[serde(rename = "usuario")]
    pub author: String,
    #[serde(rename = "tiempo")]
    pub duration: String,
    #[serde(rename = "foto")]
    pub photo_url: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fecha")]
    pub date: String,
}

impl RecipeResponse {
    pub fn from_row(row: Recipe, base_url: &str) -> Self {
        Self {
            photo_url: photo_url(base_url, &row.photo),
            date: row.date.format(DATE_FORMAT).unwrap_or_default(),
            id: row.id,
            name: row.name,
            slug: row.slug,
            category_id: row.category_id,
            category: row.category_name.unwrap_or_default(),
            user_id: row.user_id,
            author: row.author_name.unwrap_or_default(),
            duration: row.duration,
            description: row.description,
        }
    }

    pub fn from_rows(rows: Vec<Recipe>, base_url: &str) -> Vec<Self> {
        rows.into_iter()
            .map(|row| Self::from_row(row, base_url))
            .collect()
    }
}

/// Text fields of a recipe as sent by the client, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFields {
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "categoria_id", default)]
    pub category_id: String,
    #[serde(rename = "tiempo", default)]
    pub duration: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub categoria_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub estado: &'static str,
    pub mensaje: String,
    pub foto: String,
}
