use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Recipe row joined with its category and author names.
#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub category_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: String,
    pub photo: String, // file name under `recetas/`
    pub description: String,
    pub date: OffsetDateTime,
    pub category_name: Option<String>,
    pub author_name: Option<String>,
}

/// Validated recipe fields, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub category_id: Uuid,
    pub duration: String,
    pub description: String,
}
