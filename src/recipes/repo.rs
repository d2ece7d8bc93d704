use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::recipes::repo_types::{Recipe, RecipeDraft};

const RECIPE_COLUMNS: &str = r#"
    r.id, r.category_id, r.user_id, r.name, r.slug, r.duration, r.photo,
    r.description, r.date,
    c.name AS category_name, u.name AS author_name
"#;

const RECIPE_JOINS: &str = r#"
    LEFT JOIN categories c ON c.id = r.category_id
    LEFT JOIN users u ON u.id = r.user_id
"#;

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

impl Recipe {
    /// Newest first.
    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {RECIPE_JOINS}
             ORDER BY r.date DESC, r.id DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list recipes")?;
        Ok(rows)
    }

    pub async fn latest(db: &PgPool, count: i64) -> anyhow::Result<Vec<Recipe>> {
        Self::list(db, count, 0).await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {RECIPE_JOINS} WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find recipe by id")?;
        Ok(row)
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {RECIPE_JOINS}
             WHERE r.slug = $1
             ORDER BY r.date DESC
             LIMIT 1"
        ))
        .bind(slug)
        .fetch_optional(db)
        .await
        .context("find recipe by slug")?;
        Ok(row)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {RECIPE_JOINS}
             WHERE r.user_id = $1
             ORDER BY r.date DESC, r.id DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list recipes by user")?;
        Ok(rows)
    }

    /// Case-insensitive substring match on the name, optionally within one category.
    pub async fn search(
        db: &PgPool,
        term: Option<&str>,
        category_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Recipe>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {RECIPE_JOINS} WHERE TRUE"
        ));
        if let Some(term) = term {
            qb.push(" AND r.name ILIKE ").push_bind(like_pattern(term));
        }
        if let Some(category_id) = category_id {
            qb.push(" AND r.category_id = ").push_bind(category_id);
        }
        qb.push(" ORDER BY r.date DESC, r.id DESC");

        let rows = qb
            .build_query_as::<Recipe>()
            .fetch_all(db)
            .await
            .context("search recipes")?;
        Ok(rows)
    }

    /// Whether another recipe (not `except`) already uses `name`.
    pub async fn name_taken(db: &PgPool, name: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM recipes WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(except)
        .fetch_one(db)
        .await
        .context("check recipe name")?;
        Ok(taken)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        draft: &RecipeDraft,
        slug: &str,
        photo: &str,
    ) -> anyhow::Result<Recipe> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            WITH r AS (
                INSERT INTO recipes (category_id, user_id, name, slug, duration, photo, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {RECIPE_COLUMNS} FROM r {RECIPE_JOINS}
            "#
        ))
        .bind(draft.category_id)
        .bind(user_id)
        .bind(&draft.name)
        .bind(slug)
        .bind(&draft.duration)
        .bind(photo)
        .bind(&draft.description)
        .fetch_one(db)
        .await
        .context("insert recipe")?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        draft: &RecipeDraft,
        slug: &str,
    ) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            WITH r AS (
                UPDATE recipes
                   SET name = $2, slug = $3, duration = $4, description = $5,
                       category_id = $6, updated_at = now()
                 WHERE id = $1
                RETURNING *
            )
            SELECT {RECIPE_COLUMNS} FROM r {RECIPE_JOINS}
            "#
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(slug)
        .bind(&draft.duration)
        .bind(&draft.description)
        .bind(draft.category_id)
        .fetch_optional(db)
        .await
        .context("update recipe")?;
        Ok(row)
    }

    /// Points the recipe at a new photo file. False when the recipe is gone.
    pub async fn update_photo(db: &PgPool, id: Uuid, photo: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE recipes SET photo = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(photo)
            .execute(db)
            .await
            .context("update recipe photo")?;
        Ok(res.rows_affected() > 0)
    }

    /// Deletes the row and hands back its photo file name.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<Option<String>> {
        let photo: Option<String> =
            sqlx::query_scalar("DELETE FROM recipes WHERE id = $1 RETURNING photo")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("delete recipe")?;
        Ok(photo)
    }
}
