use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::contact::dto::ContactRequest;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "fecha", with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

impl Contact {
    pub async fn create(db: &PgPool, req: &ContactRequest) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (name, email, phone, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, message, date
            "#,
        )
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.message)
        .fetch_one(db)
        .await
        .context("insert contact")?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn contact_is_stored(db: PgPool) {
        let req = ContactRequest {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            phone: "123".into(),
            message: "hola".into(),
        };
        let row = Contact::create(&db, &req).await.unwrap();
        assert_eq!(row.email, "ana@x.com");
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM contacts")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
