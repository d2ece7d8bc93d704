use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserStatus};

const USER_COLUMNS: &str =
    "id, status_id, name, email, password_hash, verification_token, registered_at";

impl User {
    /// Find a user by email, whatever its status.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Find a verified user by email. Pending accounts cannot log in.
    pub async fn find_active_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND status_id = $2"
        ))
        .bind(email)
        .bind(UserStatus::Active)
        .fetch_optional(db)
        .await
        .context("find active user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
            .context("check user exists")?;
        Ok(found)
    }

    /// Create a pending user holding a verification token.
    pub async fn create_pending(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        verification_token: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (status_id, name, email, password_hash, verification_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(UserStatus::Pending)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(verification_token)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Activates the pending user owning `token`, clearing the token in the same
    /// statement. Returns `None` for unknown, already used or expired tokens.
    pub async fn consume_verification_token(
        db: &PgPool,
        token: &str,
        ttl_hours: i64,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET verification_token = NULL,
                   status_id = $2
             WHERE verification_token = $1
               AND status_id = $3
               AND registered_at > now() - make_interval(hours => $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(UserStatus::Active)
        .bind(UserStatus::Pending)
        .bind(i32::try_from(ttl_hours).unwrap_or(i32::MAX))
        .fetch_optional(db)
        .await
        .context("consume verification token")?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn verification_token_is_single_use(db: PgPool) {
        let user = User::create_pending(&db, "Ana", "ana@x.com", "hash", "tok-1")
            .await
            .unwrap();
        assert_eq!(user.status, UserStatus::Pending);

        let verified = User::consume_verification_token(&db, "tok-1", 48)
            .await
            .unwrap()
            .expect("first use succeeds");
        assert_eq!(verified.id, user.id);
        assert_eq!(verified.status, UserStatus::Active);
        assert!(verified.verification_token.is_none());

        let again = User::consume_verification_token(&db, "tok-1", 48).await.unwrap();
        assert!(again.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn expired_verification_token_is_refused(db: PgPool) {
        User::create_pending(&db, "Ana", "ana@x.com", "hash", "tok-old")
            .await
            .unwrap();
        sqlx::query("UPDATE users SET registered_at = now() - interval '3 days'")
            .execute(&db)
            .await
            .unwrap();
        let res = User::consume_verification_token(&db, "tok-old", 48).await.unwrap();
        assert!(res.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn pending_users_are_not_active(db: PgPool) {
        let user = User::create_pending(&db, "Ana", "ana@x.com", "hash", "tok")
            .await
            .unwrap();
        assert!(User::exists(&db, user.id).await.unwrap());
        assert!(User::find_active_by_email(&db, "ana@x.com").await.unwrap().is_none());
        assert!(User::find_by_email(&db, "ana@x.com").await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn duplicate_email_violates_unique_constraint(db: PgPool) {
        User::create_pending(&db, "Ana", "ana@x.com", "hash", "t1")
            .await
            .unwrap();
        let err = User::create_pending(&db, "Ana 2", "ana@x.com", "hash", "t2")
            .await
            .unwrap_err();
        assert!(crate::error::is_unique_violation(&err));
    }
}
