use std::future::Future;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::{claims::Claims, jwt::JwtKeys, repo_types::User};
use crate::{error::ApiError, state::AppState};

/// Why the gate turned a request away. Every variant is a 401.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    #[error("No viene el token de autorización")]
    MissingToken,
    #[error("El token no tiene el formato 'Bearer <token>'")]
    MalformedToken,
    #[error("Error con la firma del token")]
    InvalidSignature,
    #[error("El usuario informado en el token no existe")]
    UnknownSubject,
}

/// Runs the header checks in order and, once the signature holds, asks
/// `subject_exists` whether the token's user is still on record.
pub async fn authorize<F, Fut>(
    header: Option<&HeaderValue>,
    keys: &JwtKeys,
    subject_exists: F,
) -> Result<Claims, ApiError>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let header = header
        .filter(|h| !h.as_bytes().iter().all(u8::is_ascii_whitespace))
        .ok_or(ApiError::Unauthorized(GateRejection::MissingToken))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized(GateRejection::MalformedToken))?;

    // Exactly "<scheme> <token>"
    let mut parts = value.split(' ');
    let token = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            token.trim()
        }
        _ => return Err(ApiError::Unauthorized(GateRejection::MalformedToken)),
    };

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        ApiError::Unauthorized(GateRejection::InvalidSignature)
    })?;

    if !subject_exists(claims.sub).await? {
        warn!(user_id = %claims.sub, "token subject not found");
        return Err(ApiError::Unauthorized(GateRejection::UnknownSubject));
    }

    Ok(claims)
}

/// Admits the request only with a valid bearer token for an existing user.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let db = &state.db;
        let claims = authorize(parts.headers.get(AUTHORIZATION), &keys, |id| {
            User::exists(db, id)
        })
        .await?;
        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::make_keys;

    fn header(v: &str) -> HeaderValue {
        HeaderValue::from_str(v).unwrap()
    }

    fn always(found: bool) -> impl FnOnce(Uuid) -> std::future::Ready<anyhow::Result<bool>> {
        move |_| std::future::ready(Ok(found))
    }

    fn rejection(res: Result<Claims, ApiError>) -> GateRejection {
        match res {
            Err(ApiError::Unauthorized(r)) => r,
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(c) => panic!("unexpectedly admitted {}", c.sub),
        }
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let keys = make_keys("secret", "iss", "aud");
        let res = authorize(None, &keys, always(true)).await;
        assert_eq!(rejection(res), GateRejection::MissingToken);
    }

    #[tokio::test]
    async fn blank_header_counts_as_missing() {
        let keys = make_keys("secret", "iss", "aud");
        for value in ["", "   "] {
            let h = header(value);
            let res = authorize(Some(&h), &keys, always(true)).await;
            assert_eq!(rejection(res), GateRejection::MissingToken, "{value:?}");
        }
    }

    #[tokio::test]
    async fn header_without_two_parts_is_malformed() {
        let keys = make_keys("secret", "iss", "aud");
        let token = keys.sign(Uuid::new_v4(), "Ana", "ana@x.com").unwrap();
        for value in [token.clone(), format!("Bearer  {token}"), format!("Bearer {token} extra")] {
            let h = header(&value);
            let res = authorize(Some(&h), &keys, always(true)).await;
            assert_eq!(rejection(res), GateRejection::MalformedToken, "{value}");
        }
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_malformed() {
        let keys = make_keys("secret", "iss", "aud");
        let h = header("Basic dXNlcjpwYXNz");
        let res = authorize(Some(&h), &keys, always(true)).await;
        assert_eq!(rejection(res), GateRejection::MalformedToken);
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let keys = make_keys("server-secret", "iss", "aud");
        let forged = make_keys("other-secret", "iss", "aud");
        let token = forged.sign(Uuid::new_v4(), "Eve", "eve@x.com").unwrap();
        let h = header(&format!("Bearer {token}"));
        let res = authorize(Some(&h), &keys, always(true)).await;
        assert_eq!(rejection(res), GateRejection::InvalidSignature);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let keys = make_keys("server-secret", "iss", "aud");
        let h = header("Bearer not.a.jwt");
        let res = authorize(Some(&h), &keys, always(true)).await;
        assert_eq!(rejection(res), GateRejection::InvalidSignature);
    }

    #[tokio::test]
    async fn unknown_subject_is_rejected_even_with_valid_signature() {
        let keys = make_keys("server-secret", "iss", "aud");
        let token = keys.sign(Uuid::new_v4(), "Ghost", "ghost@x.com").unwrap();
        let h = header(&format!("Bearer {token}"));
        let res = authorize(Some(&h), &keys, always(false)).await;
        assert_eq!(rejection(res), GateRejection::UnknownSubject);
    }

    #[tokio::test]
    async fn valid_token_for_existing_user_is_admitted() {
        let keys = make_keys("server-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, "Ana", "ana@x.com").unwrap();
        let h = header(&format!("bearer {token}"));
        let claims = authorize(Some(&h), &keys, |id| async move { Ok(id == user_id) })
            .await
            .expect("admitted");
        assert_eq!(claims.sub, user_id);
    }

    #[tokio::test]
    async fn lookup_failure_is_internal_not_unauthorized() {
        let keys = make_keys("server-secret", "iss", "aud");
        let token = keys.sign(Uuid::new_v4(), "Ana", "ana@x.com").unwrap();
        let h = header(&format!("Bearer {token}"));
        let res = authorize(Some(&h), &keys, |_| async { Err(anyhow::anyhow!("db down")) }).await;
        assert!(matches!(res, Err(ApiError::Internal(_))));
    }
}
