use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::ApiError;

/// A `:id` path segment. Anything that is not a UUID cannot name a record,
/// so it is answered with the same 404 as an unknown id.
pub struct IdPath(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::not_found(e.body_text()))?;
        Uuid::parse_str(raw.trim())
            .map(IdPath)
            .map_err(|_| ApiError::not_found(format!("El identificador '{}' no es válido", raw)))
    }
}

/// Parses an optional form/query value as a UUID. Blank means absent.
pub fn parse_optional_id(raw: Option<&str>) -> Result<Option<Uuid>, uuid::Error> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Uuid::parse_str(s).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_ids() {
        assert_eq!(parse_optional_id(None).unwrap(), None);
        assert_eq!(parse_optional_id(Some("  ")).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_optional_id(Some(&id.to_string())).unwrap(), Some(id));
        assert!(parse_optional_id(Some("12")).is_err());
    }
}
