use std::collections::BTreeMap;

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::extractors::GateRejection;

/// Per-field validation messages, keyed by the form field name.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        detail: Option<String>,
    },

    #[error("invalid form fields")]
    InvalidFields(FieldErrors),

    #[error("{message}")]
    NotFound {
        message: String,
        detail: Option<String>,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(GateRejection),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request_with(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Uniqueness check failed on a `nombre` field.
    pub fn name_taken(name: &str) -> Self {
        Self::bad_request(format!("Ya existe un registro con ese nombre: {}", name))
    }

    /// The generic "resource unavailable" 404 with a specific detail.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound {
            message: "Recurso no disponible".into(),
            detail: Some(detail.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::InvalidFields(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::bad_request_with(
            "Datos de entrada inválidos. Verifique que todos los campos requeridos estén completos y sean correctos.",
            e.body_text(),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::bad_request_with("Parámetros de consulta inválidos", e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::bad_request_with("Ocurrió un error inesperado", e.body_text())
    }
}

/// Error envelope: `{estado: "error", mensaje, error?}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub estado: &'static str,
    pub mensaje: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (mensaje, detail) = match self {
            ApiError::BadRequest { message, detail } | ApiError::NotFound { message, detail } => {
                (message, detail.map(serde_json::Value::String))
            }
            ApiError::InvalidFields(fields) => (
                "Los datos del formulario no son válidos".to_string(),
                serde_json::to_value(fields).ok(),
            ),
            ApiError::Unauthorized(reason) => (
                "No autorizado".to_string(),
                Some(serde_json::Value::String(reason.to_string())),
            ),
            ApiError::InvalidCredentials => (
                "Las credenciales no son válidas".to_string(),
                None,
            ),
            ApiError::Internal(e) => {
                error!(error = %format!("{e:#}"), "request failed");
                ("Ocurrió un error inesperado".to_string(), None)
            }
        };

        (
            status,
            Json(ErrorBody {
                estado: "error",
                mensaje,
                error: detail,
            }),
        )
            .into_response()
    }
}

/// Success envelope: `{estado: "ok", mensaje?, datos?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub estado: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datos: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(datos: T) -> Self {
        Self {
            estado: "ok",
            mensaje: None,
            datos: Some(datos),
        }
    }

    pub fn with_message(mensaje: impl Into<String>, datos: T) -> Self {
        Self {
            estado: "ok",
            mensaje: Some(mensaje.into()),
            datos: Some(datos),
        }
    }
}

impl Envelope<()> {
    pub fn message(mensaje: impl Into<String>) -> Self {
        Self {
            estado: "ok",
            mensaje: Some(mensaje.into()),
            datos: None,
        }
    }
}

fn has_db_code(e: &anyhow::Error, code: &str) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .any(|db| match db {
            sqlx::Error::Database(d) => d.code().as_deref() == Some(code),
            _ => false,
        })
}

/// Postgres `unique_violation`.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    has_db_code(e, "23505")
}

/// Postgres `foreign_key_violation`.
pub fn is_foreign_key_violation(e: &anyhow::Error) -> bool {
    has_db_code(e, "23503")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_envelope_with_detail() {
        let (status, json) = body_json(ApiError::not_found("La receta no existe")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["estado"], "error");
        assert_eq!(json["mensaje"], "Recurso no disponible");
        assert_eq!(json["error"], "La receta no existe");
    }

    #[tokio::test]
    async fn field_errors_are_grouped_by_field() {
        let mut fields = FieldErrors::new();
        fields.entry("nombre").or_default().push("obligatorio".into());
        fields.entry("tiempo").or_default().push("muy largo".into());
        let (status, json) = body_json(ApiError::InvalidFields(fields)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["nombre"][0], "obligatorio");
        assert_eq!(json["error"]["tiempo"][0], "muy largo");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let (status, json) =
            body_json(ApiError::Internal(anyhow::anyhow!("connection refused"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json.get("error").is_none());
        assert!(!json.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn gate_rejection_is_401_with_reason() {
        let (status, json) =
            body_json(ApiError::Unauthorized(GateRejection::MissingToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["mensaje"], "No autorizado");
        assert_eq!(json["error"], GateRejection::MissingToken.to_string());
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        assert!(!is_unique_violation(&anyhow::Error::from(sqlx::Error::RowNotFound)));
        assert!(!is_foreign_key_violation(&anyhow::Error::from(sqlx::Error::RowNotFound)));
    }
}
