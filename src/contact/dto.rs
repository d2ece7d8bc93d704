use serde::Deserialize;

use crate::{
    auth::services::{is_valid_email, normalize_email},
    error::ApiError,
};

#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "correo", default)]
    pub email: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(rename = "mensaje", default)]
    pub message: String,
}

impl ContactRequest {
    /// Trims every field and checks them in order, stopping at the first failure.
    pub fn validated(mut self) -> Result<Self, ApiError> {
        const INVALID: &str = "Datos inválidos";

        self.name = self.name.trim().to_owned();
        self.email = normalize_email(&self.email);
        self.phone = self.phone.trim().to_owned();
        self.message = self.message.trim().to_owned();

        for (field, value) in [
            ("nombre", &self.name),
            ("correo", &self.email),
            ("telefono", &self.phone),
            ("mensaje", &self.message),
        ] {
            if value.is_empty() {
                return Err(ApiError::bad_request_with(
                    INVALID,
                    format!("El campo {} es obligatorio", field),
                ));
            }
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::bad_request_with(
                INVALID,
                "El correo ingresado no es válido.",
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, phone: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            message: message.into(),
        }
    }

    fn detail(err: ApiError) -> String {
        match err {
            ApiError::BadRequest { detail, .. } => detail.unwrap_or_default(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn first_blank_field_is_reported() {
        let err = request("Ana", "ana@x.com", "  ", "").validated().unwrap_err();
        assert!(detail(err).contains("telefono"));
    }

    #[test]
    fn malformed_email_is_rejected() {
        let err = request("Ana", "ana.x.com", "123", "hola").validated().unwrap_err();
        assert!(detail(err).contains("correo"));
    }

    #[test]
    fn valid_request_is_normalized() {
        let req = request(" Ana ", " Ana@X.com", "123", " hola ").validated().unwrap();
        assert_eq!(req.name, "Ana");
        assert_eq!(req.email, "ana@x.com");
        assert_eq!(req.message, "hola");
    }
}
