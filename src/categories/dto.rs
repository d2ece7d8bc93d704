use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    #[serde(rename = "nombre", default)]
    pub name: String,
}

impl CategoryRequest {
    /// The trimmed name, or a 400 when it is blank.
    pub fn validated_name(&self) -> Result<&str, crate::error::ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(crate::error::ApiError::bad_request_with(
                "Ocurrió un error inesperado",
                "El campo nombre es obligatorio",
            ));
        }
        if name.chars().count() > 100 {
            return Err(crate::error::ApiError::bad_request_with(
                "Ocurrió un error inesperado",
                "El nombre no debe tener más de 100 caracteres",
            ));
        }
        Ok(name)
    }
}
