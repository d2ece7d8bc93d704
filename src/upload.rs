use std::collections::HashMap;

use axum::extract::{multipart::MultipartError, Multipart};
use bytes::Bytes;
use time::OffsetDateTime;

use crate::error::ApiError;

/// A file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

/// A fully read multipart body: text parts by name and file parts by name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::bad_request_with("Ocurrió un error inesperado", e.body_text())
}

impl MultipartForm {
    pub async fn read(mut mp: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if let Some(file_name) = field.file_name().map(str::to_owned) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let body = field.bytes().await.map_err(multipart_error)?;
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name: Some(file_name).filter(|n| !n.is_empty()),
                        content_type,
                        body,
                    },
                );
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Takes a file part out of the form. Empty parts count as absent.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.body.is_empty())
    }
}

#[cfg(test)]
impl MultipartForm {
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, name: &str, content_type: &str, body: &'static [u8]) -> Self {
        self.files.insert(
            name.into(),
            UploadedFile {
                file_name: Some(format!("{name}.bin")),
                content_type: content_type.into(),
                body: Bytes::from_static(body),
            },
        );
        self
    }
}

/// File extension for the accepted photo types.
pub fn photo_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Extension of a client supplied file name, e.g. `png` for `plato.png`.
/// Hidden files and names without an extension yield `None`.
pub fn file_name_extension(file_name: &str) -> Option<&str> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    if base.starts_with('.') {
        return None;
    }
    match base.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Some(ext)
        }
        _ => None,
    }
}

/// `<prefix><unix-nanos>.<ext>`.
pub fn timestamped_name(prefix: &str, ext: &str) -> String {
    format!(
        "{}{}.{}",
        prefix,
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        ext
    )
}
