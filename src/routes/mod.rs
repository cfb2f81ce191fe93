//! HTTP routes

pub mod extract;
pub mod health;
pub mod study;

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, Result};

/// A PDF upload plus its plain form fields
pub struct PdfUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub fields: HashMap<String, String>,
}

impl PdfUpload {
    /// Drain a multipart body; the document must be in the `file` field
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().map(str::to_string);
                check_pdf(field.content_type(), file_name.as_deref())?;
                let bytes = field.bytes().await?;
                file = Some((bytes, file_name));
            } else {
                fields.insert(name, field.text().await?);
            }
        }

        let (bytes, file_name) =
            file.ok_or_else(|| AppError::BadRequest("missing `file` field".to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }

        tracing::debug!(
            file_name = file_name.as_deref().unwrap_or("<unnamed>"),
            bytes = bytes.len(),
            "received upload"
        );
        Ok(Self {
            bytes,
            file_name,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.trim().is_empty())
    }
}

/// Accept `application/pdf`, or a generic type when the name ends in `.pdf`
fn check_pdf(content_type: Option<&str>, file_name: Option<&str>) -> Result<()> {
    let named_pdf = file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(".pdf"));
    match content_type {
        Some("application/pdf") => Ok(()),
        None | Some("application/octet-stream") if named_pdf => Ok(()),
        other => Err(AppError::UnsupportedMediaType(format!(
            "expected a PDF upload, got {}",
            other.unwrap_or("no content type")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pdf() {
        assert!(check_pdf(Some("application/pdf"), None).is_ok());
        assert!(check_pdf(Some("application/octet-stream"), Some("Notes.PDF")).is_ok());
        assert!(check_pdf(None, Some("notes.pdf")).is_ok());
        assert!(check_pdf(None, Some("notes.txt")).is_err());
        assert!(matches!(
            check_pdf(Some("image/png"), Some("scan.pdf")),
            Err(AppError::UnsupportedMediaType(_))
        ));
    }
}
