//! `multipart/form-data` extraction.

use std::collections::HashMap;

use hyper::Body;
use multer::{Constraints, Multipart, SizeLimit};
use tracing::debug;

use crate::config::UploadLimits;
use crate::error::{AppError, Result};
use crate::models::UploadedFile;

/// Text fields and files of one request, in arrival order.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First file uploaded under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|f| f.field_name == name)?;
        Some(self.files.remove(index))
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (matching, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field_name == name);
        self.files = rest;
        matching
    }

    /// Add query-string parameters; body fields win on conflicts.
    pub fn merge_query(&mut self, query: Option<&str>) {
        let Some(query) = query else { return };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()).into_owned() {
            self.fields.entry(key).or_insert(value);
        }
    }
}

pub fn is_multipart_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.to_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Read the whole form. Non-multipart bodies yield an empty form so the
/// caller reports the missing upload in its own words.
pub async fn read_form(
    content_type: Option<&str>,
    body: Body,
    limits: &UploadLimits,
) -> Result<FormData> {
    let mut form = FormData::default();
    let Some(content_type) = content_type.filter(|ct| is_multipart_content_type(Some(ct))) else {
        return Ok(form);
    };

    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| AppError::validation("Invalid multipart boundary in Content-Type"))?;
    let constraints = Constraints::new()
        .size_limit(SizeLimit::new().whole_stream(limits.max_upload_size as u64));
    let mut multipart = Multipart::with_constraints(body, boundary, constraints);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_owned) {
            Some(file_name) => {
                if form.files.len() >= limits.max_files {
                    return Err(AppError::validation(format!(
                        "Too many files: at most {} can be uploaded at once",
                        limits.max_files
                    )));
                }
                let content_type = field.content_type().map(|m| m.essence_str().to_string());
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limits))?;
                debug!(field = %name, file = %file_name, size = bytes.len(), "received file");
                form.files.push(UploadedFile {
                    field_name: name,
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let value = field.text().await.map_err(|e| multipart_error(e, limits))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

fn multipart_error(err: multer::Error, limits: &UploadLimits) -> AppError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            AppError::PayloadTooLarge {
                limit: limits.max_upload_size,
            }
        }
        other => AppError::validation(format!("Malformed multipart body: {other}")),
    }
}
