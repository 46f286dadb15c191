use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt;

use crate::{
    error::{Result, WardrobeError},
    services::ImageData,
};

const MAX_PART_BYTES: usize = 20 * 1024 * 1024;

/// A multipart form split into text fields and uploaded files.
#[derive(Debug, Default)]
pub struct FormUpload {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, ImageData>,
}

impl FormUpload {
    pub fn take_file(&mut self, name: &str) -> Option<ImageData> {
        self.files.remove(name)
    }
}

fn invalid_form(err: impl std::fmt::Display) -> WardrobeError {
    WardrobeError::Validation(format!("Invalid multipart form: {}", err))
}

pub async fn collect_form(mut payload: Multipart) -> Result<FormUpload> {
    let mut form = FormUpload::default();

    while let Some(mut field) = payload.try_next().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .is_some();
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid_form)? {
            if bytes.len() + chunk.len() > MAX_PART_BYTES {
                return Err(WardrobeError::Validation(format!(
                    "Form field '{}' is too large",
                    name
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_file {
            // browsers send an empty part when no file was chosen
            if !bytes.is_empty() {
                form.files.insert(name, ImageData::new(bytes, content_type));
            }
        } else {
            let value = String::from_utf8(bytes).map_err(invalid_form)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
