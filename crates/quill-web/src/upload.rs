use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

/// A fully buffered multipart form. File parts are held in memory so they can
/// be base64-encoded into a JSON body for the API.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if field.file_name().is_some() {
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.files.insert(name, bytes.to_vec());
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// The named file part as base64 text, if one was uploaded.
    pub fn file_base64(&self, name: &str) -> Option<String> {
        self.files.get(name).map(|bytes| B64.encode(bytes))
    }
}

/// Best-effort MIME type for a base64 image, from its leading magic bytes.
pub fn image_mime(encoded: &str) -> &'static str {
    if encoded.starts_with("iVBORw0KGgo") {
        "image/png"
    } else if encoded.starts_with("R0lGOD") {
        "image/gif"
    } else if encoded.starts_with("UklGR") {
        "image/webp"
    } else if encoded.starts_with("PHN2Zy") || encoded.starts_with("PD94bWw") {
        "image/svg+xml"
    } else {
        "image/jpeg"
    }
}
