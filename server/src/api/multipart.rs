use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use std::collections::HashMap;

use super::ApiErr;

pub struct FilePart {
    pub filename: String,
    pub bytes: Bytes,
}

/// A fully-read multipart body: file parts by field name, plus plain text fields.
#[derive(Default)]
pub struct Form {
    files: HashMap<String, FilePart>,
    fields: HashMap<String, String>,
}

impl Form {
    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name)
    }

    /// Text field, trimmed; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn rejected(e: MultipartError) -> ApiErr {
    ApiErr::new(e.status(), e.body_text())
}

/// Drain `multipart`. A part with a filename is a file, anything else is text.
/// Repeated names keep the last value.
pub async fn read_form(mut multipart: Multipart) -> Result<Form, ApiErr> {
    let mut form = Form::default();

    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let bytes = field.bytes().await.map_err(rejected)?;
                // browsers send an empty, unnamed part for an untouched file input
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.insert(name, FilePart { filename, bytes });
            }
            None => {
                let value = field.text().await.map_err(rejected)?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}
