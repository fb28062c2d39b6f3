//! `multipart/form-data` encoding for file uploads.

use std::path::{Path, PathBuf};

use rand::RngExt;

use crate::transport::TransportError;

/// A file attached to a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    /// File to read when the body is encoded.
    pub path: PathBuf,
}

/// Multipart form with plain fields and file parts.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    /// Plain form fields.
    pub fields: Vec<(String, String)>,
    /// File parts.
    pub files: Vec<FilePart>,
}

impl Multipart {
    /// Encode into a Content-Type (with boundary) and body bytes.
    ///
    /// Files are read at this point, so a missing file surfaces as an I/O error.
    pub(crate) fn encode(&self) -> Result<(String, Vec<u8>), TransportError> {
        let boundary = generate_boundary();
        let mut body = Vec::new();

        for (name, value) in &self.fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        for file in &self.files {
            let content = std::fs::read(&file.path)?;
            let filename = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n",
                    file.name
                )
                .as_bytes(),
            );
            body.extend_from_slice(
                format!("Content-Type: {}\r\n\r\n", guess_content_type(&file.path)).as_bytes(),
            );
            body.extend_from_slice(&content);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Ok((format!("multipart/form-data; boundary={boundary}"), body))
    }
}

fn generate_boundary() -> String {
    let bytes: [u8; 12] = rand::rng().random();
    format!("passage-{}", hex::encode(bytes))
}

/// Content type from file extension; platforms only need images to be typed.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
