//! Multipart form descriptor and its `multipart/form-data` encoding.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

use crate::EncodeError;

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// The file part of a [`RequestForm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormFile {
    /// Form field name of the file part.
    pub field: String,
    /// Path the file is read from at encode time.
    pub path: PathBuf,
    /// Declared MIME type; `application/octet-stream` when absent.
    pub content_type: Option<String>,
}

/// Fields plus at most one file, sent as `multipart/form-data`.
///
/// # Example
///
/// ```ignore
/// let form = RequestForm::new()
///     .field("messaging_product", "whatsapp")
///     .field("type", "image/png")
///     .file("file", "/tmp/logo.png", Some("image/png"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestForm {
    pub fields: BTreeMap<String, String>,
    pub file: Option<FormFile>,
}

impl RequestForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Attach the file part, replacing any previous one.
    pub fn file(
        mut self,
        field: impl Into<String>,
        path: impl Into<PathBuf>,
        content_type: Option<&str>,
    ) -> Self {
        self.file = Some(FormFile {
            field: field.into(),
            path: path.into(),
            content_type: content_type.map(str::to_owned),
        });
        self
    }

    /// Encode the form, returning the body and its boundary.
    ///
    /// The boundary is derived from the form content, so encoding the same
    /// form twice yields identical bytes.
    pub(crate) async fn encode(self) -> Result<(Bytes, String), EncodeError> {
        let file = match self.file {
            Some(file) => {
                let data = tokio::fs::read(&file.path)
                    .await
                    .map_err(|source| EncodeError::File {
                        path: file.path.clone(),
                        source,
                    })?;
                Some((file, data))
            }
            None => None,
        };

        let boundary = boundary_for(&self.fields, file.as_ref());
        let mut buf = BytesMut::new();

        for (name, value) in &self.fields {
            put_part_head(&mut buf, &boundary, name, None, None);
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        if let Some((file, data)) = &file {
            let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_FILE_TYPE);
            put_part_head(
                &mut buf,
                &boundary,
                &file.field,
                Some(&file_name(&file.path)),
                Some(content_type),
            );
            buf.put_slice(data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok((buf.freeze(), boundary))
    }
}

fn boundary_for(fields: &BTreeMap<String, String>, file: Option<&(FormFile, Vec<u8>)>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(value.as_bytes());
        hasher.update([0]);
    }
    if let Some((file, data)) = file {
        hasher.update(file.field.as_bytes());
        hasher.update([0]);
        hasher.update(data);
    }
    let digest = hex::encode(hasher.finalize());
    format!("wacloud-{}", &digest[..32])
}

fn put_part_head(
    buf: &mut BytesMut,
    boundary: &str,
    name: &str,
    file_name: Option<&str>,
    content_type: Option<&str>,
) {
    buf.put_slice(format!("--{boundary}\r\n").as_bytes());
    let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", quote(name));
    if let Some(file_name) = file_name {
        disposition.push_str(&format!("; filename=\"{}\"", quote(file_name)));
    }
    buf.put_slice(disposition.as_bytes());
    buf.put_slice(b"\r\n");
    if let Some(content_type) = content_type {
        buf.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    buf.put_slice(b"\r\n");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned())
}

// Quotes and line breaks would terminate the header parameter early.
fn quote(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
