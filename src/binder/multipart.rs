//! `multipart/form-data` parsing for the binder.
//!
//! The body is already fully buffered in the request context, so the `multer`
//! stream is a single chunk and `block_on` never parks.

use crate::config::UploadLimits;
use crate::error::BindingError;
use bytes::Bytes;
use futures::stream;
use std::fmt;
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Storage behind an uploaded part.
enum UploadData {
    Memory(Bytes),
    Spooled(NamedTempFile),
}

/// One file part of a multipart request.
pub struct UploadedFile {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    size: u64,
    data: UploadData,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("spooled", &self.is_spooled())
            .finish()
    }
}

impl UploadedFile {
    /// Form field name of the part.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Client-supplied file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the part exceeded the buffering threshold and lives on disk.
    #[must_use]
    pub fn is_spooled(&self) -> bool {
        matches!(self.data, UploadData::Spooled(_))
    }

    /// Path of the spool file, for spooled parts.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            UploadData::Spooled(file) => Some(file.path()),
            UploadData::Memory(_) => None,
        }
    }

    /// Read the whole part into memory.
    pub fn bytes(&self) -> io::Result<Vec<u8>> {
        match &self.data {
            UploadData::Memory(bytes) => Ok(bytes.to_vec()),
            UploadData::Spooled(file) => {
                let mut reader = file.reopen()?;
                let mut buf = Vec::with_capacity(self.size as usize);
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// Text fields and file parts of a multipart body, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    pub(crate) fields: Vec<(String, String)>,
    pub(crate) files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Text field value. Last occurrence wins.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove and return the file part for `name`.
    pub(crate) fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let idx = self.files.iter().rposition(|f| f.field == name)?;
        Some(self.files.swap_remove(idx))
    }
}

fn body_error(err: impl fmt::Display) -> BindingError {
    BindingError::Body(format!("malformed multipart body: {err}"))
}

fn spool(data: &Bytes) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(data)?;
    file.flush()?;
    file.as_file_mut().rewind()?;
    Ok(file)
}

/// Parse a multipart body, enforcing per-part and whole-body limits.
pub(crate) fn parse(
    content_type: &str,
    body: Bytes,
    limits: &UploadLimits,
) -> Result<MultipartForm, BindingError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| BindingError::Body(format!("invalid multipart boundary: {e}")))?;
    let constraints = multer::Constraints::new().size_limit(
        multer::SizeLimit::new()
            .whole_stream(limits.max_request_bytes)
            .per_field(limits.max_file_bytes),
    );
    let chunk = stream::once(async move { Ok::<Bytes, io::Error>(body) });
    let mut multipart = multer::Multipart::with_constraints(chunk, boundary, constraints);
    let threshold = limits.buffer_threshold_bytes;

    futures::executor::block_on(async move {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await.map_err(body_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await.map_err(body_error)?;

            if file_name.is_none() {
                form.fields
                    .push((name, String::from_utf8_lossy(&data).into_owned()));
                continue;
            }

            let size = data.len() as u64;
            let data = if size > threshold {
                debug!(field = %name, size = size, threshold = threshold, "Spooling upload to disk");
                UploadData::Spooled(spool(&data).map_err(|e| {
                    BindingError::Body(format!("cannot spool upload `{name}`: {e}"))
                })?)
            } else {
                UploadData::Memory(data)
            };
            form.files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                size,
                data,
            });
        }
        Ok::<_, BindingError>(form)
    })
}
