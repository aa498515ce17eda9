//! Response rendering: maps each [`Response`] kind onto transport output.

use super::core::{Body, Response};
use crate::codec::PayloadCodec;
use crate::template::TemplateRenderer;
use http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("view response has no name and no operation to default to")]
    MissingView,
    #[error("view {group}/{view} failed to render: {source:#}")]
    Template {
        group: String,
        view: String,
        source: anyhow::Error,
    },
    #[error("payload encoding failed: {0:#}")]
    Encode(anyhow::Error),
}

/// Fully rendered response, ready for the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireResponse {
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Canonical reason phrase for the status line.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Last-resort JSON error used when rendering itself fails.
    #[must_use]
    pub fn fallback(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message, "status": status }).to_string();
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into_bytes(),
        }
    }
}

/// Renders responses using the template and payload collaborators.
#[derive(Clone)]
pub struct ResponseRenderer {
    templates: Arc<dyn TemplateRenderer>,
    codec: Arc<dyn PayloadCodec>,
}

impl ResponseRenderer {
    pub fn new(templates: Arc<dyn TemplateRenderer>, codec: Arc<dyn PayloadCodec>) -> Self {
        Self { templates, codec }
    }

    /// Render `response`.
    ///
    /// `group` and `operation` are the resolved handler's identifiers; they fill
    /// in a view's group and name when the handler left them unset.
    pub fn render(
        &self,
        response: Response,
        group: Option<&str>,
        operation: Option<&str>,
    ) -> Result<WireResponse, RenderError> {
        let (status, mut user_headers, content_type, body) = response.into_parts();
        let mut headers: Vec<(String, String)> = Vec::with_capacity(user_headers.len() + 2);

        let bytes = match body {
            Body::View {
                group: view_group,
                name,
                params,
            } => {
                let view = name
                    .as_deref()
                    .or(operation)
                    .ok_or(RenderError::MissingView)?
                    .to_string();
                let view_group = view_group
                    .as_deref()
                    .or(group)
                    .ok_or(RenderError::MissingView)?
                    .to_string();
                let markup = self
                    .templates
                    .render(&view_group, &view, &params)
                    .map_err(|source| RenderError::Template {
                        group: view_group.clone(),
                        view: view.clone(),
                        source,
                    })?;
                headers.push((
                    "content-type".into(),
                    content_type.unwrap_or_else(|| "text/html; charset=utf-8".into()),
                ));
                markup
            }
            Body::Payload(value) => {
                let encoded = self.codec.encode(&value).map_err(RenderError::Encode)?;
                headers.push((
                    "content-type".into(),
                    content_type.unwrap_or_else(|| self.codec.media_type().into()),
                ));
                encoded
            }
            Body::File {
                bytes,
                filename,
                media_type,
            } => {
                headers.push(("content-type".into(), media_type));
                headers.push(("content-disposition".into(), content_disposition(&filename)));
                bytes
            }
            Body::Content {
                bytes,
                content_type,
            } => {
                headers.push(("content-type".into(), content_type));
                bytes
            }
            Body::Redirect { location } => {
                // A redirect carries its status line and Location only.
                user_headers.clear();
                headers.push(("location".into(), location));
                Vec::new()
            }
        };

        for (name, value) in user_headers {
            let reserved = ["content-type", "content-disposition", "location", "content-length"];
            if reserved.iter().any(|r| name.eq_ignore_ascii_case(r)) {
                continue;
            }
            headers.push((name.to_string(), value));
        }

        Ok(WireResponse {
            status,
            headers,
            body: bytes,
        })
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if ascii == filename {
        return format!("attachment; filename=\"{filename}\"");
    }
    let encoded: String = url::form_urlencoded::byte_serialize(filename.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_plain() {
        assert_eq!(
            content_disposition("report.csv"),
            "attachment; filename=\"report.csv\""
        );
    }

    #[test]
    fn test_content_disposition_escapes() {
        let header = content_disposition("r\"é.txt");
        assert!(header.starts_with("attachment; filename=\"r__.txt\""));
        assert!(header.contains("filename*=UTF-8''r%22%C3%A9.txt"));
    }

    #[test]
    fn test_fallback_is_json() {
        let wire = WireResponse::fallback(500, "boom");
        assert_eq!(wire.get_header("Content-Type"), Some("application/json"));
        assert_eq!(wire.reason(), "Internal Server Error");
    }
}
