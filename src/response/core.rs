use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>` since the same few names repeat on every
/// response; values are per-response data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";

/// Discriminant of a [`Response`] body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    View,
    Payload,
    File,
    Content,
    Redirect,
}

/// Kind-specific response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Rendered by the template collaborator.
    ///
    /// `group` and `name` default to the resolved handler-group and operation.
    View {
        group: Option<String>,
        name: Option<String>,
        params: Map<String, Value>,
    },
    Payload(Value),
    File {
        bytes: Vec<u8>,
        filename: String,
        media_type: String,
    },
    Content {
        bytes: Vec<u8>,
        content_type: String,
    },
    Redirect {
        location: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("redirect status must be 3xx, got {0}")]
    RedirectStatus(u16),
}

/// Unified handler result: status, headers and exactly one body kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: HeaderVec,
    content_type: Option<String>,
    body: Body,
}

impl Response {
    fn with_body(status: u16, body: Body) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            content_type: None,
            body,
        }
    }

    /// Render the named view of the current handler-group.
    pub fn view(name: impl Into<String>) -> Self {
        Self::with_body(
            200,
            Body::View {
                group: None,
                name: Some(name.into()),
                params: Map::new(),
            },
        )
    }

    /// Render the view named after the resolved operation.
    #[must_use]
    pub fn page() -> Self {
        Self::with_body(
            200,
            Body::View {
                group: None,
                name: None,
                params: Map::new(),
            },
        )
    }

    /// Structured data payload with status 200.
    #[must_use]
    pub fn payload(value: Value) -> Self {
        Self::with_body(200, Body::Payload(value))
    }

    /// Serialize any value into a payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::payload(serde_json::to_value(value)?))
    }

    /// Structured data payload with status 201.
    #[must_use]
    pub fn created(value: Value) -> Self {
        Self::with_body(201, Body::Payload(value))
    }

    /// File download, written with `Content-Disposition: attachment`.
    pub fn file(
        bytes: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self::with_body(
            200,
            Body::File {
                bytes: bytes.into(),
                filename: filename.into(),
                media_type: media_type.into(),
            },
        )
    }

    /// Raw bytes with an explicit content type.
    pub fn content(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self::with_body(
            200,
            Body::Content {
                bytes: bytes.into(),
                content_type: content_type.into(),
            },
        )
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::content(text.into().into_bytes(), "text/plain; charset=utf-8")
    }

    /// `302 Found` redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::with_body(
            302,
            Body::Redirect {
                location: location.into(),
            },
        )
    }

    /// Redirect with an explicit 3xx status.
    pub fn redirect_with_status(
        status: u16,
        location: impl Into<String>,
    ) -> Result<Self, ResponseError> {
        if !(300..400).contains(&status) {
            return Err(ResponseError::RedirectStatus(status));
        }
        Ok(Self::with_body(
            status,
            Body::Redirect {
                location: location.into(),
            },
        ))
    }

    /// Override the status code.
    ///
    /// A redirect keeps its current status when `status` is outside 3xx.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        if self.kind() == ResponseKind::Redirect && !(300..400).contains(&status) {
            warn!(
                status = status,
                current = self.status,
                "Ignoring non-3xx status on redirect response"
            );
            return self;
        }
        self.status = status;
        self
    }

    /// Render the view from another handler-group's templates.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        if let Body::View { group: g, .. } = &mut self.body {
            *g = Some(group.into());
        }
        self
    }

    /// Add one entry to a view's parameter bag. Ignored for other kinds.
    #[must_use]
    pub fn with_param<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        if let Body::View { params, .. } = &mut self.body {
            let value = serde_json::to_value(value).unwrap_or(Value::Null);
            params.insert(key.into(), value);
        }
        self
    }

    #[must_use]
    pub fn with_params(mut self, extra: Map<String, Value>) -> Self {
        if let Body::View { params, .. } = &mut self.body {
            params.extend(extra);
        }
        self
    }

    /// Override the content type of a view or payload.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        match &mut self.body {
            Body::View { .. } | Body::Payload(_) => self.content_type = Some(content_type),
            Body::File { media_type, .. } => *media_type = content_type,
            Body::Content {
                content_type: ct, ..
            } => *ct = content_type,
            Body::Redirect { .. } => {}
        }
        self
    }

    /// Add or replace a header. Names compare case-insensitively.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (u16, HeaderVec, Option<String>, Body) {
        (self.status, self.headers, self.content_type, self.body)
    }

    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self.body {
            Body::View { .. } => ResponseKind::View,
            Body::Payload(_) => ResponseKind::Payload,
            Body::File { .. } => ResponseKind::File,
            Body::Content { .. } => ResponseKind::Content,
            Body::Redirect { .. } => ResponseKind::Redirect,
        }
    }

    /// Content type written for this response; `None` for redirects.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match &self.body {
            Body::View { .. } => Some(self.content_type.as_deref().unwrap_or(HTML)),
            Body::Payload(_) => Some(self.content_type.as_deref().unwrap_or(JSON)),
            Body::File { media_type, .. } => Some(media_type),
            Body::Content { content_type, .. } => Some(content_type),
            Body::Redirect { .. } => None,
        }
    }

    /// Payload value, if this is a payload response.
    #[must_use]
    pub fn payload_value(&self) -> Option<&Value> {
        match &self.body {
            Body::Payload(v) => Some(v),
            _ => None,
        }
    }
}
