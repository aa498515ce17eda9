use may_minihttp::Request;
use std::io::{self, Read};
use tracing::debug;

/// Owned copy of what the transport received, before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    /// HTTP method as sent
    pub method: String,
    /// Request target including query string
    pub target: String,
    /// Headers with lowercase names
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Target without its query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("/")
    }
}

/// Read a `may_minihttp::Request` into a [`RawRequest`].
///
/// At most `max_body + 1` body bytes are read so an oversized body is still
/// visible as oversized to the binder without buffering all of it.
pub fn parse_request(req: Request, max_body: u64) -> io::Result<RawRequest> {
    let method = req.method().to_string();
    let target = req.path().to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let mut body = Vec::new();
    req.body()
        .take(max_body.saturating_add(1))
        .read_to_end(&mut body)?;

    debug!(
        method = %method,
        target = %target,
        header_count = headers.len(),
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );

    Ok(RawRequest {
        method,
        target,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strips_query() {
        let raw = RawRequest {
            method: "GET".into(),
            target: "/Product/list?page=2".into(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(raw.path(), "/Product/list");
    }
}
