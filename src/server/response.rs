use crate::ids::REQUEST_ID_HEADER;
use crate::response::WireResponse;
use may_minihttp::Response;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use thiserror::Error;
use tracing::{error, warn};

/// Header slots available in a `may_minihttp::Response`.
pub const MAX_WIRE_HEADERS: usize = 16;

/// Distinct optional header lines kept for the life of the process.
pub const MAX_INTERNED_HEADERS: usize = 4096;

/// may_minihttp writes its own length header and a per-request unique id
/// would grow the intern table without bound.
const SKIPPED_HEADERS: [&str; 2] = ["content-length", REQUEST_ID_HEADER];

/// Headers a response is wrong without. Always written, ahead of the rest.
const REQUIRED_HEADERS: [&str; 3] = ["content-type", "content-disposition", "location"];

static INTERNED: OnceLock<HeaderTable> = OnceLock::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum HeaderError {
    #[error("required header `{0}` has invalid characters")]
    InvalidRequired(String),
}

/// Leaked `'static` header lines, shared across requests.
///
/// may_minihttp only accepts `&'static str` header lines. Optional lines are
/// leaked at most once and stop being admitted past `capacity`; required
/// lines are always leaked.
pub(crate) struct HeaderTable {
    lines: Mutex<HashSet<&'static str>>,
    capacity: usize,
}

impl HeaderTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// `None` once the table holds `capacity` other lines.
    pub(crate) fn intern(&self, line: &str) -> Option<&'static str> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = lines.get(line) {
            return Some(*existing);
        }
        if lines.len() >= self.capacity {
            return None;
        }
        let leaked: &'static str = Box::leak(line.to_string().into_boxed_str());
        lines.insert(leaked);
        Some(leaked)
    }

    /// Like [`intern`](Self::intern), but leaks a fresh copy when the table is full.
    pub(crate) fn pin(&self, line: &str) -> &'static str {
        self.intern(line)
            .unwrap_or_else(|| Box::leak(line.to_string().into_boxed_str()))
    }
}

fn is_valid_header(name: &str, value: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
        && !value.bytes().any(|b| b == b'\r' || b == b'\n')
}

fn is_required(name: &str) -> bool {
    REQUIRED_HEADERS.iter().any(|r| name.eq_ignore_ascii_case(r))
}

/// Header lines to write for `headers`, required ones first.
///
/// Optional lines are dropped with a warning when invalid, over
/// [`MAX_WIRE_HEADERS`] or refused by the table. A required line that cannot be
/// written fails the whole response.
pub(crate) fn header_lines(
    table: &HeaderTable,
    headers: &[(String, String)],
) -> Result<Vec<&'static str>, HeaderError> {
    let mut lines = Vec::with_capacity(headers.len().min(MAX_WIRE_HEADERS));
    let (required, optional): (Vec<_>, Vec<_>) = headers
        .iter()
        .filter(|(name, _)| {
            !SKIPPED_HEADERS
                .iter()
                .any(|skip| name.eq_ignore_ascii_case(skip))
        })
        .partition(|(name, _)| is_required(name));

    for (name, value) in required {
        if !is_valid_header(name, value) {
            return Err(HeaderError::InvalidRequired(name.to_ascii_lowercase()));
        }
        lines.push(table.pin(&format!("{name}: {value}")));
    }
    for (name, value) in optional {
        if !is_valid_header(name, value) {
            warn!(header = %name, "Dropping header with invalid characters");
            continue;
        }
        if lines.len() >= MAX_WIRE_HEADERS {
            warn!(header = %name, limit = MAX_WIRE_HEADERS, "Dropping header over transport limit");
            continue;
        }
        match table.intern(&format!("{name}: {value}")) {
            Some(line) => lines.push(line),
            None => warn!(header = %name, "Header intern table full; header dropped"),
        }
    }
    Ok(lines)
}

/// Write a rendered response through may_minihttp.
///
/// A response whose required headers cannot be written goes out as a JSON 500.
pub fn write_wire_response(res: &mut Response, wire: WireResponse) {
    let table = INTERNED.get_or_init(|| HeaderTable::new(MAX_INTERNED_HEADERS));
    let (wire, lines) = match header_lines(table, &wire.headers) {
        Ok(lines) => (wire, lines),
        Err(err) => {
            error!(status = wire.status, error = %err, "Response cannot be written as rendered");
            let fallback = WireResponse::fallback(500, "Internal Server Error");
            let lines = vec![table.pin("content-type: application/json")];
            (fallback, lines)
        }
    };

    res.status_code(wire.status as usize, wire.reason());
    for line in lines {
        res.header(line);
    }
    res.body_vec(wire.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    fn full_table() -> HeaderTable {
        let table = HeaderTable::new(8);
        for i in 0..8 {
            let line = format!("content-disposition: attachment; filename=\"f{i}.csv\"");
            assert!(table.intern(&line).is_some());
        }
        assert!(table.intern("x-one-more: 1").is_none());
        table
    }

    #[test]
    fn test_intern_is_stable() {
        let table = HeaderTable::new(4);
        let a = table.intern("content-type: text/x-intern-test");
        let b = table.intern("content-type: text/x-intern-test");
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
    }

    #[test]
    fn test_header_validation() {
        assert!(is_valid_header("content-type", "text/html"));
        assert!(!is_valid_header("x-bad", "a\r\nset-cookie: x"));
        assert!(!is_valid_header("bad name", "v"));
        assert!(!is_valid_header("", "v"));
    }

    #[test]
    fn test_redirect_location_survives_full_table() {
        let table = full_table();
        let lines = header_lines(
            &table,
            &[
                pair("location", "/Order/view?id=424242"),
                pair("x-trace", "abc"),
            ],
        )
        .unwrap();
        assert_eq!(lines, vec!["location: /Order/view?id=424242"]);
    }

    #[test]
    fn test_file_headers_survive_full_table() {
        let table = full_table();
        let lines = header_lines(
            &table,
            &[
                pair("content-type", "text/csv"),
                pair("content-disposition", "attachment; filename=\"q3.csv\""),
            ],
        )
        .unwrap();
        assert_eq!(
            lines,
            vec![
                "content-type: text/csv",
                "content-disposition: attachment; filename=\"q3.csv\"",
            ]
        );
    }

    #[test]
    fn test_required_headers_go_first_and_skip_the_slot_limit() {
        let table = HeaderTable::new(64);
        let mut headers: Vec<_> = (0..MAX_WIRE_HEADERS)
            .map(|i| pair(&format!("x-extra-{i}"), "v"))
            .collect();
        headers.push(pair("Location", "/Home/index"));
        headers.push(pair("x-request-id", "01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        let lines = header_lines(&table, &headers).unwrap();
        assert_eq!(lines.len(), MAX_WIRE_HEADERS);
        assert_eq!(lines[0], "Location: /Home/index");
        assert!(!lines.iter().any(|l| l.starts_with("x-request-id")));
    }

    #[test]
    fn test_invalid_required_header_fails_the_response() {
        let table = HeaderTable::new(4);
        let err = header_lines(&table, &[pair("location", "/a\r\nset-cookie: x")]).unwrap_err();
        assert_eq!(err, HeaderError::InvalidRequired("location".into()));

        let lines = header_lines(&table, &[pair("x-bad", "a\r\nb"), pair("x-ok", "1")]).unwrap();
        assert_eq!(lines, vec!["x-ok: 1"]);
    }
}
