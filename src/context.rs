//! Per-request state threaded through every dispatch stage.
//!
//! A [`RequestContext`] is created by the transport for one inbound request and
//! owned by the Dispatch Core until the response is written. Nothing in it is
//! shared with other requests.

use crate::error::DispatchError;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::response::HeaderVec;
use crate::router::HandlerDescriptor;
use crate::session::Session;
use bytes::Bytes;
use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum inline query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated query parameter storage.
pub type ParamVec = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;

/// Where a request currently is in the dispatch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Resolving,
    BeforeHooks,
    Binding,
    Invoking,
    AfterHooksOrError,
    Writing,
    Done,
}

/// Everything known about one request.
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    query: ParamVec,
    headers: HeaderVec,
    body: Bytes,
    descriptor: Option<Arc<HandlerDescriptor>>,
    session: Option<Session>,
    error: Option<DispatchError>,
    state: DispatchState,
    started: Instant,
}

impl RequestContext {
    /// Build a context from a request target (`/group/op?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (target, ParamVec::new()),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            query,
            headers: HeaderVec::new(),
            body: Bytes::new(),
            descriptor: None,
            session: None,
            error: None,
            state: DispatchState::Resolving,
            started: Instant::now(),
        }
    }

    /// Build a context from raw transport parts.
    ///
    /// Header names are lowercased. The request id is taken from `x-request-id`
    /// when it parses as a ULID.
    pub fn from_parts<I, K, V>(method: Method, target: &str, headers: I, body: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut ctx = Self::new(method, target);
        for (name, value) in headers {
            ctx.headers
                .push((Arc::from(name.as_ref().to_ascii_lowercase()), value.into()));
        }
        ctx.request_id = RequestId::from_header_or_new(ctx.header(REQUEST_ID_HEADER));
        ctx.body = Bytes::from(body);
        ctx
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a query parameter by name. Last occurrence wins.
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_params(&self) -> &ParamVec {
        &self.query
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a cookie by name from the `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")?.split(';').find_map(|pair| {
            let (k, v) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
            (k.trim() == name).then(|| v.trim())
        })
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the caller prefers an HTML page over a data payload.
    #[must_use]
    pub fn accepts_html(&self) -> bool {
        self.header("accept")
            .is_some_and(|a| a.to_ascii_lowercase().contains("text/html"))
    }

    /// Descriptor of the resolved handler, once resolution succeeded.
    #[must_use]
    pub fn descriptor(&self) -> Option<&HandlerDescriptor> {
        self.descriptor.as_deref()
    }

    pub(crate) fn set_descriptor(&mut self, descriptor: Arc<HandlerDescriptor>) {
        self.descriptor = Some(descriptor);
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// First failure recorded for this request.
    #[must_use]
    pub fn error(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    /// Record a failure. The first recorded failure is kept.
    pub fn fail(&mut self, err: DispatchError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DispatchState) {
        self.state = state;
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

fn parse_query(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
