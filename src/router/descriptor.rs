use http::Method;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Who may invoke an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// No check.
    #[default]
    Public,
    /// Any caller whose session is authenticated (wildcard).
    Authenticated,
    /// Authenticated callers holding at least one of these roles.
    Roles(BTreeSet<String>),
}

impl AccessPolicy {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }
}

/// What a handler normally answers with; decides the shape of error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// Rendered views.
    Page,
    /// Structured payloads.
    #[default]
    Data,
}

/// Declared metadata of one routed operation.
///
/// Built at registration time and immutable once registered.
///
/// ```rust
/// use brrtmvc::router::{AccessPolicy, HandlerDescriptor, ResponseShape};
/// use http::Method;
///
/// let desc = HandlerDescriptor::new("User", "create")
///     .method(Method::POST)
///     .access(AccessPolicy::roles(["admin"]))
///     .attribute("audit", "full");
/// assert_eq!(desc.allowed_method(), &Method::POST);
/// assert_eq!(desc.response_shape(), ResponseShape::Data);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    group: String,
    operation: String,
    method: Method,
    access: AccessPolicy,
    shape: ResponseShape,
    attributes: BTreeMap<String, String>,
}

impl HandlerDescriptor {
    /// Descriptor for `group/operation`, answering GET with a public data payload.
    pub fn new(group: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            operation: operation.into(),
            method: Method::GET,
            access: AccessPolicy::Public,
            shape: ResponseShape::Data,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// Shorthand for `.shape(ResponseShape::Page)`.
    #[must_use]
    pub fn page(self) -> Self {
        self.shape(ResponseShape::Page)
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    #[must_use]
    pub fn allowed_method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn access_policy(&self) -> &AccessPolicy {
        &self.access
    }

    #[must_use]
    pub fn response_shape(&self) -> ResponseShape {
        self.shape
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

impl fmt::Display for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}/{}", self.method, self.group, self.operation)
    }
}
