//! Router core module - hot path for request routing.

use super::descriptor::HandlerDescriptor;
use crate::binder::InputSlot;
use crate::dispatcher::Handler;
use crate::error::DispatchError;
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One registered operation: metadata, expected inputs and the callable.
pub struct RouteEntry {
    pub descriptor: Arc<HandlerDescriptor>,
    pub slots: Arc<[InputSlot]>,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("descriptor", &self.descriptor)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

/// Split a normalized request path into `(handler-group, operation)`.
///
/// Exactly two non-empty segments are accepted; a single trailing slash is
/// tolerated.
#[must_use]
pub fn split_route_path(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.strip_prefix('/')?;
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let mut segments = trimmed.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(group), Some(operation), None) if !group.is_empty() && !operation.is_empty() => {
            Some((group, operation))
        }
        _ => None,
    }
}

/// Registry of handler routines keyed by handler-group and operation.
///
/// Populated once at startup; resolution is a read-only lookup that is safe to
/// call from any number of request coroutines at once.
#[derive(Clone, Default)]
pub struct Router {
    groups: HashMap<String, HashMap<String, Arc<RouteEntry>>>,
    len: usize,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry. A second entry for the same group/operation replaces
    /// the first.
    pub fn insert(&mut self, entry: RouteEntry) {
        let group = entry.descriptor.group().to_string();
        let operation = entry.descriptor.operation().to_string();
        let route = entry.descriptor.to_string();
        let operations = self.groups.entry(group).or_default();
        if operations.insert(operation, Arc::new(entry)).is_some() {
            warn!(route = %route, "Replaced existing handler registration");
        } else {
            self.len += 1;
            debug!(route = %route, total_routes = self.len, "Handler registered");
        }
    }

    /// Resolve `method path` to its registered entry.
    ///
    /// A path that is not `/{group}/{operation}`, an unknown operation and a
    /// verb that differs from the declared one all yield `NotFound`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<&RouteEntry, DispatchError> {
        let not_found = || DispatchError::not_found(method, path);

        let (group, operation) = split_route_path(path).ok_or_else(|| {
            debug!(method = %method, path = %path, "Route path is not /group/operation");
            not_found()
        })?;

        let entry = self
            .groups
            .get(group)
            .and_then(|ops| ops.get(operation))
            .ok_or_else(|| {
                debug!(method = %method, group = %group, operation = %operation, "No such operation");
                not_found()
            })?;

        if entry.descriptor.allowed_method() != method {
            debug!(
                method = %method,
                allowed = %entry.descriptor.allowed_method(),
                group = %group,
                operation = %operation,
                "Verb mismatch treated as not found"
            );
            return Err(not_found());
        }

        Ok(entry)
    }

    /// Iterate over every registered descriptor.
    pub fn descriptors(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.groups
            .values()
            .flat_map(|ops| ops.values())
            .map(|e| e.descriptor.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Log the routing table.
    pub fn dump_routes(&self) {
        let mut routes: Vec<String> = self.descriptors().map(ToString::to_string).collect();
        routes.sort();
        info!(routes_count = routes.len(), routes = ?routes, "Routing table loaded");
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_route_path() {
        assert_eq!(split_route_path("/Product/list"), Some(("Product", "list")));
        assert_eq!(split_route_path("/Product/list/"), Some(("Product", "list")));
        assert_eq!(split_route_path("/Product"), None);
        assert_eq!(split_route_path("/"), None);
        assert_eq!(split_route_path("/a/b/c"), None);
        assert_eq!(split_route_path("//list"), None);
        assert_eq!(split_route_path("Product/list"), None);
    }
}
