use std::sync::Arc;

use tracing::debug;

use super::{Before, Middleware};
use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::router::AccessPolicy;
use crate::session::{Session, SessionStore};

/// Enforces each handler's declared [`AccessPolicy`].
///
/// The caller's session is looked up from a cookie and attached to the context
/// whether or not the operation is protected, so handlers can read it.
pub struct AuthorizationMiddleware {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
}

impl AuthorizationMiddleware {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }

    fn check(&self, ctx: &RequestContext) -> anyhow::Result<Option<String>> {
        let Some(policy) = ctx.descriptor().map(|d| d.access_policy()) else {
            return Ok(None);
        };
        let session = ctx.session();
        let authenticated = match session {
            Some(s) => s.is_authenticated()?,
            None => false,
        };

        Ok(match policy {
            AccessPolicy::Public => None,
            AccessPolicy::Authenticated if authenticated => None,
            AccessPolicy::Authenticated => Some("authentication required".to_string()),
            AccessPolicy::Roles(_) if !authenticated => {
                Some("authentication required".to_string())
            }
            AccessPolicy::Roles(required) => {
                let held = match session {
                    Some(s) => s.roles()?,
                    None => Default::default(),
                };
                if held.iter().any(|r| required.contains(r)) {
                    None
                } else {
                    Some(format!(
                        "role not permitted; requires one of {}",
                        required.iter().cloned().collect::<Vec<_>>().join(", ")
                    ))
                }
            }
        })
    }
}

impl Middleware for AuthorizationMiddleware {
    fn name(&self) -> &str {
        "authorization"
    }

    fn before_action(&self, ctx: &mut RequestContext) -> anyhow::Result<Before> {
        if let Some(sid) = ctx.cookie(&self.cookie_name).map(str::to_string) {
            ctx.set_session(Session::new(sid, Arc::clone(&self.store)));
        }

        match self.check(ctx)? {
            None => Ok(Before::Continue),
            Some(reason) => {
                debug!(
                    request_id = %ctx.request_id(),
                    path = %ctx.path(),
                    reason = %reason,
                    "Access denied"
                );
                Ok(Before::Reject(DispatchError::unauthorized(reason)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::HandlerDescriptor;
    use crate::session::MemorySessionStore;
    use http::Method;

    fn ctx_for(policy: AccessPolicy, cookie: Option<&str>) -> RequestContext {
        let mut ctx = RequestContext::new(Method::GET, "/Admin/panel");
        if let Some(c) = cookie {
            ctx = ctx.with_header("cookie", format!("SESSIONID={c}"));
        }
        ctx.set_descriptor(Arc::new(HandlerDescriptor::new("Admin", "panel").access(policy)));
        ctx
    }

    fn middleware() -> AuthorizationMiddleware {
        let store = Arc::new(MemorySessionStore::new());
        store.login("admin-sid", "admin");
        store.login("multi-sid", "viewer,editor");
        AuthorizationMiddleware::new(store, "SESSIONID")
    }

    #[test]
    fn test_public_passes_anonymous() {
        let mut ctx = ctx_for(AccessPolicy::Public, None);
        assert!(matches!(middleware().before_action(&mut ctx).unwrap(), Before::Continue));
    }

    #[test]
    fn test_authenticated_requires_login() {
        let mw = middleware();
        let mut anon = ctx_for(AccessPolicy::Authenticated, Some("unknown"));
        assert!(matches!(mw.before_action(&mut anon).unwrap(), Before::Reject(_)));
        assert!(anon.session().is_some());

        let mut user = ctx_for(AccessPolicy::Authenticated, Some("admin-sid"));
        assert!(matches!(mw.before_action(&mut user).unwrap(), Before::Continue));
    }

    #[test]
    fn test_roles_intersect() {
        let mw = middleware();
        let mut ctx = ctx_for(AccessPolicy::roles(["editor", "owner"]), Some("multi-sid"));
        assert!(matches!(mw.before_action(&mut ctx).unwrap(), Before::Continue));

        let mut ctx = ctx_for(AccessPolicy::roles(["owner"]), Some("admin-sid"));
        match mw.before_action(&mut ctx).unwrap() {
            Before::Reject(err) => assert_eq!(err.status(), 401),
            other => panic!("unexpected {other:?}"),
        }
    }
}
