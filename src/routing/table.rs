use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use super::context::RequestContext;
use super::matcher::{PathParams, PathPattern};
use crate::error::ApiError;
use crate::state::AppState;

/// Contract every route handler implements.
///
/// Handlers write their response into `ctx`. Returning an error hands the
/// response over to the dispatcher.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError>;
}

pub struct RouteDescriptor {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
    pub requires_auth: bool,
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}

/// Ordered route list, built once at startup and read-only afterwards.
///
/// Lookup is first-match-wins in registration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated route.
    pub fn route<H>(self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.register(method, pattern, Arc::new(handler), true)
    }

    /// Register a route that skips the auth gate.
    pub fn public<H>(self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.register(method, pattern, Arc::new(handler), false)
    }

    pub fn register(mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>, requires_auth: bool) -> Self {
        self.routes.push(RouteDescriptor {
            method,
            pattern: PathPattern::parse(pattern),
            handler,
            requires_auth,
        });
        self
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<(&RouteDescriptor, PathParams)> {
        self.routes
            .iter()
            .filter(|r| r.method == *method)
            .find_map(|r| r.pattern.matches(path).map(|params| (r, params)))
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
