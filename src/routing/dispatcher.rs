use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures::FutureExt;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::context::{parse_query, RequestBody, RequestContext, ResponseBody};
use super::table::RouteTable;
use crate::auth::{extract_bearer, Claims};
use crate::error::ApiError;
use crate::state::AppState;

pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Route not found";
pub const MISSING_TOKEN_MESSAGE: &str = "Missing or invalid authorization header";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            self.headers.insert(header::AUTHORIZATION, value);
        }
        self
    }

    pub fn header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Serialized response. The content type is always JSON, even for text bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub body: String,
}

impl DispatchResponse {
    fn from_error(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            body: err.to_json().to_string(),
        }
    }

    fn from_context(ctx: RequestContext) -> Self {
        let body = match ctx.body {
            ResponseBody::Empty => String::new(),
            ResponseBody::Text(text) => text,
            ResponseBody::Json(value) => value.to_string(),
        };
        Self {
            status: ctx.status.unwrap_or(StatusCode::OK),
            body,
        }
    }

    /// Body parsed as JSON, `Value::Null` when it is not.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

impl IntoResponse for DispatchResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            self.body,
        )
            .into_response()
    }
}

/// Runs one request through match, auth gate, handler and serialization.
pub struct Dispatcher {
    table: RouteTable,
    state: AppState,
}

impl Dispatcher {
    pub fn new(table: RouteTable, state: AppState) -> Self {
        Self { table, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn dispatch(&self, request: InboundRequest) -> DispatchResponse {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "dispatch",
            %request_id,
            method = %request.method,
            path = %request.path
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: InboundRequest) -> DispatchResponse {
        let path = strip_api_prefix(&request.path);

        let Some((route, params)) = self.table.find(&request.method, path) else {
            debug!("No route for {} {}", request.method, path);
            return DispatchResponse::from_error(&ApiError::not_found(ROUTE_NOT_FOUND_MESSAGE));
        };

        let query = parse_query(request.query.as_deref());

        let identity = if route.requires_auth {
            match self.authorize(&request.headers, &query) {
                Ok(claims) => Some(claims),
                Err(err) => return DispatchResponse::from_error(&err),
            }
        } else {
            None
        };

        let mut ctx = RequestContext {
            method: request.method,
            path: path.to_string(),
            params,
            query,
            headers: request.headers,
            request_body: RequestBody::from_bytes(&request.body),
            identity,
            status: None,
            body: ResponseBody::Empty,
        };

        let outcome = AssertUnwindSafe(route.handler.handle(&mut ctx, &self.state))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => DispatchResponse::from_context(ctx),
            Ok(Err(err)) => {
                if err.is_internal() {
                    error!("Handler for {} failed: {}", route.pattern.as_str(), err);
                } else {
                    debug!("Handler for {} rejected request: {}", route.pattern.as_str(), err);
                }
                DispatchResponse::from_error(&err)
            }
            Err(panic) => {
                error!(
                    "Handler for {} panicked: {}",
                    route.pattern.as_str(),
                    panic_message(panic.as_ref())
                );
                DispatchResponse::from_error(&ApiError::internal())
            }
        }
    }

    /// Bearer header first, `jwt` query parameter as fallback.
    fn authorize(&self, headers: &HeaderMap, query: &std::collections::HashMap<String, String>) -> Result<Claims, ApiError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .or_else(|| query.get("jwt").map(String::as_str).filter(|t| !t.is_empty()));

        let Some(token) = token else {
            warn!("Rejected request without bearer token");
            return Err(ApiError::unauthorized(MISSING_TOKEN_MESSAGE));
        };

        self.state.verifier.verify(token).map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            ApiError::unauthorized(INVALID_TOKEN_MESSAGE)
        })
    }
}

/// `/api/users/me` and `/users/me` address the same route.
fn strip_api_prefix(path: &str) -> &str {
    match path.strip_prefix("/api") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// HTTP surface: every request falls through to the dispatcher.
pub fn app(dispatcher: Arc<Dispatcher>) -> Router {
    let body_limit = dispatcher.state().config.api.max_request_size_bytes;

    Router::new()
        .fallback(dispatch_request)
        .with_state(dispatcher)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn dispatch_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> DispatchResponse {
    let mut request = InboundRequest::new(method, &uri);
    request.headers = headers;
    request.body = body;
    dispatcher.dispatch(request).await
}
