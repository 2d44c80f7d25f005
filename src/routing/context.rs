use std::collections::HashMap;

use axum::http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::matcher::PathParams;
use crate::auth::Claims;
use crate::error::ApiError;

/// Parsed request body. JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
}

impl RequestBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return RequestBody::Empty;
        }
        match serde_json::from_slice(bytes) {
            Ok(value) => RequestBody::Json(value),
            Err(_) => RequestBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// What the handler wants written back.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    /// Written as-is.
    Text(String),
    Json(Value),
}

/// Per-request state shared between the dispatcher and one handler.
///
/// The dispatcher fills the request side and `identity`; handlers set
/// `status` and `body`.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: PathParams,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub request_body: RequestBody,
    pub identity: Option<Claims>,
    pub status: Option<StatusCode>,
    pub body: ResponseBody,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: PathParams::new(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            request_body: RequestBody::Empty,
            identity: None,
            status: None,
            body: ResponseBody::Empty,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query value, treating an empty string as absent.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Claims of the authenticated caller.
    pub fn identity(&self) -> Result<&Claims, ApiError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.request_body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn respond<T: Serialize>(&mut self, status: StatusCode, body: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(body).map_err(ApiError::upstream)?;
        self.status = Some(status);
        self.body = ResponseBody::Json(value);
        Ok(())
    }

    pub fn ok<T: Serialize>(&mut self, body: &T) -> Result<(), ApiError> {
        self.respond(StatusCode::OK, body)
    }

    pub fn text(&mut self, body: impl Into<String>) {
        self.body = ResponseBody::Text(body.into());
    }
}

/// Parse a raw query string. The first occurrence of a key wins.
pub fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let mut query = HashMap::new();
    if let Some(raw) = raw {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    }
    query
}
