use std::sync::Arc;

use axum::http::{Method, Uri};
use serde_json::Value;

use crate::auth::{ClassList, Claims, Role};
use crate::config::AppConfig;
use crate::database::{MemoryStore, Table};
use crate::handlers;
use crate::routing::{DispatchResponse, Dispatcher, InboundRequest};
use crate::state::AppState;

pub const TEST_SECRET: &str = "test-secret";

/// Unit-test fixture: application state over a seeded in-process store.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    dispatcher: Dispatcher,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(Self::config(), store.clone());
        let dispatcher = Dispatcher::new(handlers::routes(), state.clone());
        Self {
            store,
            state,
            dispatcher,
        }
    }

    pub fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            _ => None,
        })
        .expect("test configuration")
    }

    pub fn teacher() -> Claims {
        Claims {
            member_id: "t1".to_string(),
            role: Role::Teachers,
            school: "S".to_string(),
            email: "teacher@s.edu".to_string(),
            classes: ClassList::from("1A,1B"),
        }
    }

    pub fn student() -> Claims {
        Claims {
            member_id: "s1".to_string(),
            role: Role::Students,
            school: "S".to_string(),
            email: "s1@s.edu".to_string(),
            classes: ClassList::from("1A"),
        }
    }

    pub fn token(&self, claims: &Claims) -> String {
        self.state.verifier.issue(claims).expect("token issue")
    }

    pub async fn seed(&self, table: Table, rows: Vec<Value>) {
        self.store.seed(table, rows).await;
    }

    /// GET through the full route table as `claims`.
    pub async fn get(&self, uri: &str, claims: &Claims) -> DispatchResponse {
        let uri: Uri = uri.parse().expect("test uri");
        let request = InboundRequest::new(Method::GET, &uri).bearer(&self.token(claims));
        self.dispatcher.dispatch(request).await
    }

    pub async fn post(&self, uri: &str, claims: &Claims, body: &Value) -> DispatchResponse {
        let uri: Uri = uri.parse().expect("test uri");
        let request = InboundRequest::new(Method::POST, &uri)
            .bearer(&self.token(claims))
            .body(body.to_string());
        self.dispatcher.dispatch(request).await
    }
}
