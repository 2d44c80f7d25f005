#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use essay_api::auth::{ClassList, Claims, Role};
use essay_api::config::AppConfig;
use essay_api::database::{MemoryStore, Table};
use essay_api::state::AppState;

pub const SECRET: &str = "integration-secret";

/// One in-process server per test, bound to a free port on loopback.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })?;
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone());
        let app = essay_api::app(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url,
            store,
            state,
            client,
        })
    }

    pub async fn seed(&self, table: Table, rows: Vec<Value>) {
        self.store.seed(table, rows).await;
    }

    pub fn token(&self, claims: &Claims) -> Result<String> {
        Ok(self.state.verifier.issue(claims)?)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url, path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url, path))
    }
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
        member_id: "m1".to_string(),
        role: Role::Students,
        school: "S".to_string(),
        email: "m1@s.edu".to_string(),
        classes: ClassList::from("1A"),
    }
}
