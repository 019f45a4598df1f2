//! Test Helper Utilities
//!
//! Shared utilities for skilltree-sync integration tests: a scripted HTTP
//! mock (catalog API and PostgREST shapes) and in-memory stores.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use skilltree_common::db::{Machine, MachineStatus, Technique};
use skilltree_sync::db::SqliteStore;
use skilltree_sync::services::RetryPolicy;
use skilltree_sync::SyncSettings;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string as sent
    pub raw_query: Option<String>,
    /// Decoded query parameters
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: String,
    pub received_at: Instant,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct MockState {
    /// Keyed by "path?query" or bare "path"; the last response is sticky
    routes: Mutex<HashMap<String, VecDeque<(StatusCode, Value)>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scripted HTTP server on an ephemeral local port
pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Catalog API base URL served by this mock
    pub fn api_base(&self) -> String {
        format!("{}/api/v4", self.base_url)
    }

    /// Queue a response for `route` (path, optionally with "?query")
    pub fn respond(&self, route: &str, status: u16, body: Value) {
        self.state
            .routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back((StatusCode::from_u16(status).unwrap(), body));
    }

    /// Queue a sequence of responses for `route`
    pub fn respond_seq(&self, route: &str, responses: Vec<(u16, Value)>) {
        for (status, body) in responses {
            self.respond(route, status, body);
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests whose path is exactly `path`
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let received_at = Instant::now();
    let path = uri.path().to_string();
    let raw_query = uri.query().map(str::to_string);

    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        raw_query: raw_query.clone(),
        params,
        headers,
        body,
        received_at,
    });

    let mut routes = state.routes.lock().unwrap();
    let full_key = match &raw_query {
        Some(query) => format!("{}?{}", path, query),
        None => path.clone(),
    };
    let queue = if routes.contains_key(&full_key) {
        routes.get_mut(&full_key)
    } else {
        routes.get_mut(&path)
    };

    match queue {
        Some(queue) if queue.len() > 1 => {
            let (status, body) = queue.pop_front().unwrap();
            (status, Json(body))
        }
        Some(queue) if !queue.is_empty() => {
            let (status, body) = queue[0].clone();
            (status, Json(body))
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))),
    }
}

/// Catalog list page containing machines `ids`
pub fn machine_page(ids: impl IntoIterator<Item = i64>) -> Value {
    let data: Vec<Value> = ids
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Machine{}", id),
                "os": "Linux",
                "ip": format!("10.10.11.{}", id % 255),
                "avatar": format!("/storage/avatars/{}.png", id),
                "points": 20,
                "difficultyText": "Easy",
                "release": "2024-01-01T19:00:00.000000Z",
                "user_owns_count": 100,
                "root_owns_count": 90,
                "free": false,
                "stars": 4.2
            })
        })
        .collect();
    json!({ "data": data })
}

/// Tags response body
pub fn tags_body(tags: &[(i64, &str, &str)]) -> Value {
    let info: Vec<Value> = tags
        .iter()
        .map(|(id, name, category)| json!({"id": id, "name": name, "category": category}))
        .collect();
    json!({ "info": info })
}

/// Route of the list page `page` of `endpoint`
pub fn page_route(endpoint: &str, page: u32) -> String {
    format!("/api/v4{}?per_page=100&page={}", endpoint, page)
}

pub fn tags_route(machine_id: i64) -> String {
    format!("/api/v4/machine/tags/{}", machine_id)
}

/// Settings pointed at the mock, without inter-request delays
pub fn test_settings(api_base: &str) -> SyncSettings {
    SyncSettings {
        api_base_url: api_base.to_string(),
        page_size: 100,
        request_delay: Duration::ZERO,
        batch_size: 50,
    }
}

/// Millisecond backoff so retry tests stay fast
pub fn fast(policy: RetryPolicy) -> RetryPolicy {
    policy.with_base_delay(Duration::from_millis(1))
}

pub async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

pub fn machine(id: i64, name: &str) -> Machine {
    Machine {
        id,
        name: name.to_string(),
        os: Some("Linux".to_string()),
        ip: None,
        avatar: None,
        points: Some(20),
        difficulty_text: Some("Easy".to_string()),
        status: MachineStatus::Active,
        release_date: None,
        user_owns_count: None,
        root_owns_count: None,
        free: Some(false),
        stars: None,
        last_updated: Utc::now(),
    }
}

pub fn technique(id: i64, name: &str) -> Technique {
    Technique {
        id,
        name: name.to_string(),
        category: "Technique".to_string(),
    }
}
