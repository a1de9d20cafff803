#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use sentisense_lib::{
    events::EventLog,
    session::{SessionContext, TokenStore},
};
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Canned {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status,
            content_type,
            body: body.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct Backend {
    routes: Arc<HashMap<&'static str, Canned>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Local axum server answering each path with a fixed response.
/// Unknown paths get a 404.
pub struct CannedServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl CannedServer {
    pub async fn start(routes: Vec<(&'static str, Canned)>) -> Self {
        let backend = Backend {
            routes: Arc::new(routes.into_iter().collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = Arc::clone(&backend.requests);

        let app = Router::new().fallback(answer).with_state(backend);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn answer(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let canned = backend
        .routes
        .get(path.as_str())
        .cloned()
        .unwrap_or_else(|| Canned::json(404, serde_json::json!({"detail": "Not Found"})));

    backend.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let status = StatusCode::from_u16(canned.status).unwrap();
    (status, [(header::CONTENT_TYPE, canned.content_type)], canned.body).into_response()
}

pub fn session_for(host: &str, dir: &Path, events: Arc<EventLog>) -> SessionContext {
    let store = TokenStore::new(dir.join("session.json")).unwrap();
    SessionContext::new(host, store, Duration::from_secs(3600), events)
}
