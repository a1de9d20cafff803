use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use log::warn;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::HttpConfig,
    events::{self, EventSink, ToastKind, REQUEST_STATUS},
    session::SessionContext,
};

use super::AnalysisError;

const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Public,
    /// Needs the session's bearer token; a 401 ends the session.
    Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
    pub auth: Auth,
}

impl Endpoint {
    const fn post(path: &'static str, auth: Auth) -> Self {
        Self {
            method: Method::Post,
            path,
            auth,
        }
    }

    const fn get(path: &'static str, auth: Auth) -> Self {
        Self {
            method: Method::Get,
            path,
            auth,
        }
    }
}

pub const LOGIN: Endpoint = Endpoint::post("/auth/token", Auth::Public);
pub const REGISTER: Endpoint = Endpoint::post("/auth/register", Auth::Public);
pub const CHECK_USER: Endpoint = Endpoint::post("/auth/check-user", Auth::Public);
pub const GOOGLE_LOGIN: Endpoint = Endpoint::post("/auth/google-login", Auth::Public);
pub const GOOGLE_SIGNUP: Endpoint = Endpoint::post("/auth/google-signup", Auth::Public);
pub const FORGOT_PASSWORD: Endpoint = Endpoint::post("/auth/forgot-password", Auth::Public);
pub const RESET_PASSWORD: Endpoint = Endpoint::post("/auth/reset-password", Auth::Public);
pub const ANALYZE_SENTIMENT: Endpoint =
    Endpoint::post("/sentiment/analyze-sentiment", Auth::Bearer);
pub const ANALYSIS_HISTORY: Endpoint = Endpoint::get("/sentiment/analysis-history", Auth::Bearer);
pub const YOUTUBE_COMMENTS: Endpoint = Endpoint::post("/youtube/fetch-comments", Auth::Bearer);
pub const REDDIT_COMMENTS: Endpoint = Endpoint::post("/reddit/fetch-comments", Auth::Bearer);
pub const DETECT_IMAGE: Endpoint = Endpoint::post("/emotion/detect-from-image/", Auth::Public);
pub const DETECT_VIDEO: Endpoint = Endpoint::post("/emotion/detect-from-video/", Auth::Public);
pub const CONTACT: Endpoint = Endpoint::post("/email/contact", Auth::Public);

/// Error bodies the backend sends alongside non-success statuses.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn into_detail(self) -> Option<String> {
        match self.detail {
            Some(Value::String(detail)) => return Some(detail),
            Some(other) if !other.is_null() => return Some(other.to_string()),
            _ => {}
        }
        self.error.or(self.message)
    }
}

/// HTTP side of the session: every one-shot request goes through here so
/// the auth and status handling is identical for all flows.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    session: SessionContext,
    events: Arc<dyn EventSink>,
}

impl ApiClient {
    pub fn new(
        session: SessionContext,
        events: Arc<dyn EventSink>,
        config: &HttpConfig,
    ) -> Result<Self, AnalysisError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            session,
            events,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub(crate) fn events_handle(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.events)
    }

    pub async fn get_json<R: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<R, AnalysisError> {
        let bytes = self.send(endpoint, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn post_json<B, R>(&self, endpoint: &Endpoint, body: &B) -> Result<R, AnalysisError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.send(endpoint, Some(serde_json::to_value(body)?)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Response body as opaque bytes, for endpoints that answer with a file.
    pub async fn post_bytes<B>(&self, endpoint: &Endpoint, body: &B) -> Result<Vec<u8>, AnalysisError>
    where
        B: Serialize + ?Sized,
    {
        self.send(endpoint, Some(serde_json::to_value(body)?)).await
    }

    async fn send(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<Vec<u8>, AnalysisError> {
        let token = match endpoint.auth {
            Auth::Public => None,
            Auth::Bearer => match self.session.token() {
                Some(token) => Some(token),
                None => {
                    warn!("{} requires a session; logging out", endpoint.path);
                    self.session.logout();
                    return Err(AnalysisError::NotAuthenticated);
                }
            },
        };

        let url = self.session.endpoint_url(endpoint.path);
        let mut request = match endpoint.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        log_debug!("{} {}", endpoint.method, url);
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        log_debug!("{} {} -> {} ({} bytes)", endpoint.method, url, status, bytes.len());

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                if endpoint.auth == Auth::Bearer {
                    warn!("{} rejected the session token; logging out", endpoint.path);
                    self.session.logout();
                }
                Err(AnalysisError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(AnalysisError::RateLimited),
            StatusCode::NOT_FOUND => Err(AnalysisError::NotFound),
            other => {
                let detail = serde_json::from_slice::<ErrorBody>(&bytes)
                    .ok()
                    .and_then(ErrorBody::into_detail);
                Err(AnalysisError::Status {
                    status: other.as_u16(),
                    detail,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub message: &'static str,
    pub kind: ToastKind,
}

impl Notice {
    pub const fn error(message: &'static str) -> Self {
        Self {
            message,
            kind: ToastKind::Error,
        }
    }

    pub const fn warning(message: &'static str) -> Self {
        Self {
            message,
            kind: ToastKind::Warning,
        }
    }
}

/// What a form shows for each kind of failure.
#[derive(Debug, Clone, Copy)]
pub struct FlowNotices {
    pub failure: &'static str,
    pub rate_limited: Notice,
    pub not_found: Option<&'static str>,
    /// Overrides the expired-session notice, for public endpoints where a
    /// 401 means something else.
    pub unauthorized: Option<Notice>,
    /// Show the backend's own message for status errors when it sent one.
    pub prefer_detail: bool,
}

impl FlowNotices {
    pub const fn new(failure: &'static str) -> Self {
        Self {
            failure,
            rate_limited: Notice::warning("Too many requests. Please wait and try again."),
            not_found: None,
            unauthorized: None,
            prefer_detail: false,
        }
    }

    pub const fn rate_limited(mut self, notice: Notice) -> Self {
        self.rate_limited = notice;
        self
    }

    pub const fn not_found(mut self, message: &'static str) -> Self {
        self.not_found = Some(message);
        self
    }

    pub const fn unauthorized(mut self, notice: Notice) -> Self {
        self.unauthorized = Some(notice);
        self
    }

    pub const fn prefer_detail(mut self) -> Self {
        self.prefer_detail = true;
        self
    }

    /// Toast for a failed request, or `None` when nothing should be shown.
    pub fn notice_for(&self, err: &AnalysisError) -> Option<(String, ToastKind)> {
        let (message, kind) = match err {
            AnalysisError::Busy => return None,
            AnalysisError::Validation(message) => (message.clone(), ToastKind::Error),
            AnalysisError::NotAuthenticated => {
                ("Please log in to continue.".to_string(), ToastKind::Error)
            }
            AnalysisError::Unauthorized => match self.unauthorized {
                Some(notice) => (notice.message.to_string(), notice.kind),
                None => (
                    "Session expired. Please log in again.".to_string(),
                    ToastKind::Error,
                ),
            },
            AnalysisError::RateLimited => {
                (self.rate_limited.message.to_string(), self.rate_limited.kind)
            }
            AnalysisError::NotFound => (
                self.not_found.unwrap_or(self.failure).to_string(),
                ToastKind::Error,
            ),
            AnalysisError::Status {
                detail: Some(detail),
                ..
            } if self.prefer_detail => (detail.clone(), ToastKind::Error),
            AnalysisError::Status { .. }
            | AnalysisError::Transport(_)
            | AnalysisError::Parse(_)
            | AnalysisError::Io(_) => (self.failure.to_string(), ToastKind::Error),
        };
        Some((message, kind))
    }
}

#[derive(Serialize)]
struct RequestStatusEvent<'a> {
    form: &'a str,
    loading: bool,
}

/// One form's submit control: at most one request in flight at a time.
pub struct FormSlot {
    name: &'static str,
    busy: Arc<AtomicBool>,
    events: Arc<dyn EventSink>,
}

impl FormSlot {
    pub fn new(name: &'static str, events: Arc<dyn EventSink>) -> Self {
        Self {
            name,
            busy: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn acquire(&self) -> Result<InFlight, AnalysisError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AnalysisError::Busy);
        }
        emit_status(self.events.as_ref(), self.name, true);
        Ok(InFlight {
            name: self.name,
            busy: Arc::clone(&self.busy),
            events: Arc::clone(&self.events),
        })
    }

    /// Runs one submission: claims the slot, awaits the request and shows
    /// the failure notice. The slot is released on every exit path.
    pub async fn submit<T, F>(&self, notices: &FlowNotices, request: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        let _in_flight = self.acquire()?;
        let result = request.await;
        if let Err(err) = &result {
            warn!("{} request failed: {err}", self.name);
            if let Some((message, kind)) = notices.notice_for(err) {
                events::toast(self.events.as_ref(), message, kind);
            }
        }
        result
    }
}

/// Held while a request is pending; dropping it re-enables the form.
pub struct InFlight {
    name: &'static str,
    busy: Arc<AtomicBool>,
    events: Arc<dyn EventSink>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        emit_status(self.events.as_ref(), self.name, false);
    }
}

fn emit_status(sink: &dyn EventSink, form: &str, loading: bool) {
    events::emit(sink, REQUEST_STATUS, &RequestStatusEvent { form, loading });
}
