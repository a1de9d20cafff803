use std::sync::Mutex;

use log::error;
use serde::Serialize;
use serde_json::Value;

pub const TOAST: &str = "toast";
pub const NAVIGATE: &str = "navigate";
pub const SESSION_CHANGED: &str = "session-changed";
pub const REQUEST_STATUS: &str = "request-status";
pub const DETECTION_STATE_CHANGED: &str = "detection-state-changed";
pub const DETECTION_FRAME: &str = "detection-frame";
pub const DETECTION_LABELS: &str = "detection-labels";
pub const DETECTION_ERROR: &str = "detection-error";

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ToastKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

#[derive(Serialize)]
struct NavigateEvent<'a> {
    route: &'a str,
}

/// Where the core pushes UI-facing events. The desktop shell forwards them
/// to the webview; headless callers can record them.
pub trait EventSink: Send + Sync + 'static {
    fn emit_value(&self, event: &str, payload: Value);
}

pub fn emit<T: Serialize>(sink: &dyn EventSink, event: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit_value(event, value),
        Err(err) => error!("failed to serialize {event} payload: {err}"),
    }
}

pub fn toast(sink: &dyn EventSink, message: impl Into<String>, kind: ToastKind) {
    emit(
        sink,
        TOAST,
        &Toast {
            message: message.into(),
            kind,
        },
    );
}

pub fn navigate(sink: &dyn EventSink, route: &str) {
    emit(sink, NAVIGATE, &NavigateEvent { route });
}

#[cfg(feature = "desktop")]
impl EventSink for tauri::AppHandle {
    fn emit_value(&self, event: &str, payload: Value) {
        use tauri::Emitter;

        if let Err(err) = self.emit(event, payload) {
            log::warn!("failed to emit {event}: {err}");
        }
    }
}

/// In-memory sink that keeps every event in arrival order.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<(String, Value)>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.lock().clone()
    }

    /// Payloads of every event with the given name.
    pub fn named(&self, event: &str) -> Vec<Value> {
        self.lock()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn toasts(&self) -> Vec<(String, String)> {
        self.named(TOAST)
            .into_iter()
            .map(|payload| {
                (
                    payload["message"].as_str().unwrap_or_default().to_string(),
                    payload["kind"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    pub fn routes(&self) -> Vec<String> {
        self.named(NAVIGATE)
            .into_iter()
            .filter_map(|payload| payload["route"].as_str().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Value)>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EventSink for EventLog {
    fn emit_value(&self, event: &str, payload: Value) {
        self.lock().push((event.to_string(), payload));
    }
}
