use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("frame send failed: {0}")]
    Send(String),

    #[error("detection already active")]
    AlreadyActive,
}

impl DetectionError {
    /// Text shown to the user; the `Display` form carries the detail for logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            DetectionError::Camera(_) => "Webcam access required",
            DetectionError::Connect(_) | DetectionError::ConnectionLost(_) => "Connection error",
            DetectionError::Send(_) => "Error sending frame",
            DetectionError::AlreadyActive => "Detection is already running",
        }
    }
}
