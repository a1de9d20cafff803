//! Logging macros for the detection pipeline, gated by a module-level
//! `ENABLE_LOGS` switch.
//!
//! The capture and channel code runs on every repaint tick, so each module
//! decides for itself whether its chatter reaches the logger:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("frame queued ({} bytes)", jpeg.len());
//! ```
//!
//! Errors that end a session are logged unconditionally with `log::error!`
//! at the call site instead.

/// Debug-level logging, compiled away when the calling module sets
/// `ENABLE_LOGS = false`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info-level counterpart of [`log_debug!`].
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_debug!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
