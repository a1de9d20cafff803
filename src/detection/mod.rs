//! Live emotion detection: camera frames out over a WebSocket, annotated
//! frames and label sets back in.

pub mod camera;
pub mod channel;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod display;
mod error;
mod loop_worker;
pub mod state;
pub mod throttle;

pub use camera::{CameraProvider, FrameSource};
pub use channel::{Connection, Connector, Inbound, Peer, WsConnector};
pub use controller::DetectionController;
pub use display::DisplayWindow;
pub use error::DetectionError;
pub use loop_worker::DetectionSnapshot;
pub use state::ChannelState;
