use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::DetectionConfig,
    events::{self, EventSink, DETECTION_ERROR, DETECTION_STATE_CHANGED},
    timer::TimerSlot,
};

use super::{
    camera::{encode_jpeg, FrameSource},
    channel::{parse_labels, Connection, Connector, Inbound, SendOutcome},
    display::DisplayWindow,
    state::{ChannelState, Effect},
    throttle::FrameThrottle,
    DetectionError,
};

// Set to true to enable per-frame logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSnapshot {
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub state: ChannelState,
    pub capturing: bool,
    pub frames_sent: u64,
    pub reconnects: u32,
    pub last_error: Option<String>,
}

#[derive(Serialize)]
struct DetectionErrorEvent<'a> {
    message: &'a str,
}

enum Wakeup {
    Reconnect,
}

pub(crate) struct DetectionWorker {
    session_id: String,
    started_at: DateTime<Utc>,
    url: String,
    config: DetectionConfig,
    source: Box<dyn FrameSource>,
    connector: Arc<dyn Connector>,
    events: Arc<dyn EventSink>,
    status: Arc<watch::Sender<DetectionSnapshot>>,
    cancel: CancellationToken,
    display: DisplayWindow,
    state: ChannelState,
    throttle: FrameThrottle,
    connection: Option<Connection>,
    reconnect: TimerSlot,
    wake_tx: mpsc::UnboundedSender<Wakeup>,
    wake_rx: mpsc::UnboundedReceiver<Wakeup>,
    frames_sent: u64,
    reconnects: u32,
    last_error: Option<String>,
}

impl DetectionWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session_id: String,
        url: String,
        config: DetectionConfig,
        source: Box<dyn FrameSource>,
        connector: Arc<dyn Connector>,
        events: Arc<dyn EventSink>,
        status: Arc<watch::Sender<DetectionSnapshot>>,
        cancel: CancellationToken,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        Self {
            display: DisplayWindow::new(config.label_decay, Arc::clone(&events)),
            throttle: FrameThrottle::new(config.min_frame_interval()),
            session_id,
            started_at: Utc::now(),
            url,
            config,
            source,
            connector,
            events,
            status,
            cancel,
            state: ChannelState::Idle,
            connection: None,
            reconnect: TimerSlot::new("reconnect"),
            wake_tx,
            wake_rx,
            frames_sent: 0,
            reconnects: 0,
            last_error: None,
        }
    }

    pub(crate) async fn run(mut self) {
        log_info!("detection session {} starting against {}", self.session_id, self.url);
        self.transition(ChannelState::start);

        // Stand-in for the display's repaint signal; work is skipped, not queued.
        let mut repaint = tokio::time::interval(self.config.repaint_interval);
        repaint.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if matches!(self.state, ChannelState::Closing | ChannelState::Idle) {
                break;
            }

            if self.state == ChannelState::Connecting && self.connection.is_none() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.transition(ChannelState::stop);
                        break;
                    }
                    result = self.connector.connect(&self.url) => match result {
                        Ok(connection) => {
                            self.connection = Some(connection);
                            self.throttle.reset();
                            self.transition(ChannelState::opened);
                        }
                        Err(err) => self.fail(err),
                    },
                }
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.transition(ChannelState::stop);
                    break;
                }
                _ = repaint.tick() => self.on_repaint(),
                event = next_inbound(&mut self.connection) => self.on_inbound(event),
                Some(wakeup) = self.wake_rx.recv() => self.on_wakeup(wakeup),
            }
        }

        self.teardown();
        log_info!(
            "detection session {} finished after {} frames",
            self.session_id,
            self.frames_sent
        );
    }

    fn on_repaint(&mut self) {
        if !self.state.is_ready() {
            return;
        }

        let now = Instant::now();
        if !self.throttle.is_due(now) {
            return;
        }

        let Some(frame) = self.source.latest() else {
            return;
        };

        let jpeg = match encode_jpeg(&frame, self.config.jpeg_quality) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_debug!("frame encoding failed, skipping: {err}");
                return;
            }
        };

        if let Err(err) = self.push_frame(jpeg, now) {
            self.fail(err);
        }
    }

    /// Hands one encoded frame to the socket. Empty output never reaches it.
    fn push_frame(&mut self, jpeg: Vec<u8>, now: Instant) -> Result<(), DetectionError> {
        if jpeg.is_empty() || !self.state.is_ready() {
            return Ok(());
        }
        let Some(connection) = self.connection.as_ref() else {
            return Ok(());
        };

        let len = jpeg.len();
        match connection.send_frame(jpeg)? {
            SendOutcome::Queued => {
                self.throttle.record_sent(now);
                self.frames_sent += 1;
                log_debug!("frame {} queued ({len} bytes)", self.frames_sent);
                self.publish();
            }
            SendOutcome::Dropped => log_debug!("socket busy, frame dropped"),
        }
        Ok(())
    }

    fn on_inbound(&mut self, event: Inbound) {
        match event {
            Inbound::Frame(bytes) => self.display.update_frame(bytes),
            Inbound::Text(text) => match parse_labels(&text) {
                Ok(labels) if labels.is_empty() => {}
                Ok(labels) => self.display.update_labels(labels),
                Err(err) => {
                    log_warn!("error parsing emotion data: {err}");
                    self.report("Error parsing emotion data");
                }
            },
            Inbound::Closed => {
                log_info!("websocket closed");
                self.connection = None;
                let capturing = !self.cancel.is_cancelled();
                self.transition(|state| state.closed(capturing));
            }
            Inbound::SendFailed(reason) => self.fail(DetectionError::Send(reason)),
            Inbound::Broken(reason) => self.fail(DetectionError::ConnectionLost(reason)),
        }
    }

    fn on_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::Reconnect => {
                if self.state != ChannelState::Reconnecting {
                    return;
                }
                self.reconnects += 1;
                self.report("Reconnecting...");
                self.transition(ChannelState::reconnect_due);
            }
        }
    }

    fn fail(&mut self, err: DetectionError) {
        error!("detection session {} stopped: {err}", self.session_id);
        self.report(err.user_message());
        self.transition(ChannelState::failed);
    }

    fn transition(&mut self, step: impl FnOnce(ChannelState) -> (ChannelState, Effect)) {
        let (next, effect) = step(self.state);
        // The ready flag drops here, before any close or reconnect handling.
        self.state = next;

        if effect == Effect::ScheduleReconnect {
            let wake_tx = self.wake_tx.clone();
            self.reconnect.schedule(self.config.reconnect_delay, async move {
                let _ = wake_tx.send(Wakeup::Reconnect);
            });
        }

        self.publish();
    }

    fn teardown(&mut self) {
        self.reconnect.cancel();
        self.connection = None;
        self.source.stop();
        self.display.clear();
        self.state = self.state.torn_down();
        self.publish();
    }

    fn report(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
        events::emit(
            self.events.as_ref(),
            DETECTION_ERROR,
            &DetectionErrorEvent { message },
        );
        self.publish();
    }

    fn publish(&self) {
        let snapshot = DetectionSnapshot {
            session_id: Some(self.session_id.clone()),
            started_at: Some(self.started_at),
            state: self.state,
            capturing: self.state.is_active(),
            frames_sent: self.frames_sent,
            reconnects: self.reconnects,
            last_error: self.last_error.clone(),
        };
        events::emit(self.events.as_ref(), DETECTION_STATE_CHANGED, &snapshot);
        self.status.send_replace(snapshot);
    }
}

async fn next_inbound(connection: &mut Option<Connection>) -> Inbound {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}
