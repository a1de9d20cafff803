use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::{
    config::DetectionConfig,
    events::{self, EventSink, DETECTION_ERROR, DETECTION_STATE_CHANGED},
    session::SessionContext,
};

use super::{
    camera::CameraProvider,
    channel::Connector,
    loop_worker::{DetectionSnapshot, DetectionWorker},
    DetectionError,
};

struct ActiveDetection {
    session_id: String,
    cancel: CancellationToken,
    // Cancels the worker if the controller goes away without a stop.
    _cancel_on_drop: DropGuard,
    handle: JoinHandle<()>,
}

#[derive(Serialize)]
struct DetectionErrorEvent<'a> {
    message: &'a str,
}

/// Owns the single live detection session of the app: camera, streaming
/// channel and display window start and stop together.
#[derive(Clone)]
pub struct DetectionController {
    config: DetectionConfig,
    session: SessionContext,
    camera: Arc<dyn CameraProvider>,
    connector: Arc<dyn Connector>,
    events: Arc<dyn EventSink>,
    active: Arc<Mutex<Option<ActiveDetection>>>,
    status: Arc<watch::Sender<DetectionSnapshot>>,
}

impl DetectionController {
    pub fn new(
        config: DetectionConfig,
        session: SessionContext,
        camera: Arc<dyn CameraProvider>,
        connector: Arc<dyn Connector>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let (status, _rx) = watch::channel(DetectionSnapshot::default());
        Self {
            config,
            session,
            camera,
            connector,
            events,
            active: Arc::new(Mutex::new(None)),
            status: Arc::new(status),
        }
    }

    pub fn snapshot(&self) -> DetectionSnapshot {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionSnapshot> {
        self.status.subscribe()
    }

    /// Acquires the camera, then opens the streaming channel in the
    /// background. Camera denial ends the attempt with a visible error.
    pub async fn start_detection(&self) -> Result<DetectionSnapshot> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if !current.handle.is_finished() {
                return Err(DetectionError::AlreadyActive.into());
            }
        }
        // A session that fail-stopped on its own has already cleaned up.
        if let Some(finished) = active.take() {
            let _ = finished.handle.await;
        }

        let camera = Arc::clone(&self.camera);
        let opened = tokio::task::spawn_blocking(move || camera.open())
            .await
            .context("camera open worker join failed")?;
        let source = match opened {
            Ok(source) => source,
            Err(err) => {
                error!("camera access failed: {err}");
                let message = err.user_message();
                events::emit(
                    self.events.as_ref(),
                    DETECTION_ERROR,
                    &DetectionErrorEvent { message },
                );
                let snapshot = DetectionSnapshot {
                    last_error: Some(message.to_string()),
                    ..DetectionSnapshot::default()
                };
                events::emit(self.events.as_ref(), DETECTION_STATE_CHANGED, &snapshot);
                self.status.send_replace(snapshot);
                return Err(err.into());
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let url = self.session.ws_url(&self.config.stream_path);
        let cancel = CancellationToken::new();

        let worker = DetectionWorker::new(
            session_id.clone(),
            url,
            self.config.clone(),
            source,
            Arc::clone(&self.connector),
            Arc::clone(&self.events),
            Arc::clone(&self.status),
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run());
        info!("detection session {session_id} started");

        *active = Some(ActiveDetection {
            session_id,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
        });
        drop(active);

        Ok(self.snapshot())
    }

    /// Hard cancel: nothing in flight is awaited beyond the worker's own
    /// teardown. Calling it with nothing running is fine.
    pub async fn stop_detection(&self) -> Result<()> {
        let current = self.active.lock().await.take();
        let Some(current) = current else {
            return Ok(());
        };

        current.cancel.cancel();
        current
            .handle
            .await
            .context("detection loop task failed to join")?;
        info!("detection session {} stopped", current.session_id);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|current| !current.handle.is_finished())
            .unwrap_or(false)
    }
}
