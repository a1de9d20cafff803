use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    events::{self, EventSink, DETECTION_FRAME, DETECTION_LABELS},
    timer::TimerSlot,
};

/// What the detection view currently shows.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    labels: Vec<String>,
    frame: Option<Vec<u8>>,
    expires_at: Option<Instant>,
    generation: u64,
}

impl DisplayState {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn frame(&self) -> Option<&[u8]> {
        self.frame.as_deref()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Replaces the label set and pushes its expiry out to `now + decay`.
    /// Returns the generation the matching expiry must present.
    pub fn apply_labels(&mut self, labels: Vec<String>, now: Instant, decay: Duration) -> u64 {
        self.labels = labels;
        self.expires_at = Some(now + decay);
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Clears the labels if no newer update happened since `generation`.
    /// The frame is left alone.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.expires_at.is_none() {
            return false;
        }
        self.labels.clear();
        self.expires_at = None;
        true
    }

    pub fn show_frame(&mut self, frame: Vec<u8>) {
        self.frame = Some(frame);
    }

    pub fn reset(&mut self) {
        self.labels.clear();
        self.frame = None;
        self.expires_at = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Serialize)]
struct LabelsEvent<'a> {
    emotions: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameEvent {
    /// Annotated frame, base64 encoded for the webview.
    image: String,
}

/// Label display with a decay timer: labels stay up for `decay` after the
/// last update, independent of how bursty the results are. Frames have no
/// timer and persist until replaced.
pub struct DisplayWindow {
    state: Arc<Mutex<DisplayState>>,
    expiry: TimerSlot,
    decay: Duration,
    events: Arc<dyn EventSink>,
}

impl DisplayWindow {
    pub fn new(decay: Duration, events: Arc<dyn EventSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DisplayState::default())),
            expiry: TimerSlot::new("label-expiry"),
            decay,
            events,
        }
    }

    pub fn update_labels(&self, labels: Vec<String>) {
        let generation = {
            let mut state = lock(&self.state);
            let generation = state.apply_labels(labels, Instant::now(), self.decay);
            events::emit(
                self.events.as_ref(),
                DETECTION_LABELS,
                &LabelsEvent {
                    emotions: state.labels(),
                },
            );
            generation
        };

        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.events);
        self.expiry.schedule(self.decay, async move {
            let mut state = lock(&state);
            if state.expire(generation) {
                events::emit(sink.as_ref(), DETECTION_LABELS, &LabelsEvent { emotions: &[] });
            }
        });
    }

    pub fn update_frame(&self, frame: Vec<u8>) {
        let image = STANDARD.encode(&frame);
        lock(&self.state).show_frame(frame);
        events::emit(self.events.as_ref(), DETECTION_FRAME, &FrameEvent { image });
    }

    pub fn visible_labels(&self) -> Vec<String> {
        lock(&self.state).labels().to_vec()
    }

    pub fn current_frame(&self) -> Option<Vec<u8>> {
        lock(&self.state).frame().map(<[u8]>::to_vec)
    }

    /// Drops everything shown and cancels the pending expiry.
    pub fn clear(&self) {
        self.expiry.cancel();
        lock(&self.state).reset();
    }
}

fn lock(state: &Mutex<DisplayState>) -> MutexGuard<'_, DisplayState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;

    fn window() -> DisplayWindow {
        DisplayWindow::new(Duration::from_millis(2000), Arc::new(EventLog::new()))
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn stale_generation_does_not_clear() {
        let now = Instant::now();
        let mut state = DisplayState::default();
        let first = state.apply_labels(labels(&["happy"]), now, Duration::from_secs(2));
        let second = state.apply_labels(labels(&["sad"]), now, Duration::from_secs(2));

        assert!(!state.expire(first));
        assert_eq!(state.labels(), ["sad"]);
        assert!(state.expire(second));
        assert!(state.labels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn updates_closer_than_decay_never_show_empty() {
        let window = window();
        for step in 0..10 {
            window.update_labels(labels(&["happy"]));
            for _ in 0..19 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                assert!(
                    !window.visible_labels().is_empty(),
                    "labels vanished during step {step}"
                );
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn updates_further_apart_than_decay_leave_a_gap() {
        let window = window();
        window.update_labels(labels(&["happy"]));
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(window.visible_labels().is_empty());

        window.update_labels(labels(&["angry"]));
        assert_eq!(window.visible_labels(), labels(&["angry"]));
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(window.visible_labels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn frame_survives_label_expiry() {
        let window = window();
        window.update_frame(vec![0xFF, 0xD8]);
        window.update_labels(labels(&["neutral"]));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(window.visible_labels().is_empty());
        assert_eq!(window.current_frame(), Some(vec![0xFF, 0xD8]));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_expiry() {
        let log = Arc::new(EventLog::new());
        let window = DisplayWindow::new(Duration::from_millis(2000), log.clone());
        window.update_labels(labels(&["fear"]));
        window.clear();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // Only the initial update was emitted; the cancelled expiry never fired.
        assert_eq!(log.named(DETECTION_LABELS).len(), 1);
        assert!(window.current_frame().is_none());
    }
}
