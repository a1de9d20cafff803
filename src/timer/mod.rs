//! Named, cancelable timers with at most one outstanding firing per slot.
//!
//! Every delayed action in the app (reconnect, label expiry, auto-logout)
//! lives in a [`TimerSlot`] owned by the component that scheduled it, so
//! tearing the component down cancels the timer with it.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use log::{debug, error};
use tokio::{
    runtime::{Builder, Handle, Runtime},
    task::JoinHandle,
};

pub struct TimerSlot {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs `action` after `delay`, cancelling whatever this slot had pending.
    ///
    /// Uses the caller's tokio runtime when there is one, so paused test time
    /// applies; callers on plain threads get the shared timer runtime.
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(runtime) = timer_runtime() else {
            error!("timer '{}' dropped: no runtime available", self.name);
            return;
        };

        let mut guard = self.lock();
        if let Some(previous) = guard.take() {
            if !previous.is_finished() {
                debug!("timer '{}' rescheduled; dropping pending firing", self.name);
            }
            previous.abort();
        }

        *guard = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    /// Cancels the pending firing, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn timer_runtime() -> Option<Handle> {
    if let Ok(current) = Handle::try_current() {
        return Some(current);
    }

    static SHARED: OnceLock<Option<Runtime>> = OnceLock::new();
    SHARED
        .get_or_init(|| {
            Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("sentisense-timers")
                .enable_time()
                .build()
                .map_err(|err| error!("failed to start timer runtime: {err}"))
                .ok()
        })
        .as_ref()
        .map(|runtime| runtime.handle().clone())
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }
}
