use serde::{Deserialize, Serialize};

/// Lifecycle of the streaming channel for one detection session.
///
/// Transitions are pure: each returns the next state plus the side effect
/// the driver has to perform, so the policy can be checked without a socket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChannelState {
    #[default]
    Idle,
    Connecting,
    Ready,
    Closing,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    OpenSocket,
    ScheduleReconnect,
    Teardown,
}

impl ChannelState {
    /// Frames may only be sent in this state.
    pub fn is_ready(self) -> bool {
        self == ChannelState::Ready
    }

    pub fn is_active(self) -> bool {
        !matches!(self, ChannelState::Idle | ChannelState::Closing)
    }

    pub fn start(self) -> (Self, Effect) {
        match self {
            ChannelState::Idle => (ChannelState::Connecting, Effect::OpenSocket),
            other => (other, Effect::None),
        }
    }

    pub fn opened(self) -> (Self, Effect) {
        match self {
            ChannelState::Connecting => (ChannelState::Ready, Effect::None),
            other => (other, Effect::None),
        }
    }

    /// The socket closed. `capturing` is the user's intent at that moment.
    pub fn closed(self, capturing: bool) -> (Self, Effect) {
        match self {
            ChannelState::Ready | ChannelState::Connecting if capturing => {
                (ChannelState::Reconnecting, Effect::ScheduleReconnect)
            }
            // A reconnect is already pending; never queue a second one.
            ChannelState::Reconnecting if capturing => (ChannelState::Reconnecting, Effect::None),
            ChannelState::Idle => (ChannelState::Idle, Effect::None),
            _ => (ChannelState::Closing, Effect::Teardown),
        }
    }

    pub fn reconnect_due(self) -> (Self, Effect) {
        match self {
            ChannelState::Reconnecting => (ChannelState::Connecting, Effect::OpenSocket),
            other => (other, Effect::None),
        }
    }

    /// Send or transport failure: fail-stop, no retry.
    pub fn failed(self) -> (Self, Effect) {
        match self {
            ChannelState::Idle => (ChannelState::Idle, Effect::None),
            _ => (ChannelState::Closing, Effect::Teardown),
        }
    }

    pub fn stop(self) -> (Self, Effect) {
        match self {
            ChannelState::Idle => (ChannelState::Idle, Effect::None),
            _ => (ChannelState::Closing, Effect::Teardown),
        }
    }

    pub fn torn_down(self) -> Self {
        ChannelState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_ready() {
        let (state, effect) = ChannelState::Idle.start();
        assert_eq!((state, effect), (ChannelState::Connecting, Effect::OpenSocket));
        assert!(!state.is_ready());

        let (state, effect) = state.opened();
        assert_eq!((state, effect), (ChannelState::Ready, Effect::None));
        assert!(state.is_ready());
    }

    #[test]
    fn two_quick_closes_schedule_one_reconnect() {
        let (state, first) = ChannelState::Ready.closed(true);
        let (state, second) = state.closed(true);
        assert_eq!(first, Effect::ScheduleReconnect);
        assert_eq!(second, Effect::None);
        assert_eq!(state, ChannelState::Reconnecting);
        assert!(!state.is_ready());
    }

    #[test]
    fn reconnect_reopens_socket() {
        let (state, effect) = ChannelState::Reconnecting.reconnect_due();
        assert_eq!((state, effect), (ChannelState::Connecting, Effect::OpenSocket));
        assert_eq!(ChannelState::Ready.reconnect_due().1, Effect::None);
    }

    #[test]
    fn close_without_intent_tears_down() {
        let (state, effect) = ChannelState::Ready.closed(false);
        assert_eq!((state, effect), (ChannelState::Closing, Effect::Teardown));
    }

    #[test]
    fn failure_is_fail_stop_from_any_active_state() {
        for state in [
            ChannelState::Connecting,
            ChannelState::Ready,
            ChannelState::Reconnecting,
        ] {
            assert_eq!(state.failed(), (ChannelState::Closing, Effect::Teardown));
        }
        assert_eq!(ChannelState::Idle.failed(), (ChannelState::Idle, Effect::None));
    }

    #[test]
    fn stop_is_idempotent() {
        let (state, effect) = ChannelState::Reconnecting.stop();
        assert_eq!(effect, Effect::Teardown);
        let state = state.torn_down();
        assert_eq!(state.stop(), (ChannelState::Idle, Effect::None));
    }
}
