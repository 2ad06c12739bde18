use std::time::Duration;
use tracing::debug;


#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum UpstreamState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything that can happen to the upstream connection. Connection failures, resets, read
///  errors and orderly closes all end up as [UpstreamEvent::ConnectFailed] or
///  [UpstreamEvent::StreamEnded] and are handled identically.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UpstreamEvent {
    Start,
    ConnectSucceeded,
    ConnectFailed(String),
    StreamEnded(String),
    ReconnectTimerFired,
}

/// Side effects requested by the state machine, to be executed by the driver
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UpstreamAction {
    Connect,
    ScheduleReconnect(Duration),
    CancelReconnect,
}

/// The upstream connection's lifecycle as a pure state machine: `Disconnected -> Connecting ->
///  Connected -> Disconnected` with a reconnect timer in between. There is no terminal state.
///
/// At most one reconnect timer is pending at any time: a failure that arrives while a timer is
///  pending does not schedule another one, and a successful connect cancels the pending timer.
#[derive(Debug)]
pub struct UpstreamStateMachine {
    state: UpstreamState,
    reconnect_pending: bool,
    reconnect_delay: Duration,
}

impl UpstreamStateMachine {
    pub fn new(reconnect_delay: Duration) -> UpstreamStateMachine {
        UpstreamStateMachine {
            state: UpstreamState::Disconnected,
            reconnect_pending: false,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> UpstreamState {
        self.state
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn on_event(&mut self, event: UpstreamEvent) -> Vec<UpstreamAction> {
        let old_state = self.state;
        let actions = match event {
            UpstreamEvent::Start => self.start_connecting(),
            UpstreamEvent::ReconnectTimerFired => {
                self.reconnect_pending = false;
                self.start_connecting()
            }
            UpstreamEvent::ConnectSucceeded => {
                self.state = UpstreamState::Connected;
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    vec![UpstreamAction::CancelReconnect]
                }
                else {
                    vec![]
                }
            }
            UpstreamEvent::ConnectFailed(_) | UpstreamEvent::StreamEnded(_) => {
                self.state = UpstreamState::Disconnected;
                if self.reconnect_pending {
                    vec![]
                }
                else {
                    self.reconnect_pending = true;
                    vec![UpstreamAction::ScheduleReconnect(self.reconnect_delay)]
                }
            }
        };

        if old_state != self.state {
            debug!("upstream state {:?} -> {:?}", old_state, self.state);
        }
        actions
    }

    fn start_connecting(&mut self) -> Vec<UpstreamAction> {
        if self.state != UpstreamState::Disconnected {
            // a connection (attempt) exists already
            return vec![];
        }
        self.state = UpstreamState::Connecting;
        vec![UpstreamAction::Connect]
    }
}
