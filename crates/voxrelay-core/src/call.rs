//! Hosted voice-agent call lifecycle as an explicit state machine.
//!
//! The vendor's web client reports a fixed set of lifecycle events. The UI
//! mirrors them into a [`CallSession`]; speaking flags only exist while a call
//! is [`CallState::Active`], so a party can never be "speaking" on an ended call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current phase of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Connecting,
    Active {
        agent_speaking: bool,
        user_speaking: bool,
    },
    Ended,
    Errored {
        message: String,
    },
}

impl CallState {
    pub fn name(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Connecting => "connecting",
            CallState::Active { .. } => "active",
            CallState::Ended => "ended",
            CallState::Errored { .. } => "errored",
        }
    }

    /// Whether a new call may be requested from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            CallState::Idle | CallState::Ended | CallState::Errored { .. }
        )
    }
}

/// Lifecycle event emitted by the vendor web client (plus the local
/// `call_requested` trigger sent when the user presses "start").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    CallRequested,
    CallStarted,
    CallEnded,
    AgentStartTalking,
    AgentStopTalking,
    UserStartTalking,
    UserStopTalking,
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl CallEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CallEvent::CallRequested => "call_requested",
            CallEvent::CallStarted => "call_started",
            CallEvent::CallEnded => "call_ended",
            CallEvent::AgentStartTalking => "agent_start_talking",
            CallEvent::AgentStopTalking => "agent_stop_talking",
            CallEvent::UserStartTalking => "user_start_talking",
            CallEvent::UserStopTalking => "user_stop_talking",
            CallEvent::Update { .. } => "update",
            CallEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event '{event}' is not valid in state '{state}'")]
pub struct IllegalTransition {
    pub state: &'static str,
    pub event: &'static str,
}

/// Compute the next state, or reject the event.
pub fn transition(state: &CallState, event: &CallEvent) -> Result<CallState, IllegalTransition> {
    use CallEvent as E;
    use CallState as S;

    let next = match (state, event) {
        (s, E::CallRequested) if s.can_start() => S::Connecting,
        (S::Connecting, E::CallStarted) => S::Active {
            agent_speaking: false,
            user_speaking: false,
        },
        (S::Connecting | S::Active { .. }, E::CallEnded) => S::Ended,
        (S::Active { user_speaking, .. }, E::AgentStartTalking) => S::Active {
            agent_speaking: true,
            user_speaking: *user_speaking,
        },
        (S::Active { user_speaking, .. }, E::AgentStopTalking) => S::Active {
            agent_speaking: false,
            user_speaking: *user_speaking,
        },
        (S::Active { agent_speaking, .. }, E::UserStartTalking) => S::Active {
            agent_speaking: *agent_speaking,
            user_speaking: true,
        },
        (S::Active { agent_speaking, .. }, E::UserStopTalking) => S::Active {
            agent_speaking: *agent_speaking,
            user_speaking: false,
        },
        (s @ S::Active { .. }, E::Update { .. }) => s.clone(),
        (S::Idle | S::Connecting | S::Active { .. }, E::Error { message }) => S::Errored {
            message: message.clone(),
        },
        _ => {
            return Err(IllegalTransition {
                state: state.name(),
                event: event.name(),
            });
        }
    };

    Ok(next)
}

/// A single call as seen by the UI.
#[derive(Debug, Clone)]
pub struct CallSession {
    state: CallState,
    transcript: Option<String>,
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSession {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            transcript: None,
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Latest transcript delivered by an `update` event in the current call.
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn agent_speaking(&self) -> bool {
        matches!(
            self.state,
            CallState::Active {
                agent_speaking: true,
                ..
            }
        )
    }

    pub fn user_speaking(&self) -> bool {
        matches!(
            self.state,
            CallState::Active {
                user_speaking: true,
                ..
            }
        )
    }

    /// Apply an event. Illegal events leave the session untouched.
    pub fn apply(&mut self, event: CallEvent) -> Result<&CallState, IllegalTransition> {
        let next = transition(&self.state, &event)?;
        match event {
            CallEvent::CallRequested => self.transcript = None,
            CallEvent::Update {
                transcript: Some(text),
            } => self.transcript = Some(text),
            _ => {}
        }
        self.state = next;
        Ok(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_session() -> CallSession {
        let mut session = CallSession::new();
        session.apply(CallEvent::CallRequested).unwrap();
        session.apply(CallEvent::CallStarted).unwrap();
        session
    }

    #[test]
    fn test_happy_path() {
        let mut session = CallSession::new();
        assert_eq!(session.state(), &CallState::Idle);

        session.apply(CallEvent::CallRequested).unwrap();
        assert_eq!(session.state(), &CallState::Connecting);

        session.apply(CallEvent::CallStarted).unwrap();
        session.apply(CallEvent::AgentStartTalking).unwrap();
        assert!(session.agent_speaking());
        assert!(!session.user_speaking());

        session.apply(CallEvent::AgentStopTalking).unwrap();
        session.apply(CallEvent::UserStartTalking).unwrap();
        assert!(session.user_speaking());

        session.apply(CallEvent::CallEnded).unwrap();
        assert_eq!(session.state(), &CallState::Ended);
        assert!(!session.user_speaking());
    }

    #[test]
    fn test_speaking_rejected_after_end() {
        let mut session = active_session();
        session.apply(CallEvent::CallEnded).unwrap();

        let err = session.apply(CallEvent::AgentStartTalking).unwrap_err();
        assert_eq!(err.state, "ended");
        assert_eq!(err.event, "agent_start_talking");
        assert_eq!(session.state(), &CallState::Ended);
    }

    #[test]
    fn test_call_started_requires_connecting() {
        let mut session = CallSession::new();
        assert!(session.apply(CallEvent::CallStarted).is_err());
        assert_eq!(session.state(), &CallState::Idle);
    }

    #[test]
    fn test_double_request_rejected() {
        let mut session = CallSession::new();
        session.apply(CallEvent::CallRequested).unwrap();
        assert!(session.apply(CallEvent::CallRequested).is_err());
    }

    #[test]
    fn test_error_from_active_and_restart() {
        let mut session = active_session();
        session.apply(CallEvent::UserStartTalking).unwrap();
        session
            .apply(CallEvent::Error {
                message: "mic denied".into(),
            })
            .unwrap();
        assert_eq!(
            session.state(),
            &CallState::Errored {
                message: "mic denied".into()
            }
        );
        assert!(!session.user_speaking());

        // Errors are terminal for the call, but a new call may be requested.
        assert!(session.apply(CallEvent::CallEnded).is_err());
        session.apply(CallEvent::CallRequested).unwrap();
        assert_eq!(session.state(), &CallState::Connecting);
    }

    #[test]
    fn test_update_records_transcript() {
        let mut session = active_session();
        session
            .apply(CallEvent::Update {
                transcript: Some("agent: Hallo".into()),
            })
            .unwrap();
        assert_eq!(session.transcript(), Some("agent: Hallo"));

        session.apply(CallEvent::CallEnded).unwrap();
        assert_eq!(session.transcript(), Some("agent: Hallo"));

        session.apply(CallEvent::CallRequested).unwrap();
        assert_eq!(session.transcript(), None);
    }

    #[test]
    fn test_update_outside_call_rejected() {
        let mut session = CallSession::new();
        assert!(
            session
                .apply(CallEvent::Update { transcript: None })
                .is_err()
        );
    }

    #[test]
    fn test_event_wire_format() {
        let event: CallEvent = serde_json::from_str(r#"{"event":"agent_start_talking"}"#).unwrap();
        assert_eq!(event, CallEvent::AgentStartTalking);

        let event: CallEvent = serde_json::from_str(r#"{"event":"error"}"#).unwrap();
        assert_eq!(event, CallEvent::Error { message: String::new() });

        assert!(serde_json::from_str::<CallEvent>(r#"{"event":"dance"}"#).is_err());
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(CallState::Active {
            agent_speaking: true,
            user_speaking: false,
        })
        .unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["agent_speaking"], true);
    }
}
