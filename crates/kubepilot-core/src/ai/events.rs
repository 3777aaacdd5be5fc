//! Turn events and the listener contract
//!
//! The runtime pushes raw `RuntimeEvent`s into a bounded per-turn channel;
//! the orchestrator drains that channel in order and turns each event into a
//! `SessionEvent` delivered to the caller's `Listener`.

use tracing::{debug, error};

use super::runtime::RuntimeEvent;
use crate::error::AiError;

/// Receives the phases of one prompt turn.
///
/// Deltas are live feedback only; `response_complete` carries the
/// authoritative text.
pub trait Listener: Send + Sync {
    fn response_start(&self);
    fn response_delta(&self, text: &str);
    fn response_complete(&self, text: &str);
    fn response_failed(&self, error: &AiError);
    fn reasoning_delta(&self, text: &str);
    fn reasoning_complete(&self, text: &str);
    fn tool_start(&self, tool: &str);
    fn tool_complete(&self, tool: &str);
}

/// One phase of a turn as seen by a listener
#[derive(Debug)]
pub enum SessionEvent {
    ResponseStart,
    TextDelta(String),
    ResponseComplete(String),
    ResponseFailed(AiError),
    ReasoningDelta(String),
    ReasoningComplete(String),
    ToolStart(String),
    ToolComplete(String),
}

impl SessionEvent {
    /// Listener-facing form of a runtime event. Final messages, errors and
    /// idle markers belong to the send path, not the live channel.
    pub fn from_runtime(event: RuntimeEvent) -> Option<Self> {
        match event {
            RuntimeEvent::MessageDelta(text) => Some(Self::TextDelta(text)),
            RuntimeEvent::ReasoningDelta(text) => Some(Self::ReasoningDelta(text)),
            RuntimeEvent::Reasoning(text) => Some(Self::ReasoningComplete(text)),
            RuntimeEvent::ToolStart(tool) => {
                debug!(tool = %tool, "Tool start");
                Some(Self::ToolStart(tool))
            }
            RuntimeEvent::ToolComplete(tool) => {
                debug!(tool = %tool, "Tool complete");
                Some(Self::ToolComplete(tool))
            }
            RuntimeEvent::Error(message) => {
                error!("Session error event: {}", message);
                None
            }
            RuntimeEvent::Message(_) | RuntimeEvent::Idle => None,
        }
    }

    pub fn deliver(&self, listener: &dyn Listener) {
        match self {
            Self::ResponseStart => listener.response_start(),
            Self::TextDelta(text) => listener.response_delta(text),
            Self::ResponseComplete(text) => listener.response_complete(text),
            Self::ResponseFailed(err) => listener.response_failed(err),
            Self::ReasoningDelta(text) => listener.reasoning_delta(text),
            Self::ReasoningComplete(text) => listener.reasoning_complete(text),
            Self::ToolStart(tool) => listener.tool_start(tool),
            Self::ToolComplete(tool) => listener.tool_complete(tool),
        }
    }
}

/// Relay one runtime event to the listener, if it has a listener-facing form.
pub fn relay(event: RuntimeEvent, listener: &dyn Listener) {
    if let Some(event) = SessionEvent::from_runtime(event) {
        event.deliver(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::RecordingListener;

    #[test]
    fn test_relay_routes_live_events() {
        let listener = RecordingListener::default();
        for event in [
            RuntimeEvent::ReasoningDelta("hmm".into()),
            RuntimeEvent::Reasoning("hmm.".into()),
            RuntimeEvent::ToolStart("get_events".into()),
            RuntimeEvent::ToolComplete("get_events".into()),
            RuntimeEvent::MessageDelta("Pod ".into()),
            RuntimeEvent::Message("Pod is fine".into()),
            RuntimeEvent::Error("boom".into()),
            RuntimeEvent::Idle,
        ] {
            relay(event, &listener);
        }
        assert_eq!(
            listener.calls(),
            vec![
                "reasoning_delta:hmm",
                "reasoning_complete:hmm.",
                "tool_start:get_events",
                "tool_complete:get_events",
                "delta:Pod ",
            ]
        );
    }

    #[test]
    fn test_deliver_failure() {
        let listener = RecordingListener::default();
        SessionEvent::ResponseFailed(AiError::NotInitialized).deliver(&listener);
        assert_eq!(listener.calls(), vec!["failed:AI client not initialized"]);
    }
}
