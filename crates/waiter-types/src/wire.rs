//! Websocket frames exchanged with the voice platform.

use serde::{Deserialize, Serialize};

use crate::{InteractionKind, TurnRequest, Utterance};

/// Frames received from the voice platform, tagged by `interaction_type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "interaction_type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Metadata about the call, sent once when `call_details` is enabled.
    CallDetails {
        #[serde(default)]
        call: Option<serde_json::Value>,
    },
    /// Keep-alive; must be echoed back with the same timestamp.
    PingPong { timestamp: i64 },
    /// Live transcript update that needs no answer.
    UpdateOnly {
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
    ResponseRequired {
        response_id: i64,
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
    ReminderRequired {
        response_id: i64,
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
}

impl InboundEvent {
    /// Converts a frame that asks for an answer into a [`TurnRequest`].
    ///
    /// Returns `None` for frames that are only acknowledged.
    pub fn into_turn_request(self) -> Option<TurnRequest> {
        match self {
            Self::ResponseRequired {
                response_id,
                transcript,
            } => Some(TurnRequest {
                response_id,
                kind: InteractionKind::ResponseRequired,
                transcript,
            }),
            Self::ReminderRequired {
                response_id,
                transcript,
            } => Some(TurnRequest {
                response_id,
                kind: InteractionKind::ReminderRequired,
                transcript,
            }),
            Self::CallDetails { .. } | Self::PingPong { .. } | Self::UpdateOnly { .. } => None,
        }
    }
}

/// A piece of agent speech for one response id.
///
/// A response lifecycle ends with exactly one event where `content_complete`
/// is set. Any event with `end_call` set is terminal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub response_id: i64,
    pub content: String,
    pub content_complete: bool,
    pub end_call: bool,
}

impl ResponseEvent {
    /// A non-terminal fragment of speech.
    pub fn partial(response_id: i64, content: impl Into<String>) -> Self {
        Self {
            response_id,
            content: content.into(),
            content_complete: false,
            end_call: false,
        }
    }

    /// The terminal event of a response.
    pub fn complete(response_id: i64, content: impl Into<String>) -> Self {
        Self {
            response_id,
            content: content.into(),
            content_complete: true,
            end_call: false,
        }
    }

    /// The terminal event of a response that also hangs up the call.
    pub fn hang_up(response_id: i64, content: impl Into<String>) -> Self {
        Self {
            response_id,
            content: content.into(),
            content_complete: true,
            end_call: true,
        }
    }
}

/// Connection options announced to the platform right after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    pub auto_reconnect: bool,
    pub call_details: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            call_details: true,
        }
    }
}

/// Frames sent to the voice platform, tagged by `response_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Config {
        config: CallConfig,
        response_id: i64,
    },
    Response(ResponseEvent),
    PingPong {
        timestamp: i64,
    },
}

impl OutboundEvent {
    /// The one-time handshake frame.
    pub fn handshake(config: CallConfig) -> Self {
        Self::Config {
            config,
            response_id: 1,
        }
    }

    /// The response id this frame belongs to, if it is agent speech.
    pub fn origin(&self) -> Option<i64> {
        match self {
            Self::Response(event) => Some(event.response_id),
            Self::Config { .. } | Self::PingPong { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_interaction_type() {
        let ping: InboundEvent =
            serde_json::from_value(json!({"interaction_type": "ping_pong", "timestamp": 42}))
                .unwrap();
        assert_eq!(ping, InboundEvent::PingPong { timestamp: 42 });

        let details: InboundEvent = serde_json::from_value(
            json!({"interaction_type": "call_details", "call": {"call_id": "c1"}}),
        )
        .unwrap();
        assert!(matches!(details, InboundEvent::CallDetails { call: Some(_) }));

        let update: InboundEvent = serde_json::from_value(json!({
            "interaction_type": "update_only",
            "transcript": [{"role": "user", "content": "uh"}],
            "turntaking": "user_turn"
        }))
        .unwrap();
        assert!(update.into_turn_request().is_none());
    }

    #[test]
    fn response_and_reminder_become_turn_requests() {
        let required: InboundEvent = serde_json::from_value(json!({
            "interaction_type": "response_required",
            "response_id": 3,
            "transcript": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        let request = required.into_turn_request().unwrap();
        assert_eq!(request.response_id, 3);
        assert_eq!(request.kind, InteractionKind::ResponseRequired);
        assert_eq!(request.transcript.len(), 1);

        let reminder: InboundEvent = serde_json::from_value(json!({
            "interaction_type": "reminder_required",
            "response_id": 4
        }))
        .unwrap();
        let request = reminder.into_turn_request().unwrap();
        assert_eq!(request.kind, InteractionKind::ReminderRequired);
        assert!(request.transcript.is_empty());
    }

    #[test]
    fn outbound_frames_carry_response_type() {
        let handshake = serde_json::to_value(OutboundEvent::handshake(CallConfig::default()))
            .unwrap();
        assert_eq!(
            handshake,
            json!({
                "response_type": "config",
                "config": {"auto_reconnect": true, "call_details": true},
                "response_id": 1
            })
        );

        let response =
            serde_json::to_value(OutboundEvent::Response(ResponseEvent::hang_up(7, "Bye")))
                .unwrap();
        assert_eq!(
            response,
            json!({
                "response_type": "response",
                "response_id": 7,
                "content": "Bye",
                "content_complete": true,
                "end_call": true
            })
        );

        let pong = serde_json::to_value(OutboundEvent::PingPong { timestamp: 9 }).unwrap();
        assert_eq!(pong, json!({"response_type": "ping_pong", "timestamp": 9}));
    }

    #[test]
    fn only_speech_has_an_origin() {
        assert_eq!(
            OutboundEvent::Response(ResponseEvent::partial(5, "x")).origin(),
            Some(5)
        );
        assert_eq!(OutboundEvent::PingPong { timestamp: 1 }.origin(), None);
    }
}
