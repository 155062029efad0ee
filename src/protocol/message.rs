//! Signaling messages
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": <payload>}`.
//! The envelope is typed; negotiation payloads (SDP offers and answers, ICE
//! candidates) and chat bodies stay as [`RawValue`] so they are relayed
//! byte-for-byte without being parsed.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::Result;
use crate::hub::ConnectionId;
use crate::registry::{StreamKey, StreamSummary};

use super::error::ProtocolError;
use super::metadata::{self, Metadata};

/// Opaque JSON blob forwarded without inspection
pub type Payload = Box<RawValue>;

/// Request to announce a stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartStream {
    #[serde(default, deserialize_with = "metadata::null_as_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStream {
    pub stream_key: StreamKey,
}

/// Streamer -> viewer session description
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub offer: Payload,
    pub target_viewer_id: ConnectionId,
}

/// Viewer -> streamer session description
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub answer: Payload,
    pub target_streamer_id: ConnectionId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub candidate: Payload,
    pub target_id: ConnectionId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub stream_key: StreamKey,
    pub user: Payload,
    pub text: Payload,
}

/// Inbound event from a client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    GetStreams,
    StartStream(StartStream),
    StopStream,
    JoinStream(JoinStream),
    LeaveStream,
    Offer(OfferRequest),
    Answer(AnswerRequest),
    IceCandidate(CandidateRequest),
    ChatMessage(ChatRequest),
}

#[derive(Deserialize)]
struct Envelope<'a> {
    event: String,
    #[serde(borrow, default)]
    data: Option<&'a RawValue>,
}

impl ClientEvent {
    /// Decode one text frame
    pub fn decode(text: &str) -> std::result::Result<Self, ProtocolError> {
        let envelope: Envelope<'_> = serde_json::from_str(text)?;
        let data = envelope.data;

        let event = match envelope.event.as_str() {
            "get-streams" => ClientEvent::GetStreams,
            "start-stream" => match data {
                Some(raw) => ClientEvent::StartStream(serde_json::from_str(raw.get())?),
                None => ClientEvent::StartStream(StartStream::default()),
            },
            "stop-stream" => ClientEvent::StopStream,
            "join-stream" => ClientEvent::JoinStream(payload(data, "join-stream")?),
            "leave-stream" => ClientEvent::LeaveStream,
            "offer" => ClientEvent::Offer(payload(data, "offer")?),
            "answer" => ClientEvent::Answer(payload(data, "answer")?),
            "ice-candidate" => ClientEvent::IceCandidate(payload(data, "ice-candidate")?),
            "chat-message" => ClientEvent::ChatMessage(payload(data, "chat-message")?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetStreams => "get-streams",
            ClientEvent::StartStream(_) => "start-stream",
            ClientEvent::StopStream => "stop-stream",
            ClientEvent::JoinStream(_) => "join-stream",
            ClientEvent::LeaveStream => "leave-stream",
            ClientEvent::Offer(_) => "offer",
            ClientEvent::Answer(_) => "answer",
            ClientEvent::IceCandidate(_) => "ice-candidate",
            ClientEvent::ChatMessage(_) => "chat-message",
        }
    }
}

fn payload<'de, T: Deserialize<'de>>(
    data: Option<&'de RawValue>,
    event: &'static str,
) -> std::result::Result<T, ProtocolError> {
    let raw = data.ok_or(ProtocolError::MissingData(event))?;
    Ok(serde_json::from_str(raw.get())?)
}

/// Acknowledgement of a start-stream request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<StreamKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StartStreamAck {
    pub fn accepted(key: StreamKey) -> Self {
        Self {
            success: true,
            stream_key: Some(key),
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stream_key: None,
            error: Some(reason.into()),
        }
    }
}

/// Outbound event to a client
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First frame on every connection, carrying its identity
    Connected { connection_id: ConnectionId },
    InitialStreams(Vec<StreamSummary>),
    StartStreamResult(StartStreamAck),
    StreamAdded { stream_key: StreamKey, metadata: Metadata },
    StreamRemoved { stream_key: StreamKey },
    StreamEnded { stream_key: StreamKey },
    ViewerJoined { viewer_id: ConnectionId },
    ViewerLeft { viewer_id: ConnectionId },
    ViewerCountUpdate { stream_key: StreamKey, count: usize },
    JoinFailed { stream_key: StreamKey, error: String },
    Offer { offer: Payload, from_streamer_id: ConnectionId },
    Answer { answer: Payload, from_viewer_id: ConnectionId },
    IceCandidate { candidate: Payload, from: ConnectionId },
    ChatMessage { stream_key: StreamKey, user: Payload, text: Payload },
    Error { message: String },
}

impl ServerEvent {
    /// Encode as a text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::InitialStreams(_) => "initial-streams",
            ServerEvent::StartStreamResult(_) => "start-stream-result",
            ServerEvent::StreamAdded { .. } => "stream-added",
            ServerEvent::StreamRemoved { .. } => "stream-removed",
            ServerEvent::StreamEnded { .. } => "stream-ended",
            ServerEvent::ViewerJoined { .. } => "viewer-joined",
            ServerEvent::ViewerLeft { .. } => "viewer-left",
            ServerEvent::ViewerCountUpdate { .. } => "viewer-count-update",
            ServerEvent::JoinFailed { .. } => "join-failed",
            ServerEvent::Offer { .. } => "offer",
            ServerEvent::Answer { .. } => "answer",
            ServerEvent::IceCandidate { .. } => "ice-candidate",
            ServerEvent::ChatMessage { .. } => "chat-message",
            ServerEvent::Error { .. } => "error",
        }
    }
}
