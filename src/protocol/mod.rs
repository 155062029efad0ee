//! Wire protocol
//!
//! Typed envelopes for the JSON text frames exchanged with clients.

pub mod error;
pub mod message;
pub mod metadata;

pub use error::ProtocolError;
pub use message::{
    AnswerRequest, CandidateRequest, ChatRequest, ClientEvent, JoinStream, OfferRequest, Payload,
    ServerEvent, StartStream, StartStreamAck,
};
pub use metadata::Metadata;
