//! Negotiation relay
//!
//! Forwards offers, answers and ICE candidates to the peer they name,
//! tagged with the sender so the recipient can reply. Holds no state and
//! never looks inside the payload. A target that is not connected drops
//! the message; peers own retry and timeout.

use crate::hub::{ConnectionId, Outbound};
use crate::protocol::{AnswerRequest, CandidateRequest, OfferRequest, ServerEvent};

/// A negotiation message addressed to one peer
#[derive(Debug, Clone)]
pub enum Negotiation {
    Offer(OfferRequest),
    Answer(AnswerRequest),
    IceCandidate(CandidateRequest),
}

impl Negotiation {
    /// Connection the message is addressed to
    pub fn target(&self) -> ConnectionId {
        match self {
            Negotiation::Offer(req) => req.target_viewer_id,
            Negotiation::Answer(req) => req.target_streamer_id,
            Negotiation::IceCandidate(req) => req.target_id,
        }
    }

    /// Outbound form, stamped with the sender
    pub fn into_event(self, from: ConnectionId) -> ServerEvent {
        match self {
            Negotiation::Offer(req) => ServerEvent::Offer {
                offer: req.offer,
                from_streamer_id: from,
            },
            Negotiation::Answer(req) => ServerEvent::Answer {
                answer: req.answer,
                from_viewer_id: from,
            },
            Negotiation::IceCandidate(req) => ServerEvent::IceCandidate {
                candidate: req.candidate,
                from,
            },
        }
    }
}

/// Deliver a negotiation message from `from` to its target
///
/// Returns whether the target was connected.
pub fn forward<O: Outbound + ?Sized>(outbound: &O, from: ConnectionId, message: Negotiation) -> bool {
    let target = message.target();
    let event = message.into_event(from);
    let delivered = outbound.send(target, &event);

    if delivered {
        tracing::debug!(from = %from, to = %target, kind = event.name(), "Relayed");
    } else {
        tracing::debug!(from = %from, to = %target, kind = event.name(), "Relay target not connected");
    }

    delivered
}
