use crate::db::models::Vote;
use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const VOTE_CAST: &str = "vote-cast";

/// Notification for one successfully recorded vote. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteCastEvent {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub voter_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl From<&Vote> for VoteCastEvent {
    fn from(vote: &Vote) -> Self {
        Self {
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            voter_id: vote.user_id,
            timestamp: vote.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: &'a T,
}

/// One unit written to a live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized `{"type": ..., "payload": ...}` envelope.
    Data(String),
    KeepAlive,
}

impl Frame {
    pub fn vote_cast(event: &VoteCastEvent) -> Result<Self, serde_json::Error> {
        let envelope = Envelope {
            kind: VOTE_CAST,
            payload: event,
        };
        Ok(Frame::Data(serde_json::to_string(&envelope)?))
    }
}

impl From<Frame> for Event {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Data(data) => Event::default().data(data),
            Frame::KeepAlive => Event::default().comment("keep-alive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn vote_cast_frame_wraps_payload_in_typed_envelope() {
        let event = VoteCastEvent {
            poll_id: Uuid::new_v4(),
            option_id: Uuid::new_v4(),
            voter_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };

        let Frame::Data(data) = Frame::vote_cast(&event).unwrap() else {
            panic!("expected a data frame");
        };
        let parsed: Value = serde_json::from_str(&data).unwrap();

        assert_eq!(parsed["type"], "vote-cast");
        assert_eq!(parsed["payload"]["poll_id"], event.poll_id.to_string());
        assert_eq!(parsed["payload"]["option_id"], event.option_id.to_string());
        assert_eq!(parsed["payload"]["voter_id"], event.voter_id.to_string());
        assert!(parsed["payload"]["timestamp"].is_string());
    }

    #[test]
    fn event_copies_vote_fields() {
        let vote = Vote {
            id: Uuid::new_v4(),
            poll_id: Uuid::new_v4(),
            option_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let event = VoteCastEvent::from(&vote);

        assert_eq!(event.poll_id, vote.poll_id);
        assert_eq!(event.option_id, vote.option_id);
        assert_eq!(event.voter_id, vote.user_id);
        assert_eq!(event.timestamp, vote.created_at);
    }
}
