use crate::db::models::NewVote;
use crate::db::store::VoteStore;
use crate::error::VoteError;
use crate::sse::models::VoteCastEvent;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Validates and records single votes. It knows nothing about live
/// subscribers; publishing the returned event is the caller's job.
#[derive(Clone)]
pub struct VoteCastingEngine {
    store: Arc<dyn VoteStore>,
}

impl VoteCastingEngine {
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self { store }
    }

    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter_id: Uuid,
    ) -> Result<VoteCastEvent, VoteError> {
        let result = self.try_cast(poll_id, option_id, voter_id).await;

        match &result {
            Ok(_) => debug!(%poll_id, %option_id, %voter_id, "vote recorded"),
            Err(VoteError::Storage(e)) => {
                error!(%poll_id, %voter_id, error = %e, "vote storage failed")
            }
            Err(e) => debug!(%poll_id, %voter_id, reason = %e, "vote rejected"),
        }

        result
    }

    async fn try_cast(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter_id: Uuid,
    ) -> Result<VoteCastEvent, VoteError> {
        let poll = self
            .store
            .find_poll_by_id(poll_id)
            .await?
            .ok_or(VoteError::PollNotFound)?;

        if poll.is_expired_at(Utc::now()) {
            return Err(VoteError::PollExpired);
        }

        let options = self.store.find_options_by_poll_id(poll_id).await?;
        if !options.iter().any(|option| option.id == option_id) {
            return Err(VoteError::OptionNotFound);
        }

        // Cheap early answer; the insert below is what actually settles races.
        if self.store.has_voted(poll_id, voter_id).await? {
            return Err(VoteError::DuplicateVote);
        }

        let vote = self
            .store
            .create_vote(NewVote {
                poll_id,
                option_id,
                user_id: voter_id,
            })
            .await?;

        Ok(VoteCastEvent::from(&vote))
    }
}
