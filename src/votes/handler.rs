use crate::auth::AuthUser;
use crate::error::VoteError;
use crate::sse::models::VoteCastEvent;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub poll_id: Uuid,
    pub option_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub message: &'static str,
    pub vote: VoteCastEvent,
}

/// Cast a vote and hand the resulting event to the live broker.
pub async fn cast_vote(
    Extension(app_state): Extension<AppState>,
    AuthUser(voter_id): AuthUser,
    Json(payload): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, VoteError> {
    let event = app_state
        .engine
        .cast_vote(payload.poll_id, payload.option_id, voter_id)
        .await?;

    app_state.broker.publish(event.clone());

    Ok(Json(VoteResponse {
        message: "Voted successfully",
        vote: event,
    }))
}
