use crate::auth::AuthUser;
use crate::db;
use crate::db::models::{Poll, PollOption, PollOptionWithVotes};
use crate::error::PollError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 15;

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,
    pub options: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub id: Uuid,
    pub title: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub options: Vec<PollOptionResponse>,
}

#[derive(Debug, Serialize)]
pub struct PollOptionResponse {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PollViewResponse {
    pub id: Uuid,
    pub title: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub options: Vec<PollOptionWithVotes>,
    pub total_votes: i64,
    pub voted: bool,
}

impl PollResponse {
    fn new(poll: Poll, options: Vec<PollOption>) -> Self {
        Self {
            id: poll.id,
            title: poll.title,
            creator_id: poll.creator_id,
            created_at: poll.created_at,
            expires_at: poll.expires_at,
            options: options
                .into_iter()
                .map(|o| PollOptionResponse {
                    id: o.id,
                    name: o.name,
                })
                .collect(),
        }
    }
}

/// Trims title and options and checks them against the poll rules.
fn validate_new_poll(
    payload: CreatePollRequest,
    now: DateTime<Utc>,
) -> Result<(String, Vec<String>, DateTime<Utc>), PollError> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(PollError::InvalidRequest("title is required"));
    }

    let options: Vec<String> = payload
        .options
        .iter()
        .map(|o| o.trim().to_string())
        .collect();
    if options.iter().any(String::is_empty) {
        return Err(PollError::InvalidRequest("options must not be empty"));
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(PollError::InvalidRequest("a poll needs between 2 and 15 options"));
    }

    if payload.expires_at <= now {
        return Err(PollError::InvalidRequest("expires_at must be in the future"));
    }

    Ok((title, options, payload.expires_at))
}

/// Create a new poll (authenticated users only)
pub async fn create_poll(
    Extension(app_state): Extension<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, PollError> {
    let (title, options, expires_at) = validate_new_poll(payload, Utc::now())?;

    let (poll, options) =
        db::create_poll(&app_state.db, user_id, &title, expires_at, &options).await?;
    info!(poll_id = %poll.id, creator_id = %user_id, "poll created");

    Ok((StatusCode::CREATED, Json(PollResponse::new(poll, options))))
}

/// All polls, newest first
pub async fn list_polls(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, PollError> {
    let polls = db::get_all_polls(&app_state.db).await?;

    let mut responses = Vec::with_capacity(polls.len());
    for poll in polls {
        let options = db::get_poll_options(&app_state.db, poll.id).await?;
        responses.push(PollResponse::new(poll, options));
    }

    Ok(Json(responses))
}

/// A poll with its current vote counts
pub async fn get_poll(
    Extension(app_state): Extension<AppState>,
    viewer: Option<AuthUser>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let poll = db::get_poll(&app_state.db, poll_id)
        .await?
        .ok_or(PollError::PollNotFound)?;

    let options = db::get_poll_options_with_votes(&app_state.db, poll_id).await?;
    let total_votes = options.iter().map(|o| o.votes).sum::<i64>();

    let voted = match viewer {
        Some(AuthUser(user_id)) => db::user_has_voted(&app_state.db, poll_id, user_id).await?,
        None => false,
    };

    let expired = poll.is_expired_at(Utc::now());

    Ok(Json(PollViewResponse {
        id: poll.id,
        title: poll.title,
        creator_id: poll.creator_id,
        created_at: poll.created_at,
        expired,
        expires_at: poll.expires_at,
        options,
        total_votes,
        voted,
    }))
}

/// Delete a poll (only its creator)
pub async fn delete_poll(
    Extension(app_state): Extension<AppState>,
    AuthUser(user_id): AuthUser,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let poll = db::get_poll(&app_state.db, poll_id)
        .await?
        .ok_or(PollError::PollNotFound)?;

    if poll.creator_id != user_id {
        return Err(PollError::Forbidden);
    }

    if !db::delete_poll(&app_state.db, poll_id).await? {
        return Err(PollError::PollNotFound);
    }
    info!(%poll_id, "poll deleted");

    Ok(Json(json!({ "message": "Poll deleted successfully" })))
}
