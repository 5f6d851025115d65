use crate::db::connection::DbPool;
use crate::db::models::{NewVote, Vote};
use sqlx::Error;
use uuid::Uuid;

/// Plain insert. Duplicate votes are rejected by the `UNIQUE(poll_id, user_id)`
/// constraint and come back as a database error for the caller to classify.
pub async fn insert_vote(pool: &DbPool, vote: NewVote) -> Result<Vote, Error> {
    sqlx::query_as::<_, Vote>(
        "INSERT INTO votes (id, poll_id, option_id, user_id) VALUES ($1, $2, $3, $4)
         RETURNING id, poll_id, option_id, user_id, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(vote.poll_id)
    .bind(vote.option_id)
    .bind(vote.user_id)
    .fetch_one(pool)
    .await
}

pub async fn user_has_voted(pool: &DbPool, poll_id: Uuid, user_id: Uuid) -> Result<bool, Error> {
    let row = sqlx::query("SELECT id FROM votes WHERE poll_id = $1 AND user_id = $2")
        .bind(poll_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}
