use crate::db::connection::DbPool;
use crate::db::models::{Poll, PollOption, PollOptionWithVotes};
use chrono::{DateTime, Utc};
use sqlx::Error;
use uuid::Uuid;

/// Inserts the poll and its options in one transaction, options keeping the
/// order they were given in.
pub async fn create_poll(
    pool: &DbPool,
    creator_id: Uuid,
    title: &str,
    expires_at: DateTime<Utc>,
    options: &[String],
) -> Result<(Poll, Vec<PollOption>), Error> {
    let mut tx = pool.begin().await?;

    let poll = sqlx::query_as::<_, Poll>(
        "INSERT INTO polls (id, creator_id, title, expires_at) VALUES ($1, $2, $3, $4)
         RETURNING id, creator_id, title, created_at, expires_at",
    )
    .bind(Uuid::new_v4())
    .bind(creator_id)
    .bind(title)
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(options.len());
    for (position, name) in options.iter().enumerate() {
        let option = sqlx::query_as::<_, PollOption>(
            "INSERT INTO poll_options (id, poll_id, name, position) VALUES ($1, $2, $3, $4)
             RETURNING id, poll_id, name, position",
        )
        .bind(Uuid::new_v4())
        .bind(poll.id)
        .bind(name)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        created.push(option);
    }

    tx.commit().await?;
    Ok((poll, created))
}

pub async fn get_poll(pool: &DbPool, poll_id: Uuid) -> Result<Option<Poll>, Error> {
    sqlx::query_as::<_, Poll>(
        "SELECT id, creator_id, title, created_at, expires_at FROM polls WHERE id = $1",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_all_polls(pool: &DbPool) -> Result<Vec<Poll>, Error> {
    sqlx::query_as::<_, Poll>(
        "SELECT id, creator_id, title, created_at, expires_at FROM polls ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_poll_options(pool: &DbPool, poll_id: Uuid) -> Result<Vec<PollOption>, Error> {
    sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_id, name, position FROM poll_options WHERE poll_id = $1 ORDER BY position",
    )
    .bind(poll_id)
    .fetch_all(pool)
    .await
}

pub async fn get_poll_options_with_votes(
    pool: &DbPool,
    poll_id: Uuid,
) -> Result<Vec<PollOptionWithVotes>, Error> {
    sqlx::query_as::<_, PollOptionWithVotes>(
        r#"
        SELECT o.id, o.poll_id, o.name, o.position, COUNT(v.id) AS votes
        FROM poll_options o
        LEFT JOIN votes v ON v.option_id = o.id
        WHERE o.poll_id = $1
        GROUP BY o.id, o.poll_id, o.name, o.position
        ORDER BY o.position
        "#,
    )
    .bind(poll_id)
    .fetch_all(pool)
    .await
}

pub async fn count_polls_by_creator(pool: &DbPool, creator_id: Uuid) -> Result<i64, Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM polls WHERE creator_id = $1")
        .bind(creator_id)
        .fetch_one(pool)
        .await
}

/// Returns `false` when no poll was removed.
pub async fn delete_poll(pool: &DbPool, poll_id: Uuid) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM polls WHERE id = $1")
        .bind(poll_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
