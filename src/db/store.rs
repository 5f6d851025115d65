use crate::db::connection::DbPool;
use crate::db::models::{NewVote, Poll, PollOption, User, Vote};
use crate::db::repositories;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Foreign keys on `votes`, named in the schema.
pub const VOTE_POLL_FK: &str = "votes_poll_id_fkey";
pub const VOTE_OPTION_FK: &str = "votes_option_id_fkey";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("foreign key constraint {} violated", .constraint.as_deref().unwrap_or("<unnamed>"))]
    ForeignKeyViolation { constraint: Option<String> },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Sorts constraint violations out of a raw sqlx error.
    pub fn classify(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::ForeignKeyViolation {
                    constraint: db_err.constraint().map(String::from),
                }
            }
            _ => StoreError::Database(error),
        }
    }
}

/// Storage operations the vote-casting path depends on.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_poll_by_id(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError>;

    async fn find_options_by_poll_id(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError>;

    async fn has_voted(&self, poll_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Must return [`StoreError::UniqueViolation`] when the voter already has
    /// a vote on the poll, however the race between callers played out.
    async fn create_vote(&self, vote: NewVote) -> Result<Vote, StoreError>;
}

/// Lookups behind the user profile endpoint.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn count_polls_by_creator(&self, creator_id: Uuid) -> Result<i64, StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteStore for PgStore {
    async fn find_poll_by_id(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        Ok(repositories::get_poll(&self.pool, poll_id).await?)
    }

    async fn find_options_by_poll_id(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError> {
        Ok(repositories::get_poll_options(&self.pool, poll_id).await?)
    }

    async fn has_voted(&self, poll_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(repositories::user_has_voted(&self.pool, poll_id, user_id).await?)
    }

    async fn create_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        repositories::insert_vote(&self.pool, vote)
            .await
            .map_err(StoreError::classify)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(repositories::find_user_by_id(&self.pool, user_id).await?)
    }

    async fn count_polls_by_creator(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        Ok(repositories::count_polls_by_creator(&self.pool, creator_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_generic() {
        let classified = StoreError::classify(sqlx::Error::RowNotFound);
        assert!(matches!(
            classified,
            StoreError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[test]
    fn pool_timeout_is_not_mistaken_for_a_conflict() {
        let classified = StoreError::classify(sqlx::Error::PoolTimedOut);
        assert!(!matches!(classified, StoreError::UniqueViolation));
    }
}
