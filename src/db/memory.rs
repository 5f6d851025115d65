//! In-memory [`VoteStore`] used by tests in place of Postgres.

use crate::db::models::{NewVote, Poll, PollOption, User, Vote};
use crate::db::store::{StoreError, UserStore, VOTE_OPTION_FK, VoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    polls: HashMap<Uuid, Poll>,
    options: Vec<PollOption>,
    votes: Vec<Vote>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Makes `has_voted` always answer `false`, so only the insert-time
    /// uniqueness check stands between racing voters.
    skip_precheck: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_precheck() -> Self {
        Self {
            skip_precheck: true,
            ..Self::default()
        }
    }

    pub fn add_user(&self, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    pub fn add_poll(
        &self,
        expires_at: DateTime<Utc>,
        option_names: &[&str],
    ) -> (Poll, Vec<PollOption>) {
        self.add_poll_by(Uuid::new_v4(), expires_at, option_names)
    }

    pub fn add_poll_by(
        &self,
        creator_id: Uuid,
        expires_at: DateTime<Utc>,
        option_names: &[&str],
    ) -> (Poll, Vec<PollOption>) {
        let poll = Poll {
            id: Uuid::new_v4(),
            creator_id,
            title: "Test poll".to_string(),
            created_at: Utc::now() - Duration::minutes(5),
            expires_at,
        };
        let options: Vec<PollOption> = option_names
            .iter()
            .enumerate()
            .map(|(position, name)| PollOption {
                id: Uuid::new_v4(),
                poll_id: poll.id,
                name: name.to_string(),
                position: position as i32,
            })
            .collect();

        let mut tables = self.tables.lock().unwrap();
        tables.polls.insert(poll.id, poll.clone());
        tables.options.extend(options.iter().cloned());
        (poll, options)
    }

    pub fn vote_count(&self, poll_id: Uuid) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.votes.iter().filter(|v| v.poll_id == poll_id).count()
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn find_poll_by_id(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        Ok(self.tables.lock().unwrap().polls.get(&poll_id).cloned())
    }

    async fn find_options_by_poll_id(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .options
            .iter()
            .filter(|o| o.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn has_voted(&self, poll_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        if self.skip_precheck {
            return Ok(false);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .votes
            .iter()
            .any(|v| v.poll_id == poll_id && v.user_id == user_id))
    }

    async fn create_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .votes
            .iter()
            .any(|v| v.poll_id == vote.poll_id && v.user_id == vote.user_id)
        {
            return Err(StoreError::UniqueViolation);
        }
        if !tables.options.iter().any(|o| o.id == vote.option_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: Some(VOTE_OPTION_FK.to_string()),
            });
        }

        let stored = Vote {
            id: Uuid::new_v4(),
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            user_id: vote.user_id,
            created_at: Utc::now(),
        };
        tables.votes.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn count_polls_by_creator(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .polls
            .values()
            .filter(|p| p.creator_id == creator_id)
            .count() as i64)
    }
}
