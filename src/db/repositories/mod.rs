pub mod poll_repository;
pub mod user_repository;
pub mod vote_repository;

pub use poll_repository::*;
pub use user_repository::*;
pub use vote_repository::*;
