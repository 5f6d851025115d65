mod engine;
mod handler;

pub use engine::VoteCastingEngine;
pub use handler::cast_vote;
