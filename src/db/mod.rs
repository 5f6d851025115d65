pub mod connection;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use connection::*;
pub use repositories::*;
