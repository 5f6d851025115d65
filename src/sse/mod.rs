pub mod broker;
pub mod models;

mod live_stream;
mod session;

pub use live_stream::live_stream;
