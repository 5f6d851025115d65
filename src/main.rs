use crate::config::Config;
use crate::startup::{AppState, build_router, spawn_pool_health_check};
use std::net::SocketAddr;

#[macro_use]
extern crate tracing;

mod auth;
mod config;
mod db;
mod error;
mod polls;
mod sse;
mod startup;
mod users;
mod votes;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::load().expect("Failed to load config");

    let db = db::init_db(&config.database_url)
        .await
        .expect("Unable to connect to the database");
    spawn_pool_health_check(db.clone());

    let port = config.port;
    let app_state = AppState::new(db, config);
    let broker = app_state.broker.clone();
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("shutting down, closing live streams");
            // Ends every live session so their streams complete and the
            // server can drain.
            broker.shutdown();
        })
        .await
        .expect("Server error");
}
