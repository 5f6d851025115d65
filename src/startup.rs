use crate::auth::{self, TokenKeys};
use crate::config::Config;
use crate::db::connection::{DbPool, pool_stats};
use crate::db::store::{PgStore, UserStore, VoteStore};
use crate::polls;
use crate::sse::{self, broker::BrokerConfig, broker::EventBroker};
use crate::users;
use crate::votes::{self, VoteCastingEngine};
use axum::{
    Json, Router,
    extract::Extension,
    http::{
        HeaderValue, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub engine: VoteCastingEngine,
    pub broker: EventBroker,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenKeys>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(db.clone()));
        Self::with_store(db, store, config)
    }

    /// Starts the event broker on the current runtime.
    pub fn with_store<S>(db: DbPool, store: Arc<S>, config: Config) -> Self
    where
        S: VoteStore + UserStore + 'static,
    {
        let broker = EventBroker::start(BrokerConfig {
            subscriber_buffer: config.subscriber_buffer,
            max_consecutive_drops: config.max_consecutive_drops,
        });
        let tokens = Arc::new(TokenKeys::new(&config.jwt_secret, config.access_token_ttl));

        AppState {
            db,
            engine: VoteCastingEngine::new(store.clone()),
            broker,
            users: store,
            tokens,
            config: Arc::new(config),
        }
    }
}

pub fn spawn_pool_health_check(db: DbPool) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match db.acquire().await {
                Ok(conn) => {
                    drop(conn);
                    debug!("{}", pool_stats(&db));
                }
                Err(e) => {
                    error!("Database connection health check failed: {}", e);
                }
            }
        }
    });
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {origin}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION])
}

pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route(
            "/api/v1/polls",
            get(polls::list_polls).post(polls::create_poll),
        )
        .route(
            "/api/v1/polls/:poll_id",
            get(polls::get_poll).delete(polls::delete_poll),
        )
        .route("/api/v1/users/:user_id", get(users::get_user))
        .route("/api/v1/vote", post(votes::cast_vote))
        .route("/api/v1/sse", get(sse::live_stream))
        .layer(Extension(app_state))
        .layer(cors)
        .fallback(handler_404)
}

async fn health(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    let subscribers = app_state.broker.subscriber_count().await;

    Json(json!({
        "status": "ok",
        "subscribers": subscribers,
    }))
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
