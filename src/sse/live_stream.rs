use crate::sse::broker::BrokerError;
use crate::sse::models::Frame;
use crate::sse::session::SubscriptionSession;
use crate::startup::AppState;
use axum::{
    extract::Extension,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Frames buffered between a session and the HTTP body.
const TRANSPORT_BUFFER: usize = 16;

/// Opens a live vote stream. The session runs on its own task and writes into
/// a channel drained by the response body; when the client goes away the body
/// is dropped, the session's next write fails and it unregisters.
pub async fn live_stream(
    Extension(app_state): Extension<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BrokerError> {
    let session =
        SubscriptionSession::open(&app_state.broker, app_state.config.heartbeat_interval).await?;

    let (transport, mut frames) = mpsc::channel::<Frame>(TRANSPORT_BUFFER);
    tokio::spawn(session.run(transport));

    let stream = async_stream::stream! {
        while let Some(frame) = frames.recv().await {
            yield Ok(Event::from(frame));
        }
    };

    Ok(Sse::new(stream))
}
