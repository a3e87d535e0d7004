//! `/events` route (§4.5.1): the session-lifecycle Server-Sent-Events
//! stream, unauthenticated, echoing the shared store's pub/sub channel.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};

use crate::error::AppError;
use crate::state::AppState;

pub async fn subscribe(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let stream = state.events.subscribe().await?;
    let sse_stream = stream.map(|payload| Ok(Event::default().data(payload)));
    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
