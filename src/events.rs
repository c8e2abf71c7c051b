use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Serialize;
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::live::SyncState;
use crate::models::{Board, Mill, ServicePartner, User};
use crate::AppState;

/// Change notifications pushed to connected clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    BoardUpserted(Board),
    BoardDeleted { id: Uuid },
    MillUpserted(Mill),
    MillDeleted { id: Uuid },
    PartnerUpserted(ServicePartner),
    PartnerDeleted { id: Uuid },
    UserUpserted(User),
    UserDeleted { id: Uuid },
    /// Live store moved between Connecting, Live and Stale
    SyncStateChanged(SyncState),
    /// Heartbeat
    Ping,
}

/// Fan-out of committed changes
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Publish to every subscriber; dropped when nobody listens
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

/// SSE stream of change events
pub async fn stream_handler(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            match serde_json::to_string(&event) {
                                Ok(json) => yield Ok(Event::default().data(json)),
                                Err(e) => {
                                    tracing::error!("Failed to serialize change event: {}", e);
                                    continue;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Client should refetch; the stream carries on
                            tracing::warn!("SSE client lagged, missed {} events", n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    match serde_json::to_string(&ChangeEvent::Ping) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => {
                            tracing::error!("Failed to serialize ping event: {}", e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        let id = Uuid::new_v4();

        hub.publish(ChangeEvent::BoardDeleted { id });

        match rx.recv().await.unwrap() {
            ChangeEvent::BoardDeleted { id: got } => assert_eq!(got, id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        EventHub::new().publish(ChangeEvent::Ping);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(ChangeEvent::MillDeleted { id: Uuid::nil() }).unwrap();
        assert_eq!(json["type"], "MillDeleted");
        assert_eq!(json["data"]["id"], Uuid::nil().to_string());

        let json = serde_json::to_value(ChangeEvent::Ping).unwrap();
        assert_eq!(json["type"], "Ping");
    }
}
