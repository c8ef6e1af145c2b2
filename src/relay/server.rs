//! Relay Server
//!
//! Axum-based websocket endpoint plus small JSON inspection routes. Each
//! accepted socket becomes one registry connection with its own outbound
//! queue; a fan-out task drains the event bus into guild rooms. Join
//! requests pass through a [`GuildFilter`] so the browser-facing hop can be
//! pinned to a single guild while the bridge-facing hop stays open.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::events::EventBus;
use crate::relay::rooms::RoomRegistry;
use crate::relay::wire::Frame;

// == Guild Filter ==
/// Which guilds a relay endpoint accepts joins for.
#[derive(Debug, Clone)]
pub enum GuildFilter {
    /// Accept any guild. Used for the bridge-trusted bot-side hop.
    Any,
    /// Accept exactly one guild. Used for the browser-facing hop.
    One(String),
    /// Accept guilds from a fixed list.
    AnyOf(Vec<String>),
}

impl GuildFilter {
    /// Builds a filter from an allow-list, where an empty list means open.
    pub fn from_allow_list(guild_ids: Vec<String>) -> Self {
        if guild_ids.is_empty() {
            Self::Any
        } else {
            Self::AnyOf(guild_ids)
        }
    }

    pub fn allows(&self, guild_id: &str) -> bool {
        match self {
            Self::Any => true,
            Self::One(allowed) => allowed == guild_id,
            Self::AnyOf(allowed) => allowed.iter().any(|g| g == guild_id),
        }
    }
}

// == Relay State ==
#[derive(Clone)]
pub struct RelayState {
    pub rooms: Arc<RoomRegistry>,
    pub filter: GuildFilter,
}

impl RelayState {
    pub fn new(rooms: Arc<RoomRegistry>, filter: GuildFilter) -> Self {
        Self { rooms, filter }
    }
}

// == Router ==
/// Builds the relay router.
///
/// # Endpoints
/// - `GET /ws` - Websocket upgrade for relay clients
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Connection and room counts
/// - `GET /rooms/:guild_id` - Subscriber count for one guild room
pub fn create_router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/rooms/:guild_id", get(room_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(State(state): State<RelayState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn stats_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "connections": state.rooms.connection_count(),
        "rooms": state.rooms.room_count(),
    }))
}

async fn room_handler(
    State(state): State<RelayState>,
    Path(guild_id): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    if !state.filter.allows(&guild_id) {
        return Err(CoreError::GuildNotAllowed(guild_id));
    }
    Ok(Json(json!({
        "guildId": guild_id,
        "subscribers": state.rooms.subscriber_count(&guild_id),
    })))
}

// == Socket Lifecycle ==
/// Runs one relay connection until the client disconnects or the socket
/// drops. Frames the client is not allowed to send are logged and ignored;
/// a malformed frame never closes the connection.
async fn handle_socket(socket: WebSocket, state: RelayState) {
    let conn_id = Uuid::new_v4();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
    state.rooms.add_connection(conn_id, out_tx.clone());
    info!(%conn_id, "relay client connected");

    let (mut sink, mut stream) = socket.split();

    // Writer half: drains the connection's outbound queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match frame.encode() {
                Ok(text) => text,
                Err(encode_error) => {
                    warn!(%encode_error, "dropping unencodable frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(_) => break,
        };

        match message {
            Message::Text(text) => match Frame::decode(&text) {
                Ok(Frame::JoinGuild { guild_id }) => {
                    if state.filter.allows(&guild_id) {
                        state.rooms.join(&guild_id, conn_id);
                        let _ = out_tx.send(Frame::Joined { guild_id });
                    } else {
                        warn!(%conn_id, %guild_id, "join denied by guild filter");
                    }
                }
                Ok(Frame::Disconnect) => {
                    debug!(%conn_id, "client requested disconnect");
                    break;
                }
                Ok(frame) => {
                    debug!(%conn_id, ?frame, "ignoring server-only frame from client");
                }
                Err(decode_error) => {
                    warn!(%conn_id, %decode_error, "dropping malformed frame");
                }
            },
            Message::Close(_) => break,
            // Pings are answered by axum itself.
            _ => {}
        }
    }

    state.rooms.remove_connection(conn_id);
    drop(out_tx);
    writer.abort();
    info!(%conn_id, "relay client disconnected");
}

// == Event Fan-Out ==
/// Subscribes to the event bus and delivers each event into the room of
/// its guild. Lag means a burst outran the channel buffer; those events
/// are dropped, never reordered.
pub fn spawn_fanout(bus: &EventBus, rooms: Arc<RoomRegistry>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let guild_id = event.guild_id.clone();
                    rooms.deliver(&guild_id, &Frame::RealtimeEvent { event });
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "fan-out lagged behind the event bus");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RealtimeEvent;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<RoomRegistry>) {
        let rooms = Arc::new(RoomRegistry::new());
        let state = RelayState::new(rooms.clone(), GuildFilter::Any);
        (create_router(state), rooms)
    }

    #[test]
    fn test_filter_any_allows_everything() {
        assert!(GuildFilter::Any.allows("g1"));
        assert!(GuildFilter::from_allow_list(Vec::new()).allows("g1"));
    }

    #[test]
    fn test_filter_one_pins_a_single_guild() {
        let filter = GuildFilter::One("g1".to_string());
        assert!(filter.allows("g1"));
        assert!(!filter.allows("g2"));
    }

    #[test]
    fn test_filter_allow_list() {
        let filter = GuildFilter::from_allow_list(vec!["g1".to_string(), "g2".to_string()]);
        assert!(filter.allows("g2"));
        assert!(!filter.allows("g3"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _rooms) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_counts() {
        let (app, rooms) = create_test_app();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        rooms.add_connection(conn, tx);
        rooms.join("g1", conn);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["connections"], 1);
        assert_eq!(value["rooms"], 1);
    }

    #[tokio::test]
    async fn test_room_endpoint_reports_subscribers() {
        let (app, rooms) = create_test_app();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        rooms.add_connection(conn, tx);
        rooms.join("g7", conn);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rooms/g7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["guildId"], "g7");
        assert_eq!(value["subscribers"], 1);
    }

    #[tokio::test]
    async fn test_room_endpoint_rejects_filtered_guild() {
        let rooms = Arc::new(RoomRegistry::new());
        let state = RelayState::new(rooms, GuildFilter::One("g1".to_string()));
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rooms/g2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_fanout_scopes_events_to_their_room() {
        let bus = EventBus::new(16);
        let rooms = Arc::new(RoomRegistry::new());
        let handle = spawn_fanout(&bus, rooms.clone());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        rooms.add_connection(a, tx1);
        rooms.add_connection(b, tx2);
        rooms.join("g1", a);
        rooms.join("g2", b);

        bus.publish(RealtimeEvent::now("poll:ended", "g1", json!({ "id": "p1" })));
        // Let the fan-out task run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        match rx1.try_recv().unwrap() {
            Frame::RealtimeEvent { event } => assert_eq!(event.guild_id, "g1"),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert!(rx2.try_recv().is_err(), "event must stay in its room");

        handle.abort();
    }
}
