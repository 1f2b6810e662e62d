//! HTTP polling transport adapter
//!
//! Alternative deployment mode for environments that cannot hold a
//! persistent connection. The same room store sits underneath; instead of
//! pushing frames, the broker queues events per room and clients drain
//! them with GET polls. Without disconnect detection, rooms are expired by
//! inactivity.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use wavelink_core::{normalize_room_code, PollConfig, RoomError};

use crate::messages::CallType;
use crate::registry::generate_conn_id;
use crate::room::{RoomMember, RoomStore};

/// Shared state for the polling endpoints
#[derive(Clone)]
struct PollState {
    rooms: Arc<RoomStore>,
    leave_grace: Duration,
}

/// Build the polling API router. Browsers poll cross-origin, so CORS is
/// wide open, as the persistent-connection mode's handshake effectively is.
pub fn router(rooms: Arc<RoomStore>, config: &PollConfig) -> Router {
    let state = PollState {
        rooms,
        leave_grace: Duration::from_secs(config.leave_grace_secs),
    };

    Router::new()
        .route("/api/create-room", post(create_room))
        .route("/api/join-room", post(join_room))
        .route("/api/signal", post(signal))
        .route("/api/poll/:room_id", get(poll))
        .route("/api/leave-room", post(leave_room))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the polling API, with the room expiry sweep running alongside
pub async fn serve(
    addr: SocketAddr,
    rooms: Arc<RoomStore>,
    config: PollConfig,
) -> Result<(), std::io::Error> {
    let sweep_rooms = rooms.clone();
    let ttl = Duration::from_secs(config.room_ttl_secs);
    let sweep_period = Duration::from_secs(config.sweep_interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_period).await;
            sweep_rooms.purge_idle(ttl);
        }
    });

    let app = router(rooms, &config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Polling API listening on {}", addr);
    axum::serve(listener, app).await
}

fn room_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "type": "error", "error": "Room not found" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct CreateRoomBody {
    username: Option<String>,
}

async fn create_room(
    State(state): State<PollState>,
    Json(body): Json<CreateRoomBody>,
) -> Json<Value> {
    let member = RoomMember::new(generate_conn_id(), body.username);
    let creator = member.username.clone();
    let code = state.rooms.create(member);
    info!("Room {} created by {} (polling)", code, creator);
    Json(json!({ "type": "room_created", "roomId": code }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoomBody {
    room_id: String,
    username: Option<String>,
}

async fn join_room(State(state): State<PollState>, Json(body): Json<JoinRoomBody>) -> Response {
    let code = normalize_room_code(&body.room_id);
    let member = RoomMember::new(generate_conn_id(), body.username);
    let joiner = member.username.clone();

    match state.rooms.join(&code, member) {
        Ok(accept) => {
            state
                .rooms
                .push_pending(&code, json!({ "type": "peer_joined", "username": joiner }));
            Json(json!({
                "type": "room_joined",
                "roomId": accept.code,
                "callType": accept.call_type,
                "peerUsername": accept.peer_username,
            }))
            .into_response()
        }
        Err(RoomError::Full) => {
            (StatusCode::FORBIDDEN, Json(json!({ "type": "room_full" }))).into_response()
        }
        Err(RoomError::NotFound) => room_not_found(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalBody {
    room_id: String,
    signal: Value,
}

async fn signal(State(state): State<PollState>, Json(body): Json<SignalBody>) -> Response {
    let code = normalize_room_code(&body.room_id);

    // The queue carries no sender identity, so a call-type announcement is
    // recorded on the creator, whose value join replies report
    if body.signal.get("type").and_then(Value::as_str) == Some("call_type_selected") {
        if let Some(ct) = body
            .signal
            .get("callType")
            .and_then(|v| serde_json::from_value::<CallType>(v.clone()).ok())
        {
            state.rooms.set_creator_call_type(&code, ct);
        }
    }

    if state.rooms.push_pending(&code, body.signal) {
        Json(json!({ "success": true })).into_response()
    } else {
        room_not_found()
    }
}

async fn poll(State(state): State<PollState>, Path(room_id): Path<String>) -> Response {
    let code = normalize_room_code(&room_id);
    match state.rooms.drain_pending(&code) {
        Some(messages) => Json(json!({ "messages": messages })).into_response(),
        None => room_not_found(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRoomBody {
    room_id: String,
}

async fn leave_room(
    State(state): State<PollState>,
    Json(body): Json<LeaveRoomBody>,
) -> Json<Value> {
    let code = normalize_room_code(&body.room_id);

    if state
        .rooms
        .push_pending(&code, json!({ "type": "peer_left" }))
    {
        // Grace period lets the remaining peer drain the event before the
        // room disappears
        let rooms = state.rooms.clone();
        let grace = state.leave_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if rooms.remove(&code) {
                debug!("Room {} removed after leave grace period", code);
            }
        });
    }

    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(leave_grace: Duration) -> PollState {
        PollState {
            rooms: Arc::new(RoomStore::new()),
            leave_grace,
        }
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(state: &PollState, username: &str) -> String {
        let Json(reply) = create_room(
            State(state.clone()),
            Json(CreateRoomBody {
                username: Some(username.to_string()),
            }),
        )
        .await;
        assert_eq!(reply["type"], "room_created");
        reply["roomId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_join_signal_poll_cycle() {
        let state = state(Duration::from_secs(5));
        let code = create(&state, "alice").await;

        let resp = join_room(
            State(state.clone()),
            Json(JoinRoomBody {
                room_id: code.clone(),
                username: Some("bob".into()),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let reply = body_json(resp).await;
        assert_eq!(reply["type"], "room_joined");
        assert_eq!(reply["roomId"], code.as_str());
        assert_eq!(reply["callType"], Value::Null);
        assert_eq!(reply["peerUsername"], "alice");

        let resp = signal(
            State(state.clone()),
            Json(SignalBody {
                room_id: code.clone(),
                signal: json!({ "type": "offer", "sdp": { "type": "offer", "sdp": "v=0" } }),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // The queue drains in order: join event first, then the offer
        let resp = poll(State(state.clone()), Path(code.clone())).await;
        let reply = body_json(resp).await;
        let messages = reply["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "peer_joined");
        assert_eq!(messages[0]["username"], "bob");
        assert_eq!(messages[1]["type"], "offer");

        // Drained means drained
        let resp = poll(State(state), Path(code)).await;
        let reply = body_json(resp).await;
        assert!(reply["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_room_is_404() {
        let state = state(Duration::from_secs(5));

        let resp = join_room(
            State(state.clone()),
            Json(JoinRoomBody {
                room_id: "ZZZZZ".into(),
                username: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let reply = body_json(resp).await;
        assert_eq!(reply["error"], "Room not found");

        let resp = signal(
            State(state.clone()),
            Json(SignalBody {
                room_id: "ZZZZZ".into(),
                signal: json!({ "type": "offer" }),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = poll(State(state), Path("ZZZZZ".into())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_join_is_403() {
        let state = state(Duration::from_secs(5));
        let code = create(&state, "alice").await;

        for (name, expected) in [("bob", StatusCode::OK), ("carol", StatusCode::FORBIDDEN)] {
            let resp = join_room(
                State(state.clone()),
                Json(JoinRoomBody {
                    room_id: code.clone(),
                    username: Some(name.to_string()),
                }),
            )
            .await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_call_type_selected_updates_join_reply() {
        let state = state(Duration::from_secs(5));
        let code = create(&state, "alice").await;

        signal(
            State(state.clone()),
            Json(SignalBody {
                room_id: code.clone(),
                signal: json!({ "type": "call_type_selected", "callType": "video" }),
            }),
        )
        .await;

        let resp = join_room(
            State(state.clone()),
            Json(JoinRoomBody {
                room_id: code,
                username: Some("bob".into()),
            }),
        )
        .await;
        let reply = body_json(resp).await;
        assert_eq!(reply["callType"], "video");
    }

    #[tokio::test]
    async fn test_leave_queues_event_then_removes_room() {
        let state = state(Duration::ZERO);
        let code = create(&state, "alice").await;

        let Json(reply) = leave_room(
            State(state.clone()),
            Json(LeaveRoomBody {
                room_id: code.clone(),
            }),
        )
        .await;
        assert_eq!(reply["success"], true);

        // peer_left is queued before the room goes away
        let drained = state.rooms.drain_pending(&code);
        if let Some(messages) = drained {
            assert_eq!(messages.last().unwrap()["type"], "peer_left");
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.rooms.room_count(), 0);

        // Leaving a room that is already gone still succeeds
        let Json(reply) = leave_room(
            State(state),
            Json(LeaveRoomBody { room_id: code }),
        )
        .await;
        assert_eq!(reply["success"], true);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _ = router(Arc::new(RoomStore::new()), &PollConfig::default());
    }
}
