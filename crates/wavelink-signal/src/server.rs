//! WebSocket signal server implementation

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info};

use crate::messages::SignalMessage;
use crate::registry::{generate_conn_id, ConnectionRegistry};
use crate::room::RoomStore;
use crate::router::Router;

/// Signal server state
pub struct SignalServer {
    rooms: Arc<RoomStore>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    heartbeat: Duration,
}

impl SignalServer {
    pub fn new(heartbeat: Duration) -> Self {
        let rooms = Arc::new(RoomStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(Router::new(rooms.clone(), registry.clone()));
        Self {
            rooms,
            registry,
            router,
            heartbeat,
        }
    }

    /// Start the signal server
    pub async fn serve(&self, addr: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signal server listening on {}", addr);

        // Liveness monitor: probe every period, terminate whoever missed
        // the previous one
        let registry = self.registry.clone();
        let period = self.heartbeat;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                let terminated = registry.sweep();
                if terminated > 0 {
                    info!("Terminating {} unresponsive connection(s)", terminated);
                }
            }
        });

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let rooms = self.rooms.clone();
            let registry = self.registry.clone();
            let router = self.router.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, rooms, registry, router).await
                {
                    debug!("Connection error from {}: {:?}", peer_addr, e);
                }
            });
        }
    }

    /// Get room count (for monitoring)
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Get connection count (for monitoring)
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

/// Handle a single connection (HTTP monitoring or WebSocket)
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    rooms: Arc<RoomStore>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Peek at the request line to pick off the monitoring endpoints; a
    // WebSocket upgrade is also a GET, so match on the exact paths
    let mut peek_buf = [0u8; 12];
    let n = stream.peek(&mut peek_buf).await?;
    let head = &peek_buf[..n];

    if head.starts_with(b"GET /health") || head.starts_with(b"GET /stats") {
        return handle_http_request(&mut stream, &rooms, &registry).await;
    }

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = generate_conn_id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register(&conn_id, tx);
    debug!("New connection from {} as {}", peer_addr, conn_id);

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                let Some(frame) = inbound else { break };
                match frame {
                    Ok(Message::Text(text)) => match SignalMessage::from_json(&text) {
                        Ok(msg) => {
                            debug!("Received {} from {}", msg.tag(), conn_id);
                            router.dispatch(&conn_id, msg);
                        }
                        Err(e) => {
                            // Malformed payloads are dropped; the
                            // connection stays open
                            debug!("Invalid message from {}: {}", conn_id, e);
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(data)) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Pong(_)) => registry.mark_alive(&conn_id),
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error on {}: {:?}", conn_id, e);
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                let Some(frame) = outbound else { break };
                let closing = matches!(frame, Message::Close(_));
                if ws_sender.send(frame).await.is_err() {
                    break;
                }
                if closing {
                    // the liveness monitor gave up on this peer
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect: the same path as an explicit leave, run once
    // per connection at this single exit point
    router.leave_room(&conn_id);
    registry.remove(&conn_id);

    debug!("Connection closed: {}", conn_id);
    Ok(())
}

/// Handle an HTTP request (for health checks)
async fn handle_http_request(
    stream: &mut TcpStream,
    rooms: &RoomStore,
    registry: &ConnectionRegistry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Read the HTTP request
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    // Parse the request path
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let (status, body) = match path {
        "/health" => (
            "200 OK",
            format!(
                r#"{{"status":"healthy","rooms":{},"connections":{}}}"#,
                rooms.room_count(),
                registry.len()
            ),
        ),
        "/stats" => (
            "200 OK",
            format!(
                r#"{{"rooms":{},"members":{},"connections":{}}}"#,
                rooms.room_count(),
                rooms.member_count(),
                registry.len()
            ),
        ),
        _ => ("404 Not Found", r#"{"error":"not found"}"#.to_string()),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = SignalServer::new(Duration::from_secs(30));
        assert_eq!(server.room_count(), 0);
        assert_eq!(server.connection_count(), 0);
    }
}
