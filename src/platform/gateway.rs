//! Gateway connection — the live inbound event feed.
//!
//! Keeps one websocket session to the platform gateway: handshake (hello,
//! identify), a heartbeat loop, and forwarding of `MESSAGE_CREATE`
//! dispatches into an mpsc channel the embedding process consumes. The
//! session reconnects with a fixed delay whenever it drops.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::platform::MessageEvent;

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT.
const INTENTS: u64 = 1 | (1 << 9) | (1 << 15);

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsWriter = Arc<Mutex<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>>>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Events surfaced to the embedding process.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The session is ready; carries the bot's own identity.
    Ready { user_id: String, tag: String },
    /// An inbound chat message.
    Message(MessageEvent),
}

/// Spawn the gateway task. The receiver yields a `Ready` per session
/// followed by message events; dropping it ends the task.
pub fn spawn(
    token: SecretString,
) -> (
    mpsc::UnboundedReceiver<GatewayEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        loop {
            if let Err(e) = run_session(&token, &tx).await {
                warn!(error = %e, "Gateway session ended");
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
            info!("Reconnecting to gateway");
        }
    });
    (rx, handle)
}

async fn run_session(
    token: &SecretString,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
) -> Result<(), ClientError> {
    let (ws, _) = connect_async(GATEWAY_URL)
        .await
        .map_err(|e| ClientError::Gateway(e.to_string()))?;
    let (writer, mut reader) = ws.split();
    let writer: WsWriter = Arc::new(Mutex::new(writer));
    let last_seq = Arc::new(AtomicI64::new(-1));

    let hello = next_payload(&mut reader).await?;
    if hello.get("op").and_then(Value::as_u64) != Some(10) {
        return Err(ClientError::Gateway("expected hello payload".to_string()));
    }
    let heartbeat_ms = hello
        .pointer("/d/heartbeat_interval")
        .and_then(Value::as_u64)
        .ok_or_else(|| ClientError::Gateway("hello without heartbeat_interval".to_string()))?;

    let heartbeat = spawn_heartbeat(
        Arc::clone(&writer),
        Arc::clone(&last_seq),
        Duration::from_millis(heartbeat_ms),
    );

    let identify = serde_json::json!({
        "op": 2,
        "d": {
            "token": token.expose_secret(),
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "attention-bot",
                "device": "attention-bot",
            },
        },
    });
    let sent = send_payload(&writer, &identify).await;

    let result = match sent {
        Ok(()) => read_loop(&mut reader, &writer, &last_seq, tx).await,
        Err(e) => Err(e),
    };
    heartbeat.abort();
    result
}

fn spawn_heartbeat(
    writer: WsWriter,
    last_seq: Arc<AtomicI64>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let seq = last_seq.load(Ordering::Relaxed);
            let d = if seq < 0 { Value::Null } else { Value::from(seq) };
            let payload = serde_json::json!({ "op": 1, "d": d });
            if send_payload(&writer, &payload).await.is_err() {
                break;
            }
        }
    })
}

async fn send_payload(writer: &WsWriter, payload: &Value) -> Result<(), ClientError> {
    writer
        .lock()
        .await
        .send(WsMessage::Text(payload.to_string().into()))
        .await
        .map_err(|e| ClientError::Gateway(e.to_string()))
}

/// Read frames until the next JSON payload.
async fn next_payload(reader: &mut WsReader) -> Result<Value, ClientError> {
    while let Some(frame) = reader.next().await {
        let frame = frame.map_err(|e| ClientError::Gateway(e.to_string()))?;
        match frame {
            WsMessage::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .map_err(|e| ClientError::Gateway(e.to_string()));
            }
            WsMessage::Close(_) => {
                return Err(ClientError::Gateway("connection closed".to_string()));
            }
            _ => {}
        }
    }
    Err(ClientError::Gateway("stream ended".to_string()))
}

async fn read_loop(
    reader: &mut WsReader,
    writer: &WsWriter,
    last_seq: &AtomicI64,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
) -> Result<(), ClientError> {
    loop {
        let payload = next_payload(reader).await?;
        if let Some(seq) = payload.get("s").and_then(Value::as_i64) {
            last_seq.store(seq, Ordering::Relaxed);
        }

        match payload.get("op").and_then(Value::as_u64) {
            Some(0) => {
                let kind = payload.get("t").and_then(Value::as_str).unwrap_or_default();
                let event = match kind {
                    "READY" => parse_ready(&payload),
                    "MESSAGE_CREATE" => payload
                        .get("d")
                        .and_then(parse_message_event)
                        .map(GatewayEvent::Message),
                    _ => None,
                };
                if let Some(event) = event
                    && tx.send(event).is_err()
                {
                    // Receiver dropped; end the session for good.
                    return Ok(());
                }
            }
            // The gateway asked for an immediate heartbeat.
            Some(1) => {
                let seq = last_seq.load(Ordering::Relaxed);
                let d = if seq < 0 { Value::Null } else { Value::from(seq) };
                send_payload(writer, &serde_json::json!({ "op": 1, "d": d })).await?;
            }
            // Reconnect / invalid session: drop and let the outer loop retry.
            Some(7) | Some(9) => {
                return Err(ClientError::Gateway("reconnect requested".to_string()));
            }
            // Heartbeat ack.
            Some(11) => {}
            other => debug!(op = ?other, "Ignoring gateway payload"),
        }
    }
}

fn parse_ready(payload: &Value) -> Option<GatewayEvent> {
    let user = payload.pointer("/d/user")?;
    Some(GatewayEvent::Ready {
        user_id: user.get("id")?.as_str()?.to_string(),
        tag: user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn parse_message_event(d: &Value) -> Option<MessageEvent> {
    let created_at = d
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(MessageEvent {
        id: d.get("id")?.as_str()?.to_string(),
        guild_id: d.get("guild_id").and_then(Value::as_str).map(String::from),
        channel_id: d.get("channel_id")?.as_str()?.to_string(),
        author_id: d.pointer("/author/id")?.as_str()?.to_string(),
        author_is_bot: d
            .pointer("/author/bot")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        content: d
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message_event_full() {
        let d = serde_json::json!({
            "id": "m1",
            "guild_id": "g1",
            "channel_id": "c1",
            "content": "ap!help",
            "timestamp": "2024-05-01T12:00:00+00:00",
            "author": { "id": "u1", "bot": false },
        });
        let event = parse_message_event(&d).unwrap();
        assert_eq!(event.id, "m1");
        assert_eq!(event.guild_id.as_deref(), Some("g1"));
        assert!(!event.author_is_bot);
    }

    #[test]
    fn parse_message_event_requires_author() {
        let d = serde_json::json!({
            "id": "m1",
            "channel_id": "c1",
            "content": "hi",
        });
        assert!(parse_message_event(&d).is_none());
    }

    #[test]
    fn parse_ready_extracts_identity() {
        let payload = serde_json::json!({
            "op": 0,
            "t": "READY",
            "d": { "user": { "id": "bot-1", "username": "attention" } },
        });
        match parse_ready(&payload) {
            Some(GatewayEvent::Ready { user_id, tag }) => {
                assert_eq!(user_id, "bot-1");
                assert_eq!(tag, "attention");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
