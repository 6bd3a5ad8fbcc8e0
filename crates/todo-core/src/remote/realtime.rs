//! Realtime Change Feed
//!
//! Subscribes to row changes of the items table over the hosted service's
//! realtime websocket, which speaks the Phoenix channel protocol
//! (JSON frames of `{topic, event, payload, ref}`).
//!
//! One socket per subscription. A background task keeps the heartbeat going,
//! decodes `postgres_changes` frames into [`ChangeEvent`]s and forwards them
//! in arrival order until the subscription is closed or the socket dies.
//! On every heartbeat it also asks the token provider for the current access
//! token and hands a refreshed one to the channel (`access_token` event), so
//! the server does not drop the channel when the join token expires.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::http::SupabaseHttp;
use super::{ChangeFeed, FeedEvent, Subscription, SubscriptionHandle, TokenProvider};
use crate::config::RemoteConfig;
use crate::domain::{ChangeEvent, Item, ItemKey, UserId};
use crate::error::ChannelError;

const JOIN_REF: &str = "1";
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const PROTOCOL_VERSION: &str = "1.0.0";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ========================
// Wire format
// ========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: &str, event: &str, payload: Value, reference: Option<String>) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference,
        }
    }

    fn to_frame(&self) -> Result<Message, ChannelError> {
        serde_json::to_string(self)
            .map(Message::Text)
            .map_err(|e| ChannelError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// A decoded frame, as far as the feed cares
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Reply { reference: Option<String>, ok: bool, detail: String },
    Change(ChangeEvent),
    Broadcast { event: String },
    /// The server ended or failed our channel
    Failed(String),
    Ignored,
}

fn record<T: for<'de> Deserialize<'de>>(value: Option<Value>, what: &str) -> Result<T, ChannelError> {
    let value = value.ok_or_else(|| ChannelError::Protocol(format!("missing {}", what)))?;
    serde_json::from_value(value).map_err(|e| ChannelError::Protocol(format!("bad {}: {}", what, e)))
}

pub(crate) fn decode_change(data: Value) -> Result<ChangeEvent, ChannelError> {
    let data: ChangeData = serde_json::from_value(data).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    match data.kind.as_str() {
        "INSERT" => Ok(ChangeEvent::Insert {
            new: record::<Item>(data.record, "record")?,
        }),
        "UPDATE" => {
            let new: Item = record(data.record, "record")?;
            // Old records only carry the primary key by default, and may be empty
            let old = record::<ItemKey>(data.old_record, "old_record").unwrap_or_else(|_| ItemKey::new(new.id));
            Ok(ChangeEvent::Update { new, old })
        }
        "DELETE" => Ok(ChangeEvent::Delete {
            old: record::<ItemKey>(data.old_record, "old_record")?,
        }),
        other => Err(ChannelError::Protocol(format!("unknown change type '{}'", other))),
    }
}

fn status_detail(payload: &Value) -> String {
    payload
        .pointer("/response/reason")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

pub(crate) fn decode_inbound(text: &str, topic: &str) -> Result<Inbound, ChannelError> {
    let message: PhoenixMessage = serde_json::from_str(text).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    if message.topic != topic {
        // Heartbeat replies arrive on "phoenix"
        return Ok(Inbound::Ignored);
    }

    match message.event.as_str() {
        "phx_reply" => {
            let ok = message.payload.get("status").and_then(Value::as_str) == Some("ok");
            Ok(Inbound::Reply {
                reference: message.reference,
                ok,
                detail: status_detail(&message.payload),
            })
        }
        "postgres_changes" => {
            let data = message
                .payload
                .get("data")
                .cloned()
                .ok_or_else(|| ChannelError::Protocol("postgres_changes without data".to_string()))?;
            decode_change(data).map(Inbound::Change)
        }
        "broadcast" => Ok(Inbound::Broadcast {
            event: message
                .payload
                .get("event")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "system" if message.payload.get("status").and_then(Value::as_str) == Some("error") => {
            Ok(Inbound::Failed(status_detail(&message.payload)))
        }
        "phx_error" => Ok(Inbound::Failed("channel error".to_string())),
        "phx_close" => Ok(Inbound::Failed("channel closed by server".to_string())),
        _ => Ok(Inbound::Ignored),
    }
}

// ========================
// Feed
// ========================

pub struct RealtimeFeed {
    http: SupabaseHttp,
    tokens: Arc<dyn TokenProvider>,
    schema: String,
    table: String,
    channel: String,
    heartbeat: Duration,
}

impl RealtimeFeed {
    pub fn new(http: SupabaseHttp, config: &RemoteConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            tokens,
            schema: config.schema.clone(),
            table: config.table.clone(),
            channel: config.channel.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_secs.max(1)),
        }
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }

    /// `ws(s)://<host>/realtime/v1/websocket?apikey=<key>&vsn=1.0.0`
    pub fn socket_url(&self) -> Result<Url, ChannelError> {
        let mut url = self.http.endpoint("realtime/v1/websocket");
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ChannelError::Connect(format!("cannot derive websocket URL from {}", url)))?;
        url.query_pairs_mut()
            .append_pair("apikey", self.http.anon_key())
            .append_pair("vsn", PROTOCOL_VERSION);
        Ok(url)
    }

    pub(crate) fn join_payload(&self, owner: &UserId, access_token: &str) -> Value {
        json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": self.schema,
                    "table": self.table,
                    "filter": format!("user_id=eq.{}", owner),
                }],
                "private": false,
            },
            "access_token": access_token,
        })
    }
}

async fn await_join(stream: &mut SplitStream<Socket>, topic: &str) -> Result<(), ChannelError> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| ChannelError::Join(e.to_string()))?;
        let Message::Text(text) = frame else { continue };
        match decode_inbound(&text, topic) {
            Ok(Inbound::Reply { reference, ok, detail }) if reference.as_deref() == Some(JOIN_REF) => {
                return if ok { Ok(()) } else { Err(ChannelError::Join(detail)) };
            }
            Ok(Inbound::Failed(reason)) => return Err(ChannelError::Join(reason)),
            Ok(_) => {}
            Err(e) => log::warn!("[REALTIME] Ignoring frame while joining: {}", e),
        }
    }
    Err(ChannelError::Join("socket closed before join reply".to_string()))
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, owner: &UserId, access_token: &str) -> Result<Subscription, ChannelError> {
        let url = self.socket_url()?;
        let topic = self.topic();
        log::info!("[REALTIME] Connecting to {} for {}", topic, owner);

        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let join = PhoenixMessage::new(
            &topic,
            "phx_join",
            self.join_payload(owner, access_token),
            Some(JOIN_REF.to_string()),
        );
        sink.send(join.to_frame()?)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        tokio::time::timeout(JOIN_TIMEOUT, await_join(&mut stream, &topic))
            .await
            .map_err(|_| ChannelError::Join("timed out waiting for join reply".to_string()))??;
        log::info!("[REALTIME] Joined {}", topic);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let channel = Channel {
            topic,
            heartbeat: self.heartbeat,
            tokens: self.tokens.clone(),
            access_token: access_token.to_string(),
        };
        tokio::spawn(run_channel(sink, stream, channel, events_tx, close_rx));

        Ok(Subscription {
            events: events_rx,
            handle: SubscriptionHandle::new(move || {
                let _ = close_tx.send(());
            }),
        })
    }
}

async fn send(sink: &mut SplitSink<Socket, Message>, message: PhoenixMessage) -> Result<(), String> {
    let frame = message.to_frame().map_err(|e| e.to_string())?;
    sink.send(frame).await.map_err(|e| e.to_string())
}

async fn leave(sink: &mut SplitSink<Socket, Message>, topic: &str, reference: u64) {
    let leave = PhoenixMessage::new(topic, "phx_leave", json!({}), Some(reference.to_string()));
    let _ = send(sink, leave).await;
    let _ = sink.close().await;
}

/// What the background task needs to keep one joined channel alive
struct Channel {
    topic: String,
    heartbeat: Duration,
    tokens: Arc<dyn TokenProvider>,
    /// Token the channel is currently authorized with
    access_token: String,
}

async fn run_channel(
    mut sink: SplitSink<Socket, Message>,
    mut stream: SplitStream<Socket>,
    mut channel: Channel,
    events: mpsc::UnboundedSender<FeedEvent>,
    mut close: oneshot::Receiver<()>,
) {
    let topic = channel.topic.clone();
    let mut ticker = tokio::time::interval(channel.heartbeat);
    // The first tick fires immediately; the join itself counts as activity
    ticker.tick().await;
    let mut next_ref: u64 = 2;

    let lost = loop {
        tokio::select! {
            _ = &mut close => {
                leave(&mut sink, &topic, next_ref).await;
                log::info!("[REALTIME] Left {}", topic);
                return;
            }
            _ = ticker.tick() => {
                let beat = PhoenixMessage::new("phoenix", "heartbeat", json!({}), Some(next_ref.to_string()));
                next_ref += 1;
                if let Err(e) = send(&mut sink, beat).await {
                    break ChannelError::Closed(format!("heartbeat failed: {}", e));
                }

                let fresh = match channel.tokens.access_token().await {
                    Some(token) if token != channel.access_token => token,
                    _ => continue,
                };
                let update = PhoenixMessage::new(
                    &topic,
                    "access_token",
                    json!({ "access_token": fresh }),
                    Some(next_ref.to_string()),
                );
                next_ref += 1;
                if let Err(e) = send(&mut sink, update).await {
                    break ChannelError::Closed(format!("token update failed: {}", e));
                }
                log::info!("[REALTIME] Sent refreshed access token to {}", topic);
                channel.access_token = fresh;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_inbound(&text, &topic) {
                    Ok(Inbound::Change(event)) => {
                        if events.send(FeedEvent::Change(event)).is_err() {
                            // Nobody listens any more
                            leave(&mut sink, &topic, next_ref).await;
                            return;
                        }
                    }
                    Ok(Inbound::Broadcast { event }) => {
                        log::debug!("[REALTIME] Broadcast '{}' on {}", event, topic);
                    }
                    Ok(Inbound::Failed(reason)) => break ChannelError::Closed(reason),
                    Ok(_) => {}
                    Err(e) => log::warn!("[REALTIME] Skipping frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    break ChannelError::Closed(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break ChannelError::Closed(e.to_string()),
                None => break ChannelError::Closed("connection ended".to_string()),
            }
        }
    };

    log::warn!("[REALTIME] Lost {}: {}", topic, lost);
    let _ = events.send(FeedEvent::Lost(lost));
}
