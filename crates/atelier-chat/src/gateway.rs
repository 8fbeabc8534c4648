//! Discord gateway connector yielding normalized [`ChatEvent`]s.
//!
//! Runs one identify/heartbeat/dispatch session over the gateway WebSocket
//! and forwards `INTERACTION_CREATE` dispatches to the caller. Restart policy
//! lives with the caller: a session error returns, it is never retried here.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::event::{validate_chat_event, Actor, ChatEvent, InteractionRef};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Guilds, guild messages, direct messages, message content.
pub const DEFAULT_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const FALLBACK_HEARTBEAT_INTERVAL_MS: u64 = 41_250;
const ADMINISTRATOR_PERMISSION: u64 = 1 << 3;

const INTERACTION_APPLICATION_COMMAND: u64 = 2;
const INTERACTION_MESSAGE_COMPONENT: u64 = 3;
const INTERACTION_MODAL_SUBMIT: u64 = 5;
const COMPONENT_BUTTON: u64 = 2;
const COMPONENT_SELECT: u64 = 3;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gateway_url: String,
    pub bot_token: String,
    pub intents: u64,
}

impl GatewayConfig {
    pub fn new(bot_token: String) -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            bot_token,
            intents: DEFAULT_INTENTS,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GatewayFrame {
    pub(crate) op: u64,
    pub(crate) seq: Option<u64>,
    pub(crate) event_type: Option<String>,
    pub(crate) data: Value,
}

/// Runs a single gateway session, forwarding events until the socket closes,
/// the peer requests a reconnect, or ctrl-c arrives (clean `Ok` exit).
pub async fn run_gateway(config: &GatewayConfig, events: mpsc::Sender<ChatEvent>) -> Result<()> {
    let (stream, _response) = connect_async(config.gateway_url.as_str())
        .await
        .context("failed to connect discord gateway websocket")?;
    let (mut sink, mut source) = stream.split();

    let mut heartbeat: Option<tokio::time::Interval> = None;
    let mut last_seq: Option<u64> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                return Ok(());
            }
            _ = tick_when_ready(&mut heartbeat) => {
                let payload = heartbeat_payload(last_seq);
                sink.send(WsMessage::text(payload.to_string()))
                    .await
                    .context("failed to send gateway heartbeat")?;
            }
            maybe_frame = source.next() => {
                let Some(frame_result) = maybe_frame else {
                    bail!("gateway connection closed by peer");
                };
                let ws_message = frame_result.context("failed reading gateway frame")?;
                let Some(text) = ws_message_text(ws_message)? else {
                    continue;
                };
                let frame = parse_gateway_frame(&text)?;
                if let Some(seq) = frame.seq {
                    last_seq = Some(seq);
                }
                match frame.op {
                    OP_HELLO => {
                        let interval_ms = frame
                            .data
                            .get("heartbeat_interval")
                            .and_then(Value::as_u64)
                            .unwrap_or(FALLBACK_HEARTBEAT_INTERVAL_MS)
                            .max(1_000);
                        let period = std::time::Duration::from_millis(interval_ms);
                        heartbeat = Some(tokio::time::interval_at(
                            tokio::time::Instant::now() + period,
                            period,
                        ));
                        let identify = identify_payload(&config.bot_token, config.intents);
                        sink.send(WsMessage::text(identify.to_string()))
                            .await
                            .context("failed to send gateway identify")?;
                    }
                    OP_HEARTBEAT => {
                        let payload = heartbeat_payload(last_seq);
                        sink.send(WsMessage::text(payload.to_string()))
                            .await
                            .context("failed to send requested heartbeat")?;
                    }
                    OP_HEARTBEAT_ACK => {}
                    OP_RECONNECT | OP_INVALID_SESSION => {
                        bail!("gateway requested session restart (op {})", frame.op);
                    }
                    OP_DISPATCH => {
                        if frame.event_type.as_deref() == Some("INTERACTION_CREATE") {
                            match interaction_to_event(&frame.data) {
                                Ok(Some(event)) => {
                                    if events.send(event).await.is_err() {
                                        // Receiver dropped; the runtime is shutting down.
                                        return Ok(());
                                    }
                                }
                                Ok(None) => {}
                                Err(error) => {
                                    tracing::warn!("discarding malformed interaction: {error:#}");
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn tick_when_ready(heartbeat: &mut Option<tokio::time::Interval>) {
    match heartbeat.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn ws_message_text(message: WsMessage) -> Result<Option<String>> {
    match message {
        WsMessage::Text(text) => Ok(Some(text.to_string())),
        WsMessage::Close(frame) => {
            bail!(
                "gateway sent close frame: {}",
                frame
                    .map(|frame| frame.reason.to_string())
                    .unwrap_or_else(|| "no reason".to_string())
            );
        }
        _ => Ok(None),
    }
}

pub(crate) fn parse_gateway_frame(raw: &str) -> Result<GatewayFrame> {
    let value: Value = serde_json::from_str(raw).context("gateway frame is not valid JSON")?;
    let op = value
        .get("op")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("gateway frame missing op code"))?;
    Ok(GatewayFrame {
        op,
        seq: value.get("s").and_then(Value::as_u64),
        event_type: value
            .get("t")
            .and_then(Value::as_str)
            .map(str::to_string),
        data: value.get("d").cloned().unwrap_or(Value::Null),
    })
}

fn identify_payload(bot_token: &str, intents: u64) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": bot_token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "atelier",
                "device": "atelier",
            },
        },
    })
}

fn heartbeat_payload(last_seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": last_seq })
}

/// Translates an `INTERACTION_CREATE` payload into a [`ChatEvent`].
///
/// Unknown interaction types yield `Ok(None)`; structurally broken payloads
/// are errors the session loop logs and drops.
pub fn interaction_to_event(payload: &Value) -> Result<Option<ChatEvent>> {
    let interaction_type = payload
        .get("type")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("interaction missing type"))?;
    let interaction = InteractionRef {
        id: string_field(payload, "id")?,
        token: string_field(payload, "token")?,
    };
    let guild_id = payload
        .get("guild_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let channel_id = string_field(payload, "channel_id")?;
    let actor = parse_actor(payload)?;
    let data = payload
        .get("data")
        .ok_or_else(|| anyhow!("interaction missing data"))?;

    let event = match interaction_type {
        INTERACTION_APPLICATION_COMMAND => {
            let name = string_field(data, "name")?;
            let mut args = BTreeMap::new();
            if let Some(options) = data.get("options").and_then(Value::as_array) {
                for option in options {
                    let Some(option_name) = option.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let value = option
                        .get("value")
                        .map(option_value_to_string)
                        .unwrap_or_default();
                    args.insert(option_name.to_string(), value);
                }
            }
            Some(ChatEvent::Command {
                name,
                guild_id,
                channel_id,
                actor,
                args,
                interaction,
            })
        }
        INTERACTION_MESSAGE_COMPONENT => {
            let custom_id = string_field(data, "custom_id")?;
            let component_type = data
                .get("component_type")
                .and_then(Value::as_u64)
                .unwrap_or(COMPONENT_BUTTON);
            match component_type {
                COMPONENT_BUTTON => {
                    let message_id = payload
                        .get("message")
                        .and_then(|message| message.get("id"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(ChatEvent::ButtonClick {
                        custom_id,
                        guild_id,
                        channel_id,
                        message_id,
                        actor,
                        interaction,
                    })
                }
                COMPONENT_SELECT => {
                    let values = data
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(ChatEvent::SelectChoice {
                        custom_id,
                        guild_id,
                        channel_id,
                        values,
                        actor,
                        interaction,
                    })
                }
                _ => None,
            }
        }
        INTERACTION_MODAL_SUBMIT => {
            let custom_id = string_field(data, "custom_id")?;
            let mut fields = BTreeMap::new();
            if let Some(rows) = data.get("components").and_then(Value::as_array) {
                for row in rows {
                    let Some(inputs) = row.get("components").and_then(Value::as_array) else {
                        continue;
                    };
                    for input in inputs {
                        let Some(input_id) = input.get("custom_id").and_then(Value::as_str)
                        else {
                            continue;
                        };
                        let value = input
                            .get("value")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        fields.insert(input_id.to_string(), value.to_string());
                    }
                }
            }
            Some(ChatEvent::ModalSubmit {
                custom_id,
                guild_id,
                channel_id,
                fields,
                actor,
                interaction,
            })
        }
        _ => None,
    };

    if let Some(event) = &event {
        validate_chat_event(event)?;
    }
    Ok(event)
}

fn parse_actor(payload: &Value) -> Result<Actor> {
    let member = payload.get("member");
    let user = member
        .and_then(|member| member.get("user"))
        .or_else(|| payload.get("user"))
        .ok_or_else(|| anyhow!("interaction missing user"))?;
    let user_id = string_field(user, "id")?;
    let display_name = member
        .and_then(|member| member.get("nick"))
        .and_then(Value::as_str)
        .filter(|nick| !nick.trim().is_empty())
        .or_else(|| {
            user.get("global_name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
        })
        .or_else(|| user.get("username").and_then(Value::as_str))
        .unwrap_or("desconhecido")
        .to_string();
    let role_ids = member
        .and_then(|member| member.get("roles"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let is_admin = member
        .and_then(|member| member.get("permissions"))
        .and_then(Value::as_str)
        .and_then(|permissions| permissions.trim().parse::<u64>().ok())
        .map(|permissions| permissions & ADMINISTRATOR_PERMISSION != 0)
        .unwrap_or(false);
    Ok(Actor {
        user_id,
        display_name,
        role_ids,
        is_admin,
    })
}

fn string_field(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|field| !field.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("interaction missing {key}"))
}

fn option_value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
