//! Discord REST client implementing [`ChatApi`].
//!
//! Payload shaping keeps the platform's JSON out of the engine: embeds,
//! component rows, permission overwrites, and interaction callbacks are all
//! built here. Throttled (429) and server-error responses retry with
//! exponential backoff; everything else surfaces as a contextual error.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::ChatApi;
use crate::event::InteractionRef;
use crate::message::{
    Button, ChannelInfo, ChannelSpec, ChatMessage, Component, CreatedChannel, Embed, ModalSpec,
    OutboundMessage,
};
use crate::retry::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_detail,
};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;
const HISTORY_FETCH_CAP: usize = 100;
const ERROR_DETAIL_MAX_CHARS: usize = 256;

// Permission bit flags used in channel overwrites.
const PERM_MANAGE_CHANNELS: u64 = 1 << 4;
const PERM_VIEW_CHANNEL: u64 = 1 << 10;
const PERM_SEND_MESSAGES: u64 = 1 << 11;
const PERM_READ_MESSAGE_HISTORY: u64 = 1 << 16;

const GUILD_TEXT_CHANNEL_TYPE: u8 = 0;
const INTERACTION_CALLBACK_MESSAGE: u8 = 4;
const INTERACTION_CALLBACK_MODAL: u8 = 9;
const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone)]
pub struct DiscordApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    bot_user_id: Option<String>,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl DiscordApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("Atelier-order-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create discord api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            bot_user_id: None,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    /// Records the bot's own user id so channel overwrites can include it.
    pub fn set_bot_user_id(&mut self, user_id: String) {
        let trimmed = user_id.trim().to_string();
        if !trimmed.is_empty() {
            self.bot_user_id = Some(trimmed);
        }
    }

    pub async fn fetch_current_user_id(&self) -> Result<String> {
        let value = self
            .request_json("users/@me", || {
                self.http.get(format!("{}/users/@me", self.api_base))
            })
            .await?;
        value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("discord users/@me response missing id"))
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn request_json(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Value> {
        let body = self.request_raw(label, build).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .with_context(|| format!("discord {label} returned unparseable body"))
    }

    async fn request_unit(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<()> {
        self.request_raw(label, build).await.map(|_| ())
    }

    async fn request_raw(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<String> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let outcome = build()
                .header(reqwest::header::AUTHORIZATION, self.auth_header())
                .send()
                .await;
            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .with_context(|| format!("failed reading discord {label} body"));
                    }
                    let retry_after = parse_retry_after(&response);
                    let detail = response.text().await.unwrap_or_default();
                    if is_retryable_status(status.as_u16()) && attempt < self.retry_max_attempts {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    bail!(
                        "discord {label} failed with status {}: {}",
                        status.as_u16(),
                        truncate_detail(&detail, ERROR_DETAIL_MAX_CHARS)
                    );
                }
                Err(error) => {
                    if is_retryable_transport_error(&error) && attempt < self.retry_max_attempts {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(anyhow!(error).context(format!("discord {label} request failed")));
                }
            }
        }
    }
}

#[async_trait]
impl ChatApi for DiscordApiClient {
    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> Result<String> {
        let payload = message_to_json(&message);
        let value = self
            .request_json("send message", || {
                self.http
                    .post(format!(
                        "{}/channels/{}/messages",
                        self.api_base, channel_id
                    ))
                    .json(&payload)
            })
            .await?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("discord send message response missing id"))
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutboundMessage,
    ) -> Result<()> {
        let payload = message_to_json(&message);
        self.request_unit("edit message", || {
            self.http
                .patch(format!(
                    "{}/channels/{}/messages/{}",
                    self.api_base, channel_id, message_id
                ))
                .json(&payload)
        })
        .await
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.request_unit("delete message", || {
            self.http.delete(format!(
                "{}/channels/{}/messages/{}",
                self.api_base, channel_id, message_id
            ))
        })
        .await
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let limit = limit.clamp(1, HISTORY_FETCH_CAP);
        let value = self
            .request_json("fetch messages", || {
                self.http.get(format!(
                    "{}/channels/{}/messages?limit={}",
                    self.api_base, channel_id, limit
                ))
            })
            .await?;
        let entries = value
            .as_array()
            .ok_or_else(|| anyhow!("discord fetch messages response must be a JSON array"))?;
        Ok(entries.iter().filter_map(parse_history_message).collect())
    }

    async fn create_channel(&self, spec: ChannelSpec) -> Result<CreatedChannel> {
        if spec.name.trim().is_empty() {
            bail!("channel name cannot be empty");
        }
        let payload = channel_create_payload(&spec, self.bot_user_id.as_deref());
        let value = self
            .request_json("create channel", || {
                self.http
                    .post(format!("{}/guilds/{}/channels", self.api_base, spec.guild_id))
                    .json(&payload)
            })
            .await?;
        let channel_id = value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("discord create channel response missing id"))?;
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(spec.name.as_str())
            .to_string();
        Ok(CreatedChannel { channel_id, name })
    }

    async fn rename_channel(&self, channel_id: &str, name: &str) -> Result<()> {
        let payload = json!({ "name": name });
        self.request_unit("rename channel", || {
            self.http
                .patch(format!("{}/channels/{}", self.api_base, channel_id))
                .json(&payload)
        })
        .await
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        self.request_unit("delete channel", || {
            self.http
                .delete(format!("{}/channels/{}", self.api_base, channel_id))
        })
        .await
    }

    async fn list_guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>> {
        let value = self
            .request_json("list channels", || {
                self.http
                    .get(format!("{}/guilds/{}/channels", self.api_base, guild_id))
            })
            .await?;
        let entries = value
            .as_array()
            .ok_or_else(|| anyhow!("discord list channels response must be a JSON array"))?;
        let channels = entries
            .iter()
            .filter(|entry| {
                entry.get("type").and_then(Value::as_u64)
                    == Some(u64::from(GUILD_TEXT_CHANNEL_TYPE))
            })
            .filter_map(|entry| {
                let channel_id = entry.get("id").and_then(Value::as_str)?;
                let name = entry.get("name").and_then(Value::as_str)?;
                Some(ChannelInfo {
                    channel_id: channel_id.to_string(),
                    name: name.to_string(),
                })
            })
            .collect();
        Ok(channels)
    }

    async fn send_direct_message(
        &self,
        user_id: &str,
        message: OutboundMessage,
    ) -> Result<String> {
        let open_payload = json!({ "recipient_id": user_id });
        let value = self
            .request_json("open dm channel", || {
                self.http
                    .post(format!("{}/users/@me/channels", self.api_base))
                    .json(&open_payload)
            })
            .await?;
        let dm_channel_id = value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("discord open dm response missing channel id"))?;
        self.send_message(&dm_channel_id, message).await
    }

    async fn fetch_user_display(&self, user_id: &str) -> Result<String> {
        let value = self
            .request_json("fetch user", || {
                self.http
                    .get(format!("{}/users/{}", self.api_base, user_id))
            })
            .await?;
        value
            .get("global_name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .or_else(|| value.get("username").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("discord fetch user response missing username"))
    }

    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: OutboundMessage,
        ephemeral: bool,
    ) -> Result<()> {
        let payload = interaction_reply_payload(&message, ephemeral);
        self.request_unit("interaction reply", || {
            self.http
                .post(format!(
                    "{}/interactions/{}/{}/callback",
                    self.api_base, interaction.id, interaction.token
                ))
                .json(&payload)
        })
        .await
    }

    async fn open_modal(&self, interaction: &InteractionRef, modal: ModalSpec) -> Result<()> {
        let payload = json!({
            "type": INTERACTION_CALLBACK_MODAL,
            "data": modal_to_json(&modal),
        });
        self.request_unit("interaction modal", || {
            self.http
                .post(format!(
                    "{}/interactions/{}/{}/callback",
                    self.api_base, interaction.id, interaction.token
                ))
                .json(&payload)
        })
        .await
    }
}

/// Derives a Unix millisecond timestamp from a snowflake id.
pub fn snowflake_timestamp_ms(snowflake: &str) -> Option<u64> {
    let id = snowflake.trim().parse::<u64>().ok()?;
    Some((id >> 22) + DISCORD_EPOCH_MS)
}

fn parse_history_message(entry: &Value) -> Option<ChatMessage> {
    let message_id = entry.get("id").and_then(Value::as_str)?.to_string();
    let author = entry.get("author")?;
    let author_id = author.get("id").and_then(Value::as_str)?.to_string();
    let author_display = author
        .get("global_name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| author.get("username").and_then(Value::as_str))
        .unwrap_or("desconhecido")
        .to_string();
    let author_is_bot = author.get("bot").and_then(Value::as_bool).unwrap_or(false);
    let timestamp_ms = snowflake_timestamp_ms(&message_id).unwrap_or(0);
    let content = entry
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let embed_titles = entry
        .get("embeds")
        .and_then(Value::as_array)
        .map(|embeds| {
            embeds
                .iter()
                .map(|embed| {
                    embed
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();
    let attachment_count = entry
        .get("attachments")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    Some(ChatMessage {
        message_id,
        author_id,
        author_display,
        author_is_bot,
        timestamp_ms,
        content,
        embed_titles,
        attachment_count,
    })
}

pub(crate) fn message_to_json(message: &OutboundMessage) -> Value {
    let mut payload = json!({});
    if let Some(content) = &message.content {
        payload["content"] = Value::String(content.clone());
    }
    if !message.embeds.is_empty() {
        payload["embeds"] = Value::Array(message.embeds.iter().map(embed_to_json).collect());
    }
    if !message.components.is_empty() {
        payload["components"] = Value::Array(
            message
                .components
                .iter()
                .map(component_row_to_json)
                .collect(),
        );
    }
    payload
}

fn embed_to_json(embed: &Embed) -> Value {
    let mut payload = json!({});
    if let Some(title) = &embed.title {
        payload["title"] = Value::String(title.clone());
    }
    if let Some(description) = &embed.description {
        payload["description"] = Value::String(description.clone());
    }
    if let Some(color) = embed.color {
        payload["color"] = json!(color);
    }
    if !embed.fields.is_empty() {
        payload["fields"] = Value::Array(
            embed
                .fields
                .iter()
                .map(|field| {
                    json!({
                        "name": field.name,
                        "value": field.value,
                        "inline": field.inline,
                    })
                })
                .collect(),
        );
    }
    if let Some(footer) = &embed.footer {
        payload["footer"] = json!({ "text": footer });
    }
    payload
}

fn button_to_json(button: &Button) -> Value {
    json!({
        "type": 2,
        "custom_id": button.custom_id,
        "label": button.label,
        "style": button.style.code(),
        "disabled": button.disabled,
    })
}

fn component_row_to_json(row: &Component) -> Value {
    let components = match row {
        Component::Buttons(buttons) => buttons.iter().map(button_to_json).collect::<Vec<_>>(),
        Component::Select(menu) => {
            let options = menu
                .options
                .iter()
                .map(|option| json!({ "label": option.label, "value": option.value }))
                .collect::<Vec<_>>();
            let mut select = json!({
                "type": 3,
                "custom_id": menu.custom_id,
                "options": options,
            });
            if let Some(placeholder) = &menu.placeholder {
                select["placeholder"] = Value::String(placeholder.clone());
            }
            vec![select]
        }
    };
    json!({ "type": 1, "components": components })
}

fn interaction_reply_payload(message: &OutboundMessage, ephemeral: bool) -> Value {
    let mut data = message_to_json(message);
    if ephemeral {
        data["flags"] = json!(EPHEMERAL_FLAG);
    }
    json!({
        "type": INTERACTION_CALLBACK_MESSAGE,
        "data": data,
    })
}

fn modal_to_json(modal: &ModalSpec) -> Value {
    let rows = modal
        .inputs
        .iter()
        .map(|input| {
            let mut field = json!({
                "type": 4,
                "custom_id": input.custom_id,
                "label": input.label,
                "style": if input.multiline { 2 } else { 1 },
                "required": input.required,
            });
            if let Some(placeholder) = &input.placeholder {
                field["placeholder"] = Value::String(placeholder.clone());
            }
            json!({ "type": 1, "components": [field] })
        })
        .collect::<Vec<_>>();
    json!({
        "custom_id": modal.custom_id,
        "title": modal.title,
        "components": rows,
    })
}

fn channel_create_payload(spec: &ChannelSpec, bot_user_id: Option<&str>) -> Value {
    let member_allow = PERM_VIEW_CHANNEL | PERM_SEND_MESSAGES | PERM_READ_MESSAGE_HISTORY;
    let mut overwrites = vec![
        // The guild id doubles as the @everyone role id.
        json!({
            "id": spec.guild_id,
            "type": 0,
            "deny": PERM_VIEW_CHANNEL.to_string(),
        }),
        json!({
            "id": spec.owner_user_id,
            "type": 1,
            "allow": member_allow.to_string(),
        }),
    ];
    if let Some(role_id) = &spec.support_role_id {
        overwrites.push(json!({
            "id": role_id,
            "type": 0,
            "allow": member_allow.to_string(),
        }));
    }
    if let Some(bot_id) = bot_user_id {
        overwrites.push(json!({
            "id": bot_id,
            "type": 1,
            "allow": (member_allow | PERM_MANAGE_CHANNELS).to_string(),
        }));
    }
    let mut payload = json!({
        "name": spec.name,
        "type": GUILD_TEXT_CHANNEL_TYPE,
        "permission_overwrites": overwrites,
    });
    if let Some(category_id) = &spec.category_id {
        payload["parent_id"] = Value::String(category_id.clone());
    }
    payload
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{
        channel_create_payload, interaction_reply_payload, message_to_json, modal_to_json,
        snowflake_timestamp_ms, DiscordApiClient,
    };
    use crate::api::ChatApi;
    use crate::event::InteractionRef;
    use crate::message::{
        Button, ButtonStyle, ChannelSpec, Component, Embed, ModalSpec, OutboundMessage, TextInput,
    };

    fn test_client(base_url: &str) -> DiscordApiClient {
        DiscordApiClient::new(base_url.to_string(), "token-test".to_string(), 3_000, 3, 5)
            .expect("client should build")
    }

    fn sample_message() -> OutboundMessage {
        OutboundMessage::text("ola")
            .with_embed(Embed::titled("Nova Encomenda Recebida").add_field("Tipo", "logo", true))
            .with_components(Component::Buttons(vec![Button::new(
                "pagar_encomenda",
                "Pagar Encomenda",
                ButtonStyle::Success,
            )]))
    }

    #[test]
    fn unit_snowflake_timestamp_decodes_discord_epoch_offset() {
        // Snowflake 4194304 is exactly one millisecond past the Discord epoch.
        assert_eq!(snowflake_timestamp_ms("4194304"), Some(1_420_070_400_001));
        assert_eq!(snowflake_timestamp_ms("not-a-number"), None);
    }

    #[test]
    fn unit_message_payload_shapes_embed_and_components() {
        let payload = message_to_json(&sample_message());
        assert_eq!(payload["content"], json!("ola"));
        assert_eq!(payload["embeds"][0]["title"], json!("Nova Encomenda Recebida"));
        assert_eq!(payload["embeds"][0]["fields"][0]["name"], json!("Tipo"));
        assert_eq!(payload["components"][0]["type"], json!(1));
        assert_eq!(
            payload["components"][0]["components"][0]["custom_id"],
            json!("pagar_encomenda")
        );
        assert_eq!(payload["components"][0]["components"][0]["style"], json!(3));
    }

    #[test]
    fn unit_reply_payload_sets_ephemeral_flag() {
        let payload = interaction_reply_payload(&OutboundMessage::text("ok"), true);
        assert_eq!(payload["type"], json!(4));
        assert_eq!(payload["data"]["flags"], json!(64));
        let broadcast = interaction_reply_payload(&OutboundMessage::text("ok"), false);
        assert!(broadcast["data"].get("flags").is_none());
    }

    #[test]
    fn unit_modal_payload_wraps_inputs_in_action_rows() {
        let modal = ModalSpec {
            custom_id: "order_modal".to_string(),
            title: "Formulário de Encomenda".to_string(),
            inputs: vec![TextInput {
                custom_id: "orderDescription".to_string(),
                label: "Descrição".to_string(),
                placeholder: None,
                required: true,
                multiline: true,
            }],
        };
        let payload = modal_to_json(&modal);
        assert_eq!(payload["custom_id"], json!("order_modal"));
        assert_eq!(payload["components"][0]["components"][0]["style"], json!(2));
    }

    #[test]
    fn unit_channel_create_payload_denies_everyone_and_allows_parties() {
        let spec = ChannelSpec {
            guild_id: "guild-1".to_string(),
            name: "📦-encomenda-ana".to_string(),
            category_id: Some("cat-1".to_string()),
            owner_user_id: "user-1".to_string(),
            support_role_id: Some("role-7".to_string()),
        };
        let payload = channel_create_payload(&spec, Some("bot-1"));
        assert_eq!(payload["parent_id"], json!("cat-1"));
        let overwrites = payload["permission_overwrites"]
            .as_array()
            .expect("overwrites array");
        assert_eq!(overwrites.len(), 4);
        assert_eq!(overwrites[0]["id"], json!("guild-1"));
        assert!(overwrites[0].get("deny").is_some());
        assert_eq!(overwrites[1]["id"], json!("user-1"));
        assert_eq!(overwrites[2]["id"], json!("role-7"));
        assert_eq!(overwrites[3]["id"], json!("bot-1"));
    }

    #[tokio::test]
    async fn functional_send_message_returns_posted_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/channels/chan-1/messages");
                then.status(200)
                    .json_body(json!({ "id": "msg-9", "channel_id": "chan-1" }));
            })
            .await;
        let client = test_client(&server.base_url());
        let message_id = client
            .send_message("chan-1", OutboundMessage::text("ola"))
            .await
            .expect("send should succeed");
        assert_eq!(message_id, "msg-9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn functional_fetch_recent_messages_parses_history_entries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/channels/chan-1/messages");
                then.status(200).json_body(json!([
                    {
                        "id": "8388608",
                        "author": { "id": "bot-1", "username": "atelier", "bot": true },
                        "content": "",
                        "embeds": [ { "title": "Nova Encomenda Recebida" } ],
                        "attachments": []
                    },
                    {
                        "id": "4194304",
                        "author": { "id": "user-1", "global_name": "Ana" },
                        "content": "obrigada!",
                        "embeds": [],
                        "attachments": [ {} ]
                    }
                ]));
            })
            .await;
        let client = test_client(&server.base_url());
        let messages = client
            .fetch_recent_messages("chan-1", 50)
            .await
            .expect("fetch should succeed");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].author_is_bot);
        assert_eq!(
            messages[0].embed_titles,
            vec!["Nova Encomenda Recebida".to_string()]
        );
        assert_eq!(messages[1].author_display, "Ana");
        assert_eq!(messages[1].attachment_count, 1);
        assert!(messages[0].timestamp_ms > messages[1].timestamp_ms);
    }

    #[tokio::test]
    async fn functional_direct_message_opens_dm_channel_first() {
        let server = MockServer::start_async().await;
        let open_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/users/@me/channels");
                then.status(200).json_body(json!({ "id": "dm-1" }));
            })
            .await;
        let send_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/channels/dm-1/messages");
                then.status(200).json_body(json!({ "id": "msg-1" }));
            })
            .await;
        let client = test_client(&server.base_url());
        let message_id = client
            .send_direct_message("user-1", OutboundMessage::text("sua encomenda foi criada"))
            .await
            .expect("dm should succeed");
        assert_eq!(message_id, "msg-1");
        open_mock.assert_async().await;
        send_mock.assert_async().await;
    }

    #[tokio::test]
    async fn regression_server_error_retries_up_to_the_attempt_cap() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/channels/chan-1/messages/msg-1");
                then.status(502);
            })
            .await;
        let client = test_client(&server.base_url());
        let error = client
            .delete_message("chan-1", "msg-1")
            .await
            .expect_err("exhausted retries should fail");
        assert!(error.to_string().contains("status 502"));
        assert_eq!(failing.hits_async().await, 3);
    }

    #[tokio::test]
    async fn regression_forbidden_status_does_not_retry() {
        let server = MockServer::start_async().await;
        let forbidden = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/channels/chan-1");
                then.status(403).body("missing access");
            })
            .await;
        let client = test_client(&server.base_url());
        let error = client
            .rename_channel("chan-1", "🟡-producao-ana")
            .await
            .expect_err("forbidden should fail immediately");
        assert!(error.to_string().contains("status 403"));
        assert_eq!(forbidden.hits_async().await, 1);
    }
}
