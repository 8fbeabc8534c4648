//! In-memory [`ChatApi`] fake for engine and dispatcher tests.
//!
//! Records every outbound call and lets tests seed channels and history.
//! Failure toggles simulate the degraded paths (DM refusal, channel-creation
//! rejection) the lifecycle engine must survive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::api::ChatApi;
use crate::event::InteractionRef;
use crate::message::{
    ChannelInfo, ChannelSpec, ChatMessage, CreatedChannel, ModalSpec, OutboundMessage,
};

#[derive(Debug, Clone)]
pub struct RecordedReply {
    pub interaction_id: String,
    pub message: OutboundMessage,
    pub ephemeral: bool,
}

#[derive(Debug, Clone)]
struct StoredChannel {
    name: String,
    guild_id: String,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    channel_id: String,
    message_id: String,
    message: OutboundMessage,
    timestamp_ms: u64,
    deleted: bool,
}

#[derive(Default)]
struct InMemoryState {
    channels: BTreeMap<String, StoredChannel>,
    messages: Vec<StoredMessage>,
    seeded_history: Vec<(String, ChatMessage)>,
    direct_messages: Vec<(String, OutboundMessage)>,
    replies: Vec<RecordedReply>,
    modals: Vec<(String, ModalSpec)>,
}

#[derive(Default)]
pub struct InMemoryChat {
    state: Mutex<InMemoryState>,
    next_id: AtomicU64,
    fail_direct_messages: AtomicBool,
    fail_create_channel: AtomicBool,
}

impl InMemoryChat {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().expect("in-memory chat state poisoned")
    }

    pub fn seed_channel(&self, channel_id: &str, guild_id: &str, name: &str) {
        self.lock().channels.insert(
            channel_id.to_string(),
            StoredChannel {
                name: name.to_string(),
                guild_id: guild_id.to_string(),
                deleted: false,
            },
        );
    }

    /// Adds a non-bot message to the fetchable history of a channel.
    pub fn seed_history(&self, channel_id: &str, message: ChatMessage) {
        self.lock()
            .seeded_history
            .push((channel_id.to_string(), message));
    }

    pub fn set_fail_direct_messages(&self, fail: bool) {
        self.fail_direct_messages.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create_channel(&self, fail: bool) {
        self.fail_create_channel.store(fail, Ordering::SeqCst);
    }

    /// Channel name and deleted flag, if the channel ever existed.
    pub fn channel(&self, channel_id: &str) -> Option<(String, bool)> {
        self.lock()
            .channels
            .get(channel_id)
            .map(|channel| (channel.name.clone(), channel.deleted))
    }

    pub fn channel_count(&self) -> usize {
        self.lock()
            .channels
            .values()
            .filter(|channel| !channel.deleted)
            .count()
    }

    /// Non-deleted bot messages in a channel, oldest first.
    pub fn live_messages_in(&self, channel_id: &str) -> Vec<(String, OutboundMessage)> {
        self.lock()
            .messages
            .iter()
            .filter(|stored| stored.channel_id == channel_id && !stored.deleted)
            .map(|stored| (stored.message_id.clone(), stored.message.clone()))
            .collect()
    }

    pub fn message(&self, channel_id: &str, message_id: &str) -> Option<OutboundMessage> {
        self.lock()
            .messages
            .iter()
            .find(|stored| {
                stored.channel_id == channel_id
                    && stored.message_id == message_id
                    && !stored.deleted
            })
            .map(|stored| stored.message.clone())
    }

    pub fn direct_messages_to(&self, user_id: &str) -> Vec<OutboundMessage> {
        self.lock()
            .direct_messages
            .iter()
            .filter(|(recipient, _)| recipient == user_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn replies(&self) -> Vec<RecordedReply> {
        self.lock().replies.clone()
    }

    pub fn modals_opened(&self) -> Vec<ModalSpec> {
        self.lock()
            .modals
            .iter()
            .map(|(_, modal)| modal.clone())
            .collect()
    }
}

#[async_trait]
impl ChatApi for InMemoryChat {
    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> Result<String> {
        let id = self.next();
        let message_id = format!("msg-{id}");
        self.lock().messages.push(StoredMessage {
            channel_id: channel_id.to_string(),
            message_id: message_id.clone(),
            message,
            timestamp_ms: id * 1_000,
            deleted: false,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutboundMessage,
    ) -> Result<()> {
        let mut state = self.lock();
        let stored = state
            .messages
            .iter_mut()
            .find(|stored| {
                stored.channel_id == channel_id
                    && stored.message_id == message_id
                    && !stored.deleted
            })
            .ok_or_else(|| anyhow!("message {message_id} not found in {channel_id}"))?;
        stored.message = message;
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let mut state = self.lock();
        let stored = state
            .messages
            .iter_mut()
            .find(|stored| {
                stored.channel_id == channel_id
                    && stored.message_id == message_id
                    && !stored.deleted
            })
            .ok_or_else(|| anyhow!("message {message_id} not found in {channel_id}"))?;
        stored.deleted = true;
        Ok(())
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let state = self.lock();
        let mut history = state
            .messages
            .iter()
            .filter(|stored| stored.channel_id == channel_id && !stored.deleted)
            .map(|stored| ChatMessage {
                message_id: stored.message_id.clone(),
                author_id: "bot".to_string(),
                author_display: "atelier".to_string(),
                author_is_bot: true,
                timestamp_ms: stored.timestamp_ms,
                content: stored.message.content.clone().unwrap_or_default(),
                embed_titles: stored
                    .message
                    .embeds
                    .iter()
                    .map(|embed| embed.title.clone().unwrap_or_default())
                    .collect(),
                attachment_count: 0,
            })
            .collect::<Vec<_>>();
        history.extend(
            state
                .seeded_history
                .iter()
                .filter(|(seeded_channel, _)| seeded_channel == channel_id)
                .map(|(_, message)| message.clone()),
        );
        // Newest first, as the platform returns history.
        history.sort_by(|left, right| right.timestamp_ms.cmp(&left.timestamp_ms));
        history.truncate(limit.clamp(1, 100));
        Ok(history)
    }

    async fn create_channel(&self, spec: ChannelSpec) -> Result<CreatedChannel> {
        if self.fail_create_channel.load(Ordering::SeqCst) {
            bail!("simulated channel creation failure");
        }
        let channel_id = format!("chan-{}", self.next());
        self.lock().channels.insert(
            channel_id.clone(),
            StoredChannel {
                name: spec.name.clone(),
                guild_id: spec.guild_id.clone(),
                deleted: false,
            },
        );
        Ok(CreatedChannel {
            channel_id,
            name: spec.name,
        })
    }

    async fn rename_channel(&self, channel_id: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        let channel = state
            .channels
            .get_mut(channel_id)
            .filter(|channel| !channel.deleted)
            .ok_or_else(|| anyhow!("channel {channel_id} not found"))?;
        channel.name = name.to_string();
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let mut state = self.lock();
        let channel = state
            .channels
            .get_mut(channel_id)
            .filter(|channel| !channel.deleted)
            .ok_or_else(|| anyhow!("channel {channel_id} not found"))?;
        channel.deleted = true;
        Ok(())
    }

    async fn list_guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .lock()
            .channels
            .iter()
            .filter(|(_, channel)| channel.guild_id == guild_id && !channel.deleted)
            .map(|(channel_id, channel)| ChannelInfo {
                channel_id: channel_id.clone(),
                name: channel.name.clone(),
            })
            .collect())
    }

    async fn send_direct_message(
        &self,
        user_id: &str,
        message: OutboundMessage,
    ) -> Result<String> {
        if self.fail_direct_messages.load(Ordering::SeqCst) {
            bail!("simulated dm refusal for {user_id}");
        }
        let id = self.next();
        self.lock()
            .direct_messages
            .push((user_id.to_string(), message));
        Ok(format!("dm-msg-{id}"))
    }

    async fn fetch_user_display(&self, user_id: &str) -> Result<String> {
        Ok(format!("user-{user_id}"))
    }

    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: OutboundMessage,
        ephemeral: bool,
    ) -> Result<()> {
        self.lock().replies.push(RecordedReply {
            interaction_id: interaction.id.clone(),
            message,
            ephemeral,
        });
        Ok(())
    }

    async fn open_modal(&self, interaction: &InteractionRef, modal: ModalSpec) -> Result<()> {
        self.lock().modals.push((interaction.id.clone(), modal));
        Ok(())
    }
}
