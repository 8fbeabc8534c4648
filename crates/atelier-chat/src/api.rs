//! The opaque message-channel trait consumed by the lifecycle engine.

use anyhow::Result;
use async_trait::async_trait;

use crate::event::InteractionRef;
use crate::message::{
    ChannelInfo, ChannelSpec, ChatMessage, CreatedChannel, ModalSpec, OutboundMessage,
};

/// Outbound operations against the chat platform.
///
/// Every method is a suspension and failure point; callers decide which
/// failures are critical and which degrade to best-effort logging.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Posts a message to a channel, returning the new message id.
    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> Result<String>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutboundMessage,
    ) -> Result<()>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    /// Fetches up to `limit` (<= 100) most recent messages, newest first.
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;

    async fn create_channel(&self, spec: ChannelSpec) -> Result<CreatedChannel>;

    async fn rename_channel(&self, channel_id: &str, name: &str) -> Result<()>;

    async fn delete_channel(&self, channel_id: &str) -> Result<()>;

    async fn list_guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>>;

    /// Opens (or reuses) the direct-message channel to a user and posts there.
    async fn send_direct_message(
        &self,
        user_id: &str,
        message: OutboundMessage,
    ) -> Result<String>;

    async fn fetch_user_display(&self, user_id: &str) -> Result<String>;

    /// Answers the interaction that produced an event. Ephemeral replies are
    /// visible to the acting user only.
    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: OutboundMessage,
        ephemeral: bool,
    ) -> Result<()>;

    /// Answers an interaction by presenting a modal form.
    async fn open_modal(&self, interaction: &InteractionRef, modal: ModalSpec) -> Result<()>;
}
