//! Chat-platform boundary for the Atelier order bot.
//!
//! Defines the inbound event contract, outbound message/embed/component
//! types, and the async [`ChatApi`] trait the lifecycle engine talks to.
//! Ships a Discord REST implementation, a gateway connector that yields
//! [`ChatEvent`]s, and an in-memory fake for tests.

pub mod api;
pub mod discord;
pub mod event;
pub mod gateway;
pub mod message;
pub mod retry;
pub mod testing;

pub use api::ChatApi;
pub use discord::DiscordApiClient;
pub use event::{validate_chat_event, Actor, ChatEvent, InteractionRef};
pub use gateway::{run_gateway, GatewayConfig};
pub use message::{
    chunk_text, sanitize_channel_label, Button, ButtonStyle, ChannelInfo, ChannelSpec,
    ChatMessage, Component, CreatedChannel, Embed, EmbedField, ModalSpec, OutboundMessage,
    SelectMenu, SelectOption, TextInput, DISCORD_SAFE_MAX_CHARS,
};
pub use testing::InMemoryChat;
