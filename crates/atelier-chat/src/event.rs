//! Inbound event contract for the order bot.
//!
//! Every interaction the platform delivers is normalized into a [`ChatEvent`]
//! before dispatch. Validation enforces the identifier checks the dispatcher
//! relies on so downstream code only consumes well-formed events.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Identity and authorization context of the user behind an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Actor {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|id| id == role_id)
    }
}

/// Handle used to answer the interaction that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
/// Normalized inbound interaction delivered by the gateway connector.
pub enum ChatEvent {
    Command {
        name: String,
        guild_id: String,
        channel_id: String,
        actor: Actor,
        #[serde(default)]
        args: BTreeMap<String, String>,
        interaction: InteractionRef,
    },
    ButtonClick {
        custom_id: String,
        guild_id: String,
        channel_id: String,
        message_id: String,
        actor: Actor,
        interaction: InteractionRef,
    },
    SelectChoice {
        custom_id: String,
        guild_id: String,
        channel_id: String,
        #[serde(default)]
        values: Vec<String>,
        actor: Actor,
        interaction: InteractionRef,
    },
    ModalSubmit {
        custom_id: String,
        guild_id: String,
        channel_id: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
        actor: Actor,
        interaction: InteractionRef,
    },
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::ButtonClick { .. } => "button",
            Self::SelectChoice { .. } => "select",
            Self::ModalSubmit { .. } => "modal",
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            Self::Command { actor, .. }
            | Self::ButtonClick { actor, .. }
            | Self::SelectChoice { actor, .. }
            | Self::ModalSubmit { actor, .. } => actor,
        }
    }

    pub fn guild_id(&self) -> &str {
        match self {
            Self::Command { guild_id, .. }
            | Self::ButtonClick { guild_id, .. }
            | Self::SelectChoice { guild_id, .. }
            | Self::ModalSubmit { guild_id, .. } => guild_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Command { channel_id, .. }
            | Self::ButtonClick { channel_id, .. }
            | Self::SelectChoice { channel_id, .. }
            | Self::ModalSubmit { channel_id, .. } => channel_id,
        }
    }

    pub fn interaction(&self) -> &InteractionRef {
        match self {
            Self::Command { interaction, .. }
            | Self::ButtonClick { interaction, .. }
            | Self::SelectChoice { interaction, .. }
            | Self::ModalSubmit { interaction, .. } => interaction,
        }
    }

    /// Identifier the dispatcher routes on: command name or component id.
    pub fn route_id(&self) -> &str {
        match self {
            Self::Command { name, .. } => name,
            Self::ButtonClick { custom_id, .. }
            | Self::SelectChoice { custom_id, .. }
            | Self::ModalSubmit { custom_id, .. } => custom_id,
        }
    }
}

pub fn validate_chat_event(event: &ChatEvent) -> Result<()> {
    let label = event.kind();
    if event.route_id().trim().is_empty() {
        bail!("{label} event has empty route identifier");
    }
    if event.channel_id().trim().is_empty() {
        bail!("{label} event has empty channel_id");
    }
    if event.actor().user_id.trim().is_empty() {
        bail!("{label} event has empty actor user_id");
    }
    if event.interaction().id.trim().is_empty() || event.interaction().token.trim().is_empty() {
        bail!("{label} event has incomplete interaction reference");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{validate_chat_event, Actor, ChatEvent, InteractionRef};

    fn sample_actor() -> Actor {
        Actor {
            user_id: "user-1".to_string(),
            display_name: "cliente".to_string(),
            role_ids: vec!["role-7".to_string()],
            is_admin: false,
        }
    }

    fn sample_interaction() -> InteractionRef {
        InteractionRef {
            id: "ix-1".to_string(),
            token: "tok-1".to_string(),
        }
    }

    #[test]
    fn unit_actor_role_lookup_matches_exact_id() {
        let actor = sample_actor();
        assert!(actor.has_role("role-7"));
        assert!(!actor.has_role("role-8"));
    }

    #[test]
    fn unit_validate_chat_event_accepts_complete_command() {
        let event = ChatEvent::Command {
            name: "encomenda".to_string(),
            guild_id: "guild-1".to_string(),
            channel_id: "chan-1".to_string(),
            actor: sample_actor(),
            args: BTreeMap::new(),
            interaction: sample_interaction(),
        };
        validate_chat_event(&event).expect("complete command should validate");
        assert_eq!(event.route_id(), "encomenda");
        assert_eq!(event.kind(), "command");
    }

    #[test]
    fn unit_validate_chat_event_rejects_blank_custom_id() {
        let event = ChatEvent::ButtonClick {
            custom_id: "  ".to_string(),
            guild_id: "guild-1".to_string(),
            channel_id: "chan-1".to_string(),
            message_id: "msg-1".to_string(),
            actor: sample_actor(),
            interaction: sample_interaction(),
        };
        let error = validate_chat_event(&event).expect_err("blank custom id should fail");
        assert!(error.to_string().contains("empty route identifier"));
    }

    #[test]
    fn unit_validate_chat_event_rejects_missing_interaction_token() {
        let event = ChatEvent::ModalSubmit {
            custom_id: "order_modal".to_string(),
            guild_id: "guild-1".to_string(),
            channel_id: "chan-1".to_string(),
            fields: BTreeMap::new(),
            actor: sample_actor(),
            interaction: InteractionRef {
                id: "ix-1".to_string(),
                token: String::new(),
            },
        };
        let error = validate_chat_event(&event).expect_err("missing token should fail");
        assert!(error
            .to_string()
            .contains("incomplete interaction reference"));
    }
}
