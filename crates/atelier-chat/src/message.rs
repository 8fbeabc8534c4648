//! Outbound message, embed, and component types plus channel descriptors.
//!
//! These are plain data carried across the [`crate::ChatApi`] boundary; the
//! Discord client shapes them into REST payloads and the in-memory fake
//! records them verbatim for assertions.

use serde::{Deserialize, Serialize};

/// Hard cap a single Discord message body may carry.
pub const DISCORD_SAFE_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<String>,
}

impl Embed {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn add_field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ButtonStyle` values.
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    pub fn code(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    #[serde(default)]
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectMenu {
    pub custom_id: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// One action row worth of interactive components.
pub enum Component {
    Buttons(Vec<Button>),
    Select(SelectMenu),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn with_components(mut self, row: Component) -> Self {
        self.components.push(row);
        self
    }

    pub fn first_embed_title(&self) -> Option<&str> {
        self.embeds.first().and_then(|embed| embed.title.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    pub custom_id: String,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalSpec {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<TextInput>,
}

/// One message of fetched channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub author_id: String,
    pub author_display: String,
    #[serde(default)]
    pub author_is_bot: bool,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embed_titles: Vec<String>,
    #[serde(default)]
    pub attachment_count: usize,
}

impl ChatMessage {
    pub fn has_embeds(&self) -> bool {
        !self.embed_titles.is_empty()
    }
}

/// Request to create a private order channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub guild_id: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub owner_user_id: String,
    #[serde(default)]
    pub support_role_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChannel {
    pub channel_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub name: String,
}

/// Lowercases and hyphenates a display name into a channel-safe label.
pub fn sanitize_channel_label(raw: &str) -> String {
    let mut label = String::new();
    let mut last_was_dash = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            label.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !label.is_empty() {
            label.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = label.trim_matches('-');
    let mut result = trimmed.chars().take(30).collect::<String>();
    result = result.trim_matches('-').to_string();
    if result.is_empty() {
        "usuario".to_string()
    } else {
        result
    }
}

/// Splits text into chunks no longer than `max_chars`, preferring line breaks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let mut buffer = String::new();
            let mut buffer_len = 0usize;
            for ch in line.chars() {
                if buffer_len == max_chars {
                    chunks.push(std::mem::take(&mut buffer));
                    buffer_len = 0;
                }
                buffer.push(ch);
                buffer_len += 1;
            }
            if buffer_len > 0 {
                current = buffer;
                current_len = buffer_len;
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }
    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}
