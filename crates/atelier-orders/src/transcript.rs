//! Channel-history transcript rendering.
//!
//! A pure function of the fetched history: the same messages always produce
//! the same document, except for the generation timestamp in the footer.
//! Failure to build or deliver a transcript never blocks delivery
//! confirmation; callers fall back to a plain notice.

use atelier_chat::ChatMessage;

use crate::projection::format_timestamp;

/// Bounded history window a transcript covers.
pub const TRANSCRIPT_HISTORY_LIMIT: usize = 100;

/// Renders the ordered history of a channel into a static text document.
///
/// Messages are sorted ascending by timestamp (id as tie-break) regardless of
/// the fetch order the platform returned.
pub fn render_transcript(
    channel_name: &str,
    messages: &[ChatMessage],
    generated_unix_ms: u64,
) -> String {
    let mut ordered = messages.to_vec();
    ordered.sort_by(|left, right| {
        left.timestamp_ms
            .cmp(&right.timestamp_ms)
            .then_with(|| left.message_id.cmp(&right.message_id))
    });

    let mut document = String::new();
    document.push_str(&format!("Transcrição do canal #{channel_name}\n"));
    document.push_str(&format!("{} mensagens\n", ordered.len()));
    document.push_str("----------------------------------------\n");
    for message in &ordered {
        let mut line = format!(
            "[{}] {}: {}",
            format_timestamp(message.timestamp_ms),
            message.author_display,
            message.content
        );
        if message.attachment_count > 0 {
            line.push_str(&format!(" (+{} anexos)", message.attachment_count));
        }
        if message.content.is_empty() && !message.embed_titles.is_empty() {
            line.push_str(&format!("[embed: {}]", message.embed_titles.join(", ")));
        }
        document.push_str(&line);
        document.push('\n');
    }
    document.push_str("----------------------------------------\n");
    document.push_str(&format!("Gerado em {}\n", format_timestamp(generated_unix_ms)));
    document
}
