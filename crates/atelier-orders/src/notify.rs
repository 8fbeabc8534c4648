//! Best-effort direct-message delivery to order owners.

use std::sync::Arc;

use anyhow::Result;

use atelier_chat::{chunk_text, ChatApi, OutboundMessage, DISCORD_SAFE_MAX_CHARS};

#[derive(Clone)]
pub struct Notifier {
    chat: Arc<dyn ChatApi>,
}

impl Notifier {
    pub fn new(chat: Arc<dyn ChatApi>) -> Self {
        Self { chat }
    }

    /// Fire-and-forget DM. Failure is logged and reported as `false`; it
    /// never blocks the lifecycle operation that asked for it.
    pub async fn dm_text_best_effort(&self, user_id: &str, text: &str) -> bool {
        match self
            .chat
            .send_direct_message(user_id, OutboundMessage::text(text))
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!("failed to DM user {user_id}: {error:#}");
                false
            }
        }
    }

    /// DM whose failure the caller wants to observe (e.g. to tell staff the
    /// client could not be reached).
    pub async fn dm_text(&self, user_id: &str, text: &str) -> Result<()> {
        self.chat
            .send_direct_message(user_id, OutboundMessage::text(text))
            .await
            .map(|_| ())
    }

    /// Delivers a long document as a sequence of size-capped DMs.
    pub async fn dm_document(&self, user_id: &str, document: &str) -> Result<()> {
        for chunk in chunk_text(document, DISCORD_SAFE_MAX_CHARS) {
            self.chat
                .send_direct_message(user_id, OutboundMessage::text(chunk))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use atelier_chat::InMemoryChat;

    use super::Notifier;

    #[tokio::test]
    async fn unit_best_effort_dm_swallows_refusals() {
        let chat = Arc::new(InMemoryChat::new());
        chat.set_fail_direct_messages(true);
        let notifier = Notifier::new(chat.clone());
        assert!(!notifier.dm_text_best_effort("user-1", "oi").await);
        chat.set_fail_direct_messages(false);
        assert!(notifier.dm_text_best_effort("user-1", "oi").await);
        assert_eq!(chat.direct_messages_to("user-1").len(), 1);
    }

    #[tokio::test]
    async fn functional_long_document_is_chunked_across_dms() {
        let chat = Arc::new(InMemoryChat::new());
        let notifier = Notifier::new(chat.clone());
        let document = "linha\n".repeat(1_000);
        notifier
            .dm_document("user-1", &document)
            .await
            .expect("document delivery");
        let delivered = chat.direct_messages_to("user-1");
        assert!(delivered.len() > 1);
        let total: usize = delivered
            .iter()
            .map(|message| message.content.as_deref().unwrap_or_default().len())
            .sum();
        assert_eq!(total, document.len());
    }
}
