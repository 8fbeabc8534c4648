//! End-to-end lifecycle scenarios across engine, store, and chat fake.

use std::sync::Arc;
use std::time::Duration;

use atelier_chat::{Actor, ChatApi, ChatMessage, InMemoryChat};
use atelier_config::{ConfigStore, CONFIG_FILE_NAME};
use atelier_orders::{
    EngineDelays, OrderEngine, OrderForm, OrderStore, PaymentPhase, ProgressDirection,
    ORDERS_FILE_NAME,
};

fn customer(user_id: &str, name: &str) -> Actor {
    Actor {
        user_id: user_id.to_string(),
        display_name: name.to_string(),
        role_ids: Vec::new(),
        is_admin: false,
    }
}

fn staff(user_id: &str, name: &str) -> Actor {
    Actor {
        user_id: user_id.to_string(),
        display_name: name.to_string(),
        role_ids: vec!["role-7".to_string()],
        is_admin: false,
    }
}

fn sample_form(kind: &str) -> OrderForm {
    OrderForm {
        order_type: kind.to_string(),
        description: format!("encomenda de {kind}"),
        attachments: None,
        deadline: None,
    }
}

fn build_engine(dir: &std::path::Path, chat: Arc<InMemoryChat>) -> OrderEngine {
    let config = Arc::new(ConfigStore::load(dir.join(CONFIG_FILE_NAME)).expect("config"));
    if config.snapshot().support_role_id.is_none() {
        config.set_support_role("role-7").expect("role");
        config.set_pix_key("chave@exemplo.com").expect("pix");
    }
    let store = Arc::new(OrderStore::load(dir.join(ORDERS_FILE_NAME)).expect("orders"));
    OrderEngine::new(chat, config, store, EngineDelays::immediate())
}

async fn created_channel(chat: &InMemoryChat, guild_id: &str) -> String {
    chat.list_guild_channels(guild_id)
        .await
        .expect("list channels")
        .pop()
        .expect("channel should exist")
        .channel_id
}

#[tokio::test]
async fn integration_orders_survive_process_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(InMemoryChat::new());
    let owner = customer("user-1", "Ana");
    let operator = staff("staff-1", "Bruno");

    let channel = {
        let engine = build_engine(dir.path(), chat.clone());
        engine
            .create(&owner, "guild-1", sample_form("logo"))
            .await
            .expect("create");
        let channel = created_channel(&chat, "guild-1").await;
        engine
            .finalize(&operator, &channel, "80,00")
            .await
            .expect("finalize");
        channel
        // Engine dropped here: simulated process exit.
    };

    // A fresh engine over the same state directory picks the order back up.
    let engine = build_engine(dir.path(), chat.clone());
    let duplicate = engine
        .create(&owner, "guild-1", sample_form("banner"))
        .await
        .expect_err("registry must survive restart");
    assert!(duplicate.to_string().contains(&channel));

    engine
        .request_payment(&owner, &channel, None)
        .await
        .expect("request payment after restart");
    tokio::time::sleep(Duration::from_millis(30)).await;
    engine
        .confirm_payment(&operator, &channel)
        .await
        .expect("confirm payment after restart");
    assert_eq!(
        engine.payments().phase(&channel),
        Some(PaymentPhase::Confirmed)
    );
}

#[tokio::test]
async fn integration_concurrent_progress_stays_on_grid_per_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(InMemoryChat::new());
    let engine = Arc::new(build_engine(dir.path(), chat.clone()));
    let operator = staff("staff-1", "Bruno");

    engine
        .create(&customer("user-1", "Ana"), "guild-1", sample_form("logo"))
        .await
        .expect("create first");
    engine
        .create(&customer("user-2", "Zeca"), "guild-1", sample_form("banner"))
        .await
        .expect("create second");
    let channels = chat
        .list_guild_channels("guild-1")
        .await
        .expect("list")
        .into_iter()
        .map(|info| info.channel_id)
        .collect::<Vec<_>>();
    assert_eq!(channels.len(), 2);

    let mut handles = Vec::new();
    for channel in &channels {
        for _ in 0..4u32 {
            let engine = engine.clone();
            let operator = operator.clone();
            let channel = channel.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .adjust_progress(&operator, &channel, ProgressDirection::Increase)
                    .await
                    .expect("adjust progress");
            }));
        }
    }
    for handle in handles {
        handle.await.expect("task");
    }

    // Four increments of 10% per channel, regardless of interleaving.
    for channel in &channels {
        let (_, summary) = chat
            .live_messages_in(channel)
            .into_iter()
            .next()
            .expect("summary");
        let progress = summary.embeds[0]
            .field_value("Progresso")
            .expect("progress field");
        assert!(progress.contains("40%"), "unexpected progress: {progress}");
    }
}

#[tokio::test]
async fn integration_transcript_reaches_owner_with_channel_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(InMemoryChat::new());
    let engine = build_engine(dir.path(), chat.clone());
    let owner = customer("user-1", "Ana");
    let operator = staff("staff-1", "Bruno");

    engine
        .create(&owner, "guild-1", sample_form("logo"))
        .await
        .expect("create");
    let channel = created_channel(&chat, "guild-1").await;
    chat.seed_history(
        &channel,
        ChatMessage {
            message_id: "m-customer".to_string(),
            author_id: "user-1".to_string(),
            author_display: "Ana".to_string(),
            author_is_bot: false,
            timestamp_ms: 500,
            content: "segue o comprovante".to_string(),
            embed_titles: Vec::new(),
            attachment_count: 1,
        },
    );

    engine
        .finalize(&operator, &channel, "80,00")
        .await
        .expect("finalize");
    engine
        .request_payment(&owner, &channel, None)
        .await
        .expect("request");
    tokio::time::sleep(Duration::from_millis(30)).await;
    engine
        .confirm_payment(&operator, &channel)
        .await
        .expect("confirm");

    let dms = chat.direct_messages_to("user-1");
    let transcript = dms
        .iter()
        .filter_map(|message| message.content.as_deref())
        .find(|content| content.contains("Transcrição do canal"))
        .expect("transcript dm should arrive");
    assert!(transcript.contains("segue o comprovante"));
    assert!(transcript.contains("(+1 anexos)"));
}

#[tokio::test]
async fn integration_close_cancels_pending_timers_and_deletes_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chat = Arc::new(InMemoryChat::new());
    let engine = build_engine(dir.path(), chat.clone());
    let owner = customer("user-1", "Ana");
    let operator = staff("staff-1", "Bruno");

    engine
        .create(&owner, "guild-1", sample_form("logo"))
        .await
        .expect("create");
    let channel = created_channel(&chat, "guild-1").await;
    engine
        .close_confirmed(&operator, &channel)
        .await
        .expect("close");
    tokio::time::sleep(Duration::from_millis(30)).await;

    let (_, deleted) = chat.channel(&channel).expect("channel record");
    assert!(deleted, "channel should be deleted after the pacing delay");
    // The owner may open a new order immediately.
    engine
        .create(&owner, "guild-1", sample_form("banner"))
        .await
        .expect("create after close");
}
