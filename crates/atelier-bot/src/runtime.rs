//! Gateway session loop: one retry on a failed initial connection, then the
//! error surfaces and the supervisor owns restart policy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use atelier_chat::{run_gateway, ChatEvent, GatewayConfig};

use crate::dispatch::{dispatch_event, BotContext};

const EVENT_QUEUE_CAPACITY: usize = 64;

pub(crate) async fn run(
    ctx: Arc<BotContext>,
    gateway: GatewayConfig,
    retry_delay: Duration,
) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel::<ChatEvent>(EVENT_QUEUE_CAPACITY);

    let dispatcher_ctx = ctx.clone();
    let dispatcher = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let ctx = dispatcher_ctx.clone();
            // One task per interaction: a slow channel never blocks others.
            tokio::spawn(async move {
                dispatch_event(&ctx, event).await;
            });
        }
    });

    let mut attempted_retry = false;
    let result = loop {
        match run_gateway(&gateway, events_tx.clone()).await {
            Ok(()) => break Ok(()),
            Err(error) if !attempted_retry => {
                attempted_retry = true;
                eprintln!("gateway session failed: {error:#}; retrying once in {retry_delay:?}");
                tokio::time::sleep(retry_delay).await;
            }
            Err(error) => break Err(error),
        }
    };

    drop(events_tx);
    let _ = dispatcher.await;
    result
}
