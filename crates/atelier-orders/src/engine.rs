//! The order lifecycle engine: single authority for state transitions.
//!
//! Every mutating operation authorizes the actor, serializes on the target
//! channel's lock, mutates the durable record, and re-projects the rendered
//! state. Best-effort side effects (DMs, log entries, cleanup deletes) are
//! logged and swallowed; critical effects (channel creation, record
//! persistence, the messages that carry workflow buttons) abort the
//! operation.

use std::sync::Arc;
use std::time::Duration;

use atelier_chat::{sanitize_channel_label, Actor, ChannelSpec, ChatApi, OutboundMessage};
use atelier_config::ConfigStore;
use atelier_core::current_unix_timestamp_ms;

use crate::deferred::DeferredTasks;
use crate::error::OrderError;
use crate::locks::ChannelLocks;
use crate::notify::Notifier;
use crate::projection::{
    cancel_prompt_message, cancellation_notice_message, close_prompt_message, completion_message,
    delivery_confirmation_message, order_log_message, payment_confirmation_prompt,
    payment_instructions_message, rejection_notice_message, summary_message, SUMMARY_TITLE,
};
use crate::record::{
    step_progress, OrderForm, OrderRecord, OrderStatus, PaymentPhase, ProgressDirection,
    OPEN_CHANNEL_PREFIX,
};
use crate::store::{ChannelRegistry, OrderStore, PaymentTracker};
use crate::transcript::{render_transcript, TRANSCRIPT_HISTORY_LIMIT};

const SUMMARY_SCAN_LIMIT: usize = 100;

const DM_ORDER_CREATED: &str = "Sua encomenda foi criada com sucesso";
const DM_ORDER_UPDATED: &str =
    "Olá, seu pedido recebeu uma atualização. Por favor, verifique no canal de atendimento.";
const DM_TRANSCRIPT_FALLBACK: &str =
    "Sua entrega foi confirmada! Não foi possível gerar a transcrição do atendimento.";
const DM_PAYMENT_REJECTED: &str =
    "Seu comprovante de pagamento não foi aceito. Verifique o canal e tente novamente.";
const DM_ORDER_CANCELED: &str =
    "Sua encomenda foi cancelada. Se precisar, abra uma nova a qualquer momento.";

/// Workflow pacing delays. These are scheduling devices, not retries.
#[derive(Debug, Clone)]
pub struct EngineDelays {
    /// Grace period before a canceled/closed channel is deleted.
    pub channel_deletion: Duration,
    /// Time the customer gets to pay before staff see the confirm prompt.
    pub payment_prompt: Duration,
    /// Lifetime of the auto-deleted payment-rejection notice.
    pub rejection_notice: Duration,
}

impl Default for EngineDelays {
    fn default() -> Self {
        Self {
            channel_deletion: Duration::from_secs(5),
            payment_prompt: Duration::from_secs(60),
            rejection_notice: Duration::from_secs(10),
        }
    }
}

impl EngineDelays {
    /// Millisecond pacing for tests.
    pub fn immediate() -> Self {
        Self {
            channel_deletion: Duration::from_millis(1),
            payment_prompt: Duration::from_millis(1),
            rejection_notice: Duration::from_millis(1),
        }
    }
}

/// Private reply delivered to the acting user after an operation.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub message: OutboundMessage,
    pub ephemeral: bool,
}

impl EngineReply {
    pub fn private(text: impl Into<String>) -> Self {
        Self {
            message: OutboundMessage::text(text),
            ephemeral: true,
        }
    }

    pub fn private_message(message: OutboundMessage) -> Self {
        Self {
            message,
            ephemeral: true,
        }
    }
}

pub struct OrderEngine {
    chat: Arc<dyn ChatApi>,
    config: Arc<ConfigStore>,
    store: Arc<OrderStore>,
    registry: ChannelRegistry,
    payments: PaymentTracker,
    locks: ChannelLocks,
    deferred: Arc<DeferredTasks>,
    notifier: Notifier,
    delays: EngineDelays,
}

impl OrderEngine {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        config: Arc<ConfigStore>,
        store: Arc<OrderStore>,
        delays: EngineDelays,
    ) -> Self {
        Self {
            registry: ChannelRegistry::new(store.clone()),
            payments: PaymentTracker::new(store.clone()),
            locks: ChannelLocks::new(),
            deferred: Arc::new(DeferredTasks::new()),
            notifier: Notifier::new(chat.clone()),
            chat,
            config,
            store,
            delays,
        }
    }

    pub fn payments(&self) -> &PaymentTracker {
        &self.payments
    }

    pub fn deferred(&self) -> &DeferredTasks {
        &self.deferred
    }

    // ---- authorization -------------------------------------------------

    fn is_support(&self, actor: &Actor) -> bool {
        if actor.is_admin {
            return true;
        }
        self.config
            .snapshot()
            .support_role_id
            .map(|role_id| actor.has_role(&role_id))
            .unwrap_or(false)
    }

    fn authorize_support(&self, actor: &Actor) -> Result<(), OrderError> {
        if self.is_support(actor) {
            Ok(())
        } else {
            Err(OrderError::NotAuthorized)
        }
    }

    fn authorize_owner_or_support(
        &self,
        actor: &Actor,
        record: &OrderRecord,
    ) -> Result<(), OrderError> {
        if actor.user_id == record.owner_id || self.is_support(actor) {
            Ok(())
        } else {
            Err(OrderError::NotAuthorized)
        }
    }

    fn require_record(&self, channel_id: &str) -> Result<OrderRecord, OrderError> {
        self.store.get(channel_id).ok_or(OrderError::UnknownChannel)
    }

    // ---- summary projection --------------------------------------------

    /// Locates the summary message: the recorded id when it still exists,
    /// otherwise the unique bot-authored embed with the sentinel title in the
    /// recent-history window.
    async fn resolve_summary_message(&self, record: &OrderRecord) -> Result<String, OrderError> {
        let history = self
            .chat
            .fetch_recent_messages(&record.channel_id, SUMMARY_SCAN_LIMIT)
            .await?;
        if let Some(recorded_id) = &record.summary_message_id {
            if history
                .iter()
                .any(|message| &message.message_id == recorded_id)
            {
                return Ok(recorded_id.clone());
            }
        }
        history
            .iter()
            .find(|message| {
                message.author_is_bot
                    && message.embed_titles.iter().any(|title| title == SUMMARY_TITLE)
            })
            .map(|message| message.message_id.clone())
            .ok_or(OrderError::SummaryMissing)
    }

    async fn project_summary(
        &self,
        record: &OrderRecord,
        summary_message_id: &str,
    ) -> Result<(), OrderError> {
        let support_role_id = self.config.snapshot().support_role_id;
        self.chat
            .edit_message(
                &record.channel_id,
                summary_message_id,
                summary_message(record, support_role_id.as_deref()),
            )
            .await?;
        Ok(())
    }

    async fn log_event(&self, record: &OrderRecord, opened: bool, event: &str) {
        let config = self.config.snapshot();
        let target = if opened {
            config.open_log_channel_id
        } else {
            config.closed_log_channel_id
        };
        let Some(log_channel_id) = target else {
            return;
        };
        let entry = order_log_message(record, event, current_unix_timestamp_ms());
        if let Err(error) = self.chat.send_message(&log_channel_id, entry).await {
            tracing::warn!("failed to write order log entry: {error:#}");
        }
    }

    // ---- lifecycle operations ------------------------------------------

    /// Creates the private order channel, posts the summary, and registers
    /// the record. Rejects when the actor already has an active order.
    pub async fn create(
        &self,
        actor: &Actor,
        guild_id: &str,
        form: OrderForm,
    ) -> Result<EngineReply, OrderError> {
        // Serialize per owner so two rapid submissions cannot both pass the
        // registry check while neither channel exists yet.
        let owner_key = format!("owner:{}", actor.user_id);
        let _owner_guard = self.locks.acquire(&owner_key).await;

        if let Some(channel_id) = self.registry.active_channel_for(&actor.user_id) {
            return Err(OrderError::DuplicateOrder { channel_id });
        }

        let config = self.config.snapshot();
        let label = sanitize_channel_label(&actor.display_name);
        let created = self
            .chat
            .create_channel(ChannelSpec {
                guild_id: guild_id.to_string(),
                name: format!("{OPEN_CHANNEL_PREFIX}-{label}"),
                category_id: config.order_category_id.clone(),
                owner_user_id: actor.user_id.clone(),
                support_role_id: config.support_role_id.clone(),
            })
            .await
            .map_err(|error| {
                tracing::error!("order channel creation failed: {error:#}");
                OrderError::ChannelCreation(error)
            })?;

        let mut record = OrderRecord::new(
            created.channel_id.clone(),
            guild_id.to_string(),
            actor.user_id.clone(),
            actor.display_name.clone(),
            label,
            form,
            current_unix_timestamp_ms(),
        );
        let summary_id = self
            .chat
            .send_message(
                &record.channel_id,
                summary_message(&record, config.support_role_id.as_deref()),
            )
            .await?;
        record.summary_message_id = Some(summary_id);
        self.store
            .insert(record.clone())
            .map_err(OrderError::Storage)?;

        self.log_event(&record, true, "aberta").await;
        self.notifier
            .dm_text_best_effort(
                &record.owner_id,
                &format!("{}: {}", DM_ORDER_CREATED, record.channel_name()),
            )
            .await;
        Ok(EngineReply::private(format!(
            "Encomenda recebida! Seu canal privado: <#{}>",
            record.channel_id
        )))
    }

    /// Marks the order as in production via channel rename. Explicitly
    /// idempotent when the order is already in production.
    pub async fn set_in_progress(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        match record.status {
            OrderStatus::InProduction => {
                return Ok(EngineReply::private("A encomenda já está em produção."));
            }
            OrderStatus::Open => {}
            status => return Err(OrderError::InvalidStatus { status }),
        }
        let mut renamed = record;
        renamed.status = OrderStatus::InProduction;
        self.chat
            .rename_channel(channel_id, &renamed.channel_name())
            .await?;
        self.store
            .update(channel_id, |record| {
                record.status = OrderStatus::InProduction;
            })
            .map_err(OrderError::Storage)?;
        Ok(EngineReply::private("Status atualizado para Em Andamento."))
    }

    /// Finalizes with a value: replaces the summary with the completion
    /// message carrying the pay action.
    pub async fn finalize(
        &self,
        actor: &Actor,
        channel_id: &str,
        value: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(OrderError::EmptyValue);
        }
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        if !matches!(record.status, OrderStatus::Open | OrderStatus::InProduction) {
            return Err(OrderError::InvalidStatus {
                status: record.status,
            });
        }

        // The summary is replaced by the completion message; a summary that
        // already disappeared is not an obstacle.
        match self.resolve_summary_message(&record).await {
            Ok(summary_id) => {
                if let Err(error) = self.chat.delete_message(channel_id, &summary_id).await {
                    tracing::warn!("failed to delete summary before finalize: {error:#}");
                }
            }
            Err(OrderError::SummaryMissing) => {}
            Err(other) => return Err(other),
        }

        let mut finalized = record;
        finalized.status = OrderStatus::Finalized;
        finalized.value = Some(trimmed.to_string());
        finalized.summary_message_id = None;
        self.chat
            .rename_channel(channel_id, &finalized.channel_name())
            .await?;
        self.chat
            .send_message(
                channel_id,
                completion_message(&finalized, current_unix_timestamp_ms()),
            )
            .await?;
        self.store
            .update(channel_id, |record| {
                record.status = OrderStatus::Finalized;
                record.value = Some(trimmed.to_string());
                record.summary_message_id = None;
            })
            .map_err(OrderError::Storage)?;

        self.notifier
            .dm_text_best_effort(
                &finalized.owner_id,
                &format!(
                    "Sua encomenda foi finalizada! Valor: {trimmed}. Use o botão 💰 no canal para pagar."
                ),
            )
            .await;
        Ok(EngineReply::private("Encomenda finalizada com sucesso!"))
    }

    /// Claims the order for the acting staff member. Remove-then-add keeps a
    /// single handler field even across competing claims.
    pub async fn claim(&self, actor: &Actor, channel_id: &str) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        let summary_id = self.resolve_summary_message(&record).await?;
        let handler = actor.display_name.clone();
        let updated = self
            .store
            .update(channel_id, move |record| {
                record.assigned_handler = Some(handler);
                record.clone()
            })
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::UnknownChannel)?;
        self.project_summary(&updated, &summary_id).await?;
        Ok(EngineReply::private(
            "Você assumiu a produção desta encomenda!",
        ))
    }

    pub async fn release(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        let summary_id = self.resolve_summary_message(&record).await?;
        let updated = self
            .store
            .update(channel_id, |record| {
                record.assigned_handler = None;
                record.clone()
            })
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::UnknownChannel)?;
        self.project_summary(&updated, &summary_id).await?;
        Ok(EngineReply::private(
            "Você desistiu da produção. A responsabilidade foi removida.",
        ))
    }

    /// Steps progress by ±10%, clamped to [0, 100], and re-renders the bar.
    pub async fn adjust_progress(
        &self,
        actor: &Actor,
        channel_id: &str,
        direction: ProgressDirection,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        let summary_id = self.resolve_summary_message(&record).await?;
        let updated = self
            .store
            .update(channel_id, |record| {
                record.progress_percent = step_progress(record.progress_percent, direction);
                record.clone()
            })
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::UnknownChannel)?;
        self.project_summary(&updated, &summary_id).await?;
        Ok(EngineReply::private(format!(
            "Progresso atualizado para {}%.",
            updated.progress_percent
        )))
    }

    /// Applies a status-note choice from the staff select menu and notifies
    /// the owner.
    pub async fn set_status_note(
        &self,
        actor: &Actor,
        channel_id: &str,
        choice: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let note = match choice {
            "trabalhando" => "Estamos trabalhando no seu pedido!",
            "aguardando" => "Aguardando aprovação antes da entrega final.",
            "finalizado" => "Pedido finalizado, obrigado!",
            _ => return Err(OrderError::UnknownStatusChoice),
        };
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        let summary_id = self.resolve_summary_message(&record).await?;
        let updated = self
            .store
            .update(channel_id, |record| {
                record.status_note = Some(note.to_string());
                record.clone()
            })
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::UnknownChannel)?;
        self.project_summary(&updated, &summary_id).await?;
        self.notifier
            .dm_text_best_effort(
                &updated.owner_id,
                &format!("Seu pedido foi atualizado: {note}"),
            )
            .await;
        Ok(EngineReply::private("Status atualizado com sucesso!"))
    }

    /// DMs the owner a generic update notice; the DM outcome is reported to
    /// the actor instead of failing the operation.
    pub async fn notify_owner(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let record = self.require_record(channel_id)?;
        match self.notifier.dm_text(&record.owner_id, DM_ORDER_UPDATED).await {
            Ok(()) => Ok(EngineReply::private("Cliente notificado com sucesso.")),
            Err(error) => {
                tracing::warn!("failed to notify order owner: {error:#}");
                Ok(EngineReply::private("Falha ao notificar o cliente."))
            }
        }
    }

    /// Posts the payment key and schedules the support confirmation prompt.
    pub async fn request_payment(
        &self,
        actor: &Actor,
        channel_id: &str,
        trigger_message_id: Option<&str>,
    ) -> Result<EngineReply, OrderError> {
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        if actor.user_id != record.owner_id && !self.is_support(actor) {
            return Err(OrderError::NotAuthorized);
        }
        if record.status != OrderStatus::Finalized {
            return Err(OrderError::InvalidStatus {
                status: record.status,
            });
        }
        let Some(pix_key) = self.config.snapshot().pix_key else {
            return Err(OrderError::PaymentKeyMissing);
        };
        if !record
            .payment_phase
            .allows_transition_to(PaymentPhase::AwaitingRequest)
        {
            return Err(OrderError::InvalidPaymentPhase {
                phase: record.payment_phase,
            });
        }

        self.store
            .update(channel_id, |record| {
                record.payment_phase = PaymentPhase::AwaitingRequest;
            })
            .map_err(OrderError::Storage)?;
        let value = self
            .payments
            .owner_and_value(channel_id)
            .and_then(|(_, value)| value);
        self.chat
            .send_message(
                channel_id,
                payment_instructions_message(&pix_key, value.as_deref()),
            )
            .await?;
        if let Some(trigger) = trigger_message_id {
            if let Err(error) = self.chat.delete_message(channel_id, trigger).await {
                tracing::warn!("failed to delete pay trigger message: {error:#}");
            }
        }
        self.schedule_confirmation_prompt(channel_id);
        Ok(EngineReply::private("Instruções de pagamento enviadas!"))
    }

    /// Confirms payment: purges stale bot embeds, posts exactly one delivery
    /// confirmation, and delivers the transcript (with plain-text fallback).
    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        if record.payment_phase != PaymentPhase::AwaitingConfirmation {
            return Err(OrderError::InvalidPaymentPhase {
                phase: record.payment_phase,
            });
        }

        // Cleanup pass over recent bot-authored embeds, best-effort.
        match self
            .chat
            .fetch_recent_messages(channel_id, SUMMARY_SCAN_LIMIT)
            .await
        {
            Ok(history) => {
                for message in history {
                    if message.author_is_bot && message.has_embeds() {
                        if let Err(error) = self
                            .chat
                            .delete_message(channel_id, &message.message_id)
                            .await
                        {
                            tracing::warn!("failed to purge bot embed message: {error:#}");
                        }
                    }
                }
            }
            Err(error) => tracing::warn!("failed to fetch history for purge: {error:#}"),
        }

        self.chat
            .send_message(channel_id, delivery_confirmation_message(&record))
            .await?;
        let updated = self
            .store
            .update(channel_id, |record| {
                record.payment_phase = PaymentPhase::Confirmed;
                record.clone()
            })
            .map_err(OrderError::Storage)?
            .ok_or(OrderError::UnknownChannel)?;
        // Any still-pending prompt timer is superseded by the confirmation.
        self.deferred.cancel_channel(channel_id);

        match self
            .chat
            .fetch_recent_messages(channel_id, TRANSCRIPT_HISTORY_LIMIT)
            .await
        {
            Ok(history) => {
                let document = render_transcript(
                    &updated.channel_name(),
                    &history,
                    current_unix_timestamp_ms(),
                );
                if let Err(error) = self
                    .notifier
                    .dm_document(&updated.owner_id, &document)
                    .await
                {
                    tracing::warn!("transcript delivery failed: {error:#}");
                    self.notifier
                        .dm_text_best_effort(&updated.owner_id, DM_TRANSCRIPT_FALLBACK)
                        .await;
                }
            }
            Err(error) => {
                tracing::warn!("transcript generation failed: {error:#}");
                self.notifier
                    .dm_text_best_effort(&updated.owner_id, DM_TRANSCRIPT_FALLBACK)
                    .await;
            }
        }
        Ok(EngineReply::private("Pagamento confirmado e entrega liberada!"))
    }

    /// Rejects payment: the order returns to the re-requestable state and the
    /// notice cleans itself up after a delay.
    pub async fn reject_payment(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        if record.payment_phase != PaymentPhase::AwaitingConfirmation {
            return Err(OrderError::InvalidPaymentPhase {
                phase: record.payment_phase,
            });
        }
        self.store
            .update(channel_id, |record| {
                record.payment_phase = PaymentPhase::Rejected;
            })
            .map_err(OrderError::Storage)?;
        let notice_id = self
            .chat
            .send_message(channel_id, rejection_notice_message())
            .await?;
        let chat = self.chat.clone();
        let channel = channel_id.to_string();
        self.deferred
            .schedule(channel_id, self.delays.rejection_notice, async move {
                if let Err(error) = chat.delete_message(&channel, &notice_id).await {
                    tracing::debug!("rejection notice already gone: {error:#}");
                }
            });
        self.notifier
            .dm_text_best_effort(&record.owner_id, DM_PAYMENT_REJECTED)
            .await;
        Ok(EngineReply::private("Pagamento rejeitado."))
    }

    /// First step of cancellation: the explicit confirm/abort prompt.
    pub async fn cancel_prompt(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        let record = self.require_record(channel_id)?;
        self.authorize_owner_or_support(actor, &record)?;
        Ok(EngineReply::private_message(cancel_prompt_message()))
    }

    pub async fn cancel_confirmed(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        self.authorize_owner_or_support(actor, &record)?;
        let by_staff = self.is_support(actor);

        if let Err(error) = self
            .chat
            .send_message(channel_id, cancellation_notice_message(by_staff))
            .await
        {
            tracing::warn!("failed to post cancellation notice: {error:#}");
        }
        let mut closed = record.clone();
        closed.status = OrderStatus::Canceled;
        self.log_event(&closed, false, "cancelada").await;

        self.deferred.cancel_channel(channel_id);
        self.store.remove(channel_id).map_err(OrderError::Storage)?;
        self.notifier
            .dm_text_best_effort(&record.owner_id, DM_ORDER_CANCELED)
            .await;
        self.schedule_channel_deletion(channel_id);
        Ok(EngineReply::private(
            "Encomenda cancelada. O canal será excluído.",
        ))
    }

    pub fn cancel_aborted(&self) -> EngineReply {
        EngineReply::private("Cancelamento abortado.")
    }

    /// First step of closing: support-only confirm prompt.
    pub async fn close_prompt(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        self.require_record(channel_id)?;
        Ok(EngineReply::private_message(close_prompt_message()))
    }

    pub async fn close_confirmed(
        &self,
        actor: &Actor,
        channel_id: &str,
    ) -> Result<EngineReply, OrderError> {
        self.authorize_support(actor)?;
        let _guard = self.locks.acquire(channel_id).await;
        let record = self.require_record(channel_id)?;
        self.log_event(&record, false, "fechada").await;
        self.deferred.cancel_channel(channel_id);
        self.store.remove(channel_id).map_err(OrderError::Storage)?;
        self.schedule_channel_deletion(channel_id);
        Ok(EngineReply::private(
            "Canal de encomenda fechado. Ele será excluído em instantes.",
        ))
    }

    pub fn close_aborted(&self) -> EngineReply {
        EngineReply::private("Fechamento abortado.")
    }

    /// Lists active orders from the durable store.
    pub fn list_orders(&self) -> EngineReply {
        let records = self.store.all();
        if records.is_empty() {
            return EngineReply::private("Nenhuma encomenda ativa encontrada.");
        }
        let mut lines = vec!["Encomendas ativas:".to_string()];
        for record in records {
            lines.push(format!(
                "- {} — {}",
                record.channel_name(),
                record.status.label()
            ));
        }
        EngineReply::private(lines.join("\n"))
    }

    // ---- deferred actions ----------------------------------------------

    fn schedule_confirmation_prompt(&self, channel_id: &str) {
        let chat = self.chat.clone();
        let store = self.store.clone();
        let locks = self.locks.clone();
        let config = self.config.clone();
        let channel = channel_id.to_string();
        self.deferred
            .schedule(channel_id, self.delays.payment_prompt, async move {
                let _guard = locks.acquire(&channel).await;
                let Some(record) = store.get(&channel) else {
                    return;
                };
                if record.payment_phase != PaymentPhase::AwaitingRequest {
                    return;
                }
                let support_role_id = config.snapshot().support_role_id;
                if let Err(error) = chat
                    .send_message(
                        &channel,
                        payment_confirmation_prompt(support_role_id.as_deref()),
                    )
                    .await
                {
                    tracing::warn!("failed to post payment confirmation prompt: {error:#}");
                    return;
                }
                if let Err(error) = store.update(&channel, |record| {
                    record.payment_phase = PaymentPhase::AwaitingConfirmation;
                }) {
                    tracing::warn!("failed to persist awaiting_confirmation phase: {error:#}");
                }
            });
    }

    fn schedule_channel_deletion(&self, channel_id: &str) {
        let chat = self.chat.clone();
        let channel = channel_id.to_string();
        self.deferred
            .schedule(channel_id, self.delays.channel_deletion, async move {
                if let Err(error) = chat.delete_channel(&channel).await {
                    tracing::debug!("channel already gone before scheduled deletion: {error:#}");
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::{EngineDelays, OrderEngine};
    use crate::error::OrderError;
    use crate::record::{OrderForm, PaymentPhase, ProgressDirection};
    use crate::store::{OrderStore, ORDERS_FILE_NAME};
    use atelier_chat::{Actor, ChatApi, InMemoryChat};
    use atelier_config::{ConfigStore, CONFIG_FILE_NAME};

    struct Harness {
        chat: Arc<InMemoryChat>,
        engine: OrderEngine,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().expect("tempdir");
        let chat = Arc::new(InMemoryChat::new());
        let config =
            Arc::new(ConfigStore::load(dir.path().join(CONFIG_FILE_NAME)).expect("config"));
        config.set_support_role("role-7").expect("role");
        config.set_pix_key("chave@exemplo.com").expect("pix");
        let store =
            Arc::new(OrderStore::load(dir.path().join(ORDERS_FILE_NAME)).expect("orders"));
        let engine = OrderEngine::new(
            chat.clone(),
            config,
            store,
            EngineDelays::immediate(),
        );
        Harness {
            chat,
            engine,
            _dir: dir,
        }
    }

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

    fn sample_form() -> OrderForm {
        OrderForm {
            order_type: "logo".to_string(),
            description: "um logo para a loja".to_string(),
            attachments: None,
            deadline: None,
        }
    }

    async fn create_order(h: &Harness, owner: &Actor) -> String {
        h.engine
            .create(owner, "guild-1", sample_form())
            .await
            .expect("create should succeed");
        h.chat
            .list_guild_channels("guild-1")
            .await
            .expect("list")
            .pop()
            .expect("channel should exist")
            .channel_id
    }

    #[tokio::test]
    async fn functional_second_create_for_same_owner_is_rejected() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        create_order(&h, &owner).await;
        let error = h
            .engine
            .create(&owner, "guild-1", sample_form())
            .await
            .expect_err("duplicate create should fail");
        assert!(matches!(error, OrderError::DuplicateOrder { .. }));
        assert_eq!(h.chat.channel_count(), 1);
    }

    #[tokio::test]
    async fn functional_claim_over_claim_keeps_exactly_one_handler() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let first = staff("staff-1", "Bruno");
        let second = staff("staff-2", "Carla");
        h.engine.claim(&first, &channel).await.expect("first claim");
        h.engine
            .claim(&second, &channel)
            .await
            .expect("second claim");

        let (summary_id, summary) = h
            .chat
            .live_messages_in(&channel)
            .into_iter()
            .next()
            .expect("summary message");
        assert!(!summary_id.is_empty());
        let handlers = summary.embeds[0]
            .fields
            .iter()
            .filter(|field| field.name == "Responsável")
            .collect::<Vec<_>>();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].value, "Carla");
    }

    #[tokio::test]
    async fn functional_progress_clamps_at_both_bounds() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let operator = staff("staff-1", "Bruno");

        let reply = h
            .engine
            .adjust_progress(&operator, &channel, ProgressDirection::Decrease)
            .await
            .expect("decrease at zero");
        assert!(reply
            .message
            .content
            .as_deref()
            .expect("reply text")
            .contains("0%"));

        for _ in 0..12 {
            h.engine
                .adjust_progress(&operator, &channel, ProgressDirection::Increase)
                .await
                .expect("increase");
        }
        let (_, summary) = h
            .chat
            .live_messages_in(&channel)
            .into_iter()
            .next()
            .expect("summary");
        assert!(summary.embeds[0]
            .field_value("Progresso")
            .expect("progress field")
            .contains("100%"));
    }

    #[tokio::test]
    async fn functional_cancel_by_unrelated_actor_is_rejected_without_side_effects() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let stranger = customer("user-2", "Zeca");

        let error = h
            .engine
            .cancel_confirmed(&stranger, &channel)
            .await
            .expect_err("stranger cannot cancel");
        assert!(matches!(error, OrderError::NotAuthorized));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let (_, deleted) = h.chat.channel(&channel).expect("channel record");
        assert!(!deleted);
        assert!(h.engine.payments().phase(&channel).is_some());
    }

    #[tokio::test]
    async fn functional_full_payment_flow_reaches_confirmed_with_one_confirmation() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let operator = staff("staff-1", "Bruno");

        h.engine
            .finalize(&operator, &channel, "50,00")
            .await
            .expect("finalize");
        h.engine
            .request_payment(&owner, &channel, None)
            .await
            .expect("request payment");
        // Wait for the deferred confirmation prompt.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            h.engine.payments().phase(&channel),
            Some(PaymentPhase::AwaitingConfirmation)
        );

        h.engine
            .confirm_payment(&operator, &channel)
            .await
            .expect("confirm payment");
        assert_eq!(
            h.engine.payments().phase(&channel),
            Some(PaymentPhase::Confirmed)
        );

        let confirmations = h
            .chat
            .live_messages_in(&channel)
            .into_iter()
            .filter(|(_, message)| {
                message.first_embed_title() == Some("📦 Entrega Confirmada")
            })
            .count();
        assert_eq!(confirmations, 1);

        // Prior bot embeds were purged: only the confirmation remains.
        let embeds_left = h
            .chat
            .live_messages_in(&channel)
            .into_iter()
            .filter(|(_, message)| !message.embeds.is_empty())
            .count();
        assert_eq!(embeds_left, 1);

        // Transcript (or fallback) reached the owner on top of earlier DMs.
        assert!(!h.chat.direct_messages_to("user-1").is_empty());
    }

    #[tokio::test]
    async fn functional_rejected_payment_can_be_requested_again_but_not_confirmed() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let operator = staff("staff-1", "Bruno");

        h.engine
            .finalize(&operator, &channel, "50,00")
            .await
            .expect("finalize");
        h.engine
            .request_payment(&owner, &channel, None)
            .await
            .expect("request");
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.engine
            .reject_payment(&operator, &channel)
            .await
            .expect("reject");
        assert_eq!(
            h.engine.payments().phase(&channel),
            Some(PaymentPhase::Rejected)
        );

        let error = h
            .engine
            .confirm_payment(&operator, &channel)
            .await
            .expect_err("confirm after reject must fail");
        assert!(matches!(error, OrderError::InvalidPaymentPhase { .. }));

        h.engine
            .request_payment(&owner, &channel, None)
            .await
            .expect("re-request after rejection");
        assert_eq!(
            h.engine.payments().phase(&channel),
            Some(PaymentPhase::AwaitingRequest)
        );
    }

    #[tokio::test]
    async fn regression_request_payment_without_pix_key_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let chat = Arc::new(InMemoryChat::new());
        let config =
            Arc::new(ConfigStore::load(dir.path().join(CONFIG_FILE_NAME)).expect("config"));
        config.set_support_role("role-7").expect("role");
        let store =
            Arc::new(OrderStore::load(dir.path().join(ORDERS_FILE_NAME)).expect("orders"));
        let engine =
            OrderEngine::new(chat.clone(), config, store, EngineDelays::immediate());
        let h = Harness {
            chat,
            engine,
            _dir: dir,
        };

        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        h.engine
            .finalize(&staff("staff-1", "Bruno"), &channel, "50,00")
            .await
            .expect("finalize");
        let error = h
            .engine
            .request_payment(&owner, &channel, None)
            .await
            .expect_err("missing pix key should fail");
        assert!(matches!(error, OrderError::PaymentKeyMissing));
        assert_eq!(
            h.engine.payments().phase(&channel),
            Some(PaymentPhase::None)
        );
    }

    #[tokio::test]
    async fn regression_set_in_progress_is_idempotent() {
        let h = harness();
        let owner = customer("user-1", "Ana");
        let channel = create_order(&h, &owner).await;
        let operator = staff("staff-1", "Bruno");
        h.engine
            .set_in_progress(&operator, &channel)
            .await
            .expect("first transition");
        let reply = h
            .engine
            .set_in_progress(&operator, &channel)
            .await
            .expect("second transition is a no-op");
        assert!(reply
            .message
            .content
            .as_deref()
            .expect("reply text")
            .contains("já está em produção"));
        let (name, _) = h.chat.channel(&channel).expect("channel");
        assert!(name.starts_with("🟡-producao"));
    }

    #[tokio::test]
    async fn regression_channel_creation_failure_leaves_no_record() {
        let h = harness();
        h.chat.set_fail_create_channel(true);
        let owner = customer("user-1", "Ana");
        let error = h
            .engine
            .create(&owner, "guild-1", sample_form())
            .await
            .expect_err("creation should fail");
        assert!(matches!(error, OrderError::ChannelCreation(_)));
        h.chat.set_fail_create_channel(false);
        // The failed attempt must not have claimed the owner's registry slot.
        h.engine
            .create(&owner, "guild-1", sample_form())
            .await
            .expect("retry after failure succeeds");
    }
}
