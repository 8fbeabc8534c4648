//! Maps inbound chat events onto engine and config operations.
//!
//! Every rejection and confirmation goes back as a private reply; broadcast
//! status updates are posted by the engine itself. A handler failure is
//! logged and answered, never propagated into the runtime loop.

use std::sync::Arc;

use atelier_chat::{validate_chat_event, Actor, ChatApi, ChatEvent, ModalSpec};
use atelier_config::ConfigStore;
use atelier_orders::projection::{
    finalize_modal, order_form_modal, order_panel_message, pix_config_message, pix_config_modal,
    staff_options_message,
};
use atelier_orders::{ids, EngineReply, OrderEngine, OrderForm, ProgressDirection};

pub struct BotContext {
    pub engine: OrderEngine,
    pub config: Arc<ConfigStore>,
    pub chat: Arc<dyn ChatApi>,
}

enum Outcome {
    Reply(EngineReply),
    Modal(ModalSpec),
}

/// Handles one inbound event end to end, including the interaction answer.
pub async fn dispatch_event(ctx: &BotContext, event: ChatEvent) {
    if let Err(error) = validate_chat_event(&event) {
        tracing::warn!("dropping malformed event: {error:#}");
        return;
    }
    let interaction = event.interaction().clone();
    match route(ctx, &event).await {
        Outcome::Reply(reply) => {
            if let Err(error) = ctx
                .chat
                .reply(&interaction, reply.message, reply.ephemeral)
                .await
            {
                tracing::warn!("failed to answer {} event: {error:#}", event.kind());
            }
        }
        Outcome::Modal(modal) => {
            if let Err(error) = ctx.chat.open_modal(&interaction, modal).await {
                tracing::warn!("failed to open modal for {} event: {error:#}", event.kind());
            }
        }
    }
}

fn actor_is_support(config: &ConfigStore, actor: &Actor) -> bool {
    if actor.is_admin {
        return true;
    }
    config
        .snapshot()
        .support_role_id
        .map(|role_id| actor.has_role(&role_id))
        .unwrap_or(false)
}

fn reply_from(result: Result<EngineReply, atelier_orders::OrderError>) -> Outcome {
    match result {
        Ok(reply) => Outcome::Reply(reply),
        Err(error) => {
            if matches!(
                error,
                atelier_orders::OrderError::Chat(_)
                    | atelier_orders::OrderError::Storage(_)
                    | atelier_orders::OrderError::ChannelCreation(_)
            ) {
                tracing::error!("lifecycle operation failed: {error:#}");
            }
            Outcome::Reply(EngineReply::private(error.to_string()))
        }
    }
}

fn not_authorized_reply() -> Outcome {
    Outcome::Reply(EngineReply::private(
        atelier_orders::OrderError::NotAuthorized.to_string(),
    ))
}

async fn route(ctx: &BotContext, event: &ChatEvent) -> Outcome {
    match event {
        ChatEvent::Command {
            name,
            guild_id: _,
            channel_id,
            actor,
            args,
            ..
        } => match name.as_str() {
            "encomenda" => match ctx
                .chat
                .send_message(channel_id, order_panel_message())
                .await
            {
                Ok(_) => Outcome::Reply(EngineReply::private("Painel de encomendas publicado.")),
                Err(error) => {
                    tracing::warn!("failed to post order panel: {error:#}");
                    Outcome::Reply(EngineReply::private(
                        "Não foi possível publicar o painel de encomendas.",
                    ))
                }
            },
            "listar" => Outcome::Reply(ctx.engine.list_orders()),
            "configpix" => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                let config = ctx.config.snapshot();
                Outcome::Reply(EngineReply::private_message(pix_config_message(
                    config.pix_key.as_deref(),
                )))
            }
            "suporte" => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                match args.get("cargo") {
                    Some(role_id) if !role_id.trim().is_empty() => {
                        match ctx.config.set_support_role(role_id) {
                            Ok(()) => Outcome::Reply(EngineReply::private(
                                "Cargo de suporte configurado.",
                            )),
                            Err(error) => {
                                tracing::error!("failed to persist support role: {error:#}");
                                Outcome::Reply(EngineReply::private(
                                    "Falha ao salvar a configuração.",
                                ))
                            }
                        }
                    }
                    _ => Outcome::Reply(EngineReply::private(
                        "Informe o cargo de suporte: /suporte cargo:<id>",
                    )),
                }
            }
            "categoria" => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                match args.get("categoria") {
                    Some(category_id) if !category_id.trim().is_empty() => {
                        match ctx.config.set_order_category(category_id) {
                            Ok(()) => Outcome::Reply(EngineReply::private(
                                "Categoria de encomendas configurada.",
                            )),
                            Err(error) => {
                                tracing::error!("failed to persist category: {error:#}");
                                Outcome::Reply(EngineReply::private(
                                    "Falha ao salvar a configuração.",
                                ))
                            }
                        }
                    }
                    _ => Outcome::Reply(EngineReply::private(
                        "Informe a categoria: /categoria categoria:<id>",
                    )),
                }
            }
            "logs" => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                let open = args.get("aberto").map(String::as_str);
                let closed = args.get("fechado").map(String::as_str);
                if open.is_none() && closed.is_none() {
                    return Outcome::Reply(EngineReply::private(
                        "Informe ao menos um canal: /logs aberto:<id> fechado:<id>",
                    ));
                }
                match ctx.config.set_log_channels(open, closed) {
                    Ok(()) => Outcome::Reply(EngineReply::private("Canais de log configurados.")),
                    Err(error) => {
                        tracing::error!("failed to persist log channels: {error:#}");
                        Outcome::Reply(EngineReply::private("Falha ao salvar a configuração."))
                    }
                }
            }
            "close" => reply_from(ctx.engine.close_prompt(actor, channel_id).await),
            _ => Outcome::Reply(EngineReply::private("Comando desconhecido.")),
        },

        ChatEvent::ButtonClick {
            custom_id,
            channel_id,
            message_id,
            actor,
            ..
        } => match custom_id.as_str() {
            ids::BTN_OPEN_ORDER_FORM => Outcome::Modal(order_form_modal()),
            ids::BTN_STATUS_IN_PROGRESS => {
                reply_from(ctx.engine.set_in_progress(actor, channel_id).await)
            }
            ids::BTN_STATUS_COMPLETE => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                Outcome::Modal(finalize_modal())
            }
            ids::BTN_STATUS_CANCEL => reply_from(ctx.engine.cancel_prompt(actor, channel_id).await),
            ids::BTN_CANCEL_CONFIRM => {
                reply_from(ctx.engine.cancel_confirmed(actor, channel_id).await)
            }
            ids::BTN_CANCEL_ABORT => Outcome::Reply(ctx.engine.cancel_aborted()),
            ids::BTN_OPTIONS => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                Outcome::Reply(EngineReply::private_message(staff_options_message()))
            }
            ids::BTN_CLAIM => reply_from(ctx.engine.claim(actor, channel_id).await),
            ids::BTN_RELEASE => reply_from(ctx.engine.release(actor, channel_id).await),
            ids::BTN_NOTIFY_CLIENT => reply_from(ctx.engine.notify_owner(actor, channel_id).await),
            ids::BTN_PROGRESS_DECREASE => reply_from(
                ctx.engine
                    .adjust_progress(actor, channel_id, ProgressDirection::Decrease)
                    .await,
            ),
            ids::BTN_PROGRESS_INCREASE => reply_from(
                ctx.engine
                    .adjust_progress(actor, channel_id, ProgressDirection::Increase)
                    .await,
            ),
            ids::BTN_PAY => reply_from(
                ctx.engine
                    .request_payment(actor, channel_id, Some(message_id))
                    .await,
            ),
            ids::BTN_PAYMENT_CONFIRM => {
                reply_from(ctx.engine.confirm_payment(actor, channel_id).await)
            }
            ids::BTN_PAYMENT_REJECT => {
                reply_from(ctx.engine.reject_payment(actor, channel_id).await)
            }
            ids::BTN_CLOSE_CONFIRM => {
                reply_from(ctx.engine.close_confirmed(actor, channel_id).await)
            }
            ids::BTN_CLOSE_ABORT => Outcome::Reply(ctx.engine.close_aborted()),
            ids::BTN_OPEN_CONFIG_PIX => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                Outcome::Modal(pix_config_modal())
            }
            _ => Outcome::Reply(EngineReply::private("Ação desconhecida.")),
        },

        ChatEvent::SelectChoice {
            custom_id,
            channel_id,
            values,
            actor,
            ..
        } => {
            if custom_id == ids::SELECT_STATUS {
                let Some(choice) = values.first() else {
                    return Outcome::Reply(EngineReply::private("Nenhuma opção selecionada."));
                };
                reply_from(ctx.engine.set_status_note(actor, channel_id, choice).await)
            } else {
                Outcome::Reply(EngineReply::private("Ação desconhecida."))
            }
        }

        ChatEvent::ModalSubmit {
            custom_id,
            guild_id,
            channel_id,
            fields,
            actor,
            ..
        } => match custom_id.as_str() {
            ids::MODAL_ORDER_FORM => {
                let form = OrderForm {
                    order_type: fields
                        .get(ids::FIELD_ORDER_TYPE)
                        .cloned()
                        .unwrap_or_default(),
                    description: fields
                        .get(ids::FIELD_ORDER_DESCRIPTION)
                        .cloned()
                        .unwrap_or_default(),
                    attachments: fields
                        .get(ids::FIELD_ORDER_ATTACHMENTS)
                        .filter(|value| !value.trim().is_empty())
                        .cloned(),
                    deadline: fields
                        .get(ids::FIELD_ORDER_DEADLINE)
                        .filter(|value| !value.trim().is_empty())
                        .cloned(),
                };
                reply_from(ctx.engine.create(actor, guild_id, form).await)
            }
            ids::MODAL_FINALIZE => {
                let value = fields
                    .get(ids::FIELD_ORDER_VALUE)
                    .cloned()
                    .unwrap_or_default();
                reply_from(ctx.engine.finalize(actor, channel_id, &value).await)
            }
            ids::MODAL_CONFIG_PIX => {
                if !actor_is_support(&ctx.config, actor) {
                    return not_authorized_reply();
                }
                let submitted = fields.get(ids::FIELD_PIX_KEY).cloned().unwrap_or_default();
                match ctx.config.set_pix_key(&submitted) {
                    Ok(()) => Outcome::Reply(EngineReply::private(
                        "✅ Chave PIX configurada com sucesso e salva permanentemente!",
                    )),
                    Err(error) => {
                        tracing::warn!("pix key rejected: {error:#}");
                        Outcome::Reply(EngineReply::private("A chave PIX não pode ser vazia."))
                    }
                }
            }
            _ => Outcome::Reply(EngineReply::private("Formulário desconhecido.")),
        },
    }
}
