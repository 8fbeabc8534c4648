//! Pure projections of order state into channel messages.
//!
//! The summary embed, the staff panels, the payment messages, and the log
//! entries are all rendered from the durable record here; nothing in this
//! module reads back what it rendered.

use chrono::DateTime;

use atelier_chat::{
    Button, ButtonStyle, Component, Embed, ModalSpec, OutboundMessage, SelectMenu, SelectOption,
    TextInput,
};

use crate::ids;
use crate::record::{OrderRecord, PROGRESS_MAX, PROGRESS_STEP};

/// Sentinel title identifying the summary message among recent history.
pub const SUMMARY_TITLE: &str = "Nova Encomenda Recebida";

const COLOR_SUMMARY: u32 = 0x3498DB;
const COLOR_SUCCESS: u32 = 0x2ECC71;
const COLOR_PAYMENT: u32 = 0x00B894;
const COLOR_OPTIONS: u32 = 0xF1C40F;
const COLOR_CONFIG: u32 = 0x9B59B6;
const COLOR_DANGER: u32 = 0xE74C3C;
const COLOR_PANEL: u32 = 0x00AE86;

const FIELD_NOT_PROVIDED: &str = "Não informado";

/// Formats a Unix millisecond timestamp as `dd/mm/yyyy hh:mm` UTC.
pub fn format_timestamp(unix_ms: u64) -> String {
    DateTime::from_timestamp_millis(unix_ms as i64)
        .map(|moment| moment.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "data desconhecida".to_string())
}

/// Renders the ten-block progress bar, e.g. `[🟩🟩⬜⬜⬜⬜⬜⬜⬜⬜] 20%`.
pub fn render_progress_bar(percent: u8) -> String {
    let percent = percent.min(PROGRESS_MAX);
    let filled = usize::from(percent / PROGRESS_STEP);
    let empty = usize::from(PROGRESS_MAX / PROGRESS_STEP) - filled;
    format!(
        "[{}{}] {}%",
        "🟩".repeat(filled),
        "⬜".repeat(empty),
        percent
    )
}

/// The authoritative summary embed, projected from the record.
pub fn summary_embed(record: &OrderRecord) -> Embed {
    let mut embed = Embed::titled(SUMMARY_TITLE)
        .with_color(COLOR_SUMMARY)
        .add_field(
            "Usuário",
            format!("{} ({})", record.owner_display, record.owner_id),
            true,
        )
        .add_field("Tipo", record.order_type.clone(), true)
        .add_field("Descrição", record.description.clone(), false)
        .add_field(
            "Anexos",
            record
                .attachments
                .clone()
                .unwrap_or_else(|| FIELD_NOT_PROVIDED.to_string()),
            true,
        )
        .add_field(
            "Prazo Estimado",
            record
                .deadline
                .clone()
                .unwrap_or_else(|| FIELD_NOT_PROVIDED.to_string()),
            true,
        )
        .add_field(
            "Data da Solicitação",
            format_timestamp(record.created_unix_ms),
            false,
        )
        .add_field(
            "Progresso",
            render_progress_bar(record.progress_percent),
            true,
        );
    if let Some(handler) = &record.assigned_handler {
        embed = embed.add_field("Responsável", handler.clone(), true);
    }
    if let Some(note) = &record.status_note {
        embed = embed.add_field("Status", note.clone(), true);
    }
    embed
}

/// Button rows posted with the summary message.
pub fn summary_components() -> Vec<Component> {
    vec![
        Component::Buttons(vec![
            Button::new(ids::BTN_STATUS_IN_PROGRESS, "Em Andamento", ButtonStyle::Primary),
            Button::new(ids::BTN_STATUS_CANCEL, "Cancelar Encomenda", ButtonStyle::Danger),
            Button::new(ids::BTN_STATUS_COMPLETE, "Finalizar Encomenda", ButtonStyle::Success),
        ]),
        Component::Buttons(vec![Button::new(
            ids::BTN_OPTIONS,
            "➕ Opções",
            ButtonStyle::Secondary,
        )]),
    ]
}

/// Full summary message: support mention plus embed plus action rows.
pub fn summary_message(record: &OrderRecord, support_role_id: Option<&str>) -> OutboundMessage {
    let content = match support_role_id {
        Some(role_id) => format!("🔔 Nova encomenda criada! <@&{role_id}> pode atender?"),
        None => "🔔 Nova encomenda criada!".to_string(),
    };
    let mut message = OutboundMessage::text(content).with_embed(summary_embed(record));
    for row in summary_components() {
        message = message.with_components(row);
    }
    message
}

/// Panel posted by `/encomenda` inviting customers to open the form.
pub fn order_panel_message() -> OutboundMessage {
    OutboundMessage::embed(
        Embed::titled("Sistema de Encomendas")
            .with_description(
                "Utilize este sistema para fazer sua encomenda. Clique em **Fazer Encomenda** \
                 para iniciar e preencha os dados necessários.",
            )
            .with_color(COLOR_PANEL),
    )
    .with_components(Component::Buttons(vec![Button::new(
        ids::BTN_OPEN_ORDER_FORM,
        "Fazer Encomenda",
        ButtonStyle::Primary,
    )]))
}

pub fn order_form_modal() -> ModalSpec {
    ModalSpec {
        custom_id: ids::MODAL_ORDER_FORM.to_string(),
        title: "Formulário de Encomenda".to_string(),
        inputs: vec![
            TextInput {
                custom_id: ids::FIELD_ORDER_TYPE.to_string(),
                label: "Tipo de Encomenda".to_string(),
                placeholder: None,
                required: true,
                multiline: false,
            },
            TextInput {
                custom_id: ids::FIELD_ORDER_DESCRIPTION.to_string(),
                label: "Descrição da Encomenda".to_string(),
                placeholder: None,
                required: true,
                multiline: true,
            },
            TextInput {
                custom_id: ids::FIELD_ORDER_ATTACHMENTS.to_string(),
                label: "Anexos (links ou códigos, opcional)".to_string(),
                placeholder: None,
                required: false,
                multiline: false,
            },
            TextInput {
                custom_id: ids::FIELD_ORDER_DEADLINE.to_string(),
                label: "Prazo Estimado (ex: 3 dias, opcional)".to_string(),
                placeholder: None,
                required: false,
                multiline: false,
            },
        ],
    }
}

pub fn finalize_modal() -> ModalSpec {
    ModalSpec {
        custom_id: ids::MODAL_FINALIZE.to_string(),
        title: "Finalizar Encomenda".to_string(),
        inputs: vec![TextInput {
            custom_id: ids::FIELD_ORDER_VALUE.to_string(),
            label: "Valor da encomenda".to_string(),
            placeholder: Some("ex: 50,00".to_string()),
            required: true,
            multiline: false,
        }],
    }
}

/// Ephemeral staff panel behind the options button.
pub fn staff_options_message() -> OutboundMessage {
    OutboundMessage::text("Opções disponíveis:")
        .with_embed(
            Embed::titled("Opções de Produção")
                .with_description("Escolha uma opção:")
                .with_color(COLOR_OPTIONS),
        )
        .with_components(Component::Buttons(vec![
            Button::new(ids::BTN_CLAIM, "👷 Assumir Produção", ButtonStyle::Primary),
            Button::new(ids::BTN_RELEASE, "❌ Desistir da Produção", ButtonStyle::Secondary),
            Button::new(ids::BTN_NOTIFY_CLIENT, "🔔 Notificar Cliente", ButtonStyle::Success),
        ]))
        .with_components(Component::Buttons(vec![
            Button::new(ids::BTN_PROGRESS_DECREASE, "⬅", ButtonStyle::Secondary),
            Button::new(ids::BTN_PROGRESS_INCREASE, "➡", ButtonStyle::Secondary),
        ]))
        .with_components(Component::Select(SelectMenu {
            custom_id: ids::SELECT_STATUS.to_string(),
            placeholder: Some("Atualizar status do pedido".to_string()),
            options: vec![
                SelectOption {
                    label: "Estamos trabalhando no seu pedido!".to_string(),
                    value: "trabalhando".to_string(),
                },
                SelectOption {
                    label: "Aguardando aprovação antes da entrega final.".to_string(),
                    value: "aguardando".to_string(),
                },
                SelectOption {
                    label: "Pedido finalizado, obrigado!".to_string(),
                    value: "finalizado".to_string(),
                },
            ],
        }))
}

/// Completion message with the pay action, replacing the summary.
pub fn completion_message(record: &OrderRecord, completed_unix_ms: u64) -> OutboundMessage {
    let mut embed = Embed::titled("✅ Encomenda Pronta!")
        .with_description("Sua encomenda foi finalizada e está pronta para entrega!")
        .with_color(COLOR_SUCCESS)
        .add_field("Status", "Concluída", true)
        .add_field("Data de Conclusão", format_timestamp(completed_unix_ms), true);
    if let Some(value) = &record.value {
        embed = embed.add_field("Valor", value.clone(), true);
    }
    OutboundMessage::text(format!("<@{}>", record.owner_id))
        .with_embed(embed)
        .with_components(Component::Buttons(vec![Button::new(
            ids::BTN_PAY,
            "💰 Pagar Encomenda",
            ButtonStyle::Success,
        )]))
}

pub fn payment_instructions_message(pix_key: &str, value: Option<&str>) -> OutboundMessage {
    let mut embed = Embed::titled("💰 Informações de Pagamento")
        .with_description(
            "Utilize a chave PIX abaixo para realizar o pagamento da sua encomenda:",
        )
        .with_color(COLOR_PAYMENT)
        .add_field("Chave PIX", format!("```{pix_key}```"), false);
    if let Some(value) = value {
        embed = embed.add_field("Valor", value.to_string(), true);
    }
    embed = embed
        .add_field(
            "Instruções",
            "Após realizar o pagamento, envie o comprovante neste canal para confirmação.",
            false,
        )
        .with_footer("Copie a chave PIX acima e use no app do seu banco");
    OutboundMessage::embed(embed)
}

/// Support-facing prompt surfaced after the payment-prompt delay.
pub fn payment_confirmation_prompt(support_role_id: Option<&str>) -> OutboundMessage {
    let content = match support_role_id {
        Some(role_id) => format!("<@&{role_id}> o pagamento desta encomenda foi recebido?"),
        None => "O pagamento desta encomenda foi recebido?".to_string(),
    };
    OutboundMessage::text(content)
        .with_embed(
            Embed::titled("Confirmação de Pagamento")
                .with_description("Verifique o comprovante enviado pelo cliente antes de confirmar.")
                .with_color(COLOR_PAYMENT),
        )
        .with_components(Component::Buttons(vec![
            Button::new(ids::BTN_PAYMENT_CONFIRM, "✅ Confirmar Pagamento", ButtonStyle::Success),
            Button::new(ids::BTN_PAYMENT_REJECT, "❌ Rejeitar Pagamento", ButtonStyle::Danger),
        ]))
}

pub fn delivery_confirmation_message(record: &OrderRecord) -> OutboundMessage {
    OutboundMessage::text(format!("<@{}>", record.owner_id)).with_embed(
        Embed::titled("📦 Entrega Confirmada")
            .with_description("Pagamento confirmado! Sua encomenda será entregue em instantes.")
            .with_color(COLOR_SUCCESS),
    )
}

pub fn rejection_notice_message() -> OutboundMessage {
    OutboundMessage::embed(
        Embed::titled("❌ Pagamento Rejeitado")
            .with_description(
                "O comprovante enviado não foi aceito. Utilize o botão de pagamento para tentar \
                 novamente.",
            )
            .with_color(COLOR_DANGER),
    )
}

pub fn cancel_prompt_message() -> OutboundMessage {
    OutboundMessage::text("Tem certeza que deseja cancelar esta encomenda? O canal será excluído.")
        .with_components(Component::Buttons(vec![
            Button::new(ids::BTN_CANCEL_CONFIRM, "Sim, cancelar", ButtonStyle::Danger),
            Button::new(ids::BTN_CANCEL_ABORT, "Não, voltar", ButtonStyle::Secondary),
        ]))
}

pub fn close_prompt_message() -> OutboundMessage {
    OutboundMessage::text("Tem certeza que deseja fechar este canal de encomenda?")
        .with_components(Component::Buttons(vec![
            Button::new(ids::BTN_CLOSE_CONFIRM, "Sim, fechar", ButtonStyle::Danger),
            Button::new(ids::BTN_CLOSE_ABORT, "Não, voltar", ButtonStyle::Secondary),
        ]))
}

pub fn cancellation_notice_message(by_staff: bool) -> OutboundMessage {
    let attribution = if by_staff {
        "Encomenda cancelada pela equipe."
    } else {
        "Encomenda cancelada pelo cliente."
    };
    OutboundMessage::embed(
        Embed::titled("Encomenda Cancelada")
            .with_description(format!("{attribution} O canal será excluído em instantes."))
            .with_color(COLOR_DANGER),
    )
}

/// PIX admin panel shown by `/configpix`.
pub fn pix_config_message(current_key: Option<&str>) -> OutboundMessage {
    OutboundMessage::text("Clique no botão abaixo para configurar ou alterar a chave PIX.")
        .with_embed(
            Embed::titled("⚙️ Configuração de Chave PIX")
                .with_description(
                    "Configure a chave PIX que será exibida aos clientes no momento do pagamento.",
                )
                .with_color(COLOR_CONFIG)
                .add_field(
                    "Chave Atual",
                    format!("`{}`", current_key.unwrap_or("Nenhuma chave configurada")),
                    false,
                ),
        )
        .with_components(Component::Buttons(vec![Button::new(
            ids::BTN_OPEN_CONFIG_PIX,
            "⚙️ Configurar PIX",
            ButtonStyle::Primary,
        )]))
}

pub fn pix_config_modal() -> ModalSpec {
    ModalSpec {
        custom_id: ids::MODAL_CONFIG_PIX.to_string(),
        title: "Configurar Chave PIX".to_string(),
        inputs: vec![TextInput {
            custom_id: ids::FIELD_PIX_KEY.to_string(),
            label: "Digite a chave PIX".to_string(),
            placeholder: Some("exemplo@email.com, CPF, telefone ou chave aleatória".to_string()),
            required: true,
            multiline: false,
        }],
    }
}

/// Entry for the open/closed log channels.
pub fn order_log_message(record: &OrderRecord, event: &str, event_unix_ms: u64) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::titled(format!("Encomenda {event}"))
            .with_color(COLOR_SUMMARY)
            .add_field("Canal", record.channel_name(), true)
            .add_field(
                "Cliente",
                format!("{} ({})", record.owner_display, record.owner_id),
                true,
            )
            .add_field("Data", format_timestamp(event_unix_ms), false),
    )
}

#[cfg(test)]
mod tests {
    use super::{
        completion_message, payment_confirmation_prompt, render_progress_bar, summary_embed,
        summary_message, SUMMARY_TITLE,
    };
    use crate::ids;
    use crate::record::{OrderForm, OrderRecord};
    use atelier_chat::Component;

    fn sample_record() -> OrderRecord {
        OrderRecord::new(
            "chan-1".to_string(),
            "guild-1".to_string(),
            "user-1".to_string(),
            "Ana".to_string(),
            "ana".to_string(),
            OrderForm {
                order_type: "logo".to_string(),
                description: "um logo para a loja".to_string(),
                attachments: None,
                deadline: Some("3 dias".to_string()),
            },
            1_700_000_000_000,
        )
    }

    #[test]
    fn unit_progress_bar_renders_filled_and_empty_blocks() {
        assert_eq!(render_progress_bar(0), format!("[{}] 0%", "⬜".repeat(10)));
        assert_eq!(
            render_progress_bar(30),
            format!("[{}{}] 30%", "🟩".repeat(3), "⬜".repeat(7))
        );
        assert_eq!(render_progress_bar(100), format!("[{}] 100%", "🟩".repeat(10)));
    }

    #[test]
    fn unit_summary_embed_projects_record_fields() {
        let mut record = sample_record();
        let embed = summary_embed(&record);
        assert_eq!(embed.title.as_deref(), Some(SUMMARY_TITLE));
        assert_eq!(embed.field_value("Usuário"), Some("Ana (user-1)"));
        assert_eq!(embed.field_value("Anexos"), Some("Não informado"));
        assert_eq!(embed.field_value("Prazo Estimado"), Some("3 dias"));
        assert!(embed.field_value("Responsável").is_none());

        record.assigned_handler = Some("Bruno".to_string());
        record.progress_percent = 40;
        let updated = summary_embed(&record);
        assert_eq!(updated.field_value("Responsável"), Some("Bruno"));
        assert!(updated
            .field_value("Progresso")
            .expect("progress field")
            .contains("40%"));
    }

    #[test]
    fn unit_summary_message_mentions_support_role_when_configured() {
        let record = sample_record();
        let with_role = summary_message(&record, Some("role-7"));
        assert!(with_role
            .content
            .as_deref()
            .expect("content")
            .contains("<@&role-7>"));
        let without_role = summary_message(&record, None);
        assert!(!without_role.content.as_deref().expect("content").contains("<@&"));
        assert_eq!(without_role.components.len(), 2);
    }

    #[test]
    fn unit_completion_message_carries_pay_button_and_value() {
        let mut record = sample_record();
        record.value = Some("50,00".to_string());
        let message = completion_message(&record, 1_700_000_100_000);
        assert!(message.content.as_deref().expect("mention").contains("user-1"));
        assert_eq!(message.embeds[0].field_value("Valor"), Some("50,00"));
        let Component::Buttons(buttons) = &message.components[0] else {
            panic!("expected button row");
        };
        assert_eq!(buttons[0].custom_id, ids::BTN_PAY);
    }

    #[test]
    fn unit_payment_prompt_offers_confirm_and_reject() {
        let prompt = payment_confirmation_prompt(Some("role-7"));
        let Component::Buttons(buttons) = &prompt.components[0] else {
            panic!("expected button row");
        };
        let ids_in_row = buttons
            .iter()
            .map(|button| button.custom_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            ids_in_row,
            vec![ids::BTN_PAYMENT_CONFIRM, ids::BTN_PAYMENT_REJECT]
        );
    }
}
