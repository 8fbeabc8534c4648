//! Typed failure taxonomy for lifecycle operations.
//!
//! Display strings double as the private reply the acting user sees, so they
//! carry the customer-facing wording. Platform failures wrap the underlying
//! error with context intact.

use thiserror::Error;

use crate::record::{OrderStatus, PaymentPhase};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Você não tem permissão para utilizar esta ação.")]
    NotAuthorized,

    #[error("Você já possui uma encomenda aberta em <#{channel_id}>.")]
    DuplicateOrder { channel_id: String },

    #[error("Mensagem original não encontrada.")]
    SummaryMissing,

    #[error("Nenhuma encomenda registrada para este canal.")]
    UnknownChannel,

    #[error("Chave PIX não configurada! Um administrador precisa usar /configpix primeiro.")]
    PaymentKeyMissing,

    #[error("O valor da encomenda não pode ser vazio.")]
    EmptyValue,

    #[error("Esta ação não se aplica a uma encomenda {}.", .status.label())]
    InvalidStatus { status: OrderStatus },

    #[error("O pagamento está na fase '{}' e não permite esta ação.", .phase.as_str())]
    InvalidPaymentPhase { phase: PaymentPhase },

    #[error("Opção de status desconhecida.")]
    UnknownStatusChoice,

    #[error("Erro ao criar o canal de encomenda. Tente novamente mais tarde.")]
    ChannelCreation(#[source] anyhow::Error),

    #[error("Falha ao salvar o estado da encomenda.")]
    Storage(#[source] anyhow::Error),

    #[error("Falha ao comunicar com a plataforma. Tente novamente.")]
    Chat(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::OrderError;
    use crate::record::{OrderStatus, PaymentPhase};

    #[test]
    fn unit_display_strings_carry_context() {
        let duplicate = OrderError::DuplicateOrder {
            channel_id: "chan-1".to_string(),
        };
        assert!(duplicate.to_string().contains("<#chan-1>"));

        let status = OrderError::InvalidStatus {
            status: OrderStatus::Finalized,
        };
        assert!(status.to_string().contains("finalizada"));

        let phase = OrderError::InvalidPaymentPhase {
            phase: PaymentPhase::Confirmed,
        };
        assert!(phase.to_string().contains("confirmed"));
    }
}
