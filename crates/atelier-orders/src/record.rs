//! Durable order record, status/payment enums, and progress stepping.
//!
//! The record is the authoritative representation of an order; channel names
//! and the summary embed are projections of it. Payment phases only move
//! along the transitions `allows_transition_to` admits.

use serde::{Deserialize, Serialize};

/// Channel-name prefix for each live order status.
pub const OPEN_CHANNEL_PREFIX: &str = "📦-encomenda";
pub const IN_PRODUCTION_CHANNEL_PREFIX: &str = "🟡-producao";
pub const FINALIZED_CHANNEL_PREFIX: &str = "✅-finalizado";

pub const PROGRESS_STEP: u8 = 10;
pub const PROGRESS_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `OrderStatus` values.
pub enum OrderStatus {
    Open,
    InProduction,
    Finalized,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProduction => "in_production",
            Self::Finalized => "finalized",
            Self::Canceled => "canceled",
        }
    }

    /// Customer-facing status label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "aberta",
            Self::InProduction => "em produção",
            Self::Finalized => "finalizada",
            Self::Canceled => "cancelada",
        }
    }

    /// Channel prefix projecting this status. Canceled orders never rename:
    /// their channel is deleted shortly after the transition.
    pub fn channel_prefix(self) -> Option<&'static str> {
        match self {
            Self::Open => Some(OPEN_CHANNEL_PREFIX),
            Self::InProduction => Some(IN_PRODUCTION_CHANNEL_PREFIX),
            Self::Finalized => Some(FINALIZED_CHANNEL_PREFIX),
            Self::Canceled => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `PaymentPhase` values.
pub enum PaymentPhase {
    None,
    AwaitingRequest,
    AwaitingConfirmation,
    Confirmed,
    Rejected,
}

impl PaymentPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AwaitingRequest => "awaiting_request",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the phase machine admits moving to `next`. `Confirmed` is
    /// terminal; a rejected payment may be re-requested.
    pub fn allows_transition_to(self, next: PaymentPhase) -> bool {
        matches!(
            (self, next),
            (Self::None, Self::AwaitingRequest)
                | (Self::AwaitingRequest, Self::AwaitingConfirmation)
                | (Self::AwaitingConfirmation, Self::Confirmed)
                | (Self::AwaitingConfirmation, Self::Rejected)
                | (Self::Rejected, Self::AwaitingRequest)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDirection {
    Increase,
    Decrease,
}

/// Steps a progress value by one increment, clamped to `[0, 100]`. Values
/// that drifted off the 10% grid are snapped down first.
pub fn step_progress(current: u8, direction: ProgressDirection) -> u8 {
    let snapped = current.min(PROGRESS_MAX) - current.min(PROGRESS_MAX) % PROGRESS_STEP;
    match direction {
        ProgressDirection::Increase => snapped.saturating_add(PROGRESS_STEP).min(PROGRESS_MAX),
        ProgressDirection::Decrease => snapped.saturating_sub(PROGRESS_STEP),
    }
}

/// Free-text fields submitted through the order form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderForm {
    pub order_type: String,
    pub description: String,
    #[serde(default)]
    pub attachments: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub channel_id: String,
    pub guild_id: String,
    pub owner_id: String,
    pub owner_display: String,
    /// Sanitized label the channel name is built from.
    pub channel_label: String,
    pub order_type: String,
    pub description: String,
    #[serde(default)]
    pub attachments: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    pub created_unix_ms: u64,
    pub status: OrderStatus,
    #[serde(default)]
    pub assigned_handler: Option<String>,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub value: Option<String>,
    pub payment_phase: PaymentPhase,
    #[serde(default)]
    pub summary_message_id: Option<String>,
    #[serde(default)]
    pub status_note: Option<String>,
}

impl OrderRecord {
    pub fn new(
        channel_id: String,
        guild_id: String,
        owner_id: String,
        owner_display: String,
        channel_label: String,
        form: OrderForm,
        created_unix_ms: u64,
    ) -> Self {
        Self {
            channel_id,
            guild_id,
            owner_id,
            owner_display,
            channel_label,
            order_type: form.order_type,
            description: form.description,
            attachments: form.attachments,
            deadline: form.deadline,
            created_unix_ms,
            status: OrderStatus::Open,
            assigned_handler: None,
            progress_percent: 0,
            value: None,
            payment_phase: PaymentPhase::None,
            summary_message_id: None,
            status_note: None,
        }
    }

    /// Projects the channel name for the current status.
    pub fn channel_name(&self) -> String {
        let prefix = self
            .status
            .channel_prefix()
            .unwrap_or(OPEN_CHANNEL_PREFIX);
        format!("{}-{}", prefix, self.channel_label)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        step_progress, OrderForm, OrderRecord, OrderStatus, PaymentPhase, ProgressDirection,
    };

    fn sample_record() -> OrderRecord {
        OrderRecord::new(
            "chan-1".to_string(),
            "guild-1".to_string(),
            "user-1".to_string(),
            "Ana".to_string(),
            "ana".to_string(),
            OrderForm {
                order_type: "logo".to_string(),
                description: "um logo".to_string(),
                attachments: None,
                deadline: None,
            },
            1_700_000_000_000,
        )
    }

    #[test]
    fn unit_new_record_starts_open_with_zero_progress() {
        let record = sample_record();
        assert_eq!(record.status, OrderStatus::Open);
        assert_eq!(record.payment_phase, PaymentPhase::None);
        assert_eq!(record.progress_percent, 0);
        assert_eq!(record.channel_name(), "📦-encomenda-ana");
    }

    #[test]
    fn unit_channel_name_tracks_status_prefix() {
        let mut record = sample_record();
        record.status = OrderStatus::InProduction;
        assert_eq!(record.channel_name(), "🟡-producao-ana");
        record.status = OrderStatus::Finalized;
        assert_eq!(record.channel_name(), "✅-finalizado-ana");
    }

    #[test]
    fn unit_step_progress_clamps_at_bounds() {
        assert_eq!(step_progress(0, ProgressDirection::Decrease), 0);
        assert_eq!(step_progress(0, ProgressDirection::Increase), 10);
        assert_eq!(step_progress(100, ProgressDirection::Increase), 100);
        assert_eq!(step_progress(100, ProgressDirection::Decrease), 90);
    }

    #[test]
    fn unit_step_progress_snaps_off_grid_values() {
        assert_eq!(step_progress(37, ProgressDirection::Increase), 40);
        assert_eq!(step_progress(37, ProgressDirection::Decrease), 20);
        assert_eq!(step_progress(255, ProgressDirection::Increase), 100);
    }

    #[test]
    fn unit_payment_phase_transitions_follow_the_machine() {
        use PaymentPhase::*;
        assert!(None.allows_transition_to(AwaitingRequest));
        assert!(AwaitingRequest.allows_transition_to(AwaitingConfirmation));
        assert!(AwaitingConfirmation.allows_transition_to(Confirmed));
        assert!(AwaitingConfirmation.allows_transition_to(Rejected));
        assert!(Rejected.allows_transition_to(AwaitingRequest));

        assert!(!None.allows_transition_to(Confirmed));
        assert!(!AwaitingRequest.allows_transition_to(Confirmed));
        assert!(!Confirmed.allows_transition_to(AwaitingRequest));
        assert!(!Confirmed.allows_transition_to(Rejected));
        assert!(!Rejected.allows_transition_to(Confirmed));
    }
}
