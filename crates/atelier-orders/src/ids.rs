//! Stable interaction identifiers shared by projections and the dispatcher.

// Order intake.
pub const BTN_OPEN_ORDER_FORM: &str = "order_button";
pub const MODAL_ORDER_FORM: &str = "order_modal";
pub const FIELD_ORDER_TYPE: &str = "orderType";
pub const FIELD_ORDER_DESCRIPTION: &str = "orderDescription";
pub const FIELD_ORDER_ATTACHMENTS: &str = "orderAttachments";
pub const FIELD_ORDER_DEADLINE: &str = "orderDeadline";

// Staff status row on the summary message.
pub const BTN_STATUS_IN_PROGRESS: &str = "status_in_progress";
pub const BTN_STATUS_COMPLETE: &str = "status_complete";
pub const BTN_STATUS_CANCEL: &str = "status_cancel";
pub const MODAL_FINALIZE: &str = "finalize_modal";
pub const FIELD_ORDER_VALUE: &str = "orderValue";

// Staff options panel.
pub const BTN_OPTIONS: &str = "opcoes";
pub const BTN_CLAIM: &str = "assumir_producao";
pub const BTN_RELEASE: &str = "desistir_producao";
pub const BTN_NOTIFY_CLIENT: &str = "notify_client";
pub const BTN_PROGRESS_DECREASE: &str = "progress_decrease";
pub const BTN_PROGRESS_INCREASE: &str = "progress_increase";
pub const SELECT_STATUS: &str = "status_select";

// Payment flow.
pub const BTN_PAY: &str = "pagar_encomenda";
pub const BTN_PAYMENT_CONFIRM: &str = "payment_confirm";
pub const BTN_PAYMENT_REJECT: &str = "payment_reject";

// Cancel / close confirmation.
pub const BTN_CANCEL_CONFIRM: &str = "cancel_confirm";
pub const BTN_CANCEL_ABORT: &str = "cancel_abort";
pub const BTN_CLOSE_CONFIRM: &str = "close_confirm";
pub const BTN_CLOSE_ABORT: &str = "close_abort";

// PIX configuration.
pub const BTN_OPEN_CONFIG_PIX: &str = "open_config_pix";
pub const MODAL_CONFIG_PIX: &str = "config_pix_modal";
pub const FIELD_PIX_KEY: &str = "pix_key";
