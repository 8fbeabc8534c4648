//! Order lifecycle engine for the Atelier commission bot.
//!
//! The engine is the single authority over order-state transitions: it
//! enforces authorization, serializes mutations per channel, keeps the
//! durable record store consistent with the rendered channel state, and
//! drives payment confirmation, transcripts, and notifications.

pub mod deferred;
pub mod engine;
pub mod error;
pub mod ids;
pub mod locks;
pub mod notify;
pub mod projection;
pub mod record;
pub mod store;
pub mod transcript;

pub use deferred::DeferredTasks;
pub use engine::{EngineDelays, EngineReply, OrderEngine};
pub use error::OrderError;
pub use locks::ChannelLocks;
pub use notify::Notifier;
pub use record::{
    step_progress, OrderForm, OrderRecord, OrderStatus, PaymentPhase, ProgressDirection,
};
pub use store::{ChannelRegistry, OrderStore, PaymentTracker, ORDERS_FILE_NAME};
pub use transcript::{render_transcript, TRANSCRIPT_HISTORY_LIMIT};
