//! Durable order-record store plus the registry and payment-tracker views.
//!
//! One schema-versioned JSON file maps channel id to its order record and is
//! rewritten atomically on every mutation, so in-flight orders survive a
//! process restart. The registry and tracker are typed read paths over the
//! same records; neither holds state of its own.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use atelier_core::write_json_atomic;

use crate::record::{OrderRecord, PaymentPhase};

pub const ORDERS_FILE_NAME: &str = "orders.json";
const ORDER_STATE_SCHEMA_VERSION: u32 = 1;

fn order_state_schema_version() -> u32 {
    ORDER_STATE_SCHEMA_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderStateFile {
    #[serde(default = "order_state_schema_version")]
    schema_version: u32,
    #[serde(default)]
    orders: BTreeMap<String, OrderRecord>,
}

impl Default for OrderStateFile {
    fn default() -> Self {
        Self {
            schema_version: ORDER_STATE_SCHEMA_VERSION,
            orders: BTreeMap::new(),
        }
    }
}

pub struct OrderStore {
    path: PathBuf,
    state: Mutex<OrderStateFile>,
}

impl OrderStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read order state file {}", path.display()))?;
            let parsed: OrderStateFile = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse order state file {}", path.display()))?;
            if parsed.schema_version != ORDER_STATE_SCHEMA_VERSION {
                bail!(
                    "unsupported order state schema: expected {}, found {}",
                    ORDER_STATE_SCHEMA_VERSION,
                    parsed.schema_version
                );
            }
            parsed
        } else {
            OrderStateFile::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn get(&self, channel_id: &str) -> Option<OrderRecord> {
        self.lock().orders.get(channel_id).cloned()
    }

    pub fn insert(&self, record: OrderRecord) -> Result<()> {
        let mut state = self.lock();
        state.orders.insert(record.channel_id.clone(), record);
        self.save(&state)
    }

    /// Applies `apply` to the record for `channel_id` and persists. Returns
    /// `None`, without touching the file, when the channel is untracked.
    pub fn update<R>(
        &self,
        channel_id: &str,
        apply: impl FnOnce(&mut OrderRecord) -> R,
    ) -> Result<Option<R>> {
        let mut state = self.lock();
        let Some(record) = state.orders.get_mut(channel_id) else {
            return Ok(None);
        };
        let outcome = apply(record);
        self.save(&state)?;
        Ok(Some(outcome))
    }

    pub fn remove(&self, channel_id: &str) -> Result<Option<OrderRecord>> {
        let mut state = self.lock();
        let removed = state.orders.remove(channel_id);
        if removed.is_some() {
            self.save(&state)?;
        }
        Ok(removed)
    }

    /// All tracked records, oldest first.
    pub fn all(&self) -> Vec<OrderRecord> {
        let mut records = self.lock().orders.values().cloned().collect::<Vec<_>>();
        records.sort_by(|left, right| {
            left.created_unix_ms
                .cmp(&right.created_unix_ms)
                .then_with(|| left.channel_id.cmp(&right.channel_id))
        });
        records
    }

    fn lock(&self) -> MutexGuard<'_, OrderStateFile> {
        self.state.lock().expect("order store mutex poisoned")
    }

    fn save(&self, state: &OrderStateFile) -> Result<()> {
        write_json_atomic(&self.path, state).with_context(|| {
            format!("failed to write order state file {}", self.path.display())
        })?;
        Ok(())
    }
}

/// Guards the one-active-order-per-owner invariant.
#[derive(Clone)]
pub struct ChannelRegistry {
    store: Arc<OrderStore>,
}

impl ChannelRegistry {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }

    /// Channel of the owner's active order, if any.
    pub fn active_channel_for(&self, owner_id: &str) -> Option<String> {
        self.store
            .lock()
            .orders
            .values()
            .find(|record| record.owner_id == owner_id)
            .map(|record| record.channel_id.clone())
    }
}

/// Remembers phase, owner, and value for a channel once the summary message
/// that carried them is gone.
#[derive(Clone)]
pub struct PaymentTracker {
    store: Arc<OrderStore>,
}

impl PaymentTracker {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }

    pub fn phase(&self, channel_id: &str) -> Option<PaymentPhase> {
        self.store
            .get(channel_id)
            .map(|record| record.payment_phase)
    }

    pub fn owner_and_value(&self, channel_id: &str) -> Option<(String, Option<String>)> {
        self.store
            .get(channel_id)
            .map(|record| (record.owner_id, record.value))
    }
}
