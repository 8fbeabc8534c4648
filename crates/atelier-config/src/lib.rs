//! File-backed operational settings for the order bot.
//!
//! One flat JSON record loaded at startup and overwritten wholesale, via
//! atomic rename, on every mutation. Every authorization check and most
//! message construction reads from here.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use atelier_core::write_json_atomic;

pub const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_SCHEMA_VERSION: u32 = 1;

fn config_schema_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotConfig {
    #[serde(default = "config_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub order_category_id: Option<String>,
    #[serde(default)]
    pub support_role_id: Option<String>,
    #[serde(default)]
    pub pix_key: Option<String>,
    #[serde(default)]
    pub open_log_channel_id: Option<String>,
    #[serde(default)]
    pub closed_log_channel_id: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            order_category_id: None,
            support_role_id: None,
            pix_key: None,
            open_log_channel_id: None,
            closed_log_channel_id: None,
        }
    }
}

/// Shared handle to the persistent config record.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<BotConfig>,
}

impl ConfigStore {
    /// Loads the record, merging a missing file into defaults. Unreadable or
    /// schema-mismatched files are errors rather than silently discarded
    /// operator settings.
    pub fn load(path: PathBuf) -> Result<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let parsed: BotConfig = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            if parsed.schema_version != CONFIG_SCHEMA_VERSION {
                bail!(
                    "unsupported config schema: expected {}, found {}",
                    CONFIG_SCHEMA_VERSION,
                    parsed.schema_version
                );
            }
            parsed
        } else {
            BotConfig::default()
        };
        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    pub fn snapshot(&self) -> BotConfig {
        self.lock().clone()
    }

    pub fn set_order_category(&self, category_id: &str) -> Result<()> {
        self.mutate(|config| config.order_category_id = Some(category_id.trim().to_string()))
    }

    pub fn set_support_role(&self, role_id: &str) -> Result<()> {
        self.mutate(|config| config.support_role_id = Some(role_id.trim().to_string()))
    }

    pub fn set_pix_key(&self, pix_key: &str) -> Result<()> {
        let trimmed = pix_key.trim();
        if trimmed.is_empty() {
            bail!("pix key cannot be empty");
        }
        let owned = trimmed.to_string();
        self.mutate(move |config| config.pix_key = Some(owned))
    }

    pub fn set_log_channels(
        &self,
        open_log_channel_id: Option<&str>,
        closed_log_channel_id: Option<&str>,
    ) -> Result<()> {
        self.mutate(|config| {
            if let Some(open) = open_log_channel_id {
                config.open_log_channel_id = Some(open.trim().to_string());
            }
            if let Some(closed) = closed_log_channel_id {
                config.closed_log_channel_id = Some(closed.trim().to_string());
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BotConfig> {
        self.config.lock().expect("config store mutex poisoned")
    }

    fn mutate(&self, apply: impl FnOnce(&mut BotConfig)) -> Result<()> {
        let mut config = self.lock();
        apply(&mut config);
        write_json_atomic(&self.path, &*config)
            .with_context(|| format!("failed to write config file {}", self.path.display()))?;
        Ok(())
    }
}
