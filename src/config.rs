use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "vk2tg.toml";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub vk: VkConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    /// Channel id or `@username`.
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct VkConfig {
    /// Service access key.
    #[serde(default)]
    pub token: String,
    /// Wall owner id. Negative for groups.
    #[serde(default)]
    pub group_id: String,
    #[serde(default = "default_vk_api_url")]
    pub api_url: String,
    #[serde(default = "default_vk_api_version")]
    pub api_version: String,
    #[serde(default = "default_vk_count")]
    pub count: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
    /// Unbounded when absent.
    #[serde(default)]
    pub max_fetch_attempts: Option<u32>,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

fn default_vk_api_url() -> String {
    "https://api.vk.com/method".into()
}

fn default_vk_api_version() -> String {
    "5.131".into()
}

const fn default_vk_count() -> u32 {
    10
}

const fn default_check_interval() -> u64 {
    60
}

const fn default_retry_interval() -> u64 {
    120
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: String::new(),
            api_url: default_telegram_api_url(),
        }
    }
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            group_id: String::new(),
            api_url: default_vk_api_url(),
            api_version: default_vk_api_version(),
            count: default_vk_count(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            retry_interval_secs: default_retry_interval(),
            max_fetch_attempts: None,
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read config from `path`. A missing file yields defaults unless `required`.
    pub fn from_file(path: impl AsRef<Path>, required: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read(path) {
            Ok(bytes) => Self::from_toml(&String::from_utf8_lossy(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Override credentials and ids with non-empty values from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |var: &str, field: &mut String| {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                *field = value;
            }
        };

        set("TELEGRAM_BOT_TOKEN", &mut self.telegram.token);
        set("TELEGRAM_CHANNEL_ID", &mut self.telegram.chat_id);
        set("VK_ACCESS_TOKEN", &mut self.vk.token);
        set("VK_GROUP_ID", &mut self.vk.group_id);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.telegram.token, "telegram.token", "TELEGRAM_BOT_TOKEN"),
            (&self.telegram.chat_id, "telegram.chat_id", "TELEGRAM_CHANNEL_ID"),
            (&self.vk.token, "vk.token", "VK_ACCESS_TOKEN"),
            (&self.vk.group_id, "vk.group_id", "VK_GROUP_ID"),
        ];

        for (value, setting, env) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { setting, env });
            }
        }

        if self.relay.check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                setting: "relay.check_interval_secs",
                reason: "must be greater than zero".into(),
            });
        }

        if self.relay.max_fetch_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                setting: "relay.max_fetch_attempts",
                reason: "must be at least 1 when set".into(),
            });
        }

        Ok(())
    }
}

impl RelayConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}
