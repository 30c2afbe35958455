use thiserror::Error;

/// VK reports temporary server-side trouble with this code.
pub const VK_TRANSIENT_ERROR_CODE: i64 = 10;

#[derive(Error, Debug)]
pub enum VkError {
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("VK request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed VK response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl VkError {
    /// Whether the same request is expected to succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            VkError::Api { code, .. } => *code == VK_TRANSIENT_ERROR_CODE,
            VkError::Transport(_) | VkError::Parse(_) => true,
        }
    }
}

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required setting `{setting}` (set {env} or the config file)")]
    Missing {
        setting: &'static str,
        env: &'static str,
    },

    #[error("Invalid setting `{setting}`: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },
}
