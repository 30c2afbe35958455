use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::TelegramConfig, error::TelegramError, sources::Attachment};

/// Markup mode for plain text posts.
pub const PARSE_MODE: &str = "Markdown";

pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    /// Bot token
    token: String,
    /// Destination channel
    chat_id: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TelegramInputMedia {
    pub r#type: String,
    pub media: String,
    pub caption: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Serialize)]
struct SendMediaGroup<'a> {
    chat_id: &'a str,
    media: &'a [TelegramInputMedia],
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
    error_code: Option<u16>,
}

/// Where forwarded posts end up.
#[async_trait]
pub trait Destination {
    async fn send_message(&self, text: &str) -> Result<(), TelegramError>;
    async fn send_media_group(&self, media: &[TelegramInputMedia]) -> Result<(), TelegramError>;
}

impl TelegramClient {
    pub fn new(cfg: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
            chat_id: cfg.chat_id.clone(),
        }
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<(), TelegramError> {
        let res = self
            .client
            .post(format!("{}/bot{}/{}", self.api_url, self.token, method))
            .json(body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        let tgres: Option<TelegramResponse> = serde_json::from_str(&text).ok();

        match tgres {
            Some(r) if r.ok && status.is_success() => Ok(()),
            Some(r) => Err(TelegramError::Api {
                code: r.error_code.unwrap_or_else(|| status.as_u16()),
                description: r.description.unwrap_or_default(),
            }),
            None => Err(TelegramError::Api {
                code: status.as_u16(),
                description: "(vk2tg) Unreadable response".into(),
            }),
        }
    }
}

#[async_trait]
impl Destination for TelegramClient {
    async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: PARSE_MODE,
        };
        self.call("sendMessage", &body).await
    }

    async fn send_media_group(&self, media: &[TelegramInputMedia]) -> Result<(), TelegramError> {
        let body = SendMediaGroup {
            chat_id: &self.chat_id,
            media,
        };
        self.call("sendMediaGroup", &body).await
    }
}

/// What a forward attempt ended up sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    MediaGroup(usize),
    Text,
    /// Nothing to send: no photos and no text.
    Skipped,
}

/// Turns a post into one destination message.
pub struct Forwarder<D> {
    dest: D,
}

impl<D: Destination> Forwarder<D> {
    pub fn new(dest: D) -> Self {
        Self { dest }
    }

    #[cfg(test)]
    pub(crate) fn destination(&self) -> &D {
        &self.dest
    }

    /// Send photos as one media group, else the text, else nothing. Never retries.
    pub async fn forward(&self, text: &str, attachments: &[Attachment]) -> Result<ForwardOutcome, TelegramError> {
        let media = build_media(text, attachments);

        if !media.is_empty() {
            self.dest.send_media_group(&media).await?;
            info!(photos = media.len(), "forwarded media group");
            Ok(ForwardOutcome::MediaGroup(media.len()))
        } else if !text.is_empty() {
            self.dest.send_message(&format_text(text)).await?;
            info!("forwarded text post");
            Ok(ForwardOutcome::Text)
        } else {
            Ok(ForwardOutcome::Skipped)
        }
    }
}

/// One photo entry per photo attachment, each captioned with the full text.
pub fn build_media(text: &str, attachments: &[Attachment]) -> Vec<TelegramInputMedia> {
    attachments
        .iter()
        .filter_map(|a| match a {
            Attachment::Photo { photo } => match photo.best_url() {
                Some(url) => Some(url),
                None => {
                    warn!("photo attachment without sizes, skipping");
                    None
                }
            },
            Attachment::Unsupported => None,
        })
        .map(|url| TelegramInputMedia {
            r#type: "photo".into(),
            media: url.into(),
            caption: text.into(),
        })
        .collect()
}

/// Single newlines become paragraph breaks.
pub fn format_text(text: &str) -> String {
    text.replace('\n', "\n\n")
}
