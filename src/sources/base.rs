use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::VkError;

/// Wall post, as fetched from a `FeedSource`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Post {
    pub id: i64,
    /// Post text. Empty string if not exists.
    #[serde(default)]
    pub text: String,
    /// Post attachments in wall order. May be empty.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Pinned posts stay on top of the wall regardless of recency.
    #[serde(default, deserialize_with = "flag")]
    pub is_pinned: bool,
}

/// Post attachment. Only photos are relayed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    Photo {
        #[serde(default)]
        photo: Photo,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
pub struct Photo {
    /// Size variants, smallest first.
    #[serde(default)]
    pub sizes: Vec<PhotoSize>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PhotoSize {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Photo {
    /// URL of the highest resolution variant, i.e. the last one.
    pub fn best_url(&self) -> Option<&str> {
        self.sizes.last().map(|s| s.url.as_str())
    }
}

/// Wall APIs report flags either as `true`/`false` or as `1`/`0`. `null` is unset.
fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(de)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

#[async_trait]
pub trait FeedSource {
    /// Fetch most recent posts, newest first, pinned ones excluded.
    async fn fetch_recent_posts(&self) -> Result<Vec<Post>, VkError>;
}
