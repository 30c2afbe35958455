mod base;
pub mod vk;

pub use base::{Attachment, FeedSource, Photo, PhotoSize, Post};
