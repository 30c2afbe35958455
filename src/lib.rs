//! VK group wall to telegram channel reposter.
//!
//! [`relay::Relay`] polls a [`sources::FeedSource`] and hands the newest
//! unseen post to a [`telegram::Forwarder`].

pub mod config;
pub mod error;
pub mod logging;
pub mod relay;
pub mod retry;
pub mod sources;
pub mod telegram;
