use std::{any::Any, panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::VkError,
    sources::{FeedSource, Post},
    telegram::{Destination, Forwarder},
};

/// Mirrors the newest wall post of `S` to `D`.
pub struct Relay<S, D> {
    source: S,
    forwarder: Forwarder<D>,
    /// Id of the last post handed to the forwarder. Lost on restart.
    last_post_id: Option<i64>,
    check_interval: Duration,
}

/// Newest post eligible for relaying.
pub fn select_newest(posts: &[Post]) -> Option<&Post> {
    posts.iter().find(|p| !p.is_pinned)
}

impl<S: FeedSource, D: Destination> Relay<S, D> {
    pub fn new(source: S, forwarder: Forwarder<D>, check_interval: Duration) -> Self {
        Self {
            source,
            forwarder,
            last_post_id: None,
            check_interval,
        }
    }

    pub fn last_post_id(&self) -> Option<i64> {
        self.last_post_id
    }

    #[cfg(test)]
    pub(crate) fn forwarder(&self) -> &Forwarder<D> {
        &self.forwarder
    }

    /// One fetch → dedup → forward pass. Returns the id of a newly relayed post.
    ///
    /// The post is marked seen before forwarding, so a failed forward is not
    /// attempted again. Forward errors are logged and dropped here.
    pub async fn poll_once(&mut self) -> Result<Option<i64>, VkError> {
        let posts = self.source.fetch_recent_posts().await?;

        let post = match select_newest(&posts) {
            Some(p) => p,
            None => {
                debug!("wall is empty");
                return Ok(None);
            }
        };

        if Some(post.id) == self.last_post_id {
            debug!(post_id = post.id, "no new posts");
            return Ok(None);
        }

        info!(post_id = post.id, previous = ?self.last_post_id, "new post");
        self.last_post_id = Some(post.id);

        if let Err(e) = self.forwarder.forward(&post.text, &post.attachments).await {
            error!(post_id = post.id, error = %e, "failed to forward post");
        }

        Ok(Some(post.id))
    }

    /// Poll every `check_interval` until `token` is cancelled. Errors never stop the loop.
    pub async fn run(&mut self, token: CancellationToken) {
        info!(interval = ?self.check_interval, "relay started");

        loop {
            let cycle = AssertUnwindSafe(self.poll_once()).catch_unwind();

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                r = cycle => r,
            };

            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "poll cycle failed"),
                Err(panic) => error!(panic = panic_message(&*panic), "poll cycle panicked"),
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(self.check_interval) => {}
            }
        }

        info!("relay stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
