//! Notifier trait — delivery of a rendered run digest.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::DispatchError;

/// A rendered digest ready for delivery.
#[derive(Debug, Clone)]
pub struct DigestMessage {
    /// Rendered digest text (markdown).
    pub body: String,
    /// The digest file on disk, when one was written.
    pub attachment: Option<PathBuf>,
    pub entry_count: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs (e.g., "email").
    fn name(&self) -> &str;

    async fn dispatch(&self, digest: &DigestMessage) -> std::result::Result<(), DispatchError>;
}
