//! Subscriber registry.
//!
//! The set of recipients that receive scheduled broadcasts. Cheap to clone:
//! every clone shares the same set, so the command front end registers
//! while the scheduler reads snapshots. Entries are never removed.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::types::Recipient;

#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<HashSet<Recipient>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient. Returns `true` if it was not already registered.
    pub async fn register(&self, recipient: Recipient) -> bool {
        let mut set = self.inner.write().await;
        let added = set.insert(recipient.clone());
        if added {
            info!(recipient = %recipient, total = set.len(), "Subscriber registered");
        }
        added
    }

    /// Point-in-time snapshot, sorted for stable broadcast order.
    pub async fn list_all(&self) -> Vec<Recipient> {
        let mut all: Vec<Recipient> = self.inner.read().await.iter().cloned().collect();
        all.sort();
        all
    }

    pub async fn contains(&self, recipient: &Recipient) -> bool {
        self.inner.read().await.contains(recipient)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
