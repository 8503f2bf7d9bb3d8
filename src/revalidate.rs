// ============================================
// Listing revalidation bus
// ============================================
//
// Every successful mutation announces which dashboard listings are now stale.
// The SSE endpoint fans these out to connected admin UIs so they refetch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the broadcast ring. Slow subscribers skip ahead.
const CHANNEL_CAPACITY: usize = 256;

pub const NGOS_PATH: &str = "/ngos";
pub const REQUESTS_PATH: &str = "/requests";
pub const INVITE_CODES_PATH: &str = "/invite-codes";
pub const PROTESTS_PATH: &str = "/protests";
pub const DASHBOARD_PATH: &str = "/";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingChanged {
    pub path: &'static str,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Revalidator {
    tx: broadcast::Sender<ListingChanged>,
}

impl Revalidator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListingChanged> {
        self.tx.subscribe()
    }

    /// Mark `paths` as stale. Having no subscribers is normal.
    pub fn revalidate(&self, paths: &[&'static str]) {
        let at = Utc::now();
        for &path in paths {
            let delivered = self.tx.send(ListingChanged { path, at }).unwrap_or(0);
            tracing::debug!("Revalidate {} ({} subscriber(s))", path, delivered);
        }
    }
}

impl Default for Revalidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_each_path() {
        let revalidator = Revalidator::new();
        let mut rx = revalidator.subscribe();

        revalidator.revalidate(&[NGOS_PATH, INVITE_CODES_PATH]);

        assert_eq!(rx.recv().await.unwrap().path, NGOS_PATH);
        assert_eq!(rx.recv().await.unwrap().path, INVITE_CODES_PATH);
    }

    #[test]
    fn revalidate_without_subscribers_is_fine() {
        Revalidator::new().revalidate(&[PROTESTS_PATH]);
    }
}
