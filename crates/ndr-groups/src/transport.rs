use crate::Result;
use nostr::{Event, PublicKey};
use std::sync::Arc;

/// Filter describing which outer events a subscription wants. Mirrors the
/// subset of a relay `REQ` filter that group outer-event sync needs: kinds
/// plus an author set. Hosts that need more (since/until/tags) can widen
/// this or layer it underneath their own filter construction.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub kinds: Vec<u32>,
    pub authors: Vec<PublicKey>,
}

impl SubscriptionFilter {
    pub fn new(kinds: Vec<u32>, authors: Vec<PublicKey>) -> Self {
        Self { kinds, authors }
    }
}

/// A handle that ends a subscription when dropped or when `unsubscribe` is
/// called explicitly. Implementors may use this only to log; the contract
/// is that no more events are delivered to the associated callback after
/// either path runs.
pub trait Subscription: Send + Sync {
    fn unsubscribe(&self);
}

/// Pub/sub boundary between group logic and a relay pool. `GroupManager`
/// calls `subscribe` once per distinct author set it cares about and
/// `publish` once per outer event it sends; it never assumes delivery
/// ordering or exactly-once delivery.
pub trait TransportAdapter: Send + Sync {
    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        on_event: Box<dyn Fn(Event) + Send + Sync>,
    ) -> Result<Arc<dyn Subscription>>;

    fn publish(&self, event: Event) -> Result<Event>;
}
