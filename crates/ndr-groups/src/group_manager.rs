use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nostr::{Event, PublicKey, UnsignedEvent};

use crate::{
    group::{Group, GroupDecryptedEvent, GroupSendEvent, GroupSendResult},
    group_metadata::GroupData,
    one_to_many::OneToManyChannel,
    sender_key::SenderKeyDistribution,
    storage::InMemoryStorage,
    transport::{Subscription, SubscriptionFilter, TransportAdapter},
    utils::canonical_authors_key,
    Error, Result, StorageAdapter,
};

/// Names the operation that failed when `GroupManager` reports through
/// `on_error`, so a host can decide whether to log, retry, or surface it
/// to a user without parsing error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedOperation {
    HandleIncomingSessionEvent,
    HandleOuterEvent,
    SendEvent,
    RotateSenderKey,
    SyncOuterSubscription,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: FailedOperation,
    pub group_id: Option<String>,
}

pub struct GroupManagerOptions {
    pub our_pubkey: PublicKey,
    pub storage: Option<Arc<dyn StorageAdapter>>,
    pub one_to_many: Option<OneToManyChannel>,
    pub transport: Option<Arc<dyn TransportAdapter>>,
    pub on_error: Option<Arc<dyn Fn(ErrorContext, Error) + Send + Sync>>,
}

impl Default for GroupManagerOptions {
    fn default() -> Self {
        Self {
            our_pubkey: nostr::Keys::generate().public_key(),
            storage: None,
            one_to_many: None,
            transport: None,
            on_error: None,
        }
    }
}

/// Owns every `Group` this process participates in, routes inbound
/// pairwise rumors and outer broadcast events to the right one, and keeps
/// a single outer-event subscription in sync with the union of
/// sender-event pubkeys across all of them.
pub struct GroupManager {
    our_pubkey: PublicKey,
    storage: Arc<dyn StorageAdapter>,
    one_to_many: OneToManyChannel,
    transport: Option<Arc<dyn TransportAdapter>>,
    on_error: Option<Arc<dyn Fn(ErrorContext, Error) + Send + Sync>>,
    on_event: Option<Arc<dyn Fn(Event) + Send + Sync>>,

    groups: HashMap<String, Group>,
    sender_event_to_group: HashMap<PublicKey, String>,
    group_to_sender_events: HashMap<String, HashSet<PublicKey>>,
    pending_outer_by_sender_event: HashMap<PublicKey, Vec<Event>>,
    max_pending_per_sender_event: usize,

    current_subscription_key: Option<String>,
    current_subscription: Option<Arc<dyn Subscription>>,
}

impl GroupManager {
    pub fn new(opts: GroupManagerOptions) -> Self {
        Self {
            our_pubkey: opts.our_pubkey,
            storage: opts
                .storage
                .unwrap_or_else(|| Arc::new(InMemoryStorage::new())),
            one_to_many: opts.one_to_many.unwrap_or_default(),
            transport: opts.transport,
            on_error: opts.on_error,
            on_event: None,
            groups: HashMap::new(),
            sender_event_to_group: HashMap::new(),
            group_to_sender_events: HashMap::new(),
            pending_outer_by_sender_event: HashMap::new(),
            max_pending_per_sender_event: 128,
            current_subscription_key: None,
            current_subscription: None,
        }
    }

    fn report_error(&self, operation: FailedOperation, group_id: Option<String>, err: Error) {
        if let Some(on_error) = &self.on_error {
            on_error(ErrorContext { operation, group_id }, err);
        }
    }

    pub fn upsert_group(&mut self, data: GroupData) -> Result<()> {
        let group_id = data.id.clone();

        if let Some(group) = self.groups.get_mut(&group_id) {
            group.set_data(data);
        } else {
            let group = Group::new(data, self.our_pubkey, self.storage.clone(), self.one_to_many.clone());
            self.groups.insert(group_id.clone(), group);
        }

        self.refresh_group_sender_mappings(&group_id);
        if let Err(err) = self.resync_outer_subscription() {
            self.report_error(FailedOperation::SyncOuterSubscription, Some(group_id), err);
        }
        Ok(())
    }

    pub fn remove_group(&mut self, group_id: &str) {
        self.groups.remove(group_id);

        if let Some(sender_events) = self.group_to_sender_events.get(group_id) {
            for sender_event_pubkey in sender_events {
                if self
                    .sender_event_to_group
                    .get(sender_event_pubkey)
                    .is_some_and(|mapped| mapped == group_id)
                {
                    self.sender_event_to_group.remove(sender_event_pubkey);
                }
            }
        }
        self.group_to_sender_events.remove(group_id);

        if let Err(err) = self.resync_outer_subscription() {
            self.report_error(
                FailedOperation::SyncOuterSubscription,
                Some(group_id.to_string()),
                err,
            );
        }
    }

    /// Drops all managed groups and tears down the outer subscription, if
    /// any. Intended for process shutdown or a full local wipe.
    pub fn destroy(&mut self) {
        if let Some(sub) = self.current_subscription.take() {
            sub.unsubscribe();
        }
        self.current_subscription_key = None;
        self.groups.clear();
        self.sender_event_to_group.clear();
        self.group_to_sender_events.clear();
        self.pending_outer_by_sender_event.clear();
    }

    /// All sender-event pubkeys currently known across managed groups,
    /// de-duplicated and sorted. Drives the outer subscription's author
    /// filter.
    pub fn known_sender_event_pubkeys(&mut self) -> Vec<PublicKey> {
        let group_ids: Vec<String> = self.groups.keys().cloned().collect();
        for group_id in group_ids {
            self.refresh_group_sender_mappings(&group_id);
        }

        let mut values: Vec<PublicKey> = self.sender_event_to_group.keys().copied().collect();
        values.sort_by_key(|pk| pk.to_hex());
        values.dedup();
        values
    }

    pub fn send_message<F, G>(
        &mut self,
        group_id: &str,
        message: &str,
        send_pairwise: &mut F,
        publish_outer: &mut G,
        now_ms: Option<u64>,
    ) -> Result<GroupSendResult>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
        G: FnMut(&Event) -> Result<()>,
    {
        self.send_event(
            group_id,
            GroupSendEvent::message(message),
            send_pairwise,
            publish_outer,
            now_ms,
        )
    }

    pub fn send_event<F, G>(
        &mut self,
        group_id: &str,
        event: GroupSendEvent,
        send_pairwise: &mut F,
        publish_outer: &mut G,
        now_ms: Option<u64>,
    ) -> Result<GroupSendResult>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
        G: FnMut(&Event) -> Result<()>,
    {
        let Some(group) = self.groups.get_mut(group_id) else {
            let err = Error::UnknownGroup(group_id.to_string());
            self.report_error(FailedOperation::SendEvent, Some(group_id.to_string()), clone_error(&err));
            return Err(err);
        };

        let result = group.send_event(event, send_pairwise, publish_outer, now_ms);
        if let Err(err) = &result {
            self.report_error(FailedOperation::SendEvent, Some(group_id.to_string()), clone_error(err));
        }
        self.refresh_group_sender_mappings(group_id);
        result
    }

    pub fn rotate_sender_key<F>(
        &mut self,
        group_id: &str,
        send_pairwise: &mut F,
        now_ms: Option<u64>,
    ) -> Result<SenderKeyDistribution>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
    {
        let Some(group) = self.groups.get_mut(group_id) else {
            return Err(Error::UnknownGroup(group_id.to_string()));
        };

        let result = group.rotate_sender_key(send_pairwise, now_ms);
        if let Err(err) = &result {
            self.report_error(
                FailedOperation::RotateSenderKey,
                Some(group_id.to_string()),
                clone_error(err),
            );
        }
        self.refresh_group_sender_mappings(group_id);
        result
    }

    /// Routes a pairwise-delivered sender-key distribution rumor to the
    /// group it targets (read off the rumor's group tag), then drains any
    /// outer events that arrived before the distribution did.
    pub fn handle_incoming_session_event(
        &mut self,
        rumor: &UnsignedEvent,
        from_member_pubkey: PublicKey,
    ) -> Vec<GroupDecryptedEvent> {
        let Some(group_id) = first_tag_value(&rumor.tags, crate::types::GROUP_TAG) else {
            return Vec::new();
        };
        let Some(group) = self.groups.get_mut(&group_id) else {
            return Vec::new();
        };

        let decrypted = group.handle_incoming_session_event(rumor, from_member_pubkey);

        self.refresh_group_sender_mappings(&group_id);

        let mut combined = decrypted;
        if let Ok(sender_event_pubkeys) = self
            .groups
            .get_mut(&group_id)
            .map(|g| g.list_sender_event_pubkeys())
            .unwrap_or(Ok(Vec::new()))
        {
            for sender_event_pubkey in sender_event_pubkeys {
                let mut drained =
                    self.drain_pending_outer_for_sender_event(&group_id, sender_event_pubkey);
                combined.append(&mut drained);
            }
        }

        if let Err(err) = self.resync_outer_subscription() {
            self.report_error(
                FailedOperation::SyncOuterSubscription,
                Some(group_id),
                err,
            );
        }

        combined
    }

    pub fn handle_outer_event(&mut self, outer: &Event) -> Option<GroupDecryptedEvent> {
        if outer.kind != nostr::Kind::Custom(self.one_to_many.outer_kind() as u16) {
            return None;
        }

        let sender_event_pubkey = outer.pubkey;
        let Some(group_id) = self.sender_event_to_group.get(&sender_event_pubkey).cloned() else {
            self.queue_pending_outer(sender_event_pubkey, outer.clone());
            return None;
        };

        let Some(group) = self.groups.get_mut(&group_id) else {
            self.queue_pending_outer(sender_event_pubkey, outer.clone());
            return None;
        };

        match group.handle_outer_event(outer) {
            Ok(decrypted) => decrypted,
            Err(err) => {
                self.report_error(FailedOperation::HandleOuterEvent, Some(group_id), err);
                None
            }
        }
    }

    /// Registers (or replaces) the callback invoked for every outer event
    /// the subscription delivers, then syncs immediately. Subsequent
    /// membership changes (`upsertGroup`, `removeGroup`,
    /// `handleIncomingSessionEvent`) resync automatically using this same
    /// callback, matching hosts' expectation that they wire it up once.
    pub fn sync_outer_subscription(
        &mut self,
        on_event: impl Fn(Event) + Send + Sync + 'static,
    ) -> Result<()> {
        self.on_event = Some(Arc::new(on_event));
        self.resync_outer_subscription()
    }

    /// Diffs the current union of sender-event pubkeys against the last
    /// subscription we opened and (re)subscribes only when the set
    /// actually changed, so a relay never sees churn it doesn't need to.
    fn resync_outer_subscription(&mut self) -> Result<()> {
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };
        let Some(on_event) = self.on_event.clone() else {
            return Ok(());
        };

        let authors = self.known_sender_event_pubkeys();
        let key = canonical_authors_key(&authors);

        if self.current_subscription_key.as_deref() == Some(key.as_str()) {
            return Ok(());
        }

        if let Some(sub) = self.current_subscription.take() {
            sub.unsubscribe();
        }

        if authors.is_empty() {
            self.current_subscription_key = None;
            return Ok(());
        }

        let filter = SubscriptionFilter::new(vec![self.one_to_many.outer_kind()], authors);
        match transport.subscribe(filter, Box::new(move |event| on_event(event))) {
            Ok(sub) => {
                self.current_subscription = Some(sub);
                self.current_subscription_key = Some(key);
                Ok(())
            }
            Err(err) => {
                self.report_error(FailedOperation::SyncOuterSubscription, None, clone_error(&err));
                Err(err)
            }
        }
    }

    fn refresh_group_sender_mappings(&mut self, group_id: &str) {
        let Some(group) = self.groups.get_mut(group_id) else {
            return;
        };
        let Ok(next_sender_events) = group.list_sender_event_pubkeys() else {
            return;
        };

        let next: HashSet<PublicKey> = next_sender_events.into_iter().collect();
        let prev = self
            .group_to_sender_events
            .get(group_id)
            .cloned()
            .unwrap_or_default();

        for sender_event_pubkey in &prev {
            if next.contains(sender_event_pubkey) {
                continue;
            }
            if self
                .sender_event_to_group
                .get(sender_event_pubkey)
                .is_some_and(|mapped| mapped == group_id)
            {
                self.sender_event_to_group.remove(sender_event_pubkey);
            }
        }

        for sender_event_pubkey in &next {
            self.sender_event_to_group
                .insert(*sender_event_pubkey, group_id.to_string());
        }

        self.group_to_sender_events.insert(group_id.to_string(), next);
    }

    fn queue_pending_outer(&mut self, sender_event_pubkey: PublicKey, outer: Event) {
        let pending = self
            .pending_outer_by_sender_event
            .entry(sender_event_pubkey)
            .or_default();
        if pending.len() >= self.max_pending_per_sender_event {
            pending.remove(0);
        }
        pending.push(outer);
    }

    fn drain_pending_outer_for_sender_event(
        &mut self,
        group_id: &str,
        sender_event_pubkey: PublicKey,
    ) -> Vec<GroupDecryptedEvent> {
        let Some(pending) = self.pending_outer_by_sender_event.remove(&sender_event_pubkey) else {
            return Vec::new();
        };
        if pending.is_empty() {
            return Vec::new();
        }

        let mut with_message_number: Vec<(Event, u32)> = pending
            .into_iter()
            .map(|outer| {
                let message_number = self
                    .one_to_many
                    .parse_outer_content(&outer.content)
                    .map(|parsed| parsed.message_number)
                    .unwrap_or(0);
                (outer, message_number)
            })
            .collect();
        with_message_number.sort_by_key(|(_, message_number)| *message_number);

        let Some(group) = self.groups.get_mut(group_id) else {
            return Vec::new();
        };

        let mut decrypted = Vec::new();
        for (outer, _) in with_message_number {
            match group.handle_outer_event(&outer) {
                Ok(Some(event)) => decrypted.push(event),
                Ok(None) => {}
                Err(err) => self.report_error(
                    FailedOperation::HandleOuterEvent,
                    Some(group_id.to_string()),
                    err,
                ),
            }
        }
        decrypted
    }
}

fn clone_error(err: &Error) -> Error {
    // `Error` doesn't implement `Clone` (some variants wrap non-`Clone`
    // upstream error types); re-describe it as a plain string instead of
    // threading `&Error` through the reporting path.
    Error::InvalidEvent(err.to_string())
}

fn first_tag_value(tags: &nostr::Tags, key: &str) -> Option<String> {
    tags.iter().find_map(|tag| {
        let parts = tag.clone().to_vec();
        if parts.first().map(|s| s.as_str()) == Some(key) {
            parts.get(1).cloned()
        } else {
            None
        }
    })
}
