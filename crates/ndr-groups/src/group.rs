//! A single group's sender-key state machine: one send chain plus a
//! receive chain per live sender-event pubkey we've heard from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nostr::{Event, EventBuilder, Keys, Kind, PublicKey, SecretKey, Tag, Timestamp, UnsignedEvent};
use rand::random;

use crate::{
    group_metadata::GroupData,
    one_to_many::OneToManyChannel,
    sender_key::{SenderKeyDistribution, SenderKeyState},
    types::{CHAT_MESSAGE_KIND, GROUP_SENDER_KEY_DISTRIBUTION_KIND, GROUP_TAG},
    utils::{now_millis, pubkey_from_hex, pubkey_to_hex},
    Error, Result, StorageAdapter,
};

/// An inner event a caller wants broadcast to the group, before it is
/// wrapped into a rumor and encrypted.
#[derive(Debug, Clone)]
pub struct GroupSendEvent {
    pub kind: u32,
    pub content: String,
    pub tags: Vec<Vec<String>>,
}

impl GroupSendEvent {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: CHAT_MESSAGE_KIND,
            content: content.into(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupSendResult {
    pub outer: Event,
    pub inner: UnsignedEvent,
}

/// A successfully decrypted group message, with enough provenance for the
/// caller to attribute and deduplicate it.
#[derive(Debug, Clone)]
pub struct GroupDecryptedEvent {
    pub group_id: String,
    pub sender_event_pubkey: PublicKey,
    pub sender_member_pubkey: PublicKey,
    pub outer_event_id: String,
    pub outer_created_at: u64,
    pub key_id: u32,
    pub message_number: u32,
    pub inner: UnsignedEvent,
}

pub struct Group {
    data: GroupData,
    our_pubkey: PublicKey,
    member_pubkeys: Vec<PublicKey>,
    storage: Arc<dyn StorageAdapter>,
    one_to_many: OneToManyChannel,

    initialized: bool,
    member_to_sender_event: HashMap<PublicKey, PublicKey>,
    sender_event_to_member: HashMap<PublicKey, PublicKey>,
    pending_outer: HashMap<(PublicKey, u32), Vec<Event>>,
    pending_distribution_targets: HashSet<PublicKey>,
}

/// Per-`(sender_event_pubkey, key_id)` pending-outer cap, mirroring
/// `GroupManager`'s per-sender-event cap so a known sender-event pubkey
/// can't flood a group with unbounded bogus `key_id`s while its real
/// distribution is still in flight.
const MAX_PENDING_OUTER_PER_KEY: usize = 128;

impl Group {
    pub fn new(
        data: GroupData,
        our_pubkey: PublicKey,
        storage: Arc<dyn StorageAdapter>,
        one_to_many: OneToManyChannel,
    ) -> Self {
        let member_pubkeys: Vec<PublicKey> = data
            .members
            .iter()
            .filter_map(|hex| pubkey_from_hex(hex).ok())
            .collect();
        let pending_distribution_targets = member_pubkeys
            .iter()
            .copied()
            .filter(|pk| *pk != our_pubkey)
            .collect();

        Self {
            data,
            our_pubkey,
            member_pubkeys,
            storage,
            one_to_many,
            initialized: false,
            member_to_sender_event: HashMap::new(),
            sender_event_to_member: HashMap::new(),
            pending_outer: HashMap::new(),
            pending_distribution_targets,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.data.id
    }

    /// Replaces the advisory membership record. Any member newly present
    /// in `data.members` that we hadn't seen before is added to
    /// `pending_distribution_targets`, so members added after the group's
    /// chain already exists still receive a `SenderKeyDistribution` on
    /// the next send — independent of whether the chain itself is new.
    pub fn set_data(&mut self, data: GroupData) {
        let new_member_pubkeys: Vec<PublicKey> = data
            .members
            .iter()
            .filter_map(|hex| pubkey_from_hex(hex).ok())
            .collect();

        let previously_known: HashSet<PublicKey> = self.member_pubkeys.iter().copied().collect();
        for member in &new_member_pubkeys {
            if *member != self.our_pubkey && !previously_known.contains(member) {
                self.pending_distribution_targets.insert(*member);
            }
        }

        self.member_pubkeys = new_member_pubkeys;
        self.data = data;
    }

    pub fn list_sender_event_pubkeys(&mut self) -> Result<Vec<PublicKey>> {
        self.init()?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for value in self.member_to_sender_event.values() {
            if seen.insert(*value) {
                values.push(*value);
            }
        }
        Ok(values)
    }

    /// Generates a fresh `(key_id, chain_key)` *and* a fresh sender-event
    /// keypair together, and distributes both to every other member. The
    /// old sender-event pubkey (and the chain under it) keeps working for
    /// anyone who already has it installed as a peer state; it simply
    /// stops receiving new traffic once we switch to publishing under the
    /// new one.
    pub fn rotate_sender_key<F>(
        &mut self,
        send_pairwise: &mut F,
        now_ms: Option<u64>,
    ) -> Result<SenderKeyDistribution>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
    {
        self.init()?;

        let now_ms = now_ms.unwrap_or_else(now_millis);
        let now_seconds = now_ms / 1000;

        let (_, sender_event_pubkey) = self.generate_and_store_sender_event_keys()?;
        let sender_key_state = self.generate_and_store_sender_key_state()?;

        let distribution = self.build_distribution(now_seconds, sender_event_pubkey, &sender_key_state);
        let rumor = self.build_distribution_rumor(now_seconds, now_ms, &distribution)?;

        self.pending_distribution_targets = self
            .member_pubkeys
            .iter()
            .copied()
            .filter(|pk| *pk != self.our_pubkey)
            .collect();
        self.dispatch_pending_distributions(&rumor, send_pairwise)?;

        Ok(distribution)
    }

    pub fn send_event<F, G>(
        &mut self,
        event: GroupSendEvent,
        send_pairwise: &mut F,
        publish_outer: &mut G,
        now_ms: Option<u64>,
    ) -> Result<GroupSendResult>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
        G: FnMut(&Event) -> Result<()>,
    {
        self.init()?;

        let now_ms = now_ms.unwrap_or_else(now_millis);
        let now_seconds = now_ms / 1000;

        let (sender_event_keys, sender_event_pubkey, _) = self.ensure_our_sender_event_keys()?;
        let (mut sender_key_state, _) = self.ensure_our_sender_key_state()?;

        // Distribution owes one rumor per member still in the pending set,
        // independent of whether the chain/sender-event keypair themselves
        // are new this call — a member added to the group after the chain
        // already existed is pending too (`Group::set_data`), and a target
        // that failed on a previous send stays pending until it succeeds.
        if !self.pending_distribution_targets.is_empty() {
            let distribution =
                self.build_distribution(now_seconds, sender_event_pubkey, &sender_key_state);
            let rumor = self.build_distribution_rumor(now_seconds, now_ms, &distribution)?;
            self.dispatch_pending_distributions(&rumor, send_pairwise)?;
        }

        let inner = self.build_group_inner_rumor(now_seconds, now_ms, event)?;
        let inner_json = serde_json::to_vec(&inner)?;
        let outer = self.one_to_many.encrypt_to_outer_event(
            &sender_event_keys,
            &mut sender_key_state,
            &inner_json,
            Timestamp::from(now_seconds),
        )?;

        self.save_our_sender_key_state(&sender_key_state)?;
        publish_outer(&outer)?;

        Ok(GroupSendResult { outer, inner })
    }

    /// Processes a pairwise-delivered sender-key distribution rumor. On
    /// success, installs a fresh receive chain keyed by the announced
    /// sender-event pubkey and drains anything queued under it.
    pub fn handle_incoming_session_event(
        &mut self,
        rumor: &UnsignedEvent,
        from_member_pubkey: PublicKey,
    ) -> Vec<GroupDecryptedEvent> {
        if self.init().is_err() {
            return Vec::new();
        }
        if !self.member_pubkeys.contains(&from_member_pubkey) {
            return Vec::new();
        }
        if first_tag_value(&rumor.tags, GROUP_TAG).as_deref() != Some(self.group_id()) {
            return Vec::new();
        }
        if rumor.kind != Kind::Custom(GROUP_SENDER_KEY_DISTRIBUTION_KIND as u16) {
            return Vec::new();
        }
        if rumor.pubkey != from_member_pubkey {
            return Vec::new();
        }

        let Ok(dist) = serde_json::from_str::<SenderKeyDistribution>(&rumor.content) else {
            return Vec::new();
        };
        if dist.group_id != self.group_id() {
            return Vec::new();
        }

        let Some(sender_event_pubkey) = dist
            .sender_event_pubkey
            .as_deref()
            .and_then(|hex| pubkey_from_hex(hex).ok())
        else {
            return Vec::new();
        };
        self.set_sender_event_mapping(from_member_pubkey, sender_event_pubkey);

        // Replaces any existing entry for this sender-event pubkey, per the
        // distribution contract. In practice a rotation always pairs a new
        // sender-event pubkey with its chain, so this only clobbers real
        // receive progress on a duplicate delivery of the same snapshot.
        let state = SenderKeyState::from_distribution(&dist);
        let _ = self.save_peer_sender_key_state(sender_event_pubkey, &state);

        self.drain_pending(sender_event_pubkey, dist.key_id)
            .unwrap_or_default()
    }

    /// Decrypts a broadcast outer event. Returns `Ok(None)` for events this
    /// group legitimately has nothing to do with yet (unknown sender-event
    /// pubkey, wrong kind, bad signature, queued pending) and `Err` for
    /// failures worth surfacing to a caller (malformed payload, storage
    /// failure, AEAD verification failure).
    pub fn handle_outer_event(&mut self, outer: &Event) -> Result<Option<GroupDecryptedEvent>> {
        self.init()?;
        if outer.kind != Kind::Custom(self.one_to_many.outer_kind() as u16) {
            return Ok(None);
        }
        if outer.verify().is_err() {
            return Ok(None);
        }

        let parsed = self.one_to_many.parse_outer_content(&outer.content)?;
        let sender_event_pubkey = outer.pubkey;

        let Some(mut state) = self.load_peer_sender_key_state(sender_event_pubkey, parsed.key_id)?
        else {
            self.queue_pending(sender_event_pubkey, parsed.key_id, outer.clone());
            return Ok(None);
        };

        let plaintext = parsed.decrypt(&mut state)?;
        self.save_peer_sender_key_state(sender_event_pubkey, &state)?;

        let sender_member_pubkey = self
            .sender_event_to_member
            .get(&sender_event_pubkey)
            .copied()
            .unwrap_or(sender_event_pubkey);

        let inner = self.parse_inner_rumor(&plaintext, sender_member_pubkey, outer.created_at);
        if let Some(inner_group_id) = first_tag_value(&inner.tags, GROUP_TAG) {
            if inner_group_id != self.group_id() {
                return Ok(None);
            }
        }

        Ok(Some(GroupDecryptedEvent {
            group_id: self.group_id().to_string(),
            sender_event_pubkey,
            sender_member_pubkey,
            outer_event_id: outer.id.to_string(),
            outer_created_at: outer.created_at.as_u64(),
            key_id: parsed.key_id,
            message_number: parsed.message_number,
            inner,
        }))
    }

    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;

        let prefix = format!("{}/member/", self.group_prefix());
        let keys = self.storage.list(&prefix)?;

        for key in keys {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some((member_hex, suffix)) = rest.split_once('/') else {
                continue;
            };
            let Ok(member_pubkey) = pubkey_from_hex(member_hex) else {
                continue;
            };

            if suffix == "sender-event-pubkey" {
                if let Some(value) = self.storage.get(&key)? {
                    if let Ok(sender_event_pubkey) = pubkey_from_hex(&value) {
                        self.set_sender_event_mapping(member_pubkey, sender_event_pubkey);
                    }
                }
            }
        }

        Ok(())
    }

    fn group_prefix(&self) -> String {
        format!("v1/group/{}", self.group_id())
    }

    fn member_prefix(&self, member_pubkey: PublicKey) -> String {
        format!("{}/member/{}", self.group_prefix(), pubkey_to_hex(&member_pubkey))
    }

    fn sender_event_secret_key_key(&self) -> String {
        format!("{}/sender-event-secret-key", self.member_prefix(self.our_pubkey))
    }

    fn sender_event_pubkey_key(&self, member_pubkey: PublicKey) -> String {
        format!("{}/sender-event-pubkey", self.member_prefix(member_pubkey))
    }

    fn latest_key_id_key(&self) -> String {
        format!("{}/latest-key-id", self.member_prefix(self.our_pubkey))
    }

    fn sender_key_state_key(&self, sender_event_pubkey: PublicKey, key_id: u32) -> String {
        format!(
            "{}/sender-key/{}/{}",
            self.group_prefix(),
            pubkey_to_hex(&sender_event_pubkey),
            key_id
        )
    }

    fn set_sender_event_mapping(&mut self, member_pubkey: PublicKey, sender_event_pubkey: PublicKey) {
        if let Some(prev) = self
            .member_to_sender_event
            .insert(member_pubkey, sender_event_pubkey)
        {
            if prev != sender_event_pubkey {
                self.sender_event_to_member.remove(&prev);
            }
        }
        self.sender_event_to_member
            .insert(sender_event_pubkey, member_pubkey);
    }

    fn queue_pending(&mut self, sender_event_pubkey: PublicKey, key_id: u32, outer: Event) {
        let pending = self
            .pending_outer
            .entry((sender_event_pubkey, key_id))
            .or_default();
        if pending.len() >= MAX_PENDING_OUTER_PER_KEY {
            pending.remove(0);
        }
        pending.push(outer);
    }

    /// Sends the distribution rumor to every target still in
    /// `pending_distribution_targets`, dropping each only once its send
    /// succeeds, so a partial failure (`?` on the first error) leaves the
    /// remaining targets pending for the next call rather than silently
    /// skipping them forever.
    fn dispatch_pending_distributions<F>(
        &mut self,
        rumor: &UnsignedEvent,
        send_pairwise: &mut F,
    ) -> Result<()>
    where
        F: FnMut(PublicKey, &UnsignedEvent) -> Result<()>,
    {
        let targets: Vec<PublicKey> = self.pending_distribution_targets.iter().copied().collect();
        for member in targets {
            send_pairwise(member, rumor)?;
            self.pending_distribution_targets.remove(&member);
        }
        Ok(())
    }

    fn drain_pending(
        &mut self,
        sender_event_pubkey: PublicKey,
        key_id: u32,
    ) -> Result<Vec<GroupDecryptedEvent>> {
        let Some(pending) = self.pending_outer.remove(&(sender_event_pubkey, key_id)) else {
            return Ok(Vec::new());
        };
        if pending.is_empty() {
            return Ok(Vec::new());
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

        let mut results = Vec::new();
        for (outer, _) in with_message_number {
            if let Ok(Some(decrypted)) = self.handle_outer_event(&outer) {
                results.push(decrypted);
            }
        }
        Ok(results)
    }

    fn ensure_our_sender_event_keys(&mut self) -> Result<(Keys, PublicKey, bool)> {
        self.init()?;

        if let Some(stored_secret_hex) = self.storage.get(&self.sender_event_secret_key_key())? {
            if let Ok(secret_bytes) = hex::decode(stored_secret_hex) {
                if secret_bytes.len() == 32 {
                    if let Ok(secret_key) = SecretKey::from_slice(&secret_bytes) {
                        let keys = Keys::new(secret_key);
                        let sender_event_pubkey = keys.public_key();
                        self.set_sender_event_mapping(self.our_pubkey, sender_event_pubkey);
                        return Ok((keys, sender_event_pubkey, false));
                    }
                }
            }
        }

        let (keys, sender_event_pubkey) = self.generate_and_store_sender_event_keys()?;
        Ok((keys, sender_event_pubkey, true))
    }

    fn generate_and_store_sender_event_keys(&mut self) -> Result<(Keys, PublicKey)> {
        let keys = Keys::generate();
        let sender_event_pubkey = keys.public_key();
        self.storage.put(
            &self.sender_event_secret_key_key(),
            hex::encode(keys.secret_key().to_secret_bytes()),
        )?;
        self.storage.put(
            &self.sender_event_pubkey_key(self.our_pubkey),
            pubkey_to_hex(&sender_event_pubkey),
        )?;
        self.set_sender_event_mapping(self.our_pubkey, sender_event_pubkey);
        Ok((keys, sender_event_pubkey))
    }

    fn load_peer_sender_key_state(
        &self,
        sender_event_pubkey: PublicKey,
        key_id: u32,
    ) -> Result<Option<SenderKeyState>> {
        let Some(data) = self
            .storage
            .get(&self.sender_key_state_key(sender_event_pubkey, key_id))?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save_peer_sender_key_state(
        &self,
        sender_event_pubkey: PublicKey,
        state: &SenderKeyState,
    ) -> Result<()> {
        let serialized = serde_json::to_string(state)?;
        self.storage.put(
            &self.sender_key_state_key(sender_event_pubkey, state.key_id),
            serialized,
        )?;
        Ok(())
    }

    fn save_our_sender_key_state(&mut self, state: &SenderKeyState) -> Result<()> {
        let our_sender_event_pubkey = self
            .member_to_sender_event
            .get(&self.our_pubkey)
            .copied()
            .ok_or(Error::UnknownSender)?;
        self.save_peer_sender_key_state(our_sender_event_pubkey, state)
    }

    fn ensure_our_sender_key_state(&mut self) -> Result<(SenderKeyState, bool)> {
        self.init()?;

        if let Some(latest_key_id) = self
            .storage
            .get(&self.latest_key_id_key())?
            .and_then(|v| v.parse::<u32>().ok())
        {
            let our_sender_event_pubkey = self.member_to_sender_event.get(&self.our_pubkey).copied();
            if let Some(sender_event_pubkey) = our_sender_event_pubkey {
                if let Some(existing) =
                    self.load_peer_sender_key_state(sender_event_pubkey, latest_key_id)?
                {
                    return Ok((existing, false));
                }
            }
        }

        let state = self.generate_and_store_sender_key_state()?;
        Ok((state, true))
    }

    fn generate_and_store_sender_key_state(&mut self) -> Result<SenderKeyState> {
        let key_id = random::<u32>();
        let chain_key = random::<[u8; 32]>();
        let state = SenderKeyState::new(key_id, chain_key, 0);
        self.save_our_sender_key_state(&state)?;
        self.storage
            .put(&self.latest_key_id_key(), key_id.to_string())?;
        Ok(state)
    }

    fn build_distribution(
        &self,
        now_seconds: u64,
        sender_event_pubkey: PublicKey,
        sender_key: &SenderKeyState,
    ) -> SenderKeyDistribution {
        let mut dist = SenderKeyDistribution::new(
            self.group_id().to_string(),
            sender_key.key_id,
            sender_key.chain_key(),
            sender_key.message_number(),
        )
        .with_sender_event_pubkey(sender_event_pubkey);
        dist.created_at = now_seconds;
        dist
    }

    fn build_distribution_rumor(
        &self,
        now_seconds: u64,
        now_ms: u64,
        dist: &SenderKeyDistribution,
    ) -> Result<UnsignedEvent> {
        let tags = vec![
            parse_tag(&[GROUP_TAG.to_string(), self.group_id().to_string()])?,
            parse_tag(&["key".to_string(), dist.key_id.to_string()])?,
            parse_tag(&["ms".to_string(), now_ms.to_string()])?,
        ];

        Ok(EventBuilder::new(
            Kind::Custom(GROUP_SENDER_KEY_DISTRIBUTION_KIND as u16),
            serde_json::to_string(dist)?,
        )
        .tags(tags)
        .custom_created_at(Timestamp::from(now_seconds))
        .build(self.our_pubkey))
    }

    fn build_group_inner_rumor(
        &self,
        now_seconds: u64,
        now_ms: u64,
        event: GroupSendEvent,
    ) -> Result<UnsignedEvent> {
        let mut has_group_tag = false;
        let mut has_ms_tag = false;
        let mut tags: Vec<Tag> = event
            .tags
            .iter()
            .filter_map(|parts| {
                if parts.first().map(|v| v.as_str()) == Some(GROUP_TAG)
                    && parts.get(1).map(|v| v.as_str()) == Some(self.group_id())
                {
                    has_group_tag = true;
                }
                if parts.first().map(|v| v.as_str()) == Some("ms") {
                    has_ms_tag = true;
                }
                Tag::parse(parts).ok()
            })
            .collect();

        if !has_group_tag {
            tags.insert(
                0,
                parse_tag(&[GROUP_TAG.to_string(), self.group_id().to_string()])?,
            );
        }
        if !has_ms_tag {
            tags.push(parse_tag(&["ms".to_string(), now_ms.to_string()])?);
        }

        Ok(
            EventBuilder::new(Kind::Custom(event.kind as u16), event.content)
                .tags(tags)
                .custom_created_at(Timestamp::from(now_seconds))
                .build(self.our_pubkey),
        )
    }

    fn parse_inner_rumor(
        &self,
        plaintext: &[u8],
        sender_member_pubkey: PublicKey,
        fallback_created_at: Timestamp,
    ) -> UnsignedEvent {
        if let Ok(inner) = serde_json::from_slice::<UnsignedEvent>(plaintext) {
            return inner;
        }

        if let Some(minimal) =
            self.parse_minimal_rumor_json(plaintext, sender_member_pubkey, fallback_created_at)
        {
            return minimal;
        }

        let content = String::from_utf8_lossy(plaintext).to_string();
        EventBuilder::new(Kind::Custom(CHAT_MESSAGE_KIND as u16), content)
            .tags(vec![Tag::parse(&[
                GROUP_TAG.to_string(),
                self.group_id().to_string(),
            ])
            .expect("group tag should be valid")])
            .custom_created_at(fallback_created_at)
            .build(sender_member_pubkey)
    }

    fn parse_minimal_rumor_json(
        &self,
        plaintext: &[u8],
        sender_member_pubkey: PublicKey,
        fallback_created_at: Timestamp,
    ) -> Option<UnsignedEvent> {
        let value: serde_json::Value = serde_json::from_slice(plaintext).ok()?;
        let obj = value.as_object()?;

        let kind_u64 = obj.get("kind")?.as_u64()?;
        if kind_u64 > u16::MAX as u64 {
            return None;
        }
        let kind = Kind::Custom(kind_u64 as u16);
        let content = obj.get("content")?.as_str()?.to_string();

        let mut tags: Vec<Tag> = obj
            .get("tags")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| {
                let arr = v.as_array()?;
                let parts: Vec<String> = arr
                    .iter()
                    .filter_map(|p| p.as_str().map(|s| s.to_string()))
                    .collect();
                if parts.len() != arr.len() {
                    return None;
                }
                Tag::parse(&parts).ok()
            })
            .collect();

        if !tags
            .iter()
            .any(|tag| tag.clone().to_vec().first().map(|s| s.as_str()) == Some(GROUP_TAG))
        {
            tags.insert(
                0,
                Tag::parse(&[GROUP_TAG.to_string(), self.group_id().to_string()]).ok()?,
            );
        }

        let created_at = obj
            .get("created_at")
            .and_then(|v| v.as_u64())
            .map(Timestamp::from)
            .unwrap_or(fallback_created_at);

        Some(
            EventBuilder::new(kind, content)
                .tags(tags)
                .custom_created_at(created_at)
                .build(sender_member_pubkey),
        )
    }
}

fn parse_tag(parts: &[String]) -> Result<Tag> {
    Tag::parse(parts).map_err(|e| Error::InvalidEvent(e.to_string()))
}

fn first_tag_value(tags: &nostr::Tags, name: &str) -> Option<String> {
    tags.iter().find_map(|tag| {
        let parts = tag.clone().to_vec();
        if parts.first().map(|s| s.as_str()) == Some(name) {
            parts.get(1).cloned()
        } else {
            None
        }
    })
}
