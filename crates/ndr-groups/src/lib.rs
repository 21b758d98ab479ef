//! Sender-key group messaging core: a symmetric forward-secure ratchet per
//! sender, a one-to-many outer payload codec, a per-group state machine,
//! and a manager that multiplexes many groups over a single relay-style
//! pub/sub transport.
//!
//! This crate has no network or filesystem dependency of its own; hosts
//! plug in a [`StorageAdapter`] and, optionally, a [`TransportAdapter`].

mod error;
mod file_storage;
mod group;
mod group_manager;
mod group_metadata;
mod message_queue;
mod one_to_many;
mod sender_key;
mod shared_channel;
mod storage;
mod transport;
mod types;
mod utils;

pub use error::{Error, Result};

pub use file_storage::{DebouncedFileStorage, FileStorageAdapter};
pub use group::{Group, GroupDecryptedEvent, GroupSendEvent, GroupSendResult};
pub use group_manager::{ErrorContext, FailedOperation, GroupManager, GroupManagerOptions};
pub use group_metadata::{
    add_group_admin, add_group_member, apply_metadata_update, build_group_metadata_content,
    create_group_data, generate_group_secret, is_group_admin, parse_group_metadata,
    remove_group_admin, remove_group_member, update_group_data, validate_metadata_creation,
    validate_metadata_update, GroupData, GroupMetadata, GroupUpdate, MetadataValidation,
};
pub use message_queue::{MessageQueue, QueueEntry};
pub use one_to_many::{OneToManyChannel, OneToManyMessage};
pub use sender_key::{
    SenderKeyDistribution, SenderKeyState, SENDER_KEY_MAX_SKIP, SENDER_KEY_MAX_STORED_SKIPPED,
};
pub use shared_channel::SharedChannel;
pub use storage::{InMemoryStorage, StorageAdapter};
pub use transport::{Subscription, SubscriptionFilter, TransportAdapter};
pub use types::{
    InnerRumorKind, CHAT_MESSAGE_KIND, CHAT_SETTINGS_KIND, EXPIRATION_TAG, GROUP_TAG,
    GROUP_SENDER_KEY_DISTRIBUTION_KIND, INVITE_EVENT_KIND, LOCAL_TOMBSTONE_KIND,
    MESSAGE_EVENT_KIND, REACTION_KIND, RECEIPT_KIND, SHARED_CHANNEL_KIND, TYPING_KIND,
};
pub use utils::{bytes32_from_hex, canonical_authors_key, kdf, now_millis, pubkey_from_hex, pubkey_to_hex};
