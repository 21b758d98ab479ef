//! Wire-stable constants and small shared types.

/// Outer one-to-many message event (default `outerKind`).
pub const MESSAGE_EVENT_KIND: u32 = 1060;
/// Inner chat message kind.
pub const CHAT_MESSAGE_KIND: u32 = 14;
/// Inner reaction kind.
pub const REACTION_KIND: u32 = 7;
/// Inner receipt kind.
pub const RECEIPT_KIND: u32 = 15;
/// Inner typing kind.
pub const TYPING_KIND: u32 = 25;
/// Shared-channel NIP-44 envelope kind.
pub const SHARED_CHANNEL_KIND: u32 = 4;
/// Group sender-key distribution rumor kind.
pub const GROUP_SENDER_KEY_DISTRIBUTION_KIND: u32 = 443;
/// Invite / application-keys addressable events.
pub const INVITE_EVENT_KIND: u32 = 30078;
/// Per-chat settings, passed through unchanged.
pub const CHAT_SETTINGS_KIND: u32 = 10448;
/// Local tombstone, passed through unchanged.
pub const LOCAL_TOMBSTONE_KIND: u32 = 10449;

/// NIP-40-style expiration tag name.
///
/// For disappearing messages, include this tag on the *inner* rumor:
/// `["expiration", "<unix seconds>"]`. Purging expired messages is the
/// host's responsibility; this core only passes the tag through.
pub const EXPIRATION_TAG: &str = "expiration";

/// Group-scope tag name carried on every inner rumor.
pub const GROUP_TAG: &str = "l";

/// Tag naming which inbound rumor kind a group inner event carries, used
/// only to help hosts dispatch without re-parsing `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerRumorKind {
    Message,
    Reaction,
    Receipt,
    Typing,
    Distribution,
    Settings,
    Tombstone,
    Other(u32),
}

impl From<u32> for InnerRumorKind {
    fn from(kind: u32) -> Self {
        match kind {
            CHAT_MESSAGE_KIND => InnerRumorKind::Message,
            REACTION_KIND => InnerRumorKind::Reaction,
            RECEIPT_KIND => InnerRumorKind::Receipt,
            TYPING_KIND => InnerRumorKind::Typing,
            GROUP_SENDER_KEY_DISTRIBUTION_KIND => InnerRumorKind::Distribution,
            CHAT_SETTINGS_KIND => InnerRumorKind::Settings,
            LOCAL_TOMBSTONE_KIND => InnerRumorKind::Tombstone,
            other => InnerRumorKind::Other(other),
        }
    }
}
