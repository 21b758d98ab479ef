use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Too many skipped messages")]
    TooManySkippedMessages,

    #[error("Missing skipped sender key message")]
    MissingSkippedKey,

    #[error("One-to-many payload too short")]
    PayloadTooShort,

    #[error("One-to-many payload malformed: {0}")]
    PayloadMalformed(String),

    #[error("AEAD verification failed: {0}")]
    AeadFailure(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Unknown sender-event pubkey")]
    UnknownSender,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    NostrKey(#[from] nostr::key::Error),

    #[error(transparent)]
    Nostr(#[from] nostr::event::Error),

    #[error(transparent)]
    Nip44(#[from] nostr::nips::nip44::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
