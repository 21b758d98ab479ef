use base64::Engine;
use nostr::nips::nip44;
use nostr::{EventBuilder, Keys, PublicKey, Tag};

use crate::{types::SHARED_CHANNEL_KIND, Error, Result};

/// A self-encrypted NIP-44 channel derived from a shared secret: anyone who
/// knows the secret can publish and read events on it. Used for
/// out-of-band coordination (e.g. invite acceptance) where there is no
/// group yet to carry a sender-key chain. Inner content is rumor JSON
/// identifying the real author.
pub struct SharedChannel {
    public_key: PublicKey,
    secret_key: [u8; 32],
    conversation_key: nip44::v2::ConversationKey,
}

impl SharedChannel {
    pub fn new(secret_bytes: &[u8; 32]) -> Result<Self> {
        let secret_key = nostr::SecretKey::from_slice(secret_bytes)?;
        let keys = Keys::new(secret_key);
        let public_key = keys.public_key();

        let conversation_key = nip44::v2::ConversationKey::derive(keys.secret_key(), &public_key);

        Ok(Self {
            public_key,
            secret_key: *secret_bytes,
            conversation_key,
        })
    }

    /// Encrypts a rumor JSON string and returns a signed outer event.
    pub fn create_event(&self, rumor_json: &str) -> Result<nostr::Event> {
        let encrypted = nip44::v2::encrypt_to_bytes(&self.conversation_key, rumor_json)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&encrypted);

        let rumor_pubkey = serde_json::from_str::<serde_json::Value>(rumor_json)
            .ok()
            .and_then(|v| v["pubkey"].as_str().map(|s| s.to_string()))
            .unwrap_or_default();

        let secret_key = nostr::SecretKey::from_slice(&self.secret_key)?;
        let keys = Keys::new(secret_key);

        let unsigned = EventBuilder::new(nostr::Kind::Custom(SHARED_CHANNEL_KIND as u16), &encoded)
            .tag(Tag::identifier(&rumor_pubkey))
            .build(keys.public_key());

        let event = unsigned
            .sign_with_keys(&keys)
            .map_err(|e| Error::InvalidEvent(e.to_string()))?;

        Ok(event)
    }

    pub fn decrypt_event(&self, event: &nostr::Event) -> Result<String> {
        let ciphertext_bytes = base64::engine::general_purpose::STANDARD
            .decode(event.content.as_bytes())
            .map_err(|e| Error::Decryption(format!("base64 decode error: {e}")))?;

        let plaintext_bytes =
            nip44::v2::decrypt_to_bytes(&self.conversation_key, &ciphertext_bytes)?;

        String::from_utf8(plaintext_bytes)
            .map_err(|e| Error::Decryption(format!("utf-8 decode error: {e}")))
    }

    pub fn is_channel_event(&self, event: &nostr::Event) -> bool {
        event.pubkey == self.public_key
            && event.kind == nostr::Kind::Custom(SHARED_CHANNEL_KIND as u16)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}
