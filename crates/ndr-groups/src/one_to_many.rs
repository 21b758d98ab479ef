use base64::Engine;

use crate::{sender_key::SenderKeyState, types::MESSAGE_EVENT_KIND, Error, Result};

/// One-to-many publishing over a single sender-controlled Nostr keypair:
///
/// - outer content is `base64(key_id_be || message_number_be || aead_ciphertext)`.
/// - the outer event itself carries no group identifier; routing from a
///   delivered event back to a group happens by sender-event pubkey, which
///   `GroupManager` tracks separately.
#[derive(Debug, Clone)]
pub struct OneToManyChannel {
    outer_kind: u32,
}

impl Default for OneToManyChannel {
    fn default() -> Self {
        Self {
            outer_kind: MESSAGE_EVENT_KIND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneToManyMessage {
    pub key_id: u32,
    pub message_number: u32,
    pub ciphertext: Vec<u8>,
}

impl OneToManyMessage {
    pub fn decrypt(&self, state: &mut SenderKeyState) -> Result<Vec<u8>> {
        state.decrypt(self.message_number, &self.ciphertext)
    }
}

impl OneToManyChannel {
    pub fn new(outer_kind: u32) -> Self {
        Self { outer_kind }
    }

    pub fn outer_kind(&self) -> u32 {
        self.outer_kind
    }

    pub fn build_outer_content(
        &self,
        key_id: u32,
        message_number: u32,
        ciphertext_bytes: &[u8],
    ) -> String {
        let mut payload = Vec::with_capacity(8 + ciphertext_bytes.len());
        payload.extend_from_slice(&key_id.to_be_bytes());
        payload.extend_from_slice(&message_number.to_be_bytes());
        payload.extend_from_slice(ciphertext_bytes);
        base64::engine::general_purpose::STANDARD.encode(payload)
    }

    pub fn parse_outer_content(&self, content: &str) -> Result<OneToManyMessage> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(content)
            .map_err(|e| Error::PayloadMalformed(e.to_string()))?;
        if bytes.len() < 8 {
            return Err(Error::PayloadTooShort);
        }
        let key_id = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let message_number = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        Ok(OneToManyMessage {
            key_id,
            message_number,
            ciphertext: bytes[8..].to_vec(),
        })
    }

    pub fn encrypt_to_outer_event(
        &self,
        sender_event_keys: &nostr::Keys,
        sender_key: &mut SenderKeyState,
        inner_plaintext: &[u8],
        created_at: nostr::Timestamp,
    ) -> Result<nostr::Event> {
        let (message_number, ciphertext_bytes) = sender_key.encrypt(inner_plaintext)?;
        let content =
            self.build_outer_content(sender_key.key_id, message_number, &ciphertext_bytes);

        let unsigned =
            nostr::EventBuilder::new(nostr::Kind::Custom(self.outer_kind as u16), &content)
                .custom_created_at(created_at)
                .build(sender_event_keys.public_key());

        let signed = unsigned.sign_with_keys(sender_event_keys)?;
        Ok(signed)
    }
}
