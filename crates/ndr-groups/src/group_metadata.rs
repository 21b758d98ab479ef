//! Advisory group membership/metadata bookkeeping, independent of the
//! sender-key ratchet. A `Group` cares about who currently holds a
//! sender-event pubkey; this module is the layer above that decides who is
//! *allowed* to, and publishes that roster as a small JSON document admins
//! can update.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupData {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadata {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValidation {
    Accept,
    Reject,
    Removed,
}

pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub picture: Option<String>,
}

pub fn is_group_admin(group: &GroupData, pubkey: &str) -> bool {
    group.admins.iter().any(|a| a == pubkey)
}

pub fn generate_group_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

pub fn create_group_data(name: &str, creator_pubkey: &str, member_pubkeys: &[&str]) -> GroupData {
    let mut all_members = vec![creator_pubkey.to_string()];
    for pk in member_pubkeys {
        if *pk != creator_pubkey {
            all_members.push(pk.to_string());
        }
    }

    GroupData {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: None,
        picture: None,
        members: all_members,
        admins: vec![creator_pubkey.to_string()],
        created_at: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64,
        secret: Some(generate_group_secret()),
        accepted: Some(true),
    }
}

pub fn build_group_metadata_content(group: &GroupData, exclude_secret: bool) -> String {
    let metadata = GroupMetadata {
        id: group.id.clone(),
        name: group.name.clone(),
        members: group.members.clone(),
        admins: group.admins.clone(),
        description: group.description.clone(),
        picture: group.picture.clone(),
        secret: if exclude_secret {
            None
        } else {
            group.secret.clone()
        },
    };
    serde_json::to_string(&metadata).unwrap()
}

pub fn parse_group_metadata(content: &str) -> Option<GroupMetadata> {
    let val: serde_json::Value = serde_json::from_str(content).ok()?;
    let obj = val.as_object()?;

    let id = obj.get("id")?.as_str()?;
    let name = obj.get("name")?.as_str()?;

    let members_val = obj.get("members")?;
    let members_arr = members_val.as_array()?;
    let members: Vec<String> = members_arr
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if members.len() != members_arr.len() {
        return None;
    }

    let admins_val = obj.get("admins")?;
    let admins_arr = admins_val.as_array()?;
    if admins_arr.is_empty() {
        return None;
    }
    let admins: Vec<String> = admins_arr
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if admins.len() != admins_arr.len() {
        return None;
    }

    let description = obj
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let picture = obj
        .get("picture")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let secret = obj
        .get("secret")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(GroupMetadata {
        id: id.to_string(),
        name: name.to_string(),
        description,
        picture,
        members,
        admins,
        secret,
    })
}

pub fn validate_metadata_update(
    existing: &GroupData,
    metadata: &GroupMetadata,
    sender: &str,
    my_pubkey: &str,
) -> MetadataValidation {
    if !is_group_admin(existing, sender) {
        return MetadataValidation::Reject;
    }
    if !metadata.members.iter().any(|m| m == my_pubkey) {
        return MetadataValidation::Removed;
    }
    MetadataValidation::Accept
}

pub fn validate_metadata_creation(metadata: &GroupMetadata, sender: &str, my_pubkey: &str) -> bool {
    if !metadata.admins.iter().any(|a| a == sender) {
        return false;
    }
    if !metadata.members.iter().any(|m| m == my_pubkey) {
        return false;
    }
    true
}

pub fn apply_metadata_update(existing: &GroupData, metadata: &GroupMetadata) -> GroupData {
    GroupData {
        id: existing.id.clone(),
        name: metadata.name.clone(),
        members: metadata.members.clone(),
        admins: metadata.admins.clone(),
        description: metadata.description.clone(),
        picture: metadata.picture.clone(),
        secret: metadata.secret.clone().or_else(|| existing.secret.clone()),
        created_at: existing.created_at,
        accepted: existing.accepted,
    }
}

pub fn add_group_member(group: &GroupData, pubkey: &str, actor: &str) -> Option<GroupData> {
    if !is_group_admin(group, actor) {
        return None;
    }
    if group.members.iter().any(|m| m == pubkey) {
        return None;
    }
    let mut new_members = group.members.clone();
    new_members.push(pubkey.to_string());
    Some(GroupData {
        members: new_members,
        secret: Some(generate_group_secret()),
        ..group.clone()
    })
}

pub fn remove_group_member(group: &GroupData, pubkey: &str, actor: &str) -> Option<GroupData> {
    if !is_group_admin(group, actor) {
        return None;
    }
    if !group.members.iter().any(|m| m == pubkey) {
        return None;
    }
    if pubkey == actor {
        return None;
    }
    Some(GroupData {
        members: group
            .members
            .iter()
            .filter(|m| *m != pubkey)
            .cloned()
            .collect(),
        admins: group
            .admins
            .iter()
            .filter(|a| *a != pubkey)
            .cloned()
            .collect(),
        secret: Some(generate_group_secret()),
        ..group.clone()
    })
}

pub fn update_group_data(
    group: &GroupData,
    updates: &GroupUpdate,
    actor: &str,
) -> Option<GroupData> {
    if !is_group_admin(group, actor) {
        return None;
    }
    let mut updated = group.clone();
    if let Some(ref name) = updates.name {
        updated.name = name.clone();
    }
    if let Some(ref description) = updates.description {
        updated.description = Some(description.clone());
    }
    if let Some(ref picture) = updates.picture {
        updated.picture = Some(picture.clone());
    }
    Some(updated)
}

pub fn add_group_admin(group: &GroupData, pubkey: &str, actor: &str) -> Option<GroupData> {
    if !is_group_admin(group, actor) {
        return None;
    }
    if !group.members.iter().any(|m| m == pubkey) {
        return None;
    }
    if group.admins.iter().any(|a| a == pubkey) {
        return None;
    }
    let mut new_admins = group.admins.clone();
    new_admins.push(pubkey.to_string());
    Some(GroupData {
        admins: new_admins,
        ..group.clone()
    })
}

pub fn remove_group_admin(group: &GroupData, pubkey: &str, actor: &str) -> Option<GroupData> {
    if !is_group_admin(group, actor) {
        return None;
    }
    if !group.admins.iter().any(|a| a == pubkey) {
        return None;
    }
    if group.admins.len() <= 1 {
        return None;
    }
    Some(GroupData {
        admins: group
            .admins
            .iter()
            .filter(|a| *a != pubkey)
            .cloned()
            .collect(),
        ..group.clone()
    })
}
