//! Black-box scenarios for `Group`/`GroupManager` end-to-end behavior.

use std::sync::{Arc, Mutex};

use ndr_groups::{create_group_data, Error, GroupData, GroupManager, GroupManagerOptions};
use nostr::{Event, Keys, PublicKey, UnsignedEvent};

fn group_data(creator: &Keys, members: &[&Keys]) -> GroupData {
    let member_hexes: Vec<String> = members
        .iter()
        .map(|k| hex::encode(k.public_key().to_bytes()))
        .collect();
    let refs: Vec<&str> = member_hexes.iter().map(String::as_str).collect();
    create_group_data(
        "scenario-group",
        &hex::encode(creator.public_key().to_bytes()),
        &refs,
    )
}

struct Network {
    pairwise: Mutex<Vec<(PublicKey, UnsignedEvent)>>,
    outer: Mutex<Vec<Event>>,
}

impl Network {
    fn new() -> Self {
        Self {
            pairwise: Mutex::new(Vec::new()),
            outer: Mutex::new(Vec::new()),
        }
    }
}

fn manager_for(keys: &Keys) -> GroupManager {
    GroupManager::new(GroupManagerOptions {
        our_pubkey: keys.public_key(),
        ..Default::default()
    })
}

// S1: basic broadcast — single callback, correct inner content/kind/tag.
#[test]
fn s1_basic_broadcast() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let data = group_data(&alice, &[&bob]);
    let group_id = data.id.clone();

    let mut alice_mgr = manager_for(&alice);
    let mut bob_mgr = manager_for(&bob);
    alice_mgr.upsert_group(data.clone()).unwrap();
    bob_mgr.upsert_group(data).unwrap();

    let net = Network::new();
    alice_mgr
        .send_message(
            &group_id,
            "hello",
            &mut |target, rumor| {
                net.pairwise.lock().unwrap().push((target, rumor.clone()));
                Ok(())
            },
            &mut |outer| {
                net.outer.lock().unwrap().push(outer.clone());
                Ok(())
            },
            Some(1_700_000_000_000),
        )
        .unwrap();

    let mut fired = Vec::new();
    for (_target, rumor) in net.pairwise.lock().unwrap().iter() {
        fired.extend(bob_mgr.handle_incoming_session_event(rumor, alice.public_key()));
    }
    for outer in net.outer.lock().unwrap().iter() {
        if let Some(event) = bob_mgr.handle_outer_event(outer) {
            fired.push(event);
        }
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].inner.content, "hello");
    assert_eq!(fired[0].inner.kind.as_u16() as u32, ndr_groups::CHAT_MESSAGE_KIND);
    assert_eq!(fired[0].sender_member_pubkey, alice.public_key());
    assert!(fired[0]
        .inner
        .tags
        .iter()
        .any(|tag| tag.clone().to_vec() == vec![ndr_groups::GROUP_TAG.to_string(), fired[0].group_id.clone()]));
}

// S2: outer arrives before its distribution — queued, no callback, then a
// single callback fires once the distribution is installed.
#[test]
fn s2_outer_before_distribution() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let data = group_data(&alice, &[&bob]);
    let group_id = data.id.clone();

    let mut alice_mgr = manager_for(&alice);
    let mut bob_mgr = manager_for(&bob);
    alice_mgr.upsert_group(data.clone()).unwrap();
    bob_mgr.upsert_group(data).unwrap();

    let net = Network::new();
    alice_mgr
        .send_message(
            &group_id,
            "m1",
            &mut |target, rumor| {
                net.pairwise.lock().unwrap().push((target, rumor.clone()));
                Ok(())
            },
            &mut |outer| {
                net.outer.lock().unwrap().push(outer.clone());
                Ok(())
            },
            Some(1_700_000_000_000),
        )
        .unwrap();

    let outer = net.outer.lock().unwrap()[0].clone();
    assert!(bob_mgr.handle_outer_event(&outer).is_none());

    let mut fired = Vec::new();
    for (_target, rumor) in net.pairwise.lock().unwrap().iter() {
        fired.extend(bob_mgr.handle_incoming_session_event(rumor, alice.public_key()));
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].inner.content, "m1");
}

// S3: rotation — both chains independently decryptable, in arbitrary order.
#[test]
fn s3_rotation_keeps_both_chains_decryptable() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let data = group_data(&alice, &[&bob]);
    let group_id = data.id.clone();

    let mut alice_mgr = manager_for(&alice);
    let mut bob_mgr = manager_for(&bob);
    alice_mgr.upsert_group(data.clone()).unwrap();
    bob_mgr.upsert_group(data).unwrap();

    let net = Network::new();
    let collect_pairwise = |net: &Network, target: PublicKey, rumor: &UnsignedEvent| -> ndr_groups::Result<()> {
        net.pairwise.lock().unwrap().push((target, rumor.clone()));
        Ok(())
    };
    let collect_outer = |net: &Network, outer: &Event| -> ndr_groups::Result<()> {
        net.outer.lock().unwrap().push(outer.clone());
        Ok(())
    };

    alice_mgr
        .send_message(
            &group_id,
            "m1",
            &mut |target, rumor| collect_pairwise(&net, target, rumor),
            &mut |outer| collect_outer(&net, outer),
            Some(1_700_000_000_000),
        )
        .unwrap();

    alice_mgr
        .rotate_sender_key(
            &group_id,
            &mut |target, rumor| collect_pairwise(&net, target, rumor),
            Some(1_700_000_001_000),
        )
        .unwrap();

    alice_mgr
        .send_message(
            &group_id,
            "m2",
            &mut |target, rumor| collect_pairwise(&net, target, rumor),
            &mut |outer| collect_outer(&net, outer),
            Some(1_700_000_002_000),
        )
        .unwrap();

    // Deliver in arbitrary order: both outers first, then both distributions.
    let outers = net.outer.lock().unwrap().clone();
    let rumors = net.pairwise.lock().unwrap().clone();

    for outer in &outers {
        assert!(bob_mgr.handle_outer_event(outer).is_none());
    }

    let mut fired = Vec::new();
    for (_target, rumor) in &rumors {
        fired.extend(bob_mgr.handle_incoming_session_event(rumor, alice.public_key()));
    }

    let mut contents: Vec<&str> = fired.iter().map(|e| e.inner.content.as_str()).collect();
    contents.sort_unstable();
    assert_eq!(contents, vec!["m1", "m2"]);
}

// S4: manager's outer subscription filter tracks the union of known
// sender-event pubkeys across groups, shrinking when a group is removed.
#[test]
fn s4_multi_group_subscription_tracks_union() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let carol = Keys::generate();

    let data_x = group_data(&alice, &[&bob]);
    let data_y = group_data(&alice, &[&carol]);
    let id_x = data_x.id.clone();
    let id_y = data_y.id.clone();

    let mut mgr = manager_for(&alice);
    mgr.upsert_group(data_x).unwrap();
    mgr.upsert_group(data_y).unwrap();

    // Sender-event pubkeys are only minted lazily on first send, and each
    // group mints its own even for the same member pubkey.
    let net = Network::new();
    mgr.send_message(
        &id_x,
        "hi x",
        &mut |target, rumor| {
            net.pairwise.lock().unwrap().push((target, rumor.clone()));
            Ok(())
        },
        &mut |outer| {
            net.outer.lock().unwrap().push(outer.clone());
            Ok(())
        },
        Some(1_700_000_000_000),
    )
    .unwrap();
    mgr.send_message(
        &id_y,
        "hi y",
        &mut |target, rumor| {
            net.pairwise.lock().unwrap().push((target, rumor.clone()));
            Ok(())
        },
        &mut |outer| {
            net.outer.lock().unwrap().push(outer.clone());
            Ok(())
        },
        Some(1_700_000_000_000),
    )
    .unwrap();

    let known = mgr.known_sender_event_pubkeys();
    assert_eq!(known.len(), 2);

    mgr.remove_group(&id_y);
    let known_after = mgr.known_sender_event_pubkeys();
    assert_eq!(known_after.len(), 1);
    assert!(known.contains(&known_after[0]));
}

// Invariant 7: installing the same distribution twice (no intervening
// decrypts) leaves the receiver state equal to a single install.
#[test]
fn distribution_install_is_idempotent_without_intervening_decrypts() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let data = group_data(&alice, &[&bob]);
    let group_id = data.id.clone();

    let mut alice_mgr = manager_for(&alice);
    let mut bob_mgr = manager_for(&bob);
    alice_mgr.upsert_group(data.clone()).unwrap();
    bob_mgr.upsert_group(data).unwrap();

    let net = Network::new();
    alice_mgr
        .send_message(
            &group_id,
            "hello",
            &mut |target, rumor| {
                net.pairwise.lock().unwrap().push((target, rumor.clone()));
                Ok(())
            },
            &mut |outer| {
                net.outer.lock().unwrap().push(outer.clone());
                Ok(())
            },
            Some(1_700_000_000_000),
        )
        .unwrap();

    let rumor = net.pairwise.lock().unwrap()[0].1.clone();
    let first = bob_mgr.handle_incoming_session_event(&rumor, alice.public_key());
    let second = bob_mgr.handle_incoming_session_event(&rumor, alice.public_key());

    // Neither install decrypts anything by itself (no outer delivered yet);
    // what matters is that re-installing doesn't error or diverge.
    assert!(first.is_empty());
    assert!(second.is_empty());

    let outer = net.outer.lock().unwrap()[0].clone();
    let decrypted = bob_mgr.handle_outer_event(&outer);
    assert_eq!(decrypted.unwrap().inner.content, "hello");
}

// Invariant 10: a failing operation on one group reports through on_error
// without leaving the manager unable to serve a subsequent, valid one.
#[test]
fn manager_error_isolation_across_operations() {
    let alice = Keys::generate();
    let bob = Keys::generate();
    let data = group_data(&alice, &[&bob]);
    let group_id = data.id.clone();

    let reported: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let reported_clone = reported.clone();

    let mut alice_mgr = GroupManager::new(GroupManagerOptions {
        our_pubkey: alice.public_key(),
        on_error: Some(Arc::new(move |_ctx, err: Error| {
            reported_clone.lock().unwrap().push(err.to_string());
        })),
        ..Default::default()
    });
    alice_mgr.upsert_group(data).unwrap();

    // First send targets a group the manager has never heard of.
    let failing = alice_mgr.send_message(
        "nonexistent-group",
        "oops",
        &mut |_, _| Ok(()),
        &mut |_| Ok(()),
        None,
    );
    assert!(failing.is_err());
    assert_eq!(reported.lock().unwrap().len(), 1);

    // The manager still serves the real group normally afterward.
    let net = Network::new();
    let result = alice_mgr.send_message(
        &group_id,
        "still works",
        &mut |target, rumor| {
            net.pairwise.lock().unwrap().push((target, rumor.clone()));
            Ok(())
        },
        &mut |outer| {
            net.outer.lock().unwrap().push(outer.clone());
            Ok(())
        },
        Some(1_700_000_000_000),
    );
    assert!(result.is_ok());
    assert!(!net.outer.lock().unwrap().is_empty());
    // No new error recorded for the successful send; the earlier failure
    // didn't leave any lingering state behind.
    assert_eq!(reported.lock().unwrap().len(), 1);
}
