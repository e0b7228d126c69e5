use chrono::{TimeZone, Utc};
use whatsapp_store::store::*;
use whatsapp_store::wacore::types::{
    ContactEntry, Jid, MessageSecretInsert, PrivacyToken, SignalAddress,
};

fn ids(keys: &[whatsapp_store::wacore::crypto::PreKey]) -> Vec<u32> {
    keys.iter().map(|k| k.key_id).collect()
}

#[tokio::test]
async fn test_identity_trust_on_first_use() {
    let store = MemoryStore::new();
    let address = "5511999887766:1@c.us.0";

    assert!(store.is_trusted_identity(address, &[1; 32]).await.unwrap());

    store.put_identity(address, [1; 32]).await.unwrap();
    assert!(store.is_trusted_identity(address, &[1; 32]).await.unwrap());
    assert!(
        !store.is_trusted_identity(address, &[2; 32]).await.unwrap(),
        "A different key for a known address must not be trusted"
    );

    // Overwriting is an explicit re-trust.
    store.put_identity(address, [2; 32]).await.unwrap();
    assert!(store.is_trusted_identity(address, &[2; 32]).await.unwrap());

    store.delete_identity(address).await.unwrap();
    store.delete_identity(address).await.unwrap();
    assert!(store.is_trusted_identity(address, &[9; 32]).await.unwrap());
}

#[tokio::test]
async fn test_delete_all_identities_for_phone() {
    let store = MemoryStore::new();
    store.put_identity("111@c.us.0", [1; 32]).await.unwrap();
    store.put_identity("111:7@c.us.0", [2; 32]).await.unwrap();
    store.put_identity("222@c.us.0", [3; 32]).await.unwrap();

    store.delete_all_identities("111").await.unwrap();

    assert!(store.is_trusted_identity("111:7@c.us.0", &[9; 32]).await.unwrap());
    assert!(!store.is_trusted_identity("222@c.us.0", &[9; 32]).await.unwrap());
}

#[tokio::test]
async fn test_session_existence() {
    let store = MemoryStore::new();
    let address = "100000000000001:3@lid.0";

    assert!(!store.has_session(address).await.unwrap());
    assert_eq!(store.get_session(address).await.unwrap(), None);

    store.put_session(address, b"").await.unwrap();
    assert!(store.has_session(address).await.unwrap());
    assert_eq!(store.get_session(address).await.unwrap(), Some(Vec::new()));

    store.delete_session(address).await.unwrap();
    assert!(!store.has_session(address).await.unwrap());
    store
        .delete_session(address)
        .await
        .expect("deleting twice should not fail");
}

#[tokio::test]
async fn test_get_or_gen_pre_keys_reuses_unuploaded() {
    let store = MemoryStore::new();

    let first = store.get_or_gen_pre_keys(5).await.unwrap();
    assert_eq!(ids(&first), vec![1, 2, 3, 4, 5]);

    store.mark_pre_keys_as_uploaded(2).await.unwrap();
    let second = store.get_or_gen_pre_keys(5).await.unwrap();
    assert_eq!(ids(&second), vec![3, 4, 5, 6, 7]);
    assert_eq!(second[0], first[2]);

    let fetched = store.get_pre_key(4).await.unwrap();
    assert_eq!(fetched.key_pair, first[3].key_pair);
}

#[tokio::test]
async fn test_uploaded_count_follows_watermark() {
    let store = MemoryStore::new();
    store.get_or_gen_pre_keys(12).await.unwrap();
    store.remove_pre_key(4).await.unwrap();
    store.remove_pre_key(11).await.unwrap();

    store.mark_pre_keys_as_uploaded(10).await.unwrap();
    assert_eq!(store.uploaded_pre_key_count().await.unwrap(), 9);

    store.remove_pre_key(4).await.expect("removal is idempotent");
    let err = store.get_pre_key(4).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_sender_key_lookup() {
    let store = MemoryStore::new();
    let group = "120363021033254949@g.us";
    let sender = "5511999887766:2@c.us.0";

    assert_eq!(store.get_sender_key(group, sender).await.unwrap(), None);
    store.put_sender_key(group, sender, b"key").await.unwrap();
    assert_eq!(
        store.get_sender_key(group, sender).await.unwrap(),
        Some(b"key".to_vec())
    );
}

#[tokio::test]
async fn test_app_state_version_round_trip() {
    let store = MemoryStore::new();
    let hash = [0xAB; 128];

    store
        .put_app_state_version("critical_unblock_low", 7, hash)
        .await
        .unwrap();
    let state = store
        .get_app_state_version("critical_unblock_low")
        .await
        .unwrap();
    assert_eq!(state.version, 7);
    assert_eq!(state.hash, hash);

    let unseen = store.get_app_state_version("regular_low").await.unwrap();
    assert_eq!(unseen.version, 0);
    assert_eq!(unseen.hash, [0; 128]);
}

#[tokio::test]
async fn test_app_state_version_regression_is_stored() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryStore::new();
    store.put_app_state_version("regular", 9, [1; 128]).await.unwrap();
    store.put_app_state_version("regular", 4, [2; 128]).await.unwrap();

    let state = store.get_app_state_version("regular").await.unwrap();
    assert_eq!(state.version, 4);
    assert_eq!(state.hash, [2; 128]);
}

#[tokio::test]
async fn test_mutation_macs_span_versions() {
    let store = MemoryStore::new();
    let name = "critical_block";
    let mac = |i: u8, v: u8| AppStateMutationMAC {
        index_mac: vec![i],
        value_mac: vec![v],
    };

    store
        .put_app_state_mutation_macs(name, 1, &[mac(1, 10)])
        .await
        .unwrap();
    store
        .put_app_state_mutation_macs(name, 2, &[mac(2, 20)])
        .await
        .unwrap();
    assert_eq!(
        store.get_app_state_mutation_mac(name, &[1]).await.unwrap(),
        Some(vec![10])
    );
    assert_eq!(
        store.get_app_state_mutation_mac(name, &[2]).await.unwrap(),
        Some(vec![20])
    );

    store
        .delete_app_state_mutation_macs(name, &[vec![1], vec![99]])
        .await
        .unwrap();
    assert_eq!(store.get_app_state_mutation_mac(name, &[1]).await.unwrap(), None);
    assert_eq!(
        store.get_app_state_mutation_mac(name, &[2]).await.unwrap(),
        Some(vec![20])
    );
    assert_eq!(
        store.get_app_state_mutation_mac("regular", &[2]).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_lid_mapping_is_symmetric() {
    let store = MemoryLidStore::new();
    let lid = Jid::lid("100000000000001");
    let pn = Jid::pn("5511999887766");

    store.put_lid_mapping(&lid, &pn).await.unwrap();
    assert_eq!(store.get_pn_for_lid(&lid).await.unwrap(), Some(pn.clone()));
    assert_eq!(store.get_lid_for_pn(&pn).await.unwrap(), Some(lid));

    assert_eq!(store.get_pn_for_lid(&Jid::lid("42")).await.unwrap(), None);
    assert_eq!(store.get_lid_for_pn(&Jid::pn("42")).await.unwrap(), None);
}

#[tokio::test]
async fn test_lid_mapping_rejects_wrong_servers() {
    let store = MemoryLidStore::new();
    let err = store
        .put_lid_mapping(&Jid::pn("1"), &Jid::pn("2"))
        .await
        .unwrap_err();
    assert!(err.is_invariant_violation());

    let err = store
        .put_lid_mapping(&Jid::lid("1"), &Jid::new("2", "g.us"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_migrate_pn_to_lid() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryStore::new();
    let pn = Jid::pn("5511999887766");
    let lid = Jid::lid("100000000000001");
    let pn_primary = SignalAddress::from_jid(&pn).to_string();
    let pn_companion = SignalAddress::from_jid(&pn.clone().with_device(5)).to_string();
    let lid_companion = SignalAddress::from_jid(&lid.clone().with_device(5)).to_string();

    store.put_session(&pn_primary, b"primary").await.unwrap();
    store.put_session(&pn_companion, b"companion").await.unwrap();
    store.put_session(&lid_companion, b"stale").await.unwrap();
    store.put_identity(&pn_companion, [5; 32]).await.unwrap();
    store.put_sender_key("g@g.us", &pn_primary, b"sk").await.unwrap();
    store.put_session("999@c.us.0", b"other").await.unwrap();

    store.migrate_pn_to_lid(&pn, &lid).await.unwrap();

    assert!(!store.has_session(&pn_primary).await.unwrap());
    assert!(!store.has_session(&pn_companion).await.unwrap());
    assert_eq!(
        store.get_session("100000000000001@lid.0").await.unwrap(),
        Some(b"primary".to_vec())
    );
    assert_eq!(
        store.get_session(&lid_companion).await.unwrap(),
        Some(b"companion".to_vec())
    );
    assert!(!store.is_trusted_identity(&lid_companion, &[6; 32]).await.unwrap());
    assert_eq!(store.get_sender_key("g@g.us", &pn_primary).await.unwrap(), None);
    assert_eq!(
        store
            .get_sender_key("g@g.us", "100000000000001@lid.0")
            .await
            .unwrap(),
        Some(b"sk".to_vec())
    );
    assert!(store.has_session("999@c.us.0").await.unwrap());

    // Nothing left under the phone number: a second run changes nothing.
    store.migrate_pn_to_lid(&pn, &lid).await.unwrap();
    assert_eq!(
        store.get_session(&lid_companion).await.unwrap(),
        Some(b"companion".to_vec())
    );
}

#[tokio::test]
async fn test_contact_names() {
    let store = MemoryStore::new();
    let user = Jid::pn("5511999887766");

    assert_eq!(store.get_contact(&user).await.unwrap(), None);

    let (changed, previous) = store.put_push_name(&user, "Ana").await.unwrap();
    assert!(changed);
    assert_eq!(previous, "");
    let (changed, previous) = store.put_push_name(&user, "Ana").await.unwrap();
    assert!(!changed);
    assert_eq!(previous, "Ana");
    let (changed, previous) = store
        .put_push_name(&user.clone().with_device(3), "Ana B")
        .await
        .unwrap();
    assert!(changed, "device JIDs share the account's contact entry");
    assert_eq!(previous, "Ana");

    store.put_business_name(&user, "Ana's Bakery").await.unwrap();
    store
        .put_all_contact_names(&[
            ContactEntry {
                jid: user.clone(),
                first_name: "Ana".into(),
                full_name: "Ana Souza".into(),
            },
            ContactEntry {
                jid: Jid::pn("5511000000000"),
                first_name: "Bo".into(),
                full_name: "Bo Lima".into(),
            },
        ])
        .await
        .unwrap();

    let contact = store.get_contact(&user).await.unwrap().unwrap();
    assert_eq!(contact.push_name, "Ana B");
    assert_eq!(contact.business_name, "Ana's Bakery");
    assert_eq!(contact.full_name, "Ana Souza");
    assert_eq!(store.get_all_contacts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_settings_fields_are_independent() {
    let store = MemoryStore::new();
    let chat = Jid::new("120363021033254949", "g.us");
    let until = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    assert_eq!(store.get_chat_settings(&chat).await.unwrap(), None);

    store.put_muted_until(&chat, Some(until)).await.unwrap();
    store.put_pinned(&chat, true).await.unwrap();
    store.put_archived(&chat, true).await.unwrap();
    store.put_pinned(&chat, false).await.unwrap();

    let settings = store.get_chat_settings(&chat).await.unwrap().unwrap();
    assert_eq!(settings.muted_until, Some(until));
    assert!(!settings.pinned);
    assert!(settings.archived);
    assert!(settings.is_muted_at(Utc.with_ymd_and_hms(2029, 6, 1, 0, 0, 0).unwrap()));
    assert!(!settings.is_muted_at(Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap()));
}

#[tokio::test]
async fn test_message_secret_first_write_wins() {
    let store = MemoryStore::new();
    let chat = Jid::new("120363021033254949", "g.us");
    let sender = Jid::pn("5511999887766");

    store
        .put_message_secret(&chat, &sender.clone().with_device(2), "3EB0ABC", b"first")
        .await
        .unwrap();
    store
        .put_message_secrets(&[
            MessageSecretInsert {
                chat: chat.clone(),
                sender: sender.clone(),
                id: "3EB0ABC".into(),
                secret: b"second".to_vec(),
            },
            MessageSecretInsert {
                chat: chat.clone(),
                sender: sender.clone(),
                id: "3EB0DEF".into(),
                secret: b"other".to_vec(),
            },
        ])
        .await
        .unwrap();

    assert_eq!(
        store
            .get_message_secret(&chat, &sender, "3EB0ABC")
            .await
            .unwrap(),
        Some(b"first".to_vec())
    );
    assert_eq!(
        store
            .get_message_secret(&chat, &sender, "3EB0DEF")
            .await
            .unwrap(),
        Some(b"other".to_vec())
    );
    assert_eq!(
        store
            .get_message_secret(&chat, &sender, "missing")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_privacy_token_overwrites() {
    let store = MemoryStore::new();
    let user = Jid::pn("5511999887766");
    let token = |bytes: &[u8], secs| PrivacyToken {
        user: user.clone(),
        token: bytes.to_vec(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
    };

    store.put_privacy_tokens(&[token(b"old", 100)]).await.unwrap();
    store.put_privacy_tokens(&[token(b"new", 200)]).await.unwrap();

    let stored = store.get_privacy_token(&user).await.unwrap().unwrap();
    assert_eq!(stored.token, b"new");
    assert_eq!(
        store.get_privacy_token(&Jid::pn("1")).await.unwrap(),
        None
    );
}
