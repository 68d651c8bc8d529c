//! Metadata index behavior against every key-value backend.

mod common;

use common::{TEST_RETENTION, image_record, run_index_test_both, run_kv_test_both};
use ibed_core::{Fingerprint, UserId};
use ibed_metadata::{
    ImageRepo, KvOp, MetadataError, MetadataIndex, MetadataStore, UserRepo, keys,
};
use std::collections::BTreeSet;
use time::{Duration, OffsetDateTime};

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_save_and_get_image() {
    run_index_test_both(|index| async move {
        let owner = UserId::new();
        let mut record = image_record(b"cat picture", owner, &["cat", "cute"]);
        record.description = "a cat".to_string();

        index.save_image(&record).await.unwrap();

        let loaded = index.get_image(&record.id).await.unwrap();
        assert_eq!(loaded.tags, set(&["cat", "cute"]));
        assert_eq!(loaded.owner_id, owner);
        assert_eq!(loaded.description, "a cat");
        assert_eq!(loaded.view_count, 0);
        assert!(!loaded.is_private);
        assert!(index.image_exists(&record.id).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn test_get_missing_image_is_not_found() {
    run_index_test_both(|index| async move {
        let id = Fingerprint::compute(b"never saved");
        match index.get_image(&id).await {
            Err(MetadataError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!index.image_exists(&id).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn test_record_and_indexes_share_one_expiry() {
    run_index_test_both(|index| async move {
        let owner = UserId::new();
        let record = image_record(b"expiring", owner, &["Cat"]);
        index.save_image(&record).await.unwrap();

        let kv = index.kv();
        let expected = (record.created_at + TEST_RETENTION).unix_timestamp();
        for key in [
            keys::image(&record.id),
            keys::image_tags(&record.id),
            keys::owner_images(&owner),
            keys::tag_index("cat"),
        ] {
            let at = kv
                .expire_time(&key)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("{key} has no expiry"));
            assert_eq!(at.unix_timestamp(), expected, "expiry mismatch for {key}");
        }
    })
    .await;
}

#[tokio::test]
async fn test_resaving_older_record_never_shortens_shared_indexes() {
    run_index_test_both(|index| async move {
        let owner = UserId::new();
        let mut older = image_record(b"older", owner, &["cat"]);
        older.created_at = OffsetDateTime::now_utc() - Duration::days(10);
        let newer = image_record(b"newer", owner, &["cat"]);

        index.save_image(&older).await.unwrap();
        index.save_image(&newer).await.unwrap();
        index.save_image(&older).await.unwrap();

        let kv = index.kv();
        let newer_horizon = (newer.created_at + TEST_RETENTION).unix_timestamp();
        for key in [
            keys::image(&newer.id),
            keys::image_tags(&newer.id),
            keys::owner_images(&owner),
            keys::tag_index("cat"),
        ] {
            let at = kv.expire_time(&key).await.unwrap().unwrap();
            assert_eq!(at.unix_timestamp(), newer_horizon, "expiry moved for {key}");
        }

        // The older record keeps its own horizon
        let older_at = kv.expire_time(&keys::image(&older.id)).await.unwrap().unwrap();
        assert_eq!(
            older_at.unix_timestamp(),
            (older.created_at + TEST_RETENTION).unix_timestamp()
        );
    })
    .await;
}

#[tokio::test]
async fn test_expired_record_rejected_without_touching_indexes() {
    run_index_test_both(|index| async move {
        let owner = UserId::new();
        let fresh = image_record(b"fresh", owner, &["cat"]);
        index.save_image(&fresh).await.unwrap();

        let mut stale = image_record(b"stale", owner, &["cat"]);
        stale.created_at = OffsetDateTime::now_utc() - TEST_RETENTION - Duration::days(1);
        match index.save_image(&stale).await {
            Err(MetadataError::Invalid(_)) => {}
            other => panic!("expected Invalid, got {other:?}"),
        }

        assert_eq!(index.owner_image_ids(&owner).await.unwrap(), vec![fresh.id]);
        assert_eq!(index.tag_image_ids("cat").await.unwrap(), vec![fresh.id]);
        assert!(!index.image_exists(&stale.id).await.unwrap());
        assert!(index.image_exists(&fresh.id).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn test_unrepresentable_expiry_is_invalid() {
    run_index_test_both(|index| async move {
        let huge = MetadataIndex::new(index.kv(), Duration::seconds(1_000_000_000_000));
        let record = image_record(b"forever", UserId::new(), &[]);
        match huge.save_image(&record).await {
            Err(MetadataError::Invalid(_)) => {}
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert!(!huge.image_exists(&record.id).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn test_tag_set_is_authoritative_on_read() {
    run_index_test_both(|index| async move {
        let record = image_record(b"tagged", UserId::new(), &["cat"]);
        index.save_image(&record).await.unwrap();

        index
            .kv()
            .atomic(vec![KvOp::SetAdd {
                key: keys::image_tags(&record.id),
                members: vec!["added-later".to_string()],
            }])
            .await
            .unwrap();

        let loaded = index.get_image(&record.id).await.unwrap();
        assert_eq!(loaded.tags, set(&["added-later", "cat"]));
    })
    .await;
}

#[tokio::test]
async fn test_resave_replaces_tag_set() {
    run_index_test_both(|index| async move {
        let mut record = image_record(b"retagged", UserId::new(), &["a", "b", "c"]);
        index.save_image(&record).await.unwrap();
        index.save_image(&record).await.unwrap();
        assert_eq!(index.image_tags(&record.id).await.unwrap(), set(&["a", "b", "c"]));

        record.tags = set(&["b"]);
        index.save_image(&record).await.unwrap();
        assert_eq!(index.image_tags(&record.id).await.unwrap(), set(&["b"]));
        // The old tag's index entry stays but no longer resolves
        assert_eq!(index.tag_image_ids("a").await.unwrap(), vec![record.id]);
        assert!(index.images_with_tag("a").await.unwrap().is_empty());
        assert_eq!(index.images_with_tag("B").await.unwrap().len(), 1);

        record.tags.clear();
        index.save_image(&record).await.unwrap();
        assert!(index.get_image(&record.id).await.unwrap().tags.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_delete_leaves_indexes_behind() {
    run_index_test_both(|index| async move {
        let owner = UserId::new();
        let record = image_record(b"doomed", owner, &["cat"]);
        index.save_image(&record).await.unwrap();

        index.delete_image(&record.id).await.unwrap();
        assert!(matches!(
            index.get_image(&record.id).await,
            Err(MetadataError::NotFound(_))
        ));

        // Non-cascading: index entries remain and readers skip them
        assert_eq!(index.owner_image_ids(&owner).await.unwrap(), vec![record.id]);
        assert_eq!(index.tag_image_ids("cat").await.unwrap(), vec![record.id]);
        assert!(index.owner_images(&owner).await.unwrap().is_empty());
        assert!(index.images_with_tag("cat").await.unwrap().is_empty());

        // Deleting again is not an error
        index.delete_image(&record.id).await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_owner_and_tag_lookups() {
    run_index_test_both(|index| async move {
        let alice = UserId::new();
        let bob = UserId::new();
        let a1 = image_record(b"a1", alice, &["Cat", "outdoor"]);
        let a2 = image_record(b"a2", alice, &["dog"]);
        let b1 = image_record(b"b1", bob, &["cat"]);
        for record in [&a1, &a2, &b1] {
            index.save_image(record).await.unwrap();
        }

        let mut owned: Vec<_> = index
            .owner_images(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        owned.sort();
        let mut expected = vec![a1.id, a2.id];
        expected.sort();
        assert_eq!(owned, expected);

        let mut cats: Vec<_> = index
            .images_with_tag("CAT")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        cats.sort();
        let mut expected = vec![a1.id, b1.id];
        expected.sort();
        assert_eq!(cats, expected);

        assert!(index.images_with_tag("bird").await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_list_image_ids() {
    run_index_test_both(|index| async move {
        assert!(index.list_image_ids().await.unwrap().is_empty());

        let owner = UserId::new();
        let first = image_record(b"first", owner, &["x"]);
        let second = image_record(b"second", owner, &[]);
        index.save_image(&first).await.unwrap();
        index.save_image(&second).await.unwrap();

        let ids: BTreeSet<_> = index.list_image_ids().await.unwrap().into_iter().collect();
        assert_eq!(ids, BTreeSet::from([first.id, second.id]));
    })
    .await;
}

#[tokio::test]
async fn test_create_user_and_lookup() {
    run_index_test_both(|index| async move {
        let user = index.create_user("alice", "hash-1").await.unwrap();
        assert!(!user.is_admin);

        assert_eq!(index.get_user(&user.id).await.unwrap(), user);
        assert_eq!(index.get_user_by_username("alice").await.unwrap(), user);

        match index.create_user("alice", "hash-2").await {
            Err(MetadataError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert!(matches!(
            index.get_user_by_username("nobody").await,
            Err(MetadataError::NotFound(_))
        ));
    })
    .await;
}

#[tokio::test]
async fn test_only_first_admin_registration_is_admin() {
    run_index_test_both(|index| async move {
        let first = index.create_user("admin", "hash").await.unwrap();
        assert!(first.is_admin);

        index.delete_user(&first.id).await.unwrap();
        let second = index.create_user("admin", "hash").await.unwrap();
        assert!(!second.is_admin);
    })
    .await;
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    run_index_test_both(|index| async move {
        assert!(matches!(
            index.create_user("", "hash").await,
            Err(MetadataError::Invalid(_))
        ));
        assert!(matches!(
            index.create_user("has space", "hash").await,
            Err(MetadataError::Invalid(_))
        ));
        assert!(index.list_user_ids().await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_rename_user() {
    run_index_test_both(|index| async move {
        let alice = index.create_user("alice", "hash").await.unwrap();
        let bob = index.create_user("bob", "hash").await.unwrap();

        match index.rename_user(&alice.id, "bob").await {
            Err(MetadataError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }

        let renamed = index.rename_user(&alice.id, "carol").await.unwrap();
        assert_eq!(renamed.id, alice.id);
        assert_eq!(renamed.username, "carol");
        assert_eq!(index.get_user_by_username("carol").await.unwrap().id, alice.id);
        assert!(matches!(
            index.get_user_by_username("alice").await,
            Err(MetadataError::NotFound(_))
        ));
        assert_eq!(index.get_user_by_username("bob").await.unwrap(), bob);

        // The freed name can be registered again
        index.create_user("alice", "hash").await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_change_password() {
    run_index_test_both(|index| async move {
        let user = index.create_user("dave", "old").await.unwrap();
        index.change_password(&user.id, "new").await.unwrap();
        assert_eq!(index.get_user(&user.id).await.unwrap().password_hash, "new");

        let missing = UserId::new();
        assert!(matches!(
            index.change_password(&missing, "x").await,
            Err(MetadataError::NotFound(_))
        ));
    })
    .await;
}

#[tokio::test]
async fn test_delete_and_list_users() {
    run_index_test_both(|index| async move {
        let erin = index.create_user("erin", "hash").await.unwrap();
        let frank = index.create_user("frank", "hash").await.unwrap();

        let ids: BTreeSet<_> = index.list_user_ids().await.unwrap().into_iter().collect();
        assert_eq!(ids, BTreeSet::from([erin.id, frank.id]));

        index.delete_user(&erin.id).await.unwrap();
        assert!(matches!(
            index.get_user(&erin.id).await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            index.get_user_by_username("erin").await,
            Err(MetadataError::NotFound(_))
        ));

        let users = index.list_users().await.unwrap();
        assert_eq!(users, vec![frank]);
        assert!(index.health_check().await.is_ok());
    })
    .await;
}

#[tokio::test]
async fn test_kv_sorted_set_and_scan() {
    run_kv_test_both(|kv| async move {
        assert_eq!(kv.sorted_incr("rank", "a", 1.0).await.unwrap(), 1.0);
        assert_eq!(kv.sorted_incr("rank", "a", 1.0).await.unwrap(), 2.0);
        kv.sorted_incr("rank", "b", 5.0).await.unwrap();

        let top = kv.sorted_top("rank", 10).await.unwrap();
        assert_eq!(top, vec![("b".to_string(), 5.0), ("a".to_string(), 2.0)]);
        assert_eq!(kv.sorted_score("rank", "a").await.unwrap(), Some(2.0));

        kv.set("scan:1", b"x").await.unwrap();
        kv.set("scan:2", b"y").await.unwrap();
        kv.set("other", b"z").await.unwrap();
        let found: BTreeSet<_> = kv.scan_keys("scan:*").await.unwrap().into_iter().collect();
        assert_eq!(found, set(&["scan:1", "scan:2"]));

        assert!(kv.set_if_absent("claim", b"1").await.unwrap());
        assert!(!kv.set_if_absent("claim", b"2").await.unwrap());
        assert_eq!(kv.get("claim").await.unwrap(), Some(b"1".to_vec()));
        assert!(kv.delete("claim").await.unwrap());
        assert!(!kv.delete("claim").await.unwrap());
    })
    .await;
}
