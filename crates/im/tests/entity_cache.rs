//! Read paths through the entity cache: single-flight under load, the
//! membership fingerprint, paging and per-namespace refresh after writes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use pigeon_cache::{CacheStore, loader};
use pigeon_im::{
    DISMISSED_FINGERPRINT, Group, GroupMember, GroupType, ImError, User, cache::keys,
    member_list_hash, testutil::Stack,
};
use pigeon_storage::assert_not_found;
use tokio::task::JoinSet;

const CONCURRENCY: usize = 24;

fn user(id: &str) -> User {
    User { user_id: id.to_owned(), nickname: format!("nick-{id}"), ..User::default() }
}

fn group(id: &str, group_type: GroupType) -> Group {
    Group {
        group_id: id.to_owned(),
        group_name: format!("group {id}"),
        owner_user_id: "u1".to_owned(),
        group_type,
        ..Group::default()
    }
}

fn member(user_id: &str) -> GroupMember {
    GroupMember { user_id: user_id.to_owned(), nickname: user_id.to_uppercase(), ..GroupMember::default() }
}

async fn normal_group(stack: &Stack, id: &str, members: &[&str]) {
    stack
        .groups
        .create_group(
            &stack.ctx(),
            &group(id, GroupType::Normal),
            members.iter().map(|m| member(m)).collect(),
        )
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_run_one_loader() {
    let stack = Arc::new(Stack::new());
    stack.users.create_users(&stack.ctx(), vec![user("u1")]).await.unwrap();

    let mut set = JoinSet::new();
    for i in 0..CONCURRENCY {
        let stack = Arc::clone(&stack);
        set.spawn(async move {
            let ctx = pigeon_storage::RequestContext::new(format!("reader-{i}"));
            stack.cache.get_user_info(&ctx, "u1").await
        });
    }
    while let Some(result) = set.join_next().await {
        assert_eq!(result.expect("task should not panic").unwrap().nickname, "nick-u1");
    }

    assert_eq!(stack.recording.load_count(&keys::user_info("u1")), 1);
}

#[tokio::test]
async fn missing_rows_are_never_cached() {
    let stack = Stack::new();
    let ctx = stack.ctx();

    let err = stack.cache.get_user_info(&ctx, "u1").await.unwrap_err();
    assert!(matches!(err, ImError::NotFound { entity: "user", ref id } if id == "u1"));

    stack.users.create_users(&ctx, vec![user("u1")]).await.unwrap();
    assert_eq!(stack.cache.get_user_info(&ctx, "u1").await.unwrap().user_id, "u1");
    assert_eq!(stack.recording.load_count(&keys::user_info("u1")), 2);
}

#[tokio::test]
async fn user_maps_skip_unknown_ids_unless_complete() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack.users.create_users(&ctx, vec![user("u1"), user("u2")]).await.unwrap();
    let wanted = vec!["u1".to_owned(), "u2".to_owned(), "u9".to_owned()];

    let partial = stack.cache.get_users_info_map(&ctx, &wanted, false).await.unwrap();
    assert_eq!(partial.len(), 2);
    assert!(stack.cache.get_users_info_map(&ctx, &wanted, true).await.unwrap_err().is_not_found());
    assert!(stack.cache.get_users_info(&ctx, &wanted).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn profile_update_is_visible_after_commit() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack.users.create_users(&ctx, vec![user("u1")]).await.unwrap();
    let created = stack.users.get_user(&ctx, "u1").await.unwrap();

    let renamed = User { nickname: "renamed".to_owned(), ..created.clone() };
    stack.users.update_user(&ctx, &renamed).await.unwrap();

    let read = stack.users.get_user(&ctx, "u1").await.unwrap();
    assert_eq!(read.nickname, "renamed");
    assert_eq!(read.create_time, created.create_time);
    assert!(stack.users.update_user(&ctx, &user("u9")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn group_member_page_is_populated() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    normal_group(&stack, "g1", &["u1", "u2", "u3", "u4", "u5"]).await;

    let all = stack.cache.get_group_members_info(&ctx, "g1", 0, 0).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|m| m.group_id == "g1" && !m.nickname.is_empty()));

    let page = stack.cache.get_group_members_info(&ctx, "g1", 3, 10).await.unwrap();
    let ids: Vec<&str> = page.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, ["u4", "u5"]);

    assert!(stack.cache.get_group_members_info(&ctx, "g1", 10, 1).await.unwrap().is_empty());
    assert!(stack.cache.get_group_members_info(&ctx, "g1", -1, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn member_page_skips_members_that_fail_to_load() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    normal_group(&stack, "g1", &["u1", "u2", "u3"]).await;
    stack.cache.get_group_member_id_list(&ctx, "g1").await.unwrap();

    // Drop a member row without invalidating; the cached ID list still names it.
    let groups = stack.repos.groups.clone();
    stack
        .tx
        .transaction(&ctx, move |tx| {
            Box::pin(async move {
                groups.new_tx(tx).remove_members("g1", &["u2".to_owned()]);
                Ok::<_, ImError>(())
            })
        })
        .await
        .unwrap();

    let page = stack.cache.get_group_members_info(&ctx, "g1", 0, 0).await.unwrap();
    let ids: Vec<&str> = page.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, ["u1", "u3"]);
}

#[tokio::test]
async fn fingerprint_follows_membership() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    normal_group(&stack, "g1", &["u2", "u1"]).await;

    let before = stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap();
    assert_eq!(before, member_list_hash(&["u1", "u2"]));
    assert_eq!(stack.cache.get_group_member_num(&ctx, "g1").await.unwrap(), 2);

    stack.groups.add_group_members(&ctx, "g1", vec![member("u3")]).await.unwrap();

    let after = stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap();
    assert_ne!(before, after);
    assert_eq!(after, member_list_hash(&["u3", "u2", "u1"]));
    assert_eq!(stack.cache.get_group_member_num(&ctx, "g1").await.unwrap(), 3);
    assert_eq!(stack.cache.get_joined_group_id_list(&ctx, "u3").await.unwrap(), ["g1"]);

    stack.groups.dismiss_group(&ctx, "g1").await.unwrap();
    assert_eq!(stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap(), DISMISSED_FINGERPRINT);
}

#[tokio::test]
async fn fingerprint_ignores_a_stale_member_list_under_recompute() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    normal_group(&stack, "g1", &["u1", "u2"]).await;
    stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap();
    stack.cache.get_group_member_id_list(&ctx, "g1").await.unwrap();

    stack.groups.add_group_members(&ctx, "g1", vec![member("u3")]).await.unwrap();

    // Another reader holds the member-list recompute, so the tagged list is
    // still served stale while it runs.
    let fetch_cache = stack.fetch_cache.clone();
    let slow_reload = tokio::spawn(async move {
        let ctx = pigeon_storage::RequestContext::new("slow-reader");
        fetch_cache
            .fetch(
                &ctx,
                &keys::group_member_id_list("g1"),
                Duration::from_secs(60),
                loader(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(r#"["u1","u2","u3"]"#.to_owned())
                }),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let expected = member_list_hash(&["u1", "u2", "u3"]);
    assert_eq!(stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap(), expected);
    assert_eq!(stack.cache.get_group_member_num(&ctx, "g1").await.unwrap(), 3);

    slow_reload.await.unwrap().unwrap();
    assert_eq!(stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap(), expected);
}

#[tokio::test]
async fn group_write_guards() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    normal_group(&stack, "g1", &["u1"]).await;

    assert!(matches!(
        stack.groups.add_group_members(&ctx, "g1", vec![member("u1")]).await,
        Err(ImError::RelationshipExists)
    ));
    assert!(stack.groups.add_group_members(&ctx, "g9", vec![member("u2")]).await.unwrap_err().is_not_found());

    stack.groups.dismiss_group(&ctx, "g1").await.unwrap();
    assert!(matches!(
        stack.groups.add_group_members(&ctx, "g1", vec![member("u2")]).await,
        Err(ImError::Validation(_))
    ));
    assert_not_found!(stack.repos.groups.take_member("g1", "u2").await);
}

#[tokio::test]
async fn super_group_members_come_from_the_document() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack
        .groups
        .create_group(&ctx, &group("g2", GroupType::Super), vec![member("u1"), member("u2")])
        .await
        .unwrap();

    assert_eq!(stack.cache.get_group_member_id_list(&ctx, "g2").await.unwrap(), ["u1", "u2"]);
    assert_eq!(stack.cache.get_joined_super_group_id_list(&ctx, "u1").await.unwrap(), ["g2"]);
    assert!(stack.repos.groups.member_ids("g2").await.unwrap().is_empty());

    stack.groups.create_super_group(&ctx, "g2", &["u2".to_owned(), "u3".to_owned()]).await.unwrap();

    assert_eq!(stack.cache.get_group_member_id_list(&ctx, "g2").await.unwrap(), ["u2", "u3"]);
    assert!(stack.cache.get_joined_super_group_id_list(&ctx, "u1").await.unwrap().is_empty());
    assert_eq!(stack.cache.get_joined_super_group_id_list(&ctx, "u3").await.unwrap(), ["g2"]);
    assert_eq!(stack.cache.get_group_member_num(&ctx, "g2").await.unwrap(), 2);
}

#[tokio::test]
async fn extend_msg_upsert_refreshes_the_cache() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    let mut msg = pigeon_im::ExtendMsg { client_msg_id: "m1".to_owned(), ..Default::default() };
    msg.reactions.insert("like".to_owned(), "u1".to_owned());
    stack.extend_msgs.set_extend_msg(&ctx, &msg).await.unwrap();
    assert_eq!(stack.extend_msgs.get_extend_msg(&ctx, "m1").await.unwrap().reactions.len(), 1);

    msg.reactions.insert("laugh".to_owned(), "u2".to_owned());
    stack.extend_msgs.set_extend_msg(&ctx, &msg).await.unwrap();
    assert_eq!(stack.extend_msgs.get_extend_msg(&ctx, "m1").await.unwrap().reactions.len(), 2);
}

#[tokio::test]
async fn clear_all_empties_every_namespace() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack.users.create_users(&ctx, vec![user("u1")]).await.unwrap();
    normal_group(&stack, "g1", &["u1"]).await;
    stack.cache.get_user_info(&ctx, "u1").await.unwrap();
    stack.cache.get_group_member_list_hash(&ctx, "g1").await.unwrap();

    let report = stack.cache.clear_all().await;
    assert!(report.is_complete());
    assert!(report.deleted >= 4, "deleted {}", report.deleted);

    for prefix in keys::ALL_PREFIXES {
        assert!(stack.recording.scan_prefix(&keys::scan_prefix(prefix)).await.unwrap().is_empty());
    }
}
