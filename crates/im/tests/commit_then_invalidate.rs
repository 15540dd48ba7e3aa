//! Ordering between the relational commit and cache invalidation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use pigeon_im::{
    Conversation, ImError, SessionType, User, cache::keys, ids::single_chat_id, testutil::Stack,
};
use pigeon_storage::{StorageError, assert_not_found};

fn single(owner: &str, peer: &str) -> Conversation {
    Conversation {
        owner_user_id: owner.to_owned(),
        conversation_id: single_chat_id(owner, peer),
        conversation_type: SessionType::Single,
        user_id: peer.to_owned(),
        ..Conversation::default()
    }
}

#[tokio::test]
async fn failed_invalidation_reports_a_committed_write() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    let cid = single_chat_id("u1", "u2");
    stack.failing.fail_tag(keys::conversation("u2", &cid));

    let mut mine = single("u1", "u2");
    mine.is_private_chat = true;
    let err = stack.conversations.sync_peer_user_private_conversation_tx(&ctx, &mine).await.unwrap_err();

    assert!(err.is_committed(), "got {err:?}");
    match &err {
        ImError::Invalidation { operation, keys: failed, source } => {
            assert_eq!(*operation, "sync_peer_user_private_conversation_tx");
            assert_eq!(failed, &vec![keys::conversation("u2", &cid)]);
            assert!(source.is_transient());
        },
        other => panic!("unexpected error {other:?}"),
    }

    // The rows are durable and every other key was still tagged.
    assert!(stack.repos.conversations.take("u1", &cid).await.unwrap().is_private_chat);
    assert!(stack.repos.conversations.take("u2", &cid).await.unwrap().is_private_chat);
    assert_eq!(stack.recording.tag_count(&keys::conversation("u1", &cid)), 1);
    assert_eq!(stack.recording.tag_count(&keys::conversation_id_list("u2")), 1);
}

#[tokio::test]
async fn store_outage_after_commit_keeps_every_write() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack.failing.fail_all_tags(true);

    let err = stack
        .users
        .create_users(&ctx, vec![User { user_id: "u1".to_owned(), ..User::default() }])
        .await
        .unwrap_err();
    assert!(matches!(err, ImError::Invalidation { ref keys, .. } if keys.len() == 1));
    assert!(stack.repos.users.take("u1").await.is_ok());

    stack.failing.heal();
    assert_eq!(stack.cache.get_user_info(&ctx, "u1").await.unwrap().user_id, "u1");
}

#[tokio::test]
async fn rejected_write_tags_nothing() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    stack
        .users
        .create_users(&ctx, vec![User { user_id: "u1".to_owned(), ..User::default() }])
        .await
        .unwrap();
    stack.recording.reset();

    let again = vec![
        User { user_id: "u2".to_owned(), ..User::default() },
        User { user_id: "u1".to_owned(), ..User::default() },
    ];
    assert!(matches!(stack.users.create_users(&ctx, again).await, Err(ImError::Validation(_))));

    assert_not_found!(stack.repos.users.take("u2").await);
    assert_eq!(stack.recording.total_tags(), 0);
}

#[tokio::test]
async fn cancelled_request_writes_nothing() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    ctx.cancel();

    let err = stack.conversations.create_conversations(&ctx, vec![single("u1", "u2")]).await.unwrap_err();
    assert!(matches!(err, ImError::Store { source: StorageError::Cancelled, .. }), "got {err:?}");

    assert!(stack.repos.conversations.find_all_conversation_ids("u1").await.unwrap().is_empty());
    assert_eq!(stack.recording.total_tags(), 0);
}

#[tokio::test]
async fn readers_never_see_pre_commit_state_after_the_write_returns() {
    let stack = Stack::new();
    let ctx = stack.ctx();
    let cid = single_chat_id("u1", "u2");
    stack.conversations.create_conversations(&ctx, vec![single("u1", "u2")]).await.unwrap();

    for round in 0..5 {
        let cached = stack.conversations.get_conversation(&ctx, "u1", &cid).await.unwrap();
        assert_eq!(cached.burn_duration, round * 10);

        let patch = pigeon_im::ConversationPatch::builder().burn_duration((round + 1) * 10).build();
        stack
            .conversations
            .update_users_conversation_field(&ctx, &["u1".to_owned()], &cid, &patch)
            .await
            .unwrap();
    }
    assert_eq!(stack.conversations.get_conversation(&ctx, "u1", &cid).await.unwrap().burn_duration, 50);
}
