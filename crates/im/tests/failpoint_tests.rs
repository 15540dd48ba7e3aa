#![allow(clippy::expect_used, clippy::unwrap_used)]
#![cfg(feature = "failpoints")]
//! Fail-point injection around the commit.
//!
//! ```bash
//! cargo test -p pigeon-im --features failpoints --test failpoint_tests
//! ```

use pigeon_im::{Conversation, SessionType, User, ids::single_chat_id, testutil::Stack};

#[tokio::test]
async fn failure_before_commit_leaves_no_rows_and_no_tags() {
    let scenario = fail::FailScenario::setup();
    let stack = Stack::new();
    let ctx = stack.ctx();
    fail::cfg("tx-before-commit", "return").expect("configure fail point");

    let mine = Conversation {
        owner_user_id: "u1".to_owned(),
        conversation_id: single_chat_id("u1", "u2"),
        conversation_type: SessionType::Single,
        user_id: "u2".to_owned(),
        is_private_chat: true,
        ..Conversation::default()
    };
    let err = stack.conversations.sync_peer_user_private_conversation_tx(&ctx, &mine).await.unwrap_err();
    assert!(!err.is_committed());

    assert!(stack.repos.conversations.find_all_conversation_ids("u1").await.unwrap().is_empty());
    assert!(stack.repos.conversations.find_all_conversation_ids("u2").await.unwrap().is_empty());
    assert_eq!(stack.recording.total_tags(), 0);

    fail::remove("tx-before-commit");
    stack.conversations.sync_peer_user_private_conversation_tx(&ctx, &mine).await.unwrap();
    assert_eq!(stack.recording.total_tags(), 4);

    scenario.teardown();
}

#[tokio::test]
async fn cache_tag_failure_surfaces_after_commit() {
    let scenario = fail::FailScenario::setup();
    let stack = Stack::new();
    let ctx = stack.ctx();
    fail::cfg("cache-tag-as-deleted", "return").expect("configure fail point");

    let err = stack
        .users
        .create_users(&ctx, vec![User { user_id: "u1".to_owned(), ..User::default() }])
        .await
        .unwrap_err();
    assert!(err.is_committed(), "got {err:?}");
    assert!(stack.repos.users.take("u1").await.is_ok());

    scenario.teardown();
}
