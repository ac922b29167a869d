//! Integration tests for [`storage::SqliteConversationStore`].
//!
//! Covers conversation lifecycle, message append semantics, and JSON column
//! round-trips using an in-memory SQLite database.

use assistant_core::{
    ContextSnapshot, Conversation, Message, MessageRole, ProviderKind, SafetyAction, SafetyFlag,
    SafetyFlagKind,
};
use storage::{ConversationStore, SqliteConversationStore, StorageError};

async fn store() -> SqliteConversationStore {
    SqliteConversationStore::new("sqlite::memory:")
        .await
        .expect("Failed to create store")
}

fn conversation(user_id: &str) -> Conversation {
    Conversation::new(user_id, ProviderKind::OpenAi, "gpt-4o")
}

/// **Test: Create and fetch a conversation.**
///
/// **Setup:** In-memory DB.
/// **Action:** `create_conversation` then `get_conversation`.
/// **Expected:** Round-trips id, user, provider, model, and default title.
#[tokio::test]
async fn test_create_and_get_conversation() {
    let store = store().await;
    let conv = conversation("user-1");

    store
        .create_conversation(&conv)
        .await
        .expect("Failed to create conversation");

    let found = store
        .get_conversation(&conv.id)
        .await
        .expect("Failed to get conversation")
        .expect("Conversation missing");
    assert_eq!(found.id, conv.id);
    assert_eq!(found.user_id, "user-1");
    assert_eq!(found.title, "New Conversation");
    assert_eq!(found.provider_used, ProviderKind::OpenAi);
    assert_eq!(found.message_count, 0);
    assert!(!found.is_archived);
}

/// **Test: Creating the same conversation twice fails.**
#[tokio::test]
async fn test_create_duplicate_conversation_rejected() {
    let store = store().await;
    let conv = conversation("user-1");

    store.create_conversation(&conv).await.expect("First create");
    let err = store.create_conversation(&conv).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
}

/// **Test: Appending a message bumps conversation counters.**
///
/// **Setup:** One conversation.
/// **Action:** Append a user and an assistant message.
/// **Expected:** `message_count` is 2 and `last_message_at` equals the last
/// message's timestamp.
#[tokio::test]
async fn test_append_message_updates_conversation_metadata() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");

    let user_msg = Message::new(&conv.id, MessageRole::User, "hello");
    let assistant_msg = Message::new(&conv.id, MessageRole::Assistant, "hi there");

    store.append_message(&user_msg).await.expect("append user");
    store
        .append_message(&assistant_msg)
        .await
        .expect("append assistant");

    let found = store
        .get_conversation(&conv.id)
        .await
        .expect("get")
        .expect("missing");
    assert_eq!(found.message_count, 2);
    assert_eq!(found.last_message_at, assistant_msg.timestamp);
}

/// **Test: Appending to a missing conversation fails with NotFound and
/// leaves no orphan message behind.**
#[tokio::test]
async fn test_append_message_to_missing_conversation() {
    let store = store().await;
    let msg = Message::new("no-such-conversation", MessageRole::User, "hello");

    let err = store.append_message(&msg).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    let messages = store
        .list_messages("no-such-conversation")
        .await
        .expect("list");
    assert!(messages.is_empty());
}

/// **Test: Messages come back in chronological order.**
#[tokio::test]
async fn test_list_messages_in_time_order() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");

    for i in 0..5 {
        let msg = Message::new(&conv.id, MessageRole::User, format!("message {i}"));
        store.append_message(&msg).await.expect("append");
    }

    let messages = store.list_messages(&conv.id).await.expect("list");
    assert_eq!(messages.len(), 5);
    for (i, msg) in messages.iter().enumerate() {
        assert_eq!(msg.content, format!("message {i}"));
    }
    for window in messages.windows(2) {
        assert!(window[0].timestamp <= window[1].timestamp);
    }
}

/// **Test: recent_messages returns the last N, oldest first.**
#[tokio::test]
async fn test_recent_messages_window() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");

    for i in 0..8 {
        let msg = Message::new(&conv.id, MessageRole::User, format!("message {i}"));
        store.append_message(&msg).await.expect("append");
    }

    let recent = store.recent_messages(&conv.id, 3).await.expect("recent");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].content, "message 5");
    assert_eq!(recent[2].content, "message 7");
}

/// **Test: Safety flags and context snapshot survive the JSON columns.**
#[tokio::test]
async fn test_json_columns_round_trip() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");

    let flag = SafetyFlag {
        kind: SafetyFlagKind::SelfHarm,
        description: "crisis keywords detected".to_string(),
        triggered: true,
        action: SafetyAction::Warn,
    };
    let snapshot = ContextSnapshot {
        recent_steps: Some(8421),
        recent_sleep: Some(6.5),
        active_conditions: vec!["Hypertension".to_string()],
    };
    let msg = Message::new(&conv.id, MessageRole::User, "flagged input")
        .with_safety_flag(flag)
        .with_context_snapshot(snapshot);

    store.append_message(&msg).await.expect("append");

    let messages = store.list_messages(&conv.id).await.expect("list");
    assert_eq!(messages.len(), 1);
    let found = &messages[0];
    assert_eq!(found.safety_flags.len(), 1);
    assert_eq!(found.safety_flags[0].kind, SafetyFlagKind::SelfHarm);
    assert!(found.safety_flags[0].triggered);
    let snap = found.context_snapshot.as_ref().expect("snapshot");
    assert_eq!(snap.recent_steps, Some(8421));
    assert_eq!(snap.active_conditions, vec!["Hypertension".to_string()]);
}

/// **Test: Deleting a conversation cascades to its messages.**
#[tokio::test]
async fn test_delete_conversation_cascades_messages() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");
    for _ in 0..3 {
        let msg = Message::new(&conv.id, MessageRole::User, "hi");
        store.append_message(&msg).await.expect("append");
    }

    let deleted = store.delete_conversation(&conv.id).await.expect("delete");
    assert!(deleted);
    assert!(store
        .get_conversation(&conv.id)
        .await
        .expect("get")
        .is_none());
    assert!(store.list_messages(&conv.id).await.expect("list").is_empty());

    // Deleting again reports nothing removed.
    assert!(!store.delete_conversation(&conv.id).await.expect("delete"));
}

/// **Test: Listing recent conversations orders by activity and skips
/// archived ones.**
#[tokio::test]
async fn test_list_recent_orders_and_skips_archived() {
    let store = store().await;
    let first = conversation("user-1");
    let second = conversation("user-1");
    let other_user = conversation("user-2");
    store.create_conversation(&first).await.expect("create");
    store.create_conversation(&second).await.expect("create");
    store.create_conversation(&other_user).await.expect("create");

    // Activity on `first` makes it most recent.
    let msg = Message::new(&first.id, MessageRole::User, "bump");
    store.append_message(&msg).await.expect("append");

    let recent = store.list_recent("user-1", 10).await.expect("list");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, first.id);

    store.set_archived(&second.id, true).await.expect("archive");
    let recent = store.list_recent("user-1", 10).await.expect("list");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, first.id);
}

/// **Test: set_title updates, and missing ids are NotFound.**
#[tokio::test]
async fn test_set_title() {
    let store = store().await;
    let conv = conversation("user-1");
    store.create_conversation(&conv).await.expect("create");

    store
        .set_title(&conv.id, "What should I eat before a run?")
        .await
        .expect("set title");
    let found = store
        .get_conversation(&conv.id)
        .await
        .expect("get")
        .expect("missing");
    assert_eq!(found.title, "What should I eat before a run?");

    let err = store.set_title("missing-id", "x").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}
