//! Domain records stored in the relational store and cached as JSON.
//!
//! Only the fields the data layer reasons about are modelled; anything
//! product-specific rides in the free-form `ex` string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
    pub face_url: String,
    pub gender: i32,
    pub ex: String,
    pub create_time: DateTime<Utc>,
}

/// One direction of a friendship. A mutual friendship is two rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Friend {
    pub owner_user_id: String,
    pub friend_user_id: String,
    pub remark: String,
    pub add_source: i32,
    pub operator_user_id: String,
    pub ex: String,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Black {
    pub owner_user_id: String,
    pub block_user_id: String,
    pub add_source: i32,
    pub operator_user_id: String,
    pub ex: String,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    #[default]
    Normal,
    /// Membership lives in a single super-group document instead of
    /// per-member rows.
    Super,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    #[default]
    Ok,
    Muted,
    Dismissed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    pub owner_user_id: String,
    pub group_type: GroupType,
    pub status: GroupStatus,
    pub notification: String,
    pub introduction: String,
    pub face_url: String,
    pub ex: String,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleLevel {
    #[default]
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub nickname: String,
    pub role_level: RoleLevel,
    pub join_source: i32,
    pub inviter_user_id: String,
    pub operator_user_id: String,
    pub mute_end_time: Option<DateTime<Utc>>,
    pub ex: String,
    pub join_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperGroup {
    pub group_id: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Single,
    Group,
    SuperGroup,
    Notification,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecvMsgOpt {
    #[default]
    Normal,
    NotReceive,
    /// Messages are delivered but no push notification is sent.
    ReceiveNotNotify,
}

/// A user's own row for one conversation.
///
/// Each participant of a chat has an independent row keyed by
/// `(owner_user_id, conversation_id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    pub owner_user_id: String,
    pub conversation_id: String,
    pub conversation_type: SessionType,
    /// Peer user for single chats and notifications.
    pub user_id: String,
    pub group_id: String,
    pub recv_msg_opt: RecvMsgOpt,
    pub is_pinned: bool,
    pub is_private_chat: bool,
    pub burn_duration: i32,
    pub group_at_type: i32,
    pub attached_info: String,
    pub ex: String,
}

impl Conversation {
    /// Copies every field of `incoming` that is not at its default onto
    /// `self`. The owner and conversation ID are left alone, and a default
    /// field in `incoming` never clears a stored value.
    pub fn merge_set_fields(&mut self, incoming: &Conversation) {
        fn set<T: Clone + Default + PartialEq>(slot: &mut T, value: &T) {
            if *value != T::default() {
                slot.clone_from(value);
            }
        }
        set(&mut self.conversation_type, &incoming.conversation_type);
        set(&mut self.user_id, &incoming.user_id);
        set(&mut self.group_id, &incoming.group_id);
        set(&mut self.recv_msg_opt, &incoming.recv_msg_opt);
        set(&mut self.is_pinned, &incoming.is_pinned);
        set(&mut self.is_private_chat, &incoming.is_private_chat);
        set(&mut self.burn_duration, &incoming.burn_duration);
        set(&mut self.group_at_type, &incoming.group_at_type);
        set(&mut self.attached_info, &incoming.attached_info);
        set(&mut self.ex, &incoming.ex);
    }
}

/// Typed partial update for [`Conversation`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct ConversationPatch {
    pub recv_msg_opt: Option<RecvMsgOpt>,
    pub is_pinned: Option<bool>,
    pub is_private_chat: Option<bool>,
    pub burn_duration: Option<i32>,
    pub group_at_type: Option<i32>,
    #[builder(into)]
    pub attached_info: Option<String>,
    #[builder(into)]
    pub ex: Option<String>,
}

impl ConversationPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes the set fields into `conversation`, leaving the rest untouched.
    pub fn apply(&self, conversation: &mut Conversation) {
        if let Some(v) = self.recv_msg_opt {
            conversation.recv_msg_opt = v;
        }
        if let Some(v) = self.is_pinned {
            conversation.is_pinned = v;
        }
        if let Some(v) = self.is_private_chat {
            conversation.is_private_chat = v;
        }
        if let Some(v) = self.burn_duration {
            conversation.burn_duration = v;
        }
        if let Some(v) = self.group_at_type {
            conversation.group_at_type = v;
        }
        if let Some(v) = &self.attached_info {
            conversation.attached_info.clone_from(v);
        }
        if let Some(v) = &self.ex {
            conversation.ex.clone_from(v);
        }
    }
}

/// Reaction and edit metadata attached to a message after it was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendMsg {
    pub client_msg_id: String,
    pub source_id: String,
    pub session_type: SessionType,
    pub first_modify_time: i64,
    pub reactions: std::collections::BTreeMap<String, String>,
    pub ex: String,
}
