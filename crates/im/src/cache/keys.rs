//! Cache key layout: `"<PREFIX>:<id>"`, or `"<PREFIX>:<a>:<b>"` for entries
//! scoped to a pair such as owner and conversation.

pub const USER_INFO: &str = "USER_INFO_CACHE";
pub const FRIEND_RELATION: &str = "FRIEND_RELATION_CACHE";
pub const ALL_FRIEND_INFO: &str = "ALL_FRIEND_INFO_CACHE";
pub const BLACK_LIST: &str = "BLACK_LIST_CACHE";
pub const GROUP_INFO: &str = "GROUP_INFO_CACHE";
pub const JOINED_GROUP_LIST: &str = "JOINED_GROUP_LIST_CACHE";
pub const GROUP_MEMBER_ID_LIST: &str = "GROUP_MEMBER_ID_LIST_CACHE";
pub const GROUP_MEMBER_INFO: &str = "GROUP_MEMBER_INFO_CACHE";
pub const GROUP_ALL_MEMBER_INFO: &str = "GROUP_ALL_MEMBER_INFO_CACHE";
pub const GROUP_MEMBER_NUM: &str = "GROUP_MEMBER_NUM_CACHE";
pub const GROUP_MEMBER_LIST_HASH: &str = "GROUP_MEMBER_LIST_HASH_CACHE";
pub const JOINED_SUPER_GROUP_LIST: &str = "JOINED_SUPER_GROUP_LIST_CACHE";
pub const CONVERSATION: &str = "CONVERSATION_CACHE";
pub const CONVERSATION_ID_LIST: &str = "CONVERSATION_ID_LIST_CACHE";
pub const EXTEND_MSG: &str = "EXTEND_MSG_CACHE";

/// Every namespace, for bulk clears.
pub const ALL_PREFIXES: [&str; 15] = [
    USER_INFO,
    FRIEND_RELATION,
    ALL_FRIEND_INFO,
    BLACK_LIST,
    GROUP_INFO,
    JOINED_GROUP_LIST,
    GROUP_MEMBER_ID_LIST,
    GROUP_MEMBER_INFO,
    GROUP_ALL_MEMBER_INFO,
    GROUP_MEMBER_NUM,
    GROUP_MEMBER_LIST_HASH,
    JOINED_SUPER_GROUP_LIST,
    CONVERSATION,
    CONVERSATION_ID_LIST,
    EXTEND_MSG,
];

/// Scan prefix for a namespace. The trailing `:` keeps one namespace
/// from matching another that merely starts with the same name.
#[must_use]
pub fn scan_prefix(namespace: &str) -> String {
    format!("{namespace}:")
}

#[must_use]
pub fn user_info(user_id: &str) -> String {
    format!("{USER_INFO}:{user_id}")
}

#[must_use]
pub fn friend_id_list(owner: &str) -> String {
    format!("{FRIEND_RELATION}:{owner}")
}

#[must_use]
pub fn all_friends_info(owner: &str) -> String {
    format!("{ALL_FRIEND_INFO}:{owner}")
}

#[must_use]
pub fn black_id_list(owner: &str) -> String {
    format!("{BLACK_LIST}:{owner}")
}

#[must_use]
pub fn group_info(group_id: &str) -> String {
    format!("{GROUP_INFO}:{group_id}")
}

#[must_use]
pub fn joined_group_id_list(user_id: &str) -> String {
    format!("{JOINED_GROUP_LIST}:{user_id}")
}

#[must_use]
pub fn group_member_id_list(group_id: &str) -> String {
    format!("{GROUP_MEMBER_ID_LIST}:{group_id}")
}

#[must_use]
pub fn group_member_info(group_id: &str, user_id: &str) -> String {
    format!("{GROUP_MEMBER_INFO}:{group_id}:{user_id}")
}

#[must_use]
pub fn all_group_members_info(group_id: &str) -> String {
    format!("{GROUP_ALL_MEMBER_INFO}:{group_id}")
}

#[must_use]
pub fn group_member_num(group_id: &str) -> String {
    format!("{GROUP_MEMBER_NUM}:{group_id}")
}

#[must_use]
pub fn group_member_list_hash(group_id: &str) -> String {
    format!("{GROUP_MEMBER_LIST_HASH}:{group_id}")
}

#[must_use]
pub fn joined_super_group_id_list(user_id: &str) -> String {
    format!("{JOINED_SUPER_GROUP_LIST}:{user_id}")
}

#[must_use]
pub fn conversation(owner: &str, conversation_id: &str) -> String {
    format!("{CONVERSATION}:{owner}:{conversation_id}")
}

#[must_use]
pub fn conversation_id_list(owner: &str) -> String {
    format!("{CONVERSATION_ID_LIST}:{owner}")
}

#[must_use]
pub fn extend_msg(client_msg_id: &str) -> String {
    format!("{EXTEND_MSG}:{client_msg_id}")
}
