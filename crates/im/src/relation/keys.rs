//! Row keys for the relational tables.
//!
//! A key is the table name followed by hex-encoded segments, each ended by
//! `/`. Hex keeps arbitrary ID text clear of the separator, and since `/`
//! sorts below every hex digit, key order equals segment order, so
//! `prefix_range` over a partial key selects exactly one owner's rows.

fn encode(table: &str, segments: &[&str]) -> Vec<u8> {
    let mut key = String::with_capacity(table.len() + 1 + segments.len() * 16);
    key.push_str(table);
    key.push('/');
    for segment in segments {
        key.push_str(&hex::encode(segment.as_bytes()));
        key.push('/');
    }
    key.into_bytes()
}

/// Decodes the last segment of a key produced by this module.
pub(crate) fn last_segment(key: &[u8]) -> Option<String> {
    let trimmed = key.strip_suffix(b"/")?;
    let start = trimmed.iter().rposition(|&b| b == b'/')? + 1;
    let raw = hex::decode(&trimmed[start..]).ok()?;
    String::from_utf8(raw).ok()
}

pub(crate) fn user(user_id: &str) -> Vec<u8> {
    encode("user", &[user_id])
}

pub(crate) fn friend(owner: &str, friend: &str) -> Vec<u8> {
    encode("friend", &[owner, friend])
}

pub(crate) fn friends_of(owner: &str) -> Vec<u8> {
    encode("friend", &[owner])
}

pub(crate) fn black(owner: &str, blocked: &str) -> Vec<u8> {
    encode("black", &[owner, blocked])
}

pub(crate) fn blacks_of(owner: &str) -> Vec<u8> {
    encode("black", &[owner])
}

pub(crate) fn group(group_id: &str) -> Vec<u8> {
    encode("group", &[group_id])
}

pub(crate) fn group_member(group_id: &str, user_id: &str) -> Vec<u8> {
    encode("group_member", &[group_id, user_id])
}

pub(crate) fn members_of(group_id: &str) -> Vec<u8> {
    encode("group_member", &[group_id])
}

pub(crate) fn joined_group(user_id: &str, group_id: &str) -> Vec<u8> {
    encode("joined_group", &[user_id, group_id])
}

pub(crate) fn joined_groups_of(user_id: &str) -> Vec<u8> {
    encode("joined_group", &[user_id])
}

pub(crate) fn super_group(group_id: &str) -> Vec<u8> {
    encode("super_group", &[group_id])
}

pub(crate) fn user_super_group(user_id: &str, group_id: &str) -> Vec<u8> {
    encode("user_super_group", &[user_id, group_id])
}

pub(crate) fn super_groups_of(user_id: &str) -> Vec<u8> {
    encode("user_super_group", &[user_id])
}

pub(crate) fn conversation(owner: &str, conversation_id: &str) -> Vec<u8> {
    encode("conversation", &[owner, conversation_id])
}

pub(crate) fn conversations_of(owner: &str) -> Vec<u8> {
    encode("conversation", &[owner])
}

pub(crate) fn conversation_table() -> Vec<u8> {
    encode("conversation", &[])
}

pub(crate) fn extend_msg(client_msg_id: &str) -> Vec<u8> {
    encode("extend_msg", &[client_msg_id])
}

/// Lossy display form for error context.
pub(crate) fn display(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pigeon_storage::prefix_range;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn owner_prefix_does_not_match_longer_owner() {
        let range = prefix_range(&conversations_of("ab"));
        assert!(range.contains(&conversation("ab", "c1")));
        assert!(!range.contains(&conversation("abc", "c1")));
    }

    #[test]
    fn separators_in_ids_stay_inside_segment() {
        let key = friend("a/b", "c");
        assert_eq!(key, friend("a/b", "c"));
        assert_ne!(key, friend("a", "b/c"));
        assert_eq!(last_segment(&key).unwrap(), "c");
    }

    #[test]
    fn last_segment_recovers_id() {
        assert_eq!(last_segment(&joined_group("u1", "group-9")).unwrap(), "group-9");
        assert_eq!(last_segment(b"user/zz/"), None);
    }

    proptest! {
        #[test]
        fn key_order_follows_owner_order(a in "\\PC{0,10}", b in "\\PC{0,10}", id in "[a-z]{1,4}") {
            prop_assert_eq!(
                conversation(&a, &id).cmp(&conversation(&b, &id)),
                a.as_bytes().cmp(b.as_bytes())
            );
        }
    }
}
