//! Deterministic conversation IDs.
//!
//! Both participants of a one-to-one chat compute the same ID on their own:
//! the pair is ordered before formatting.

use crate::{
    error::{ImError, ImResult},
    model::{Conversation, SessionType},
};

fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// `si_{min}_{max}` over the unordered pair.
#[must_use]
pub fn single_chat_id(a: &str, b: &str) -> String {
    let (lo, hi) = ordered(a, b);
    format!("si_{lo}_{hi}")
}

#[must_use]
pub fn group_chat_id(group_id: &str) -> String {
    format!("g_{group_id}")
}

#[must_use]
pub fn super_group_chat_id(group_id: &str) -> String {
    format!("sg_{group_id}")
}

#[must_use]
pub fn notification_chat_id(a: &str, b: &str) -> String {
    let (lo, hi) = ordered(a, b);
    format!("sn_{lo}_{hi}")
}

/// The canonical ID for a conversation record, derived from its type and
/// its owner, peer and group fields.
pub fn conversation_id(conversation: &Conversation) -> ImResult<String> {
    let owner = conversation.owner_user_id.as_str();
    let require = |value: &str, field: &str| {
        if value.is_empty() {
            Err(ImError::validation(format!(
                "{field} is required for {:?} conversations",
                conversation.conversation_type
            )))
        } else {
            Ok(())
        }
    };

    match conversation.conversation_type {
        SessionType::Single => {
            require(&conversation.user_id, "user_id")?;
            Ok(single_chat_id(owner, &conversation.user_id))
        },
        SessionType::Notification => {
            require(&conversation.user_id, "user_id")?;
            Ok(notification_chat_id(owner, &conversation.user_id))
        },
        SessionType::Group => {
            require(&conversation.group_id, "group_id")?;
            Ok(group_chat_id(&conversation.group_id))
        },
        SessionType::SuperGroup => {
            require(&conversation.group_id, "group_id")?;
            Ok(super_group_chat_id(&conversation.group_id))
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn single_chat_is_symmetric() {
        assert_eq!(single_chat_id("u2", "u1"), "si_u1_u2");
        assert_eq!(single_chat_id("u1", "u2"), "si_u1_u2");
        assert_eq!(notification_chat_id("b", "a"), "sn_a_b");
    }

    #[test]
    fn record_ids_follow_type() {
        let mut c = Conversation {
            owner_user_id: "u9".into(),
            user_id: "u3".into(),
            group_id: "g7".into(),
            ..Default::default()
        };
        assert_eq!(conversation_id(&c).unwrap(), "si_u3_u9");
        c.conversation_type = SessionType::Group;
        assert_eq!(conversation_id(&c).unwrap(), "g_g7");
        c.conversation_type = SessionType::SuperGroup;
        assert_eq!(conversation_id(&c).unwrap(), "sg_g7");
    }

    #[test]
    fn single_chat_without_peer_is_rejected() {
        let c = Conversation { owner_user_id: "u1".into(), ..Default::default() };
        assert!(matches!(conversation_id(&c), Err(ImError::Validation(_))));
    }

    proptest! {
        #[test]
        fn pair_order_never_matters(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
            prop_assert_eq!(single_chat_id(&a, &b), single_chat_id(&b, &a));
        }
    }
}
