/// Messenger user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Messenger chat id (numeric). Private chats and groups share the space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A user to tag in a group message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mention {
    pub user_id: UserId,
    pub display_name: String,
}

/// Who a reply goes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub display_name: String,
    pub is_group: bool,
}

impl Recipient {
    /// Mention to attach to outgoing text. Only group chats tag the sender.
    pub fn mention(&self) -> Option<Mention> {
        self.is_group.then(|| Mention {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(is_group: bool) -> Recipient {
        Recipient {
            chat_id: ChatId(-100),
            user_id: UserId(42),
            display_name: "alice".to_string(),
            is_group,
        }
    }

    #[test]
    fn only_groups_mention_the_sender() {
        assert_eq!(recipient(false).mention(), None);
        let m = recipient(true).mention().unwrap();
        assert_eq!(m.user_id, UserId(42));
        assert_eq!(m.display_name, "alice");
    }
}
