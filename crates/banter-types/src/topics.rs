use std::fmt;

use uuid::Uuid;

/// Pub/sub topic addressing. User topics are keyed by username; message
/// topics by chat id. The string forms are the wire-level topic names the
/// gateway matches subscriptions against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Chats(String),
    Contacts(String),
    SentRequests(String),
    ReceivedRequests(String),
    ChatMessages(Uuid),
}

impl Topic {
    /// The four per-user topics a connection is subscribed to as soon as it
    /// authenticates.
    pub fn user_topics(username: &str) -> [Topic; 4] {
        [
            Topic::Chats(username.to_string()),
            Topic::Contacts(username.to_string()),
            Topic::SentRequests(username.to_string()),
            Topic::ReceivedRequests(username.to_string()),
        ]
    }

    /// Parse a wire-level topic name back into its typed form.
    pub fn parse(name: &str) -> Option<Topic> {
        let mut parts = name.split('/');
        match (parts.next()?, parts.next(), parts.next(), parts.next()) {
            ("chats", Some(id), Some("messages"), None) => {
                Some(Topic::ChatMessages(id.parse().ok()?))
            }
            ("chats", Some(username), None, None) => Some(Topic::Chats(username.to_string())),
            ("contacts", Some(username), None, None) => Some(Topic::Contacts(username.to_string())),
            ("sent-requests", Some(username), None, None) => {
                Some(Topic::SentRequests(username.to_string()))
            }
            ("received-requests", Some(username), None, None) => {
                Some(Topic::ReceivedRequests(username.to_string()))
            }
            _ => None,
        }
    }

    /// The username a per-user topic belongs to, if any.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Topic::Chats(u)
            | Topic::Contacts(u)
            | Topic::SentRequests(u)
            | Topic::ReceivedRequests(u) => Some(u),
            Topic::ChatMessages(_) => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Chats(username) => write!(f, "chats/{username}"),
            Topic::Contacts(username) => write!(f, "contacts/{username}"),
            Topic::SentRequests(username) => write!(f, "sent-requests/{username}"),
            Topic::ReceivedRequests(username) => write!(f, "received-requests/{username}"),
            Topic::ChatMessages(chat_id) => write!(f, "chats/{chat_id}/messages"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let chat_id = Uuid::new_v4();
        let topics = [
            Topic::Chats("alice".into()),
            Topic::Contacts("alice".into()),
            Topic::SentRequests("bob".into()),
            Topic::ReceivedRequests("bob".into()),
            Topic::ChatMessages(chat_id),
        ];
        for topic in topics {
            assert_eq!(Topic::parse(&topic.to_string()), Some(topic));
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Topic::parse("presence/alice"), None);
        assert_eq!(Topic::parse("chats"), None);
        assert_eq!(Topic::parse("chats/not-a-uuid/messages"), None);
        assert_eq!(Topic::parse("chats/alice/messages/extra"), None);
    }

    #[test]
    fn chat_message_topic_has_no_owner() {
        assert_eq!(Topic::ChatMessages(Uuid::new_v4()).owner(), None);
        assert_eq!(Topic::Chats("alice".into()).owner(), Some("alice"));
    }
}
