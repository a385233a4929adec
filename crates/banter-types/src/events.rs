use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatView, ContactView, MessageView, RequestView};

/// Relationship and chat events pushed to subscribers after a store
/// mutation has been confirmed. Delivery is best-effort; nothing here is
/// persisted or retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RelationEvent {
    ChatCreated { chat: ChatView },
    ChatDeleted { chat: ChatView },
    ContactCreated { contact: ContactView },
    ContactRemoved { contact: ContactView },
    RequestCreated { request: RequestView },
    RequestRemoved { request: RequestView },
    MessageCreated { message: MessageView },
    MessageUpdated { message: MessageView },
    MessageDeleted { message: MessageView },
}

/// Frames sent from server to client over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame {
    /// Sent once after the upgrade handshake resolved a principal.
    Ready { user_id: Uuid, username: String },

    /// A published event, tagged with the topic it was delivered on.
    Event { topic: String, event: RelationEvent },
}

/// Commands sent from client to server over the gateway. Authentication
/// happens at the HTTP upgrade, so there is no identify handshake here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientCommand {
    /// Subscribe to additional topics, typically `chats/{chat_id}/messages`
    /// for the chats currently open in the client.
    Subscribe { topics: Vec<String> },
}
