use banter_gateway::Dispatcher;
use banter_types::events::RelationEvent;
use banter_types::models::{ChatView, ContactView, MessageView, RequestView};
use banter_types::topics::Topic;

/// Publishes relationship and chat events to the per-user topics after a
/// store mutation has been confirmed. All delivery is best-effort; the
/// callers never publish before their transaction commits.
#[derive(Clone)]
pub struct Fanout {
    dispatcher: Dispatcher,
}

impl Fanout {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn chat_created(&self, viewer: &str, chat: ChatView) {
        self.dispatcher
            .publish(&Topic::Chats(viewer.to_string()), RelationEvent::ChatCreated { chat });
    }

    pub fn chat_deleted(&self, viewer: &str, chat: ChatView) {
        self.dispatcher
            .publish(&Topic::Chats(viewer.to_string()), RelationEvent::ChatDeleted { chat });
    }

    pub fn contact_created(&self, viewer: &str, contact: ContactView) {
        self.dispatcher.publish(
            &Topic::Contacts(viewer.to_string()),
            RelationEvent::ContactCreated { contact },
        );
    }

    pub fn contact_removed(&self, viewer: &str, contact: ContactView) {
        self.dispatcher.publish(
            &Topic::Contacts(viewer.to_string()),
            RelationEvent::ContactRemoved { contact },
        );
    }

    /// A new pending request: the sender sees it on their sent-requests
    /// topic, the recipient on their received-requests topic.
    pub fn request_created(&self, request: &RequestView) {
        self.dispatcher.publish(
            &Topic::SentRequests(request.from_username.clone()),
            RelationEvent::RequestCreated {
                request: request.clone(),
            },
        );
        self.dispatcher.publish(
            &Topic::ReceivedRequests(request.to_username.clone()),
            RelationEvent::RequestCreated {
                request: request.clone(),
            },
        );
    }

    /// A request left the pending state (approved, rejected or withdrawn);
    /// both parties are told on their respective topics.
    pub fn request_removed(&self, request: &RequestView) {
        self.dispatcher.publish(
            &Topic::SentRequests(request.from_username.clone()),
            RelationEvent::RequestRemoved {
                request: request.clone(),
            },
        );
        self.dispatcher.publish(
            &Topic::ReceivedRequests(request.to_username.clone()),
            RelationEvent::RequestRemoved {
                request: request.clone(),
            },
        );
    }

    pub fn message_created(&self, message: MessageView) {
        self.dispatcher.publish(
            &Topic::ChatMessages(message.chat_id),
            RelationEvent::MessageCreated { message },
        );
    }

    pub fn message_updated(&self, message: MessageView) {
        self.dispatcher.publish(
            &Topic::ChatMessages(message.chat_id),
            RelationEvent::MessageUpdated { message },
        );
    }

    pub fn message_deleted(&self, message: MessageView) {
        self.dispatcher.publish(
            &Topic::ChatMessages(message.chat_id),
            RelationEvent::MessageDeleted { message },
        );
    }
}
