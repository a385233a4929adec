use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use banter_types::events::{RelationEvent, ServerFrame};
use banter_types::topics::Topic;

/// Routes published events to the connections subscribed to their topic.
///
/// Delivery is fire-and-forget over per-connection unbounded channels: a
/// send to a dropped receiver is silently ignored, nothing is persisted
/// and nothing is retried. Uses std locks so `publish` can be called from
/// blocking (non-async) contexts such as the relationship engine.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// conn_id -> outbound channel of the connection.
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ServerFrame>>>,

    /// topic name -> conn_ids subscribed to it.
    topics: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                topics: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection. Returns its id and the receiving end of
    /// its outbound channel.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerFrame>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .expect("connection lock poisoned")
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop a connection and all of its subscriptions.
    pub fn unregister(&self, conn_id: Uuid) {
        self.inner
            .connections
            .write()
            .expect("connection lock poisoned")
            .remove(&conn_id);

        let mut topics = self.inner.topics.write().expect("topic lock poisoned");
        topics.retain(|_, subscribers| {
            subscribers.remove(&conn_id);
            !subscribers.is_empty()
        });
    }

    pub fn subscribe(&self, conn_id: Uuid, topic: &Topic) {
        self.inner
            .topics
            .write()
            .expect("topic lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .insert(conn_id);
    }

    pub fn unsubscribe(&self, conn_id: Uuid, topic: &Topic) {
        let mut topics = self.inner.topics.write().expect("topic lock poisoned");
        if let Some(subscribers) = topics.get_mut(&topic.to_string()) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                topics.remove(&topic.to_string());
            }
        }
    }

    /// Best-effort push of an event to every subscriber of a topic.
    pub fn publish(&self, topic: &Topic, event: RelationEvent) {
        let name = topic.to_string();
        let subscribers = {
            let topics = self.inner.topics.read().expect("topic lock poisoned");
            match topics.get(&name) {
                Some(subscribers) => subscribers.iter().copied().collect::<Vec<_>>(),
                None => return,
            }
        };

        trace!("publishing to {} ({} subscribers)", name, subscribers.len());

        let connections = self
            .inner
            .connections
            .read()
            .expect("connection lock poisoned");
        for conn_id in subscribers {
            if let Some(tx) = connections.get(&conn_id) {
                let _ = tx.send(ServerFrame::Event {
                    topic: name.clone(),
                    event: event.clone(),
                });
            }
        }
    }

    /// Send a frame to one specific connection.
    pub fn send_to(&self, conn_id: Uuid, frame: ServerFrame) {
        let connections = self
            .inner
            .connections
            .read()
            .expect("connection lock poisoned");
        if let Some(tx) = connections.get(&conn_id) {
            let _ = tx.send(frame);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_types::models::ChatView;

    fn chat_event() -> RelationEvent {
        RelationEvent::ChatCreated {
            chat: ChatView {
                id: Uuid::new_v4(),
                name: "bob".into(),
            },
        }
    }

    #[test]
    fn publish_reaches_only_subscribers_of_the_topic() {
        let dispatcher = Dispatcher::new();
        let (alice_conn, mut alice_rx) = dispatcher.register();
        let (bob_conn, mut bob_rx) = dispatcher.register();

        dispatcher.subscribe(alice_conn, &Topic::Chats("alice".into()));
        dispatcher.subscribe(bob_conn, &Topic::Chats("bob".into()));

        dispatcher.publish(&Topic::Chats("alice".into()), chat_event());

        let frame = alice_rx.try_recv().unwrap();
        match frame {
            ServerFrame::Event { topic, .. } => assert_eq!(topic, "chats/alice"),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn publish_to_unknown_topic_is_a_noop() {
        let dispatcher = Dispatcher::new();
        dispatcher.publish(&Topic::Chats("nobody".into()), chat_event());
    }

    #[test]
    fn unregister_removes_subscriptions() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register();
        dispatcher.subscribe(conn, &Topic::Contacts("alice".into()));
        dispatcher.unregister(conn);

        dispatcher.publish(&Topic::Contacts("alice".into()), chat_event());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_does_not_break_publish() {
        let dispatcher = Dispatcher::new();
        let (conn, rx) = dispatcher.register();
        dispatcher.subscribe(conn, &Topic::Chats("alice".into()));
        drop(rx);

        // Fire-and-forget: a dead subscriber is skipped, not an error.
        dispatcher.publish(&Topic::Chats("alice".into()), chat_event());
    }
}
