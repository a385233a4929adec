use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use banter_db::Database;
use banter_types::events::{ClientCommand, ServerFrame};
use banter_types::models::Principal;
use banter_types::topics::Topic;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a WebSocket connection whose token was already resolved at the
/// HTTP upgrade. The principal is the session identity for every frame on
/// this connection; individual frames carry no token of their own.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    principal: Principal,
) {
    let (mut sender, mut receiver) = socket.split();

    info!(
        "{} ({}) connected to gateway",
        principal.username, principal.id
    );

    let (conn_id, mut rx) = dispatcher.register();

    // Every session listens on its own four user topics from the start;
    // chat message topics are opted into per open chat.
    for topic in Topic::user_topics(&principal.username) {
        dispatcher.subscribe(conn_id, &topic);
    }

    let ready = ServerFrame::Ready {
        user_id: principal.id,
        username: principal.username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        dispatcher.unregister(conn_id);
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward dispatched frames to the client, interleaved with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let frame = match frame {
                        Some(frame) => frame,
                        None => break,
                    };
                    let text = serde_json::to_string(&frame).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let recv_dispatcher = dispatcher.clone();
    let recv_principal = principal.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_dispatcher, &db, conn_id, &recv_principal, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_principal.username,
                            recv_principal.id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id);
    info!(
        "{} ({}) disconnected from gateway",
        principal.username, principal.id
    );
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    conn_id: Uuid,
    principal: &Principal,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::Subscribe { topics } => {
            for name in topics {
                let Some(topic) = Topic::parse(&name) else {
                    warn!(
                        "{} ({}) tried to subscribe to unknown topic {}",
                        principal.username, principal.id, name
                    );
                    continue;
                };
                if authorize_subscription(db, principal, &topic).await {
                    dispatcher.subscribe(conn_id, &topic);
                } else {
                    warn!(
                        "{} ({}) denied subscription to {}",
                        principal.username, principal.id, topic
                    );
                }
            }
        }
    }
}

/// A connection may listen on its own user topics and on the message
/// topics of chats it is a member of — nothing else.
async fn authorize_subscription(db: &Arc<Database>, principal: &Principal, topic: &Topic) -> bool {
    match topic {
        Topic::ChatMessages(chat_id) => {
            let db = db.clone();
            let user_id = principal.id;
            let chat_id = *chat_id;
            tokio::task::spawn_blocking(move || db.is_chat_member(user_id, chat_id))
                .await
                .map(|result| result.unwrap_or(false))
                .unwrap_or(false)
        }
        other => other.owner() == Some(principal.username.as_str()),
    }
}
