use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use banter_api::middleware::require_auth;
use banter_api::{AppState, AppStateInner, auth, chats, contacts, messages, requests, users};
use banter_auth::{AccessGate, TokenCodec};
use banter_core::Fanout;
use banter_gateway::{Dispatcher, connection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("BANTER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let token_lifetime_secs: i64 = std::env::var("BANTER_TOKEN_LIFETIME_SECS")
        .unwrap_or_else(|_| "86400".into())
        .parse()?;
    let db_path = std::env::var("BANTER_DB_PATH").unwrap_or_else(|_| "banter.db".into());
    let host = std::env::var("BANTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BANTER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(banter_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let codec = TokenCodec::new(&jwt_secret, chrono::Duration::seconds(token_lifetime_secs));
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        gate: AccessGate::new(db, codec),
        fanout: Fanout::new(dispatcher.clone()),
        dispatcher,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", put(users::update_user))
        .route("/users/{user_id}", delete(users::delete_user))
        .route("/users/{user_id}/requests", post(requests::create_request))
        .route("/chats", get(chats::get_chats))
        .route("/chats", post(chats::create_chat))
        .route("/chats/{chat_id}", get(chats::get_chat))
        .route("/chats/{chat_id}", delete(chats::delete_chat))
        .route("/chats/{chat_id}/messages", get(messages::get_messages))
        .route("/chats/{chat_id}/messages", post(messages::create_message))
        .route(
            "/chats/{chat_id}/messages/{message_id}",
            put(messages::update_message),
        )
        .route(
            "/chats/{chat_id}/messages/{message_id}",
            delete(messages::delete_message),
        )
        .route("/contacts", get(contacts::get_contacts))
        .route("/contacts/{contact_id}", delete(contacts::delete_contact))
        .route("/requests/sent", get(requests::sent_requests))
        .route("/requests/received", get(requests::received_requests))
        .route("/requests/{request_id}", get(requests::get_request))
        .route("/requests/{request_id}", delete(requests::delete_request))
        .route(
            "/requests/{request_id}/approve",
            post(requests::approve_request),
        )
        .route(
            "/requests/{request_id}/reject",
            post(requests::reject_request),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Banter server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Authenticate the WebSocket upgrade. The canonical mechanism is the
/// `jwt` cookie; a `token` query parameter is accepted as a fallback for
/// clients that cannot set cookies. The principal resolved here is the
/// session identity for every frame on the connection.
async fn ws_upgrade(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let token = jar
        .get("jwt")
        .map(|cookie| cookie.value().to_string())
        .or(query.token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let gate_state = state.clone();
    let principal = tokio::task::spawn_blocking(move || gate_state.gate.resolve(&token))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            principal,
        )
    }))
}
