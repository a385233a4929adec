pub mod auth;
pub mod chats;
pub mod contacts;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod requests;
pub mod users;

use std::sync::Arc;

use banter_auth::AccessGate;
use banter_core::Fanout;
use banter_db::Database;
use banter_gateway::Dispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub gate: AccessGate,
    pub fanout: Fanout,
    pub dispatcher: Dispatcher,
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, banter_types::error::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            ApiError(banter_types::error::Error::operation_failed(
                banter_types::error::Entity::Store,
                "background task failed",
            ))
        })?
        .map_err(ApiError)
}
