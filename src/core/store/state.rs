use std::path::Path;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tokio::sync::broadcast;

use crate::core::store::document::ChangeEvent;
use crate::error::Result;

/// Buffered change notifications per receiver. A lagged receiver re-runs
/// its query instead of replaying events, so the buffer only needs to cover
/// short bursts.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Shared backing state of a workspace store: the connection pool and the
/// change feed every subscription listens on.
pub(super) struct StoreState {
    pool: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

impl StoreState {
    pub(super) async fn open<P: AsRef<Path>>(workspace_file: P) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::new()
            .filename(workspace_file.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(StoreState { pool, changes })
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Broadcast a committed write. Fails only when no subscription is
    /// listening, which is not an error.
    pub(super) fn publish(&self, event: ChangeEvent) {
        log::debug!(
            "change {:?} {}/{}",
            event.kind,
            event.collection,
            event.doc_id
        );
        let _ = self.changes.send(event);
    }

    pub(super) fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
