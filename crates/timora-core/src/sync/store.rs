//! Seam between the coordinator and wherever the user record lives.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::types::{RemoteSnapshot, Revision, UserRecord};
use crate::error::{CoreError, PersistenceFailure};
use crate::storage::Database;

/// External store for the full user record.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Replace the stored record. Returns the revision the store assigned.
    async fn write(&self, record: &UserRecord) -> Result<Revision, PersistenceFailure>;

    /// Current stored record, if any.
    async fn fetch(&self) -> Result<Option<RemoteSnapshot>, PersistenceFailure>;
}

/// The user record kept in the local SQLite database. Queries run on the
/// blocking pool.
pub struct SqliteProgressStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteProgressStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, PersistenceFailure>
    where
        F: FnOnce(&Database) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&db).map_err(to_failure)
        })
        .await
        .unwrap_or_else(|e| Err(PersistenceFailure::Unavailable(format!("database task failed: {e}"))))
    }
}

/// An undecodable record will not get better by retrying; anything else
/// (a locked or busy database included) might.
fn to_failure(err: CoreError) -> PersistenceFailure {
    let message = err.to_string();
    match err {
        CoreError::Json(_) => PersistenceFailure::Rejected(message),
        _ => PersistenceFailure::Unavailable(message),
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn write(&self, record: &UserRecord) -> Result<Revision, PersistenceFailure> {
        let record = record.clone();
        self.with_db(move |db| db.put_user_record(&record)).await
    }

    async fn fetch(&self) -> Result<Option<RemoteSnapshot>, PersistenceFailure> {
        let stored = self.with_db(Database::user_record).await?;
        Ok(stored.map(|(revision, record)| RemoteSnapshot { revision, record }))
    }
}
