//! Medium backed by a row in the SQLite `shared_state` table.
//!
//! Any process opening the same database file shares the key. SQLite has no
//! change notifications, so contexts on this medium rely on drift polling.

use super::{ActivityMedium, ContextId};
use crate::database::Database;
use crate::error::MediumError;
use std::sync::Arc;

/// Key holding the last activity timestamp.
pub const LAST_ACTIVITY_KEY: &str = "last_activity_ms";

pub struct SqliteMedium {
    db: Arc<Database>,
    key: String,
}

impl SqliteMedium {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_key(db, LAST_ACTIVITY_KEY)
    }

    pub fn with_key(db: Arc<Database>, key: &str) -> Self {
        Self {
            db,
            key: key.to_string(),
        }
    }
}

impl ActivityMedium for SqliteMedium {
    fn publish(&self, origin: &ContextId, timestamp_ms: i64) -> Result<(), MediumError> {
        self.db
            .write_shared(&self.key, timestamp_ms, origin.as_str())?;
        Ok(())
    }

    fn latest(&self) -> Result<Option<i64>, MediumError> {
        Ok(self.db.read_shared(&self.key)?.map(|shared| shared.value))
    }
}
