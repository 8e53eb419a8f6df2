mod error;
mod memory;

pub use error::{DbError, Result};
pub use memory::MemoryStore;

use std::future::Future;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

/// Durable string key-value storage used for message handles and session
/// histories.
pub trait KeyValueStore: Send + Sync {
  /// Read a value. Returns `None` when the key was never written.
  fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

  /// Insert or overwrite a value.
  fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

  /// Remove a value. Removing a missing key is not an error.
  fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// SQLite-backed key-value store.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self.conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;

                conn.execute_batch(
                    r#"
                    CREATE TABLE IF NOT EXISTS kv (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL
                    );
                    "#,
                )?;
                Ok(())
            })
            .await?;

    info!("database initialized");
    Ok(())
  }

  /// List keys starting with `prefix`, sorted.
  pub async fn keys_with_prefix(&self, prefix: String) -> Result<Vec<String>> {
    let keys = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare_cached("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;

        let keys = stmt
          .query_map(params![&prefix], |row| row.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(keys)
      })
      .await?;

    Ok(keys)
  }
}

impl KeyValueStore for Database {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_string();
    let value = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("SELECT value FROM kv WHERE key = ?1")?
          .query_row(params![&key], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(value)
  }

  async fn set(&self, key: &str, value: String) -> Result<()> {
    let key = key.to_string();
    let key_log = key.clone();
    let now = unix_now();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
          )?
          .execute(params![&key, &value, now])?;
        Ok(())
      })
      .await?;

    debug!(key = %key_log, "stored value");
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let key = key.to_string();
    let key_log = key.clone();

    let deleted = self
      .conn
      .call(move |conn| {
        let deleted = conn
          .prepare_cached("DELETE FROM kv WHERE key = ?1")?
          .execute(params![&key])?;
        Ok(deleted)
      })
      .await?;

    if deleted > 0 {
      debug!(key = %key_log, "deleted value");
    }
    Ok(())
  }
}

fn unix_now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_value_lifecycle() {
    let db = Database::open_in_memory().await.unwrap();

    assert!(db.get("message:status").await.unwrap().is_none());

    db.set("message:status", "1100000000000000001".to_string())
      .await
      .unwrap();
    assert_eq!(
      db.get("message:status").await.unwrap().as_deref(),
      Some("1100000000000000001")
    );

    // Upsert replaces the previous handle
    db.set("message:status", "1100000000000000002".to_string())
      .await
      .unwrap();
    assert_eq!(
      db.get("message:status").await.unwrap().as_deref(),
      Some("1100000000000000002")
    );

    db.delete("message:status").await.unwrap();
    assert!(db.get("message:status").await.unwrap().is_none());

    // Deleting twice is fine
    db.delete("message:status").await.unwrap();
  }

  #[tokio::test]
  async fn test_keys_with_prefix() {
    let db = Database::open_in_memory().await.unwrap();

    db.set("sessions:Canisi", "{}".to_string()).await.unwrap();
    db.set("sessions:Blakonne", "{}".to_string()).await.unwrap();
    db.set("message:status", "42".to_string()).await.unwrap();

    let keys = db.keys_with_prefix("sessions:".to_string()).await.unwrap();
    assert_eq!(keys, vec!["sessions:Blakonne", "sessions:Canisi"]);
  }
}
