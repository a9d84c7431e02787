//! Redis marker backend.
//!
//! # Key Schema
//!
//! | Key Pattern | Type | Purpose |
//! |-------------|------|---------|
//! | `{prefix}:markers:{form_id}:{submission_id}` | String | Serialized marker JSON |
//! | `{prefix}:idx:{form_id}` | Sorted Set | Per-form index scored by `createdTime` (ms) |
//!
//! The insert is a Lua script so the `SET NX` and the index `ZADD` happen
//! in one round-trip and the index never references a marker that lost the
//! race.
//!
//! # Usage
//!
//! ```rust,no_run
//! use survey_intake_dedup::store::redis::RedisBackend;
//! use survey_intake_dedup::GenericDedupStore;
//!
//! # async fn example() {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await.unwrap();
//! let store = GenericDedupStore::new(backend);
//! # }
//! ```

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Script};
use async_trait::async_trait;

use crate::store::backend::{created_time_ms, MarkerBackend, StorageError};

/// Insert-if-absent with index maintenance.
///
/// KEYS[1] = marker key, KEYS[2] = form index key.
/// ARGV[1] = marker JSON, ARGV[2] = submission id, ARGV[3] = score.
/// Returns: 1 if inserted, 0 if the key already existed.
const LUA_INSERT_IF_ABSENT: &str = r#"
local inserted = redis.call('SET', KEYS[1], ARGV[1], 'NX')
if not inserted then
    return 0
end
redis.call('ZADD', KEYS[2], tonumber(ARGV[3]), ARGV[2])
return 1
"#;

/// Redis-backed marker storage.
///
/// Holds a [`MultiplexedConnection`], which is cheap to clone; every
/// method clones it.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisBackend {
    /// Connects to Redis at `url` with the default key prefix
    /// `"survey-intake"`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the client cannot be created or
    /// the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url).map_err(|e| StorageError::Backend {
            message: format!("failed to create Redis client: {e}"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to connect to Redis: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_connection(conn))
    }

    /// Wraps an existing multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: "survey-intake".to_string(),
        }
    }

    /// Sets a custom key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn marker_key(&self, form_id: &str, submission_id: &str) -> String {
        format!("{}:markers:{}:{}", self.key_prefix, form_id, submission_id)
    }

    fn index_key(&self, form_id: &str) -> String {
        format!("{}:idx:{}", self.key_prefix, form_id)
    }
}

fn split_key(key: &str) -> Result<(&str, &str), StorageError> {
    key.split_once(':').ok_or_else(|| StorageError::Backend {
        message: format!("invalid key format (missing ':'): {key}"),
        source: None,
    })
}

fn split_prefix(prefix: &str) -> Result<&str, StorageError> {
    prefix
        .strip_suffix(':')
        .ok_or_else(|| StorageError::Backend {
            message: format!("invalid prefix format (missing trailing ':'): {prefix}"),
            source: None,
        })
}

fn map_redis_error(err: ::redis::RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl MarkerBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let (form_id, submission_id) = split_key(key)?;
        let stored: Option<String> = self
            .conn
            .clone()
            .get(self.marker_key(form_id, submission_id))
            .await
            .map_err(|e| map_redis_error(e, key))?;
        Ok(stored.map(String::into_bytes))
    }

    async fn insert_if_absent(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let (form_id, submission_id) = split_key(key)?;
        let data_str = std::str::from_utf8(data).map_err(|e| StorageError::Backend {
            message: format!("data is not valid UTF-8: {e}"),
            source: Some(Box::new(e)),
        })?;
        let score = created_time_ms(data).unwrap_or(0);

        let inserted: i64 = Script::new(LUA_INSERT_IF_ABSENT)
            .key(self.marker_key(form_id, submission_id))
            .key(self.index_key(form_id))
            .arg(data_str)
            .arg(submission_id)
            .arg(score)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, key))?;

        if inserted == 1 {
            Ok(())
        } else {
            Err(StorageError::AlreadyExists {
                key: key.to_string(),
            })
        }
    }

    async fn list_recent(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let form_id = split_prefix(prefix)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let submission_ids: Vec<String> = self
            .conn
            .clone()
            .zrevrange(self.index_key(form_id), 0, stop)
            .await
            .map_err(|e| map_redis_error(e, prefix))?;
        if submission_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = submission_ids
            .iter()
            .map(|id| self.marker_key(form_id, id))
            .collect();
        let stored: Vec<Option<String>> = ::redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, prefix))?;

        Ok(submission_ids
            .into_iter()
            .zip(stored)
            .filter_map(|(submission_id, data)| {
                data.map(|data| (format!("{form_id}:{submission_id}"), data.into_bytes()))
            })
            .collect())
    }
}
