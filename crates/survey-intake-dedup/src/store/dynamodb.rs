//! DynamoDB marker backend.
//!
//! # Table Design
//!
//! | Attribute     | Type   | Description                               |
//! |---------------|--------|-------------------------------------------|
//! | `PK`          | String | Partition key: `FORM#<form_id>`           |
//! | `SK`          | String | Sort key: `SUBMISSION#<submission_id>`    |
//! | `data`        | String | Serialized marker JSON                    |
//! | `created_time`| Number | Epoch milliseconds, sort key of the `created_time-index` LSI |
//!
//! The uniqueness constraint on `(form_id, submission_id)` is the primary
//! key itself; inserts use `attribute_not_exists(PK)`, and a
//! `ConditionalCheckFailedException` is reported as
//! [`StorageError::AlreadyExists`].
//!
//! Recent-marker listings query the `(PK, created_time)` local secondary
//! index newest first and stop once `limit` items have been read. The index
//! is sparse, so markers without a readable `createdTime` are not listed.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use crate::store::backend::{created_time_ms, MarkerBackend, StorageError};

/// Local secondary index over `(PK, created_time)`.
const CREATED_TIME_INDEX: &str = "created_time-index";

/// DynamoDB-backed marker storage.
#[derive(Debug, Clone)]
pub struct DynamoDbBackend {
    client: Client,
    table_name: String,
}

impl DynamoDbBackend {
    /// Creates a backend with a pre-built client.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a backend from the standard AWS config chain using the
    /// `"survey_intake_markers"` table.
    pub async fn from_env() -> Self {
        Self::from_env_with_table("survey_intake_markers").await
    }

    /// Creates a backend from the standard AWS config chain with a custom
    /// table name.
    pub async fn from_env_with_table(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }
}

fn make_pk(form_id: &str) -> String {
    format!("FORM#{form_id}")
}

fn make_sk(submission_id: &str) -> String {
    format!("SUBMISSION#{submission_id}")
}

fn parse_sk(sk: &str) -> Option<&str> {
    sk.strip_prefix("SUBMISSION#")
}

fn split_key(key: &str) -> Result<(String, String), StorageError> {
    let (form_id, submission_id) =
        key.split_once(':').ok_or_else(|| StorageError::Backend {
            message: format!("invalid key format (missing ':'): {key}"),
            source: None,
        })?;
    Ok((make_pk(form_id), make_sk(submission_id)))
}

fn map_sdk_error(err: impl std::error::Error + Send + Sync + 'static, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("DynamoDB error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl MarkerBackend for DynamoDbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let (pk, sk) = split_key(key)?;
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let Some(item) = result.item() else {
            return Ok(None);
        };
        let data = item
            .get("data")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| StorageError::Backend {
                message: format!("missing or invalid data attribute for key {key}"),
                source: None,
            })?;
        Ok(Some(data.as_bytes().to_vec()))
    }

    async fn insert_if_absent(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let (pk, sk) = split_key(key)?;
        let data_str = std::str::from_utf8(data).map_err(|e| StorageError::Backend {
            message: format!("data is not valid UTF-8: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut builder = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", AttributeValue::S(pk))
            .item("SK", AttributeValue::S(sk))
            .item("data", AttributeValue::S(data_str.to_string()))
            .condition_expression("attribute_not_exists(PK)");
        if let Some(ms) = created_time_ms(data) {
            builder = builder.item("created_time", AttributeValue::N(ms.to_string()));
        }

        match builder.send().await {
            Ok(_) => Ok(()),
            Err(sdk_err) => {
                if let Some(service_err) = sdk_err.as_service_error() {
                    if service_err.is_conditional_check_failed_exception() {
                        return Err(StorageError::AlreadyExists {
                            key: key.to_string(),
                        });
                    }
                }
                Err(map_sdk_error(sdk_err, key))
            },
        }
    }

    async fn list_recent(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let form_id = prefix
            .strip_suffix(':')
            .ok_or_else(|| StorageError::Backend {
                message: format!("invalid prefix format (missing trailing ':'): {prefix}"),
                source: None,
            })?;
        let pk = make_pk(form_id);

        let mut results = Vec::with_capacity(limit.min(100));
        let mut exclusive_start_key = None;
        while results.len() < limit {
            let remaining = i32::try_from(limit - results.len()).unwrap_or(i32::MAX);
            let mut query = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(CREATED_TIME_INDEX)
                .key_condition_expression("PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .scan_index_forward(false)
                .limit(remaining);
            if let Some(start_key) = exclusive_start_key.take() {
                query = query.set_exclusive_start_key(Some(start_key));
            }

            let output = query.send().await.map_err(|e| map_sdk_error(e, prefix))?;
            for item in output.items() {
                let sk = item.get("SK").and_then(|v: &AttributeValue| v.as_s().ok());
                let data = item.get("data").and_then(|v: &AttributeValue| v.as_s().ok());
                if let (Some(sk), Some(data)) = (sk, data) {
                    if let Some(submission_id) = parse_sk(sk) {
                        results.push((
                            format!("{form_id}:{submission_id}"),
                            data.as_bytes().to_vec(),
                        ));
                    }
                }
            }

            match output.last_evaluated_key() {
                Some(last_key) if !last_key.is_empty() => {
                    exclusive_start_key = Some(last_key.clone());
                },
                _ => break,
            }
        }
        results.truncate(limit);
        Ok(results)
    }
}
