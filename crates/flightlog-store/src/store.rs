//! SQLite-backed implementation of [`LogStore`].
//!
//! One log record spans sixteen tables joined by cascading foreign keys,
//! so a log is written in a single transaction and deleted with a single
//! statement. Column data is stored packed little-endian in a BLOB; the
//! element type token plus blob length recovers the row count.

use async_trait::async_trait;
use flightlog_core::{
    ChangedParameter, Dataset, Dropout, FieldDecl, FlightLog, FormatField, InfoEntry,
    LoggedMessage, MessageFormat, MultiInfoEntry, ScalarValue, TaggedMessage, ValueArray,
    ValueType,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::{LogId, LogStore};

/// Schema version this engine reads and writes. Stored in the database's
/// `PRAGMA user_version`; a store with a lower version must be migrated
/// before use.
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed log store.
#[derive(Debug)]
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    /// Open the store at `path` with default settings.
    pub async fn new(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(&StoreConfig::new(path)).await
    }

    /// Open (and if configured, create) the store at `config.path`.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        info!(path = %config.path.display(), "opened flightlog store");
        Ok(store)
    }

    /// Open an in-memory store, mainly for tests.
    pub async fn new_in_memory() -> Result<Self> {
        // Each :memory: connection is a separate database, so the pool
        // must stay at a single connection.
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Apply the schema to a fresh database, then gate on the version
    /// counter. An existing database is never migrated implicitly.
    async fn init(&self) -> Result<()> {
        let tables: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&self.pool)
                .await?;
        if tables == 0 {
            sqlx::migrate!("./migrations").run(&self.pool).await?;
            debug!("initialized fresh store schema");
        }
        self.check_schema().await
    }

    /// The underlying connection pool, for ad-hoc queries in tests and
    /// tooling.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn stored_schema_version(&self) -> Result<i64> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }
}

/// JSON values of a packed column, one per row, with non-finite floats
/// mapped to null (JSON has no NaN or infinity).
fn column_json_values(column: &ValueArray) -> Vec<serde_json::Value> {
    use serde_json::{json, Number, Value};

    fn finite(x: f64) -> Value {
        Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }

    match column {
        ValueArray::Int8(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::UInt8(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::Int16(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::UInt16(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::Int32(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::UInt32(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::Int64(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::UInt64(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::Float(v) => v.iter().map(|x| finite(*x as f64)).collect(),
        ValueArray::Double(v) => v.iter().map(|x| finite(*x)).collect(),
        ValueArray::Bool(v) => v.iter().map(|x| json!(x)).collect(),
        ValueArray::Char(v) => v.iter().map(|x| json!(x)).collect(),
    }
}

/// The secondary queryable encoding: a JSON object mapping each row's
/// timestamp to the column value, usable from SQL via `json_each`.
fn queryable_json(timestamps: &ValueArray, column: &ValueArray) -> String {
    use serde_json::Value;

    let map: serde_json::Map<String, Value> = column_json_values(timestamps)
        .into_iter()
        .zip(column_json_values(column))
        .map(|(key, value)| {
            let key = match key {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();
    Value::Object(map).to_string()
}

/// TEXT-column form of a non-finite real. Plain JSON cannot carry
/// NaN or infinity (serde_json writes them as null, which the untagged
/// [`ScalarValue`] cannot read back), so these go through an object
/// wrapper no other scalar can produce.
#[derive(serde::Serialize, serde::Deserialize)]
struct NonFiniteReal<'a> {
    real: &'a str,
}

fn scalar_to_text(value: &ScalarValue) -> Result<String> {
    if let ScalarValue::Real(x) = value {
        if !x.is_finite() {
            let real = if x.is_nan() {
                "nan"
            } else if x.is_sign_positive() {
                "inf"
            } else {
                "-inf"
            };
            return Ok(serde_json::to_string(&NonFiniteReal { real })?);
        }
    }
    Ok(serde_json::to_string(value)?)
}

fn scalar_from_text(text: &str) -> Result<ScalarValue> {
    if let Ok(NonFiniteReal { real }) = serde_json::from_str::<NonFiniteReal>(text) {
        let x = match real {
            "nan" => f64::NAN,
            "inf" => f64::INFINITY,
            "-inf" => f64::NEG_INFINITY,
            other => {
                return Err(StoreError::InvalidArguments(format!(
                    "unknown non-finite real token '{other}'"
                )))
            }
        };
        return Ok(ScalarValue::Real(x));
    }
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn check_schema(&self) -> Result<()> {
        let found = self.stored_schema_version().await?;
        if found < SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionTooOld {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<LogId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM logs WHERE digest = ?")
            .bind(digest)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn exists(&self, id: LogId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_log(&self, log: &FlightLog, append_json: bool) -> Result<LogId> {
        let digest = log.digest.as_deref().ok_or_else(|| {
            StoreError::InvalidArguments("log has no content digest".to_string())
        })?;

        // Validate the record before touching the database.
        for dataset in &log.datasets {
            let Some(data) = &dataset.data else {
                return Err(StoreError::InvalidArguments(format!(
                    "dataset '{}' has no column data",
                    dataset.name
                )));
            };
            dataset.check_row_counts()?;
            if dataset.timestamp_idx >= dataset.fields.len() {
                return Err(StoreError::InvalidArguments(format!(
                    "dataset '{}' timestamp index {} out of range",
                    dataset.name, dataset.timestamp_idx
                )));
            }
            for decl in &dataset.fields {
                match data.get(&decl.name) {
                    None => {
                        return Err(StoreError::InvalidArguments(format!(
                            "dataset '{}' is missing declared column '{}'",
                            dataset.name, decl.name
                        )))
                    }
                    Some(column) if column.value_type() != decl.value_type => {
                        return Err(StoreError::InvalidArguments(format!(
                            "dataset '{}' column '{}' is {} but declared {}",
                            dataset.name,
                            decl.name,
                            column.value_type().as_str(),
                            decl.value_type.as_str()
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(existing) = self.find_by_digest(digest).await? {
            return Err(StoreError::DuplicateContent {
                existing,
                digest: digest.to_string(),
            });
        }

        let mut tx = self.pool.begin().await?;
        let created_at = chrono::Utc::now().timestamp();

        let inserted = sqlx::query(
            "INSERT INTO logs (file_version, start_timestamp, last_timestamp, compat_flags, \
             incompat_flags, sync_count, has_sync, digest, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.version as i64)
        .bind(log.start_timestamp as i64)
        .bind(log.last_timestamp as i64)
        .bind(&log.compat_flags)
        .bind(&log.incompat_flags)
        .bind(log.sync_count as i64)
        .bind(log.has_sync as i64)
        .bind(digest)
        .bind(created_at)
        .execute(&mut *tx)
        .await;

        let log_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            // Concurrent writer won the digest race between our pre-check
            // and the insert.
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                drop(tx);
                let existing = self
                    .find_by_digest(digest)
                    .await?
                    .ok_or(StoreError::Database(e))?;
                return Err(StoreError::DuplicateContent {
                    existing,
                    digest: digest.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        for (series_index, offset) in log.appended_offsets.iter().enumerate() {
            sqlx::query(
                "INSERT INTO appended_offsets (log_id, series_index, offset) VALUES (?, ?, ?)",
            )
            .bind(log_id)
            .bind(series_index as i64)
            .bind(*offset as i64)
            .execute(&mut *tx)
            .await?;
        }

        for dataset in &log.datasets {
            let dataset_id = sqlx::query(
                "INSERT INTO datasets (log_id, name, multi_id, msg_id, timestamp_idx) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(log_id)
            .bind(&dataset.name)
            .bind(dataset.multi_id as i64)
            .bind(dataset.msg_id as i64)
            .bind(dataset.timestamp_idx as i64)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            // Presence of data and of every declared column was
            // validated above.
            let data = dataset.data.as_ref().ok_or_else(|| {
                StoreError::InvalidArguments(format!(
                    "dataset '{}' has no column data",
                    dataset.name
                ))
            })?;
            let timestamps = &data[&dataset.fields[dataset.timestamp_idx].name];
            for (ordinal, decl) in dataset.fields.iter().enumerate() {
                let column = &data[&decl.name];
                let value_json = append_json.then(|| queryable_json(timestamps, column));
                sqlx::query(
                    "INSERT INTO fields (dataset_id, ordinal, name, value_type, value_blob, \
                     value_json) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(dataset_id)
                .bind(ordinal as i64)
                .bind(&decl.name)
                .bind(decl.value_type.as_str())
                .bind(column.to_bytes())
                .bind(value_json)
                .execute(&mut *tx)
                .await?;
            }
        }

        for format in log.message_formats.values() {
            let format_id = sqlx::query("INSERT INTO message_formats (log_id, name) VALUES (?, ?)")
                .bind(log_id)
                .bind(&format.name)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            for (ordinal, field) in format.fields.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO format_fields (format_id, ordinal, type_name, array_size, name) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(format_id)
                .bind(ordinal as i64)
                .bind(&field.type_name)
                .bind(field.array_size.map(|n| n as i64))
                .bind(&field.name)
                .execute(&mut *tx)
                .await?;
            }
        }

        for dropout in &log.dropouts {
            sqlx::query("INSERT INTO dropouts (log_id, timestamp, duration) VALUES (?, ?, ?)")
                .bind(log_id)
                .bind(dropout.timestamp as i64)
                .bind(dropout.duration as i64)
                .execute(&mut *tx)
                .await?;
        }

        for message in &log.logged_messages {
            sqlx::query(
                "INSERT INTO logged_messages (log_id, level, timestamp, message) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(log_id)
            .bind(message.level as i64)
            .bind(message.timestamp as i64)
            .bind(&message.text)
            .execute(&mut *tx)
            .await?;
        }

        for (tag, messages) in &log.tagged_messages {
            for message in messages {
                sqlx::query(
                    "INSERT INTO tagged_messages (log_id, level, tag, timestamp, message) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(log_id)
                .bind(message.level as i64)
                .bind(*tag as i64)
                .bind(message.timestamp as i64)
                .bind(&message.text)
                .execute(&mut *tx)
                .await?;
            }
        }

        for (key, entry) in &log.info {
            sqlx::query(
                "INSERT INTO info_entries (log_id, key, type_name, value) VALUES (?, ?, ?, ?)",
            )
            .bind(log_id)
            .bind(key)
            .bind(&entry.type_name)
            .bind(scalar_to_text(&entry.value)?)
            .execute(&mut *tx)
            .await?;
        }

        for (key, entry) in &log.multi_info {
            let entry_id =
                sqlx::query("INSERT INTO multi_info (log_id, key, type_name) VALUES (?, ?, ?)")
                    .bind(log_id)
                    .bind(key)
                    .bind(&entry.type_name)
                    .execute(&mut *tx)
                    .await?
                    .last_insert_rowid();
            for (list_index, list) in entry.lists.iter().enumerate() {
                let list_id = sqlx::query(
                    "INSERT INTO multi_info_lists (entry_id, series_index) VALUES (?, ?)",
                )
                .bind(entry_id)
                .bind(list_index as i64)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
                for (element_index, value) in list.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO multi_info_elements (list_id, series_index, value) \
                         VALUES (?, ?, ?)",
                    )
                    .bind(list_id)
                    .bind(element_index as i64)
                    .bind(scalar_to_text(value)?)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        for (key, value) in &log.initial_params {
            sqlx::query("INSERT INTO initial_params (log_id, key, value) VALUES (?, ?, ?)")
                .bind(log_id)
                .bind(key)
                .bind(scalar_to_text(value)?)
                .execute(&mut *tx)
                .await?;
        }

        for (default_type, params) in &log.default_params {
            for (key, value) in params {
                sqlx::query(
                    "INSERT INTO default_params (log_id, default_type, key, value) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(log_id)
                .bind(*default_type as i64)
                .bind(key)
                .bind(scalar_to_text(value)?)
                .execute(&mut *tx)
                .await?;
            }
        }

        for changed in &log.changed_params {
            sqlx::query(
                "INSERT INTO changed_params (log_id, timestamp, key, value) VALUES (?, ?, ?, ?)",
            )
            .bind(log_id)
            .bind(changed.timestamp as i64)
            .bind(&changed.key)
            .bind(scalar_to_text(&changed.value)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(log_id, digest, datasets = log.datasets.len(), "persisted log");
        Ok(log_id)
    }

    async fn fetch_log(&self, id: LogId, lazy: bool) -> Result<FlightLog> {
        let row = sqlx::query(
            "SELECT file_version, start_timestamp, last_timestamp, compat_flags, \
             incompat_flags, sync_count, has_sync, digest FROM logs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let mut log = FlightLog {
            version: row.try_get::<i64, _>("file_version")? as u8,
            start_timestamp: row.try_get::<i64, _>("start_timestamp")? as u64,
            last_timestamp: row.try_get::<i64, _>("last_timestamp")? as u64,
            compat_flags: row.try_get("compat_flags")?,
            incompat_flags: row.try_get("incompat_flags")?,
            sync_count: row.try_get::<i64, _>("sync_count")? as u32,
            has_sync: row.try_get::<i64, _>("has_sync")? != 0,
            digest: Some(row.try_get("digest")?),
            ..FlightLog::default()
        };

        let rows = sqlx::query(
            "SELECT offset FROM appended_offsets WHERE log_id = ? ORDER BY series_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            log.appended_offsets
                .push(row.try_get::<i64, _>("offset")? as u64);
        }

        let rows = sqlx::query(
            "SELECT name, multi_id FROM datasets WHERE log_id = ? ORDER BY name, multi_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let name: String = row.try_get("name")?;
            let multi_id = row.try_get::<i64, _>("multi_id")? as u8;
            log.datasets
                .push(self.fetch_dataset(id, &name, multi_id, lazy).await?);
        }

        let rows = sqlx::query(
            "SELECT m.name, f.type_name, f.array_size, f.name AS field_name \
             FROM message_formats m JOIN format_fields f ON f.format_id = m.id \
             WHERE m.log_id = ? ORDER BY m.name, f.ordinal",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let name: String = row.try_get("name")?;
            let array_size: Option<i64> = row.try_get("array_size")?;
            let field = FormatField {
                type_name: row.try_get("type_name")?,
                array_size: array_size.map(|n| n as u32),
                name: row.try_get("field_name")?,
            };
            log.message_formats
                .entry(name.clone())
                .or_insert_with(|| MessageFormat {
                    name,
                    fields: Vec::new(),
                })
                .fields
                .push(field);
        }

        let rows =
            sqlx::query("SELECT timestamp, duration FROM dropouts WHERE log_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        for row in rows {
            log.dropouts.push(Dropout {
                timestamp: row.try_get::<i64, _>("timestamp")? as u64,
                duration: row.try_get::<i64, _>("duration")? as u32,
            });
        }

        let rows = sqlx::query(
            "SELECT level, timestamp, message FROM logged_messages WHERE log_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            log.logged_messages.push(LoggedMessage {
                level: row.try_get::<i64, _>("level")? as u8,
                timestamp: row.try_get::<i64, _>("timestamp")? as u64,
                text: row.try_get("message")?,
            });
        }

        let rows = sqlx::query(
            "SELECT level, tag, timestamp, message FROM tagged_messages WHERE log_id = ? \
             ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let tag = row.try_get::<i64, _>("tag")? as u16;
            log.tagged_messages.entry(tag).or_default().push(TaggedMessage {
                level: row.try_get::<i64, _>("level")? as u8,
                tag,
                timestamp: row.try_get::<i64, _>("timestamp")? as u64,
                text: row.try_get("message")?,
            });
        }

        let rows = sqlx::query("SELECT key, type_name, value FROM info_entries WHERE log_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            log.info.insert(
                key,
                InfoEntry {
                    type_name: row.try_get("type_name")?,
                    value: scalar_from_text(&value)?,
                },
            );
        }

        let rows = sqlx::query("SELECT id, key, type_name FROM multi_info WHERE log_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let entry_id: i64 = row.try_get("id")?;
            let key: String = row.try_get("key")?;
            let mut entry = MultiInfoEntry {
                type_name: row.try_get("type_name")?,
                lists: Vec::new(),
            };
            let list_rows = sqlx::query(
                "SELECT id FROM multi_info_lists WHERE entry_id = ? ORDER BY series_index",
            )
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await?;
            for list_row in list_rows {
                let list_id: i64 = list_row.try_get("id")?;
                let element_rows = sqlx::query(
                    "SELECT value FROM multi_info_elements WHERE list_id = ? \
                     ORDER BY series_index",
                )
                .bind(list_id)
                .fetch_all(&self.pool)
                .await?;
                let mut list = Vec::with_capacity(element_rows.len());
                for element_row in element_rows {
                    let value: String = element_row.try_get("value")?;
                    list.push(scalar_from_text(&value)?);
                }
                entry.lists.push(list);
            }
            log.multi_info.insert(key, entry);
        }

        let rows = sqlx::query("SELECT key, value FROM initial_params WHERE log_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            log.initial_params.insert(key, scalar_from_text(&value)?);
        }

        let rows =
            sqlx::query("SELECT default_type, key, value FROM default_params WHERE log_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        for row in rows {
            let default_type = row.try_get::<i64, _>("default_type")? as u8;
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            log.default_params
                .entry(default_type)
                .or_default()
                .insert(key, scalar_from_text(&value)?);
        }

        let rows = sqlx::query(
            "SELECT timestamp, key, value FROM changed_params WHERE log_id = ? \
             ORDER BY timestamp, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let value: String = row.try_get("value")?;
            log.changed_params.push(ChangedParameter {
                timestamp: row.try_get::<i64, _>("timestamp")? as u64,
                key: row.try_get("key")?,
                value: scalar_from_text(&value)?,
            });
        }

        debug!(log_id = id, lazy, "fetched log");
        Ok(log)
    }

    async fn fetch_dataset(
        &self,
        id: LogId,
        name: &str,
        multi_id: u8,
        lazy: bool,
    ) -> Result<Dataset> {
        let row = sqlx::query(
            "SELECT id, msg_id, timestamp_idx FROM datasets \
             WHERE log_id = ? AND name = ? AND multi_id = ?",
        )
        .bind(id)
        .bind(name)
        .bind(multi_id as i64)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::DatasetNotFound {
            name: name.to_string(),
            multi_id,
        })?;
        let dataset_id: i64 = row.try_get("id")?;

        let mut dataset = Dataset {
            name: name.to_string(),
            multi_id,
            msg_id: row.try_get::<i64, _>("msg_id")? as u16,
            timestamp_idx: row.try_get::<i64, _>("timestamp_idx")? as usize,
            fields: Vec::new(),
            data: None,
        };

        // Declarations travel on both paths; the blob only when eager.
        let columns = if lazy { "name, value_type" } else { "name, value_type, value_blob" };
        let rows = sqlx::query(&format!(
            "SELECT {columns} FROM fields WHERE dataset_id = ? ORDER BY ordinal"
        ))
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;

        let mut data = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let token: String = row.try_get("value_type")?;
            let value_type = ValueType::parse(&token)?;
            if !lazy {
                let blob: Vec<u8> = row.try_get("value_blob")?;
                data.insert(name.clone(), ValueArray::from_bytes(value_type, &blob)?);
            }
            dataset.fields.push(FieldDecl { name, value_type });
        }
        if !lazy {
            dataset.data = Some(data);
            dataset.check_row_counts()?;
        }
        Ok(dataset)
    }

    async fn delete_log(&self, id: LogId) -> Result<()> {
        let result = sqlx::query("DELETE FROM logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!(log_id = id, "deleted log");
        Ok(())
    }
}
