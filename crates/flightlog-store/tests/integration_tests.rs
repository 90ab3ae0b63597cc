//! End-to-end tests against real SQLite databases.

use async_trait::async_trait;
use flightlog_core::{
    ChangedParameter, Dataset, Dropout, FieldDecl, FlightLog, FormatField, InfoEntry,
    LoggedMessage, MessageFormat, MultiInfoEntry, ScalarValue, TaggedMessage, ValueArray,
    ValueType,
};
use flightlog_store::{
    LogHandle, LogId, LogStore, Result, SqliteLogStore, StoreConfig, StoreError,
};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn imu_dataset(multi_id: u8, rows: usize) -> Dataset {
    let mut data = BTreeMap::new();
    data.insert(
        "timestamp".to_string(),
        ValueArray::UInt64((0..rows as u64).map(|i| 1_000 + i * 10).collect()),
    );
    data.insert(
        "accel_z".to_string(),
        ValueArray::Float((0..rows).map(|i| -9.8 + (i as f32) * 0.01).collect()),
    );
    Dataset {
        name: "imu".to_string(),
        multi_id,
        msg_id: 7,
        timestamp_idx: 0,
        fields: vec![
            FieldDecl {
                name: "timestamp".to_string(),
                value_type: ValueType::UInt64,
            },
            FieldDecl {
                name: "accel_z".to_string(),
                value_type: ValueType::Float,
            },
        ],
        data: Some(data),
    }
}

fn gps_dataset() -> Dataset {
    let mut data = BTreeMap::new();
    data.insert(
        "timestamp".to_string(),
        ValueArray::UInt64(vec![1_000, 2_000, 3_000]),
    );
    data.insert(
        "fix_type".to_string(),
        ValueArray::UInt8(vec![0, 2, 3]),
    );
    Dataset {
        name: "gps".to_string(),
        multi_id: 0,
        msg_id: 12,
        timestamp_idx: 0,
        fields: vec![
            FieldDecl {
                name: "timestamp".to_string(),
                value_type: ValueType::UInt64,
            },
            FieldDecl {
                name: "fix_type".to_string(),
                value_type: ValueType::UInt8,
            },
        ],
        data: Some(data),
    }
}

/// A fully populated record; datasets pre-sorted by (name, multi_id),
/// the order reads come back in.
fn sample_log(digest: &str) -> FlightLog {
    let mut log = FlightLog {
        version: 1,
        start_timestamp: 1_000,
        last_timestamp: 99_000,
        compat_flags: vec![1, 0, 0, 0, 0, 0, 0, 0],
        incompat_flags: vec![0; 8],
        sync_count: 2,
        has_sync: true,
        digest: Some(digest.to_string()),
        appended_offsets: vec![4_096, 8_192],
        datasets: vec![gps_dataset(), imu_dataset(0, 100), imu_dataset(1, 100)],
        dropouts: vec![Dropout {
            timestamp: 5_000,
            duration: 50,
        }],
        logged_messages: vec![LoggedMessage {
            level: 6,
            timestamp: 1_500,
            text: "takeoff detected".to_string(),
        }],
        ..FlightLog::default()
    };
    log.tagged_messages.insert(
        3,
        vec![TaggedMessage {
            level: 4,
            tag: 3,
            timestamp: 2_500,
            text: "gimbal timeout".to_string(),
        }],
    );
    log.message_formats.insert(
        "imu".to_string(),
        MessageFormat {
            name: "imu".to_string(),
            fields: vec![
                FormatField {
                    type_name: "uint64_t".to_string(),
                    array_size: None,
                    name: "timestamp".to_string(),
                },
                FormatField {
                    type_name: "float".to_string(),
                    array_size: Some(3),
                    name: "accel".to_string(),
                },
            ],
        },
    );
    log.info.insert(
        "ver_sw".to_string(),
        InfoEntry {
            type_name: "char[16]".to_string(),
            value: ScalarValue::Text("v1.14.0".to_string()),
        },
    );
    log.multi_info.insert(
        "perf_counter".to_string(),
        MultiInfoEntry {
            type_name: "char[32]".to_string(),
            lists: vec![
                vec![
                    ScalarValue::Text("boot".to_string()),
                    ScalarValue::Text("arm".to_string()),
                ],
                vec![ScalarValue::Text("land".to_string())],
            ],
        },
    );
    log.initial_params
        .insert("MC_PITCHRATE_P".to_string(), ScalarValue::Real(0.15));
    log.initial_params
        .insert("SYS_AUTOSTART".to_string(), ScalarValue::Integer(4001));
    let mut airframe_defaults = BTreeMap::new();
    airframe_defaults.insert("MC_PITCHRATE_P".to_string(), ScalarValue::Real(0.12));
    log.default_params.insert(1, airframe_defaults);
    log.changed_params = vec![
        ChangedParameter {
            timestamp: 3_000,
            key: "MC_PITCHRATE_P".to_string(),
            value: ScalarValue::Real(0.18),
        },
        ChangedParameter {
            timestamp: 7_000,
            key: "MC_PITCHRATE_P".to_string(),
            value: ScalarValue::Real(0.2),
        },
    ];
    log
}

async fn memory_store() -> Arc<SqliteLogStore> {
    Arc::new(SqliteLogStore::new_in_memory().await.unwrap())
}

#[tokio::test]
async fn save_and_load_round_trips_the_whole_record() {
    let store = memory_store().await;
    let original = sample_log("aaaa1111");

    let mut handle = LogHandle::for_log(store.clone(), original.clone())
        .await
        .unwrap();
    let id = handle.save(false).await.unwrap();
    assert_eq!(handle.id(), Some(id));

    let loaded = LogHandle::open(store, id, false).await.unwrap();
    assert_eq!(loaded.snapshot().unwrap(), original);
}

#[tokio::test]
async fn duplicate_content_is_rejected_with_existing_id() {
    let store = memory_store().await;
    let log = sample_log("bbbb2222");

    let mut first = LogHandle::for_log(store.clone(), log.clone()).await.unwrap();
    let first_id = first.save(false).await.unwrap();

    let mut second = LogHandle::for_log(store.clone(), log).await.unwrap();
    match second.save(false).await.unwrap_err() {
        StoreError::DuplicateContent { existing, digest } => {
            assert_eq!(existing, first_id);
            assert_eq!(digest, "bbbb2222");
        }
        other => panic!("unexpected error {other:?}"),
    }
    // The handle adopts the existing identity.
    assert_eq!(second.id(), Some(first_id));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn saving_twice_on_one_handle_fails() {
    let store = memory_store().await;
    let mut handle = LogHandle::for_log(store, sample_log("cccc3333"))
        .await
        .unwrap();
    handle.save(false).await.unwrap();
    assert!(matches!(
        handle.save(false).await.unwrap_err(),
        StoreError::AlreadyPersisted
    ));
}

#[tokio::test]
async fn lazy_open_materializes_datasets_on_demand() {
    let store = memory_store().await;
    let original = sample_log("dddd4444");
    let mut handle = LogHandle::for_log(store.clone(), original.clone())
        .await
        .unwrap();
    let id = handle.save(false).await.unwrap();

    let mut lazy = LogHandle::open(store, id, true).await.unwrap();
    // Declarations are present, columns are not.
    let declared = lazy.get_dataset("imu", 1, true, true).await.unwrap();
    assert!(!declared.has_data());
    assert_eq!(declared.fields.len(), 2);

    let eager = lazy.get_dataset("imu", 1, false, true).await.unwrap();
    assert_eq!(&eager, original.dataset("imu", 1).unwrap());
    assert_eq!(eager.row_count(), Some(100));
}

#[tokio::test]
async fn distinct_instances_are_kept_apart() {
    let store = memory_store().await;
    let mut log = sample_log("eeee5555");
    // Make instance 1 distinguishable from instance 0.
    if let Some(data) = log.datasets[2].data.as_mut() {
        data.insert("accel_z".to_string(), ValueArray::Float(vec![0.5; 100]));
    }
    let expected = log.datasets[2].clone();

    let mut handle = LogHandle::for_log(store.clone(), log).await.unwrap();
    let id = handle.save(false).await.unwrap();

    let mut loaded = LogHandle::open(store, id, true).await.unwrap();
    let instance1 = loaded.get_dataset("imu", 1, false, true).await.unwrap();
    assert_eq!(instance1, expected);
    let instance0 = loaded.get_dataset("imu", 0, false, true).await.unwrap();
    assert_ne!(instance0.data, instance1.data);

    assert!(matches!(
        loaded.get_dataset("imu", 2, false, true).await.unwrap_err(),
        StoreError::DatasetNotFound { multi_id: 2, .. }
    ));
}

/// Store wrapper that counts how many dataset reads reach the database.
struct CountingStore {
    inner: SqliteLogStore,
    dataset_fetches: AtomicUsize,
}

#[async_trait]
impl LogStore for CountingStore {
    async fn check_schema(&self) -> Result<()> {
        self.inner.check_schema().await
    }
    async fn find_by_digest(&self, digest: &str) -> Result<Option<LogId>> {
        self.inner.find_by_digest(digest).await
    }
    async fn exists(&self, id: LogId) -> Result<bool> {
        self.inner.exists(id).await
    }
    async fn insert_log(&self, log: &FlightLog, append_json: bool) -> Result<LogId> {
        self.inner.insert_log(log, append_json).await
    }
    async fn fetch_log(&self, id: LogId, lazy: bool) -> Result<FlightLog> {
        self.inner.fetch_log(id, lazy).await
    }
    async fn fetch_dataset(
        &self,
        id: LogId,
        name: &str,
        multi_id: u8,
        lazy: bool,
    ) -> Result<Dataset> {
        self.dataset_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_dataset(id, name, multi_id, lazy).await
    }
    async fn delete_log(&self, id: LogId) -> Result<()> {
        self.inner.delete_log(id).await
    }
}

#[tokio::test]
async fn dataset_cache_refreshes_but_never_inserts() {
    let inner = SqliteLogStore::new_in_memory().await.unwrap();
    let log = sample_log("ffff6666");
    let id = inner.insert_log(&log, false).await.unwrap();
    let store = Arc::new(CountingStore {
        inner,
        dataset_fetches: AtomicUsize::new(0),
    });

    let mut handle = LogHandle::open(store.clone(), id, true).await.unwrap();
    assert_eq!(handle.cache().len(), 3);
    assert_eq!(store.dataset_fetches.load(Ordering::SeqCst), 0);

    // First eager read is a miss (cache holds the lazy shell), and the
    // fetched data refreshes the existing entry.
    handle.get_dataset("imu", 0, false, true).await.unwrap();
    assert_eq!(store.dataset_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(handle.cache().len(), 3);

    // Second read is served from the refreshed entry.
    handle.get_dataset("imu", 0, false, true).await.unwrap();
    assert_eq!(store.dataset_fetches.load(Ordering::SeqCst), 1);

    // Bypassing the cache always reaches the store.
    handle.get_dataset("imu", 0, false, false).await.unwrap();
    assert_eq!(store.dataset_fetches.load(Ordering::SeqCst), 2);

    // With the cache cleared the same read always goes to the store and
    // never repopulates the cache, even with use_cache on.
    handle.clear_dataset_cache();
    handle.get_dataset("imu", 0, false, true).await.unwrap();
    handle.get_dataset("imu", 0, false, true).await.unwrap();
    assert_eq!(store.dataset_fetches.load(Ordering::SeqCst), 4);
    assert!(handle.cache().is_empty());
}

#[tokio::test]
async fn delete_cascades_to_every_child_table() {
    let store = memory_store().await;
    let mut handle = LogHandle::for_log(store.clone(), sample_log("9999aaaa"))
        .await
        .unwrap();
    handle.save(false).await.unwrap();
    handle.delete().await.unwrap();
    assert!(!handle.is_persisted());

    for table in [
        "logs",
        "appended_offsets",
        "datasets",
        "fields",
        "message_formats",
        "format_fields",
        "dropouts",
        "logged_messages",
        "tagged_messages",
        "info_entries",
        "multi_info",
        "multi_info_lists",
        "multi_info_elements",
        "initial_params",
        "default_params",
        "changed_params",
    ] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0, "table {table} not emptied by cascade");
    }
}

#[tokio::test]
async fn deleted_log_can_be_saved_again_under_a_new_id() {
    let store = memory_store().await;
    let mut handle = LogHandle::for_log(store.clone(), sample_log("8888bbbb"))
        .await
        .unwrap();
    let first_id = handle.save(false).await.unwrap();
    handle.delete().await.unwrap();

    let second_id = handle.save(false).await.unwrap();
    assert_ne!(first_id, second_id);
    assert!(!store.exists(first_id).await.unwrap());
    assert!(store.exists(second_id).await.unwrap());
}

#[tokio::test]
async fn lazily_loaded_handle_cannot_be_resaved() {
    let store = memory_store().await;
    let mut writer = LogHandle::for_log(store.clone(), sample_log("7777cccc"))
        .await
        .unwrap();
    let id = writer.save(false).await.unwrap();

    let mut lazy = LogHandle::open(store, id, true).await.unwrap();
    lazy.delete().await.unwrap();
    assert!(matches!(
        lazy.save(false).await.unwrap_err(),
        StoreError::IllegalAfterLazyLoad
    ));
}

#[tokio::test]
async fn unpersisted_handle_fails_reads_closed() {
    let store = memory_store().await;
    let mut handle = LogHandle::for_log(store, sample_log("6666dddd"))
        .await
        .unwrap();
    assert!(matches!(
        handle.get_dataset("imu", 0, false, true).await.unwrap_err(),
        StoreError::NotPersisted
    ));
    assert!(matches!(
        handle.load(false).await.unwrap_err(),
        StoreError::NotPersisted
    ));
    assert!(matches!(
        handle.delete().await.unwrap_err(),
        StoreError::NotPersisted
    ));
}

#[tokio::test]
async fn constructor_requires_exactly_one_source() {
    let store = memory_store().await;
    let log = sample_log("5555eeee");
    assert!(matches!(
        LogHandle::new(store.clone(), Some(log), Some(1), false)
            .await
            .unwrap_err(),
        StoreError::InvalidArguments(_)
    ));
    assert!(matches!(
        LogHandle::new(store, None, None, false).await.unwrap_err(),
        StoreError::InvalidArguments(_)
    ));
}

#[tokio::test]
async fn outdated_schema_version_blocks_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let config = StoreConfig::new(&path);
    let store = SqliteLogStore::open(&config).await.unwrap();
    drop(store);

    // Simulate a database written by an older engine.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(&path))
        .await
        .unwrap();
    sqlx::query("PRAGMA user_version = 0")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    match SqliteLogStore::open(&config).await.unwrap_err() {
        StoreError::SchemaVersionTooOld { found, expected } => {
            assert_eq!(found, 0);
            assert_eq!(expected, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn non_finite_parameter_values_survive_a_round_trip() {
    let store = memory_store().await;
    let mut log = sample_log("3333abcd");
    log.initial_params
        .insert("TRIM_ROLL".to_string(), ScalarValue::Real(f64::NAN));
    log.info.insert(
        "cal_offset".to_string(),
        InfoEntry {
            type_name: "float".to_string(),
            value: ScalarValue::Real(f64::INFINITY),
        },
    );
    log.multi_info.insert(
        "cal_series".to_string(),
        MultiInfoEntry {
            type_name: "float".to_string(),
            lists: vec![vec![
                ScalarValue::Real(f64::NEG_INFINITY),
                ScalarValue::Real(0.5),
            ]],
        },
    );
    log.changed_params.push(ChangedParameter {
        timestamp: 9_000,
        key: "TRIM_ROLL".to_string(),
        value: ScalarValue::Real(f64::NAN),
    });

    let mut handle = LogHandle::for_log(store.clone(), log).await.unwrap();
    let id = handle.save(false).await.unwrap();

    // NaN breaks element-wise equality, so check the values directly.
    let loaded = store.fetch_log(id, false).await.unwrap();
    assert!(matches!(
        loaded.initial_params["TRIM_ROLL"],
        ScalarValue::Real(x) if x.is_nan()
    ));
    assert!(matches!(
        loaded.info["cal_offset"].value,
        ScalarValue::Real(x) if x == f64::INFINITY
    ));
    assert!(matches!(
        loaded.multi_info["cal_series"].lists[0][0],
        ScalarValue::Real(x) if x == f64::NEG_INFINITY
    ));
    assert_eq!(
        loaded.multi_info["cal_series"].lists[0][1],
        ScalarValue::Real(0.5)
    );
    let last = loaded.changed_params.last().unwrap();
    assert_eq!(last.key, "TRIM_ROLL");
    assert!(matches!(last.value, ScalarValue::Real(x) if x.is_nan()));
}

#[tokio::test]
async fn append_json_writes_queryable_columns_with_null_for_non_finite() {
    let store = memory_store().await;
    let mut log = sample_log("4444ffff");
    // Inject a NaN into one float column.
    if let Some(data) = log.datasets[1].data.as_mut() {
        let mut values = vec![1.5f32; 100];
        values[3] = f32::NAN;
        data.insert("accel_z".to_string(), ValueArray::Float(values));
    }

    let mut handle = LogHandle::for_log(store.clone(), log).await.unwrap();
    handle.save(true).await.unwrap();

    let missing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fields WHERE value_json IS NULL")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(missing, 0);

    let json: String = sqlx::query_scalar(
        "SELECT f.value_json FROM fields f \
         JOIN datasets d ON f.dataset_id = d.id \
         WHERE d.name = 'imu' AND d.multi_id = 0 AND f.name = 'accel_z'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    // The queryable form maps each row's timestamp to the value.
    let values: std::collections::BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&json).unwrap();
    assert_eq!(values.len(), 100);
    assert!(values["1030"].is_null());
    assert_eq!(values["1000"], serde_json::json!(1.5));
}
