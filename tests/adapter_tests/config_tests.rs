//! Tests for properties parsing and typed configuration

use std::fs;

use tempfile::TempDir;

use btreedb::config::{
    WalSyncStrategy, DEFAULT_FIELD_COUNT, DEFAULT_POOL_SIZE, DEFAULT_WAL_SYNC_EVERY,
    PROP_DB_PATH, PROP_FIELD_COUNT, PROP_POOL_SIZE, PROP_WAL_SYNC,
};
use btreedb::{BTreeDbError, Config, Properties};

#[test]
fn test_defaults() {
    let config = Config::from_properties(&Properties::new()).unwrap();

    assert!(config.db_path.is_none());
    assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    assert_eq!(config.pool_size, 134_217_728);
    assert_eq!(config.field_count, DEFAULT_FIELD_COUNT);
    assert_eq!(
        config.wal_sync_strategy,
        WalSyncStrategy::EveryNEntries {
            count: DEFAULT_WAL_SYNC_EVERY
        }
    );
}

#[test]
fn test_from_properties() {
    let mut props = Properties::new();
    props.set(PROP_DB_PATH, "/tmp/btree");
    props.set(PROP_POOL_SIZE, "8192");
    props.set(PROP_FIELD_COUNT, "3");
    props.set(PROP_WAL_SYNC, "always");

    let config = Config::from_properties(&props).unwrap();
    assert_eq!(config.db_path.as_deref(), Some(std::path::Path::new("/tmp/btree")));
    assert_eq!(config.pool_size, 8192);
    assert_eq!(config.field_count, 3);
    assert_eq!(config.wal_sync_strategy, WalSyncStrategy::EveryWrite);
}

#[test]
fn test_empty_path_counts_as_missing() {
    let mut props = Properties::new();
    props.set(PROP_DB_PATH, "");

    let config = Config::from_properties(&props).unwrap();
    assert!(config.db_path.is_none());
}

#[test]
fn test_invalid_numbers_are_config_errors() {
    let mut props = Properties::new();
    props.set(PROP_POOL_SIZE, "lots");
    assert!(matches!(
        Config::from_properties(&props).unwrap_err(),
        BTreeDbError::Config(_)
    ));

    let mut props = Properties::new();
    props.set(PROP_FIELD_COUNT, "-1");
    assert!(matches!(
        Config::from_properties(&props).unwrap_err(),
        BTreeDbError::Config(_)
    ));
}

#[test]
fn test_wal_sync_parsing() {
    assert_eq!("always".parse(), Ok(WalSyncStrategy::EveryWrite));
    assert_eq!("ALWAYS".parse(), Ok(WalSyncStrategy::EveryWrite));
    assert_eq!("1".parse(), Ok(WalSyncStrategy::EveryWrite));
    assert_eq!(
        "64".parse(),
        Ok(WalSyncStrategy::EveryNEntries { count: 64 })
    );
    assert!("0".parse::<WalSyncStrategy>().is_err());
    assert!("sometimes".parse::<WalSyncStrategy>().is_err());
}

#[test]
fn test_properties_text() {
    let mut props = Properties::new();
    props
        .merge_str(
            "# workload\n\
             ! also a comment\n\
             \n\
             btree.dbname = /data/db \n\
             fieldcount=4\n\
             readproportion=0.5=x\n",
        )
        .unwrap();

    assert_eq!(props.len(), 3);
    assert_eq!(props.get(PROP_DB_PATH), Some("/data/db"));
    assert_eq!(props.get(PROP_FIELD_COUNT), Some("4"));
    // only the first `=` separates key and value
    assert_eq!(props.get("readproportion"), Some("0.5=x"));
    assert_eq!(props.get_or("missing", "fallback"), "fallback");
}

#[test]
fn test_properties_reject_lines_without_separator() {
    let mut props = Properties::new();
    let err = props.merge_str("ok=1\nbroken\n").unwrap_err();
    assert!(matches!(err, BTreeDbError::Config(msg) if msg.contains("line 2")));

    assert!(props.set_pair("novalue").is_err());
}

#[test]
fn test_overrides_replace_loaded_values() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("workload.properties");
    fs::write(&path, "fieldcount=10\nbtree.pool_size=4096\n").unwrap();

    let mut props = Properties::load(&path).unwrap();
    props.set_pair("fieldcount=2").unwrap();

    let config = Config::from_properties(&props).unwrap();
    assert_eq!(config.field_count, 2);
    assert_eq!(config.pool_size, 4096);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = Properties::load(&temp.path().join("nope.properties")).unwrap_err();
    assert!(matches!(err, BTreeDbError::Io(_)));
}

#[test]
fn test_builder() {
    let config = Config::builder()
        .db_path("/srv/btree")
        .pool_size(1 << 20)
        .field_count(5)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();

    assert!(config.db_path.is_some());
    assert_eq!(config.pool_size, 1 << 20);
    assert_eq!(config.field_count, 5);
    assert_eq!(config.wal_sync_strategy, WalSyncStrategy::EveryWrite);
}
