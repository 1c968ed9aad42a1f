//! Tests for Engine::merge
//!
//! These tests verify:
//! - Merge keeps exactly the live keys with their newest values
//! - The log shrinks and survives reopen
//! - Writes after (and during) a merge are not lost
//! - A failed merge changes nothing
//! - Timestamp policy for rewritten records

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use caskkv::config::{Config, MergeTimestamps};
use caskkv::engine::Engine;
use caskkv::log::{LogReader, LogRecord, LogWriter, PositionedRecord};
use caskkv::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("cask.db")
}

fn read_log(path: &Path) -> Vec<PositionedRecord> {
    LogReader::open(path)
        .unwrap()
        .records()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Log with a stale overwrite and a deleted key
fn setup_merge_candidate() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(&db_path(&temp_dir)).unwrap();

    engine.set(b"a", b"1").unwrap();
    engine.set(b"a", b"2").unwrap();
    engine.set(b"b", b"x").unwrap();
    engine.delete(b"b").unwrap();

    (temp_dir, engine)
}

// =============================================================================
// Basic Merge Tests
// =============================================================================

#[test]
fn test_merge_keeps_live_keys() {
    let (_temp, engine) = setup_merge_candidate();

    engine.merge().unwrap();

    assert_eq!(engine.get(b"a").unwrap(), b"2".to_vec());
    assert!(matches!(engine.get(b"b"), Err(CaskError::KeyNotFound)));
    assert_eq!(engine.key_count(), 1);
}

#[test]
fn test_merge_shrinks_log() {
    let (_temp, engine) = setup_merge_candidate();
    let before = engine.log_size().unwrap();

    engine.merge().unwrap();

    let after = engine.log_size().unwrap();
    assert!(after < before, "merge did not shrink log: {} -> {}", before, after);
    assert_eq!(after, LogRecord::with_timestamp("a", "2", 0).encoded_len());
    assert_eq!(fs::metadata(engine.path()).unwrap().len(), after);
}

#[test]
fn test_merge_log_contains_one_record_per_key() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    let engine = Engine::open_path(&path).unwrap();

    for round in 0..5 {
        for i in 0..10 {
            engine
                .set(format!("key{}", i).as_bytes(), format!("v{}_{}", i, round).as_bytes())
                .unwrap();
        }
    }
    engine.delete(b"key3").unwrap();

    engine.merge().unwrap();

    let records = read_log(&path);
    assert_eq!(records.len(), 9);
    assert!(records.iter().all(|r| !r.record.is_tombstone()));
    assert!(records.iter().all(|r| r.record.key != b"key3".to_vec()));
    for i in (0..10).filter(|i| *i != 3) {
        let value = engine.get(format!("key{}", i).as_bytes()).unwrap();
        assert_eq!(value, format!("v{}_4", i).into_bytes());
    }
}

#[test]
fn test_merge_removes_merge_file() {
    let (temp, engine) = setup_merge_candidate();

    engine.merge().unwrap();

    let merge_path = engine.config().merge_path();
    assert!(!merge_path.exists());
    assert!(db_path(&temp).exists());
}

#[test]
fn test_merge_empty_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(&db_path(&temp_dir)).unwrap();

    engine.merge().unwrap();

    assert_eq!(engine.log_size().unwrap(), 0);
    assert_eq!(engine.key_count(), 0);
}

#[test]
fn test_merge_all_keys_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(&db_path(&temp_dir)).unwrap();
    engine.set(b"a", b"1").unwrap();
    engine.delete(b"a").unwrap();

    engine.merge().unwrap();

    assert_eq!(engine.log_size().unwrap(), 0);
    assert!(matches!(engine.get(b"a"), Err(CaskError::KeyNotFound)));
}

#[test]
fn test_merge_twice_is_stable() {
    let (_temp, engine) = setup_merge_candidate();

    engine.merge().unwrap();
    let first = fs::read(engine.path()).unwrap();
    engine.merge().unwrap();
    let second = fs::read(engine.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.get(b"a").unwrap(), b"2".to_vec());
}

// =============================================================================
// Merge + Reopen / Writes Tests
// =============================================================================

#[test]
fn test_merge_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);

    {
        let engine = Engine::open_path(&path).unwrap();
        engine.set(b"a", b"1").unwrap();
        engine.set(b"a", b"2").unwrap();
        engine.set(b"b", b"x").unwrap();
        engine.delete(b"b").unwrap();
        engine.merge().unwrap();
    }

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), b"2".to_vec());
    assert!(matches!(engine.get(b"b"), Err(CaskError::KeyNotFound)));
}

#[test]
fn test_writes_after_merge() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);

    {
        let engine = Engine::open_path(&path).unwrap();
        engine.set(b"a", b"1").unwrap();
        engine.set(b"a", b"2").unwrap();
        engine.merge().unwrap();

        engine.set(b"c", b"3").unwrap();
        engine.set(b"a", b"4").unwrap();
        engine.delete(b"c").unwrap();
        engine.set(b"d", b"5").unwrap();

        assert_eq!(engine.get(b"a").unwrap(), b"4".to_vec());
        assert_eq!(engine.get(b"d").unwrap(), b"5".to_vec());
    }

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), b"4".to_vec());
    assert_eq!(engine.get(b"d").unwrap(), b"5".to_vec());
    assert!(matches!(engine.get(b"c"), Err(CaskError::KeyNotFound)));
    assert_eq!(read_log(&path).len(), 5);
}

#[test]
fn test_failed_merge_leaves_engine_untouched() {
    let (_temp, engine) = setup_merge_candidate();
    let before = fs::read(engine.path()).unwrap();

    // Merge cannot create its output file
    let merge_path = engine.config().merge_path();
    fs::create_dir(&merge_path).unwrap();

    assert!(matches!(engine.merge(), Err(CaskError::Io(_))));

    assert_eq!(fs::read(engine.path()).unwrap(), before);
    assert_eq!(engine.get(b"a").unwrap(), b"2".to_vec());
    assert!(matches!(engine.get(b"b"), Err(CaskError::KeyNotFound)));

    engine.set(b"c", b"3").unwrap();
    assert_eq!(engine.get(b"c").unwrap(), b"3".to_vec());

    // Once the obstruction is gone, merge goes through
    fs::remove_dir(&merge_path).unwrap();
    engine.merge().unwrap();
    assert_eq!(engine.get(b"a").unwrap(), b"2".to_vec());
    assert_eq!(engine.get(b"c").unwrap(), b"3".to_vec());
    assert_eq!(engine.key_count(), 2);
}

#[test]
fn test_merge_after_close_fails() {
    let (_temp, engine) = setup_merge_candidate();
    engine.close().unwrap();

    assert!(matches!(engine.merge(), Err(CaskError::EngineClosed)));
}

// =============================================================================
// Timestamp Policy Tests
// =============================================================================

fn write_old_log(path: &Path) {
    let mut writer = LogWriter::open(path, 0).unwrap();
    writer.append(&LogRecord::with_timestamp("k", "old", 5)).unwrap();
    writer.append(&LogRecord::with_timestamp("k", "new", 6)).unwrap();
}

#[test]
fn test_merge_preserves_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    write_old_log(&path);

    let engine = Engine::open(Config::builder().path(&path).build()).unwrap();
    engine.merge().unwrap();

    let records = read_log(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.timestamp, 6);
    assert_eq!(records[0].record.value, b"new".to_vec());
}

#[test]
fn test_merge_refreshes_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    write_old_log(&path);

    let config = Config::builder()
        .path(&path)
        .merge_timestamps(MergeTimestamps::Refresh)
        .build();
    let engine = Engine::open(config).unwrap();
    let before = caskkv::log::now();
    engine.merge().unwrap();

    let records = read_log(&path);
    assert_eq!(records.len(), 1);
    assert!(records[0].record.timestamp >= before);
    assert_eq!(engine.get(b"k").unwrap(), b"new".to_vec());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_merge_concurrent_with_writes() {
    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);
    let engine = Arc::new(Engine::open_path(&path).unwrap());

    for i in 0..50 {
        engine.set(format!("seed{}", i).as_bytes(), b"old").unwrap();
        engine.set(format!("seed{}", i).as_bytes(), b"seed").unwrap();
    }

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..200 {
                engine
                    .set(format!("live{}", i).as_bytes(), format!("value{}", i).as_bytes())
                    .unwrap();
            }
        })
    };

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..20 {
                for i in 0..50 {
                    assert_eq!(engine.get(format!("seed{}", i).as_bytes()).unwrap(), b"seed".to_vec());
                }
            }
        })
    };

    for _ in 0..5 {
        engine.merge().unwrap();
    }

    writer.join().unwrap();
    reader.join().unwrap();

    let check = |engine: &Engine| {
        assert_eq!(engine.key_count(), 250);
        for i in 0..200 {
            let value = engine.get(format!("live{}", i).as_bytes()).unwrap();
            assert_eq!(value, format!("value{}", i).into_bytes());
        }
    };

    check(&engine);
    drop(engine);
    check(&Engine::open_path(&path).unwrap());
}
