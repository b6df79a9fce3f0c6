//! DiskTier atomicity and restore behavior against a real temp directory.
//! SPEC_FULL §8 scenarios S1-S4.

use chrono::Duration;
use reviewer_core::cache::disk_tier::{DiskTier, Hit};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn given_value_set_then_memory_cleared_when_looked_up_then_restored_from_disk() {
    let tmp = TempDir::new().unwrap();
    let tier = DiskTier::new(Some(tmp.path().to_path_buf()), Duration::hours(1)).unwrap();
    tier.set("k", json!("v"));

    // Simulate process restart: a fresh DiskTier over the same directory has
    // an empty memory tier.
    let restarted = DiskTier::new(Some(tmp.path().to_path_buf()), Duration::hours(1)).unwrap();
    let (value, hit) = restarted.lookup("k");
    assert_eq!(hit, Hit::Disk);
    assert_eq!(value, Some(json!("v")));

    let (value, hit) = restarted.lookup("k");
    assert_eq!(hit, Hit::Memory);
    assert_eq!(value, Some(json!("v")));
}

#[test]
fn given_repeated_overwrites_of_same_key_when_writing_then_directory_stays_clean() {
    let tmp = TempDir::new().unwrap();
    let tier = DiskTier::new(Some(tmp.path().to_path_buf()), Duration::hours(1)).unwrap();

    for i in 0..100 {
        tier.set("k", json!(i));
    }

    let mut json_files = 0;
    let mut tmp_files = 0;
    for entry in std::fs::read_dir(tmp.path()).unwrap() {
        let path = entry.unwrap().path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => json_files += 1,
            Some("tmp") => tmp_files += 1,
            _ => {}
        }
    }

    assert_eq!(json_files, 1);
    assert_eq!(tmp_files, 0);

    let value = tier.get("k").unwrap();
    let n = value.as_i64().unwrap();
    assert!((90..=99).contains(&n));
}

#[test]
fn given_no_cache_dir_when_constructing_then_disk_tier_disabled() {
    let tier = DiskTier::new(None, Duration::hours(1)).unwrap();
    assert!(!tier.enabled());
    tier.set("k", json!("v"));
    assert_eq!(tier.get("k"), Some(json!("v")));
}
