//! Content-addressed on-disk cache tier backing a [`TtlMap`]. SPEC_FULL §4.2.

use crate::cache::ttl_map::TtlMap;
use crate::clock::{system_clock, SharedClock};
use crate::errors::CacheError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;
const RETENTION: Duration = Duration::days(30);
const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
const REAP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Memory,
    Disk,
    Miss,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    value: Value,
    expiration: DateTime<Utc>,
    cached_at: DateTime<Utc>,
}

pub struct DiskTier {
    memory: TtlMap,
    dir: Option<PathBuf>,
    default_ttl: Duration,
    clock: SharedClock,
}

impl DiskTier {
    /// `dir = None` disables the disk half entirely; `Lookup` never reports a
    /// disk hit and `Set` only ever writes to memory.
    pub fn new(dir: Option<PathBuf>, default_ttl: Duration) -> Result<Self, CacheError> {
        Self::with_clock(dir, default_ttl, system_clock())
    }

    pub fn with_clock(
        dir: Option<PathBuf>,
        default_ttl: Duration,
        clock: SharedClock,
    ) -> Result<Self, CacheError> {
        if let Some(d) = &dir {
            if d.is_relative() {
                return Err(CacheError::RelativeDirectory(d.clone()));
            }
            fs::create_dir_all(d)?;
            #[cfg(unix)]
            fs::set_permissions(d, fs::Permissions::from_mode(DIR_MODE))?;
        }
        Ok(Self {
            memory: TtlMap::with_clock(default_ttl, clock.clone()),
            dir,
            default_ttl,
            clock,
        })
    }

    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn cache_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.json", Self::cache_key(key)))
    }

    pub fn lookup(&self, key: &str) -> (Option<Value>, Hit) {
        if let Some(value) = self.memory.get(key) {
            return (Some(value), Hit::Memory);
        }

        let Some(dir) = &self.dir else {
            return (None, Hit::Miss);
        };

        let path = self.path_for(dir, key);
        let raw = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return (None, Hit::Miss),
        };

        let envelope: Envelope = match serde_json::from_slice(&raw) {
            Ok(e) => e,
            Err(_) => {
                let _ = fs::remove_file(&path);
                return (None, Hit::Miss);
            }
        };

        let now = self.clock.now();
        if now > envelope.expiration {
            let _ = fs::remove_file(&path);
            return (None, Hit::Miss);
        }

        let residual = envelope.expiration - now;
        if residual > Duration::zero() {
            self.memory.set_with_ttl(key, envelope.value.clone(), residual);
        }

        (Some(envelope.value), Hit::Disk)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self.lookup(key) {
            (value, Hit::Memory) | (value, Hit::Disk) => value,
            (_, Hit::Miss) => None,
        }
    }

    pub fn set(&self, key: &str, value: Value) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        self.memory.set_with_ttl(key, value.clone(), ttl);

        let Some(dir) = &self.dir else { return };

        let now = self.clock.now();
        let envelope = Envelope {
            value,
            expiration: now + ttl,
            cached_at: now,
        };

        let serialized = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to marshal cache envelope, memory copy retained");
                return;
            }
        };

        if let Err(e) = write_atomic(&self.path_for(dir, key), &serialized) {
            tracing::warn!(error = %e, key, "disk cache write failed");
        }
    }

    /// Deletes on-disk `.json` files whose mtime is older than the 30-day
    /// retention window. Intended to be driven by an hourly background task.
    pub fn reap(&self) -> usize {
        let Some(dir) = &self.dir else { return 0 };
        let now = self.clock.now();
        let mut removed = 0;

        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "disk cache reaper could not list directory");
                return 0;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified: DateTime<Utc> = match metadata.modified() {
                Ok(t) => t.into(),
                Err(_) => continue,
            };
            if now - modified > RETENTION {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(error = %e, path = %path.display(), "reaper failed to remove file"),
                }
            }
        }

        removed
    }

    /// Spawns a background task that sweeps the in-memory tier every 5
    /// minutes (§4.1) and reaps expired on-disk entries hourly (§4.2). The
    /// task holds a clone of `self` and stops the moment the returned
    /// [`MaintenanceHandle`] is dropped — no unbounded-lifetime task outlives
    /// the cache that owns it.
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let tier = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut sweep_tick = tokio::time::interval(SWEEP_INTERVAL);
            let mut reap_tick = tokio::time::interval(REAP_INTERVAL);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = sweep_tick.tick() => {
                        let removed = tier.memory.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "ttl map sweep");
                        }
                    }
                    _ = reap_tick.tick() => {
                        let removed = tier.reap();
                        if removed > 0 {
                            tracing::debug!(removed, "disk cache reap");
                        }
                    }
                }
            }
        });

        MaintenanceHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Owns the background sweep/reap task spawned by [`DiskTier::spawn_maintenance`].
/// Dropping the handle cancels the task; there is no way to detach it, so a
/// `DiskTier`'s maintenance task can never outlive the component that
/// started it.
pub struct MaintenanceHandle {
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let write_result = (|| {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    match write_result {
        Ok(()) => fs::rename(&tmp_path, path),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn given_disabled_tier_when_set_then_no_disk_hit_after_memory_clear() {
        let tier = DiskTier::new(None, Duration::hours(1)).unwrap();
        tier.set("k", json!("v"));
        assert!(!tier.enabled());
        assert_eq!(tier.get("k"), Some(json!("v")));
    }

    #[test]
    fn given_relative_dir_when_constructing_then_rejected() {
        let result = DiskTier::new(Some(PathBuf::from("relative")), Duration::hours(1));
        assert!(matches!(result, Err(CacheError::RelativeDirectory(_))));
    }

    #[test]
    fn given_value_on_disk_when_memory_cleared_then_restored_with_residual_ttl() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tier =
            DiskTier::with_clock(Some(tmp.path().to_path_buf()), Duration::hours(1), clock.clone())
                .unwrap();
        tier.set("k", json!({"a": 1}));

        let fresh = DiskTier::with_clock(
            Some(tmp.path().to_path_buf()),
            Duration::hours(1),
            clock.clone(),
        )
        .unwrap();
        let (value, hit) = fresh.lookup("k");
        assert_eq!(hit, Hit::Disk);
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn given_corrupt_file_when_lookup_then_removed_and_miss() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::new(Some(tmp.path().to_path_buf()), Duration::hours(1)).unwrap();
        let path = tmp.path().join(format!("{}.json", DiskTier::cache_key("k")));
        fs::write(&path, b"not json").unwrap();

        let (value, hit) = tier.lookup("k");
        assert_eq!(hit, Hit::Miss);
        assert_eq!(value, None);
        assert!(!path.exists());
    }

    #[test]
    fn given_expired_disk_entry_when_lookup_then_removed_and_miss() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tier = DiskTier::with_clock(
            Some(tmp.path().to_path_buf()),
            Duration::milliseconds(10),
            clock.clone(),
        )
        .unwrap();
        tier.set("k", json!("v"));
        clock.advance(Duration::milliseconds(50));

        let path = tmp.path().join(format!("{}.json", DiskTier::cache_key("k")));
        let (value, hit) = tier.lookup("k");
        assert_eq!(hit, Hit::Miss);
        assert_eq!(value, None);
        assert!(!path.exists());
    }

    #[test]
    fn given_cache_key_when_called_twice_then_deterministic_and_hex() {
        let a = DiskTier::cache_key("same-input");
        let b = DiskTier::cache_key("same-input");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn given_old_file_when_reap_then_removed() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tier = DiskTier::with_clock(
            Some(tmp.path().to_path_buf()),
            Duration::hours(1),
            clock.clone(),
        )
        .unwrap();
        tier.set("old", json!("v"));

        let path = tmp.path().join(format!("{}.json", DiskTier::cache_key("old")));
        let old_time = std::time::SystemTime::now() - std::time::Duration::from_secs(31 * 24 * 3600);
        let old_file = fs::File::open(&path).unwrap();
        old_file.set_modified(old_time).unwrap();

        let removed = tier.reap();
        assert_eq!(removed, 1);
        assert!(!path.exists());
    }
}
