//! Persistent cache of classpath entry listings.
//!
//! Uses LMDB (via heed) to keep the class names found in each directory,
//! archive or class list keyed by canonical path. A stored listing stays valid
//! while the modification time of its path is unchanged, so boot classpath
//! archives are only opened once across editor sessions.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const LISTINGS_DB: &str = "listings";

const DEFAULT_MAP_SIZE: usize = 512 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug, Serialize, Deserialize)]
struct ListingRow {
    mtime: u64,
    classes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListingCache {
    env: Arc<Env>,
    db_path: PathBuf,
    listings: StrDb,
}

impl ListingCache {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = Arc::new(open_env(&db_path)?);
        let mut wtxn = env.write_txn()?;
        let listings = env.create_database::<Str, Str>(&mut wtxn, Some(LISTINGS_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            listings,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the stored listing for `path` unless the path changed since.
    pub fn get(&self, path: &Path) -> Result<Option<Vec<String>>> {
        let key = cache_key(path);
        let rtxn = self.env.read_txn()?;
        let Some(raw) = self.listings.get(&rtxn, key.as_str())? else {
            return Ok(None);
        };
        let Ok(row) = serde_json::from_str::<ListingRow>(raw) else {
            debug!(key = %key, "discarding unreadable cached listing");
            return Ok(None);
        };
        if row.mtime != modified_nanos(path) {
            debug!(key = %key, "cached listing is stale");
            return Ok(None);
        }
        Ok(Some(row.classes))
    }

    pub fn put(&self, path: &Path, classes: &[String]) -> Result<()> {
        let key = cache_key(path);
        let row = ListingRow {
            mtime: modified_nanos(path),
            classes: classes.to_vec(),
        };
        let payload = serde_json::to_string(&row)?;
        let mut wtxn = self.env.write_txn()?;
        self.listings.put(&mut wtxn, key.as_str(), payload.as_str())?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let rtxn = self.env.read_txn()?;
        let mut cached_listings = 0u64;
        let mut cached_classes = 0u64;
        for item in self.listings.iter(&rtxn)? {
            let (_, v) = item?;
            cached_listings += 1;
            if let Ok(row) = serde_json::from_str::<ListingRow>(v) {
                cached_classes += row.classes.len() as u64;
            }
        }
        Ok(CacheStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            cached_listings,
            cached_classes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub db_path: String,
    pub cached_listings: u64,
    pub cached_classes: u64,
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: We do not use NO_LOCK and keep default LMDB locking guarantees.
    // NO_SUB_DIR keeps the database a single file at the --db path.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open db env: {}", db_path.display()))
    }
}

fn cache_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

fn modified_nanos(path: &Path) -> u64 {
    let mtime = path
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

pub fn lmdb_lock_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push("-lock");
    PathBuf::from(os)
}
