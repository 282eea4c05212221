//! On-disk cache of hook repositories
//!
//! Layout under the cache root:
//!
//! ```text
//! .lock              advisory lock held while the cache is written
//! index.redb         repos: "url@rev" -> CacheEntry (JSON)
//!                    configs: config path -> last use (unix seconds)
//! repos/<digest>/    checkout of url at rev
//! tmp/               clones in progress
//! ```
//!
//! Clones happen outside the lock; only moving a finished clone into place
//! and updating the index are serialized.

use crate::git::GitProvider;
use fs2::FileExt;
use hitch_core::{Error, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const REPOS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("repos");
const CONFIGS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("configs");

/// One cached checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Checkout directory
    pub path: PathBuf,
    /// Source identifier
    pub url: String,
    /// Pinned revision
    pub rev: String,
    /// Creation time (unix seconds)
    pub created: u64,
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn cache_key(url: &str, rev: &str) -> String {
    format!("{url}@{rev}")
}

fn checkout_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

fn db_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Cache(format!("{context}: {e}"))
}

/// Exclusive advisory lock on the cache, released on drop
pub struct CacheLock {
    file: File,
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "Failed to release cache lock");
        }
    }
}

/// Index of cached checkouts and of the configs that use them
struct CacheIndex {
    db: Database,
}

impl CacheIndex {
    fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| db_err("Failed to open cache index", e))?;
        Ok(Self { db })
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        let Ok(table) = read_txn.open_table(REPOS_TABLE) else {
            return Ok(None);
        };

        let value = table
            .get(key)
            .map_err(|e| db_err("Failed to read cache index", e))?;
        match value {
            Some(raw) => serde_json::from_str(raw.value())
                .map(Some)
                .map_err(|e| db_err("Corrupt cache entry", e)),
            None => Ok(None),
        }
    }

    fn entries(&self) -> Result<Vec<(String, CacheEntry)>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        let Ok(table) = read_txn.open_table(REPOS_TABLE) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for item in table
            .iter()
            .map_err(|e| db_err("Failed to read cache index", e))?
        {
            let (key, value) = item.map_err(|e| db_err("Failed to read cache index", e))?;
            match serde_json::from_str::<CacheEntry>(value.value()) {
                Ok(entry) => entries.push((key.value().to_string(), entry)),
                Err(e) => {
                    tracing::warn!(key = key.value(), error = %e, "Skipping corrupt cache entry");
                }
            }
        }
        Ok(entries)
    }

    fn configs(&self) -> Result<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        let Ok(table) = read_txn.open_table(CONFIGS_TABLE) else {
            return Ok(Vec::new());
        };

        let mut configs = Vec::new();
        for item in table
            .iter()
            .map_err(|e| db_err("Failed to read cache index", e))?
        {
            let (key, _) = item.map_err(|e| db_err("Failed to read cache index", e))?;
            configs.push(key.value().to_string());
        }
        Ok(configs)
    }

    fn insert(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let value = serde_json::to_string(entry).map_err(|e| db_err("Failed to encode entry", e))?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| db_err("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(REPOS_TABLE)
                .map_err(|e| db_err("Failed to open table", e))?;
            table
                .insert(key, value.as_str())
                .map_err(|e| db_err("Failed to insert entry", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| db_err("Failed to commit transaction", e))
    }

    fn touch_config(&self, config: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| db_err("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(CONFIGS_TABLE)
                .map_err(|e| db_err("Failed to open table", e))?;
            table
                .insert(config, now())
                .map_err(|e| db_err("Failed to insert config", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| db_err("Failed to commit transaction", e))
    }

    fn remove(&self, repos: &[String], configs: &[String]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| db_err("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(REPOS_TABLE)
                .map_err(|e| db_err("Failed to open table", e))?;
            for key in repos {
                table
                    .remove(key.as_str())
                    .map_err(|e| db_err("Failed to remove entry", e))?;
            }
            let mut table = write_txn
                .open_table(CONFIGS_TABLE)
                .map_err(|e| db_err("Failed to open table", e))?;
            for key in configs {
                table
                    .remove(key.as_str())
                    .map_err(|e| db_err("Failed to remove config", e))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| db_err("Failed to commit transaction", e))
    }
}

/// Hook repository cache rooted at a directory
#[derive(Debug, Clone)]
pub struct RepoCache {
    root: PathBuf,
}

impl RepoCache {
    /// Use `root` as the cache directory (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repos_dir(&self) -> PathBuf {
        self.root.join("repos")
    }

    /// Directory for transient files such as stashed patches
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Block until the cache lock is held
    pub fn lock(&self) -> Result<CacheLock> {
        fs::create_dir_all(&self.root)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(".lock"))?;
        file.lock_exclusive()
            .map_err(|e| Error::Cache(format!("Failed to lock cache: {e}")))?;
        Ok(CacheLock { file })
    }

    // Callers must hold the lock: redb refuses a second open of the same file.
    fn index(&self, _lock: &CacheLock) -> Result<CacheIndex> {
        CacheIndex::open(&self.root.join("index.redb"))
    }

    /// Checkout of `url` at `rev`, cloning it on first use
    ///
    /// # Errors
    ///
    /// Returns a resolution error when the clone or checkout fails
    #[tracing::instrument(skip(self, provider))]
    pub fn checkout(&self, url: &str, rev: &str, provider: &dyn GitProvider) -> Result<PathBuf> {
        let key = cache_key(url, rev);

        {
            let lock = self.lock()?;
            if let Some(entry) = self.index(&lock)?.get(&key)?
                && entry.path.is_dir()
            {
                tracing::debug!(path = %entry.path.display(), "Using cached checkout");
                return Ok(entry.path);
            }
        }

        fs::create_dir_all(self.scratch_dir())?;
        let staging = tempfile::Builder::new()
            .prefix("clone-")
            .tempdir_in(self.scratch_dir())?;
        let cloned = staging.path().join("repo");
        provider.clone_at(url, rev, &cloned)?;

        let lock = self.lock()?;
        let index = self.index(&lock)?;

        // Another process may have finished the same clone first
        if let Some(entry) = index.get(&key)?
            && entry.path.is_dir()
        {
            return Ok(entry.path);
        }

        let dest = self.repos_dir().join(checkout_name(&key));
        fs::create_dir_all(self.repos_dir())?;
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        fs::rename(&cloned, &dest)?;

        index.insert(
            &key,
            &CacheEntry {
                path: dest.clone(),
                url: url.to_string(),
                rev: rev.to_string(),
                created: now(),
            },
        )?;

        tracing::info!(url, rev, path = %dest.display(), "Cached hook repository");
        Ok(dest)
    }

    /// Remember that `config` uses this cache
    pub fn record_config(&self, config: &Path) -> Result<()> {
        let path = config.canonicalize().unwrap_or_else(|_| config.to_path_buf());
        let lock = self.lock()?;
        self.index(&lock)?.touch_config(&path.to_string_lossy())
    }

    /// Cached checkouts
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let lock = self.lock()?;
        Ok(self
            .index(&lock)?
            .entries()?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Delete the whole cache, returning whether anything was removed
    pub fn clean(&self) -> Result<bool> {
        if !self.root.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.root)?;
        tracing::info!(path = %self.root.display(), "Removed cache");
        Ok(true)
    }

    /// Remove checkouts not referenced by any recorded config
    ///
    /// `referenced` maps a config path to the `(url, rev)` pairs it uses, or
    /// `None` when the config no longer exists or cannot be read. Returns the
    /// number of checkouts removed.
    pub fn gc<F>(&self, referenced: F) -> Result<usize>
    where
        F: Fn(&Path) -> Option<Vec<(String, String)>>,
    {
        if !self.root.exists() {
            return Ok(0);
        }

        let lock = self.lock()?;
        let index = self.index(&lock)?;

        let mut live = HashSet::new();
        let mut dead_configs = Vec::new();
        for config in index.configs()? {
            match referenced(Path::new(&config)) {
                Some(pairs) => live.extend(pairs.iter().map(|(url, rev)| cache_key(url, rev))),
                None => dead_configs.push(config),
            }
        }

        let mut dead_repos = Vec::new();
        let mut kept_dirs = HashSet::new();
        for (key, entry) in index.entries()? {
            if live.contains(&key) {
                kept_dirs.insert(entry.path);
            } else {
                if entry.path.exists() {
                    fs::remove_dir_all(&entry.path)?;
                }
                tracing::debug!(key, "Collected unused checkout");
                dead_repos.push(key);
            }
        }

        // Directories left behind by interrupted runs
        let mut orphans = 0;
        if let Ok(dir) = fs::read_dir(self.repos_dir()) {
            for entry in dir.flatten() {
                let path = entry.path();
                if !kept_dirs.contains(&path) {
                    fs::remove_dir_all(&path)?;
                    orphans += 1;
                }
            }
        }
        if self.scratch_dir().exists() {
            fs::remove_dir_all(self.scratch_dir())?;
        }

        index.remove(&dead_repos, &dead_configs)?;
        let removed = dead_repos.len() + orphans;
        tracing::info!(removed, "Garbage collected cache");
        Ok(removed)
    }
}
