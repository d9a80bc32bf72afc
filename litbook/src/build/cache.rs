//! Incremental build cache.
//!
//! Records, per document that compiled successfully, the hash of its
//! source, the hash of the build fingerprint and the hash of the output it
//! wrote. A document is fresh when all three still match.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const CACHE_FILE_NAME: &str = ".litbook-cache.json";

/// Bumped whenever the cache layout changes.
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_hash: String,
    pub fingerprint: String,
    pub output_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCache {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for BuildCache {
    fn default() -> Self {
        BuildCache {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl BuildCache {
    pub fn path(output_root: &Path) -> PathBuf {
        output_root.join(CACHE_FILE_NAME)
    }

    /// Load the cache, falling back to an empty one when it is missing,
    /// unreadable or from another cache version.
    pub fn load(output_root: &Path) -> Self {
        let path = Self::path(output_root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => {
                debug!(path = %path.display(), "no build cache");
                return BuildCache::default();
            }
        };
        match serde_json::from_str::<BuildCache>(&text) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            Ok(cache) => {
                warn!(found = cache.version, expected = CACHE_VERSION, "ignoring build cache from another version");
                BuildCache::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt build cache");
                BuildCache::default()
            }
        }
    }

    pub fn save(&self, output_root: &Path) -> Result<()> {
        let path = Self::path(output_root);
        std::fs::create_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| Error::io(&path, e))
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Keep only the entries whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    /// True when `key` compiled before from the same source under the same
    /// fingerprint and its output file is still what was written.
    pub fn is_fresh(
        &self,
        key: &str,
        source_hash: &str,
        fingerprint: &str,
        output_path: &Path,
    ) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        if entry.source_hash != source_hash || entry.fingerprint != fingerprint {
            return false;
        }
        match std::fs::read(output_path) {
            Ok(bytes) => sha256_hex(&bytes) == entry.output_hash,
            Err(_) => false,
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
