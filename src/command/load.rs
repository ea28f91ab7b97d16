//! Load command: restore a task's outputs from the cache
//!
//! Each output root is reconciled against the stored tree: files whose content
//! already matches are left alone, everything else is rewritten, and paths the
//! stored tree does not know about are deleted.

use crate::buffer::CopyBufferPool;
use crate::command::reconcile::{self, remove_path_if_exists, LoadStats};
use crate::error::CacheError;
use crate::origin::{OriginMetadata, OriginMetadataFactory};
use crate::snapshot::{OutputSnapshot, PropertySnapshots};
use crate::store::{CacheEntry, ContentStore};
use crate::types::{CacheKey, ContentHash, OutputPropertySpec, OutputType};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Restored outputs of a cache hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedOutputs {
    pub metadata: OriginMetadata,
    /// Property name -> snapshots of everything now on disk for it
    pub snapshots: BTreeMap<String, Vec<OutputSnapshot>>,
    pub stats: LoadStats,
}

/// Outcome of a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Miss,
    Hit(LoadedOutputs),
}

impl LoadOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, LoadOutcome::Hit(_))
    }

    /// Number of outgoing snapshots, or -1 for a miss
    pub fn artifact_entry_count(&self) -> i64 {
        match self {
            LoadOutcome::Miss => -1,
            LoadOutcome::Hit(loaded) => {
                loaded.snapshots.values().map(Vec::len).sum::<usize>() as i64
            }
        }
    }

    pub fn metadata(&self) -> Option<&OriginMetadata> {
        match self {
            LoadOutcome::Miss => None,
            LoadOutcome::Hit(loaded) => Some(&loaded.metadata),
        }
    }

    pub fn stats(&self) -> Option<&LoadStats> {
        match self {
            LoadOutcome::Miss => None,
            LoadOutcome::Hit(loaded) => Some(&loaded.stats),
        }
    }

    pub fn snapshots(&self, property: &str) -> Option<&[OutputSnapshot]> {
        match self {
            LoadOutcome::Miss => None,
            LoadOutcome::Hit(loaded) => loaded.snapshots.get(property).map(Vec::as_slice),
        }
    }
}

/// Loads the outputs stored under one cache key
pub struct LoadCommand {
    key: CacheKey,
    properties: Vec<OutputPropertySpec>,
    incoming: PropertySnapshots,
    store: Arc<dyn ContentStore>,
    origin: Arc<dyn OriginMetadataFactory>,
    buffers: Arc<CopyBufferPool>,
}

impl LoadCommand {
    pub(crate) fn new(
        key: CacheKey,
        properties: Vec<OutputPropertySpec>,
        incoming: PropertySnapshots,
        store: Arc<dyn ContentStore>,
        origin: Arc<dyn OriginMetadataFactory>,
        buffers: Arc<CopyBufferPool>,
    ) -> Self {
        Self {
            key,
            properties,
            incoming,
            store,
            origin,
            buffers,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    #[instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> Result<LoadOutcome, CacheError> {
        let start = Instant::now();
        let Some(entry) = self.store.get(self.key.hash())? else {
            info!("Cache miss");
            return Ok(LoadOutcome::Miss);
        };
        let result = match entry {
            CacheEntry::Result(result) => result,
            other => {
                return Err(CacheError::InvalidEntryType {
                    hash: *self.key.hash(),
                    expected: "result",
                    found: other.kind(),
                })
            }
        };

        let mut stats = LoadStats::default();
        let mut snapshots = BTreeMap::new();
        for property in &self.properties {
            let Some(root) = property.root.as_deref() else {
                debug!(property = %property.name, "Skipping output without a root");
                continue;
            };
            match result.outputs.get(&property.name) {
                None => {
                    stats.paths_deleted += remove_stale_root(&property.name, root);
                    snapshots.insert(property.name.clone(), Vec::new());
                }
                Some(hash) => {
                    let (outgoing, property_stats) = self.load_property(property, root, hash)?;
                    stats += property_stats;
                    snapshots.insert(property.name.clone(), outgoing);
                }
            }
        }

        let metadata = self.origin.read(&result.origin_metadata)?;
        info!(
            files_copied = stats.files_copied,
            bytes_copied = stats.bytes_copied,
            files_reused = stats.files_reused,
            paths_deleted = stats.paths_deleted,
            duration_ms = start.elapsed().as_millis(),
            "Loaded task outputs"
        );
        Ok(LoadOutcome::Hit(LoadedOutputs {
            metadata,
            snapshots,
            stats,
        }))
    }

    fn load_property(
        &self,
        property: &OutputPropertySpec,
        root: &Path,
        hash: &ContentHash,
    ) -> Result<(Vec<OutputSnapshot>, LoadStats), CacheError> {
        let mut incoming = self
            .incoming
            .get(&property.name)
            .cloned()
            .ok_or_else(|| CacheError::MissingIncomingSnapshots(property.name.clone()))?;

        if property.output_type == OutputType::File {
            if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
            }
        }

        let mut outgoing = Vec::new();
        let mut buffer = self.buffers.checkout();
        let mut stats = reconcile::reconcile(
            self.store.as_ref(),
            &mut buffer,
            hash,
            root,
            None,
            &mut incoming,
            &mut outgoing,
        )?;

        // Stale paths; a parent sorts before its children, so removing it
        // leaves nothing for the children to do.
        for stale in incoming.keys() {
            if remove_path_if_exists(stale).map_err(|e| CacheError::io(stale, e))? {
                debug!(path = %stale.display(), "Deleted stale output");
                stats.paths_deleted += 1;
            }
        }

        debug!(
            property = %property.name,
            hash = %hash,
            snapshots = outgoing.len(),
            "Loaded output property"
        );
        Ok((outgoing, stats))
    }
}

/// Best-effort removal of an output the original execution did not produce.
fn remove_stale_root(property: &str, root: &Path) -> u64 {
    match remove_path_if_exists(root) {
        Ok(true) => {
            debug!(
                property = %property,
                root = %root.display(),
                "Deleted output with no cached content"
            );
            1
        }
        Ok(false) => 0,
        Err(e) => {
            warn!(
                property = %property,
                root = %root.display(),
                error = %e,
                "Failed to delete output root"
            );
            0
        }
    }
}
