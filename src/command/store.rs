//! Store command: persist a task's outputs under its cache key

use crate::error::CacheError;
use crate::origin::OriginMetadataFactory;
use crate::snapshot::{ContentSnapshot, PropertySnapshots, SnapshotMap};
use crate::store::{ContentStore, ResultEntry};
use crate::tree::DirectoryTreeBuilder;
use crate::types::{CacheKey, ContentHash, OutputPropertySpec, OutputType, TaskIdentity};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Outcome of a successful store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResult {
    /// File artifacts written or referenced by the stored entry
    pub artifact_entry_count: u64,
}

/// Stores the outputs of one execution. The filesystem is only read.
pub struct StoreCommand {
    key: CacheKey,
    properties: Vec<OutputPropertySpec>,
    outputs: PropertySnapshots,
    task: TaskIdentity,
    execution_time: Duration,
    store: Arc<dyn ContentStore>,
    origin: Arc<dyn OriginMetadataFactory>,
}

impl StoreCommand {
    pub(crate) fn new(
        key: CacheKey,
        properties: Vec<OutputPropertySpec>,
        outputs: PropertySnapshots,
        task: TaskIdentity,
        execution_time: Duration,
        store: Arc<dyn ContentStore>,
        origin: Arc<dyn OriginMetadataFactory>,
    ) -> Self {
        Self {
            key,
            properties,
            outputs,
            task,
            execution_time,
            store,
            origin,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    #[instrument(skip(self), fields(key = %self.key, task = %self.task.path))]
    pub fn store(&self) -> Result<StoreResult, CacheError> {
        let start = Instant::now();
        let mut outputs = BTreeMap::new();
        let mut artifact_entry_count = 0u64;

        for property in &self.properties {
            let Some(root) = property.root.as_deref() else {
                debug!(property = %property.name, "Skipping output without a root");
                continue;
            };
            let snapshots = self
                .outputs
                .get(&property.name)
                .ok_or_else(|| CacheError::MissingOutputSnapshots(property.name.clone()))?;

            if let Some((hash, artifacts)) = self.store_property(property, root, snapshots)? {
                outputs.insert(property.name.clone(), hash);
                artifact_entry_count += artifacts;
            }
        }

        let origin_metadata = self.origin.write(&self.task, self.execution_time)?;
        let result = ResultEntry {
            outputs,
            origin_metadata,
        };
        self.store.put_result(self.key.hash(), &result)?;

        info!(
            outputs = result.outputs.len(),
            artifact_entry_count,
            duration_ms = start.elapsed().as_millis(),
            "Stored task outputs"
        );
        Ok(StoreResult {
            artifact_entry_count,
        })
    }

    /// Store one property. `None` when it produced no output.
    ///
    /// Only file properties count as artifacts; a directory contributes its
    /// manifest hash and nothing to the count.
    fn store_property(
        &self,
        property: &OutputPropertySpec,
        root: &Path,
        snapshots: &SnapshotMap,
    ) -> Result<Option<(ContentHash, u64)>, CacheError> {
        if snapshots.values().all(ContentSnapshot::is_missing) {
            debug!(property = %property.name, "Output produced nothing, recording no hash");
            return Ok(None);
        }

        match property.output_type {
            OutputType::Directory => {
                if let Some(snapshot) = snapshots.get(root) {
                    if !snapshot.is_directory() {
                        return Err(CacheError::InvalidSnapshot {
                            path: root.to_path_buf(),
                            reason: format!(
                                "directory output '{}' is not a directory",
                                property.name
                            ),
                        });
                    }
                }
                let builder = DirectoryTreeBuilder::from_snapshots(root, snapshots)?;
                let committed = builder.commit(self.store.as_ref())?;
                debug!(
                    property = %property.name,
                    hash = %committed.root_hash,
                    files = committed.file_count,
                    "Stored directory output"
                );
                Ok(Some((committed.root_hash, 0)))
            }
            OutputType::File => {
                if snapshots.len() != 1 {
                    return Err(CacheError::UnexpectedSnapshotCount {
                        property: property.name.clone(),
                        count: snapshots.len(),
                    });
                }
                let Some((path, snapshot)) = snapshots.iter().next() else {
                    return Ok(None);
                };
                let Some(content_hash) = snapshot.content_hash() else {
                    return Err(CacheError::InvalidSnapshot {
                        path: path.clone(),
                        reason: format!("file output '{}' is not a regular file", property.name),
                    });
                };
                self.store.put_file(&content_hash, path)?;
                debug!(property = %property.name, hash = %content_hash, "Stored file output");
                Ok(Some((content_hash, 1)))
            }
        }
    }
}
