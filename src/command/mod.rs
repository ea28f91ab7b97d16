//! Store and load commands
//!
//! A [`CacheCommandFactory`] holds the collaborators shared by every command
//! (content store, origin metadata codec, copy buffer pool) and hands out one
//! command object per task execution. Commands own their inputs, run once, and
//! report what they did through their return values.

pub mod load;
pub mod reconcile;
pub mod store;

pub use load::{LoadCommand, LoadOutcome, LoadedOutputs};
pub use reconcile::LoadStats;
pub use store::{StoreCommand, StoreResult};

use crate::buffer::CopyBufferPool;
use crate::origin::OriginMetadataFactory;
use crate::snapshot::PropertySnapshots;
use crate::store::ContentStore;
use crate::types::{CacheKey, OutputPropertySpec, TaskIdentity};
use std::sync::Arc;
use std::time::Duration;

/// Creates [`StoreCommand`]s and [`LoadCommand`]s over one store
#[derive(Clone)]
pub struct CacheCommandFactory {
    store: Arc<dyn ContentStore>,
    origin: Arc<dyn OriginMetadataFactory>,
    buffers: Arc<CopyBufferPool>,
}

impl CacheCommandFactory {
    pub fn new(store: Arc<dyn ContentStore>, origin: Arc<dyn OriginMetadataFactory>) -> Self {
        Self {
            store,
            origin,
            buffers: Arc::new(CopyBufferPool::default()),
        }
    }

    /// Share an existing buffer pool instead of the default one
    pub fn with_buffer_pool(mut self, buffers: Arc<CopyBufferPool>) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn buffer_pool(&self) -> &Arc<CopyBufferPool> {
        &self.buffers
    }

    pub fn create_store(
        &self,
        key: CacheKey,
        properties: Vec<OutputPropertySpec>,
        outputs: PropertySnapshots,
        task: TaskIdentity,
        execution_time: Duration,
    ) -> StoreCommand {
        StoreCommand::new(
            key,
            ordered_properties(properties),
            outputs,
            task,
            execution_time,
            Arc::clone(&self.store),
            Arc::clone(&self.origin),
        )
    }

    pub fn create_load(
        &self,
        key: CacheKey,
        properties: Vec<OutputPropertySpec>,
        incoming: PropertySnapshots,
    ) -> LoadCommand {
        LoadCommand::new(
            key,
            ordered_properties(properties),
            incoming,
            Arc::clone(&self.store),
            Arc::clone(&self.origin),
            Arc::clone(&self.buffers),
        )
    }
}

/// Properties form a set ordered by name; a repeated name keeps its first
/// declaration.
fn ordered_properties(mut properties: Vec<OutputPropertySpec>) -> Vec<OutputPropertySpec> {
    properties.sort_by(|a, b| a.name.cmp(&b.name));
    properties.dedup_by(|later, earlier| later.name == earlier.name);
    properties
}
