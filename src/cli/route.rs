//! CLI route: single route table and run context.

use crate::buffer::CopyBufferPool;
use crate::cli::parse::Commands;
use crate::cli::presentation::{format_entry, format_load_outcome, format_store_result};
use crate::command::CacheCommandFactory;
use crate::config::{CacheConfig, ConfigLoader};
use crate::error::CacheError;
use crate::origin::{JsonOriginMetadataFactory, OriginMetadataFactory};
use crate::snapshot::{snapshot_outputs, walker::hash_file};
use crate::store::{open_store, CacheEntry};
use crate::tree::path::absolute_root;
use crate::types::{CacheKey, OutputPropertySpec, TaskIdentity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, configuration and the
/// command factory over the configured store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: CacheConfig,
    origin: Arc<JsonOriginMetadataFactory>,
    factory: CacheCommandFactory,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CacheError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: CacheConfig) -> Result<Self, CacheError> {
        let store = open_store(&config.storage)?;
        let origin = Arc::new(JsonOriginMetadataFactory::default());
        let buffers = Arc::new(CopyBufferPool::new(config.transfer.copy_buffer_size));
        let factory = CacheCommandFactory::new(store, origin.clone()).with_buffer_pool(buffers);
        info!(
            store = %config.storage.path.display(),
            backend = ?config.storage.backend,
            "Opened content store"
        );
        Ok(Self {
            workspace_root,
            config,
            origin,
            factory,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn execute(&self, command: &Commands) -> Result<String, CacheError> {
        match command {
            Commands::Store {
                key,
                outputs,
                task,
                task_type,
                duration_ms,
                format,
            } => {
                let key = parse_key(key);
                let properties = self.resolve_outputs(outputs)?;
                let snapshots = snapshot_outputs(&properties)?;
                let result = self
                    .factory
                    .create_store(
                        key,
                        properties,
                        snapshots,
                        TaskIdentity::new(task.clone(), task_type.clone()),
                        Duration::from_millis(*duration_ms),
                    )
                    .store()?;
                Ok(format_store_result(&key, &result, *format))
            }
            Commands::Load {
                key,
                outputs,
                format,
            } => {
                let key = parse_key(key);
                let properties = self.resolve_outputs(outputs)?;
                let incoming = snapshot_outputs(&properties)?;
                let outcome = self.factory.create_load(key, properties, incoming).load()?;
                Ok(format_load_outcome(&key, &outcome, *format))
            }
            Commands::Inspect { hash, format } => {
                let entry = self
                    .factory
                    .store()
                    .get(hash)?
                    .ok_or(CacheError::EntryNotFound(*hash))?;
                let origin = match &entry {
                    CacheEntry::Result(result) => Some(self.origin.read(&result.origin_metadata)?),
                    _ => None,
                };
                Ok(format_entry(hash, &entry, origin.as_ref(), *format))
            }
            Commands::Hash { path } => {
                let path = self.resolve(path)?;
                let mut buffer = self.factory.buffer_pool().checkout();
                let hash = hash_file(&path, &mut buffer)?;
                Ok(hash.to_string())
            }
        }
    }

    /// Absolute, normalized form of a path given on the command line
    fn resolve(&self, path: &Path) -> Result<PathBuf, CacheError> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };
        Ok(absolute_root(&joined)?)
    }

    fn resolve_outputs(
        &self,
        outputs: &[OutputPropertySpec],
    ) -> Result<Vec<OutputPropertySpec>, CacheError> {
        outputs
            .iter()
            .map(|spec| -> Result<OutputPropertySpec, CacheError> {
                let root = spec.root.as_deref().map(|root| self.resolve(root)).transpose()?;
                Ok(OutputPropertySpec {
                    root,
                    ..spec.clone()
                })
            })
            .collect()
    }
}

/// Every label, hex or not, is hashed into the key domain so a key never
/// shares an address with stored content.
fn parse_key(key: &str) -> CacheKey {
    let derived = CacheKey::derive(key);
    debug!(label = key, key = %derived, "Derived cache key from label");
    derived
}
