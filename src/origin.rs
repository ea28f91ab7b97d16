//! Origin metadata
//!
//! Describes which execution produced a cache entry. The commands treat the
//! encoded form as an opaque blob; only the factory knows its layout.

use crate::error::CacheError;
use crate::types::TaskIdentity;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata about the execution that produced a cached result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMetadata {
    /// Build invocation that executed the task
    pub build_invocation_id: String,
    pub task_path: String,
    pub task_type: String,
    /// Wall-clock time the original execution took
    pub execution_time_ms: u64,
    /// RFC 3339 timestamp of when the entry was written
    pub creation_time: String,
    pub tool_version: String,
    pub operating_system: String,
}

/// Writer/reader pair for origin metadata
pub trait OriginMetadataFactory: Send + Sync {
    fn write(&self, task: &TaskIdentity, execution_time: Duration) -> Result<Vec<u8>, CacheError>;

    fn read(&self, bytes: &[u8]) -> Result<OriginMetadata, CacheError>;
}

/// JSON encoding of [`OriginMetadata`]
#[derive(Debug, Clone)]
pub struct JsonOriginMetadataFactory {
    build_invocation_id: String,
}

impl Default for JsonOriginMetadataFactory {
    fn default() -> Self {
        Self::new(format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            std::process::id()
        ))
    }
}

impl JsonOriginMetadataFactory {
    pub fn new(build_invocation_id: impl Into<String>) -> Self {
        Self {
            build_invocation_id: build_invocation_id.into(),
        }
    }

    pub fn build_invocation_id(&self) -> &str {
        &self.build_invocation_id
    }
}

impl OriginMetadataFactory for JsonOriginMetadataFactory {
    fn write(&self, task: &TaskIdentity, execution_time: Duration) -> Result<Vec<u8>, CacheError> {
        let metadata = OriginMetadata {
            build_invocation_id: self.build_invocation_id.clone(),
            task_path: task.path.clone(),
            task_type: task.task_type.clone(),
            execution_time_ms: u64::try_from(execution_time.as_millis()).unwrap_or(u64::MAX),
            creation_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            operating_system: std::env::consts::OS.to_string(),
        };
        serde_json::to_vec(&metadata).map_err(|e| CacheError::OriginMetadata(e.to_string()))
    }

    fn read(&self, bytes: &[u8]) -> Result<OriginMetadata, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::OriginMetadata(e.to_string()))
    }
}
