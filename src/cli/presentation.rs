//! CLI presentation: text and JSON rendering of command results.

use crate::cli::parse::OutputFormat;
use crate::command::{LoadOutcome, StoreResult};
use crate::origin::OriginMetadata;
use crate::store::{CacheEntry, ResultEntry};
use crate::types::{CacheKey, ContentHash};
use serde_json::json;

pub fn format_store_result(key: &CacheKey, result: &StoreResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "key": key.to_string(),
            "artifact_entry_count": result.artifact_entry_count,
        })
        .to_string(),
        OutputFormat::Text => format!(
            "Stored {} artifact entries under key {}",
            result.artifact_entry_count, key
        ),
    }
}

pub fn format_load_outcome(key: &CacheKey, outcome: &LoadOutcome, format: OutputFormat) -> String {
    let LoadOutcome::Hit(loaded) = outcome else {
        return match format {
            OutputFormat::Json => json!({
                "key": key.to_string(),
                "hit": false,
                "artifact_entry_count": outcome.artifact_entry_count(),
            })
            .to_string(),
            OutputFormat::Text => format!("Cache miss for key {}", key),
        };
    };

    let stats = &loaded.stats;
    match format {
        OutputFormat::Json => json!({
            "key": key.to_string(),
            "hit": true,
            "artifact_entry_count": outcome.artifact_entry_count(),
            "origin": loaded.metadata,
            "stats": {
                "files_copied": stats.files_copied,
                "bytes_copied": stats.bytes_copied,
                "files_reused": stats.files_reused,
                "directories_created": stats.directories_created,
                "paths_deleted": stats.paths_deleted,
            },
        })
        .to_string(),
        OutputFormat::Text => {
            let mut lines = vec![format!(
                "Loaded {} artifact entries for key {}",
                outcome.artifact_entry_count(),
                key
            )];
            lines.push(format!(
                "  copied {} files ({} bytes), reused {}, created {} directories, deleted {} paths",
                stats.files_copied,
                stats.bytes_copied,
                stats.files_reused,
                stats.directories_created,
                stats.paths_deleted
            ));
            lines.push(format_origin_line(&loaded.metadata));
            lines.join("\n")
        }
    }
}

fn format_origin_line(metadata: &OriginMetadata) -> String {
    format!(
        "  produced by {} ({}) in {} ms at {}",
        metadata.task_path, metadata.task_type, metadata.execution_time_ms, metadata.creation_time
    )
}

/// Render a stored entry. `origin` is the decoded metadata of a result entry.
pub fn format_entry(
    hash: &ContentHash,
    entry: &CacheEntry,
    origin: Option<&OriginMetadata>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => entry_json(hash, entry, origin).to_string(),
        OutputFormat::Text => entry_text(hash, entry, origin),
    }
}

fn entry_json(
    hash: &ContentHash,
    entry: &CacheEntry,
    origin: Option<&OriginMetadata>,
) -> serde_json::Value {
    match entry {
        CacheEntry::File(file) => json!({
            "hash": hash.to_string(),
            "kind": "file",
            "size": file.size(),
        }),
        CacheEntry::Manifest(manifest) => json!({
            "hash": hash.to_string(),
            "kind": "manifest",
            "children": manifest
                .children()
                .iter()
                .map(|(name, child)| (name.clone(), json!(child.to_string())))
                .collect::<serde_json::Map<_, _>>(),
        }),
        CacheEntry::Result(ResultEntry { outputs, .. }) => json!({
            "hash": hash.to_string(),
            "kind": "result",
            "outputs": outputs
                .iter()
                .map(|(name, root)| (name.clone(), json!(root.to_string())))
                .collect::<serde_json::Map<_, _>>(),
            "origin": origin,
        }),
    }
}

fn entry_text(hash: &ContentHash, entry: &CacheEntry, origin: Option<&OriginMetadata>) -> String {
    let mut lines = vec![format!("{} {}", entry.kind(), hash)];
    match entry {
        CacheEntry::File(file) => lines.push(format!("  size: {} bytes", file.size())),
        CacheEntry::Manifest(manifest) => {
            for (name, child) in manifest.children() {
                lines.push(format!("  {}  {}", child, name));
            }
        }
        CacheEntry::Result(result) => {
            for (name, root) in &result.outputs {
                lines.push(format!("  {}  {}", root, name));
            }
            if let Some(origin) = origin {
                lines.push(format_origin_line(origin));
            }
        }
    }
    lines.join("\n")
}
