//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::CacheError;

/// Map domain errors to a string for CLI output, prefixed with their category.
pub fn map_error(e: &CacheError) -> String {
    if e.is_consistency_error() {
        format!("cache store is inconsistent: {}", e)
    } else if e.is_contract_violation() {
        format!("invalid outputs: {}", e)
    } else {
        e.to_string()
    }
}
