//! Integration tests for the outcache task output cache

mod content_store;
mod load_command;
mod store_command;
mod tree_determinism;
