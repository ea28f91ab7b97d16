//! Directory Merkle Trees
//!
//! Directory outputs are stored as trees of manifests over the flat content
//! store. Each manifest references its children by hash only, so identical
//! subtrees anywhere collapse into one stored entry.

pub mod builder;
pub mod hasher;
pub mod path;

pub use builder::{CommittedTree, DirectoryTreeBuilder};
pub use path::RelativePath;
