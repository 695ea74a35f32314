//! Domain layer shared by the client, storage and app crates.
//!
//! `tree` holds the category tree engine, `types` the category records it
//! operates on, and `session` the credential types plus the [`TokenStore`]
//! seam the HTTP client persists through.
pub mod session;
pub mod tree;
pub mod types;

pub use session::{MemoryTokenStore, TokenPair, TokenStore};
pub use types::{
    strip_reserved, CategoryNode, FlatCategory, LocalizedName, NodePatch, ReorderPlan,
    SiblingPosition,
};
