//! Retrieval backend implementations.
//!
//! Each module provides a struct implementing [`crate::backend::Backend`]
//! over one external store contract from [`store`].

pub mod entity;
pub mod graph;
pub mod metadata;
pub mod semantic;
pub mod store;

pub use entity::EntityBackend;
pub use graph::GraphBackend;
pub use metadata::MetadataBackend;
pub use semantic::SemanticBackend;
pub use store::{
    Embedder, EntityRecord, GraphStore, MetadataFilter, MetadataStore, PaperRecord, VectorHit,
    VectorStore,
};
