//! Search orchestrator: backend selection, execution, fusion, escalation.
//!
//! This module picks backends for a classified query, runs them with a
//! bounded worker pool or sequentially, fuses their ranked lists with
//! Reciprocal Rank Fusion, widens the backend set once when quality is
//! poor, and returns a deduplicated, provenance-tagged result list.

pub mod decomposed;
pub mod dedup;
pub mod escalation;
pub mod executor;
pub mod fusion;
pub mod quality;
pub mod search;
pub mod selector;

pub use search::Orchestrator;
