//! Query analysis: intent, expansion, decomposition.
//!
//! All three are pure functions over a borrowed [`QueryPatterns`](crate::patterns::QueryPatterns).

pub mod decompose;
pub mod expand;
pub mod intent;

pub use decompose::decompose;
pub use expand::expand;
pub use intent::{classify, IntentClassification};
