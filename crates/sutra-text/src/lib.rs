//! sutra-text
//!
//! Tantivy passage index. Serves keyword search over CJK text through a
//! pre-segmented gram field, and same-section neighbor lookups used for
//! context expansion.
pub mod tantivy_utils;
pub mod index;
pub mod search;
pub mod retriever;

pub use index::TantivyPassageIndex;
pub use retriever::LexicalRetriever;
