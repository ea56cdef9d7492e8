//! sutra-dict
//!
//! Glossary store with exact > prefix > fuzzy lookup, and the dictionary
//! retriever built on it.

pub mod glossary;
pub mod levenshtein;
pub mod retriever;

pub use glossary::MemoryGlossary;
pub use retriever::DictionaryRetriever;
