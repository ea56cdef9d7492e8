//! sutra-query
//!
//! Question normalization: lexical keywords with phrase integrity, glossary
//! candidates, and alias resolution for named works.

pub mod expander;
pub mod tables;

pub use expander::QueryExpander;
