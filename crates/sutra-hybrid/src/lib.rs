//! sutra-hybrid
//!
//! The answer engine: weighted RRF over the semantic, lexical and dictionary
//! lists, budgeted context assembly, generation and citation grounding.

pub mod assemble;
pub mod contract;
pub mod engine;
pub mod fusion;
pub mod generate;
pub mod prompt;

pub use assemble::{AssembledContext, AssemblyMetrics, ContextAssembler, ContextBlock};
pub use contract::{AnswerPoint, Citation, DeepAnswerResponse, SchemaError};
pub use engine::{AnswerError, AnswerOptions, Backends, DeepAnswerEngine, PerformanceReport};
pub use fusion::{FusedResult, FusionEngine, FusionOutcome};
pub use generate::HttpGenerator;
