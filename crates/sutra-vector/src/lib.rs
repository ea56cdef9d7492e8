//! sutra-vector
//!
//! Vector side of the engine: a LanceDB passage table with cosine search and
//! a text-id filter, an in-memory brute-force index, and the semantic
//! retriever that drives either through `VectorBackend`.

use lancedb::Connection;
use tracing::info;

use sutra_core::error::Result;

pub mod index_build;
pub mod memory;
pub mod retriever;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::MemoryVectorIndex;
pub use retriever::SemanticRetriever;

/// LanceDB-backed passage table.
#[derive(Clone)]
pub struct LanceVectorIndex {
    pub(crate) conn: Connection,
    pub(crate) table_name: String,
    pub(crate) dim: usize,
}

impl LanceVectorIndex {
    /// Connects to `uri` and creates the table when missing.
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let conn = table::open_db(uri).await?;
        let dim_i32 = i32::try_from(dim)
            .map_err(|_| sutra_core::Error::InvalidConfig(format!("dimension {dim} too large")))?;
        table::ensure_table(&conn, table_name, schema::build_passage_schema(dim_i32)).await?;
        info!(uri, table = table_name, dim, "opened lancedb passage table");
        Ok(Self { conn, table_name: table_name.to_string(), dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub async fn num_passages(&self) -> Result<usize> {
        let table = self.conn.open_table(&self.table_name).execute().await.map_err(table::lance_err)?;
        table.count_rows(None).await.map_err(table::lance_err)
    }
}
