//! IVF-PQ index building for the passage table.
//!
//! Small tables are searched exhaustively; an ANN index only pays off once the
//! table holds enough rows to train partitions.

use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::DistanceType;
use tracing::info;

use sutra_core::error::Result;

use crate::table::lance_err;
use crate::LanceVectorIndex;

/// Below this many rows no index is built.
pub const MIN_ROWS_FOR_INDEX: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
}

pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_rows as f64).sqrt() as usize;
    let mut nlist = (2 * sqrt_n).clamp(1, 4096);
    // tiny tables: fewer partitions than rows
    if total_rows > 1 {
        nlist = nlist.min(total_rows - 1);
    } else {
        nlist = 1;
    }
    let m = if dim >= 1024 && dim % 32 == 0 {
        32
    } else if dim % 16 == 0 {
        16
    } else {
        1
    };
    IvfPqParams { nlist, m }
}

impl LanceVectorIndex {
    /// Builds a cosine IVF-PQ index when the table is large enough.
    /// Returns the parameters used, or `None` when skipped.
    pub async fn build_ann_index(&self) -> Result<Option<IvfPqParams>> {
        let rows = self.num_passages().await?;
        if rows < MIN_ROWS_FOR_INDEX {
            info!(rows, "table too small for an ANN index; skipping");
            return Ok(None);
        }
        let params = compute_ivfpq_params(rows, self.dim);
        let table = self.conn.open_table(&self.table_name).execute().await.map_err(lance_err)?;
        table
            .create_index(
                &["vector"],
                Index::IvfPq(
                    IvfPqIndexBuilder::default()
                        .distance_type(DistanceType::Cosine)
                        .num_partitions(params.nlist as u32)
                        .num_sub_vectors(params.m as u32),
                ),
            )
            .replace(true)
            .execute()
            .await
            .map_err(lance_err)?;
        info!(rows, nlist = params.nlist, m = params.m, "built IVF-PQ index");
        Ok(Some(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_scale_with_rows_and_dim() {
        let p = compute_ivfpq_params(1_000_000, 1024);
        assert_eq!(p, IvfPqParams { nlist: 2000, m: 32 });
        let small = compute_ivfpq_params(10, 384);
        assert_eq!(small.nlist, 6);
        assert_eq!(small.m, 16);
        assert_eq!(compute_ivfpq_params(1, 8).nlist, 1);
    }
}
