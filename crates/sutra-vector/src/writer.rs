use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::info;

use sutra_core::error::{Error, Result};
use sutra_core::traits::EmbeddingService;
use sutra_core::types::Passage;

use crate::schema::build_passage_schema;
use crate::table::lance_err;
use crate::LanceVectorIndex;

const BATCH_SIZE: usize = 256;

impl LanceVectorIndex {
	/// Upserts passages keyed by identity. Passages carrying a precomputed
	/// embedding keep it; the rest are embedded in batches.
	pub async fn add_passages(&self, passages: &[Passage], embedder: &dyn EmbeddingService, progress: bool) -> Result<usize> {
		if passages.is_empty() {
			return Ok(0);
		}
		if embedder.dim() != self.dim {
			return Err(Error::InvalidConfig(format!("embedder dimension {} does not match table dimension {}", embedder.dim(), self.dim)));
		}
		let pb = if progress { ProgressBar::new(passages.len() as u64) } else { ProgressBar::hidden() };
		let style = ProgressStyle::default_bar()
			.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%) {msg}")
			.map_err(|e| Error::Operation(format!("progress template: {e}")))?;
		pb.set_style(style.progress_chars("#>-"));

		let mut written = 0usize;
		for batch in passages.chunks(BATCH_SIZE) {
			let missing: Vec<String> = batch.iter().filter(|p| p.embedding.is_none()).map(|p| p.content.clone()).collect();
			let mut computed = embedder.embed_batch(&missing).await?.into_iter();
			let mut vectors = Vec::with_capacity(batch.len());
			for p in batch {
				let v = match &p.embedding {
					Some(v) => v.clone(),
					None => computed.next().ok_or_else(|| Error::backend("embedding", "fewer vectors than inputs"))?,
				};
				vectors.push(v);
			}
			self.upsert(batch, &vectors).await?;
			written += batch.len();
			pb.set_position(written as u64);
		}
		pb.finish_with_message("done");
		info!(count = written, table = %self.table_name, "indexed passages into lancedb");
		Ok(written)
	}

	async fn upsert(&self, passages: &[Passage], vectors: &[Vec<f32>]) -> Result<()> {
		let record_batch = passages_to_record_batch(passages, vectors, self.dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let table = self.conn.open_table(&self.table_name).execute().await.map_err(lance_err)?;
		let mut mi = table.merge_insert(&["passage_key"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await.map_err(lance_err)?;
		Ok(())
	}
}

pub fn passages_to_record_batch(passages: &[Passage], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	if passages.len() != vectors.len() {
		return Err(Error::Operation(format!("{} passages but {} vectors", passages.len(), vectors.len())));
	}
	if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
		return Err(Error::InvalidConfig(format!("vector of dimension {} in a table of dimension {dim}", bad.len())));
	}
	let dim_i32 = i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("dimension {dim} too large")))?;
	let schema = build_passage_schema(dim_i32);
	let vector_items: Vec<Option<Vec<Option<f32>>>> = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
	let record_batch = RecordBatch::try_new(
		schema,
		vec![
			Arc::new(StringArray::from(passages.iter().map(|p| p.id.to_string()).collect::<Vec<_>>())),
			Arc::new(StringArray::from(passages.iter().map(|p| p.id.text_id.clone()).collect::<Vec<_>>())),
			Arc::new(StringArray::from(passages.iter().map(|p| p.title.clone()).collect::<Vec<_>>())),
			Arc::new(UInt32Array::from(passages.iter().map(|p| p.id.juan).collect::<Vec<_>>())),
			Arc::new(UInt32Array::from(passages.iter().map(|p| p.id.chunk_index).collect::<Vec<_>>())),
			Arc::new(UInt32Array::from(passages.iter().map(|p| p.char_start).collect::<Vec<_>>())),
			Arc::new(UInt32Array::from(passages.iter().map(|p| p.char_end).collect::<Vec<_>>())),
			Arc::new(StringArray::from(passages.iter().map(|p| p.kind.map(|k| k.as_str())).collect::<Vec<_>>())),
			Arc::new(StringArray::from(passages.iter().map(|p| p.content.clone()).collect::<Vec<_>>())),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vector_items.into_iter(), dim_i32)),
		],
	)
	.map_err(|e| Error::backend("arrow", e))?;
	Ok(record_batch)
}
