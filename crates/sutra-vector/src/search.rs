use std::collections::BTreeSet;

use arrow_array::{Array, Float32Array, RecordBatch, StringArray, UInt32Array};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use tracing::{debug, warn};

use sutra_core::error::{Error, Result};
use sutra_core::traits::VectorBackend;
use sutra_core::types::{Passage, PassageId, PassageKind, TextId, VectorMatch};

use crate::table::lance_err;
use crate::LanceVectorIndex;

/// Text ids are restricted to a conservative charset before they reach a
/// filter expression; Lance has no bound parameters.
pub fn is_safe_text_id(id: &str) -> bool {
	!id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `text_id IN (...)` over the safe ids; `None` when no id survives.
pub fn text_filter(ids: &BTreeSet<TextId>) -> Option<String> {
	let safe: Vec<String> = ids
		.iter()
		.filter(|id| {
			let ok = is_safe_text_id(id);
			if !ok {
				warn!(text_id = %id, "dropping text id with unsupported characters from filter");
			}
			ok
		})
		.map(|id| format!("'{id}'"))
		.collect();
	if safe.is_empty() { None } else { Some(format!("text_id IN ({})", safe.join(", "))) }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::backend("lancedb", format!("column '{name}' missing or of unexpected type")))
}

pub(crate) fn decode_batch(batch: &RecordBatch) -> Result<Vec<VectorMatch>> {
	let text_ids = column::<StringArray>(batch, "text_id")?;
	let titles = column::<StringArray>(batch, "title")?;
	let juans = column::<UInt32Array>(batch, "juan")?;
	let chunks = column::<UInt32Array>(batch, "chunk_index")?;
	let starts = column::<UInt32Array>(batch, "char_start")?;
	let ends = column::<UInt32Array>(batch, "char_end")?;
	let kinds = column::<StringArray>(batch, "kind")?;
	let contents = column::<StringArray>(batch, "content")?;
	let distances = column::<Float32Array>(batch, "_distance")?;

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let passage = Passage {
			id: PassageId::new(text_ids.value(i), juans.value(i), chunks.value(i)),
			title: titles.value(i).to_string(),
			char_start: starts.value(i),
			char_end: ends.value(i),
			content: contents.value(i).to_string(),
			kind: if kinds.is_null(i) { None } else { Some(PassageKind::from_label(kinds.value(i))) },
			embedding: None,
		};
		out.push(VectorMatch { passage, distance: distances.value(i) });
	}
	Ok(out)
}

#[async_trait]
impl VectorBackend for LanceVectorIndex {
	async fn nearest(&self, vector: &[f32], top_k: usize, text_ids: Option<&BTreeSet<TextId>>) -> Result<Vec<VectorMatch>> {
		if vector.len() != self.dim {
			return Err(Error::backend("lancedb", format!("query dimension {} does not match table dimension {}", vector.len(), self.dim)));
		}
		if top_k == 0 {
			return Ok(Vec::new());
		}
		let filter = match text_ids {
			Some(ids) => match text_filter(ids) {
				Some(f) => Some(f),
				None => return Ok(Vec::new()),
			},
			None => None,
		};

		let table = self.conn.open_table(&self.table_name).execute().await.map_err(lance_err)?;
		let mut query = table.vector_search(vector.to_vec()).map_err(lance_err)?.distance_type(DistanceType::Cosine).limit(top_k);
		if let Some(f) = &filter {
			query = query.only_if(f.as_str());
		}
		let mut stream = query.execute().await.map_err(lance_err)?;
		let mut matches = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
			matches.extend(decode_batch(&batch)?);
		}
		sort_matches(&mut matches);
		matches.truncate(top_k);
		debug!(hits = matches.len(), filter = ?filter, "lancedb nearest");
		Ok(matches)
	}
}

/// Closest first; identity breaks distance ties. Repeated identities keep
/// their closest occurrence.
pub fn sort_matches(matches: &mut Vec<VectorMatch>) {
	matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.passage.id.cmp(&b.passage.id)));
	let mut seen = std::collections::HashSet::new();
	matches.retain(|m| seen.insert(m.passage.id.clone()));
}
