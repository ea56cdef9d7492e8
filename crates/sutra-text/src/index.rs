use std::path::Path;

use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};
use tracing::info;

use sutra_core::error::{Error, Result};
use sutra_core::types::Passage;

use crate::tantivy_utils::{build_schema, index_grams, PassageFields};

pub(crate) fn tantivy_err(e: impl std::fmt::Display) -> Error {
	Error::backend("tantivy", e)
}

/// Tantivy index over passages. Serves lexical search and neighbor lookups.
///
/// Cheap to clone; clones share the underlying index and reader.
#[derive(Clone)]
pub struct TantivyPassageIndex {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	pub(crate) fields: PassageFields,
}

impl TantivyPassageIndex {
	/// Opens an existing index directory, or creates one when it is empty.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir).map_err(|e| Error::Operation(format!("create {}: {e}", index_dir.display())))?;
		let dir = tantivy::directory::MmapDirectory::open(index_dir).map_err(tantivy_err)?;
		let index = Index::open_or_create(dir, build_schema()).map_err(tantivy_err)?;
		Self::from_index(index)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir).map_err(tantivy_err)?;
		Self::from_index(index)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		let fields = PassageFields::from_schema(&index.schema()).map_err(tantivy_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(tantivy_err)?;
		Ok(Self { index, reader, fields })
	}

	/// Writes passages, replacing any already stored under the same identity.
	pub fn index_passages(&self, passages: &[Passage]) -> Result<usize> {
		let mut index_writer: IndexWriter = self.index.writer(50_000_000).map_err(tantivy_err)?;
		let f = self.fields;
		for p in passages {
			let key = p.id.to_string();
			index_writer.delete_term(Term::from_field_text(f.passage_key, &key));
			let doc = doc!(
				f.passage_key => key,
				f.text_id => p.id.text_id.clone(),
				f.title => p.title.clone(),
				f.juan => u64::from(p.id.juan),
				f.chunk_index => u64::from(p.id.chunk_index),
				f.char_start => u64::from(p.char_start),
				f.char_end => u64::from(p.char_end),
				f.kind => p.kind.map(|k| k.as_str()).unwrap_or("").to_string(),
				f.content => p.content.clone(),
				f.grams => index_grams(&p.content),
			);
			index_writer.add_document(doc).map_err(tantivy_err)?;
		}
		index_writer.commit().map_err(tantivy_err)?;
		self.reader.reload().map_err(tantivy_err)?;
		info!(count = passages.len(), "indexed passages into tantivy");
		Ok(passages.len())
	}

	pub fn num_passages(&self) -> u64 {
		self.reader.searcher().num_docs()
	}
}
