use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};

use sutra_core::error::{Error, Result};
use sutra_core::traits::{LexicalBackend, PassageStore};
use sutra_core::types::{Passage, PassageId, PassageKind, ScoredPassage};

use crate::index::{tantivy_err, TantivyPassageIndex};
use crate::tantivy_utils::query_grams;

impl TantivyPassageIndex {
	/// One `Should` clause per term; each clause requires all of the term's
	/// grams. Built from terms directly, so no query syntax is ever parsed.
	fn lexical_query(&self, terms: &[String]) -> Option<BooleanQuery> {
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		for term in terms {
			let grams: Vec<Box<dyn Query>> = query_grams(term)
				.into_iter()
				.map(|g| {
					Box::new(TermQuery::new(Term::from_field_text(self.fields.grams, &g), IndexRecordOption::WithFreqs))
						as Box<dyn Query>
				})
				.collect();
			if grams.is_empty() {
				continue;
			}
			clauses.push((Occur::Should, Box::new(BooleanQuery::intersection(grams))));
		}
		if clauses.is_empty() { None } else { Some(BooleanQuery::new(clauses)) }
	}

	pub fn search_blocking(&self, terms: &[String], top_k: usize) -> Result<Vec<ScoredPassage>> {
		let Some(query) = self.lexical_query(terms) else { return Ok(Vec::new()) };
		if top_k == 0 {
			return Ok(Vec::new());
		}
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(top_k)).map_err(tantivy_err)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(tantivy_err)?;
			hits.push(ScoredPassage { passage: self.decode(&doc)?, score });
		}
		Ok(hits)
	}

	pub fn neighbors_blocking(&self, id: &PassageId, window: u32) -> Result<Vec<Passage>> {
		let f = self.fields;
		let lo = id.chunk_index.saturating_sub(window);
		let hi = id.chunk_index.saturating_add(window);
		let chunks: Vec<(Occur, Box<dyn Query>)> = (lo..=hi)
			.map(|c| {
				let q: Box<dyn Query> =
					Box::new(TermQuery::new(Term::from_field_u64(f.chunk_index, u64::from(c)), IndexRecordOption::Basic));
				(Occur::Should, q)
			})
			.collect();
		let text_q: Box<dyn Query> =
			Box::new(TermQuery::new(Term::from_field_text(f.text_id, &id.text_id), IndexRecordOption::Basic));
		let juan_q: Box<dyn Query> =
			Box::new(TermQuery::new(Term::from_field_u64(f.juan, u64::from(id.juan)), IndexRecordOption::Basic));
		let chunk_q: Box<dyn Query> = Box::new(BooleanQuery::new(chunks));
		let query = BooleanQuery::intersection(vec![text_q, juan_q, chunk_q]);
		let limit = (hi - lo) as usize + 1;
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(tantivy_err)?;
		let mut passages = Vec::with_capacity(top_docs.len());
		for (_, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(tantivy_err)?;
			passages.push(self.decode(&doc)?);
		}
		passages.sort_by_key(|p| p.id.chunk_index);
		passages.dedup_by(|a, b| a.id == b.id);
		Ok(passages)
	}

	fn decode(&self, doc: &TantivyDocument) -> Result<Passage> {
		let f = self.fields;
		let text = |field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		let number = |field, name: &str| -> Result<u32> {
			let raw = doc
				.get_first(field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::backend("tantivy", format!("stored field '{name}' missing")))?;
			u32::try_from(raw).map_err(|_| Error::backend("tantivy", format!("stored field '{name}' out of range: {raw}")))
		};
		let kind = text(f.kind);
		Ok(Passage {
			id: PassageId::new(text(f.text_id), number(f.juan, "juan")?, number(f.chunk_index, "chunk_index")?),
			title: text(f.title),
			char_start: number(f.char_start, "char_start")?,
			char_end: number(f.char_end, "char_end")?,
			content: text(f.content),
			kind: if kind.is_empty() { None } else { Some(PassageKind::from_label(&kind)) },
			embedding: None,
		})
	}
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T> + Send + 'static,
{
	tokio::task::spawn_blocking(f).await.map_err(|e| Error::Operation(format!("tantivy task failed: {e}")))?
}

#[async_trait]
impl LexicalBackend for TantivyPassageIndex {
	async fn search(&self, terms: &[String], top_k: usize) -> Result<Vec<ScoredPassage>> {
		let this = self.clone();
		let terms = terms.to_vec();
		run_blocking(move || this.search_blocking(&terms, top_k)).await
	}
}

#[async_trait]
impl PassageStore for TantivyPassageIndex {
	async fn neighbors(&self, id: &PassageId, window: u32) -> Result<Vec<Passage>> {
		let this = self.clone();
		let id = id.clone();
		run_blocking(move || this.neighbors_blocking(&id, window)).await
	}
}
