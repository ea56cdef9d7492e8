use tantivy::schema::{Field, Schema, INDEXED, STORED, STRING, TEXT};

/// Field handles resolved once per index.
#[derive(Debug, Clone, Copy)]
pub struct PassageFields {
	pub passage_key: Field,
	pub text_id: Field,
	pub title: Field,
	pub juan: Field,
	pub chunk_index: Field,
	pub char_start: Field,
	pub char_end: Field,
	pub kind: Field,
	pub content: Field,
	pub grams: Field,
}

impl PassageFields {
	pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			passage_key: schema.get_field("passage_key")?,
			text_id: schema.get_field("text_id")?,
			title: schema.get_field("title")?,
			juan: schema.get_field("juan")?,
			chunk_index: schema.get_field("chunk_index")?,
			char_start: schema.get_field("char_start")?,
			char_end: schema.get_field("char_end")?,
			kind: schema.get_field("kind")?,
			content: schema.get_field("content")?,
			grams: schema.get_field("grams")?,
		})
	}
}

/// Content is stored verbatim; matching goes through the pre-segmented
/// `grams` field so CJK text without word boundaries is searchable.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("passage_key", STRING | STORED);
	schema_builder.add_text_field("text_id", STRING | STORED);
	schema_builder.add_text_field("title", STORED);
	schema_builder.add_u64_field("juan", INDEXED | STORED);
	schema_builder.add_u64_field("chunk_index", INDEXED | STORED);
	schema_builder.add_u64_field("char_start", STORED);
	schema_builder.add_u64_field("char_end", STORED);
	schema_builder.add_text_field("kind", STRING | STORED);
	schema_builder.add_text_field("content", STORED);
	schema_builder.add_text_field("grams", TEXT);
	schema_builder.build()
}

fn is_cjk(c: char) -> bool {
	matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{20000}'..='\u{2EBEF}' | '\u{F900}'..='\u{FAFF}')
}

/// Splits text into runs of CJK ideographs and runs of other alphanumerics.
fn runs(text: &str) -> Vec<(bool, Vec<char>)> {
	let mut out: Vec<(bool, Vec<char>)> = Vec::new();
	for c in text.chars() {
		if !c.is_alphanumeric() {
			out.push((false, Vec::new()));
			continue;
		}
		let cjk = is_cjk(c);
		match out.last_mut() {
			Some((kind, run)) if *kind == cjk && !run.is_empty() => run.push(c),
			_ => out.push((cjk, vec![c])),
		}
	}
	out.retain(|(_, run)| !run.is_empty());
	out
}

/// Index-side segmentation: CJK unigrams and bigrams, lowercased words otherwise.
pub fn index_grams(text: &str) -> String {
	let mut grams: Vec<String> = Vec::new();
	for (cjk, run) in runs(text) {
		if cjk {
			grams.extend(run.iter().map(|c| c.to_string()));
			grams.extend(run.windows(2).map(|w| w.iter().collect::<String>()));
		} else {
			grams.push(run.iter().collect::<String>().to_lowercase());
		}
	}
	grams.join(" ")
}

/// Query-side segmentation of one term: bigrams for CJK runs (the unigram
/// when a run is a single character), lowercased words otherwise. A passage
/// matches the term when it contains every returned gram.
pub fn query_grams(term: &str) -> Vec<String> {
	let mut grams: Vec<String> = Vec::new();
	for (cjk, run) in runs(term) {
		if cjk && run.len() > 1 {
			grams.extend(run.windows(2).map(|w| w.iter().collect::<String>()));
		} else if cjk {
			grams.push(run[0].to_string());
		} else {
			grams.push(run.iter().collect::<String>().to_lowercase());
		}
	}
	grams.dedup();
	grams
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn grams_split_cjk_and_words() {
		assert_eq!(index_grams("色即是空 Form"), "色 即 是 空 色即 即是 是空 form");
		assert_eq!(query_grams("是空"), vec!["是空".to_string()]);
		assert_eq!(query_grams("空"), vec!["空".to_string()]);
		assert_eq!(query_grams("般若，Prajna"), vec!["般若".to_string(), "prajna".to_string()]);
	}
}
