use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Passage table layout. `passage_key` is the merge key (`text:juan:chunk`).
pub fn build_passage_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("passage_key", DataType::Utf8, false),
		Field::new("text_id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("juan", DataType::UInt32, false),
		Field::new("chunk_index", DataType::UInt32, false),
		Field::new("char_start", DataType::UInt32, false),
		Field::new("char_end", DataType::UInt32, false),
		Field::new("kind", DataType::Utf8, true),
		Field::new("content", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
