//! Tantivy schema for page documents

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};
use tantivy::TantivyError;

/// Field names, shared by the builder and the reader
const URL: &str = "url";
const TITLE: &str = "title";
const TEXT_FIELD: &str = "text";
const SEQ: &str = "seq";

/// The page schema with resolved field handles
///
/// * `url` - stored verbatim, untokenized; the unique key
/// * `title`, `text` - tokenized free text, stored for export
/// * `seq` - position of the document in its generation
#[derive(Debug, Clone)]
pub struct PageSchema {
    pub schema: Schema,
    pub url: Field,
    pub title: Field,
    pub text: Field,
    pub seq: Field,
}

impl PageSchema {
    pub fn build() -> Self {
        let mut builder = Schema::builder();
        let url = builder.add_text_field(URL, STRING | STORED);
        let title = builder.add_text_field(TITLE, TEXT | STORED);
        let text = builder.add_text_field(TEXT_FIELD, TEXT | STORED);
        let seq = builder.add_u64_field(SEQ, STORED);

        Self {
            schema: builder.build(),
            url,
            title,
            text,
            seq,
        }
    }

    /// Resolves the field handles of an index opened from disk
    pub fn from_schema(schema: Schema) -> Result<Self, TantivyError> {
        Ok(Self {
            url: schema.get_field(URL)?,
            title: schema.get_field(TITLE)?,
            text: schema.get_field(TEXT_FIELD)?,
            seq: schema.get_field(SEQ)?,
            schema,
        })
    }
}
