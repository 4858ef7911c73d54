//! Index generations
//!
//! Every indexing run builds a complete generation from nothing. The new
//! generation is written to a staging directory next to the index directory
//! and only swapped into place once tantivy has committed it, so the
//! committed index is always either the previous generation or the new one,
//! never a mix and never a half-written directory.

use crate::index::schema::PageSchema;
use crate::index::{IndexError, IndexResult};
use crate::output::PageRecord;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument, Term};

/// Writer heap shared by the single indexing thread
const WRITER_MEMORY: usize = 50_000_000;

/// Title matches count double
const TITLE_BOOST: f32 = 2.0;

/// Puts back a committed generation left in `.previous` by an interrupted swap
fn restore_previous(index_dir: &Path) -> std::io::Result<()> {
    let previous = sibling(index_dir, ".previous");
    if index_dir.join("meta.json").exists() || !previous.join("meta.json").exists() {
        return Ok(());
    }

    tracing::warn!(
        "Restoring committed index from {} after an interrupted swap",
        previous.display()
    );
    if index_dir.exists() {
        fs::remove_dir_all(index_dir)?;
    }
    fs::rename(&previous, index_dir)
}

/// Replaces `index_dir` with `staging_dir`
///
/// The old generation is parked in `.previous` and only deleted once the new
/// one is in place. If the new one cannot be moved in, the old one goes back.
fn swap_into_place(staging_dir: &Path, index_dir: &Path) -> std::io::Result<()> {
    restore_previous(index_dir)?;

    let previous = sibling(index_dir, ".previous");
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }
    if index_dir.exists() {
        fs::rename(index_dir, &previous)?;
    }
    if let Some(parent) = index_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::rename(staging_dir, index_dir) {
        if previous.exists() {
            if let Err(restore) = fs::rename(&previous, index_dir) {
                tracing::error!(
                    "Failed to restore committed index from {}: {}",
                    previous.display(),
                    restore
                );
            }
        }
        return Err(e);
    }

    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }
    Ok(())
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("index"));
    name.push(suffix);
    dir.with_file_name(name)
}

/// Owns the index directory and hands out generations
#[derive(Debug)]
pub struct IndexBuilder {
    index_dir: PathBuf,
    in_progress: Arc<AtomicBool>,
}

impl IndexBuilder {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts a fresh, empty generation
    ///
    /// Nothing from earlier generations carries over. The committed index stays
    /// readable until the new generation commits.
    ///
    /// # Errors
    ///
    /// `IndexError::GenerationInProgress` if a generation from this builder
    /// has not been committed or dropped yet.
    pub fn begin_generation(&self) -> IndexResult<Generation> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            return Err(IndexError::GenerationInProgress);
        }
        let lease = GenerationLease(Arc::clone(&self.in_progress));
        restore_previous(&self.index_dir)?;

        let staging_dir = sibling(&self.index_dir, ".staging");
        if staging_dir.exists() {
            tracing::debug!("Removing abandoned staging directory {}", staging_dir.display());
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;

        let schema = PageSchema::build();
        let index = Index::create_in_dir(&staging_dir, schema.schema.clone())?;
        let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY)?;

        tracing::debug!("Started index generation in {}", staging_dir.display());

        Ok(Generation {
            writer,
            schema,
            urls: HashSet::new(),
            staging_dir,
            index_dir: self.index_dir.clone(),
            _lease: lease,
        })
    }

    /// Opens the committed generation, if there is one
    pub fn open_committed(&self) -> IndexResult<Option<CommittedIndex>> {
        restore_previous(&self.index_dir)?;
        if !self.index_dir.join("meta.json").exists() {
            return Ok(None);
        }
        CommittedIndex::open(&self.index_dir).map(Some)
    }
}

/// Clears the builder's in-progress flag when the generation goes away
#[derive(Debug)]
struct GenerationLease(Arc<AtomicBool>);

impl Drop for GenerationLease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An index generation being built
///
/// Dropping a generation without committing leaves the committed index as it
/// was; the staging directory is cleared by the next `begin_generation`.
pub struct Generation {
    writer: IndexWriter,
    schema: PageSchema,
    urls: HashSet<String>,
    staging_dir: PathBuf,
    index_dir: PathBuf,
    _lease: GenerationLease,
}

impl Generation {
    /// Adds one page record
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record will be part of the generation
    /// * `Ok(false)` - Rejected: its URL is empty or already in this generation
    /// * `Err(IndexError)` - The writer failed; the generation stays usable
    pub fn add_document(&mut self, record: &PageRecord) -> IndexResult<bool> {
        if record.url.is_empty() {
            return Ok(false);
        }
        if self.urls.contains(&record.url) {
            tracing::warn!("Duplicate URL in index generation: {}", record.url);
            return Ok(false);
        }

        let mut doc = TantivyDocument::default();
        doc.add_text(self.schema.url, &record.url);
        doc.add_text(self.schema.title, &record.title);
        doc.add_text(self.schema.text, &record.body_text);
        doc.add_u64(self.schema.seq, self.urls.len() as u64);

        self.writer.add_document(doc)?;
        self.urls.insert(record.url.clone());
        Ok(true)
    }

    /// Number of documents added so far
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Commits the generation and makes it the committed index
    pub fn commit(self) -> IndexResult<CommittedIndex> {
        let Generation {
            mut writer,
            staging_dir,
            index_dir,
            urls,
            _lease,
            ..
        } = self;

        writer.commit()?;
        writer.wait_merging_threads()?;

        swap_into_place(&staging_dir, &index_dir)?;

        tracing::info!(
            "Committed index generation with {} documents to {}",
            urls.len(),
            index_dir.display()
        );

        CommittedIndex::open(&index_dir)
    }
}

/// A stored page as read back from the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// A search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub score: f32,
}

/// Read-only view of a committed generation
pub struct CommittedIndex {
    reader: IndexReader,
    schema: PageSchema,
    query_parser: QueryParser,
}

impl CommittedIndex {
    pub fn open(dir: &Path) -> IndexResult<Self> {
        let index = Index::open_in_dir(dir)?;
        let schema = PageSchema::from_schema(index.schema())?;
        let reader = index.reader()?;

        let mut query_parser = QueryParser::for_index(&index, vec![schema.title, schema.text]);
        query_parser.set_field_boost(schema.title, TITLE_BOOST);

        Ok(Self {
            reader,
            schema,
            query_parser,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// True if a document with exactly this URL is committed
    pub fn contains(&self, url: &str) -> IndexResult<bool> {
        let query = TermQuery::new(
            Term::from_field_text(self.schema.url, url),
            IndexRecordOption::Basic,
        );
        Ok(self.reader.searcher().search(&query, &Count)? > 0)
    }

    /// Every committed document, in the order it was added
    pub fn documents(&self) -> IndexResult<Vec<IndexedPage>> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

        let mut pages = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let seq = doc
                .get_first(self.schema.seq)
                .and_then(|v| v.as_u64())
                .unwrap_or(u64::MAX);
            pages.push((seq, self.page_from(&doc)));
        }

        pages.sort_by_key(|(seq, _)| *seq);
        Ok(pages.into_iter().map(|(_, page)| page).collect())
    }

    /// Searches titles and body text
    ///
    /// Uses tantivy's query syntax; a bare word matches documents containing it
    /// in either field.
    pub fn search(&self, query: &str, limit: usize) -> IndexResult<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .query_parser
            .parse_query(query)
            .map_err(|e| IndexError::Query(e.to_string()))?;

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let page = self.page_from(&doc);
            hits.push(SearchHit {
                url: page.url,
                title: page.title,
                score,
            });
        }
        Ok(hits)
    }

    fn page_from(&self, doc: &TantivyDocument) -> IndexedPage {
        let text_of = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        IndexedPage {
            url: text_of(self.schema.url),
            title: text_of(self.schema.title),
            text: text_of(self.schema.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str, title: &str, text: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            title: title.to_string(),
            body_text: text.to_string(),
            content_hash: String::new(),
            fetched_at: Default::default(),
            links: Vec::new(),
            depth: 0,
        }
    }

    fn build(builder: &IndexBuilder, records: &[PageRecord]) -> CommittedIndex {
        let mut generation = builder.begin_generation().unwrap();
        for r in records {
            assert!(generation.add_document(r).unwrap());
        }
        generation.commit().unwrap()
    }

    #[test]
    fn test_terms_in_title_or_body_are_searchable() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        let index = build(
            &builder,
            &[
                record("https://example.com/", "Example Domain", "for illustrative examples"),
                record("https://example.com/about", "About", "we write documentation"),
            ],
        );

        assert_eq!(index.num_docs(), 2);

        let hits = index.search("domain", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://example.com/");
        assert_eq!(hits[0].title, "Example Domain");

        let hits = index.search("documentation", 10).unwrap();
        assert_eq!(hits[0].url, "https://example.com/about");

        assert!(index.search("absent", 10).unwrap().is_empty());
        assert!(index.search("domain", 0).unwrap().is_empty());
    }

    #[test]
    fn test_title_match_outranks_body_match() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        let index = build(
            &builder,
            &[
                record("https://example.com/body", "Other", "rust appears in the body"),
                record("https://example.com/title", "Rust", "something else in the body"),
            ],
        );

        let hits = index.search("rust", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.com/title");
    }

    #[test]
    fn test_url_is_matched_verbatim() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        let index = build(&builder, &[record("https://example.com/a-b", "T", "x")]);

        assert!(index.contains("https://example.com/a-b").unwrap());
        assert!(!index.contains("https://example.com/a").unwrap());
        // Not a free-text field
        assert!(index.search("example", 10).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));

        let mut generation = builder.begin_generation().unwrap();
        assert!(generation.add_document(&record("https://example.com/", "First", "a")).unwrap());
        assert!(!generation.add_document(&record("https://example.com/", "Second", "b")).unwrap());
        assert!(!generation.add_document(&record("", "Empty", "c")).unwrap());
        assert_eq!(generation.len(), 1);

        let index = generation.commit().unwrap();
        assert_eq!(index.num_docs(), 1);
        assert_eq!(index.documents().unwrap()[0].title, "First");
    }

    #[test]
    fn test_rebuild_leaves_no_residue() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));

        build(
            &builder,
            &[
                record("https://example.com/old", "Old page", "stale words"),
                record("https://example.com/shared", "Shared", "kept"),
            ],
        );
        let index = build(
            &builder,
            &[
                record("https://example.com/shared", "Shared", "kept"),
                record("https://example.com/new", "New page", "fresh words"),
            ],
        );

        let urls: Vec<String> = index.documents().unwrap().into_iter().map(|p| p.url).collect();
        assert_eq!(urls, vec!["https://example.com/shared", "https://example.com/new"]);
        assert!(index.search("stale", 10).unwrap().is_empty());
        assert!(!dir.path().join("index.staging").exists());
        assert!(!dir.path().join("index.previous").exists());

        let reopened = builder.open_committed().unwrap().unwrap();
        assert_eq!(reopened.num_docs(), 2);
    }

    #[test]
    fn test_uncommitted_generation_keeps_committed_index() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        build(&builder, &[record("https://example.com/", "Kept", "still here")]);

        {
            let mut generation = builder.begin_generation().unwrap();
            generation
                .add_document(&record("https://example.com/x", "Lost", "never committed"))
                .unwrap();
        }

        let committed = builder.open_committed().unwrap().unwrap();
        let pages = committed.documents().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Kept");

        // The abandoned staging directory does not block the next generation
        let index = build(&builder, &[record("https://example.com/y", "Next", "z")]);
        assert_eq!(index.num_docs(), 1);
    }

    #[test]
    fn test_one_generation_at_a_time() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));

        let first = builder.begin_generation().unwrap();
        assert!(matches!(
            builder.begin_generation(),
            Err(IndexError::GenerationInProgress)
        ));

        drop(first);
        assert!(builder.begin_generation().is_ok());
    }

    #[test]
    fn test_open_committed_without_index() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        assert!(builder.open_committed().unwrap().is_none());
    }

    #[test]
    fn test_documents_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let builder = IndexBuilder::new(dir.path().join("index"));
        let records: Vec<PageRecord> = (0..25)
            .map(|i| record(&format!("https://example.com/{}", i), &format!("Page {}", i), "x"))
            .collect();
        let index = build(&builder, &records);

        let titles: Vec<String> = index.documents().unwrap().into_iter().map(|p| p.title).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("Page {}", i)).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_half_swapped_index_is_restored() {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join("index");
        let builder = IndexBuilder::new(index_dir.clone());
        build(&builder, &[record("https://example.com/", "Kept", "old generation")]);

        // Old generation parked, new one never arrived
        fs::rename(&index_dir, dir.path().join("index.previous")).unwrap();

        let committed = builder.open_committed().unwrap().unwrap();
        assert_eq!(committed.documents().unwrap()[0].title, "Kept");
        assert!(!dir.path().join("index.previous").exists());

        let index = build(&builder, &[record("https://example.com/new", "New", "z")]);
        assert_eq!(index.num_docs(), 1);
    }

    #[test]
    fn test_failed_swap_puts_old_generation_back() {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join("index");
        let builder = IndexBuilder::new(index_dir.clone());
        build(&builder, &[record("https://example.com/", "Kept", "old generation")]);

        let missing_staging = dir.path().join("index.staging");
        assert!(swap_into_place(&missing_staging, &index_dir).is_err());

        assert!(index_dir.join("meta.json").exists());
        assert!(!dir.path().join("index.previous").exists());
        let committed = builder.open_committed().unwrap().unwrap();
        assert_eq!(committed.num_docs(), 1);
    }
}
