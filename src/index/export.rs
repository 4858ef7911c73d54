//! Search payload export
//!
//! The frontend reads a single JSON array of `{url, title, text}` objects.
//! The file is replaced atomically, so a reader never sees a partial payload.

use crate::index::builder::CommittedIndex;
use crate::index::ExportError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// One entry of the exported payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Exports every committed document to `path`
///
/// # Returns
///
/// The number of documents written.
pub fn export_index(index: &CommittedIndex, path: &Path) -> Result<usize, ExportError> {
    let documents: Vec<ExportDocument> = index
        .documents()?
        .into_iter()
        .map(|page| ExportDocument {
            url: page.url,
            title: page.title,
            text: page.text,
        })
        .collect();

    write_export(path, &documents)?;
    tracing::info!("Exported {} documents to {}", documents.len(), path.display());
    Ok(documents.len())
}

/// Writes `documents` as a JSON array, replacing `path` atomically
pub fn write_export(path: &Path, documents: &[ExportDocument]) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let file = File::create(&temp_path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, documents)?;
    out.flush().map_err(io_error)?;
    out.get_ref().sync_all().map_err(io_error)?;
    drop(out);

    fs::rename(&temp_path, path).map_err(io_error)
}

/// Reads an exported payload back
pub fn read_export(path: &Path) -> Result<Vec<ExportDocument>, ExportError> {
    let file = File::open(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
