use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::extractor::PdfExtractor;
use crate::models::{Chunk, IngestRecord};
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Hex characters of the fingerprint folded into every record id.
pub const ID_FINGERPRINT_CHARS: usize = 16;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Turns request paths into forward-slash form.
pub fn normalize_path_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn file_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

/// Stable id of the chunk at `index`. The same content under the same name
/// maps to the same ids, distinct content never shares them.
pub fn record_id(index: usize, file_name: &str, fingerprint: &str) -> String {
    let short = fingerprint
        .get(..ID_FINGERPRINT_CHARS)
        .unwrap_or(fingerprint);
    format!("chunk-{index}-{file_name}-{short}")
}

pub fn records_from_chunks(
    chunks: Vec<Chunk>,
    file_name: &str,
    fingerprint: &str,
) -> Vec<IngestRecord> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| IngestRecord {
            id: record_id(index, file_name, fingerprint),
            page_no: chunk.page_label(),
            source: file_name.to_string(),
            chunk_text: chunk.chunk_text,
            source_hash_value: fingerprint.to_string(),
        })
        .collect()
}

/// Extracts and chunks one PDF into records stamped with `fingerprint`.
///
/// The fingerprint is the one the caller checked for duplicates, so the
/// stored `source_hash_value` always matches the value that was looked up.
pub fn build_records(
    path: &Path,
    fingerprint: &str,
    config: ChunkingConfig,
    extractor: &impl PdfExtractor,
) -> Result<Vec<IngestRecord>, IngestError> {
    config.validate()?;

    let name = file_name(path)?;
    let pages = extractor.extract_pages(path)?;
    let chunks = chunk_pages(&pages, config)?;

    debug!(
        source = %name,
        pages = pages.len(),
        chunks = chunks.len(),
        stride = config.stride(),
        "chunked document"
    );

    Ok(records_from_chunks(chunks, &name, fingerprint))
}
