//! Knowledge corpus extraction.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{DataError, DataResult, DataSettings, TRACING_TARGET};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("constant pattern compiles"));

/// One knowledge base article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Article title.
    pub page_title: String,
    /// Article body.
    pub page_text: String,
}

/// Outcome of an extraction run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    /// Records read from the export.
    pub records: usize,
    /// Files created.
    pub written: usize,
    /// Records whose file already existed or whose title was empty.
    pub skipped: usize,
}

/// Replaces every character outside `[\w\s]` with `-`.
pub fn sanitize_title(title: &str) -> String {
    NON_WORD.replace_all(title, "-").into_owned()
}

/// Extracts the configured knowledge export into the knowledge directory.
pub fn extract(settings: &DataSettings, data_dir: &Path) -> DataResult<ExtractReport> {
    let source = data_dir.join(&settings.knowledge_dset);
    let dest = data_dir.join(&settings.knowledge_path);
    extract_records(&source, &dest)
}

/// Writes one `<sanitized title>.txt` per record of a JSON-lines file.
///
/// Existing files are left untouched.
pub fn extract_records(source: &Path, dest: &Path) -> DataResult<ExtractReport> {
    fs::create_dir_all(dest).map_err(|e| DataError::io(dest, e))?;
    let reader = BufReader::new(File::open(source).map_err(|e| DataError::io(source, e))?);

    let mut report = ExtractReport::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DataError::io(source, e))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: KnowledgeRecord =
            serde_json::from_str(&line).map_err(|e| DataError::Record {
                path: source.to_path_buf(),
                line: number + 1,
                source: e,
            })?;
        report.records += 1;

        let title = sanitize_title(&record.page_title);
        if title.trim().is_empty() {
            tracing::warn!(target: TRACING_TARGET, line = number + 1, "Record without title");
            report.skipped += 1;
            continue;
        }

        let path = dest.join(format!("{title}.txt"));
        if path.exists() {
            report.skipped += 1;
            continue;
        }

        fs::write(&path, record.page_text).map_err(|e| DataError::io(&path, e))?;
        report.written += 1;
    }

    tracing::info!(
        target: TRACING_TARGET,
        source = %source.display(),
        dest = %dest.display(),
        records = report.records,
        written = report.written,
        skipped = report.skipped,
        "Knowledge corpus extracted"
    );

    Ok(report)
}
