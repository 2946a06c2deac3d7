//! Evaluation dataset cleanup and validation/test split.

use std::collections::HashSet;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{DataError, DataResult, DataSettings, TRACING_TARGET};

/// One question/answer row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Raw CSV row; empty fields read as `None`.
#[derive(Debug, Deserialize)]
struct RawRow {
    question: Option<String>,
    answer: Option<String>,
}

/// Outcome of a preprocessing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessReport {
    /// Rows read from the source file.
    pub rows_read: usize,
    /// Rows left after cleanup.
    pub rows_kept: usize,
    /// Rows in the validation set.
    pub validation: usize,
    /// Rows in the test set.
    pub test: usize,
}

/// Drops rows with a missing or blank field, then duplicate questions, then
/// duplicate answers. The first occurrence wins.
pub fn cleanup(rows: Vec<(Option<String>, Option<String>)>) -> Vec<QaPair> {
    let complete = rows.into_iter().filter_map(|(question, answer)| {
        let question = question.filter(|q| !q.trim().is_empty())?;
        let answer = answer.filter(|a| !a.trim().is_empty())?;
        Some(QaPair { question, answer })
    });

    let mut questions = HashSet::new();
    let unique_questions: Vec<QaPair> = complete
        .filter(|pair| questions.insert(pair.question.clone()))
        .collect();

    let mut answers = HashSet::new();
    unique_questions
        .into_iter()
        .filter(|pair| answers.insert(pair.answer.clone()))
        .collect()
}

/// Samples `round(frac * n)` rows with a seeded RNG as the validation set.
///
/// The remaining rows keep their original order and form the test set.
pub fn split(rows: Vec<QaPair>, frac: f64, seed: u64) -> (Vec<QaPair>, Vec<QaPair>) {
    let take = ((rows.len() as f64) * frac.clamp(0.0, 1.0)).round_ties_even() as usize;

    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let sampled = &order[..take.min(rows.len())];

    let mut in_validation = vec![false; rows.len()];
    for &i in sampled {
        in_validation[i] = true;
    }

    let validation = sampled.iter().map(|&i| rows[i].clone()).collect();
    let test = rows
        .into_iter()
        .zip(in_validation)
        .filter_map(|(row, validation)| (!validation).then_some(row))
        .collect();

    (validation, test)
}

/// Cleans the configured source CSV and writes the validation and test sets.
pub fn preprocess(settings: &DataSettings, data_dir: &Path) -> DataResult<PreprocessReport> {
    settings.validate()?;

    let source = data_dir.join(&settings.eval_src_file);
    let rows = read_rows(&source)?;
    let rows_read = rows.len();

    let cleaned = cleanup(rows);
    let rows_kept = cleaned.len();
    let (validation, test) = split(cleaned, settings.split_frac, settings.split_seed);

    write_rows(&data_dir.join(&settings.val_file), &validation)?;
    write_rows(&data_dir.join(&settings.test_file), &test)?;

    let report = PreprocessReport {
        rows_read,
        rows_kept,
        validation: validation.len(),
        test: test.len(),
    };

    tracing::info!(
        target: TRACING_TARGET,
        source = %source.display(),
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        validation = report.validation,
        test = report.test,
        "Evaluation dataset preprocessed"
    );

    Ok(report)
}

fn read_rows(path: &Path) -> DataResult<Vec<(Option<String>, Option<String>)>> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?;
    for column in ["question", "answer"] {
        if !headers.iter().any(|header| header == column) {
            return Err(DataError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    reader
        .deserialize::<RawRow>()
        .map(|row| {
            let row = row?;
            Ok((row.question, row.answer))
        })
        .collect()
}

fn write_rows(path: &Path, rows: &[QaPair]) -> DataResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(["question", "answer"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| DataError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(q: Option<&str>, a: Option<&str>) -> (Option<String>, Option<String>) {
        (q.map(str::to_owned), a.map(str::to_owned))
    }

    fn pair(q: &str, a: &str) -> QaPair {
        QaPair {
            question: q.into(),
            answer: a.into(),
        }
    }

    #[test]
    fn cleanup_drops_missing_and_duplicates() {
        let cleaned = cleanup(vec![
            row(Some("q1"), Some("a1")),
            row(None, Some("a2")),
            row(Some("q3"), Some("  ")),
            row(Some("q1"), Some("a4")),
            row(Some("q5"), Some("a1")),
            row(Some("q6"), Some("a6")),
        ]);

        assert_eq!(cleaned, vec![pair("q1", "a1"), pair("q6", "a6")]);
    }

    #[test]
    fn split_is_seeded_and_partitions_rows() {
        let rows: Vec<_> = (0..10)
            .map(|i| pair(&format!("q{i}"), &format!("a{i}")))
            .collect();

        let (validation, test) = split(rows.clone(), 0.3, 7);
        assert_eq!(validation.len(), 3);
        assert_eq!(test.len(), 7);

        let (again, _) = split(rows.clone(), 0.3, 7);
        assert_eq!(validation, again);

        // Test rows keep source order.
        let positions: Vec<_> = test
            .iter()
            .map(|p| rows.iter().position(|r| r == p).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(validation.iter().all(|v| !test.contains(v)));
    }

    #[test]
    fn split_handles_extremes() {
        let rows = vec![pair("q", "a")];
        assert_eq!(split(rows.clone(), 0.0, 0), (vec![], rows.clone()));
        assert_eq!(split(rows.clone(), 1.0, 0), (rows, vec![]));
    }

    #[test]
    fn preprocess_writes_both_sets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("eval.csv"),
            "question,answer,source\n\
             What reduces fever?,Aspirin,wiki\n\
             ,Orphan answer,wiki\n\
             What reduces fever?,Ibuprofen,wiki\n\
             What is insulin?,A hormone,wiki\n\
             What is calcium?,A mineral,wiki\n",
        )
        .unwrap();

        let settings = DataSettings {
            eval_src_file: "eval.csv".into(),
            split_frac: 0.5,
            split_seed: 0,
            val_file: "splits/val.csv".into(),
            test_file: "splits/test.csv".into(),
            knowledge_dset: "wiki.jsonl".into(),
            knowledge_path: "knowledge".into(),
        };

        let report = preprocess(&settings, dir.path()).unwrap();
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_kept, 3);
        assert_eq!(report.validation + report.test, 3);

        let mut reader = csv::Reader::from_path(dir.path().join("splits/test.csv")).unwrap();
        let headers: Vec<_> = reader.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["question", "answer"]);
    }

    #[test]
    fn missing_answer_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("eval.csv"),
            "question,source\nWhat reduces fever?,wiki\n",
        )
        .unwrap();

        let settings = DataSettings {
            eval_src_file: "eval.csv".into(),
            split_frac: 0.5,
            split_seed: 0,
            val_file: "val.csv".into(),
            test_file: "test.csv".into(),
            knowledge_dset: "wiki.jsonl".into(),
            knowledge_path: "knowledge".into(),
        };

        let err = preprocess(&settings, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingColumn {
                column: "answer",
                ..
            }
        ));
        assert!(!dir.path().join("val.csv").exists());
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let settings = DataSettings {
            eval_src_file: "eval.csv".into(),
            split_frac: 1.5,
            split_seed: 0,
            val_file: "val.csv".into(),
            test_file: "test.csv".into(),
            knowledge_dset: "wiki.jsonl".into(),
            knowledge_path: "knowledge".into(),
        };

        let err = preprocess(&settings, Path::new(".")).unwrap_err();
        assert!(matches!(err, DataError::InvalidConfig(_)));
    }
}
