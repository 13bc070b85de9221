//! JSON-lines match source: one [`MatchRecord`] per line

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::MatchRecord;
use crate::store::MatchSource;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Streams records from a newline-delimited JSON file
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MatchSource for JsonLinesSource {
    fn for_each_record(
        &mut self,
        visit: &mut dyn FnMut(StoreResult<MatchRecord>),
    ) -> StoreResult<()> {
        let file = File::open(&self.path).map_err(|e| StoreError::Open {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            visit(
                serde_json::from_str(trimmed)
                    .map_err(|e| StoreError::malformed(format!("line {}", lineno + 1), e)),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_records_and_flags_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"record_id": 1, "teams": [{{"victory": true, "players": [{{"champion": 412}}]}}]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{broken").unwrap();
        writeln!(file, r#"{{"record_id": 2, "teams": []}}"#).unwrap();

        let mut source = JsonLinesSource::new(file.path());
        let mut ids = Vec::new();
        let mut errors = Vec::new();
        source
            .for_each_record(&mut |r| match r {
                Ok(record) => ids.push(record.record_id),
                Err(e) => errors.push(e.to_string()),
            })
            .unwrap();

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("line 3"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut source = JsonLinesSource::new("/definitely/not/here.jsonl");
        assert!(source.for_each_record(&mut |_| {}).is_err());
    }
}
