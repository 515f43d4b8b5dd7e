//! Builds a [`NameIndex`] from parsed dataset records

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::Utc;

use super::dataset::{self, DatasetRecord, NameKind, RangeNaming, range_name_prefix};
use super::{CodePointEntry, NameIndex};
use crate::cache::fingerprint::Fingerprint;
use crate::error::{CharFinderError, Result};

/// Result of a build: the index and how many malformed records were dropped
#[derive(Debug)]
pub struct BuildOutcome {
    pub index: NameIndex,
    pub skipped: usize,
}

/// Turns dataset records into a [`NameIndex`].
///
/// Malformed records are logged and counted, never fatal. A build that keeps
/// no entry at all fails with [`CharFinderError::EmptyIndex`].
#[derive(Debug, Clone)]
pub struct NameIndexBuilder {
    fingerprint: Fingerprint,
}

impl NameIndexBuilder {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self { fingerprint }
    }

    /// Read, fingerprint and index a dataset file
    pub fn build_from_file(path: &Path) -> Result<BuildOutcome> {
        let bytes = fs::read(path).map_err(|e| CharFinderError::io(path, e))?;
        let fingerprint = Fingerprint::of_bytes(&bytes);
        tracing::info!(
            "Building name index from {} ({} bytes)",
            path.display(),
            bytes.len()
        );
        Self::new(fingerprint).build_from_bytes(&bytes)
    }

    pub fn build_from_text(&self, text: &str) -> Result<BuildOutcome> {
        self.build(dataset::records(text))
    }

    /// Index raw dataset bytes; undecodable lines count as skipped
    pub fn build_from_bytes(&self, bytes: &[u8]) -> Result<BuildOutcome> {
        self.build(dataset::records_from_bytes(bytes))
    }

    pub fn build(
        &self,
        records: impl IntoIterator<Item = Result<DatasetRecord>>,
    ) -> Result<BuildOutcome> {
        let mut state = BuildState::default();

        for record in records {
            match record {
                Ok(record) => state.accept(record),
                Err(e) => state.skip(&e.to_string()),
            }
        }
        if let Some(start) = state.range_start.take() {
            state.skip(&format!(
                "line {}: range start U+{:04X} has no matching end",
                start.line, start.code_point
            ));
        }

        let BuildState {
            entries, skipped, ..
        } = state;
        if entries.is_empty() {
            return Err(CharFinderError::EmptyIndex { skipped });
        }

        let index = NameIndex::from_entries(entries, self.fingerprint.clone(), Utc::now());
        tracing::info!(
            "Built name index with {} entries ({} records skipped)",
            index.len(),
            skipped
        );
        Ok(BuildOutcome { index, skipped })
    }
}

#[derive(Default)]
struct BuildState {
    entries: Vec<CodePointEntry>,
    seen: HashSet<u32>,
    range_start: Option<DatasetRecord>,
    skipped: usize,
}

impl BuildState {
    fn skip(&mut self, reason: &str) {
        tracing::warn!("Skipping dataset record: {}", reason);
        self.skipped += 1;
    }

    fn push(&mut self, line: usize, entry: CodePointEntry) {
        if self.seen.insert(entry.code_point) {
            self.entries.push(entry);
        } else {
            self.skip(&format!(
                "line {line}: duplicate code point U+{:04X}",
                entry.code_point
            ));
        }
    }

    fn accept(&mut self, record: DatasetRecord) {
        let kind = record.name_kind();

        if !matches!(kind, NameKind::RangeEnd(_))
            && let Some(start) = self.range_start.take()
        {
            self.skip(&format!(
                "line {}: range start U+{:04X} has no matching end",
                start.line, start.code_point
            ));
        }

        match kind {
            NameKind::Literal(name) => {
                let mut entry = CodePointEntry::new(record.code_point, name);
                if let Some(alternate) = record.alternate_name.as_deref()
                    && alternate != name
                {
                    entry = entry.with_alternate(alternate);
                }
                self.push(record.line, entry);
            }
            NameKind::Control => match record.alternate_name {
                Some(ref alternate) => {
                    let entry = CodePointEntry::new(record.code_point, alternate.as_str());
                    self.push(record.line, entry);
                }
                None => tracing::debug!(
                    "Control character U+{:04X} has no usable name",
                    record.code_point
                ),
            },
            NameKind::RangeStart(_) => {
                self.range_start = Some(record);
            }
            NameKind::RangeEnd(label) => {
                let Some(start) = self.range_start.take() else {
                    self.skip(&format!(
                        "line {}: range end U+{:04X} without a start",
                        record.line, record.code_point
                    ));
                    return;
                };
                let start_label = match start.name_kind() {
                    NameKind::RangeStart(label) => label,
                    _ => "",
                };
                if start_label != label || start.code_point > record.code_point {
                    self.skip(&format!(
                        "line {}: range <{}> does not close range <{}> opened at line {}",
                        record.line, label, start_label, start.line
                    ));
                    return;
                }
                match range_name_prefix(label) {
                    Some(naming) => self.expand_range(&start, &record, naming),
                    None => tracing::debug!(
                        "Range <{}> U+{:04X}..U+{:04X} has no character names",
                        label,
                        start.code_point,
                        record.code_point
                    ),
                }
            }
            NameKind::Placeholder(label) => tracing::debug!(
                "Ignoring placeholder name <{}> for U+{:04X}",
                label,
                record.code_point
            ),
        }
    }

    fn expand_range(&mut self, start: &DatasetRecord, end: &DatasetRecord, naming: RangeNaming) {
        let before = self.entries.len();
        for code_point in start.code_point..=end.code_point {
            if let Some(name) = naming.name_for(code_point) {
                self.push(end.line, CodePointEntry::new(code_point, name));
            }
        }
        tracing::debug!(
            "Expanded range U+{:04X}..U+{:04X} into {} entries",
            start.code_point,
            end.code_point,
            self.entries.len() - before
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
0009;<control>;Cc;0;S;;;;;N;CHARACTER TABULATION;;;;
0080;<control>;Cc;0;BN;;;;;N;;;;;
0041;LATIN CAPITAL LETTER A;Lu;0;L;;;;;N;;;;0061;
00A6;BROKEN BAR;So;0;ON;;;;;N;BROKEN VERTICAL BAR;;;;
2603;SNOWMAN;So;0;ON;;;;;N;;;;;
4E00;<CJK Ideograph, First>;Lo;0;L;;;;;N;;;;;
4E02;<CJK Ideograph, Last>;Lo;0;L;;;;;N;;;;;
AC00;<Hangul Syllable, First>;Lo;0;L;;;;;N;;;;;
AC01;<Hangul Syllable, Last>;Lo;0;L;;;;;N;;;;;
E000;<Private Use, First>;Co;0;L;;;;;N;;;;;
F8FF;<Private Use, Last>;Co;0;L;;;;;N;;;;;
";

    fn builder() -> NameIndexBuilder {
        NameIndexBuilder::new(Fingerprint::of_bytes(SAMPLE.as_bytes()))
    }

    fn names(index: &NameIndex) -> Vec<(u32, String)> {
        index
            .entries()
            .map(|e| (e.code_point, e.canonical_name.clone()))
            .collect()
    }

    #[test]
    fn test_builds_named_entries() {
        let outcome = builder().build_from_text(SAMPLE).unwrap();
        assert_eq!(outcome.skipped, 0);
        assert_eq!(
            names(&outcome.index),
            vec![
                (0x0009, "CHARACTER TABULATION".to_string()),
                (0x0041, "LATIN CAPITAL LETTER A".to_string()),
                (0x00A6, "BROKEN BAR".to_string()),
                (0x2603, "SNOWMAN".to_string()),
                (0x4E00, "CJK UNIFIED IDEOGRAPH-4E00".to_string()),
                (0x4E01, "CJK UNIFIED IDEOGRAPH-4E01".to_string()),
                (0x4E02, "CJK UNIFIED IDEOGRAPH-4E02".to_string()),
                (0xAC00, "HANGUL SYLLABLE GA".to_string()),
                (0xAC01, "HANGUL SYLLABLE GAG".to_string()),
            ]
        );
        assert_eq!(
            outcome.index.get(0x00A6).unwrap().alternate_names,
            vec!["BROKEN VERTICAL BAR".to_string()]
        );
    }

    #[test]
    fn test_malformed_records_are_counted() {
        let text = "\
2603;SNOWMAN;So;0;ON;;;;;N;;;;;
not a record
2603;SNOWMAN AGAIN;So;0;ON;;;;;N;;;;;
XYZ;BAD HEX;So;0;ON;;;;;N;;;;;
3400;<CJK Ideograph Extension A, First>;Lo;0;L;;;;;N;;;;;
2764;HEAVY BLACK HEART;So;0;ON;;;;;N;;;;;
9FFF;<CJK Ideograph, Last>;Lo;0;L;;;;;N;;;;;
";
        let outcome = builder().build_from_text(text).unwrap();
        // short line, duplicate, bad hex, unclosed range start, orphan range end
        assert_eq!(outcome.skipped, 5);
        assert_eq!(outcome.index.len(), 2);
        assert_eq!(outcome.index.get(0x2603).unwrap().canonical_name, "SNOWMAN");
    }

    #[test]
    fn test_undecodable_lines_are_skipped() {
        let bytes = b"2603;SN\xFFOWMAN;So;0;ON;;;;;N;;;;;\n2604;COMET;So;0;ON;;;;;N;;;;;\n";
        let outcome = builder().build_from_bytes(bytes).unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.index.len(), 1);
        assert!(outcome.index.get(0x2603).is_none());
        assert_eq!(outcome.index.get(0x2604).unwrap().canonical_name, "COMET");

        let err = builder().build_from_bytes(b"\xFE\xFF\n").unwrap_err();
        assert!(matches!(err, CharFinderError::EmptyIndex { skipped: 1 }));
    }

    #[test]
    fn test_empty_dataset_fails() {
        let err = builder().build_from_text("").unwrap_err();
        assert!(matches!(err, CharFinderError::EmptyIndex { skipped: 0 }));

        let err = builder().build_from_text("garbage\nmore garbage\n").unwrap_err();
        assert!(matches!(err, CharFinderError::EmptyIndex { skipped: 2 }));
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = builder().build_from_text(SAMPLE).unwrap().index;
        let second = builder().build_from_text(SAMPLE).unwrap().index;

        let first: Vec<_> = first.entries().cloned().collect();
        let second: Vec<_> = second.entries().cloned().collect();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_build_from_file_fingerprints_contents() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("UnicodeData.txt");
        fs::write(&path, SAMPLE).unwrap();

        let outcome = NameIndexBuilder::build_from_file(&path).unwrap();
        assert_eq!(
            outcome.index.fingerprint(),
            &Fingerprint::of_bytes(SAMPLE.as_bytes())
        );

        let missing = NameIndexBuilder::build_from_file(&temp_dir.path().join("absent.txt"));
        assert!(matches!(missing, Err(CharFinderError::Io { .. })));
    }
}
