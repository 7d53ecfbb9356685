//! CSV loading for the observation and reference datasets.
//!
//! Files are decoded as UTF-8 with a Windows-1252 fallback (Latin-1 exports),
//! columns are located by header alias, and every field is trimmed and
//! null-coalesced. Short rows are padded with empty fields. A row the reader
//! fails on (an I/O error mid-stream) is kept as `row-<n>` with empty fields.

use csv::StringRecord;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::io;
use std::path::Path;

use crate::error::LoadError;
use crate::models::{Observation, ReferenceEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Column {
    ObservationId,
    Org,
    Conf,
    Foray,
    ReferenceId,
    Historical,
    Current,
    Authors,
    Year,
    Hyperlink,
}

/// Lowercased header -> observation column.
static OBSERVATION_ALIASES: Lazy<FxHashMap<&'static str, Column>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("id", Column::ObservationId);
    m.insert("foray_id", Column::ObservationId);
    m.insert("genus_and_species_org_entry", Column::Org);
    m.insert("org_entry", Column::Org);
    m.insert("genus_and_species_conf", Column::Conf);
    m.insert("conf_name", Column::Conf);
    m.insert("genus_and_species_foray_name", Column::Foray);
    m.insert("foray_name", Column::Foray);
    m
});

/// Lowercased header -> reference column (MycoBank export names first).
static REFERENCE_ALIASES: Lazy<FxHashMap<&'static str, Column>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("mycobank #", Column::ReferenceId);
    m.insert("mycobank_id", Column::ReferenceId);
    m.insert("id", Column::ReferenceId);
    m.insert("taxon name", Column::Historical);
    m.insert("taxon_name", Column::Historical);
    m.insert("current name.taxon name", Column::Current);
    m.insert("current_name", Column::Current);
    m.insert("authors", Column::Authors);
    m.insert("year of effective publication", Column::Year);
    m.insert("year", Column::Year);
    m.insert("hyperlink", Column::Hyperlink);
    m
});

/// Loaded records plus how many rows had to be recovered with empty fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset<T> {
    pub records: Vec<T>,
    pub recovered_rows: usize,
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            recovered_rows: 0,
        }
    }
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match content.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => content,
    })
}

/// Map each known column to its first position in the header.
fn column_positions(
    headers: &StringRecord,
    aliases: &FxHashMap<&'static str, Column>,
) -> FxHashMap<Column, usize> {
    let mut positions = FxHashMap::default();
    for (i, header) in headers.iter().enumerate() {
        let key = header.trim().to_lowercase();
        if let Some(&column) = aliases.get(key.as_str()) {
            positions.entry(column).or_insert(i);
        }
    }
    positions
}

fn require(
    positions: &FxHashMap<Column, usize>,
    column: Column,
    name: &'static str,
    source: &Path,
) -> Result<usize, LoadError> {
    positions
        .get(&column)
        .copied()
        .ok_or_else(|| LoadError::MissingColumn {
            path: source.to_path_buf(),
            column: name,
        })
}

/// Trimmed field, or "" when the row is short.
fn field(record: &StringRecord, pos: Option<usize>) -> &str {
    pos.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn reader<R: io::Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(rdr)
}

fn headers<R: io::Read>(
    reader: &mut csv::Reader<R>,
    source: &Path,
) -> Result<StringRecord, LoadError> {
    reader
        .headers()
        .cloned()
        .map_err(|source_err| LoadError::Header {
            path: source.to_path_buf(),
            source: source_err,
        })
}

/// Parse observation CSV. `source` is only used in error messages.
pub fn parse_observations<R: io::Read>(
    rdr: R,
    source: &Path,
) -> Result<Dataset<Observation>, LoadError> {
    let mut reader = reader(rdr);
    let positions = column_positions(&headers(&mut reader, source)?, &OBSERVATION_ALIASES);

    let id = require(&positions, Column::ObservationId, "id", source)?;
    let org = require(&positions, Column::Org, "genus_and_species_org_entry", source)?;
    let conf = require(&positions, Column::Conf, "genus_and_species_conf", source)?;
    let foray = require(&positions, Column::Foray, "genus_and_species_foray_name", source)?;

    let mut dataset = Dataset::default();
    for (n, result) in reader.records().enumerate() {
        let observation = match result {
            Ok(record) => Observation::new(
                field(&record, Some(id)),
                field(&record, Some(org)),
                field(&record, Some(conf)),
                field(&record, Some(foray)),
            ),
            Err(_) => {
                dataset.recovered_rows += 1;
                Observation::new(&format!("row-{}", n + 1), "", "", "")
            }
        };
        dataset.records.push(observation);
    }
    Ok(dataset)
}

/// Parse reference CSV. Metadata columns are optional.
pub fn parse_references<R: io::Read>(
    rdr: R,
    source: &Path,
) -> Result<Dataset<ReferenceEntry>, LoadError> {
    let mut reader = reader(rdr);
    let positions = column_positions(&headers(&mut reader, source)?, &REFERENCE_ALIASES);

    let id = require(&positions, Column::ReferenceId, "MycoBank #", source)?;
    let historical = require(&positions, Column::Historical, "Taxon name", source)?;
    let current = require(&positions, Column::Current, "Current name.Taxon name", source)?;
    let authors = positions.get(&Column::Authors).copied();
    let year = positions.get(&Column::Year).copied();
    let hyperlink = positions.get(&Column::Hyperlink).copied();

    let mut dataset = Dataset::default();
    for (n, result) in reader.records().enumerate() {
        let entry = match result {
            Ok(record) => ReferenceEntry::new(
                field(&record, Some(id)),
                field(&record, Some(historical)),
                field(&record, Some(current)),
            )
            .with_metadata(
                field(&record, authors),
                field(&record, year),
                field(&record, hyperlink),
            ),
            Err(_) => {
                dataset.recovered_rows += 1;
                ReferenceEntry::new(&format!("row-{}", n + 1), "", "")
            }
        };
        dataset.records.push(entry);
    }
    Ok(dataset)
}

pub fn load_observations(path: &Path) -> Result<Dataset<Observation>, LoadError> {
    let content = read_file_as_utf8(path)?;
    parse_observations(content.as_bytes(), path)
}

pub fn load_references(path: &Path) -> Result<Dataset<ReferenceEntry>, LoadError> {
    let content = read_file_as_utf8(path)?;
    parse_references(content.as_bytes(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn src() -> PathBuf {
        PathBuf::from("test.csv")
    }

    #[test]
    fn test_parse_observations() {
        let csv = "id,genus_and_species_org_entry,genus_and_species_conf,genus_and_species_foray_name\n\
                   F1, Amanita muscaria ,Amanita muscaria,Amanita muscaria\n\
                   F2,Boletus,,\n";
        let dataset = parse_observations(csv.as_bytes(), &src()).unwrap();

        assert_eq!(dataset.recovered_rows, 0);
        assert_eq!(
            dataset.records,
            vec![
                Observation::new("F1", "Amanita muscaria", "Amanita muscaria", "Amanita muscaria"),
                Observation::new("F2", "Boletus", "", ""),
            ]
        );
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = "id,org_entry,conf_name,foray_name\nF1,Amanita\nF2\n";
        let dataset = parse_observations(csv.as_bytes(), &src()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].variants(), ["Amanita", "", ""]);
        assert_eq!(dataset.records[1].id, "F2");
        assert_eq!(dataset.records[1].variants(), ["", "", ""]);
    }

    #[test]
    fn test_column_order_and_extra_columns() {
        let csv = "notes,genus_and_species_foray_name,ID,genus_and_species_conf,genus_and_species_org_entry\n\
                   x,Cc,F9,Bb,Aa\n";
        let dataset = parse_observations(csv.as_bytes(), &src()).unwrap();
        assert_eq!(dataset.records, vec![Observation::new("F9", "Aa", "Bb", "Cc")]);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "id,genus_and_species_org_entry,genus_and_species_conf\nF1,a,b\n";
        let err = parse_observations(csv.as_bytes(), &src()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn {
                column: "genus_and_species_foray_name",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_references_with_metadata() {
        let csv = "MycoBank #,Taxon name,Current name.Taxon name,Authors,Year of effective publication,Hyperlink\n\
                   MB1,Agaricus campestris,Agaricus campestris,L.,1753,https://www.mycobank.org/MB1\n\
                   MB2,Psalliota arvensis,,,,\n";
        let dataset = parse_references(csv.as_bytes(), &src()).unwrap();

        let first = &dataset.records[0];
        assert_eq!(first.id, "MB1");
        assert_eq!(first.authors, "L.");
        assert_eq!(first.year, "1753");
        assert_eq!(first.hyperlink, "https://www.mycobank.org/MB1");

        let second = &dataset.records[1];
        assert_eq!(second.preferred_name(), "Psalliota arvensis");
        assert_eq!(second.authors, "");
    }

    #[test]
    fn test_references_without_optional_columns() {
        let csv = "mycobank_id,taxon_name,current_name\nMB7,Russula emetica,\n";
        let dataset = parse_references(csv.as_bytes(), &src()).unwrap();
        assert_eq!(dataset.records, vec![ReferenceEntry::new("MB7", "Russula emetica", "")]);
    }

    /// Yields `chunks` in order, failing once where a chunk is `None`.
    struct FlakyReader {
        chunks: Vec<Option<&'static [u8]>>,
    }

    impl io::Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(io::ErrorKind::Other, "device hiccup")),
            }
        }
    }

    #[test]
    fn test_read_error_row_is_recovered() {
        let rdr = FlakyReader {
            chunks: vec![
                Some(&b"id,org_entry,conf_name,foray_name\nF1,Aa,Bb,Cc\n"[..]),
                None,
            ],
        };
        let dataset = parse_observations(rdr, &src()).unwrap();

        assert_eq!(dataset.recovered_rows, 1);
        assert_eq!(
            dataset.records,
            vec![
                Observation::new("F1", "Aa", "Bb", "Cc"),
                Observation::new("row-2", "", "", ""),
            ]
        );
    }

    #[test]
    fn test_empty_dataset_default() {
        let dataset: Dataset<Observation> = Dataset::default();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.recovered_rows, 0);

        let header = "id,org_entry,conf_name,foray_name\n";
        let dataset = parse_observations(header.as_bytes(), &src()).unwrap();
        assert_eq!(dataset, Dataset::default());
    }

    #[test]
    fn test_load_missing_file_is_input_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        let err = load_references(&missing).unwrap_err();
        assert!(matches!(err, LoadError::InputUnavailable { .. }));
    }

    #[test]
    fn test_load_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MBList.csv");
        // "Cortinarius bulliardii (Pers.) Fr." with a Latin-1 'ü' in the authors
        let mut bytes = b"MycoBank #,Taxon name,Current name.Taxon name,Authors\n".to_vec();
        bytes.extend_from_slice(b"MB3,Cortinarius bulliardii,,M\xfcller\n");
        std::fs::write(&path, bytes).unwrap();

        let dataset = load_references(&path).unwrap();
        assert_eq!(dataset.records[0].authors, "Müller");
    }

    #[test]
    fn test_load_utf8_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foray.csv");
        std::fs::write(
            &path,
            "\u{FEFF}id,org_entry,conf_name,foray_name\nF1,Lépista nuda,Lepista nuda,Lepista nuda\n",
        )
        .unwrap();

        let dataset = load_observations(&path).unwrap();
        assert_eq!(dataset.records[0].id, "F1");
        assert_eq!(dataset.records[0].org, "Lépista nuda");
    }
}
