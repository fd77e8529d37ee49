//! CSV ingestion with encoding fallback and delimiter sniffing.
//!
//! Turns uploaded bytes into a lazy, single-pass sequence of rows, each a map
//! from header name to cell value. Nothing roster-specific happens here.

use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use crate::error::{IngestError, IngestResult};
use crate::models::RowFields;

/// Delimiters tried, in order.
pub const DELIMITER_CANDIDATES: [u8; 2] = [b';', b','];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encoding the content was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject anything not named `*.csv`.
pub fn check_filename(filename: &str) -> IngestResult<()> {
    if filename.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(IngestError::Validation(format!(
            "'{}' does not have a .csv extension",
            filename
        )))
    }
}

/// Decode as UTF-8 (skipping a BOM), falling back to Latin-1.
pub fn decode_content(bytes: &[u8]) -> IngestResult<(String, Encoding)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => Ok((text.to_string(), Encoding::Utf8)),
        // WHATWG resolves every latin-1 label to windows-1252, which maps
        // every byte; C1 bytes such as 0x80 decode to their 1252 glyphs.
        Err(utf8_err) => encoding_rs::WINDOWS_1252
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text.into_owned(), Encoding::Latin1))
            .ok_or_else(|| {
                IngestError::Decode(format!("invalid UTF-8 ({}) and invalid Latin-1", utf8_err))
            }),
    }
}

/// Count each candidate outside quotes on the first line.
///
/// Returns the candidate with a unique, strictly greatest non-zero count.
pub fn sniff_delimiter(content: &str) -> Option<u8> {
    let first_line = content.lines().next().unwrap_or("");
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;

    for byte in first_line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(i) = DELIMITER_CANDIDATES.iter().position(|&d| d == byte) {
                counts[i] += 1;
            }
        }
    }

    let best = *counts.iter().max()?;
    if best == 0 || counts.iter().filter(|&&c| c == best).count() > 1 {
        return None;
    }
    counts
        .iter()
        .position(|&c| c == best)
        .map(|i| DELIMITER_CANDIDATES[i])
}

fn reader_for(content: String, delimiter: u8) -> csv::Reader<Cursor<String>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(content))
}

fn read_headers(reader: &mut csv::Reader<Cursor<String>>) -> IngestResult<Vec<String>> {
    let headers = reader
        .headers()
        .map_err(|e| IngestError::Header(e.to_string()))?;
    Ok(headers.iter().map(str::to_string).collect())
}

/// Header row and reader, with the delimiter resolved.
fn open_reader(
    content: String,
) -> IngestResult<(u8, Vec<String>, csv::Reader<Cursor<String>>)> {
    if content.trim().is_empty() {
        return Err(IngestError::Header("the file is empty".into()));
    }

    if let Some(delimiter) = sniff_delimiter(&content) {
        let mut reader = reader_for(content, delimiter);
        let headers = read_headers(&mut reader)?;
        return Ok((delimiter, headers, reader));
    }

    for delimiter in DELIMITER_CANDIDATES {
        let mut reader = reader_for(content.clone(), delimiter);
        let headers = read_headers(&mut reader)?;
        if headers.len() > 1 {
            return Ok((delimiter, headers, reader));
        }
    }

    Err(IngestError::Header(
        "no delimiter among ';' and ',' splits the header into several columns".into(),
    ))
}

/// Lazy row sequence over an ingested CSV. Consumed once.
pub struct CsvRows {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Cursor<String>>,
}

impl Iterator for CsvRows {
    type Item = IngestResult<RowFields>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|record| {
                    self.headers
                        .iter()
                        .zip(record.iter())
                        .map(|(header, value)| (header.clone(), value.to_string()))
                        .collect()
                })
                .map_err(|e| IngestError::Record {
                    line: e.position().map(|p| p.line()).unwrap_or(0),
                    message: e.to_string(),
                }),
        )
    }
}

/// An uploaded CSV with its detected settings, ready to be iterated.
pub struct IngestedCsv {
    pub encoding: Encoding,
    pub delimiter: u8,
    pub headers: Vec<String>,
    rows: CsvRows,
}

impl IngestedCsv {
    pub fn delimiter_char(&self) -> char {
        self.delimiter as char
    }

    pub fn into_rows(self) -> CsvRows {
        self.rows
    }
}

impl IntoIterator for IngestedCsv {
    type Item = IngestResult<RowFields>;
    type IntoIter = CsvRows;

    fn into_iter(self) -> Self::IntoIter {
        self.rows
    }
}

impl fmt::Debug for IngestedCsv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestedCsv")
            .field("encoding", &self.encoding)
            .field("delimiter", &self.delimiter_char())
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Ingest uploaded bytes declared under `filename`.
///
/// # Example
/// ```ignore
/// let csv = editais::ingest(b"Nome;Polo\nAna;LP - Recife\n", "alunos.csv")?;
/// assert_eq!(csv.delimiter, b';');
/// let rows: Vec<_> = csv.into_rows().collect::<Result<_, _>>()?;
/// assert_eq!(rows[0]["Nome"], "Ana");
/// ```
pub fn ingest(bytes: &[u8], filename: &str) -> IngestResult<IngestedCsv> {
    check_filename(filename)?;
    let (content, encoding) = decode_content(bytes)?;
    let (delimiter, headers, reader) = open_reader(content)?;

    Ok(IngestedCsv {
        encoding,
        delimiter,
        rows: CsvRows {
            headers: headers.clone(),
            records: reader.into_records(),
        },
        headers,
    })
}

/// Ingest a CSV file from disk.
pub fn ingest_file<P: AsRef<Path>>(path: P) -> IngestResult<IngestedCsv> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ingest(&bytes, &filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(csv: IngestedCsv) -> Vec<RowFields> {
        csv.into_rows().collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn test_semicolon_csv() {
        let csv = ingest(b"nome;idade\nAna;30\nBeto;25", "x.csv").unwrap();
        assert_eq!(csv.delimiter, b';');
        assert_eq!(csv.encoding, Encoding::Utf8);
        assert_eq!(csv.headers, vec!["nome", "idade"]);

        let rows = collect(csv);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["nome"], "Ana");
        assert_eq!(rows[1]["idade"], "25");
    }

    #[test]
    fn test_comma_csv_with_quoted_delimiter() {
        let csv = ingest(b"Nome,Polo\n\"Silva, Ana\",LP - Recife\n", "x.csv").unwrap();
        assert_eq!(csv.delimiter, b',');
        let rows = collect(csv);
        assert_eq!(rows[0]["Nome"], "Silva, Ana");
        assert_eq!(rows[0]["Polo"], "LP - Recife");
    }

    #[test]
    fn test_rejects_non_csv_name() {
        let err = ingest(b"a;b\n1;2", "roster.xlsx").unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn test_uppercase_extension_accepted() {
        assert!(check_filename("LISTA.CSV").is_ok());
    }

    #[test]
    fn test_latin1_fallback() {
        // "Nome;Cidade\nJoão;São Paulo" in ISO-8859-1
        let mut bytes = b"Nome;Cidade\nJo".to_vec();
        bytes.push(0xE3);
        bytes.extend_from_slice(b"o;S");
        bytes.push(0xE3);
        bytes.extend_from_slice(b"o Paulo");

        let csv = ingest(&bytes, "x.csv").unwrap();
        assert_eq!(csv.encoding, Encoding::Latin1);
        let rows = collect(csv);
        assert_eq!(rows[0]["Nome"], "João");
        assert_eq!(rows[0]["Cidade"], "São Paulo");
    }

    #[test]
    fn test_latin1_uses_windows_1252_for_c1_bytes() {
        // 0x80 is a C1 control in ISO-8859-1 but the euro sign in windows-1252.
        let (text, encoding) = decode_content(&[b'R', 0x80, b'5', 0xE7]).unwrap();
        assert_eq!(encoding, Encoding::Latin1);
        assert_eq!(text, "R\u{20ac}5\u{e7}");
    }

    #[test]
    fn test_utf8_bom_skipped() {
        let csv = ingest("\u{feff}Nome,CPF\nAna,1".as_bytes(), "x.csv").unwrap();
        assert_eq!(csv.headers, vec!["Nome", "CPF"]);
    }

    #[test]
    fn test_sniff_tie_falls_back_to_first_candidate() {
        assert_eq!(sniff_delimiter("a;b,c"), None);
        let csv = ingest(b"a;b,c\n1;2,3", "x.csv").unwrap();
        assert_eq!(csv.delimiter, b';');
        assert_eq!(csv.headers, vec!["a", "b,c"]);
    }

    #[test]
    fn test_sniff_ignores_quoted_delimiters() {
        assert_eq!(sniff_delimiter("\"a;b;c\",d,e"), Some(b','));
    }

    #[test]
    fn test_single_column_header_fails() {
        let err = ingest(b"nome\nAna", "x.csv").unwrap_err();
        assert!(matches!(err, IngestError::Header(_)));
    }

    #[test]
    fn test_empty_file_fails() {
        let err = ingest(b"  \n", "x.csv").unwrap_err();
        assert!(matches!(err, IngestError::Header(_)));
    }

    #[test]
    fn test_short_and_long_records() {
        let rows = collect(ingest(b"a;b;c\n1;2\n4;5;6;7", "x.csv").unwrap());
        assert_eq!(rows[0].len(), 2);
        assert!(!rows[0].contains_key("c"));
        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[1]["c"], "6");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let rows = collect(ingest(b"a;b\n1;2\n\n3;4\n", "x.csv").unwrap());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_rows_are_single_pass() {
        let mut rows = ingest(b"a;b\n1;2", "x.csv").unwrap().into_rows();
        assert!(rows.next().is_some());
        assert!(rows.next().is_none());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_ingest_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lista.csv");
        std::fs::write(&path, "Nome,Polo\nAna,LP - Recife\n").unwrap();

        let csv = ingest_file(&path).unwrap();
        assert_eq!(csv.delimiter_char(), ',');
        assert_eq!(collect(csv).len(), 1);
    }
}
