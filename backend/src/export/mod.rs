//! CSV re-export of a row subset.
//!
//! Output is UTF-8 with a BOM, comma separated, minimally quoted. Rows may have
//! different keys, so the header is the sorted union of every field name and
//! absent cells are written empty.

use std::collections::BTreeSet;
use std::io::Write;

use crate::error::{ExportError, ExportResult};
use crate::models::{Roster, Row};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Sorted union of all field names.
pub fn export_headers(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.fields.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Write `rows` as CSV (BOM included) to `out`.
pub fn write_csv<W: Write>(rows: &[Row], mut out: W) -> ExportResult<()> {
    if rows.is_empty() {
        return Err(ExportError::EmptyResult);
    }

    let headers = export_headers(rows);
    out.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(out);

    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(headers.iter().map(|h| row.get(h).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export `rows` into a byte buffer. Fails with [`ExportError::EmptyResult`]
/// instead of producing a header-only file.
pub fn export_csv(rows: &[Row]) -> ExportResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(buf)
}

/// `edital_<kind>_<label>.csv`, slashes in the label turned into hyphens.
pub fn export_filename(roster: &Roster) -> String {
    format!(
        "edital_{}_{}.csv",
        roster.kind.code(),
        roster.label.replace('/', "-")
    )
}
