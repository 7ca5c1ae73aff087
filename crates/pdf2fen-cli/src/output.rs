//! Writing numbered diagram rows to disk.

use std::fs;
use std::path::Path;

use tracing::debug;

use pdf2fen_core::OutputRow;
use pdf2fen_core::models::config::OutputFormat;

/// Column headers of the CSV table.
pub const CSV_HEADERS: [&str; 3] = ["Diagram Number", "FEN Notation", "Lichess Link"];

/// Write `rows` to `path` in `format`. An empty run still writes a file.
pub fn write_rows(path: &Path, format: OutputFormat, rows: &[OutputRow]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => write_csv(path, rows)?,
        OutputFormat::Json => fs::write(path, serde_json::to_string_pretty(rows)?)?,
    }
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn write_csv(path: &Path, rows: &[OutputRow]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(CSV_HEADERS)?;

    for row in rows {
        wtr.write_record([row.number.to_string(), row.fen.to_string(), row.link.clone()])?;
    }

    wtr.flush()?;
    Ok(())
}
