//! CSV export.

use crate::models::ExportRow;
use std::error::Error;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Write rows with an `entity_id,link,date` header. Missing dates are empty
/// cells.
pub fn write_rows_to<W: Write>(rows: &[ExportRow], out: W) -> Result<(), Box<dyn Error>> {
    let mut writer = ::csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record(["entity_id", "link", "date"])?;
    }
    writer.flush()?;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_rows(rows: &[ExportRow], path: &Path) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::create(path)?;
    write_rows_to(rows, file)?;
    info!("Wrote CSV export");
    Ok(())
}
