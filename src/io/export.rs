//! CSV export for simulation tick results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::sim::types::TickResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "timestep,time,bus_id,soc_pct,applied_rate_kw,delivered_kwh,\
                      connected,price,grid_draw_kw,cumulative_cost";

/// Exports simulation results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per (timestep, bus).
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns `DepotError::Io` if the file cannot be created and
/// `DepotError::Csv` if writing fails.
pub fn export_csv(results: &[TickResult], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes simulation results as CSV to any writer.
///
/// # Errors
///
/// Returns `DepotError::Csv` or `DepotError::Io` if writing fails.
pub fn write_csv(results: &[TickResult], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        let time = r.time.format("%Y-%m-%dT%H:%M:%S").to_string();
        for b in &r.buses {
            wtr.write_record(&[
                r.timestep.to_string(),
                time.clone(),
                b.bus_id.to_string(),
                format!("{:.4}", b.soc_pct),
                format!("{:.4}", b.applied_rate_kw),
                format!("{:.4}", b.delivered_kwh),
                b.connected.to_string(),
                format!("{:.4}", r.price),
                format!("{:.4}", r.grid_draw_kw),
                format!("{:.4}", r.cumulative_cost),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
