//! CSV export of the per-step simulation table.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::infrastructure::{PointId, StorageId};
use crate::sim::result::SimulationResult;

/// Fixed leading columns. One `<point>_kw` column per charging point follows,
/// then `<storage>_kw` and `<storage>_soc` per storage system.
pub const HEADER: &str = "timestamp,load_kw,vehicle_kw,preload_kw,busy_points";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exports a finished run to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Arguments
///
/// * `result` - Result of a completed run
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(result: &SimulationResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(result, buf)
}

/// Writes a finished run as CSV to any writer.
///
/// # Arguments
///
/// * `result` - Result of a completed run
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(result: &SimulationResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header: Vec<String> = HEADER.split(',').map(str::to_string).collect();
    header.extend(result.point_names().iter().map(|n| format!("{n}_kw")));
    for name in result.storage_names() {
        header.push(format!("{name}_kw"));
        header.push(format!("{name}_soc"));
    }
    wtr.write_record(&header)?;

    let vehicle = result.vehicle_load();
    let points = result.point_names().len();
    let storage = result.storage_names().len();
    for (step, ts) in result.timestamps().into_iter().enumerate() {
        let mut row = vec![
            ts.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", result.load_profile()[step]),
            format!("{:.4}", vehicle[step]),
            format!("{:.4}", result.preload()[step]),
            result.busy_points()[step].to_string(),
        ];
        row.extend((0..points).map(|i| format!("{:.4}", result.point_power(PointId(i))[step])));
        for i in 0..storage {
            row.push(format!("{:.4}", result.storage_power(StorageId(i))[step]));
            row.push(format!("{:.4}", result.storage_soc(StorageId(i))[step]));
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::sim::infrastructure::{Infrastructure, StorageSpec, TransformerSpec};
    use crate::sim::types::SimConfig;

    fn make_result() -> SimulationResult {
        let mut spec = TransformerSpec::wallbox(2, 11.0, 2, None, None, 0.0).unwrap();
        spec.storage.push(StorageSpec {
            id: "st1".into(),
            capacity: 20.0,
            max_power: 5.0,
            min_power: 0.0,
            efficiency: 1.0,
            initial_soc: 0.5,
            min_soc: 0.0,
        });
        let infra = Infrastructure::new(&[spec]).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let config =
            SimConfig::new(start, start + TimeDelta::hours(2), TimeDelta::hours(1)).unwrap();
        let mut r = SimulationResult::new(&infra, &config, vec![1.0; 3]);
        for step in 0..3 {
            let last = step == 2;
            r.store_power_charging_points(&BTreeMap::from([(PointId(1), 11.0)]), step, last);
            r.store_power_storage_systems(&BTreeMap::from([(StorageId(0), -2.0)]), step, last);
            r.store_soc_storage_systems(&BTreeMap::from([(StorageId(0), 0.4)]), step);
            r.store_busy_points(1, step);
        }
        r
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&make_result(), &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        // 1 header + 3 data rows
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("{HEADER},cp1_kw,cp2_kw,st1_kw,st1_soc"));
    }

    #[test]
    fn csv_row_values() {
        let mut buf = Vec::new();
        write_csv(&make_result(), &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let row: Vec<&str> = output.lines().nth(1).unwrap().split(',').collect();

        assert_eq!(row[0], "2024-01-01 00:00:00");
        assert_eq!(row[1], "10.0000"); // 11 - 2 + 1
        assert_eq!(row[2], "11.0000");
        assert_eq!(row[3], "1.0000");
        assert_eq!(row[4], "1");
        assert_eq!(row[5], "0.0000");
        assert_eq!(row[6], "11.0000");
        assert_eq!(row[7], "-2.0000");
        assert_eq!(row[8], "0.4000");
    }

    #[test]
    fn csv_deterministic() {
        let result = make_result();
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_csv(&result, &mut a).unwrap();
        write_csv(&result, &mut b).unwrap();
        assert_eq!(a, b);
    }
}
