//! CSV serialization and console summary of a [`BenchmarkReport`]

use std::io;
use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use tracing::info;

use crate::error::Result;
use crate::report::{BenchmarkReport, MetricRow};

/// Write the report as CSV to `path`, replacing any existing file
pub fn write_report(report: &BenchmarkReport, path: &Path) -> Result<()> {
    let writer = csv::Writer::from_path(path)?;
    write_csv(report, writer)?;
    info!("Wrote {} workloads to {}", report.workloads().len(), path.display());
    Ok(())
}

/// Write the report as CSV to any sink
pub fn write_report_to<W: io::Write>(report: &BenchmarkReport, sink: W) -> Result<()> {
    write_csv(report, csv::Writer::from_writer(sink))
}

/// Render the report as CSV text
pub fn report_to_string(report: &BenchmarkReport) -> Result<String> {
    let mut buf = Vec::new();
    write_report_to(report, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_csv<W: io::Write>(report: &BenchmarkReport, mut writer: csv::Writer<W>) -> Result<()> {
    writer.write_record(header(report.max_threads()))?;

    for metrics in report.workloads() {
        for (label, row) in metrics.rows() {
            let mut record = Vec::with_capacity(row.len() + 2);
            record.push(metrics.name.clone());
            record.push(label.to_string());
            record.extend(format_row(row));
            writer.write_record(&record)?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn header(max_threads: usize) -> Vec<String> {
    let mut header = Vec::with_capacity(max_threads + 2);
    header.push("process".to_string());
    header.push("metric".to_string());
    header.extend((1..=max_threads).map(|t| t.to_string()));
    header
}

/// Two decimals for measured levels, `0` for levels never run
fn format_row(row: &MetricRow) -> impl Iterator<Item = String> + '_ {
    row.slots().iter().map(|slot| match slot {
        Some(value) => round_half_up(*value),
        None => "0".to_string(),
    })
}

/// Two decimals, rounding the shortest decimal form of `value` half away
/// from zero (0.125 -> 0.13, 1.005 -> 1.01)
fn round_half_up(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    let frac = frac_part.as_bytes();
    for i in 0..2 {
        digits.push(frac.get(i).map_or(0, |b| b - b'0'));
    }

    if frac.get(2).map_or(false, |&b| b >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - 2;
    let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    let sign = if value < 0.0 && digits.iter().any(|&d| d != 0) {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, &text[..split], &text[split..])
}

/// Console table of the report, one line per workload and metric
pub fn render_summary(report: &BenchmarkReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(report.max_threads()));

    for metrics in report.workloads() {
        for (label, row) in metrics.rows() {
            let mut cells = vec![metrics.name.clone(), label.to_string()];
            cells.extend(format_row(row));
            table.add_row(cells);
        }
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{aggregate, Statistics};
    use tempfile::tempdir;

    fn sample_report() -> BenchmarkReport {
        let mut report = BenchmarkReport::new(3, 5);
        report
            .record(
                "A",
                2,
                &Statistics {
                    mean: 10.0,
                    stddev: 1.0 / 3.0,
                    throughput_per_second: 100.0,
                },
            )
            .unwrap();
        report
    }

    #[test]
    fn test_csv_layout() {
        let text = report_to_string(&sample_report()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "process,metric,1,2,3",
                "A,average,0,10.00,0",
                "A,stddev,0,0.33,0",
                "A,throughputPerSecond,0,100.00,0",
            ]
        );
    }

    #[test]
    fn test_equal_samples_scenario_in_csv() {
        let stats = aggregate(&[10; 5], 50.0, 5).unwrap();
        let mut report = BenchmarkReport::new(1, 5);
        report.record("A", 1, &stats).unwrap();

        let text = report_to_string(&report).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "process,metric,1",
                "A,average,10.00",
                "A,stddev,0.00",
                "A,throughputPerSecond,100.00",
            ]
        );
    }

    #[test]
    fn test_ties_round_up() {
        assert_eq!(round_half_up(0.125), "0.13");
        assert_eq!(round_half_up(2.675), "2.68");
        assert_eq!(round_half_up(1.005), "1.01");
        assert_eq!(round_half_up(9.995), "10.00");
        assert_eq!(round_half_up(-0.125), "-0.13");
    }

    #[test]
    fn test_rounding_below_tie_and_short_values() {
        assert_eq!(round_half_up(0.124), "0.12");
        assert_eq!(round_half_up(1.0 / 3.0), "0.33");
        assert_eq!(round_half_up(10.0), "10.00");
        assert_eq!(round_half_up(0.5), "0.50");
        assert_eq!(round_half_up(0.0), "0.00");
        assert_eq!(round_half_up(-0.001), "0.00");
        assert_eq!(round_half_up(1234.5), "1234.50");
    }

    #[test]
    fn test_mean_of_eighths_rounds_up_in_csv() {
        let stats = aggregate(&[0, 0, 0, 0, 0, 0, 0, 1], 8.0, 8).unwrap();
        let mut report = BenchmarkReport::new(1, 8);
        report.record("A", 1, &stats).unwrap();

        let text = report_to_string(&report).unwrap();
        assert!(text.lines().any(|line| line == "A,average,0.13"));
    }

    #[test]
    fn test_every_line_has_max_threads_plus_two_columns() {
        let text = report_to_string(&sample_report()).unwrap();
        for line in text.lines() {
            assert_eq!(line.split(',').count(), 5);
        }
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let text = report_to_string(&BenchmarkReport::new(2, 1)).unwrap();
        assert_eq!(text, "process,metric,1,2\n");
    }

    #[test]
    fn test_write_report_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "stale contents that are much longer than the report\n".repeat(10))
            .unwrap();

        write_report(&sample_report(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("process,metric,1,2,3\n"));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn test_write_report_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("results.csv");
        assert!(write_report(&sample_report(), &path).is_err());
    }

    #[test]
    fn test_summary_mentions_workload_and_metrics() {
        let summary = render_summary(&sample_report());
        assert!(summary.contains("throughputPerSecond"));
        assert!(summary.contains("10.00"));
    }
}
