//! File exports: records as CSV, the full run as JSON, a Markdown summary,
//! alerts as JSON lines.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::anomaly::{Alert, AlertSet};
use crate::analysis::counter::{Dimension, FrequencyCounter};
use crate::record::TrafficRecord;
use crate::run::RunOutput;
use crate::transcript::ParseStats;

pub const CSV_HEADER: &str = "time,src_ip,src_port,dst_ip,dst_port,flags,length";

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(err) => write!(f, "report io error: {}", err),
            ReportError::Json(err) => write!(f, "report json error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Json(err)
    }
}

pub fn write_records_csv(path: &Path, records: &[TrafficRecord]) -> Result<(), ReportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    records_to_csv(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// One header row, then one row per record in record order. Missing ports
/// and flags are empty fields.
pub fn records_to_csv<W: Write>(writer: &mut W, records: &[TrafficRecord]) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for record in records {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            csv_escape(&record.timestamp),
            csv_escape(&record.source_address),
            csv_escape(record.source_port.as_deref().unwrap_or("")),
            csv_escape(&record.dest_address),
            csv_escape(record.dest_port.as_deref().unwrap_or("")),
            csv_escape(record.flags.as_deref().unwrap_or("")),
            record.length
        )?;
    }
    Ok(())
}

/// Quote a field containing a comma, quote or line break.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        let escaped = field.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        field.to_string()
    }
}

struct Counters<'a>(&'a [(Dimension, FrequencyCounter)]);

impl Serialize for Counters<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (dimension, counter) in self.0 {
            map.serialize_entry(dimension.as_str(), counter)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    format: &'static str,
    stats: ParseStats,
    records: &'a [TrafficRecord],
    counters: Counters<'a>,
    alerts: &'a AlertSet,
    messages: Vec<String>,
}

impl<'a> JsonReport<'a> {
    fn new(output: &'a RunOutput) -> Self {
        JsonReport {
            format: output.format.as_str(),
            stats: output.stats,
            records: &output.records,
            counters: Counters(&output.counters),
            alerts: &output.alerts,
            messages: output.alerts.messages(),
        }
    }
}

pub fn write_report_json(path: &Path, output: &RunOutput) -> Result<(), ReportError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &JsonReport::new(output))?;
    Ok(())
}

/// One JSON object per alert: `kind`, `entity`, `count`, `description`.
/// A set with no alerts produces an empty file.
pub fn write_alerts_jsonl(path: &Path, alerts: &AlertSet) -> Result<(), ReportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for alert in alerts.alerts() {
        serde_json::to_writer(&mut writer, &alert_line(alert))?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn alert_line(alert: &Alert) -> serde_json::Value {
    serde_json::json!({
        "kind": alert.kind.as_str(),
        "entity": &alert.entity,
        "count": alert.count,
        "description": alert.to_string(),
    })
}

pub fn write_markdown(path: &Path, output: &RunOutput, top_n: usize) -> Result<(), ReportError> {
    std::fs::write(path, render_markdown(output, top_n))?;
    Ok(())
}

/// Markdown summary: totals, one top-`top_n` table per counter, alerts.
pub fn render_markdown(output: &RunOutput, top_n: usize) -> String {
    let mut md = String::new();
    md.push_str("# Traffic report\n\n");
    md.push_str(&format!("- Capture format: `{}`\n", output.format));
    md.push_str(&format!("- Records: {}\n", output.records.len()));
    md.push_str(&format!("- Skipped lines: {}\n", output.stats.skipped));

    for (dimension, counter) in &output.counters {
        md.push_str(&format!("\n## {}\n\n", dimension.label()));
        let ranked = counter.most_common(top_n);
        match ranked.first() {
            Some((key, n)) => md.push_str(&format!("Most common: `{}` ({})\n\n", key, n)),
            None => {
                md.push_str("No values.\n");
                continue;
            }
        }
        md.push_str(&format!("| {} | Count |\n", dimension.label()));
        md.push_str("| --- | ---: |\n");
        for (key, n) in ranked {
            md.push_str(&format!("| {} | {} |\n", key.replace('|', "\\|"), n));
        }
    }

    md.push_str("\n## Alerts\n\n");
    for message in output.alerts.messages() {
        md.push_str(&format!("- {}\n", message));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::anomaly::{Alert, AlertKind};
    use crate::analysis::counter::count;
    use crate::transcript::format::CaptureFormat;

    fn rec(src: &str, sport: Option<&str>, flags: Option<&str>) -> TrafficRecord {
        TrafficRecord {
            timestamp: "10:00:00.000001".into(),
            source_address: src.into(),
            source_port: sport.map(Into::into),
            source_service: None,
            dest_address: "10.0.0.1".into(),
            dest_port: Some("80".into()),
            dest_service: None,
            flags: flags.map(Into::into),
            length: 60,
        }
    }

    fn output(alerts: AlertSet) -> RunOutput {
        let records = vec![
            rec("1.2.3.4", Some("40000"), Some("S")),
            rec("1.2.3.4", None, Some("S")),
            rec("host,with,commas", None, None),
        ];
        let counters = vec![(Dimension::SrcAddr, count(&records, Dimension::SrcAddr))];
        RunOutput {
            format: CaptureFormat::Canonical,
            stats: ParseStats { parsed: 3, skipped: 1 },
            records,
            counters,
            alerts,
        }
    }

    #[test]
    fn csv_rows_follow_record_order() {
        let out = output(AlertSet::Clear);
        let mut buf = Vec::new();
        records_to_csv(&mut buf, &out.records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "10:00:00.000001,1.2.3.4,40000,10.0.0.1,80,S,60");
        assert_eq!(lines[2], "10:00:00.000001,1.2.3.4,,10.0.0.1,80,S,60");
        assert_eq!(lines[3], "10:00:00.000001,\"host,with,commas\",,10.0.0.1,80,,60");
    }

    #[test]
    fn csv_escape_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn json_report_shape() {
        let path = std::env::temp_dir().join(format!("dumpscope-report-{}.json", std::process::id()));
        let alerts = AlertSet::Flagged(vec![Alert {
            kind: AlertKind::SynScan,
            entity: "1.2.3.4".into(),
            count: 2,
        }]);
        write_report_json(&path, &output(alerts)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["format"], "canonical");
        assert_eq!(value["stats"]["skipped"], 1);
        assert_eq!(value["records"].as_array().unwrap().len(), 3);
        assert_eq!(value["counters"]["src-addr"]["1.2.3.4"], 2);
        assert_eq!(value["alerts"][0]["kind"], "syn_scan");
        assert_eq!(value["messages"][0], "possible SYN scan from 1.2.3.4: 2 SYN packets");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn alerts_jsonl_one_object_per_line() {
        let path = std::env::temp_dir().join(format!("dumpscope-alerts-{}.jsonl", std::process::id()));
        let alerts = AlertSet::Flagged(vec![
            Alert { kind: AlertKind::OverRepresented, entity: "5.5.5.5".into(), count: 12 },
            Alert { kind: AlertKind::Volumetric, entity: "5.5.5.5".into(), count: 3000 },
        ]);
        write_alerts_jsonl(&path, &alerts).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "over_represented");
        assert_eq!(lines[1]["kind"], "volumetric");
        assert_eq!(lines[1]["count"], 3000);
        assert_eq!(lines[1]["description"], "heavy ssh traffic from 5.5.5.5: 3000 bytes");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn alerts_jsonl_to_missing_directory_is_an_error() {
        let path = Path::new("/nonexistent/dumpscope/alerts.jsonl");
        let err = write_alerts_jsonl(path, &AlertSet::Clear).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }

    #[test]
    fn markdown_reports_rules_that_did_not_run() {
        let md = render_markdown(&output(AlertSet::NotRun), 10);
        assert!(md.contains("- no heuristic enabled"));
        assert!(!md.contains("no threat detected"));
    }

    #[test]
    fn markdown_lists_top_keys_and_sentinel() {
        let md = render_markdown(&output(AlertSet::Clear), 10);
        assert!(md.contains("- Records: 3"));
        assert!(md.contains("## Source address"));
        assert!(md.contains("Most common: `1.2.3.4` (2)"));
        assert!(md.contains("| 1.2.3.4 | 2 |"));
        assert!(md.contains("- no threat detected"));
    }
}
