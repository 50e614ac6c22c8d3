use vaultsync_sync::engine::SyncReport;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

pub fn report_json(action: &str, report: &SyncReport) -> serde_json::Value {
    serde_json::json!({
        "action": action,
        "cancelled": report.cancelled,
        "downloaded": report.downloaded,
        "uploaded": report.uploaded,
        "updated": report.updated,
        "deleted_local": report.deleted_local,
        "deleted_remote": report.deleted_remote,
        "folders_created": report.folders_created,
        "skipped": report.skipped,
        "reverted": report.reverted,
        "duration_ms": report.duration_ms,
    })
}

/// Prints the summary of a finished run
pub fn print_report(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    action: &str,
    report: &SyncReport,
) {
    if format.is_json() {
        formatter.print_json(&report_json(action, report));
        return;
    }

    if report.cancelled {
        formatter.warn("Push cancelled, nothing was changed");
        return;
    }
    // The engine has already announced an empty run.
    if report.is_empty() {
        return;
    }

    formatter.success(&format!(
        "{} completed in {}",
        action,
        format_duration(report.duration_ms)
    ));
    let lines = [
        ("Downloaded:", report.downloaded, "file"),
        ("Uploaded:", report.uploaded, "file"),
        ("Updated:", report.updated, "file"),
        ("Folders:", report.folders_created, "created folder"),
        ("Deleted:", report.deleted_local, "local item"),
        ("Deleted:", report.deleted_remote, "remote item"),
        ("Reverted:", report.reverted, "change"),
    ];
    for (label, count, noun) in lines {
        if count > 0 {
            formatter.info(&format!("{:<12}{} {}{}", label, count, noun, plural(count)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1500), "1.5s");
    }

    #[test]
    fn test_report_json_fields() {
        let report = SyncReport {
            downloaded: 2,
            deleted_remote: 1,
            ..SyncReport::default()
        };
        let json = report_json("pull", &report);
        assert_eq!(json["action"], "pull");
        assert_eq!(json["downloaded"], 2);
        assert_eq!(json["deleted_remote"], 1);
        assert_eq!(json["cancelled"], false);
    }
}
