//! Text rendering for the `error-logger` commands.

use std::fmt::Write;
use vigil_error_log::entry::iso_timestamp;
use vigil_error_log::ErrorStats;

pub const DEFAULT_STATS_HOURS: u32 = 24;
pub const DEFAULT_TAIL_LINES: usize = 20;

pub fn render_stats(stats: &ErrorStats, hours: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nError Statistics (last {} hours):", hours);
    let _ = writeln!(out, "Total errors: {}", stats.total);

    let _ = writeln!(out, "\nBy Severity:");
    for (severity, count) in &stats.by_severity {
        let _ = writeln!(out, "  {}: {}", severity, count);
    }

    let _ = writeln!(out, "\nBy Category:");
    for (category, count) in &stats.by_category {
        let _ = writeln!(out, "  {}: {}", category, count);
    }

    let _ = writeln!(out, "\nRecent Errors:");
    for entry in &stats.recent {
        let _ = writeln!(
            out,
            "  [{}] [{}] {}",
            iso_timestamp(&entry.timestamp),
            entry.severity,
            entry.message
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vigil_error_log::{Category, LogEntry, LogOptions, Severity};

    #[test]
    fn test_render_stats() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let entry = LogEntry::at(
            ts,
            "Database connection lost",
            LogOptions::new(Severity::Error, Category::Database),
            "web-1",
        );

        let mut stats = ErrorStats::default();
        stats.total = 1;
        stats.by_severity.insert(Severity::Error, 1);
        stats.by_category.insert(Category::Database, 1);
        stats.recent.push(entry);

        let text = render_stats(&stats, 24);
        assert!(text.contains("Error Statistics (last 24 hours):"));
        assert!(text.contains("Total errors: 1"));
        assert!(text.contains("  ERROR: 1"));
        assert!(text.contains("  database: 1"));
        assert!(text.contains("  [2026-03-01T12:00:00.000Z] [ERROR] Database connection lost"));
    }

    #[test]
    fn test_render_empty_stats() {
        let text = render_stats(&ErrorStats::default(), 6);
        assert!(text.contains("last 6 hours"));
        assert!(text.contains("Total errors: 0"));
    }
}
