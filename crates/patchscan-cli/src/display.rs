//! Human-readable output for the patchscan CLI

use console::style;
use patchscan_compare::CompareReport;
use std::time::Duration;

/// Print the update set and run statistics
pub fn print_report(report: &CompareReport, verbose: bool) {
    if report.to_update.is_empty() {
        println!(
            "{} All {} files are up to date",
            style("✓").green().bold(),
            report.manifest_len
        );
    } else {
        println!(
            "{} {} of {} files need an update ({})",
            style("↓").yellow().bold(),
            style(report.to_update.len()).yellow(),
            report.manifest_len,
            style(format_bytes(report.total_update_bytes)).cyan()
        );
        for entry in &report.to_update {
            println!("  {}", entry.name);
        }
    }

    if verbose {
        println!();
        println!("{}", style("Check Statistics:").bold().underlined());
        println!("  Manifest entries: {}", report.manifest_len);
        println!(
            "  Ruled out by pre-scan: {}",
            style(report.prescan_skipped).green()
        );
        println!("  Compared: {}", style(report.scanned).cyan());
        println!(
            "  Duration: {}",
            style(format_duration(report.duration)).blue()
        );
    }
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1536, "1.50 KB")]
    #[case(5 * 1024 * 1024, "5.00 MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3725), "1h 2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }
}
