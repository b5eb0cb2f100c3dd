//! Human-readable sizes and durations for the progress line.

use std::time::Duration;

const UNITS: [&str; 5] = ["", "K", "M", "G", "T"];

/// Format a byte count as `{:6.2} {unit}B`.
///
/// Units step by 1024 up to terabytes.
pub fn format_size(bytes: f64) -> String {
    let mut size = bytes;
    let mut unit = 0;

    while size > 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:6.2} {}B", size, UNITS[unit])
}

/// Format a transfer rate, e.g. `  1.50 MB/s`.
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Format a duration as `H:MM:SS`, dropping fractions of a second.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0.0), "  0.00 B");
        assert_eq!(format_size(1024.0), "1024.00 B");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(1536.0), "  1.50 KB");
        assert_eq!(format_size(10.0 * 1024.0 * 1024.0), " 10.00 MB");
        assert_eq!(format_size(3.0 * 1024.0 * 1024.0 * 1024.0), "  3.00 GB");
    }

    #[test]
    fn test_format_size_caps_at_terabytes() {
        let huge = 2048.0 * 1024f64.powi(4);
        assert_eq!(format_size(huge), "2048.00 TB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(2048.0), "  2.00 KB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_millis(61_900)), "0:01:01");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 5)), "3:00:05");
    }
}
