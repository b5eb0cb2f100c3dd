//! Rate-limited progress line for a single transfer.
//!
//! The downloader calls [`ProgressReporter::update`] on every chunk; the
//! reporter decides from wall-clock time whether a new line is due. Lines are
//! rewritten in place with a carriage return, the final line ends with a
//! newline.

use std::io::Write;
use std::time::{Duration, Instant};

use super::format::{format_duration, format_size, format_speed};

/// Default minimum time between two rendered lines.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Columns reserved for the name field; longer names scroll.
const NAME_WIDTH: usize = 25;

/// Columns used by a rendered line before padding.
const LINE_WIDTH: usize = 96;

/// Transfer statistics derived from one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStats {
    /// Percent complete, clamped to 100.
    pub percent: f64,
    /// Average throughput in bytes per second.
    pub speed: f64,
    /// Estimated time remaining, zero when throughput is zero.
    pub eta: Duration,
}

impl ProgressStats {
    /// Compute statistics for `transferred` of `total` bytes after `elapsed`.
    ///
    /// Elapsed time below one second counts as one second.
    pub fn compute(transferred: u64, total: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64().max(1.0);
        let speed = transferred as f64 / secs;

        let percent = if total == 0 {
            100.0
        } else {
            (transferred as f64 * 100.0 / total as f64).min(100.0)
        };

        let remaining = total.saturating_sub(transferred) as f64;
        let eta = if speed > 0.0 {
            Duration::from_secs((remaining / speed) as u64)
        } else {
            Duration::ZERO
        };

        Self {
            percent,
            speed,
            eta,
        }
    }
}

/// Renders the status line of one transfer.
pub struct ProgressReporter<W: Write> {
    out: W,
    name: String,
    interval: Duration,
    terminal_width: usize,
    started: Instant,
    last_emit: Option<Duration>,
    scroll: usize,
    finished: bool,
}

impl<W: Write> ProgressReporter<W> {
    /// Create a reporter for the resource `name` writing to `out`.
    pub fn new(out: W, name: impl Into<String>) -> Self {
        Self {
            out,
            name: name.into(),
            interval: DEFAULT_INTERVAL,
            terminal_width: 0,
            started: Instant::now(),
            last_emit: None,
            scroll: 0,
            finished: false,
        }
    }

    /// Set the minimum time between rendered lines.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Pad lines to `columns` so a shorter line fully overwrites a longer one.
    pub fn with_terminal_width(mut self, columns: usize) -> Self {
        self.terminal_width = columns;
        self
    }

    /// Record a sample taken now.
    pub fn update(&mut self, transferred: u64, total: Option<u64>) -> bool {
        let elapsed = self.started.elapsed();
        self.update_at(elapsed, transferred, total)
    }

    /// Record a sample taken `elapsed` after the transfer started.
    ///
    /// Returns whether a line was written.
    pub fn update_at(&mut self, elapsed: Duration, transferred: u64, total: Option<u64>) -> bool {
        if self.finished {
            return false;
        }

        let total = total.filter(|t| *t > 0);

        if let Some(total) = total {
            if transferred >= total {
                let stats = ProgressStats::compute(transferred, total, elapsed);
                let line = self.render(&self.name, &stats, total, format_duration(elapsed));
                self.write(&format!("{}\n", line));
                self.finished = true;
                return true;
            }
        }

        if !self.is_due(elapsed) {
            return false;
        }
        self.last_emit = Some(elapsed);

        match total {
            Some(total) => {
                let stats = ProgressStats::compute(transferred, total, elapsed);
                let name = self.display_name();
                let eta = format!("{} ETA", format_duration(stats.eta));
                let line = self.render(&name, &stats, total, eta);
                self.write(&line);
            }
            None => {
                let name = self.display_name();
                let line = format!("\rFetching: {:<25.25} read {}", name, transferred);
                self.write(&line);
            }
        }
        true
    }

    /// Terminate the line of a transfer whose total size was never known.
    pub fn finish(&mut self, transferred: u64) {
        if self.finished {
            return;
        }
        self.finished = true;
        let line = format!("\rFetching: {:<25.25} read {}\n", self.name, transferred);
        self.write(&line);
    }

    /// Consume the reporter, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn is_due(&self, elapsed: Duration) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => elapsed.saturating_sub(last) >= self.interval,
        }
    }

    fn render(&self, name: &str, stats: &ProgressStats, total: u64, time: String) -> String {
        let pad = self.terminal_width.saturating_sub(LINE_WIDTH);
        format!(
            "\rFetching: {:<25.25} {:<15} {:<15.15} {:<15.15} {}{:>pad$}",
            name,
            format!("{:8.2}%", stats.percent),
            format_size(total as f64),
            format_speed(stats.speed),
            time,
            "",
            pad = pad
        )
    }

    /// Name window for the next line, advancing one character per call.
    fn display_name(&mut self) -> String {
        let chars: Vec<char> = self.name.chars().collect();
        if chars.len() <= NAME_WIDTH {
            return self.name.clone();
        }

        if chars.len() - self.scroll > NAME_WIDTH {
            self.scroll += 1;
            chars[self.scroll - 1..self.scroll - 1 + NAME_WIDTH]
                .iter()
                .collect()
        } else {
            self.scroll = 0;
            self.name.clone()
        }
    }

    fn write(&mut self, line: &str) {
        // A closed stdout must not abort the transfer.
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(name: &str) -> ProgressReporter<Vec<u8>> {
        ProgressReporter::new(Vec::new(), name)
    }

    fn output(reporter: ProgressReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_stats_basic() {
        let stats = ProgressStats::compute(500, 1000, Duration::from_secs(5));
        assert_eq!(stats.percent, 50.0);
        assert_eq!(stats.speed, 100.0);
        assert_eq!(stats.eta, Duration::from_secs(5));
    }

    #[test]
    fn test_stats_minimum_elapsed_is_one_second() {
        let stats = ProgressStats::compute(300, 1000, Duration::ZERO);
        assert_eq!(stats.speed, 300.0);
    }

    #[test]
    fn test_stats_zero_throughput_has_zero_eta() {
        let stats = ProgressStats::compute(0, 1000, Duration::from_secs(10));
        assert_eq!(stats.speed, 0.0);
        assert_eq!(stats.eta, Duration::ZERO);
    }

    #[test]
    fn test_stats_percent_clamped() {
        let stats = ProgressStats::compute(1500, 1000, Duration::from_secs(1));
        assert_eq!(stats.percent, 100.0);
    }

    #[test]
    fn test_rate_limited() {
        let mut r = reporter("v2ray-linux-64.zip");
        assert!(r.update_at(Duration::ZERO, 10, Some(1000)));
        assert!(!r.update_at(Duration::from_millis(50), 20, Some(1000)));
        assert!(!r.update_at(Duration::from_millis(99), 30, Some(1000)));
        assert!(r.update_at(Duration::from_millis(100), 40, Some(1000)));

        let out = output(r);
        assert_eq!(out.matches('\r').count(), 2);
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_final_line_bypasses_rate_limit() {
        let mut r = reporter("v2ray-linux-64.zip");
        assert!(r.update_at(Duration::ZERO, 10, Some(1000)));
        assert!(r.update_at(Duration::from_millis(10), 1000, Some(1000)));
        // Nothing after completion.
        assert!(!r.update_at(Duration::from_secs(5), 1000, Some(1000)));

        let out = output(r);
        assert!(out.ends_with('\n'));
        assert_eq!(out.matches('\n').count(), 1);
        assert!(out.contains("100.00%"));
    }

    #[test]
    fn test_final_line_shows_elapsed_not_eta() {
        let mut r = reporter("config.json");
        r.update_at(Duration::from_secs(65), 2048, Some(2048));

        let out = output(r);
        assert!(out.contains("0:01:05"));
        assert!(!out.contains("ETA"));
    }

    #[test]
    fn test_unknown_total_renders_raw_counter() {
        let mut r = reporter("v2ray.service");
        assert!(r.update_at(Duration::ZERO, 512, None));
        assert!(r.update_at(Duration::from_millis(200), 1024, Some(0)));
        r.finish(1500);

        let out = output(r);
        assert!(out.contains("read 512"));
        assert!(out.contains("read 1024"));
        assert!(out.ends_with("read 1500\n"));
    }

    #[test]
    fn test_finish_after_completion_is_noop() {
        let mut r = reporter("a.zip");
        r.update_at(Duration::ZERO, 10, Some(10));
        r.finish(10);
        assert_eq!(output(r).matches('\n').count(), 1);
    }

    #[test]
    fn test_padding_to_terminal_width() {
        let mut r = reporter("a.zip").with_terminal_width(120);
        r.update_at(Duration::ZERO, 1, Some(10));
        let out = output(r);
        assert!(out.ends_with(&" ".repeat(24)));
    }

    #[test]
    fn test_long_name_scrolls() {
        let name = "v2ray-linux-mips64le-softfloat.zip";
        let mut r = reporter(name);

        assert_eq!(r.display_name(), &name[0..25]);
        assert_eq!(r.display_name(), &name[1..26]);
        for _ in 2..(name.len() - 25) {
            r.display_name();
        }
        // Window reached the end; wraps back to the full name.
        assert_eq!(r.display_name(), name);
        assert_eq!(r.display_name(), &name[0..25]);
    }

    #[test]
    fn test_short_name_does_not_scroll() {
        let mut r = reporter("v2ray.zip");
        assert_eq!(r.display_name(), "v2ray.zip");
        assert_eq!(r.display_name(), "v2ray.zip");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn percent_never_exceeds_hundred(
                transferred in 0u64..u64::MAX / 2,
                total in 1u64..u64::MAX / 2,
                elapsed_ms in 0u64..10_000_000,
            ) {
                let stats = ProgressStats::compute(
                    transferred,
                    total,
                    Duration::from_millis(elapsed_ms),
                );
                prop_assert!(stats.percent <= 100.0);
                prop_assert!(stats.percent >= 0.0);
            }

            #[test]
            fn eta_zero_without_throughput(
                total in 1u64..u64::MAX / 2,
                elapsed_ms in 0u64..10_000_000,
            ) {
                let stats = ProgressStats::compute(0, total, Duration::from_millis(elapsed_ms));
                prop_assert_eq!(stats.eta, Duration::ZERO);
            }
        }
    }
}
