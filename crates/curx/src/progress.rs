//! 📊 progress.rs: "Are we there yet?" asks every billing run, every time, forever.
//!
//! 🚀 One spinner per report key, with a little comfy table underneath: rows
//! shipped, rows per second, compressed bytes pulled from S3, elapsed time.
//! We don't know the report's total size up front, so there is no ETA.
//! Nobody can predict a cloud bill. That's the whole problem.
//!
//! ⚠️ Watching this spinner will not make it go faster. We've tried.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

const MIB: u64 = 1024 * 1024;

// ⏱️ redraw cadence for the spinner when nothing else pokes it
const TICK: Duration = Duration::from_millis(120);

/// 📦 Bytes in whichever unit doesn't make the reader squint.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if the bill is that big. Call your finance team.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 Rows and bytes for one report key, plus a spinner that says so.
///
/// Rates use a sliding 5-second window, same trick as any speedometer that
/// doesn't want to give you a heart attack.
pub(crate) struct ReportProgress {
    report_key: String,
    rows: u64,
    compressed_bytes: u64,
    spinner: ProgressBar,
    rate_samples: VecDeque<(Instant, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ReportProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ReportProgress")
            .field("report_key", &self.report_key)
            .field("rows", &self.rows)
            .field("compressed_bytes", &self.compressed_bytes)
            .finish()
    }
}

impl ReportProgress {
    pub(crate) fn new(report_key: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(TICK);

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64));

        Self {
            report_key: report_key.to_string(),
            rows: 0,
            compressed_bytes: 0,
            spinner,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 One more row went through. `compressed_bytes` is the running total from the reader.
    pub(crate) fn row_shipped(&mut self, compressed_bytes: u64) {
        self.rows += 1;
        self.compressed_bytes = compressed_bytes;
        // 🐢 re-rendering a table per row would cost more than the row
        if self.rows % 1000 == 0 {
            let rows_per_sec = self.rows_per_sec();
            self.render(rows_per_sec);
        }
    }

    pub(crate) fn rows(&self) -> u64 {
        self.rows
    }

    /// ✅ Final numbers, then the spinner goes away.
    pub(crate) fn finish(&mut self) {
        let rows_per_sec = self.rows_per_sec();
        self.render(rows_per_sec);
        self.spinner.finish_and_clear();
    }

    fn rows_per_sec(&mut self) -> f64 {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.rows));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_rows)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    self.rows.saturating_sub(oldest_rows) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    fn render(&self, rows_per_sec: f64) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} rows/s", format_number(rows_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} rows", format_number(self.rows)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} read", format_bytes(self.compressed_bytes)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} elapsed", format_duration(self.start_time.elapsed())))
                .set_alignment(CellAlignment::Right),
        ]);
        self.spinner
            .set_message(format!("report: {}\n{}", self.report_key, table));
    }
}
