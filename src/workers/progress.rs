use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use indicatif::{MultiProgress, ProgressBar, ProgressState, ProgressStyle};

use crate::models::Counters;

/// Progress display for an analyze run: overall row throughput, a running
/// count of owners/phones found, and a status line with error/retry stats.
pub struct ProgressBars {
    rows_pb: ProgressBar,
    found_pb: ProgressBar,
    stats_pb: ProgressBar,
}

impl ProgressBars {
    pub fn new(total_rows: u64) -> Self {
        let multi = MultiProgress::new();

        let rows_pb = multi.add(ProgressBar::new(total_rows));
        rows_pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) - {msg} (ETA: {eta})",
            )
            .unwrap()
            .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap()
            })
            .progress_chars("#>-"),
        );
        rows_pb.set_message("Scraping owners and phones...");

        let found_pb = multi.add(ProgressBar::new_spinner());
        found_pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] 🎯 Found: {pos} - {msg}").unwrap(),
        );
        found_pb.enable_steady_tick(Duration::from_millis(100));

        let stats_pb = multi.add(ProgressBar::new_spinner());
        stats_pb.set_style(ProgressStyle::with_template("{spinner:.blue} [{elapsed_precise}] {msg}").unwrap());
        stats_pb.enable_steady_tick(Duration::from_millis(100));
        stats_pb.set_message("Starting up...");

        Self { rows_pb, found_pb, stats_pb }
    }

    pub fn update_progress(&self, completed: u64, total: Option<u64>) {
        if let Some(total) = total {
            self.rows_pb.set_length(total);
        }
        self.rows_pb.set_position(completed);
    }

    pub fn update_stats(&self, counters: &Arc<Counters>, rows_per_sec: u64) {
        let success = counters.success.load(Ordering::Relaxed);
        let errors = counters.errors.load(Ordering::Relaxed);
        let ratelimits = counters.ratelimits.load(Ordering::Relaxed);

        self.stats_pb.set_message(format!(
            "Speed: {}/s | Success: {} | Errors: {} | Retries: {}",
            rows_per_sec, success, errors, ratelimits
        ));
    }

    pub fn update_found(&self, found: u64, latest: Option<&str>) {
        self.found_pb.set_position(found);
        if let Some(latest) = latest {
            self.found_pb.set_message(format!("Latest: {}", latest));
        }
    }

    pub fn finish(&self, found: u64, latest: Option<&str>) {
        self.rows_pb.finish_with_message("done");
        self.stats_pb.finish_with_message("done");

        if found > 0 {
            let suffix = latest.map(|l| format!(" (latest: {l})")).unwrap_or_default();
            self.found_pb
                .finish_with_message(format!("found {found} record(s){suffix}"));
        } else {
            self.found_pb.finish_with_message("no owners or phones found");
        }
    }
}

impl Clone for ProgressBars {
    fn clone(&self) -> Self {
        Self {
            rows_pb: self.rows_pb.clone(),
            found_pb: self.found_pb.clone(),
            stats_pb: self.stats_pb.clone(),
        }
    }
}
