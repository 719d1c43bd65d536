use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use r2_migrate_core::models::UploadProgress;
use r2_migrate_core::ProgressRenderer;
use std::sync::Mutex;
use std::time::Duration;

/// Upload progress bar: files done out of total, throughput and ETA.
pub struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

fn upload_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {spinner:.cyan} Uploading [{bar:30.cyan/dim}] {pos}/{len} files ({percent}%) {msg}",
    )
    .map(|style| {
        style
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    })
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl ProgressRenderer for CliProgress {
    fn on_start(&self, total_files: usize, _total_bytes: u64) {
        let pb = ProgressBar::new(total_files as u64);
        pb.set_style(upload_style());
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_update(&self, progress: &UploadProgress) {
        self.with_bar(|pb| {
            pb.set_position(progress.completed as u64);
            let eta = match progress.estimated_seconds_remaining {
                Some(secs) => format!("ETA {}s", secs),
                None => "ETA calculating...".to_string(),
            };
            pb.set_message(format!(
                "{}/s, {}",
                HumanBytes(progress.current_speed_bytes_per_sec as u64),
                eta
            ));
        });
    }

    fn on_complete(&self, progress: &UploadProgress) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        eprintln!(
            "  \x1b[32m✓\x1b[0m Upload complete: {} files, {}",
            progress.completed,
            HumanBytes(progress.bytes_uploaded)
        );
    }
}
