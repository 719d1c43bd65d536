use crate::models::UploadProgress;
use std::sync::Mutex;
use std::time::Instant;

/// Trait for rendering upload progress.
///
/// The CLI implements this with an indicatif bar. All methods have default
/// no-op implementations.
pub trait ProgressRenderer: Send + Sync {
    fn on_start(&self, _total_files: usize, _total_bytes: u64) {}
    fn on_update(&self, _progress: &UploadProgress) {}
    fn on_complete(&self, _progress: &UploadProgress) {}
}

/// No-op renderer for silent operation.
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {}

struct Counters {
    completed: usize,
    bytes_uploaded: u64,
    current_file: Option<String>,
    finished: bool,
}

/// Counts terminal uploads and derives percent, throughput and ETA.
pub struct ProgressTracker {
    total_files: usize,
    total_bytes: u64,
    started: Instant,
    counters: Mutex<Counters>,
    renderer: Box<dyn ProgressRenderer>,
}

impl ProgressTracker {
    pub fn new(total_files: usize, total_bytes: u64, renderer: Box<dyn ProgressRenderer>) -> Self {
        renderer.on_start(total_files, total_bytes);
        Self {
            total_files,
            total_bytes,
            started: Instant::now(),
            counters: Mutex::new(Counters {
                completed: 0,
                bytes_uploaded: 0,
                current_file: None,
                finished: false,
            }),
            renderer,
        }
    }

    /// Record one more terminal upload of `bytes` for `key`.
    pub fn update(&self, key: &str, bytes: u64) -> UploadProgress {
        let progress = {
            let mut counters = self.lock();
            counters.completed += 1;
            counters.bytes_uploaded += bytes;
            counters.current_file = Some(key.to_string());
            self.compute(&counters)
        };
        self.renderer.on_update(&progress);
        progress
    }

    pub fn snapshot(&self) -> UploadProgress {
        let counters = self.lock();
        self.compute(&counters)
    }

    /// Stop rendering. Counters are left as they are.
    pub fn complete(&self) {
        let progress = {
            let mut counters = self.lock();
            if counters.finished {
                return;
            }
            counters.finished = true;
            self.compute(&counters)
        };
        self.renderer.on_complete(&progress);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked.
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn compute(&self, counters: &Counters) -> UploadProgress {
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            counters.bytes_uploaded as f64 / elapsed
        } else {
            0.0
        };

        let remaining = self.total_bytes.saturating_sub(counters.bytes_uploaded);
        let eta = if speed > 0.0 {
            Some((remaining as f64 / speed).round() as u64)
        } else {
            None
        };

        let percent = if self.total_files == 0 {
            0
        } else {
            ((counters.completed as f64 / self.total_files as f64) * 100.0).round() as u32
        };

        UploadProgress {
            current_file: counters.current_file.clone(),
            completed: counters.completed,
            total: self.total_files,
            percent_complete: percent,
            bytes_uploaded: counters.bytes_uploaded,
            total_bytes: self.total_bytes,
            current_speed_bytes_per_sec: speed,
            estimated_seconds_remaining: eta,
        }
    }
}
