//! Timing and counter signals emitted by the pipeline.
//!
//! Sinks are fire-and-forget: nothing they do can fail a build or a query.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub trait Instrumentation: Send + Sync {
    fn build_completed(&self, elapsed: Duration, items: usize);
    fn search_completed(&self, elapsed: Duration);
    fn generation_completed(&self, elapsed: Duration);
    fn request_finished(&self, success: bool);
    fn comic_selected(&self, id: &str);
}

/// Emits every signal as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Instrumentation for LogSink {
    fn build_completed(&self, elapsed: Duration, items: usize) {
        tracing::info!(elapsed_ms = millis(elapsed), items, "index build completed");
    }

    fn search_completed(&self, elapsed: Duration) {
        tracing::debug!(elapsed_ms = millis(elapsed), "vector search completed");
    }

    fn generation_completed(&self, elapsed: Duration) {
        tracing::debug!(elapsed_ms = millis(elapsed), "generation completed");
    }

    fn request_finished(&self, success: bool) {
        tracing::debug!(success, "request finished");
    }

    fn comic_selected(&self, id: &str) {
        tracing::info!(comic_id = id, "comic selected");
    }
}

/// In-process counters. Useful for tests and for a summary at exit.
#[derive(Debug, Default)]
pub struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    builds: AtomicU64,
    last_build_us: AtomicU64,
    last_search_us: AtomicU64,
    last_generation_us: AtomicU64,
    selections: Mutex<HashMap<String, u64>>,
}

impl Counters {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of completed index builds.
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn last_build(&self) -> Duration {
        Duration::from_micros(self.last_build_us.load(Ordering::Relaxed))
    }

    pub fn last_search(&self) -> Duration {
        Duration::from_micros(self.last_search_us.load(Ordering::Relaxed))
    }

    pub fn last_generation(&self) -> Duration {
        Duration::from_micros(self.last_generation_us.load(Ordering::Relaxed))
    }

    /// How often `id` has been selected.
    pub fn selections_of(&self, id: &str) -> u64 {
        self.selections
            .lock()
            .map(|m| m.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

/// Saturates instead of truncating.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl Instrumentation for Counters {
    fn build_completed(&self, elapsed: Duration, _items: usize) {
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.last_build_us.store(micros(elapsed), Ordering::Relaxed);
    }

    fn search_completed(&self, elapsed: Duration) {
        self.last_search_us.store(micros(elapsed), Ordering::Relaxed);
    }

    fn generation_completed(&self, elapsed: Duration) {
        self.last_generation_us.store(micros(elapsed), Ordering::Relaxed);
    }

    fn request_finished(&self, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn comic_selected(&self, id: &str) {
        // A poisoned map only loses a count.
        if let Ok(mut m) = self.selections.lock() {
            *m.entry(id.to_string()).or_default() += 1;
        }
    }
}

/// Fans every signal out to two sinks.
#[derive(Debug, Default)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: Instrumentation, B: Instrumentation> Instrumentation for Tee<A, B> {
    fn build_completed(&self, elapsed: Duration, items: usize) {
        self.0.build_completed(elapsed, items);
        self.1.build_completed(elapsed, items);
    }

    fn search_completed(&self, elapsed: Duration) {
        self.0.search_completed(elapsed);
        self.1.search_completed(elapsed);
    }

    fn generation_completed(&self, elapsed: Duration) {
        self.0.generation_completed(elapsed);
        self.1.generation_completed(elapsed);
    }

    fn request_finished(&self, success: bool) {
        self.0.request_finished(success);
        self.1.request_finished(success);
    }

    fn comic_selected(&self, id: &str) {
        self.0.comic_selected(id);
        self.1.comic_selected(id);
    }
}
