use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// `(stage, current, total, message)`
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

const MIN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Default)]
struct Emitted {
    at: Option<Instant>,
    current: u64,
}

/// Forwards at most one report per 200ms; completion always goes through.
/// Reports older than one already forwarded are dropped, so the display never
/// moves backwards.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last: Mutex<Emitted>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last: Mutex::new(Emitted::default()),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        // Held across the callback so concurrent workers emit one at a time.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.at.is_some() && current < last.current {
            return;
        }
        let is_done = current >= total;
        if !is_done && last.at.is_some_and(|t| t.elapsed() < MIN_INTERVAL) {
            return;
        }
        *last = Emitted {
            at: Some(Instant::now()),
            current,
        };
        (self.inner)(stage, current, total, message);
    }
}

/// Completed-vs-total counter for one pass over the files.
///
/// Starts at `(0, total)`; every [`advance`](Self::advance) bumps the counter and
/// offers the new pair to the display. The counter is authoritative, the display
/// may skip intermediate values.
pub struct RunProgress<'a> {
    stage: &'static str,
    total: u64,
    completed: AtomicU64,
    display: ThrottledProgress<'a>,
}

impl<'a> RunProgress<'a> {
    pub fn start(stage: &'static str, total: u64, callback: &'a ProgressCallback<'a>) -> Self {
        let progress = Self {
            stage,
            total,
            completed: AtomicU64::new(0),
            display: ThrottledProgress::new(callback),
        };
        progress.display.report(stage, 0, total, "");
        progress
    }

    /// One more file done. Returns the new completed count.
    pub fn advance(&self, message: &str) -> u64 {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        // Files created between the two passes can push past the counted total.
        self.display
            .report(self.stage, done, self.total.max(done), message);
        done
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Final `(completed, completed)` report; consumes the tracker.
    pub fn finish(self) -> u64 {
        let done = self.completed();
        (self.display.inner)(self.stage, done, done, "done");
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(events: &Mutex<Vec<(u64, u64)>>) -> Vec<(u64, u64)> {
        events.lock().unwrap().clone()
    }

    #[test]
    fn test_throttle_keeps_first_and_last() {
        let events = Mutex::new(Vec::new());
        let cb = |_: &str, current: u64, total: u64, _: &str| {
            events.lock().unwrap().push((current, total));
        };
        let tp = ThrottledProgress::new(&cb);
        for i in 1..=50 {
            tp.report("extract", i, 50, "");
        }
        let seen = snapshot(&events);
        assert_eq!(seen.first(), Some(&(1, 50)));
        assert_eq!(seen.last(), Some(&(50, 50)));
        assert!(seen.len() < 50);
    }

    #[test]
    fn test_late_report_after_completion_is_dropped() {
        let events = Mutex::new(Vec::new());
        let cb = |_: &str, current: u64, total: u64, _: &str| {
            events.lock().unwrap().push((current, total));
        };
        let tp = ThrottledProgress::new(&cb);
        tp.report("extract", 0, 4, "");
        tp.report("extract", 4, 4, "");
        tp.report("extract", 3, 4, "");
        assert_eq!(snapshot(&events), vec![(0, 4), (4, 4)]);
    }

    #[test]
    fn test_run_progress_counts_every_file() {
        let events = Mutex::new(Vec::new());
        let cb = |_: &str, current: u64, total: u64, _: &str| {
            events.lock().unwrap().push((current, total));
        };
        let progress = RunProgress::start("extract", 5, &cb);
        for _ in 0..5 {
            progress.advance("file");
        }
        assert_eq!(progress.completed(), 5);
        assert_eq!(progress.finish(), 5);

        let seen = snapshot(&events);
        assert_eq!(seen.first(), Some(&(0, 5)));
        assert_eq!(seen.last(), Some(&(5, 5)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_total_grows_with_late_files() {
        let cb = |_: &str, current: u64, total: u64, _: &str| assert!(current <= total);
        let progress = RunProgress::start("extract", 1, &cb);
        progress.advance("a");
        progress.advance("b");
        assert_eq!(progress.completed(), 2);
    }
}
