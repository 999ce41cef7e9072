use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

/// Accumulates time spent reusing work of an in-flight save.
///
/// That cost is already attributed to the save itself, so filter profiling
/// subtracts this total from its own measurements. Clones share the same total
/// and measurement count.
#[derive(Debug, Clone, Default)]
pub struct ExcludedProfilingTime {
    total: Rc<Cell<Duration>>,
    measurements: Rc<Cell<u64>>,
}

impl ExcludedProfilingTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, elapsed: Duration) {
        self.total.set(self.total.get() + elapsed);
    }

    pub fn total(&self) -> Duration {
        self.total.get()
    }

    /// Number of [`measure`](Self::measure) calls since creation or the last reset.
    pub fn measurements(&self) -> u64 {
        self.measurements.get()
    }

    pub fn reset(&self) {
        self.total.set(Duration::ZERO);
        self.measurements.set(0);
    }

    /// Runs `f` and adds its wall time to the total.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.add(start.elapsed());
        self.measurements.set(self.measurements.get() + 1);
        result
    }
}
