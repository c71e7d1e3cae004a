use std::time::Instant;

/// Wall-clock stopwatch for stage timings
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Milliseconds since the last lap (or creation), then restart.
    pub fn lap_ms(&mut self) -> u64 {
        let ms = self.elapsed_ms();
        self.start = Instant::now();
        ms
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
