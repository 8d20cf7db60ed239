use std::time::{Duration, Instant};

/// Holds each edge to a minimum wall-clock interval so an interactive run
/// doesn't race past faster than anyone can read it. Simulated time is not
/// affected, and nothing here ever waits on input.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            last: None,
        }
    }

    /// sleep off whatever is left of the interval since the previous call
    pub fn wait(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                spin_sleep::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
