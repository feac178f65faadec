use std::time::{Duration, Instant};


/// A cumulative stopwatch: `start`/`stop` pairs add up, `total` reads the
/// sum so far. Backs the per-block communication and per-operator
/// computation clocks.
#[derive(Clone, Debug, Default)]
pub struct Timer {
    accumulated: Duration,
    started: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        debug_assert!(self.started.is_none(), "timer already running");
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        let started = self.started.take().expect("timer was not running");
        self.accumulated += started.elapsed();
    }

    pub fn total(&self) -> Duration {
        self.accumulated
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started = None;
    }
}

// ============================================================================
#[cfg(test)]
mod test {
    use super::Timer;

    #[test]
    fn accumulates_across_start_stop_pairs() {
        let mut timer = Timer::new();
        timer.start();
        std::thread::sleep(std::time::Duration::from_millis(2));
        timer.stop();
        let first = timer.total();
        assert!(first >= std::time::Duration::from_millis(2));

        timer.start();
        timer.stop();
        assert!(timer.total() >= first);

        timer.reset();
        assert_eq!(timer.total(), std::time::Duration::ZERO);
    }
}
