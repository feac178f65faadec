use std::time::Duration;

/// An infinite stream of retry delays, each one `factor` times the last up
/// to a maximum; once the maximum is reached it is returned from then on.
/// The delays are plain values, the caller decides how to sleep, so this is
/// not suitable for asynchronous code as-is.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.curr;
        let grown = self.curr * self.factor;
        self.curr = if grown > self.max { self.max } else { grown };
        Some(current)
    }
}
