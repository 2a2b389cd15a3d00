//! Timing helpers

use std::time::{Duration, Instant};

/// Wall-clock timer for one pipeline stage
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Stop the timer, logging the elapsed time at debug level
    pub fn stop(self) -> Duration {
        tracing::debug!("{}: {:.3}ms", self.label, self.elapsed_ms());
        self.elapsed()
    }
}

/// Render milliseconds as `XmYY.ZZZs`
pub fn format_duration(ms: f64) -> String {
    let ms = if ms.is_finite() && ms > 0.0 { ms } else { 0.0 };
    let total_millis = ms.round() as u64;
    let minutes = total_millis / 60_000;
    let remainder = total_millis % 60_000;
    format!("{}m{:02}.{:03}s", minutes, remainder / 1000, remainder % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
        assert!(timer.stop() >= Duration::from_millis(10));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0m00.000s");
        assert_eq!(format_duration(1.0), "0m00.001s");
        assert_eq!(format_duration(12_345.4), "0m12.345s");
        assert_eq!(format_duration(61_001.0), "1m01.001s");
        assert_eq!(format_duration(f64::NAN), "0m00.000s");
    }
}
