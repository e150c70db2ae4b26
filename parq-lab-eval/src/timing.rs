//! Wall-clock reporting around long-running steps.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};

fn clock(at: DateTime<Local>) -> String {
  at.format("%H:%M:%S").to_string()
}

pub struct Timer {
  start: Instant,
}

impl Timer {
  /// Print `Starting at HH:MM:SS` and start counting.
  pub fn start() -> Self {
    println!("Starting at {}", clock(Local::now()));
    Timer {
      start: Instant::now(),
    }
  }

  pub fn elapsed(&self) -> Duration {
    self.start.elapsed()
  }

  /// Print `Ending at HH:MM:SS (total: x.xx seconds)` and return the elapsed time.
  pub fn stop(self) -> Duration {
    let elapsed = self.elapsed();
    println!("{}", ending_line(Local::now(), elapsed));
    elapsed
  }
}

fn ending_line(at: DateTime<Local>, elapsed: Duration) -> String {
  format!("Ending at {} (total: {:.2} seconds)", clock(at), elapsed.as_secs_f64())
}

/// Run `f` and return its result with the time it took. The duration is logged, not printed.
pub fn timed<T>(label: &str, f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
  let start = Instant::now();
  let value = f()?;
  let elapsed = start.elapsed();
  tracing::debug!(label, elapsed = elapsed.as_secs_f64(), "timed");
  Ok((value, elapsed))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn test_ending_line() {
    let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
    assert_eq!(
      "Ending at 09:05:07 (total: 1.50 seconds)",
      ending_line(at, Duration::from_millis(1500))
    );
  }

  #[test]
  fn test_timed_propagates_errors() {
    let (value, _) = timed("answer", || Ok(21 * 2)).unwrap();
    assert_eq!(42, value);
    assert!(timed("failing", || -> Result<()> { anyhow::bail!("failed") }).is_err());
  }
}
