use log::debug;
use std::time::Duration;

/// The remaining time of the current round, as a percentage.
///
/// Advisory only: the sequencer decides when rounds change. The countdown is
/// restarted from each round start it is told about, and reports at most
/// `fps` values per second.
#[derive(Debug, Clone)]
pub struct Countdown {
    cycle: Duration,
    min_interval: Duration,
    started_at: Option<Duration>,
    last_frame: Option<Duration>,
}

impl Countdown {
    pub fn new(cycle: Duration, fps: u32) -> Countdown {
        Countdown {
            cycle,
            min_interval: Duration::from_secs(1) / fps.max(1),
            started_at: None,
            last_frame: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Duration) {
        self.started_at = Some(now);
        self.last_frame = None;
    }

    pub fn stop(&mut self) {
        self.started_at = None;
        self.last_frame = None;
    }

    /// Moves the zero point to the start of a new round.
    pub fn resync(&mut self, round_start: Duration, cycle: Duration) {
        debug!(
            "Countdown::resync: round start {:?}, cycle {:?}",
            round_start, cycle
        );
        self.cycle = cycle;
        self.start(round_start);
    }

    /// The remaining share of the round, between 0 and 100.
    pub fn remaining(&self, now: Duration) -> f64 {
        match self.started_at {
            None => 0.0,
            Some(_) if self.cycle.is_zero() => 0.0,
            Some(start) => {
                let elapsed = now.saturating_sub(start).as_secs_f64();
                let total = self.cycle.as_secs_f64();
                ((total - elapsed) / total * 100.0).max(0.0)
            }
        }
    }

    /// The value to display at this frame, or `None` when the last value
    /// is recent enough.
    pub fn frame(&mut self, now: Duration) -> Option<f64> {
        self.started_at?;
        if let Some(last) = self.last_frame {
            if now.saturating_sub(last) < self.min_interval {
                return None;
            }
        }
        self.last_frame = Some(now);
        Some(self.remaining(now))
    }
}
