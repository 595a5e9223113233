use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Timing {
    pub name: &'static str,
    pub duration: Duration,
}

impl Display for Timing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};dur={}", self.name, self.duration.as_millis())
    }
}

/// Durations of the steps of one invocation, in the order they ran.
#[derive(Debug, Default)]
pub struct StageTimings {
    timings: Vec<Timing>,
}

impl StageTimings {
    pub fn new() -> StageTimings {
        StageTimings::default()
    }

    /// Records the time elapsed since `started` under `name`.
    pub fn record(&mut self, name: &'static str, started: Instant) {
        self.timings.push(Timing {
            name,
            duration: started.elapsed(),
        });
    }
}

impl Display for StageTimings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = self
            .timings
            .iter()
            .map(|timing| timing.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{display}")
    }
}
