/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Timer is stopped; nothing happened.
    Idle,
    Running { remaining_secs: u32 },
    /// Remaining time just reached zero. Reported once per run.
    Expired,
}

/// Per-item countdown driven by an external one-second tick.
///
/// Holds no thread or timer of its own; the session driver calls [`Countdown::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    limit_secs: u32,
    remaining_secs: u32,
    running: bool,
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down whatever was running and start a fresh window.
    pub fn restart(&mut self, limit_secs: u32) {
        self.limit_secs = limit_secs;
        self.remaining_secs = limit_secs;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn tick(&mut self) -> CountdownTick {
        if !self.running {
            return CountdownTick::Idle;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.running = false;
            CountdownTick::Expired
        } else {
            CountdownTick::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.limit_secs.saturating_sub(self.remaining_secs)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}
