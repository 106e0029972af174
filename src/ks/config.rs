// Licensed under the Apache-2.0 license

use fugit::NanosDurationU32;

use super::poll::PollBudget;
use super::regs::{KS_CTL_SCMB_MSK, KS_CTL_SILENT_MSK};

/// Core clock of the M55M1 after the default clock setup.
pub const DEFAULT_CORE_CLOCK_HZ: u32 = 220_000_000;

pub struct KsConfig {
    /// Status checks allowed while waiting for one command.
    pub poll_attempts: u32,
    /// Pause between two status checks.
    pub poll_interval: NanosDurationU32,
    /// Run key transfers in silent access mode.
    pub silent: bool,
    /// Enable key scrambling.
    pub scramble: bool,
}

impl KsConfig {
    #[must_use]
    pub const fn poll_budget(&self) -> PollBudget {
        PollBudget::new(self.poll_attempts, self.poll_interval)
    }

    /// `CTL` mode bits selected by this configuration.
    #[must_use]
    pub const fn mode_bits(&self) -> u32 {
        let mut bits = 0;
        if self.silent {
            bits |= KS_CTL_SILENT_MSK;
        }
        if self.scramble {
            bits |= KS_CTL_SCMB_MSK;
        }
        bits
    }
}

impl Default for KsConfig {
    fn default() -> Self {
        KsConfigBuilder::new().build()
    }
}

pub struct KsConfigBuilder {
    poll_attempts: u32,
    poll_interval: NanosDurationU32,
    silent: bool,
    scramble: bool,
}

impl Default for KsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KsConfigBuilder {
    /// Defaults to roughly one second of tight polling at the default core clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_attempts: DEFAULT_CORE_CLOCK_HZ,
            poll_interval: NanosDurationU32::from_ticks(0),
            silent: false,
            scramble: false,
        }
    }
    #[must_use]
    pub const fn poll_attempts(mut self, attempts: u32) -> Self {
        self.poll_attempts = attempts;
        self
    }
    /// Budget of one second of tight polling for a core running at `hz`.
    #[must_use]
    pub const fn core_clock_hz(mut self, hz: u32) -> Self {
        self.poll_attempts = hz;
        self
    }
    #[must_use]
    pub const fn poll_interval(mut self, interval: NanosDurationU32) -> Self {
        self.poll_interval = interval;
        self
    }
    #[must_use]
    pub const fn silent(mut self, enabled: bool) -> Self {
        self.silent = enabled;
        self
    }
    #[must_use]
    pub const fn scramble(mut self, enabled: bool) -> Self {
        self.scramble = enabled;
        self
    }
    #[must_use]
    pub const fn build(self) -> KsConfig {
        KsConfig {
            poll_attempts: self.poll_attempts,
            poll_interval: self.poll_interval,
            silent: self.silent,
            scramble: self.scramble,
        }
    }
}
