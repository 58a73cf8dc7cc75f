//! Guided breathing timer
//!
//! A one-second tick drives the phase machine
//! inhale -> hold -> exhale -> inhale. Finishing an exhale completes a cycle.
//! The caller owns the clock; the timer only counts ticks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathingPhase {
    Inhale,
    Hold,
    Exhale,
}

impl BreathingPhase {
    pub fn next(self) -> Self {
        match self {
            Self::Inhale => Self::Hold,
            Self::Hold => Self::Exhale,
            Self::Exhale => Self::Inhale,
        }
    }

    /// Instruction shown to the user
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Inhale => "Breathe in",
            Self::Hold => "Hold",
            Self::Exhale => "Breathe out",
        }
    }
}

/// Phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingPattern {
    pub inhale: u32,
    pub hold: u32,
    pub exhale: u32,
}

impl Default for BreathingPattern {
    fn default() -> Self {
        Self {
            inhale: 5,
            hold: 4,
            exhale: 5,
        }
    }
}

impl BreathingPattern {
    /// Zero durations are raised to one second so every phase is visible
    pub fn new(inhale: u32, hold: u32, exhale: u32) -> Self {
        Self {
            inhale: inhale.max(1),
            hold: hold.max(1),
            exhale: exhale.max(1),
        }
    }

    pub fn duration(&self, phase: BreathingPhase) -> u32 {
        match phase {
            BreathingPhase::Inhale => self.inhale,
            BreathingPhase::Hold => self.hold,
            BreathingPhase::Exhale => self.exhale,
        }
    }

    pub fn cycle_seconds(&self) -> u32 {
        self.inhale + self.hold + self.exhale
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreathingTimer {
    pattern: BreathingPattern,
    phase: BreathingPhase,
    remaining: u32,
    cycles: u32,
    running: bool,
}

impl BreathingTimer {
    pub fn new(pattern: BreathingPattern) -> Self {
        let pattern = BreathingPattern::new(pattern.inhale, pattern.hold, pattern.exhale);
        Self {
            pattern,
            phase: BreathingPhase::Inhale,
            remaining: pattern.inhale,
            cycles: 0,
            running: false,
        }
    }

    pub fn phase(&self) -> BreathingPhase {
        self.phase
    }

    /// Seconds left in the current phase
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pattern(&self) -> BreathingPattern {
        self.pattern
    }

    /// Start or pause. Returns the new running state.
    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    /// Back to a fresh, paused inhale
    pub fn reset(&mut self) {
        self.phase = BreathingPhase::Inhale;
        self.remaining = self.pattern.inhale;
        self.cycles = 0;
        self.running = false;
    }

    /// Advance one second. No-op while paused.
    ///
    /// Returns the new phase when this tick caused a transition.
    pub fn tick(&mut self) -> Option<BreathingPhase> {
        if !self.running {
            return None;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return None;
        }

        if self.phase == BreathingPhase::Exhale {
            self.cycles += 1;
        }
        self.phase = self.phase.next();
        self.remaining = self.pattern.duration(self.phase);
        Some(self.phase)
    }
}

impl Default for BreathingTimer {
    fn default() -> Self {
        Self::new(BreathingPattern::default())
    }
}
