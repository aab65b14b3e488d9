use std::time::Duration;

use crate::config::EffectConfig;

/// Eases the noise effect strength toward 1 while the page is being scrolled
/// and back toward 0 once scrolling has stopped for the debounce window.
///
/// All timestamps are offsets from the start of the showcase clock.
#[derive(Debug, Clone)]
pub struct EffectController {
    current: f32,
    aim: f32,
    damping: f32,
    debounce: Duration,
    // Armed by each scroll event, cleared when it fires.
    idle_deadline: Option<Duration>,
}

impl EffectController {
    pub fn new(config: &EffectConfig) -> Self {
        Self {
            current: 0.0,
            aim: 0.0,
            damping: config.damping,
            debounce: config.debounce,
            idle_deadline: None,
        }
    }

    pub fn on_scroll(&mut self, now: Duration) {
        self.aim = 1.0;
        // Replaces any pending deadline.
        self.idle_deadline = Some(now + self.debounce);
    }

    /// Fires the idle deadline if it has passed, then takes one easing step.
    pub fn on_frame(&mut self, now: Duration) {
        if self.idle_deadline.is_some_and(|deadline| now >= deadline) {
            self.idle_deadline = None;
            self.aim = 0.0;
        }

        self.current += (self.aim - self.current) * self.damping;
    }

    pub fn strength(&self) -> f32 {
        self.current
    }

    #[cfg(test)]
    pub fn aim(&self) -> f32 {
        self.aim
    }

    #[cfg(test)]
    pub fn is_debounce_pending(&self) -> bool {
        self.idle_deadline.is_some()
    }
}
