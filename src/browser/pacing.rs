use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::InputSimulator;

/// Human-paced input timing.
///
/// The HTTP browser has no pointer or keyboard surface, so this only reproduces
/// the pauses a person would leave between actions.
#[derive(Debug, Clone)]
pub struct PacedInput {
    rng: fastrand::Rng,
    /// Multiplier on every pause; 0 disables waiting entirely.
    scale: f64,
}

impl PacedInput {
    pub fn new() -> Self {
        PacedInput {
            rng: fastrand::Rng::new(),
            scale: 1.0,
        }
    }

    #[cfg(test)]
    pub fn instant() -> Self {
        PacedInput {
            rng: fastrand::Rng::new(),
            scale: 0.0,
        }
    }

    fn pick(&mut self, min_secs: f64, max_secs: f64) -> Duration {
        let (lo, hi) = if min_secs <= max_secs {
            (min_secs, max_secs)
        } else {
            (max_secs, min_secs)
        };
        let secs = lo + (hi - lo) * self.rng.f64();
        Duration::from_secs_f64((secs * self.scale).max(0.0))
    }

    async fn pause(&mut self, min_secs: f64, max_secs: f64) {
        let wait = self.pick(min_secs, max_secs);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for PacedInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSimulator for PacedInput {
    /// A scroll is split into 3-8 small wheel steps with short pauses.
    async fn scroll(&mut self) {
        let steps = self.rng.usize(3..=8);
        for _ in 0..steps {
            self.pause(0.1, 0.4).await;
        }
        debug!("Scrolled in {} steps", steps);
    }

    async fn click(&mut self, selector: &str) -> bool {
        self.pause(0.1, 0.3).await;
        debug!("No pointer surface for click on {}", selector);
        false
    }

    async fn type_text(&mut self, selector: &str, text: &str) {
        self.click(selector).await;
        for ch in text.chars() {
            if " ,.?!".contains(ch) {
                self.pause(0.1, 0.3).await;
            } else {
                self.pause(0.05, 0.15).await;
            }
        }
    }

    async fn delay(&mut self, min_secs: f64, max_secs: f64) {
        self.pause(min_secs, max_secs).await;
    }
}
