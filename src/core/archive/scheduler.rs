use crate::core::config::{AutosaveCadence, MotionConfig, RetentionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    Motion,
    Autosave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    /// No kept frame to compare against yet.
    Prime,
    Keep { reason: SaveReason, score: f64 },
    Discard { score: f64 },
}

impl TickAction {
    pub fn is_keep(&self) -> bool {
        matches!(self, TickAction::Keep { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPlan {
    pub action: TickAction,
    pub enforce_retention: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub threshold: f64,
    pub autosave_period: u32,
    pub autosave_cadence: AutosaveCadence,
    pub retention_check_period: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threshold: 2.985,
            autosave_period: 6,
            autosave_cadence: AutosaveCadence::Fixed,
            retention_check_period: 9999,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(motion: &MotionConfig, retention: &RetentionConfig) -> Self {
        Self {
            threshold: motion.threshold,
            autosave_period: motion.autosave_period,
            autosave_cadence: motion.autosave_cadence,
            retention_check_period: retention.check_period,
        }
    }
}

/// Per-tick keep/discard decision plus the retention cadence.
///
/// A frame is kept when its score falls below the threshold (motion) or
/// when the autosave counter sits on the last slot of its period.
pub struct ArchivalScheduler {
    config: SchedulerConfig,
    autosave_counter: u32,
    retention_counter: u32,
    tick_counter: u64,
}

impl ArchivalScheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            autosave_counter: 0,
            retention_counter: 0,
            tick_counter: 0,
        }
    }

    /// Advance one tick. `score` is `None` while there is no prior frame.
    pub fn plan(&mut self, score: Option<f64>) -> TickPlan {
        self.tick_counter += 1;

        let action = match score {
            None => TickAction::Prime,
            Some(score) => self.decide(score),
        };

        self.retention_counter += 1;
        let enforce_retention = self.retention_counter >= self.config.retention_check_period;
        if enforce_retention {
            self.retention_counter = 0;
        }

        TickPlan {
            action,
            enforce_retention,
        }
    }

    fn decide(&mut self, score: f64) -> TickAction {
        let period = self.config.autosave_period.max(1);
        let reason = if score < self.config.threshold {
            Some(SaveReason::Motion)
        } else if self.autosave_counter == period - 1 {
            Some(SaveReason::Autosave)
        } else {
            None
        };

        match self.config.autosave_cadence {
            AutosaveCadence::Fixed => {
                self.autosave_counter = (self.autosave_counter + 1) % period;
            }
            AutosaveCadence::SinceLastSave => {
                self.autosave_counter = if reason.is_some() {
                    0
                } else {
                    (self.autosave_counter + 1) % period
                };
            }
        }

        match reason {
            Some(reason) => TickAction::Keep { reason, score },
            None => TickAction::Discard { score },
        }
    }

    pub fn is_motion(&self, score: f64) -> bool {
        score < self.config.threshold
    }

    #[cfg(test)]
    pub fn autosave_counter(&self) -> u32 {
        self.autosave_counter
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }
}

impl Default for ArchivalScheduler {
    fn default() -> Self {
        Self::new()
    }
}
