/// Turns uploads off while remote cleanup keeps failing, so the remote
/// store cannot grow without bound.
#[derive(Debug, Clone)]
pub struct BackpressureGovernor {
    failure_count: u32,
    failure_limit: u32,
}

impl BackpressureGovernor {
    pub const DEFAULT_FAILURE_LIMIT: u32 = 4;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_FAILURE_LIMIT)
    }

    pub fn with_limit(failure_limit: u32) -> Self {
        Self {
            failure_count: 0,
            failure_limit,
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn failure_limit(&self) -> u32 {
        self.failure_limit
    }

    pub fn should_throttle_uploads(&self) -> bool {
        self.failure_count >= self.failure_limit
    }
}

impl Default for BackpressureGovernor {
    fn default() -> Self {
        Self::new()
    }
}
