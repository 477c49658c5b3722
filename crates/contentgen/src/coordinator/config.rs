use std::time::Duration;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Days per text generation batch.
    pub text_batch_size: usize,
    /// Concurrent image calls per window in parallel mode.
    pub image_window: usize,
    pub keep_alive_interval: Duration,
    /// Percentage points added per keep-alive tick.
    pub keep_alive_step: f64,
}

impl CoordinatorConfig {
    pub fn from_config(config: &Config) -> Self {
        let generation = &config.generation;
        Self {
            text_batch_size: generation.text_batch_size.max(1),
            image_window: generation.image_window.max(1),
            keep_alive_interval: Duration::from_millis(generation.keep_alive_interval_ms.max(1)),
            keep_alive_step: generation.keep_alive_step,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            text_batch_size: 7,
            image_window: 10,
            keep_alive_interval: Duration::from_secs(2),
            keep_alive_step: 0.5,
        }
    }
}
