//! View cache configuration.
//!
//! Controls the debounce window and view capacity via `livetable.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_MAX_VIEWS: usize = 256;

/// View cache configuration from `livetable.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Quiescence window (ms) before a burst of changes bumps the cache version.
    pub debounce_ms: u64,
    /// Maximum number of cached views before the least recently used is evicted.
    pub max_views: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_views: DEFAULT_MAX_VIEWS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            debounce_ms: settings.debounce.as_millis() as u64,
            max_views: settings.max_views.get(),
        }
    }
}

impl CacheConfig {
    /// Debounce window, clamped to at least one millisecond.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(1))
    }

    /// Returns the view capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_views_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_views).unwrap_or(NonZeroUsize::MIN)
    }
}
