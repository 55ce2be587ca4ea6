//! Gateway tunables.
//!
//! Every knob has a compiled-in default and an environment override, so
//! embedding transports can run with zero configuration.

/// Tunables for the execution core.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum number of batch statements to prepare simultaneously.
    ///
    /// Low values (including 1, the default) bound concurrent backend
    /// load per batch at the cost of batch-preparation latency.
    pub max_concurrent_batch_prepares: usize,
    /// Maximum number of prepared statements kept in the cache.
    pub prepared_cache_max_entries: usize,
    /// Keep failed prepares cached (fail fast on repeats) instead of
    /// evicting them so the next identical request retries.
    pub preserve_failed_prepares: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batch_prepares: 1,
            prepared_cache_max_entries: 10_000,
            preserve_failed_prepares: false,
        }
    }
}

impl GatewayConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `PORTICO_BATCH_PREPARE_CONCURRENCY`,
    /// `PORTICO_PREPARED_CACHE_MAX_ENTRIES`,
    /// `PORTICO_PRESERVE_FAILED_PREPARES`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_batch_prepares: env_usize(
                "PORTICO_BATCH_PREPARE_CONCURRENCY",
                defaults.max_concurrent_batch_prepares,
            )
            .max(1),
            prepared_cache_max_entries: env_usize(
                "PORTICO_PREPARED_CACHE_MAX_ENTRIES",
                defaults.prepared_cache_max_entries,
            ),
            preserve_failed_prepares: env_bool(
                "PORTICO_PRESERVE_FAILED_PREPARES",
                defaults.preserve_failed_prepares,
            ),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
