// crates/server-jobs/src/config.rs
//! Runner tuning, overridable from the environment.

/// Default per-job broadcast buffer.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;
/// Default buffer of the runner-wide progress channel.
pub const DEFAULT_GLOBAL_BROADCAST_CAPACITY: usize = 256;
/// Finished jobs kept for polling before the oldest are pruned.
pub const DEFAULT_MAX_RETAINED_FINISHED: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobsConfig {
    pub broadcast_capacity: usize,
    pub global_broadcast_capacity: usize,
    pub max_retained_finished: usize,
}

impl JobsConfig {
    /// Read overrides from `EXPORT_JOBS_BROADCAST_CAPACITY` and
    /// `EXPORT_JOBS_MAX_RETAINED`. Unset or unparsable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broadcast_capacity: env_usize("EXPORT_JOBS_BROADCAST_CAPACITY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.broadcast_capacity),
            global_broadcast_capacity: defaults.global_broadcast_capacity,
            max_retained_finished: env_usize("EXPORT_JOBS_MAX_RETAINED")
                .unwrap_or(defaults.max_retained_finished),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            global_broadcast_capacity: DEFAULT_GLOBAL_BROADCAST_CAPACITY,
            max_retained_finished: DEFAULT_MAX_RETAINED_FINISHED,
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = JobsConfig::default();
        assert_eq!(config.broadcast_capacity, 64);
        assert_eq!(config.global_broadcast_capacity, 256);
        assert_eq!(config.max_retained_finished, 100);
    }

    #[test]
    fn missing_env_keeps_defaults() {
        std::env::remove_var("EXPORT_JOBS_BROADCAST_CAPACITY");
        std::env::remove_var("EXPORT_JOBS_MAX_RETAINED");
        assert_eq!(JobsConfig::from_env(), JobsConfig::default());
    }
}
