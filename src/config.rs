//! Engine-level configuration
//!
//! `EngineConfig` holds the process-wide settings the dispatch engine needs
//! that are not themselves part of a single [`crate::queue::Queue`]'s
//! configuration. It is constructed in-process (by an embedding application
//! or by a reload operation) — this crate does not parse any on-disk config
//! file format; that parser is an external collaborator (spec §1).

use std::time::Duration;

/// General, process-wide engine settings.
#[derive(Debug, Clone)]
pub struct GeneralConfig {
    /// Upper bound on concurrently-spawned caller tasks.
    pub max_concurrent_callers: usize,
    /// Default ring timeout applied when a queue/dispatch call omits one.
    pub default_ring_timeout: Duration,
    /// Default retry interval between ring rounds.
    pub default_retry_interval: Duration,
    /// Default service level threshold used for `completed_in_sl`.
    pub default_service_level: Duration,
    /// Default wrap-up duration applied to new members.
    pub default_wrapup: Duration,
    /// Seconds to round `holdtime` announcements to (0 = no rounding).
    pub holdtime_rounding_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_concurrent_callers: 10_000,
            default_ring_timeout: Duration::from_secs(15),
            default_retry_interval: Duration::from_secs(5),
            default_service_level: Duration::from_secs(60),
            default_wrapup: Duration::from_secs(0),
            holdtime_rounding_seconds: 0,
        }
    }
}

/// Debugging/observability toggles.
#[derive(Debug, Clone)]
pub struct DebugConfig {
    /// When true, lock acquisition helpers assert the documented lock
    /// hierarchy (registry -> object -> nested object -> queue-data/list ->
    /// device) instead of silently trusting callers.
    pub assert_lock_order: bool,
    /// When true, every device reservation/release is logged at debug level.
    pub trace_reservations: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            assert_lock_order: cfg!(debug_assertions),
            trace_reservations: false,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub general: GeneralConfig,
    pub debug: DebugConfig,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`], mirroring the teacher's preference for
/// small typed builders over ad hoc field mutation at call sites.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn max_concurrent_callers(mut self, n: usize) -> Self {
        self.config.general.max_concurrent_callers = n;
        self
    }

    pub fn default_ring_timeout(mut self, d: Duration) -> Self {
        self.config.general.default_ring_timeout = d;
        self
    }

    pub fn default_retry_interval(mut self, d: Duration) -> Self {
        self.config.general.default_retry_interval = d;
        self
    }

    pub fn default_service_level(mut self, d: Duration) -> Self {
        self.config.general.default_service_level = d;
        self
    }

    pub fn assert_lock_order(mut self, on: bool) -> Self {
        self.config.debug.assert_lock_order = on;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
