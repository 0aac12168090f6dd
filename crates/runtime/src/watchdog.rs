//! Stuck-fiber watchdog, grounded directly on the teacher's `watchdog.rs`:
//! a background thread that periodically scans the fiber registry and
//! warns (or exits) when a fiber has been running longer than a configured
//! threshold. Disabled by default — a fiber legitimately running a long
//! primitive is indistinguishable from a genuinely stuck one without this
//! being opt-in.

use crate::scheduler::fiber_registry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// What to do when a stuck fiber is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Log a warning and keep running.
    Warn,
    /// Log a warning, dump diagnostics, and exit the process.
    Exit,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// Seconds a fiber may run before it is considered stuck. Zero disables
    /// the watchdog entirely.
    pub threshold_secs: u64,
    /// How often to scan the fiber registry.
    pub interval_secs: u64,
    pub action: WatchdogAction,
}

impl WatchdogConfig {
    /// Read configuration from `AVAIL_WATCHDOG_SECS` (default 0, disabled),
    /// `AVAIL_WATCHDOG_INTERVAL` (default 5, rejects 0), and
    /// `AVAIL_WATCHDOG_ACTION` (`warn` or `exit`, default `warn`, unknown
    /// values falling back to `warn` with a log warning) — the same
    /// parse-or-warn-and-default convention as the teacher's `SEQ_WATCHDOG_*`
    /// variables.
    pub fn from_env() -> Self {
        let threshold_secs = std::env::var("AVAIL_WATCHDOG_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let interval_secs = std::env::var("AVAIL_WATCHDOG_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(5);

        let action = match std::env::var("AVAIL_WATCHDOG_ACTION").ok().as_deref() {
            None => WatchdogAction::Warn,
            Some(s) if s.eq_ignore_ascii_case("exit") => WatchdogAction::Exit,
            Some(s) if s.eq_ignore_ascii_case("warn") => WatchdogAction::Warn,
            Some(other) => {
                tracing::warn!(value = other, "unrecognized AVAIL_WATCHDOG_ACTION, defaulting to warn");
                WatchdogAction::Warn
            }
        };

        WatchdogConfig { threshold_secs, interval_secs, action }
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold_secs > 0
    }
}

static WATCHDOG_INIT: Once = Once::new();

/// Track which stuck fiber we last dumped diagnostics for, so a fiber stuck
/// across many scan intervals only triggers one dump (plus one more if a
/// different fiber becomes the worst offender).
static WATCHDOG_TRIGGERED_FIBER: AtomicU64 = AtomicU64::new(0);

/// Install the watchdog thread if `config.is_enabled()`. Idempotent.
pub fn install_watchdog(config: WatchdogConfig) {
    if !config.is_enabled() {
        return;
    }
    WATCHDOG_INIT.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name("avail-watchdog".to_string())
            .spawn(move || watchdog_loop(config));
        if let Err(err) = spawned {
            tracing::warn!(%err, "failed to spawn avail-watchdog thread");
        }
    });
}

fn watchdog_loop(config: WatchdogConfig) {
    loop {
        std::thread::sleep(Duration::from_secs(config.interval_secs));
        if let Some((fiber_id, age_secs)) = check_for_stuck_fibers(config.threshold_secs) {
            handle_stuck_fiber(fiber_id, age_secs, config.action);
        }
    }
}

/// Scan the fiber registry for the longest-running fiber and return it if
/// it exceeds `threshold_secs`.
fn check_for_stuck_fibers(threshold_secs: u64) -> Option<(u64, u64)> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    fiber_registry()
        .active_fibers()
        .map(|(id, spawn_time)| (id, now.saturating_sub(spawn_time)))
        .filter(|&(_, age)| age >= threshold_secs)
        .max_by_key(|&(_, age)| age)
}

fn handle_stuck_fiber(fiber_id: u64, age_secs: u64, action: WatchdogAction) {
    let already_triggered = WATCHDOG_TRIGGERED_FIBER.swap(fiber_id, Ordering::AcqRel) == fiber_id;
    if !already_triggered {
        tracing::warn!(fiber = fiber_id, age_secs, "fiber appears stuck");
        #[cfg(feature = "diagnostics")]
        crate::diagnostics::dump_diagnostics();
    }
    if action == WatchdogAction::Exit {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_defaults_to_disabled() {
        unsafe { std::env::remove_var("AVAIL_WATCHDOG_SECS") };
        let config = WatchdogConfig::from_env();
        assert!(!config.is_enabled());
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.action, WatchdogAction::Warn);
    }

    #[test]
    #[serial]
    fn from_env_rejects_zero_interval() {
        unsafe { std::env::set_var("AVAIL_WATCHDOG_INTERVAL", "0") };
        let config = WatchdogConfig::from_env();
        assert_eq!(config.interval_secs, 5);
        unsafe { std::env::remove_var("AVAIL_WATCHDOG_INTERVAL") };
    }

    #[test]
    #[serial]
    fn from_env_unknown_action_defaults_to_warn() {
        unsafe { std::env::set_var("AVAIL_WATCHDOG_ACTION", "nonsense") };
        let config = WatchdogConfig::from_env();
        assert_eq!(config.action, WatchdogAction::Warn);
        unsafe { std::env::remove_var("AVAIL_WATCHDOG_ACTION") };
    }

    #[test]
    fn check_for_stuck_fibers_finds_nothing_below_threshold() {
        assert_eq!(check_for_stuck_fibers(u64::MAX), None);
    }
}
