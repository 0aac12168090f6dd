//! SIGQUIT diagnostics dump, grounded directly on the teacher's
//! `diagnostics.rs`: a `Once`-guarded signal handler that writes a snapshot
//! of scheduler and fiber-registry state to stderr, in the same style as a
//! JVM thread dump. Feature-gated behind `diagnostics` (on by default);
//! the signal handler itself only installs on Unix, matching the teacher's
//! `#[cfg(unix)]` boundary (`signal-hook` has no SIGQUIT story on Windows).

#![cfg(feature = "diagnostics")]

use crate::scheduler::{fiber_registry, ACTIVE_FIBERS, PEAK_FIBERS, TOTAL_RETIRED, TOTAL_SPAWNED};
use std::sync::atomic::Ordering;
use std::sync::Once;

static SIGNAL_HANDLER_INIT: Once = Once::new();

/// Install the SIGQUIT signal handler for diagnostics. Idempotent; safe to
/// call multiple times.
pub fn install_signal_handler() {
    SIGNAL_HANDLER_INIT.call_once(|| {
        #[cfg(unix)]
        {
            unsafe {
                let _ = signal_hook::low_level::register(signal_hook::consts::SIGQUIT, || {
                    dump_diagnostics();
                });
            }
        }

        #[cfg(not(unix))]
        {
            // Diagnostics can still be called directly via dump_diagnostics().
        }
    });
}

/// Dump a snapshot of fiber scheduler state to stderr. Callable directly or
/// triggered via SIGQUIT.
pub fn dump_diagnostics() {
    use std::io::Write;

    let now = std::time::SystemTime::now();
    let registry = fiber_registry();
    let mut out = std::io::stderr().lock();

    let _ = writeln!(out, "\n=== Avail VM Diagnostics ===");
    let _ = writeln!(out, "Timestamp: {now:?}");

    let _ = writeln!(out, "\n[Fibers]");
    let _ = writeln!(out, "  Active: {}", ACTIVE_FIBERS.load(Ordering::Relaxed));
    let _ = writeln!(out, "  Peak: {}", PEAK_FIBERS.load(Ordering::Relaxed));
    let _ = writeln!(out, "  Total spawned: {}", TOTAL_SPAWNED.load(Ordering::Relaxed));
    let _ = writeln!(out, "  Total retired: {}", TOTAL_RETIRED.load(Ordering::Relaxed));
    let _ = writeln!(
        out,
        "  Registry: {}/{} slots ({} overflow)",
        registry.active_fibers().count(),
        registry.capacity(),
        registry.overflow_count.load(Ordering::Relaxed)
    );
    for (id, spawn_time) in registry.active_fibers() {
        let spawned = std::time::UNIX_EPOCH + std::time::Duration::from_secs(spawn_time);
        let age = now.duration_since(spawned).map(|d| d.as_secs()).unwrap_or(0);
        let _ = writeln!(out, "    fiber #{id}: running for {age}s");
    }

    let _ = writeln!(out, "\n[Interpreter]");
    let _ = writeln!(out, "  Reification events: {}", crate::interpreter::reification_event_count());

    let _ = writeln!(out, "\n=== End Diagnostics ===\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_diagnostics_does_not_panic() {
        dump_diagnostics();
    }

    #[test]
    fn install_signal_handler_is_idempotent() {
        install_signal_handler();
        install_signal_handler();
        install_signal_handler();
    }
}
