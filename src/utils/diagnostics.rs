//! Throttled render diagnostics.
//!
//! Configuration mistakes (missing attributes, unsupplied uniforms, mismatched
//! instance counts, ...) are reported per frame, so an unthrottled warning
//! would drown the host application's log. All render warnings therefore go
//! through a process-wide counter that stops emitting after a fixed cap.

use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of render warnings emitted before suppression kicks in.
const WARN_LIMIT: u64 = 100;

static WARNING_COUNT: AtomicU64 = AtomicU64::new(0);

/// Total number of render warnings raised so far (including suppressed ones).
///
/// Monotonic; useful in tests to assert that a degraded code path actually
/// reported itself.
#[must_use]
pub fn warning_count() -> u64 {
    WARNING_COUNT.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn emit_warning(args: std::fmt::Arguments<'_>) {
    let n = WARNING_COUNT.fetch_add(1, Ordering::Relaxed);
    if n < WARN_LIMIT {
        log::warn!("{args}");
    } else if n == WARN_LIMIT {
        log::warn!("more than {WARN_LIMIT} render warnings - suppressing further logs");
    }
}

/// Raise a throttled render warning.
macro_rules! render_warn {
    ($($arg:tt)*) => {
        $crate::utils::diagnostics::emit_warning(format_args!($($arg)*));
    };
}

pub(crate) use render_warn;
