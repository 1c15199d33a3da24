//! Scoped demotion of TLS-related transport log noise.
//!
//! Article sources routinely present expired or otherwise broken
//! certificates, and with verification disabled every affected request
//! would still emit a warning. A guard held for the duration of one request
//! demotes that noise to debug level; dropping the guard restores the
//! previous behavior on every exit path, including early return and unwind.

use std::sync::atomic::{AtomicUsize, Ordering};

static SUPPRESS_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// RAII guard returned by [`suppress`]. While at least one guard is alive
/// anywhere in the process, [`suppressed`] reports true.
pub struct TlsQuietGuard(());

/// Installs TLS-noise suppression for the lifetime of the returned guard.
/// Guards nest; suppression ends when the last one drops.
pub fn suppress() -> TlsQuietGuard {
    SUPPRESS_DEPTH.fetch_add(1, Ordering::SeqCst);
    TlsQuietGuard(())
}

impl Drop for TlsQuietGuard {
    fn drop(&mut self) {
        SUPPRESS_DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Whether TLS-related failures should currently be logged at debug
/// instead of warn.
pub fn suppressed() -> bool {
    SUPPRESS_DEPTH.load(Ordering::SeqCst) > 0
}
