//! Structural self-checks for halo bookkeeping.
//!
//! Checks run only in debug builds or with the `check-invariants` feature.

use crate::halo_error::HaloError;

/// Types whose internal consistency can be validated on demand.
pub trait DebugInvariants {
    /// Panic on a broken invariant when checks are enabled; no-op otherwise.
    fn debug_assert_invariants(&self);
    /// First broken invariant, if any. Always available.
    fn validate_invariants(&self) -> Result<(), HaloError>;
}

/// Evaluate a `Result<(), HaloError>` check and panic with `context` on
/// error, when checks are enabled. The expression is not evaluated otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $context:literal) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $check {
            panic!(concat!("[invariants] ", $context, ": {}"), e);
        }
    };
}
