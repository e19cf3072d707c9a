use crate::front_error::FrontError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), FrontError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

/// Compare a cursor against its expected end, returning an accounting error on mismatch.
///
/// Only evaluated when invariant checking is compiled in; otherwise always `Ok`.
#[inline]
pub fn check_cursor(
    stage: &'static str,
    rank: usize,
    expected: usize,
    got: usize,
) -> Result<(), FrontError> {
    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    if expected != got {
        return Err(FrontError::AccountingMismatch {
            stage,
            rank,
            expected,
            got,
        });
    }
    #[cfg(not(any(debug_assertions, feature = "check-invariants")))]
    let _ = (stage, rank, expected, got);
    Ok(())
}
