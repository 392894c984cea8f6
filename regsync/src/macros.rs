//! Macros for mirror error handling.
//!
//! Provides convenience macros for creating and returning
//! [`crate::error::RegsyncError`] instances with reduced boilerplate.

/// Creates a [`crate::error::RegsyncError`] from error kind and description.
#[macro_export]
macro_rules! regsync_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::RegsyncError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::RegsyncError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::RegsyncError`] from the current function.
///
/// Combines error creation with early return for error conditions that
/// should immediately terminate execution.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::regsync_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::regsync_error!($kind, $desc, $detail))
    };
}
