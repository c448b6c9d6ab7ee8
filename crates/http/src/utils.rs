//! Internal helper macros.

/// Returns early with `Err($error)` unless `$predicate` holds.
///
/// ```ignore
/// ensure!(!self.is_finalized(), HttpError::finalized("request", "headers"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
