//! Sanitising helpers for feed-supplied floats.
//!
//! Upstream feeds deliver NaN, infinities and absent fields interchangeably.
//! Every derived computation goes through these helpers so that an invalid
//! number is treated exactly like a missing one.

/// Returns `Some(value)` only when `value` is a finite float.
#[inline]
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Collapses an optional float to `None` when it is absent or not finite.
#[inline]
pub fn finite_opt(value: Option<f64>) -> Option<f64> {
    value.and_then(finite)
}
