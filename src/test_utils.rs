// SPDX-License-Identifier: MPL-2.0
//! Shared helpers for unit tests.
//!
//! Timestamps, clock positions and gains are floats; compare them with the
//! `approx` macros re-exported here rather than `assert_eq!`.

pub use approx::assert_abs_diff_eq;

/// Tolerance for comparing presentation times that went through `f64`
/// accumulation, in seconds.
pub const TIME_EPSILON: f64 = 1e-9;
