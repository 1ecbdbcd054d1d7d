//! The learned-model contract consumed by the learned secondary index core,
//! plus two reference implementations.
//!
//! The index core is generic over `M: Model<K>`; it never looks inside a
//! model, it only ever calls [`Model::train`] once at build time and
//! [`Model::predict`] on the lookup path. Training *algorithms* (gradient
//! boosting, piecewise-linear RMI stages, and so on) are out of scope here —
//! this crate exists so the core crate has at least one real, testable model
//! to build against, the same role `ph::fmph::Function` plays as a concrete
//! instantiation of its own hashing contract.

use dyn_size_of::GetSize;

/// A trained cumulative-distribution model over a sorted key sequence.
///
/// `predict` need not be monotonic, need not be exact, and may return a rank
/// outside `0..n` — the index core treats its output purely as a starting
/// guess bounded by a learned `max_error`, never as ground truth.
pub trait Model<K>: Sized {
    /// Trains a model from `sorted_keys`, which the index core always passes
    /// in non-decreasing order. `sorted_keys` may contain duplicates.
    fn train(sorted_keys: &[K]) -> Self;

    /// Predicts the rank of `key` within the sequence this model was trained
    /// on. The return value is a best-effort estimate, not a guarantee: it
    /// may be negative-clamped to `0`, may exceed `sorted_keys.len()`, and is
    /// always used by the caller as the center of a bounded search interval.
    fn predict(&self, key: &K) -> u64;

    /// Approximate in-memory footprint of the trained model, in bytes,
    /// excluding `self`'s own stack size (mirrors [`GetSize::size_bytes`]'s
    /// convention of reporting heap/auxiliary allocations).
    fn byte_size(&self) -> usize;

    /// A short, stable name identifying the model family, used in debug
    /// output and in [`crate::Lsi::name`](../lsi/struct.Lsi.html#method.name)-style
    /// composite names.
    fn name(&self) -> &'static str;
}

/// Converts a key into an `f64` for use in a least-squares fit. Implemented
/// for the unsigned integer key types the index is expected to index over.
pub trait AsF64: Copy {
    fn as_f64(self) -> f64;
}

macro_rules! impl_as_f64 {
    ($($t:ty),*) => {
        $(impl AsF64 for $t { #[inline] fn as_f64(self) -> f64 { self as f64 } })*
    };
}
impl_as_f64!(u8, u16, u32, u64, i8, i16, i32, i64);

/// A single-segment linear regression model: `predicted_rank = slope * key +
/// intercept`, fit by ordinary least squares against `(key, rank)` pairs
/// where `rank` is each key's index in the training sequence.
///
/// This is the simplest member of the RMI family (a zero-stage, one-segment
/// linear model) and is the reference model used by `lsi`'s own tests: it is
/// deterministic, has a closed-form fit, and its prediction error is easy to
/// reason about independently of the index core under test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    slope: f64,
    intercept: f64,
}

impl LinearModel {
    /// Returns the raw `(slope, intercept)` coefficients.
    pub fn coefficients(&self) -> (f64, f64) {
        (self.slope, self.intercept)
    }
}

impl<K: AsF64> Model<K> for LinearModel {
    fn train(sorted_keys: &[K]) -> Self {
        let n = sorted_keys.len();
        if n < 2 {
            // A single point (or none) has no slope information; predict a
            // constant equal to the only rank available, or 0.
            let intercept = if n == 1 { 0.0 } else { 0.0 };
            return Self { slope: 0.0, intercept };
        }
        let n_f = n as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xx = 0.0;
        let mut sum_xy = 0.0;
        for (rank, key) in sorted_keys.iter().enumerate() {
            let x = key.as_f64();
            let y = rank as f64;
            sum_x += x;
            sum_y += y;
            sum_xx += x * x;
            sum_xy += x * y;
        }
        let denom = n_f * sum_xx - sum_x * sum_x;
        if denom.abs() < f64::EPSILON {
            // All keys equal (or otherwise degenerate): fall back to a flat
            // model predicting the mean rank.
            Self { slope: 0.0, intercept: sum_y / n_f }
        } else {
            let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
            let intercept = (sum_y - slope * sum_x) / n_f;
            Self { slope, intercept }
        }
    }

    fn predict(&self, key: &K) -> u64 {
        let predicted = self.slope * key.as_f64() + self.intercept;
        if predicted <= 0.0 { 0 } else { predicted as u64 }
    }

    fn byte_size(&self) -> usize { 0 } // two f64s, no heap allocation

    fn name(&self) -> &'static str { "linear" }
}

impl GetSize for LinearModel {
    fn size_bytes_dyn(&self) -> usize { 0 }
    const USES_DYN_MEM: bool = false;
}

/// A degenerate model that predicts the key's own numeric value as its rank.
///
/// Useful only for boundary testing: pairing it with keys drawn from `0..n`
/// exercises the index core's bounded-interval and search-mode logic with a
/// model whose error is known exactly ahead of time (zero, when keys are
/// exactly `0..n`; otherwise `|key - rank|`), without depending on
/// [`LinearModel`]'s least-squares fit being correct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityModel;

impl<K: AsF64> Model<K> for IdentityModel {
    fn train(_sorted_keys: &[K]) -> Self { Self }

    fn predict(&self, key: &K) -> u64 {
        let v = key.as_f64();
        if v <= 0.0 { 0 } else { v as u64 }
    }

    fn byte_size(&self) -> usize { 0 }

    fn name(&self) -> &'static str { "identity" }
}

impl GetSize for IdentityModel {
    fn size_bytes_dyn(&self) -> usize { 0 }
    const USES_DYN_MEM: bool = false;
}
