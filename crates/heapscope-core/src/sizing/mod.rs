//! Deep size estimation
//!
//! The profiler asks an estimator for the resident footprint of each sampled
//! value. Walking a value's object graph is the estimator's concern; the
//! profiler only sees the final byte count or a per-entry failure.

pub mod deep;

pub use deep::{Component, DeepSizer};

use crate::error::Result;

/// Computes the deep in-memory size of values of type `V`.
pub trait SizeEstimator<V>: Send + Sync {
    /// Estimated resident bytes for `value`, including everything it owns.
    fn estimate_size(&self, value: &V) -> Result<u64>;

    /// Short type name recorded alongside the size.
    fn type_name(&self, _value: &V) -> String {
        short_type_name::<V>().to_string()
    }
}

/// Decides whether a component of an object graph is counted.
///
/// Used to prune cache housekeeping objects from a traversal. Returning
/// `false` excludes `child` (and everything under it) from the size.
pub trait ObjectFilter: Send + Sync {
    /// Whether `child`, reached from `parent`, is counted.
    fn accept(&self, parent: &str, child: &str) -> bool;
}

/// Filter that counts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ObjectFilter for AcceptAll {
    fn accept(&self, _parent: &str, _child: &str) -> bool {
        true
    }
}

impl<F> ObjectFilter for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn accept(&self, parent: &str, child: &str) -> bool {
        self(parent, child)
    }
}

/// Estimator built from a closure, handy for hosts with their own sizer.
pub struct FnEstimator<F> {
    f: F,
}

impl<F> FnEstimator<F> {
    /// Wrap a sizing closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<V, F> SizeEstimator<V> for FnEstimator<F>
where
    F: Fn(&V) -> Result<u64> + Send + Sync,
{
    fn estimate_size(&self, value: &V) -> Result<u64> {
        (self.f)(value)
    }
}

/// Last path segment of a Rust type name, without generics.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
