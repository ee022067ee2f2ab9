use bsi_base::Bitmap;
use rayon::prelude::*;

use crate::container::Bsi;
use crate::exec::map_reduce_bitmap;

/// A predicate `CompareValue` can evaluate against an index. `Range` holds
/// both endpoints, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Range(i64, i64),
}

impl Bsi {
    /// Evaluates `op` against `value` (for `Lt`/`Le`/`Eq`/`Ge`/`Gt`) or its
    /// bounds (for `Range`), restricted to columns present in `filter`
    /// (pass the existence bitmap, or any subset of it, to scope the scan).
    /// Returns the bitmap of columns in `filter ∩ e` whose value satisfies
    /// the predicate.
    ///
    /// This walks bit planes from the highest to the lowest, carrying
    /// `eq`/`lt`/`gt` running sets the way a digit-by-digit comparison does:
    /// at each plane, columns still tied (`eq`) are split by that plane's
    /// bit into a new `lt`/`gt`/`eq`, and the walk stops as soon as `eq`
    /// empties out, since every remaining column's relation to `value` is
    /// already decided. `Range` tracks two independent low/high comparisons
    /// (`eq1`/`lt1` against the low bound, `eq2`/`gt2` against the high
    /// bound) in the same pass and keeps columns that are simultaneously
    /// `>= low` and `<= high`.
    ///
    /// The scan fans out over the rest of this crate's shared fork-join
    /// executor: `filter` is sharded into per-thread chunks, each shard is
    /// walked independently, and the per-shard hits are unioned back
    /// together, since the walk only ever needs to see the columns in its
    /// own shard.
    pub fn compare_value(&self, op: Operation, value: i64, filter: &Bitmap) -> Bitmap {
        let scope = filter.and(&self.e);
        if scope.is_empty() {
            return scope;
        }
        match op {
            Operation::Range(lo, hi) => map_reduce_bitmap(&scope, |shard| self.compare_range(lo, hi, shard)),
            Operation::Lt | Operation::Le | Operation::Eq | Operation::Ge | Operation::Gt => {
                map_reduce_bitmap(&scope, |shard| self.compare_with(op, value, shard))
            }
        }
    }

    /// Splits `scope` by sign against a predicand known to be negative
    /// (`pred_is_neg`), only called when `bit_len() == 64` so `b[63]` is a
    /// real sign plane. Two's complement patterns of the same sign compare
    /// correctly as plain unsigned magnitudes, but a negative column is
    /// always less than a non-negative predicand and vice versa -- so
    /// everything that disagrees in sign with the predicand is immediately
    /// decided, and only the same-sign subset needs the magnitude walk.
    /// Returns `(still_tied, definitely_lt, definitely_gt)`.
    fn split_by_sign(&self, scope: &Bitmap, pred_is_neg: bool) -> (Bitmap, Bitmap, Bitmap) {
        let sign_plane = &self.b[63];
        let neg_cols = scope.and(sign_plane);
        let pos_cols = scope.and_not(sign_plane);
        if pred_is_neg {
            (neg_cols, Bitmap::new(), pos_cols)
        } else {
            (pos_cols, neg_cols, Bitmap::new())
        }
    }

    fn compare_with(&self, op: Operation, pred: i64, scope: &Bitmap) -> Bitmap {
        // Capped at 64: planes past the 64th (reachable once `add`/`increment`
        // carry the index past its original width) hold no bit a 64-bit
        // value can represent, so they never participate in a comparison --
        // same cap `decode`/`GetValue` apply.
        let k = (self.bit_len() as usize).min(64);
        let pbits = pred as u64;

        let mut lt = Bitmap::new();
        let mut gt = Bitmap::new();

        let (mut eq, top) = if k == 64 {
            let pred_is_neg = pred < 0;
            let (tied, definitely_lt, definitely_gt) = self.split_by_sign(scope, pred_is_neg);
            lt.or_inplace(&definitely_lt);
            gt.or_inplace(&definitely_gt);
            (tied, 62usize)
        } else {
            (scope.clone(), k.wrapping_sub(1))
        };

        if k > 0 {
            for j in (0..=top).rev() {
                if eq.is_empty() {
                    break;
                }
                let has_bit = (pbits & (1u64 << j)) != 0;
                let plane = &self.b[j];
                let one_bits = eq.and(plane);
                let zero_bits = eq.and_not(plane);

                if has_bit {
                    // predicate bit is 1: columns with 0 here are < pred.
                    lt.or_inplace(&zero_bits);
                    eq = one_bits;
                } else {
                    // predicate bit is 0: columns with 1 here are > pred.
                    gt.or_inplace(&one_bits);
                    eq = zero_bits;
                }
            }
        }

        match op {
            Operation::Lt => lt,
            Operation::Le => {
                lt.or_inplace(&eq);
                lt
            }
            Operation::Eq => eq,
            Operation::Ge => {
                gt.or_inplace(&eq);
                gt
            }
            Operation::Gt => gt,
            Operation::Range(_, _) => unreachable!(),
        }
    }

    /// Two-bound range comparison: keeps columns `>= lo` and `<= hi`.
    /// Walks planes once, tracking both comparisons in lockstep so a column
    /// can be dropped as soon as it fails either bound, without a second
    /// full pass.
    fn compare_range(&self, lo: i64, hi: i64, scope: &Bitmap) -> Bitmap {
        // See `compare_with`: planes past the 64th never hold a comparable
        // bit, so the walk is capped at 64 planes regardless of how far
        // `add`/`increment` have carried the plane count.
        let k = (self.bit_len() as usize).min(64);
        let lo_bits = lo as u64;
        let hi_bits = hi as u64;

        let mut lt1 = Bitmap::new(); // confirmed < lo (excluded)
        let mut gt2 = Bitmap::new(); // confirmed > hi (excluded)

        // Columns still tied with `lo` / still tied with `hi`, respectively,
        // after peeling off the sign-decided subset of each (see
        // `split_by_sign`).
        let (mut eq1, mut eq2, top) = if k == 64 {
            let (tied1, definitely_lt1, _) = self.split_by_sign(scope, lo < 0);
            lt1.or_inplace(&definitely_lt1);
            let (tied2, _, definitely_gt2) = self.split_by_sign(scope, hi < 0);
            gt2.or_inplace(&definitely_gt2);
            (tied1, tied2, 62usize)
        } else {
            (scope.clone(), scope.clone(), k.wrapping_sub(1))
        };

        if k == 0 {
            let ge_lo = scope.and_not(&lt1);
            let le_hi = scope.and_not(&gt2);
            return ge_lo.and(&le_hi);
        }

        for j in (0..=top).rev() {
            if eq1.is_empty() && eq2.is_empty() {
                break;
            }
            let plane = &self.b[j];

            if !eq1.is_empty() {
                let lo_bit = (lo_bits & (1u64 << j)) != 0;
                if lo_bit {
                    // Columns with a 0 here fall below lo; columns with a 1
                    // stay tied.
                    lt1.or_inplace(&eq1.and_not(plane));
                    eq1 = eq1.and(plane);
                } else {
                    // Columns with a 1 here are already >= lo (no longer
                    // tied, but still eligible); only the 0-bit columns stay
                    // tied for the next plane.
                    eq1 = eq1.and_not(plane);
                }
            }

            if !eq2.is_empty() {
                let hi_bit = (hi_bits & (1u64 << j)) != 0;
                if hi_bit {
                    // Columns with a 0 here are already <= hi; only the
                    // 1-bit columns stay tied.
                    eq2 = eq2.and(plane);
                } else {
                    // Columns with a 1 here exceed hi.
                    gt2.or_inplace(&eq2.and(plane));
                    eq2 = eq2.and_not(plane);
                }
            }
        }

        // A column satisfies `>= lo` iff it never fell into lt1: that is
        // everything in scope minus lt1. It satisfies `<= hi` iff it never
        // fell into gt2: everything in scope minus gt2. The range predicate
        // is the intersection of both.
        let ge_lo = scope.and_not(&lt1);
        let le_hi = scope.and_not(&gt2);
        ge_lo.and(&le_hi)
    }

    /// Evaluates equality against every value in `values` at once, returning
    /// one bitmap per input value, in the same order. Shares the existence
    /// intersection across all predicates but walks planes independently
    /// per value, since each value ties off at a different plane.
    pub fn batch_equal(&self, values: &[i64], filter: &Bitmap) -> Vec<Bitmap> {
        let scope = filter.and(&self.e);
        if scope.is_empty() {
            return values.iter().map(|_| scope.clone()).collect();
        }
        values
            .par_iter()
            .map(|&v| self.compare_with(Operation::Eq, v, &scope))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn all(bsi: &Bsi) -> Bitmap {
        bsi.existence_bitmap().clone()
    }

    #[test]
    fn test_eq() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 3);
        bsi.set_value(2, 5);
        bsi.set_value(3, 3);
        let r = bsi.compare_value(Operation::Eq, 3, &all(&bsi));
        assert_eq!(r.len(), 2);
        assert!(r.contains(1));
        assert!(r.contains(3));

        let eqs = bsi.batch_equal(&[3], &all(&bsi));
        assert_eq!(eqs[0], r);
    }

    #[test]
    fn test_lt_le_gt_ge() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 2);
        bsi.set_value(2, 5);
        bsi.set_value(3, 8);
        let scope = all(&bsi);

        let lt = bsi.compare_value(Operation::Lt, 5, &scope);
        assert_eq!(lt.len(), 1);
        assert!(lt.contains(1));

        let le = bsi.compare_value(Operation::Le, 5, &scope);
        assert_eq!(le.len(), 2);

        let gt = bsi.compare_value(Operation::Gt, 5, &scope);
        assert_eq!(gt.len(), 1);
        assert!(gt.contains(3));

        let ge = bsi.compare_value(Operation::Ge, 5, &scope);
        assert_eq!(ge.len(), 2);
    }

    #[test]
    fn test_range_inclusive() {
        let mut bsi = Bsi::new(20, 0);
        for (id, v) in [(1, 2), (2, 5), (3, 8), (4, 20)] {
            bsi.set_value(id, v);
        }
        let scope = all(&bsi);
        let r = bsi.compare_value(Operation::Range(5, 8), 0, &scope);
        assert_eq!(r.len(), 2);
        assert!(r.contains(2));
        assert!(r.contains(3));
    }

    #[test]
    fn test_range_with_negative_bounds() {
        let mut bsi = Bsi::new(5, -5);
        bsi.set_value(1, -3);
        bsi.set_value(2, 0);
        bsi.set_value(3, 4);
        let scope = all(&bsi);
        let r = bsi.compare_value(Operation::Range(-4, 0), 0, &scope);
        assert_eq!(r.len(), 2);
        assert!(r.contains(1));
        assert!(r.contains(2));
    }

    #[test]
    fn test_compare_respects_filter() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 3);
        bsi.set_value(2, 3);
        let mut narrow = Bitmap::new();
        narrow.insert(1);
        let eqs = bsi.batch_equal(&[3], &narrow);
        assert_eq!(eqs[0].len(), 1);
        assert!(eqs[0].contains(1));
    }

    #[test]
    fn test_signed_comparison_across_zero() {
        // Full 64-plane index (negative MinValue), so bit 63 is a real sign
        // bit. A naive MSB-first unsigned bit-trie walk would treat the
        // sign bit like any other, which misclassifies negatives as
        // "greater than" positives; this exercises that every comparison
        // operator still respects actual signed order.
        let mut bsi = Bsi::new(100, -100);
        bsi.set_value(1, -50);
        bsi.set_value(2, -1);
        bsi.set_value(3, 0);
        bsi.set_value(4, 1);
        bsi.set_value(5, 50);
        let scope = all(&bsi);

        let lt = bsi.compare_value(Operation::Lt, 0, &scope);
        assert_eq!(lt.len(), 2);
        assert!(lt.contains(1) && lt.contains(2));

        let gt = bsi.compare_value(Operation::Gt, 0, &scope);
        assert_eq!(gt.len(), 2);
        assert!(gt.contains(4) && gt.contains(5));

        let le = bsi.compare_value(Operation::Le, -1, &scope);
        assert_eq!(le.len(), 2);
        assert!(le.contains(1) && le.contains(2));

        let ge = bsi.compare_value(Operation::Ge, -1, &scope);
        assert_eq!(ge.len(), 4);
        assert!(!ge.contains(1));

        let range = bsi.compare_value(Operation::Range(-50, 1), 0, &scope);
        assert_eq!(range.len(), 4);
        assert!(!range.contains(5));
    }

    #[test]
    fn test_empty_scope_short_circuits() {
        let bsi = Bsi::new(10, 0);
        let r = bsi.compare_value(Operation::Eq, 0, &Bitmap::new());
        assert!(r.is_empty());
    }

    #[test]
    fn test_compare_and_min_max_survive_planes_past_64() {
        // Carrying two full-width indexes both holding -1 pushes a 65th
        // plane (see arithmetic.rs's overflow tests). `compare_value` and
        // `min_max` must cap their walk at plane 64 rather than shifting by
        // an out-of-range bit index once that happens.
        let mut a = Bsi::new(10, -10);
        a.set_value(1, -1);
        let mut b = Bsi::new(10, -10);
        b.set_value(1, -1);
        a.add(&b);
        assert!(a.bit_len() > 64);

        let scope = a.existence_bitmap().clone();
        assert_eq!(a.get_value(1), Some(-2));
        assert_eq!(a.min_max(crate::MinMaxOp::Min, &scope), Some(-2));
        let eq = a.compare_value(Operation::Eq, -2, &scope);
        assert_eq!(eq.len(), 1);
        assert!(eq.contains(1));
        let lt = a.compare_value(Operation::Lt, 0, &scope);
        assert_eq!(lt.len(), 1);
    }
}
