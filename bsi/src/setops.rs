use bsi_base::{parallel_or, Bitmap};
use rayon::prelude::*;

use crate::container::Bsi;

impl Bsi {
    /// Removes the value (and existence) of every column in `columns`,
    /// leaving other columns untouched.
    pub fn clear_values(&mut self, columns: &Bitmap) {
        self.e.and_not_inplace(columns);
        for plane in &mut self.b {
            plane.and_not_inplace(columns);
        }
    }

    /// Keeps only the columns in `columns`, discarding every other value in
    /// place. Returns how many columns were dropped (`|e| - |e ∩ columns|`
    /// as it stood before the call).
    pub fn retain(&mut self, columns: &Bitmap) -> u64 {
        let kept = self.e.and_cardinality(columns);
        let dropped = self.e.len() - kept;
        self.e.and_inplace(columns);
        if dropped > 0 {
            for plane in &mut self.b {
                plane.and_inplace(columns);
            }
        }
        dropped
    }

    /// Builds a new index containing only the columns in `columns`, without
    /// mutating `self`.
    pub fn new_bsi_retain_set(&self, columns: &Bitmap) -> Bsi {
        let mut copy = self.clone();
        copy.retain(columns);
        copy
    }

    /// Merges any number of indexes sharing the same plane count into one,
    /// by unioning their existence bitmaps and, independently and in
    /// parallel, each corresponding plane. Sources must not assign
    /// conflicting values to the same column; where they do, the result
    /// takes whichever source's bits happen to be unioned last is undefined
    /// and callers should not rely on it -- `par_or` is for merging
    /// disjoint column sets, not for reconciling overlapping writes.
    pub fn par_or(sources: &[&Bsi]) -> Bsi {
        let Some(first) = sources.first() else {
            return Bsi::new_default();
        };
        let width = sources.iter().map(|s| s.bit_len()).max().unwrap_or(0) as usize;

        let existence_refs: Vec<&Bitmap> = sources.iter().map(|s| &s.e).collect();
        let e = parallel_or(&existence_refs);

        let b: Vec<Bitmap> = (0..width)
            .into_par_iter()
            .map(|j| {
                let plane_refs: Vec<&Bitmap> = sources
                    .iter()
                    .filter_map(|s| s.plane(j))
                    .collect();
                parallel_or(&plane_refs)
            })
            .collect();

        let min_value = sources.iter().map(|s| s.min_value()).min().unwrap_or(first.min_value());
        let max_value = sources.iter().map(|s| s.max_value()).max().unwrap_or(first.max_value());

        Bsi {
            e,
            b,
            min_value,
            max_value,
            run_optimized: false,
        }
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
    fn test_clear_values() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 5);
        bsi.set_value(2, 6);
        let mut gone = Bitmap::new();
        gone.insert(1);
        bsi.clear_values(&gone);
        assert!(!bsi.value_exists(1));
        assert_eq!(bsi.get_value(2), Some(6));
    }

    #[test]
    fn test_retain() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 5);
        bsi.set_value(2, 6);
        let mut keep = Bitmap::new();
        keep.insert(2);
        let dropped = bsi.retain(&keep);
        assert_eq!(dropped, 1);
        assert!(!bsi.value_exists(1));
        assert_eq!(bsi.get_value(2), Some(6));
    }

    #[test]
    fn test_retain_returns_zero_when_nothing_dropped() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 5);
        bsi.set_value(2, 6);
        let keep = bsi.existence_bitmap().clone();
        assert_eq!(bsi.retain(&keep), 0);
        assert_eq!(bsi.cardinality(), 2);
    }

    #[test]
    fn test_retain_then_original_restored_by_clone() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 5);
        bsi.set_value(2, 6);
        let mut keep = Bitmap::new();
        keep.insert(1);
        let narrowed = bsi.new_bsi_retain_set(&keep);
        assert_eq!(narrowed.get_value(1), Some(5));
        assert!(!narrowed.value_exists(2));
        // original untouched
        assert_eq!(bsi.get_value(2), Some(6));
    }

    #[test]
    fn test_par_or_merges_disjoint_columns() {
        let mut a = Bsi::new(10, 0);
        a.set_value(1, 3);
        let mut b = Bsi::new(10, 0);
        b.set_value(2, 7);
        let merged = Bsi::par_or(&[&a, &b]);
        assert_eq!(merged.get_value(1), Some(3));
        assert_eq!(merged.get_value(2), Some(7));
        assert_eq!(merged.cardinality(), 2);
    }

    #[test]
    fn test_par_or_idempotent_on_single_source() {
        let mut a = Bsi::new(10, 0);
        a.set_value(1, 3);
        a.set_value(2, 4);
        let merged = Bsi::par_or(&[&a]);
        assert_eq!(merged, a);
    }

    #[test]
    fn test_par_or_empty_sources() {
        let merged = Bsi::par_or(&[]);
        assert_eq!(merged.cardinality(), 0);
    }

    #[test]
    fn test_par_or_respects_filter_of_all() {
        let mut a = Bsi::new(10, 0);
        a.set_value(1, 3);
        assert_eq!(all(&a).len(), 1);
    }
}
