use bsi_base::Bitmap;

/// A bit-sliced index: an existence bitmap `e` plus one bitmap `b[j]` per
/// value bit, `j` in `0..bit_len()`. A column id `c` has a value iff
/// `c` is in `e`; its value is `sum( [c in b[j]] * 2^j )`, reinterpreted as
/// two's complement when `bit_len() == 64`.
#[derive(Clone, Debug)]
pub struct Bsi {
    pub(crate) e: Bitmap,
    pub(crate) b: Vec<Bitmap>,
    pub(crate) min_value: i64,
    pub(crate) max_value: i64,
    pub(crate) run_optimized: bool,
}

/// Smallest number of bits needed to represent `v` as an unsigned magnitude.
/// `bit_len(0) == 0`.
fn bit_len(v: i64) -> u32 {
    let mag = v.unsigned_abs();
    64 - mag.leading_zeros()
}

impl Bsi {
    /// Builds an index sized for values in `[min_value, max_value]`.
    ///
    /// Per invariant 3, only a 64-plane index carries a sign bit, so any
    /// index that must represent a negative value is always given the full
    /// 64 planes; a non-negative range is sized to the narrower of
    /// `bit_len(max_value)`/`bit_len(min_value)`, and an index whose bounds
    /// are both zero starts with zero planes and grows lazily as values are
    /// assigned (see [`Bsi::set_value`]).
    pub fn new(max_value: i64, min_value: i64) -> Self {
        let width = if min_value < 0 {
            64
        } else {
            bit_len(max_value).max(bit_len(min_value))
        };
        Bsi {
            e: Bitmap::new(),
            b: (0..width).map(|_| Bitmap::new()).collect(),
            min_value,
            max_value,
            run_optimized: false,
        }
    }

    /// An empty, unbounded index: `NewBSI(0, 0)`. Grows its plane count on
    /// demand as values outside the current range are assigned.
    pub fn new_default() -> Self {
        Self::new(0, 0)
    }

    pub fn bit_len(&self) -> u32 {
        self.b.len() as u32
    }

    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    pub fn is_run_optimized(&self) -> bool {
        self.run_optimized
    }

    /// Number of columns with an assigned value.
    pub fn cardinality(&self) -> u64 {
        self.e.len()
    }

    /// True for an auto-sizing index created by [`Bsi::new_default`]
    /// (`NewBSI(0, 0)`), the only condition under which [`Bsi::set_value`]
    /// is allowed to grow the plane count.
    fn is_auto_sizing(&self) -> bool {
        self.min_value == 0 && self.max_value == 0
    }

    /// Assigns `value` to column `id`, replacing any previous value.
    ///
    /// If this index is auto-sizing (`NewBSI(0, 0)`), it grows to
    /// `bit_len(value)` planes on demand. Otherwise the declared bounds are
    /// a caller contract: a `value` whose magnitude needs more planes than
    /// currently exist has its high bits silently dropped rather than
    /// growing or erroring -- out-of-declared-range writes are documented
    /// caller responsibility, not this index's problem to solve.
    pub fn set_value(&mut self, id: u64, value: i64) {
        if self.is_auto_sizing() {
            let needed = if value < 0 { 64 } else { bit_len(value) };
            while (self.b.len() as u32) < needed {
                self.b.push(Bitmap::new());
            }
        }
        self.e.insert(id);
        let bits = value as u64;
        for (j, plane) in self.b.iter_mut().enumerate() {
            if bits & (1u64 << j) != 0 {
                plane.insert(id);
            } else {
                plane.remove(id);
            }
        }
    }

    /// Returns the value at `id`, or `None` if `id` has no assigned value.
    pub fn get_value(&self, id: u64) -> Option<i64> {
        if !self.e.contains(id) {
            return None;
        }
        Some(self.decode(id))
    }

    pub fn value_exists(&self, id: u64) -> bool {
        self.e.contains(id)
    }

    /// Decodes the value at `id` without checking existence. Callers must
    /// have already confirmed `id` is present in `e`.
    ///
    /// Planes at index 64 and beyond (reachable once `add`/`increment` carry
    /// past the 64th plane) never contribute a bit: a 64-bit value has no
    /// room for them, matching `GetValue`'s documented `j < 64` cap.
    pub(crate) fn decode(&self, id: u64) -> i64 {
        let mut bits: u64 = 0;
        for (j, plane) in self.b.iter().enumerate().take(64) {
            if plane.contains(id) {
                bits |= 1u64 << j;
            }
        }
        // Plain `as i64` is correct either way: at 64 planes this is a
        // two's-complement reinterpretation (the sign bit lands in bit 63),
        // and at fewer planes every stored value is non-negative so the
        // cast is value-preserving.
        bits as i64
    }

    pub fn existence_bitmap(&self) -> &Bitmap {
        &self.e
    }

    pub fn plane(&self, j: usize) -> Option<&Bitmap> {
        self.b.get(j)
    }

    pub(crate) fn planes(&self) -> &[Bitmap] {
        &self.b
    }

    /// Total serialized size in bytes of the existence bitmap plus all
    /// value planes.
    pub fn size_in_bytes(&self) -> usize {
        self.e.size_in_bytes() + self.b.iter().map(Bitmap::size_in_bytes).sum::<usize>()
    }

    /// Applies the backing bitmap library's run-length compression to every
    /// plane, including the existence bitmap. A no-op on planes that are
    /// already optimized or empty; idempotent.
    pub fn run_optimize(&mut self) {
        self.e.run_optimize();
        for plane in &mut self.b {
            plane.run_optimize();
        }
        self.run_optimized = true;
    }
}

impl PartialEq for Bsi {
    /// Two indexes are equal iff they agree on every column's existence and
    /// value; min/max bounds and plane count are not part of equality, since
    /// they are bookkeeping rather than observable state.
    fn eq(&self, other: &Self) -> bool {
        if self.e != other.e {
            return false;
        }
        self.e
            .iter()
            .all(|id| self.decode(id) == other.decode(id))
    }
}

impl Eq for Bsi {}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn test_new_sizes_for_positive_range() {
        let bsi = Bsi::new(100, 0);
        assert_eq!(bsi.bit_len(), 7); // bit_len(100) == 7
    }

    #[test]
    fn test_new_forces_64_planes_on_negative_min() {
        let bsi = Bsi::new(5, -3);
        assert_eq!(bsi.bit_len(), 64);
    }

    #[test]
    fn test_new_default_is_empty_and_grows() {
        let mut bsi = Bsi::new_default();
        assert_eq!(bsi.bit_len(), 0);
        bsi.set_value(1, 42);
        assert_eq!(bsi.get_value(1), Some(42));
        assert!(bsi.bit_len() >= 6);
    }

    #[test]
    fn test_set_get_roundtrip_negative() {
        let mut bsi = Bsi::new(5, -3);
        bsi.set_value(7, -3);
        assert_eq!(bsi.get_value(7), Some(-3));
        bsi.set_value(7, 5);
        assert_eq!(bsi.get_value(7), Some(5));
    }

    #[test]
    fn test_value_exists() {
        let mut bsi = Bsi::new(10, 0);
        assert!(!bsi.value_exists(1));
        bsi.set_value(1, 3);
        assert!(bsi.value_exists(1));
        assert!(!bsi.value_exists(2));
    }

    #[test]
    fn test_cardinality() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 1);
        bsi.set_value(2, 2);
        assert_eq!(bsi.cardinality(), 2);
    }

    #[test]
    fn test_out_of_range_set_value_drops_high_bits_without_growing() {
        // A non-auto-sizing index (bounds != (0, 0)) never grows on write:
        // bits beyond the declared plane count are silently dropped, per
        // the documented caller-responsibility contract for out-of-range
        // values.
        let mut bsi = Bsi::new(3, 0);
        assert_eq!(bsi.bit_len(), 2);
        bsi.set_value(1, 100); // 0b1100100, only the low 2 bits (00) survive
        assert_eq!(bsi.bit_len(), 2);
        assert_eq!(bsi.get_value(1), Some(0));
    }

    #[test]
    fn test_auto_sizing_keeps_growing_across_writes() {
        let mut bsi = Bsi::new_default();
        bsi.set_value(1, 10);
        bsi.set_value(2, 1000);
        assert_eq!(bsi.get_value(1), Some(10));
        assert_eq!(bsi.get_value(2), Some(1000));
    }

    #[test]
    fn test_equals() {
        let mut a = Bsi::new(10, 0);
        let mut b = Bsi::new(10, 0);
        a.set_value(1, 5);
        b.set_value(1, 5);
        assert_eq!(a, b);
        b.set_value(2, 9);
        assert_ne!(a, b);
    }

    #[test]
    fn test_run_optimize_idempotent() {
        let mut bsi = Bsi::new(10, 0);
        bsi.set_value(1, 5);
        bsi.run_optimize();
        bsi.run_optimize();
        assert!(bsi.is_run_optimized());
        assert_eq!(bsi.get_value(1), Some(5));
    }
}
