use bsi_base::Bitmap;

use crate::container::Bsi;

impl Bsi {
    /// In-place ripple-carry half-adder: XORs `carry` into plane `j`,
    /// capturing the AND as the next carry, and repeats on plane `j + 1`
    /// until the carry dies out, growing the index by one plane at a time
    /// if a carry would otherwise run off the end.
    ///
    /// Implemented iteratively rather than recursively (the natural
    /// formulation), since recursion depth would otherwise scale with the
    /// width needed to represent the largest sum.
    fn add_digit(&mut self, mut j: usize, mut carry: Bitmap) {
        while !carry.is_empty() {
            if j >= self.b.len() {
                self.b.push(Bitmap::new());
            }
            let plane = &self.b[j];
            let next_carry = plane.and(&carry);
            let mut new_plane = plane.clone();
            new_plane.xor_inplace(&carry);
            self.b[j] = new_plane;

            carry = next_carry;
            j += 1;
        }
    }

    /// Unsigned column-wise addition of `other`'s value into `self`, across
    /// every column `other` has a value for: `e` absorbs `other.e`, and
    /// each of `other`'s planes is ripple-carried into the matching plane
    /// here. A column that only exists in `other` is treated as if its
    /// prior value here was zero and simply takes on `other`'s value.
    pub fn add(&mut self, other: &Bsi) {
        self.e.or_inplace(&other.e);
        for j in 0..other.bit_len() as usize {
            let bit = &other.b[j];
            if !bit.is_empty() {
                self.add_digit(j, bit.clone());
            }
        }
    }

    /// Adds 1 to the value at every column in `columns`, regardless of
    /// whether it already had one -- a column absent from `e` is treated as
    /// if its prior value was zero, so it ends up with value 1 and is added
    /// to `e`.
    pub fn increment(&mut self, columns: &Bitmap) {
        if columns.is_empty() {
            return;
        }
        self.add_digit(0, columns.clone());
        self.e.or_inplace(columns);
    }

    /// Adds 1 to the value at every existing column, unfiltered.
    pub fn increment_all(&mut self) {
        let scope = self.e.clone();
        self.increment(&scope);
    }
}
