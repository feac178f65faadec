/**
 * Multiply-shift constants for unsigned division by a fixed divisor.
 *
 * Decoding a multi-index coordinate from a flat linear index divides by a
 * stride and takes a remainder modulo a size, once per dimension per grid
 * point. That decode is the hottest loop in the crate, so the divisions are
 * replaced by a multiply, an optional add, and a shift, with the constants
 * computed once per field geometry.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MagicNumber {
    /// Magic multiplier.
    pub m: u32,
    /// "Add" indicator, 0 or 1.
    pub add: u32,
    /// Shift amount.
    pub shift: u32,
}

impl MagicNumber {
    /// Compute constants such that `x / divisor` equals
    /// `(((x * m) >> 32) + add * x) >> shift` for every `x: u32`. This is the
    /// unsigned magic-number routine from Hacker's Delight (2nd ed., figure
    /// 10-2), carried out in wrapping 32-bit arithmetic.
    ///
    /// Division by zero never happens in a real decode, but geometries with a
    /// zero-sized dimension still precompute a table entry for it; that entry
    /// is the fixed sentinel `(0x7FFF_FFFF, 0, 0)`.
    pub fn compute(divisor: u32) -> Self {
        if divisor == 0 {
            return MagicNumber {
                m: 0x7FFF_FFFF,
                add: 0,
                shift: 0,
            };
        }

        let mut add = 0;
        let nc = u32::MAX.wrapping_sub(divisor.wrapping_neg() % divisor);
        let mut p = 31u32;
        let mut q1 = 0x8000_0000u32 / nc;
        let mut r1 = 0x8000_0000u32.wrapping_sub(q1.wrapping_mul(nc));
        let mut q2 = 0x7FFF_FFFFu32 / divisor;
        let mut r2 = 0x7FFF_FFFFu32.wrapping_sub(q2.wrapping_mul(divisor));

        loop {
            p += 1;
            if r1 >= nc.wrapping_sub(r1) {
                q1 = q1.wrapping_mul(2).wrapping_add(1);
                r1 = r1.wrapping_mul(2).wrapping_sub(nc);
            } else {
                q1 = q1.wrapping_mul(2);
                r1 = r1.wrapping_mul(2);
            }
            if r2.wrapping_add(1) >= divisor.wrapping_sub(r2) {
                if q2 >= 0x7FFF_FFFF {
                    add = 1;
                }
                q2 = q2.wrapping_mul(2).wrapping_add(1);
                r2 = r2.wrapping_mul(2).wrapping_add(1).wrapping_sub(divisor);
            } else {
                if q2 >= 0x8000_0000 {
                    add = 1;
                }
                q2 = q2.wrapping_mul(2);
                r2 = r2.wrapping_mul(2).wrapping_add(1);
            }
            let delta = divisor.wrapping_sub(1).wrapping_sub(r2);
            if !(p < 64 && (q1 < delta || (q1 == delta && r1 == 0))) {
                break;
            }
        }

        MagicNumber {
            m: q2.wrapping_add(1),
            add,
            shift: p - 32,
        }
    }

    /// Divide `x` by the divisor these constants were computed for.
    #[inline]
    pub fn divide(&self, x: u64) -> u64 {
        (((x * self.m as u64) >> 32) + x * self.add as u64) >> self.shift
    }
}
