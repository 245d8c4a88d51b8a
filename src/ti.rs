//! Tagged integer (spec.md §3.1, §4.1).
//!
//! A coefficient is either an immediate `i64` or a heap-allocated
//! [`BigInt`]. Every mutating operation leaves the destination demoted
//! (small form if representable) so invariant TI-1 — "a tagged integer in
//! 'big' form never represents a value that fits the small range" — holds
//! after every call, the same way `fuel-vm`'s register ALU helpers
//! (`interpreter/alu.rs`) always leave `$of`/`$err` in a normalized state
//! before returning.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;

/// An arbitrary-precision signed integer with a tagged small-integer fast
/// path.
#[derive(Clone, Debug)]
pub enum TaggedInt {
    /// Immediate form: the value fits in a machine word.
    Inline(i64),
    /// Heap form: an arbitrary-precision value that does not fit in
    /// `i64`.
    Boxed(BigInt),
}

impl TaggedInt {
    /// The additive identity.
    pub fn zero() -> Self {
        TaggedInt::Inline(0)
    }

    /// Build a tagged integer from a machine integer (always demoted).
    pub fn from_i64(v: i64) -> Self {
        TaggedInt::Inline(v)
    }

    /// Build a tagged integer from an arbitrary-precision value, demoting
    /// it to inline form if it fits.
    pub fn from_bigint(v: BigInt) -> Self {
        let mut t = TaggedInt::Boxed(v);
        t.demote();
        t
    }

    /// View this value as a [`BigInt`] regardless of its current tag.
    pub fn to_bigint(&self) -> BigInt {
        match self {
            TaggedInt::Inline(v) => BigInt::from(*v),
            TaggedInt::Boxed(v) => v.clone(),
        }
    }

    /// Force heap form for this slot. The numeric value is unchanged.
    pub fn promote(&mut self) {
        if let TaggedInt::Inline(v) = self {
            *self = TaggedInt::Boxed(BigInt::from(*v));
        }
    }

    /// Shrink a heap value to small form when it fits. The numeric value
    /// is unchanged. This is the operation that enforces TI-1.
    pub fn demote(&mut self) {
        if let TaggedInt::Boxed(v) = self {
            if let Some(small) = v.to_i64() {
                *self = TaggedInt::Inline(small);
            }
        }
    }

    /// True if this value is exactly zero.
    pub fn is_zero(&self) -> bool {
        match self {
            TaggedInt::Inline(v) => *v == 0,
            TaggedInt::Boxed(v) => v.is_zero(),
        }
    }

    /// Sign: -1, 0, or 1.
    pub fn sign(&self) -> i32 {
        match self {
            TaggedInt::Inline(v) => v.signum() as i32,
            TaggedInt::Boxed(v) => {
                if v.is_zero() {
                    0
                } else if v.is_negative() {
                    -1
                } else {
                    1
                }
            }
        }
    }

    /// Number of bits needed to represent the magnitude of this value.
    pub fn magnitude_bits(&self) -> u64 {
        match self {
            TaggedInt::Inline(v) => {
                let mag = v.unsigned_abs();
                64 - mag.leading_zeros() as u64
            }
            TaggedInt::Boxed(v) => v.bits(),
        }
    }

    /// `self + other`.
    pub fn add(&self, other: &TaggedInt) -> TaggedInt {
        if let (TaggedInt::Inline(a), TaggedInt::Inline(b)) = (self, other) {
            if let Some(sum) = a.checked_add(*b) {
                return TaggedInt::Inline(sum);
            }
        }
        TaggedInt::from_bigint(self.to_bigint() + other.to_bigint())
    }

    /// `self - other`.
    pub fn sub(&self, other: &TaggedInt) -> TaggedInt {
        if let (TaggedInt::Inline(a), TaggedInt::Inline(b)) = (self, other) {
            if let Some(diff) = a.checked_sub(*b) {
                return TaggedInt::Inline(diff);
            }
        }
        TaggedInt::from_bigint(self.to_bigint() - other.to_bigint())
    }

    /// `-self`.
    pub fn neg(&self) -> TaggedInt {
        if let TaggedInt::Inline(a) = self {
            if let Some(n) = a.checked_neg() {
                return TaggedInt::Inline(n);
            }
        }
        TaggedInt::from_bigint(-self.to_bigint())
    }

    /// `self * other`.
    pub fn mul(&self, other: &TaggedInt) -> TaggedInt {
        if let (TaggedInt::Inline(a), TaggedInt::Inline(b)) = (self, other) {
            if let Some(prod) = a.checked_mul(*b) {
                return TaggedInt::Inline(prod);
            }
        }
        TaggedInt::from_bigint(self.to_bigint() * other.to_bigint())
    }

    /// `self <- self + b * c`. The fused accumulate used by the inner
    /// loops of [`crate::heap`] and [`crate::array`] (spec.md §4.1).
    pub fn addmul(&mut self, b: &TaggedInt, c: &TaggedInt) {
        if let (TaggedInt::Inline(s), TaggedInt::Inline(bv), TaggedInt::Inline(cv)) = (&*self, b, c) {
            if let Some(bc) = bv.checked_mul(*cv) {
                if let Some(sum) = s.checked_add(bc) {
                    *self = TaggedInt::Inline(sum);
                    return;
                }
            }
        }
        let result = self.to_bigint() + b.to_bigint() * c.to_bigint();
        *self = TaggedInt::from_bigint(result);
    }

    /// `self <- self - b * c`.
    pub fn submul(&mut self, b: &TaggedInt, c: &TaggedInt) {
        if let (TaggedInt::Inline(s), TaggedInt::Inline(bv), TaggedInt::Inline(cv)) = (&*self, b, c) {
            if let Some(bc) = bv.checked_mul(*cv) {
                if let Some(diff) = s.checked_sub(bc) {
                    *self = TaggedInt::Inline(diff);
                    return;
                }
            }
        }
        let result = self.to_bigint() - b.to_bigint() * c.to_bigint();
        *self = TaggedInt::from_bigint(result);
    }

    /// Truncated (round-towards-zero) division with remainder, matching
    /// the C `/` and `%` operators that spec.md §4.5.3's coefficient test
    /// relies on ("truncated division `q, r <- c / b_0`").
    pub fn trunc_div_rem(&self, other: &TaggedInt) -> (TaggedInt, TaggedInt) {
        debug_assert!(!other.is_zero());
        let a = self.to_bigint();
        let b = other.to_bigint();
        let (q, r) = a.div_rem(&b);
        (TaggedInt::from_bigint(q), TaggedInt::from_bigint(r))
    }

    /// Floor division with remainder (`self = q*other + r`, `0 <= r <
    /// |other|` when `other > 0`), used by content/cofactor reduction in
    /// [`crate::gcd`].
    pub fn floor_div_rem(&self, other: &TaggedInt) -> (TaggedInt, TaggedInt) {
        debug_assert!(!other.is_zero());
        let a = self.to_bigint();
        let b = other.to_bigint();
        let (q, r) = a.div_mod_floor(&b);
        (TaggedInt::from_bigint(q), TaggedInt::from_bigint(r))
    }

    /// Non-negative greatest common divisor.
    pub fn gcd(&self, other: &TaggedInt) -> TaggedInt {
        let a = self.to_bigint();
        let b = other.to_bigint();
        TaggedInt::from_bigint(a.gcd(&b))
    }

    /// Three-way comparison.
    pub fn compare(&self, other: &TaggedInt) -> Ordering {
        match (self, other) {
            (TaggedInt::Inline(a), TaggedInt::Inline(b)) => a.cmp(b),
            _ => self.to_bigint().cmp(&other.to_bigint()),
        }
    }
}

impl PartialEq for TaggedInt {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}
impl Eq for TaggedInt {}

impl PartialOrd for TaggedInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}
impl Ord for TaggedInt {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for TaggedInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggedInt::Inline(v) => write!(f, "{v}"),
            TaggedInt::Boxed(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for TaggedInt {
    fn from(v: i64) -> Self {
        TaggedInt::from_i64(v)
    }
}

impl From<BigInt> for TaggedInt {
    fn from(v: BigInt) -> Self {
        TaggedInt::from_bigint(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demote_shrinks_heap_values_that_fit() {
        let mut t = TaggedInt::Boxed(BigInt::from(42));
        t.demote();
        assert!(matches!(t, TaggedInt::Inline(42)));
    }

    #[test]
    fn add_escalates_on_overflow() {
        let a = TaggedInt::Inline(i64::MAX);
        let b = TaggedInt::Inline(1);
        let sum = a.add(&b);
        assert!(matches!(sum, TaggedInt::Boxed(_)));
        assert_eq!(sum.to_bigint(), BigInt::from(i64::MAX) + 1);
    }

    #[test]
    fn addmul_demotes_back_to_inline_when_it_fits() {
        let mut acc = TaggedInt::from_bigint(BigInt::from(i64::MAX) + 10);
        acc.submul(&TaggedInt::from_i64(1), &TaggedInt::from_i64(11));
        assert!(matches!(acc, TaggedInt::Inline(v) if v == i64::MAX - 1));
    }

    #[test]
    fn gcd_is_nonnegative() {
        let a = TaggedInt::from_i64(-12);
        let b = TaggedInt::from_i64(18);
        assert_eq!(a.gcd(&b), TaggedInt::from_i64(6));
    }

    #[test]
    fn trunc_div_rem_matches_c_semantics() {
        let a = TaggedInt::from_i64(-7);
        let b = TaggedInt::from_i64(2);
        let (q, r) = a.trunc_div_rem(&b);
        assert_eq!(q, TaggedInt::from_i64(-3));
        assert_eq!(r, TaggedInt::from_i64(-1));
    }

    #[test]
    fn floor_div_rem_remainder_has_divisor_sign() {
        let a = TaggedInt::from_i64(-7);
        let b = TaggedInt::from_i64(2);
        let (q, r) = a.floor_div_rem(&b);
        assert_eq!(q, TaggedInt::from_i64(-4));
        assert_eq!(r, TaggedInt::from_i64(1));
    }
}
