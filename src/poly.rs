//! Sparse polynomial container (spec.md §3.4, §4.4).
//!
//! `(coeffs[0..L], exps[0..L], width)`: terms sorted strictly descending
//! under `width.order()`, coefficients never zero, exponents unique. Push
//! is the only way to append (construction may leave the sequence
//! unsorted or with duplicate exponents; `combine_like_terms` restores
//! canonical form before the value is exposed to a caller), mirroring how
//! `fuel-vm`'s `RuntimeBalances`/`CallFrame` builders accumulate state
//! before a single validating pass.

use crate::ev::FieldWidth;
use crate::mono::lex_compare_words;
use crate::ti::TaggedInt;
use std::cmp::Ordering;

/// A sparse multivariate polynomial: parallel coefficient/exponent arrays
/// sharing one [`FieldWidth`].
#[derive(Debug, Clone)]
pub struct SparsePoly {
    coeffs: Vec<TaggedInt>,
    exps: Vec<u64>,
    width: FieldWidth,
}

impl SparsePoly {
    /// The empty polynomial (additive identity) under `width`.
    pub fn zero(width: FieldWidth) -> Self {
        SparsePoly {
            coeffs: Vec::new(),
            exps: Vec::new(),
            width,
        }
    }

    /// Reserve storage for at least `additional` more terms.
    pub fn reserve(&mut self, additional: usize) {
        self.coeffs.reserve(additional);
        self.exps.reserve(additional * self.width.nwords());
    }

    /// Number of nonzero terms.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn width(&self) -> &FieldWidth {
        &self.width
    }

    fn nwords(&self) -> usize {
        self.width.nwords()
    }

    /// The packed exponent of term `i`.
    pub fn exp(&self, i: usize) -> &[u64] {
        let nw = self.nwords();
        &self.exps[i * nw..(i + 1) * nw]
    }

    /// The coefficient of term `i`.
    pub fn coeff(&self, i: usize) -> &TaggedInt {
        &self.coeffs[i]
    }

    /// The unpacked variable-exponent vector of term `i`.
    pub fn term_vars(&self, i: usize) -> Vec<u64> {
        self.width.unpack(self.exp(i))
    }

    /// Drop every term from index `len` onward.
    pub fn truncate(&mut self, len: usize) {
        if self.coeffs.len() > len {
            let nw = self.nwords();
            self.coeffs.truncate(len);
            self.exps.truncate(len * nw);
        }
    }

    /// Exchange contents with `other`. Both must share a [`FieldWidth`].
    pub fn swap(&mut self, other: &mut SparsePoly) {
        std::mem::swap(&mut self.coeffs, &mut other.coeffs);
        std::mem::swap(&mut self.exps, &mut other.exps);
        std::mem::swap(&mut self.width, &mut other.width);
    }

    /// Append a term without maintaining sort order or uniqueness; the
    /// only way to build a polynomial up (spec.md §4.4 "push is the only
    /// way to append"). The coefficient must already be known nonzero, or
    /// it will be dropped by a later `combine_like_terms`.
    pub fn push_term(&mut self, coeff: TaggedInt, exp: Vec<u64>) {
        debug_assert_eq!(exp.len(), self.nwords());
        if coeff.is_zero() {
            return;
        }
        self.coeffs.push(coeff);
        self.exps.extend_from_slice(&exp);
    }

    /// Stable sort of terms by strictly descending exponent under
    /// `width.order()`.
    pub fn sort_terms(&mut self) {
        let nw = self.nwords();
        let mask = self.width.cmp_mask();
        let len = self.coeffs.len();
        let mut order: Vec<usize> = (0..len).collect();
        order.sort_by(|&a, &b| {
            let ea = &self.exps[a * nw..(a + 1) * nw];
            let eb = &self.exps[b * nw..(b + 1) * nw];
            masked_compare(ea, eb, &mask).reverse() // descending
        });
        let old_coeffs = std::mem::take(&mut self.coeffs);
        let old_exps = std::mem::take(&mut self.exps);
        let mut new_coeffs = Vec::with_capacity(len);
        let mut new_exps = vec![0u64; len * nw];
        for (new_i, &old_i) in order.iter().enumerate() {
            new_coeffs.push(old_coeffs[old_i].clone());
            new_exps[new_i * nw..(new_i + 1) * nw]
                .copy_from_slice(&old_exps[old_i * nw..(old_i + 1) * nw]);
        }
        self.coeffs = new_coeffs;
        self.exps = new_exps;
    }

    /// Linear pass over already-sorted terms merging equal exponents and
    /// dropping zero results (spec.md §4.4). Must follow `sort_terms`
    /// whenever construction could not guarantee order/uniqueness.
    pub fn combine_like_terms(&mut self) {
        let nw = self.nwords();
        let len = self.coeffs.len();
        if len == 0 {
            return;
        }
        let mut write = 0usize;
        let mut read = 0usize;
        while read < len {
            let mut acc = self.coeffs[read].clone();
            let exp_start = read * nw;
            let exp = self.exps[exp_start..exp_start + nw].to_vec();
            let mut next = read + 1;
            while next < len && self.exps[next * nw..(next + 1) * nw] == exp[..] {
                acc = acc.add(&self.coeffs[next]);
                next += 1;
            }
            if !acc.is_zero() {
                self.coeffs[write] = acc;
                self.exps[write * nw..(write + 1) * nw].copy_from_slice(&exp);
                write += 1;
            }
            read = next;
        }
        self.coeffs.truncate(write);
        self.exps.truncate(write * nw);
    }

    /// Validate SP-1..SP-3: nonzero coefficients, strictly descending
    /// unique exponents, no sentinel bit set.
    pub fn is_canonical(&self) -> bool {
        let nw = self.nwords();
        let mask = self.width.cmp_mask();
        for i in 0..self.coeffs.len() {
            if self.coeffs[i].is_zero() {
                return false;
            }
            let e = &self.exps[i * nw..(i + 1) * nw];
            if self.width.overflows(e) {
                return false;
            }
            if i > 0 {
                let prev = &self.exps[(i - 1) * nw..i * nw];
                if masked_compare(prev, e, &mask) != Ordering::Greater {
                    return false;
                }
            }
        }
        true
    }

    /// Per-variable maxima across all terms (`degrees(A)` in spec.md §6).
    pub fn degrees(&self) -> Vec<u64> {
        self.width.degrees(&self.exps, self.coeffs.len())
    }

    /// Maximum exponent of a single variable across all terms
    /// (`degree_in_variable(A, j)`).
    pub fn degree_in_variable(&self, j: usize) -> u64 {
        self.degrees()[j]
    }

    /// Negate every coefficient in place.
    pub fn negate(&mut self) {
        for c in &mut self.coeffs {
            *c = c.neg();
        }
    }

    /// `true` if the leading coefficient (if any) is positive.
    pub fn leading_coeff_positive(&self) -> bool {
        self.coeffs.first().map(|c| c.sign() >= 0).unwrap_or(true)
    }
}

/// Crate-level operations surfaced as inherent methods (spec.md §6; mirrors
/// `fuel-vm` putting VM operations on `Interpreter<S>` rather than as free
/// functions). Each delegates to the dispatcher module that actually owns
/// the algorithm.
impl SparsePoly {
    pub fn add(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        crate::arith::add(self, other)
    }

    pub fn sub(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        crate::arith::sub(self, other)
    }

    pub fn neg(&self) -> SparsePoly {
        crate::arith::neg(self)
    }

    pub fn scalar_mul(&self, c: &TaggedInt) -> SparsePoly {
        crate::arith::scalar_mul(self, c)
    }

    pub fn scalar_divexact(&self, c: &TaggedInt) -> crate::error::PolyResult<SparsePoly> {
        crate::arith::scalar_divexact(self, c)
    }

    /// Picks the array or heap engine internally depending on how small the
    /// exponent bounds of the product are (spec.md §4.6/§4.5).
    pub fn mul(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        match crate::array::Bounds::for_product(self, other) {
            Some(bounds) => Ok(crate::array::mul(self, other, &bounds)),
            None => crate::heap::mul(self, other),
        }
    }

    /// `(exact, quotient)` (spec.md §4.8).
    pub fn divides(&self, other: &SparsePoly) -> crate::error::PolyResult<(bool, SparsePoly)> {
        crate::divides::divides(self, other)
    }

    /// Exact division; fails with [`crate::error::PolyError::NotExact`] if
    /// `other` does not divide `self`.
    pub fn divexact(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        let (exact, q) = crate::divides::divides(self, other)?;
        if exact {
            Ok(q)
        } else {
            Err(crate::error::PolyError::NotExact)
        }
    }

    /// Floor quotient (spec.md §4.5.2), discarding any remainder.
    pub fn div(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        crate::heap::div_floor(self, other)
    }

    /// `(quotient, remainder)` with `self == quotient * other + remainder`
    /// (spec.md §4.5.3).
    pub fn divrem(&self, other: &SparsePoly) -> crate::error::PolyResult<(SparsePoly, SparsePoly)> {
        crate::heap::divrem(self, other)
    }

    pub fn gcd(&self, other: &SparsePoly) -> crate::error::PolyResult<SparsePoly> {
        crate::gcd::gcd(self, other)
    }
}

fn masked_compare(a: &[u64], b: &[u64], mask: &[u64]) -> Ordering {
    let ma: Vec<u64> = a.iter().zip(mask.iter()).map(|(x, m)| x ^ m).collect();
    let mb: Vec<u64> = b.iter().zip(mask.iter()).map(|(x, m)| x ^ m).collect();
    lex_compare_words(&ma, &mb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mono::MonomialOrder;

    fn width() -> FieldWidth {
        FieldWidth::new(MonomialOrder::DegLex, 2, 16)
    }

    #[test]
    fn push_sort_combine_produces_canonical_form() {
        let w = width();
        let mut p = SparsePoly::zero(w.clone());
        p.push_term(TaggedInt::from_i64(1), w.pack(&[1, 0]));
        p.push_term(TaggedInt::from_i64(2), w.pack(&[0, 2]));
        p.push_term(TaggedInt::from_i64(-1), w.pack(&[1, 0]));
        p.sort_terms();
        p.combine_like_terms();
        assert!(p.is_canonical());
        assert_eq!(p.len(), 1);
        assert_eq!(p.term_vars(0), vec![0, 2]);
    }

    #[test]
    fn empty_polynomial_is_canonical() {
        let p = SparsePoly::zero(width());
        assert!(p.is_canonical());
        assert!(p.is_empty());
    }

    #[test]
    fn degrees_reports_per_variable_maxima() {
        let w = width();
        let mut p = SparsePoly::zero(w.clone());
        p.push_term(TaggedInt::from_i64(1), w.pack(&[3, 1]));
        p.push_term(TaggedInt::from_i64(1), w.pack(&[0, 5]));
        p.sort_terms();
        assert_eq!(p.degrees(), vec![3, 5]);
    }
}
