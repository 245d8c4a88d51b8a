//! Arithmetic front: add, sub, neg, scalar mul/divexact (spec.md §4.7).

use crate::error::{PolyError, PolyResult};
use crate::ev::FieldWidth;
use crate::mono::lex_compare_words;
use crate::poly::SparsePoly;
use crate::ti::TaggedInt;
use std::cmp::Ordering;

fn require_compatible(a: &SparsePoly, b: &SparsePoly) -> PolyResult<()> {
    if a.width().nvars() != b.width().nvars() {
        return Err(PolyError::ArityMismatch(a.width().nvars(), b.width().nvars()));
    }
    if a.width().order() != b.width().order() {
        return Err(PolyError::OrderMismatch);
    }
    Ok(())
}

/// Compare two masked packed exponents lexicographically.
fn masked_cmp(mask: &[u64], a: &[u64], b: &[u64]) -> Ordering {
    let ma: Vec<u64> = a.iter().zip(mask.iter()).map(|(x, m)| x ^ m).collect();
    let mb: Vec<u64> = b.iter().zip(mask.iter()).map(|(x, m)| x ^ m).collect();
    lex_compare_words(&ma, &mb)
}

/// Unify two operands onto a common [`FieldWidth`] (the wider of the two),
/// repacking the narrower one. Both must already agree on arity/order.
fn unify_width(a: &SparsePoly, b: &SparsePoly) -> (SparsePoly, SparsePoly) {
    let bits = a.width().bits().max(b.width().bits());
    let target = FieldWidth::new(a.width().order(), a.width().nvars(), bits);
    (repack_to(a, &target), repack_to(b, &target))
}

fn repack_to(p: &SparsePoly, target: &FieldWidth) -> SparsePoly {
    if p.width() == target {
        return p.clone();
    }
    let mut out = SparsePoly::zero(target.clone());
    for i in 0..p.len() {
        let vars = p.term_vars(i);
        out.push_term(p.coeff(i).clone(), target.pack(&vars));
    }
    out
}

/// `A + B`: a monomial-ordered merge of two sorted term streams
/// (spec.md §4.7). Equal monomials have their coefficients summed and are
/// dropped if the sum is zero.
pub fn add(a: &SparsePoly, b: &SparsePoly) -> PolyResult<SparsePoly> {
    require_compatible(a, b)?;
    let (a, b) = unify_width(a, b);
    Ok(merge(&a, &b, false))
}

/// `A - B`.
pub fn sub(a: &SparsePoly, b: &SparsePoly) -> PolyResult<SparsePoly> {
    require_compatible(a, b)?;
    let (a, b) = unify_width(a, b);
    Ok(merge(&a, &b, true))
}

/// `-A`.
pub fn neg(a: &SparsePoly) -> SparsePoly {
    let mut out = a.clone();
    out.negate();
    out
}

fn merge(a: &SparsePoly, b: &SparsePoly, subtract: bool) -> SparsePoly {
    let width = a.width().clone();
    let mask = width.cmp_mask();
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(a.len() + b.len());

    // In-place append fast path (spec.md §4.7): if the last quarter of A's
    // exponents already lies below B's leading exponent, only that tail
    // needs to merge with B; A's head is already correctly ordered ahead
    // of everything B could contribute.
    let split = if !a.is_empty() && !b.is_empty() {
        let cut = a.len() - a.len() / 4;
        if cut < a.len() && masked_cmp(&mask, a.exp(cut), b.exp(0)) == Ordering::Less {
            cut
        } else {
            0
        }
    } else {
        0
    };

    for i in 0..split {
        out.push_term(a.coeff(i).clone(), a.exp(i).to_vec());
    }

    let mut i = split;
    let mut j = 0usize;
    while i < a.len() && j < b.len() {
        match masked_cmp(&mask, a.exp(i), b.exp(j)) {
            Ordering::Greater => {
                out.push_term(a.coeff(i).clone(), a.exp(i).to_vec());
                i += 1;
            }
            Ordering::Less => {
                let c = if subtract { b.coeff(j).neg() } else { b.coeff(j).clone() };
                out.push_term(c, b.exp(j).to_vec());
                j += 1;
            }
            Ordering::Equal => {
                let sum = if subtract {
                    a.coeff(i).sub(b.coeff(j))
                } else {
                    a.coeff(i).add(b.coeff(j))
                };
                if !sum.is_zero() {
                    out.push_term(sum, a.exp(i).to_vec());
                }
                i += 1;
                j += 1;
            }
        }
    }
    while i < a.len() {
        out.push_term(a.coeff(i).clone(), a.exp(i).to_vec());
        i += 1;
    }
    while j < b.len() {
        let c = if subtract { b.coeff(j).neg() } else { b.coeff(j).clone() };
        out.push_term(c, b.exp(j).to_vec());
        j += 1;
    }
    out
}

/// `scalar_mul(A, c)`: rescale every coefficient by a constant. Scalar
/// multiplication by zero produces the empty polynomial.
pub fn scalar_mul(a: &SparsePoly, c: &TaggedInt) -> SparsePoly {
    if c.is_zero() {
        return SparsePoly::zero(a.width().clone());
    }
    let mut out = SparsePoly::zero(a.width().clone());
    out.reserve(a.len());
    for i in 0..a.len() {
        out.push_term(a.coeff(i).mul(c), a.exp(i).to_vec());
    }
    out
}

/// `scalar_divexact(A, c)`: exact scalar division; every coefficient must
/// be divisible by `c`.
pub fn scalar_divexact(a: &SparsePoly, c: &TaggedInt) -> PolyResult<SparsePoly> {
    debug_assert!(!c.is_zero());
    let mut out = SparsePoly::zero(a.width().clone());
    out.reserve(a.len());
    for i in 0..a.len() {
        let (q, r) = a.coeff(i).trunc_div_rem(c);
        if !r.is_zero() {
            return Err(PolyError::NotExact);
        }
        out.push_term(q, a.exp(i).to_vec());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mono::MonomialOrder;

    fn width() -> FieldWidth {
        FieldWidth::new(MonomialOrder::DegLex, 2, 16)
    }

    fn term(w: &FieldWidth, c: i64, vars: &[u64]) -> (TaggedInt, Vec<u64>) {
        (TaggedInt::from_i64(c), w.pack(vars))
    }

    fn poly(w: &FieldWidth, terms: &[(i64, &[u64])]) -> SparsePoly {
        let mut p = SparsePoly::zero(w.clone());
        for &(c, vars) in terms {
            let (c, e) = term(w, c, vars);
            p.push_term(c, e);
        }
        p.sort_terms();
        p.combine_like_terms();
        p
    }

    #[test]
    fn add_cancels_equal_monomials() {
        let w = width();
        let a = poly(&w, &[(1, &[1, 0]), (2, &[0, 1])]);
        let b = poly(&w, &[(-1, &[1, 0])]);
        let sum = add(&a, &b).unwrap();
        assert_eq!(sum.len(), 1);
        assert_eq!(sum.term_vars(0), vec![0, 1]);
    }

    #[test]
    fn sub_self_is_zero() {
        let w = width();
        let a = poly(&w, &[(3, &[2, 0]), (5, &[0, 3])]);
        let diff = sub(&a, &a).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn scalar_mul_zero_gives_empty_poly() {
        let w = width();
        let a = poly(&w, &[(3, &[2, 0])]);
        let scaled = scalar_mul(&a, &TaggedInt::zero());
        assert!(scaled.is_empty());
    }

    #[test]
    fn scalar_divexact_roundtrips_scalar_mul() {
        let w = width();
        let a = poly(&w, &[(3, &[2, 0]), (6, &[0, 1])]);
        let c = TaggedInt::from_i64(4);
        let scaled = scalar_mul(&a, &c);
        let back = scalar_divexact(&scaled, &c).unwrap();
        assert_eq!(back.term_vars(0), a.term_vars(0));
        assert_eq!(back.coeff(0), a.coeff(0));
    }

    #[test]
    fn scalar_divexact_fails_when_not_exact() {
        let w = width();
        let a = poly(&w, &[(3, &[2, 0])]);
        assert_eq!(scalar_divexact(&a, &TaggedInt::from_i64(2)).unwrap_err(), PolyError::NotExact);
    }
}
