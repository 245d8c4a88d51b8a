//! Deflate/inflate round-trip: `inflate(deflate(A, mins, strides), mins,
//! strides) == A` for any `A` and a shift/stride vector compatible with
//! it, i.e. computed by `deflation_info` over `A` (paired with anything,
//! including itself).

use mpoly_core::divides::{deflate, deflation_info, inflate};
use mpoly_core::prelude::*;
use pretty_assertions::assert_eq;

fn width(nvars: usize) -> FieldWidth {
    FieldWidth::new(MonomialOrder::DegLex, nvars, 16)
}

fn poly(w: &FieldWidth, terms: &[(i64, &[u64])]) -> SparsePoly {
    let mut p = SparsePoly::zero(w.clone());
    for &(c, vars) in terms {
        p.push_term(TaggedInt::from_i64(c), w.pack(vars));
    }
    p.sort_terms();
    p.combine_like_terms();
    p
}

fn assert_poly_eq(a: &SparsePoly, b: &SparsePoly) {
    assert_eq!(a.len(), b.len());
    for i in 0..a.len() {
        assert_eq!(a.term_vars(i), b.term_vars(i));
        assert_eq!(*a.coeff(i), *b.coeff(i));
    }
}

#[test]
fn round_trip_with_zero_shift_unit_stride() {
    // Every exponent already shares stride 1 from a zero shift: deflation
    // is a no-op transform, so the round trip is trivially exact.
    let w = width(2);
    let a = poly(&w, &[(1, &[0, 0]), (2, &[1, 0]), (3, &[0, 2])]);
    let (mins, strides) = deflation_info(&a, &a);
    assert_eq!(mins, vec![0, 0]);
    assert_eq!(strides, vec![1, 1]);
    let round_trip = inflate(&deflate(&a, &mins, &strides), &mins, &strides, &w);
    assert_poly_eq(&round_trip, &a);
}

#[test]
fn round_trip_with_nonzero_shift_and_stride_two() {
    // Every x exponent is 3 + 2k, every y exponent is 1 + 2k: mins=[3,1],
    // strides=[2,2].
    let w = width(2);
    let a = poly(&w, &[(5, &[3, 1]), (-2, &[5, 3]), (1, &[7, 5])]);
    let (mins, strides) = deflation_info(&a, &a);
    assert_eq!(mins, vec![3, 1]);
    assert_eq!(strides, vec![2, 2]);
    let deflated = deflate(&a, &mins, &strides);
    assert_eq!(deflated.term_vars(0), vec![2, 2]); // (7-3)/2, (5-1)/2
    assert_eq!(deflated.term_vars(1), vec![1, 1]); // (5-3)/2, (3-1)/2
    assert_eq!(deflated.term_vars(2), vec![0, 0]); // (3-3)/2, (1-1)/2
    let round_trip = inflate(&deflated, &mins, &strides, &w);
    assert_poly_eq(&round_trip, &a);
}

#[test]
fn round_trip_with_single_term_has_zero_strides_promoted_to_one() {
    // A single term contributes no nonzero exponent differences, so every
    // stride's gcd-of-nothing is 0; deflation_info promotes that to 1 so
    // division by stride stays well-defined.
    let w = width(2);
    let a = poly(&w, &[(7, &[4, 9])]);
    let (mins, strides) = deflation_info(&a, &a);
    assert_eq!(mins, vec![4, 9]);
    assert_eq!(strides, vec![1, 1]);
    let round_trip = inflate(&deflate(&a, &mins, &strides), &mins, &strides, &w);
    assert_poly_eq(&round_trip, &a);
}

#[test]
fn round_trip_uses_shift_and_stride_from_a_compatible_pair() {
    // mins/strides computed from the pair (a, b) must still round-trip
    // each polynomial individually, since both share one global min and
    // stride per variable by construction.
    let w = width(1);
    let a = poly(&w, &[(1, &[9]), (1, &[5])]);
    let b = poly(&w, &[(1, &[13])]);
    let (mins, strides) = deflation_info(&a, &b);
    assert_eq!(mins, vec![5]);
    assert_eq!(strides, vec![4]);

    let round_trip_a = inflate(&deflate(&a, &mins, &strides), &mins, &strides, &w);
    let round_trip_b = inflate(&deflate(&b, &mins, &strides), &mins, &strides, &w);
    assert_poly_eq(&round_trip_a, &a);
    assert_poly_eq(&round_trip_b, &b);
}

/// End-to-end sanity check on a pair whose exponents all share a stride
/// greater than one — the shape of case that would hit the deflation
/// fallback if the direct division attempt reported "not exact" at the
/// current bit width.
#[test]
fn divides_recovers_exact_quotient_through_shared_stride() {
    let w = width(1);
    // a = x^12 + x^8 + x^4 (all exponents multiples of 4), b = x^4 + 1.
    let a = poly(&w, &[(1, &[12]), (1, &[8]), (1, &[4])]);
    let b = poly(&w, &[(1, &[4]), (1, &[0])]);
    let prod = a.mul(&b).unwrap();
    let (exact, q) = prod.divides(&b).unwrap();
    assert!(exact);
    assert_eq!(q.len(), a.len());
    for i in 0..a.len() {
        assert_eq!(q.term_vars(i), a.term_vars(i));
        assert_eq!(*q.coeff(i), *a.coeff(i));
    }
}
