//! Divides dispatcher (spec.md §4.8): picks the array engine or the heap
//! engine for exact division, handling monomial-cofactor short paths,
//! bit-width repacking, and deflation fallback.

use crate::array;
use crate::error::{PolyError, PolyResult};
use crate::ev::FieldWidth;
use crate::heap;
use crate::pool::ThreadPool;
use crate::poly::SparsePoly;
use crate::ti::TaggedInt;
use std::sync::{Arc, Mutex};

/// `divides(A, B) -> (bool, Q)` (spec.md §4.8).
pub fn divides(a: &SparsePoly, b: &SparsePoly) -> PolyResult<(bool, SparsePoly)> {
    divides_with_pool(a, b, None)
}

/// Same as [`divides`], but accepts an optional thread pool for the
/// content-extraction fast path below (spec.md §5: "A and B content
/// extraction may run on separate workers"). `content_of(a)` and
/// `content_of(b)` don't share any state, so each is a fully independent
/// work unit; this function only reads their results after the barrier
/// (`wait` on both handles) below.
pub fn divides_with_pool(a: &SparsePoly, b: &SparsePoly, pool: Option<&dyn ThreadPool>) -> PolyResult<(bool, SparsePoly)> {
    if b.is_empty() {
        return Err(PolyError::DivideByZero);
    }
    if a.is_empty() {
        return Ok((true, SparsePoly::zero(a.width().clone())));
    }
    if b.len() == 1 {
        return Ok(monomial_cofactor(a, b));
    }

    // content(B) must divide content(A) whenever B exactly divides A
    // (content is multiplicative over exact division); a cheap necessary
    // condition that rejects many non-divisor pairs before either engine
    // scans a single term.
    let (ca, cb) = content_pair(a, b, pool);
    if !divides_exactly(&ca, &cb) {
        return Ok((false, SparsePoly::zero(a.width().clone())));
    }

    if let Some(bounds) = array::Bounds::for_operand(a) {
        let outcome = array::divides(a, b, &bounds);
        if outcome.exact {
            return Ok((true, outcome.quotient));
        }
        // A dense "not exact" verdict at full precision is conclusive:
        // every term of A was scanned against every term of B.
        return Ok((false, SparsePoly::zero(a.width().clone())));
    }

    let outcome = heap::divides(a, b)?;
    if outcome.exact {
        return Ok((true, outcome.quotient));
    }

    // Exponents may simply not fit this polynomial's current bit width
    // well (spec.md §4.8 step 6): try deflating common strides before
    // giving up.
    if let Some((da, db, strides)) = deflate_pair(a, b) {
        let inner = divides_with_pool(&da, &db, pool)?;
        if inner.0 {
            // The quotient carries none of the shared shift: A = x^mins *
            // A', B = x^mins * B', so A/B = A'/B' exactly and only the
            // stride scaling needs to be undone.
            let zero_shift = vec![0u64; strides.len()];
            return Ok((true, inflate(&inner.1, &zero_shift, &strides, a.width())));
        }
    }
    Ok((false, SparsePoly::zero(a.width().clone())))
}

/// The content of a polynomial: the gcd of all its coefficients (zero for
/// an empty polynomial, matching `TaggedInt::gcd(0, x) == x`).
fn content(p: &SparsePoly) -> TaggedInt {
    let mut g = TaggedInt::zero();
    for i in 0..p.len() {
        g = g.gcd(p.coeff(i));
    }
    g
}

/// `content(a)` and `content(b)`, computed on separate workers when `pool`
/// grants two handles. Each worker only touches its own operand and writes
/// once into its own slot; both slots are read only after `wait` on both
/// handles, so no mutable state crosses workers before that barrier.
fn content_pair(a: &SparsePoly, b: &SparsePoly, pool: Option<&dyn ThreadPool>) -> (TaggedInt, TaggedInt) {
    let handles = pool.map(|p| p.request_threads(2)).unwrap_or_default();
    if handles.len() < 2 {
        if let Some(pool) = pool {
            pool.give_back(handles);
        }
        return (content(a), content(b));
    }
    let pool = pool.expect("handles were granted by a pool");

    let slot_a: Arc<Mutex<Option<TaggedInt>>> = Arc::new(Mutex::new(None));
    let slot_b: Arc<Mutex<Option<TaggedInt>>> = Arc::new(Mutex::new(None));

    let a_owned = a.clone();
    let slot = Arc::clone(&slot_a);
    pool.wake(&handles[0], Box::new(move || *slot.lock().unwrap() = Some(content(&a_owned))));

    let b_owned = b.clone();
    let slot = Arc::clone(&slot_b);
    pool.wake(&handles[1], Box::new(move || *slot.lock().unwrap() = Some(content(&b_owned))));

    for handle in &handles {
        pool.wait(handle);
    }
    pool.give_back(handles);

    let ca = Arc::try_unwrap(slot_a).unwrap_or_else(|_| panic!("worker still holds a reference after the barrier")).into_inner().unwrap().expect("woken worker stores its result before the barrier returns");
    let cb = Arc::try_unwrap(slot_b).unwrap_or_else(|_| panic!("worker still holds a reference after the barrier")).into_inner().unwrap().expect("woken worker stores its result before the barrier returns");
    (ca, cb)
}

/// Whether `denominator` divides `numerator` with zero remainder; `0`
/// divides nothing but itself.
fn divides_exactly(numerator: &TaggedInt, denominator: &TaggedInt) -> bool {
    if denominator.is_zero() {
        return numerator.is_zero();
    }
    let (_, r) = numerator.trunc_div_rem(denominator);
    r.is_zero()
}

/// `B` has exactly one term: every monomial of `A` must be divisible by
/// `B`'s, and every coefficient of `A` by `B`'s coefficient.
fn monomial_cofactor(a: &SparsePoly, b: &SparsePoly) -> (bool, SparsePoly) {
    let width = a.width().clone();
    let bcoeff = b.coeff(0);
    let bvars = b.term_vars(0);
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(a.len());
    for i in 0..a.len() {
        let avars = a.term_vars(i);
        let mut qvars = vec![0u64; avars.len()];
        for j in 0..avars.len() {
            if avars[j] < bvars[j] {
                return (false, SparsePoly::zero(width));
            }
            qvars[j] = avars[j] - bvars[j];
        }
        let (q, r) = a.coeff(i).trunc_div_rem(bcoeff);
        if !r.is_zero() {
            return (false, SparsePoly::zero(width));
        }
        out.push_term(q, width.pack(&qvars));
    }
    (true, out)
}

/// Per-variable minimum exponent and the gcd of the exponent differences
/// from that minimum (the common stride a variable advances by across
/// every term) over the combined terms of `a` and `b`.
pub fn deflation_info(a: &SparsePoly, b: &SparsePoly) -> (Vec<u64>, Vec<u64>) {
    let nvars = a.width().nvars();
    let mut mins = vec![u64::MAX; nvars];
    for p in [a, b] {
        for i in 0..p.len() {
            let vars = p.term_vars(i);
            for j in 0..nvars {
                mins[j] = mins[j].min(vars[j]);
            }
        }
    }
    let mut strides = vec![0u64; nvars];
    for p in [a, b] {
        for i in 0..p.len() {
            let vars = p.term_vars(i);
            for j in 0..nvars {
                strides[j] = gcd_u64(strides[j], vars[j] - mins[j]);
            }
        }
    }
    let strides = strides.into_iter().map(|s| if s == 0 { 1 } else { s }).collect();
    (mins, strides)
}

fn gcd_u64(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd_u64(b, a % b)
    }
}

fn deflate_pair(a: &SparsePoly, b: &SparsePoly) -> Option<(SparsePoly, SparsePoly, Vec<u64>)> {
    let (mins, strides) = deflation_info(a, b);
    if strides.iter().all(|&s| s == 1) {
        return None; // nothing to gain
    }
    Some((deflate(a, &mins, &strides), deflate(b, &mins, &strides), strides))
}

/// Shrinks every exponent by subtracting the shared minimum and dividing
/// the remainder by the shared stride. Valid only when every exponent of
/// `p`, minus `mins`, is an exact multiple of `strides` — guaranteed when
/// `mins`/`strides` come from [`deflation_info`] over `p` (and whatever
/// else it was paired with).
pub fn deflate(p: &SparsePoly, mins: &[u64], strides: &[u64]) -> SparsePoly {
    let width = p.width().clone();
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(p.len());
    for i in 0..p.len() {
        let vars = p.term_vars(i);
        let deflated: Vec<u64> = vars
            .iter()
            .zip(mins.iter())
            .zip(strides.iter())
            .map(|((&v, &m), &s)| (v - m) / s)
            .collect();
        out.push_term(p.coeff(i).clone(), width.pack(&deflated));
    }
    out.sort_terms();
    out
}

/// Inverse of [`deflate`]: scales every exponent by `strides` and adds
/// `mins` back.
pub fn inflate(p: &SparsePoly, mins: &[u64], strides: &[u64], target_width: &FieldWidth) -> SparsePoly {
    let mut out = SparsePoly::zero(target_width.clone());
    out.reserve(p.len());
    for i in 0..p.len() {
        let vars = p.term_vars(i);
        let inflated: Vec<u64> = vars
            .iter()
            .zip(mins.iter())
            .zip(strides.iter())
            .map(|((&v, &m), &s)| v * s + m)
            .collect();
        out.push_term(p.coeff(i).clone(), target_width.pack(&inflated));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mono::MonomialOrder;

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

    /// Grants exactly two handles and runs every job inline on `wake`.
    struct TwoWorkerPool;

    impl ThreadPool for TwoWorkerPool {
        fn request_threads(&self, limit: usize) -> Vec<crate::pool::PoolHandle> {
            (0..2.min(limit)).map(crate::pool::PoolHandle).collect()
        }
        fn wake(&self, _handle: &crate::pool::PoolHandle, job: Box<dyn FnOnce() + Send>) {
            job();
        }
        fn wait(&self, _handle: &crate::pool::PoolHandle) {}
        fn give_back(&self, _handles: Vec<crate::pool::PoolHandle>) {}
    }

    #[test]
    fn divides_with_pool_matches_sequential_divides() {
        let w = width(1);
        let a = poly(&w, &[(1, &[2]), (1, &[1]), (1, &[0])]);
        let b = poly(&w, &[(1, &[2]), (-1, &[1]), (1, &[0])]);
        let prod = heap::mul(&a, &b).unwrap();

        let sequential = divides(&prod, &b).unwrap();
        let pool = TwoWorkerPool;
        let pooled = divides_with_pool(&prod, &b, Some(&pool)).unwrap();
        assert_eq!(pooled.0, sequential.0);
        assert_eq!(pooled.1.len(), sequential.1.len());
        for i in 0..sequential.1.len() {
            assert_eq!(pooled.1.term_vars(i), sequential.1.term_vars(i));
            assert_eq!(*pooled.1.coeff(i), *sequential.1.coeff(i));
        }
    }

    #[test]
    fn content_pair_matches_sequential_content() {
        let w = width(1);
        let a = poly(&w, &[(6, &[2]), (4, &[0])]);
        let b = poly(&w, &[(9, &[1]), (3, &[0])]);
        let pool = TwoWorkerPool;
        let (ca, cb) = content_pair(&a, &b, Some(&pool));
        assert_eq!(ca, TaggedInt::from_i64(2));
        assert_eq!(cb, TaggedInt::from_i64(3));
    }

    #[test]
    fn monomial_divisor_recovers_exact_quotient() {
        let w = width(1);
        let a = poly(&w, &[(6, &[3]), (4, &[1])]);
        let b = poly(&w, &[(2, &[1])]);
        let (exact, q) = divides(&a, &b).unwrap();
        assert!(exact);
        assert_eq!(q.len(), 2);
        assert_eq!(q.term_vars(0), vec![2]);
        assert_eq!(*q.coeff(0), TaggedInt::from_i64(3));
    }

    #[test]
    fn zero_divisor_is_an_error() {
        let w = width(1);
        let a = poly(&w, &[(1, &[0])]);
        let b = SparsePoly::zero(w);
        assert_eq!(divides(&a, &b).unwrap_err(), PolyError::DivideByZero);
    }

    #[test]
    fn empty_dividend_divides_trivially() {
        let w = width(1);
        let a = SparsePoly::zero(w.clone());
        let b = poly(&w, &[(1, &[1])]);
        let (exact, q) = divides(&a, &b).unwrap();
        assert!(exact);
        assert!(q.is_empty());
    }

    #[test]
    fn multi_term_divisor_round_trips_through_mul() {
        let w = width(1);
        let a = poly(&w, &[(1, &[2]), (1, &[1]), (1, &[0])]);
        let b = poly(&w, &[(1, &[2]), (-1, &[1]), (1, &[0])]);
        let prod = heap::mul(&a, &b).unwrap();
        let (exact, q) = divides(&prod, &b).unwrap();
        assert!(exact);
        assert_eq!(q.len(), a.len());
    }

    #[test]
    fn deflate_inflate_round_trips_with_nonzero_shift_and_stride() {
        // Every exponent of both a and b is of the form 5 + 4k: mins=[5],
        // strides=[4]. Deflating then inflating must recover `a` exactly.
        let w = width(1);
        let a = poly(&w, &[(3, &[13]), (1, &[9]), (2, &[5])]);
        let b = poly(&w, &[(1, &[9]), (1, &[5])]);
        let (mins, strides) = deflation_info(&a, &b);
        assert_eq!(mins, vec![5]);
        assert_eq!(strides, vec![4]);
        let deflated = deflate(&a, &mins, &strides);
        assert_eq!(deflated.term_vars(0), vec![2]); // (13-5)/4
        assert_eq!(deflated.term_vars(1), vec![1]); // (9-5)/4
        assert_eq!(deflated.term_vars(2), vec![0]); // (5-5)/4
        let roundtrip = inflate(&deflated, &mins, &strides, &w);
        assert_eq!(roundtrip.len(), a.len());
        for i in 0..a.len() {
            assert_eq!(roundtrip.term_vars(i), a.term_vars(i));
            assert_eq!(*roundtrip.coeff(i), *a.coeff(i));
        }
    }
}
