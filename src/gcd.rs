//! GCD dispatcher (spec.md §4.9): trivial cases, monomial cofactors,
//! variable projection, a divisibility shortcut, then a recursive
//! content/primitive-part strategy over a chosen main variable.
//!
//! Brown's recursive content/primitive-part construction over a main
//! variable, using plain (non-subresultant) pseudo-division, is the only
//! strategy implemented; it is also the only one dispatched to, for every
//! non-trivial pair. [`crate::gcd_info::GcdInfo`] is computed for logging
//! only (see its `tracing::debug!` call below) and does not feed any
//! branch here — Zippel and Berlekamp–Massey are not implemented, so
//! there is nothing to score it against (see DESIGN.md).

use crate::arith;
use crate::divides;
use crate::error::PolyResult;
use crate::ev::FieldWidth;
use crate::gcd_info::GcdInfo;
use crate::heap;
use crate::pool::ThreadPool;
use crate::poly::SparsePoly;
use crate::ti::TaggedInt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// `gcd(A, B)` (spec.md §4.9): always returns a polynomial with a
/// positive leading coefficient.
pub fn gcd(a: &SparsePoly, b: &SparsePoly) -> PolyResult<SparsePoly> {
    gcd_with_pool(a, b, None)
}

/// Same as [`gcd`], but accepts an optional thread pool used only for the
/// pair of main-variable view conversions inside
/// [`gcd_via_main_variable`] (spec.md §5: "GCD strategy conversion...
/// independent work units") — every recursive `gcd` call made while
/// computing a view's content still runs sequentially, so the pool is
/// only ever spread one level deep.
pub fn gcd_with_pool(a: &SparsePoly, b: &SparsePoly, pool: Option<&dyn ThreadPool>) -> PolyResult<SparsePoly> {
    if a.is_empty() {
        return Ok(normalize(b));
    }
    if b.is_empty() {
        return Ok(normalize(a));
    }
    if is_constant(a) || is_constant(b) {
        let ca = if is_constant(a) { constant_value(a) } else { content(a) };
        let cb = if is_constant(b) { constant_value(b) } else { content(b) };
        return Ok(constant_poly(a.width(), ca.gcd(&cb)));
    }

    let nvars = a.width().nvars();
    let shift: Vec<u64> = {
        let min_a = min_exponents(a);
        let min_b = min_exponents(b);
        (0..nvars).map(|j| min_a[j].min(min_b[j])).collect()
    };
    let shifted = shift.iter().any(|&s| s > 0);
    let a2 = if shifted { shift_down(a, &shift) } else { a.clone() };
    let b2 = if shifted { shift_down(b, &shift) } else { b.clone() };

    if let Some(g) = monomial_cofactor_shortcut(&a2, &b2) {
        return Ok(normalize(&shift_up(&g, &shift)));
    }

    // Divisibility shortcut (spec.md §4.9 step 5): cheap when the
    // deflated degree bounds already coincide with one operand's own
    // degrees (a perfect-divisor candidate), but trying it unconditionally
    // is still correct, just occasionally wasted heap-engine work.
    if divides::divides(&a2, &b2)?.0 {
        return Ok(normalize(&shift_up(&b2, &shift)));
    }
    if divides::divides(&b2, &a2)?.0 {
        return Ok(normalize(&shift_up(&a2, &shift)));
    }

    // Logged for observability only; Brown is the sole implemented
    // strategy and runs unconditionally below regardless of this estimate.
    let info = GcdInfo::compute(&a2, &b2);
    tracing::debug!(term_count_est = info.term_count_est, "gcd: running brown-style recursive strategy");

    let da = a2.degrees();
    let db = b2.degrees();
    let main_var = (0..nvars).find(|&j| da[j] > 0 || db[j] > 0);
    let main_var = match main_var {
        Some(v) => v,
        None => {
            // Both sides collapsed to constants after the shift; the
            // is_constant checks above should already have caught this.
            let g = content(&a2).gcd(&content(&b2));
            return Ok(normalize(&shift_up(&constant_poly(a2.width(), g), &shift)));
        }
    };

    let g = gcd_via_main_variable(&a2, &b2, main_var, pool)?;
    Ok(normalize(&shift_up(&g, &shift)))
}

fn normalize(p: &SparsePoly) -> SparsePoly {
    if p.leading_coeff_positive() {
        p.clone()
    } else {
        arith::neg(p)
    }
}

fn is_constant(p: &SparsePoly) -> bool {
    p.is_empty() || (p.len() == 1 && p.term_vars(0).iter().all(|&v| v == 0))
}

fn constant_value(p: &SparsePoly) -> TaggedInt {
    if p.is_empty() {
        TaggedInt::zero()
    } else {
        p.coeff(0).clone()
    }
}

fn constant_poly(width: &FieldWidth, value: TaggedInt) -> SparsePoly {
    let mut out = SparsePoly::zero(width.clone());
    if !value.is_zero() {
        out.push_term(value, width.pack(&vec![0u64; width.nvars()]));
    }
    out
}

/// The gcd of every coefficient in `p` (spec.md §4.9's "content").
fn content(p: &SparsePoly) -> TaggedInt {
    let mut g = TaggedInt::zero();
    for i in 0..p.len() {
        g = g.gcd(p.coeff(i));
    }
    g
}

fn min_exponents(p: &SparsePoly) -> Vec<u64> {
    let nvars = p.width().nvars();
    let mut min = vec![u64::MAX; nvars];
    for i in 0..p.len() {
        let vars = p.term_vars(i);
        for j in 0..nvars {
            min[j] = min[j].min(vars[j]);
        }
    }
    for m in &mut min {
        if *m == u64::MAX {
            *m = 0;
        }
    }
    min
}

fn shift_down(p: &SparsePoly, shift: &[u64]) -> SparsePoly {
    let width = p.width().clone();
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(p.len());
    for i in 0..p.len() {
        let vars: Vec<u64> = p.term_vars(i).iter().zip(shift.iter()).map(|(&v, &s)| v - s).collect();
        out.push_term(p.coeff(i).clone(), width.pack(&vars));
    }
    out.sort_terms();
    out
}

fn shift_up(p: &SparsePoly, shift: &[u64]) -> SparsePoly {
    let width = p.width().clone();
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(p.len());
    for i in 0..p.len() {
        let vars: Vec<u64> = p.term_vars(i).iter().zip(shift.iter()).map(|(&v, &s)| v + s).collect();
        out.push_term(p.coeff(i).clone(), width.pack(&vars));
    }
    out.sort_terms();
    out
}

/// If `A` and `B` have the same term count and their primitive parts are
/// identical (coefficients proportional by a constant ratio across every
/// position, spec.md §4.9 step 3), the GCD is that shared primitive part
/// scaled by the integer GCD of the two contents.
fn monomial_cofactor_shortcut(a: &SparsePoly, b: &SparsePoly) -> Option<SparsePoly> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let ca = content(a);
    let cb = content(b);
    if ca.is_zero() || cb.is_zero() {
        return None;
    }
    let pa = arith::scalar_divexact(a, &ca).ok()?;
    let pb = arith::scalar_divexact(b, &cb).ok()?;
    if pa.len() != pb.len() {
        return None;
    }
    for i in 0..pa.len() {
        if pa.term_vars(i) != pb.term_vars(i) || *pa.coeff(i) != *pb.coeff(i) {
            return None;
        }
    }
    Some(arith::scalar_mul(&pa, &ca.gcd(&cb)))
}

/// A polynomial viewed as univariate in `main_var`, coefficients sorted
/// by strictly descending exponent: each coefficient is itself a
/// polynomial in the remaining variables (with `main_var`'s field zero).
type View = Vec<(u64, SparsePoly)>;

fn to_view(p: &SparsePoly, main_var: usize, width: &FieldWidth) -> View {
    let mut groups: BTreeMap<u64, SparsePoly> = BTreeMap::new();
    for i in 0..p.len() {
        let mut vars = p.term_vars(i);
        let e = vars[main_var];
        vars[main_var] = 0;
        let entry = groups.entry(e).or_insert_with(|| SparsePoly::zero(width.clone()));
        entry.push_term(p.coeff(i).clone(), width.pack(&vars));
    }
    for poly in groups.values_mut() {
        poly.sort_terms();
        poly.combine_like_terms();
    }
    let mut view: View = groups.into_iter().filter(|(_, c)| !c.is_empty()).collect();
    view.sort_by(|x, y| y.0.cmp(&x.0));
    view
}

/// `to_view(a, ...)` and `to_view(b, ...)`, optionally run on separate
/// workers when `pool` grants two handles. Each worker only reads its own
/// operand and writes once into its own slot; both slots are read only
/// after `wait` on both handles.
fn to_view_pair(a: &SparsePoly, b: &SparsePoly, main_var: usize, width: &FieldWidth, pool: Option<&dyn ThreadPool>) -> (View, View) {
    let handles = pool.map(|p| p.request_threads(2)).unwrap_or_default();
    if handles.len() < 2 {
        if let Some(pool) = pool {
            pool.give_back(handles);
        }
        return (to_view(a, main_var, width), to_view(b, main_var, width));
    }
    let pool = pool.expect("handles were granted by a pool");

    let slot_a: Arc<Mutex<Option<View>>> = Arc::new(Mutex::new(None));
    let slot_b: Arc<Mutex<Option<View>>> = Arc::new(Mutex::new(None));

    let a_owned = a.clone();
    let width_a = width.clone();
    let slot = Arc::clone(&slot_a);
    pool.wake(&handles[0], Box::new(move || *slot.lock().unwrap() = Some(to_view(&a_owned, main_var, &width_a))));

    let b_owned = b.clone();
    let width_b = width.clone();
    let slot = Arc::clone(&slot_b);
    pool.wake(&handles[1], Box::new(move || *slot.lock().unwrap() = Some(to_view(&b_owned, main_var, &width_b))));

    for handle in &handles {
        pool.wait(handle);
    }
    pool.give_back(handles);

    let r0 = Arc::try_unwrap(slot_a).unwrap_or_else(|_| panic!("worker still holds a reference after the barrier")).into_inner().unwrap().expect("woken worker stores its result before the barrier returns");
    let r1 = Arc::try_unwrap(slot_b).unwrap_or_else(|_| panic!("worker still holds a reference after the barrier")).into_inner().unwrap().expect("woken worker stores its result before the barrier returns");
    (r0, r1)
}

fn from_view(view: &View, main_var: usize, width: &FieldWidth) -> SparsePoly {
    let mut out = SparsePoly::zero(width.clone());
    for (e, coeff_poly) in view {
        for i in 0..coeff_poly.len() {
            let mut vars = coeff_poly.term_vars(i);
            vars[main_var] = *e;
            out.push_term(coeff_poly.coeff(i).clone(), width.pack(&vars));
        }
    }
    out.sort_terms();
    out.combine_like_terms();
    out
}

/// Divide every coefficient of a view by `divisor`; this is only ever
/// called on an exact divisor (a content just extracted from the same
/// view), so a failure indicates an internal invariant violation rather
/// than a user-facing error.
fn view_divide_exact(view: &View, divisor: &SparsePoly) -> PolyResult<View> {
    let mut out = Vec::with_capacity(view.len());
    for (e, c) in view {
        let (exact, q) = divides::divides(c, divisor)?;
        debug_assert!(exact, "content extraction must divide every coefficient exactly");
        out.push((*e, q));
    }
    Ok(out)
}

/// The GCD of every coefficient polynomial in a view (spec.md's
/// "content" generalised recursively: content w.r.t. the main variable
/// is itself a multivariate GCD over the remaining variables).
fn view_content(view: &View, width: &FieldWidth) -> PolyResult<SparsePoly> {
    let mut acc: Option<SparsePoly> = None;
    for (_, c) in view {
        acc = Some(match acc {
            None => c.clone(),
            Some(prev) => gcd(&prev, c)?,
        });
    }
    Ok(acc.unwrap_or_else(|| SparsePoly::zero(width.clone())))
}

/// Classical pseudo-remainder (spec.md §4.9's Brown-style recursion):
/// repeatedly scale the whole remainder by the divisor's leading
/// coefficient before subtracting a shifted copy of the divisor, so
/// every step divides evenly regardless of what the leading
/// coefficients' own GCD is. Terminates because the scaled leading term
/// cancels exactly at each step.
fn pseudo_remainder(a_view: &View, b_view: &View, width: &FieldWidth) -> PolyResult<View> {
    let (deg_b, lc_b) = (b_view[0].0, b_view[0].1.clone());
    let mut r = a_view.clone();
    loop {
        let (deg_r, lc_r) = match r.first() {
            Some((e, c)) => (*e, c.clone()),
            None => break,
        };
        if deg_r < deg_b {
            break;
        }
        let shift = deg_r - deg_b;

        let mut combined: BTreeMap<u64, SparsePoly> = BTreeMap::new();
        for (e, c) in &r {
            combined.insert(*e, heap::mul(c, &lc_b)?);
        }
        for (e, c) in b_view {
            let term = heap::mul(&lc_r, c)?;
            let key = e + shift;
            let slot = combined.entry(key).or_insert_with(|| SparsePoly::zero(width.clone()));
            *slot = arith::sub(slot, &term)?;
        }

        let mut next: View = combined.into_iter().filter(|(_, c)| !c.is_empty()).collect();
        next.sort_by(|x, y| y.0.cmp(&x.0));
        r = next;
    }
    Ok(r)
}

fn gcd_via_main_variable(a: &SparsePoly, b: &SparsePoly, main_var: usize, pool: Option<&dyn ThreadPool>) -> PolyResult<SparsePoly> {
    let width = a.width().clone();
    let (r0, r1) = to_view_pair(a, b, main_var, &width, pool);

    let c0 = view_content(&r0, &width)?;
    let c1 = view_content(&r1, &width)?;
    let content_gcd = gcd(&c0, &c1)?;

    let mut prev = view_divide_exact(&r0, &c0)?;
    let mut cur = view_divide_exact(&r1, &c1)?;

    while !cur.is_empty() {
        let rem = pseudo_remainder(&prev, &cur, &width)?;
        let rem_primitive = if rem.is_empty() {
            rem
        } else {
            let c = view_content(&rem, &width)?;
            view_divide_exact(&rem, &c)?
        };
        prev = cur;
        cur = rem_primitive;
    }

    let primitive_gcd = from_view(&prev, main_var, &width);
    heap::mul(&primitive_gcd, &content_gcd)
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
    fn gcd_with_pool_matches_sequential_gcd() {
        let w = width(1);
        let a = poly(&w, &[(1, &[2]), (1, &[1]), (-2, &[0])]);
        let b = poly(&w, &[(1, &[2]), (2, &[1]), (-3, &[0])]);
        let sequential = gcd(&a, &b).unwrap();
        let pool = TwoWorkerPool;
        let pooled = gcd_with_pool(&a, &b, Some(&pool)).unwrap();
        assert_eq!(pooled.len(), sequential.len());
        for i in 0..sequential.len() {
            assert_eq!(pooled.term_vars(i), sequential.term_vars(i));
            assert_eq!(*pooled.coeff(i), *sequential.coeff(i));
        }
    }

    #[test]
    fn gcd_of_zero_and_poly_is_the_poly_normalised() {
        let w = width(1);
        let a = SparsePoly::zero(w.clone());
        let b = poly(&w, &[(-2, &[1])]);
        let g = gcd(&a, &b).unwrap();
        assert!(g.leading_coeff_positive());
        assert_eq!(g.len(), 1);
        assert_eq!(*g.coeff(0), TaggedInt::from_i64(2));
    }

    #[test]
    fn gcd_with_constant_reduces_to_integer_gcd_of_content() {
        let w = width(1);
        let a = poly(&w, &[(6, &[1]), (4, &[0])]);
        let b = poly(&w, &[(8, &[0])]);
        let g = gcd(&a, &b).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(*g.coeff(0), TaggedInt::from_i64(2));
    }

    #[test]
    fn gcd_recovers_shared_univariate_factor() {
        // a = (x-1)(x+2) = x^2+x-2, b = (x-1)(x+3) = x^2+2x-3, gcd = x-1
        let w = width(1);
        let a = poly(&w, &[(1, &[2]), (1, &[1]), (-2, &[0])]);
        let b = poly(&w, &[(1, &[2]), (2, &[1]), (-3, &[0])]);
        let g = gcd(&a, &b).unwrap();
        assert!(g.leading_coeff_positive());
        assert_eq!(g.len(), 2);
        assert_eq!(g.term_vars(0), vec![1]);
        assert_eq!(*g.coeff(0), TaggedInt::from_i64(1));
        assert_eq!(g.term_vars(1), vec![0]);
        assert_eq!(*g.coeff(1), TaggedInt::from_i64(-1));
    }

    #[test]
    fn gcd_when_one_side_divides_the_other() {
        let w = width(1);
        let b = poly(&w, &[(1, &[1]), (1, &[0])]); // x + 1
        let a = heap::mul(&b, &poly(&w, &[(1, &[1]), (-1, &[0])])).unwrap(); // x^2 - 1
        let g = gcd(&a, &b).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.term_vars(0), vec![1]);
        assert_eq!(g.term_vars(1), vec![0]);
    }

    #[test]
    fn gcd_multivariate_shared_factor() {
        // a = (x+y)(x-y) = x^2-y^2, b = (x+y)*x = x^2+xy, gcd = x+y
        let w = width(2);
        let shared = poly(&w, &[(1, &[1, 0]), (1, &[0, 1])]); // x + y
        let a = heap::mul(&shared, &poly(&w, &[(1, &[1, 0]), (-1, &[0, 1])])).unwrap();
        let b = heap::mul(&shared, &poly(&w, &[(1, &[1, 0])])).unwrap();
        let g = gcd(&a, &b).unwrap();
        assert!(g.leading_coeff_positive());
        assert_eq!(g.len(), 2);
    }
}
