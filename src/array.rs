//! Array engine: dense mixed-radix multiplication/division for small
//! exponent bounds (spec.md §4.6).
//!
//! When the product of per-variable bounds fits [`crate::config::MAX_ARRAY`],
//! a monomial packs into a single flat index instead of a sparse exponent
//! vector, and multiplication becomes a classical `O(La*Lb)` double loop
//! blocked by [`crate::config::BLOCK`] on both indices. spec.md describes
//! three escalating coefficient precisions (one word, two words, full
//! multi-precision, escalating but never de-escalating); that ladder is
//! exactly what [`crate::ti::TaggedInt`] already implements as its
//! inline/boxed tag (TI-1), so this module stores `TaggedInt` cells
//! directly rather than duplicating the ladder as three array types (see
//! DESIGN.md).

use crate::pool::ThreadPool;
use crate::poly::SparsePoly;
use crate::ti::TaggedInt;
use std::sync::{Arc, Mutex};

/// Per-variable bounds (one past the maximum exponent seen) and the
/// mixed-radix strides derived from them.
pub struct Bounds {
    bounds: Vec<u64>,
    strides: Vec<u64>,
    total: u64,
}

impl Bounds {
    /// Build bounds wide enough to hold every monomial of `a` and `b`'s
    /// *product* (i.e. `degree_in_variable(a, j) + degree_in_variable(b, j)
    /// + 1`). Returns `None` if the total array size would exceed
    /// [`crate::config::MAX_ARRAY`], signalling the caller should fall
    /// back to the heap engine.
    pub fn for_product(a: &SparsePoly, b: &SparsePoly) -> Option<Bounds> {
        let da = a.degrees();
        let db = b.degrees();
        let nvars = da.len();
        let bounds: Vec<u64> = (0..nvars).map(|j| da[j] + db[j] + 1).collect();
        Bounds::new(bounds)
    }

    /// Build bounds wide enough for `a` alone (used by exact division,
    /// whose quotient's degrees never exceed the dividend's).
    pub fn for_operand(a: &SparsePoly) -> Option<Bounds> {
        let bounds: Vec<u64> = a.degrees().iter().map(|&d| d + 1).collect();
        Bounds::new(bounds)
    }

    fn new(bounds: Vec<u64>) -> Option<Bounds> {
        let mut strides = vec![1u64; bounds.len()];
        let mut total = 1u64;
        for j in (0..bounds.len()).rev() {
            strides[j] = total;
            total = total.checked_mul(bounds[j])?;
            if total > crate::config::MAX_ARRAY as u64 {
                return None;
            }
        }
        Some(Bounds {
            bounds,
            strides,
            total,
        })
    }

    fn index(&self, vars: &[u64]) -> usize {
        let mut idx = 0u64;
        for j in 0..vars.len() {
            idx += vars[j] * self.strides[j];
        }
        idx as usize
    }

    fn unindex(&self, mut idx: u64) -> Vec<u64> {
        let mut vars = vec![0u64; self.bounds.len()];
        for j in 0..self.bounds.len() {
            vars[j] = idx / self.strides[j];
            idx %= self.strides[j];
        }
        vars
    }

    fn len(&self) -> usize {
        self.total as usize
    }
}

/// Dense multiplication: scatter `a` and `b` into flat arrays indexed by
/// [`Bounds::for_product`], run the blocked `O(La*Lb)` product, then
/// collect nonzero cells back into a sparse polynomial.
pub fn mul(a: &SparsePoly, b: &SparsePoly, bounds: &Bounds) -> SparsePoly {
    mul_with_pool(a, b, bounds, None)
}

/// Same as [`mul`], but when `pool` hands back worker handles the output
/// index space is striped into disjoint chunks (spec.md §5: "block
/// striping across output chunks") — one per worker. Each worker rescans
/// the full `a x b` cross product but only accumulates into its own
/// chunk, so no shared mutable cell ever crosses workers; chunks are
/// merged after the barrier (`wait` on every handle) that precedes this
/// function's own read of the results.
pub fn mul_with_pool(a: &SparsePoly, b: &SparsePoly, bounds: &Bounds, pool: Option<&dyn ThreadPool>) -> SparsePoly {
    let handles = pool.map(|p| p.request_threads(bounds.len())).unwrap_or_default();
    if handles.is_empty() {
        return collect(&mul_into_cells(a, b, bounds, 0, bounds.len()), bounds, a.width().clone());
    }
    let pool = pool.expect("handles were granted by a pool");

    let total = bounds.len();
    let chunk = total.div_ceil(handles.len());
    let chunks: Vec<Arc<Mutex<Option<(usize, Vec<TaggedInt>)>>>> =
        (0..handles.len()).map(|_| Arc::new(Mutex::new(None))).collect();

    for (w, handle) in handles.iter().enumerate() {
        let lo = w * chunk;
        let hi = (lo + chunk).min(total);
        let slot = Arc::clone(&chunks[w]);
        if lo >= hi {
            pool.wake(handle, Box::new(move || *slot.lock().unwrap() = Some((lo, Vec::new()))));
            continue;
        }
        let a = a.clone();
        let b = b.clone();
        let bounds_vec = bounds.bounds.clone();
        let strides = bounds.strides.clone();
        pool.wake(
            handle,
            Box::new(move || {
                let local_bounds = Bounds {
                    bounds: bounds_vec,
                    strides,
                    total: total as u64,
                };
                let local = mul_into_cells(&a, &b, &local_bounds, lo, hi);
                *slot.lock().unwrap() = Some((lo, local[lo..hi].to_vec()));
            }),
        );
    }
    for handle in &handles {
        pool.wait(handle);
    }
    pool.give_back(handles);

    let mut cells = vec![TaggedInt::zero(); total];
    for slot in chunks {
        let (lo, local) = Arc::try_unwrap(slot)
            .unwrap_or_else(|_| panic!("worker still holds a reference after the barrier"))
            .into_inner()
            .unwrap()
            .expect("every woken worker stores its result before the barrier returns");
        cells[lo..lo + local.len()].clone_from_slice(&local);
    }
    collect(&cells, bounds, a.width().clone())
}

/// Scatter `a`/`b` and run the blocked `O(La*Lb)` product, keeping only
/// cells whose flat index falls in `[keep_lo, keep_hi)`; a sequential
/// caller passes the full range.
fn mul_into_cells(a: &SparsePoly, b: &SparsePoly, bounds: &Bounds, keep_lo: usize, keep_hi: usize) -> Vec<TaggedInt> {
    let mut cells = vec![TaggedInt::zero(); bounds.len()];

    let a_idx: Vec<usize> = (0..a.len()).map(|i| bounds.index(&a.term_vars(i))).collect();
    let b_idx: Vec<usize> = (0..b.len()).map(|j| bounds.index(&b.term_vars(j))).collect();

    let block = crate::config::BLOCK;
    let la = a.len();
    let lb = b.len();
    let mut ob = 0;
    while ob < la {
        let oe = (ob + block).min(la);
        let mut ib = 0;
        while ib < lb {
            let ie = (ib + block).min(lb);
            for i in ob..oe {
                let ai = a_idx[i];
                let ac = a.coeff(i);
                for j in ib..ie {
                    let idx = ai + b_idx[j];
                    if idx >= keep_lo && idx < keep_hi {
                        cells[idx].addmul(ac, b.coeff(j));
                    }
                }
            }
            ib = ie;
        }
        ob = oe;
    }
    cells
}

fn collect(cells: &[TaggedInt], bounds: &Bounds, width: crate::ev::FieldWidth) -> SparsePoly {
    let mut out = SparsePoly::zero(width.clone());
    for idx in (0..cells.len()).rev() {
        if !cells[idx].is_zero() {
            let vars = bounds.unindex(idx as u64);
            out.push_term(cells[idx].clone(), width.pack(&vars));
        }
    }
    // `Bounds`'s strides are a plain mixed-radix index (variable 0
    // heaviest), not `width.order()` — re-sort into the polynomial's own
    // canonical order rather than assume the two coincide (SP-2).
    out.sort_terms();
    out.combine_like_terms();
    out
}

/// Outcome of a dense exact-division attempt.
pub struct DivOutcome {
    pub exact: bool,
    pub quotient: SparsePoly,
}

/// Dense exact division (spec.md §4.6): scatter `a` into a flat array,
/// scan high to low; at each nonzero cell, divide by `b`'s leading
/// coefficient (must be exact), then `submul` the divisor (shifted to
/// that cell) across the array. Any nonzero cell below `b`'s minimum
/// index when the scan ends means the division was not exact.
pub fn divides(a: &SparsePoly, b: &SparsePoly, bounds: &Bounds) -> DivOutcome {
    debug_assert!(!b.is_empty());
    let mut cells = vec![TaggedInt::zero(); bounds.len()];
    for i in 0..a.len() {
        let idx = bounds.index(&a.term_vars(i));
        cells[idx] = a.coeff(i).clone();
    }

    let b0_vars = b.term_vars(0);
    let b0_idx = bounds.index(&b0_vars);
    let b_rest: Vec<(usize, &TaggedInt)> = (1..b.len())
        .map(|i| (bounds.index(&b.term_vars(i)), b.coeff(i)))
        .collect();

    let mut quotient_cells: Vec<(usize, TaggedInt)> = Vec::new();
    let mut exact = true;

    for idx in (0..cells.len()).rev() {
        if cells[idx].is_zero() {
            continue;
        }
        if idx < b0_idx {
            exact = false;
            break;
        }
        let qi = idx - b0_idx;
        let (q, r) = cells[idx].trunc_div_rem(b.coeff(0));
        if !r.is_zero() {
            exact = false;
            break;
        }
        for &(offset, coeff) in &b_rest {
            let target = qi + offset;
            if target < cells.len() {
                cells[target].submul(coeff, &q);
            }
        }
        cells[idx] = TaggedInt::zero();
        quotient_cells.push((qi, q));
    }

    let quotient = if exact {
        let width = a.width().clone();
        let mut out = SparsePoly::zero(width.clone());
        for (idx, c) in quotient_cells.into_iter().rev() {
            let vars = bounds.unindex(idx as u64);
            out.push_term(c, width.pack(&vars));
        }
        // Same raw mixed-radix order as `collect`; re-sort into canonical
        // order before handing the quotient back (SP-2).
        out.sort_terms();
        out.combine_like_terms();
        out
    } else {
        SparsePoly::zero(a.width().clone())
    };

    DivOutcome { exact, quotient }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ev::FieldWidth;
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

    #[test]
    fn mul_matches_hand_computed_product() {
        let w = width(1);
        let a = poly(&w, &[(1, &[2]), (1, &[1]), (1, &[0])]);
        let b = poly(&w, &[(1, &[2]), (-1, &[1]), (1, &[0])]);
        let bounds = Bounds::for_product(&a, &b).unwrap();
        let prod = mul(&a, &b, &bounds);
        assert!(prod.is_canonical());
        assert_eq!(prod.len(), 3);
        assert_eq!(prod.term_vars(0), vec![4]);
        assert_eq!(prod.term_vars(1), vec![2]);
        assert_eq!(prod.term_vars(2), vec![0]);
    }

    #[test]
    fn divides_recovers_exact_factor() {
        let w = width(1);
        let a = poly(&w, &[(1, &[0]), (1, &[1])]);
        let b = poly(&w, &[(1, &[0]), (-1, &[1])]);
        let bounds_mul = Bounds::for_product(&a, &b).unwrap();
        let prod = mul(&a, &b, &bounds_mul);
        let bounds_div = Bounds::for_operand(&prod).unwrap();
        let outcome = divides(&prod, &b, &bounds_div);
        assert!(outcome.exact);
        assert_eq!(outcome.quotient.len(), a.len());
        for i in 0..a.len() {
            assert_eq!(outcome.quotient.term_vars(i), a.term_vars(i));
            assert_eq!(*outcome.quotient.coeff(i), *a.coeff(i));
        }
    }

    #[test]
    fn divides_reports_not_exact() {
        let w = width(1);
        let a = poly(&w, &[(1, &[2])]);
        let b = poly(&w, &[(1, &[1]), (1, &[0])]);
        let bounds = Bounds::for_operand(&a).unwrap();
        let outcome = divides(&a, &b, &bounds);
        assert!(!outcome.exact);
    }

    #[test]
    fn bounds_rejects_oversized_product() {
        let w = width(2);
        let a = poly(&w, &[(1, &[1_000_000, 1_000_000])]);
        let b = poly(&w, &[(1, &[1_000_000, 1_000_000])]);
        assert!(Bounds::for_product(&a, &b).is_none());
    }

    /// Two variables under `DegLex`: the mixed-radix index of `[2,0]`
    /// exceeds that of `[0,3]`, but `DegLex` ranks `[0,3]` first (higher
    /// total degree), so a raw index-order collect would misorder this.
    #[test]
    fn mul_output_is_canonical_under_deglex_with_two_vars() {
        let w = width(2);
        let a = poly(&w, &[(1, &[2, 0])]);
        let b = poly(&w, &[(1, &[0, 3]), (1, &[0, 0])]);
        let bounds = Bounds::for_product(&a, &b).unwrap();
        let prod = mul(&a, &b, &bounds);
        assert!(prod.is_canonical());
        assert_eq!(prod.term_vars(0), vec![2, 3]);
        assert_eq!(prod.term_vars(1), vec![2, 0]);
    }

    /// Grants exactly `WIDTH` handles and runs every job inline on `wake`,
    /// exercising the chunk-partitioned path without any real threads.
    struct FixedWidthPool {
        width: usize,
    }

    impl ThreadPool for FixedWidthPool {
        fn request_threads(&self, limit: usize) -> Vec<crate::pool::PoolHandle> {
            (0..self.width.min(limit)).map(crate::pool::PoolHandle).collect()
        }
        fn wake(&self, _handle: &crate::pool::PoolHandle, job: Box<dyn FnOnce() + Send>) {
            job();
        }
        fn wait(&self, _handle: &crate::pool::PoolHandle) {}
        fn give_back(&self, _handles: Vec<crate::pool::PoolHandle>) {}
    }

    #[test]
    fn mul_with_pool_matches_sequential_mul_across_chunk_counts() {
        let w = width(2);
        let a = poly(&w, &[(1, &[2, 0]), (3, &[1, 1])]);
        let b = poly(&w, &[(1, &[0, 3]), (1, &[0, 0]), (2, &[1, 0])]);
        let bounds = Bounds::for_product(&a, &b).unwrap();
        let sequential = mul(&a, &b, &bounds);

        for width_hint in [1usize, 2, 5] {
            let pool = FixedWidthPool { width: width_hint };
            let parallel = mul_with_pool(&a, &b, &bounds, Some(&pool));
            assert!(parallel.is_canonical());
            assert_eq!(parallel.len(), sequential.len());
            for i in 0..sequential.len() {
                assert_eq!(parallel.term_vars(i), sequential.term_vars(i));
                assert_eq!(*parallel.coeff(i), *sequential.coeff(i));
            }
        }
    }

    #[test]
    fn divides_output_is_canonical_under_deglex_with_two_vars() {
        let w = width(2);
        let a = poly(&w, &[(1, &[2, 0])]);
        let b = poly(&w, &[(1, &[0, 3]), (1, &[0, 0])]);
        let bounds_mul = Bounds::for_product(&a, &b).unwrap();
        let prod = mul(&a, &b, &bounds_mul);
        let bounds_div = Bounds::for_operand(&prod).unwrap();
        let outcome = divides(&prod, &b, &bounds_div);
        assert!(outcome.exact);
        assert!(outcome.quotient.is_canonical());
        assert_eq!(outcome.quotient.term_vars(0), vec![2, 0]);
    }
}
