//! GCD info: per-variable limits, strides, and a modular-evaluation cost
//! estimate (spec.md §4.10) logged alongside the GCD dispatcher's single
//! implemented strategy.
//!
//! The estimator exists only to feed `tracing::debug!` in [`crate::gcd`];
//! it never participates in computing the GCD itself.

/// Per-variable degree bounds, derived strides, and the term-count
/// estimate spec.md §4.10 calls `Gdeflate_deg_bound`/`Gterm_count_est`.
pub struct GcdInfo {
    pub min: Vec<u64>,
    pub max: Vec<u64>,
    pub stride: Vec<u64>,
    pub deflate_deg_bound: Vec<u64>,
    pub term_count_est: u64,
}

impl GcdInfo {
    /// Two-pass computation over `a` and `b` combined (spec.md §4.10):
    /// a limits pass for per-variable min/max, then a stride pass
    /// refining `gcd(max[j]-min[j], exp_j-min[j])` per term, exiting
    /// early once every stride has become 1.
    pub fn compute(a: &crate::poly::SparsePoly, b: &crate::poly::SparsePoly) -> Self {
        let nvars = a.width().nvars();
        let mut min = vec![u64::MAX; nvars];
        let mut max = vec![0u64; nvars];
        for p in [a, b] {
            for i in 0..p.len() {
                let vars = p.term_vars(i);
                for j in 0..nvars {
                    min[j] = min[j].min(vars[j]);
                    max[j] = max[j].max(vars[j]);
                }
            }
        }
        for m in &mut min {
            if *m == u64::MAX {
                *m = 0;
            }
        }

        let mut stride: Vec<u64> = (0..nvars).map(|j| max[j] - min[j]).collect();
        'outer: for p in [a, b] {
            for i in 0..p.len() {
                let vars = p.term_vars(i);
                let mut all_one = true;
                for j in 0..nvars {
                    stride[j] = gcd_u64(stride[j], vars[j] - min[j]);
                    if stride[j] != 1 {
                        all_one = false;
                    }
                }
                if all_one {
                    break 'outer;
                }
            }
        }
        for s in &mut stride {
            if *s == 0 {
                *s = 1;
            }
        }

        let deflate_deg_bound: Vec<u64> = (0..nvars).map(|j| (max[j] - min[j]) / stride[j]).collect();
        let term_count_est = estimate_term_count(&deflate_deg_bound);

        GcdInfo {
            min,
            max,
            stride,
            deflate_deg_bound,
            term_count_est,
        }
    }
}

fn gcd_u64(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd_u64(b, a % b)
    }
}

/// Direct lookup table when the deflated bounding box is small enough to
/// enumerate; otherwise a cheap powers-of-two proxy indexed by each
/// variable's bit-length, per spec.md §4.10.
fn estimate_term_count(bounds: &[u64]) -> u64 {
    let limit = crate::config::GCD_ESTIMATOR_LUT_LIMIT_BASE as u128;
    let direct: Option<u128> = bounds.iter().try_fold(1u128, |acc, &b| {
        let next = acc.checked_mul((b + 1) as u128)?;
        if next > limit {
            None
        } else {
            Some(next)
        }
    });
    match direct {
        Some(count) => count as u64,
        None => {
            let bits: u32 = bounds.iter().map(|&b| 64 - (b + 1).leading_zeros()).sum();
            let divisor = crate::config::GCD_ESTIMATOR_LUT_LIMIT_DIVISOR as u64;
            (1u64 << bits.min(62)) / divisor.max(1)
        }
    }
}
