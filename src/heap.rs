//! Heap engine: the Monagan–Pearce multiplication / division engine
//! (spec.md §4.5). A binary heap schedules `(i, j)` cells over the
//! cross-product of two polynomials' terms; `hind` bounds the heap so
//! every row has at most one live cell (HE-1), and a scheduling attempt
//! is re-run at a doubled field width whenever an exponent sum would set
//! a sentinel bit (spec.md §4.5.5).
//!
//! The "three-word accumulator" fast path spec.md §4.5.2 describes is
//! folded into [`crate::ti::TaggedInt::addmul`]/`submul` rather than
//! duplicated here: those already special-case the inline/inline product
//! before escalating to a [`num_bigint::BigInt`], so every call site in
//! this module gets the fast path for free (see DESIGN.md).

use crate::error::PolyResult;
use crate::ev::FieldWidth;
use crate::poly::SparsePoly;
use crate::ti::TaggedInt;

/// One scheduled unit of work: row `i` of the primary operand against
/// column `j` of the secondary operand.
#[derive(Clone, Copy, Debug)]
struct Cell {
    i: u32,
    j: u32,
}

/// A minimal binary heap over `(exp, cell)` pairs ordered by a supplied
/// comparator. Index 0 is used directly (unlike FLINT's 1-based arrays);
/// the orientation (max-heap for multiplication, min-heap for division)
/// is fixed at construction.
struct Heap {
    entries: Vec<(Vec<u64>, Cell)>,
    mask: Vec<u64>,
    max_heap: bool,
}

impl Heap {
    fn new(width: &FieldWidth, max_heap: bool) -> Self {
        Heap {
            entries: Vec::new(),
            mask: width.cmp_mask(),
            max_heap,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if `a` should sit above `b` in this heap's orientation.
    fn preferred(&self, a: &[u64], b: &[u64]) -> bool {
        let ma: Vec<u64> = a.iter().zip(self.mask.iter()).map(|(x, m)| x ^ m).collect();
        let mb: Vec<u64> = b.iter().zip(self.mask.iter()).map(|(x, m)| x ^ m).collect();
        let ord = crate::mono::lex_compare_words(&ma, &mb);
        if self.max_heap {
            ord == std::cmp::Ordering::Greater
        } else {
            ord == std::cmp::Ordering::Less
        }
    }

    fn push(&mut self, exp: Vec<u64>, cell: Cell) {
        self.entries.push((exp, cell));
        let mut i = self.entries.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.preferred(&self.entries[i].0, &self.entries[parent].0) {
                self.entries.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn peek_exp(&self) -> Option<&[u64]> {
        self.entries.first().map(|(e, _)| e.as_slice())
    }

    fn pop(&mut self) -> Option<(Vec<u64>, Cell)> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let top = self.entries.pop();
        let mut i = 0usize;
        loop {
            let l = 2 * i + 1;
            let r = 2 * i + 2;
            let mut best = i;
            if l < self.entries.len() && self.preferred(&self.entries[l].0, &self.entries[best].0) {
                best = l;
            }
            if r < self.entries.len() && self.preferred(&self.entries[r].0, &self.entries[best].0) {
                best = r;
            }
            if best == i {
                break;
            }
            self.entries.swap(i, best);
            i = best;
        }
        top
    }
}

/// Returned by a one-width attempt when an exponent sum overflows; the
/// caller widens the field and restarts from scratch (spec.md §4.5.5).
struct Overflow;

fn repack(p: &SparsePoly, width: &FieldWidth) -> SparsePoly {
    if p.width() == width {
        return p.clone();
    }
    let mut out = SparsePoly::zero(width.clone());
    out.reserve(p.len());
    for i in 0..p.len() {
        out.push_term(p.coeff(i).clone(), width.pack(&p.term_vars(i)));
    }
    out
}

/// `A * B` via the max-heap multiplication protocol (spec.md §4.5.2):
/// row `i` of `A` tracks the next unscheduled column of `B`; a row only
/// enters the heap once its predecessor has cleared column 0, which
/// bounds the heap to at most `min(len(A), len(B))` live cells at a
/// time.
pub fn mul(a: &SparsePoly, b: &SparsePoly) -> PolyResult<SparsePoly> {
    let mut bits = a.width().bits().max(b.width().bits());
    loop {
        let width = FieldWidth::try_new(a.width().order(), a.width().nvars(), bits)?;
        let ar = repack(a, &width);
        let br = repack(b, &width);
        match try_mul(&ar, &br, &width) {
            Ok(result) => return Ok(result),
            Err(Overflow) => {
                tracing::trace!(bits, "mul: exponent overflow, widening field");
                bits = width.widened();
            }
        }
    }
}

fn try_mul(a: &SparsePoly, b: &SparsePoly, width: &FieldWidth) -> Result<SparsePoly, Overflow> {
    let la = a.len();
    let lb = b.len();
    let mut out = SparsePoly::zero(width.clone());
    if la == 0 || lb == 0 {
        return Ok(out);
    }

    let mut heap = Heap::new(width, true);
    let mut in_heap = vec![false; la];

    let seed_exp = width.add_checked(a.exp(0), b.exp(0)).ok_or(Overflow)?;
    heap.push(seed_exp, Cell { i: 0, j: 0 });
    in_heap[0] = true;

    while !heap.is_empty() {
        let top_exp = heap.peek_exp().unwrap().to_vec();
        let mut acc = TaggedInt::zero();
        while heap.peek_exp() == Some(top_exp.as_slice()) {
            let (_, Cell { i, j }) = heap.pop().unwrap();
            acc.addmul(a.coeff(i as usize), b.coeff(j as usize));
            in_heap[i as usize] = false;

            if (j as usize) + 1 < lb {
                let e = width
                    .add_checked(a.exp(i as usize), b.exp(j as usize + 1))
                    .ok_or(Overflow)?;
                heap.push(e, Cell { i, j: j + 1 });
                in_heap[i as usize] = true;
            }
            if j == 0 && (i as usize) + 1 < la && !in_heap[i as usize + 1] {
                let e = width
                    .add_checked(a.exp(i as usize + 1), b.exp(0))
                    .ok_or(Overflow)?;
                heap.push(e, Cell { i: i + 1, j: 0 });
                in_heap[i as usize + 1] = true;
            }
        }
        if !acc.is_zero() {
            out.push_term(acc, top_exp);
        }
    }
    Ok(out)
}

/// Outcome of a heap-based exact-division attempt.
pub struct DivOutcome {
    pub exact: bool,
    pub quotient: SparsePoly,
}

/// Exact division via the min-heap quotient protocol (spec.md §4.5.3).
/// Produces `Q` such that `A = Q*B`, or reports "not exact". `b` must be
/// nonempty.
pub fn divides(a: &SparsePoly, b: &SparsePoly) -> PolyResult<DivOutcome> {
    assert!(!b.is_empty());
    let mut bits = a.width().bits().max(b.width().bits());
    loop {
        let width = FieldWidth::try_new(a.width().order(), a.width().nvars(), bits)?;
        let ar = repack(a, &width);
        let br = repack(b, &width);
        match try_divrem(&ar, &br, &width, Mode::ExactOnly) {
            Ok(outcome) => {
                return Ok(DivOutcome {
                    exact: outcome.exact && outcome.remainder.is_empty(),
                    quotient: outcome.quotient,
                })
            }
            Err(Overflow) => {
                tracing::trace!(bits, "divides: exponent overflow, widening field");
                bits = width.widened();
            }
        }
    }
}

/// Floor-quotient: tolerates a nonzero remainder by discarding it
/// (spec.md §4.5.4).
pub fn div_floor(a: &SparsePoly, b: &SparsePoly) -> PolyResult<SparsePoly> {
    assert!(!b.is_empty());
    let mut bits = a.width().bits().max(b.width().bits());
    loop {
        let width = FieldWidth::try_new(a.width().order(), a.width().nvars(), bits)?;
        let ar = repack(a, &width);
        let br = repack(b, &width);
        match try_divrem(&ar, &br, &width, Mode::Floor) {
            Ok(outcome) => return Ok(outcome.quotient),
            Err(Overflow) => bits = width.widened(),
        }
    }
}

/// Quotient and remainder (spec.md §4.5.4): `A = Q*B + R`, with `R`'s
/// terms all below `B`'s leading monomial.
pub fn divrem(a: &SparsePoly, b: &SparsePoly) -> PolyResult<(SparsePoly, SparsePoly)> {
    assert!(!b.is_empty());
    let mut bits = a.width().bits().max(b.width().bits());
    loop {
        let width = FieldWidth::try_new(a.width().order(), a.width().nvars(), bits)?;
        let ar = repack(a, &width);
        let br = repack(b, &width);
        match try_divrem(&ar, &br, &width, Mode::Remainder) {
            Ok(outcome) => return Ok((outcome.quotient, outcome.remainder)),
            Err(Overflow) => bits = width.widened(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Fail fast and return as soon as the input is known not exact.
    ExactOnly,
    /// Discard any term that would fail the divisibility test.
    Floor,
    /// Keep failed terms as remainder terms.
    Remainder,
}

struct DivremOutcome {
    exact: bool,
    quotient: SparsePoly,
    remainder: SparsePoly,
}

/// Push every body row whose next-due column is `col` and which is not
/// already scheduled.
fn arm_rows_due_at(
    col: u32,
    b: &SparsePoly,
    quotient: &SparsePoly,
    width: &FieldWidth,
    heap: &mut Heap,
    hind: &mut [u32],
    in_heap: &mut [bool],
) -> Result<(), Overflow> {
    for row in 1..b.len() {
        if hind[row] == col && !in_heap[row] {
            let e = width
                .add_checked(b.exp(row), quotient.exp(col as usize))
                .ok_or(Overflow)?;
            heap.push(e, Cell { i: row as u32, j: col });
            in_heap[row] = true;
        }
    }
    Ok(())
}

/// Shared scheduler for exact division, floor-quotient, and divrem
/// (spec.md §4.5.3/§4.5.4). `B`'s term 0 is the divisor's leading
/// monomial and is never scheduled as a heap row; rows `1..len(B)`
/// each subtract `b_i * q_j` for every quotient column `j` that exists.
/// A row whose next-due column does not exist yet falls idle; rather
/// than re-deriving it lazily per cell (as the vertical-chain trick
/// does for multiplication's *static* cross product), every row whose
/// `hind` next-column matches the column just emitted is rescanned and
/// re-armed — correct for the *dynamically growing* quotient, at the
/// cost of allowing more than one row ahead of the strict minimum to
/// sit in the heap at once (documented in DESIGN.md).
fn try_divrem(
    a: &SparsePoly,
    b: &SparsePoly,
    width: &FieldWidth,
    mode: Mode,
) -> Result<DivremOutcome, Overflow> {
    const SENTINEL: u32 = u32::MAX;
    let la = a.len();
    let lb = b.len();
    let mut quotient = SparsePoly::zero(width.clone());
    let mut remainder = SparsePoly::zero(width.clone());

    if la == 0 {
        return Ok(DivremOutcome {
            exact: true,
            quotient,
            remainder,
        });
    }

    let mut heap = Heap::new(width, false);
    // hind[i]: the next quotient column row i (b's term i, i in 1..lb)
    // is due to pair against; in_heap[i] whether that pairing is
    // currently scheduled.
    let mut hind = vec![0u32; lb];
    let mut in_heap = vec![false; lb];

    heap.push(a.exp(0).to_vec(), Cell { i: SENTINEL, j: 0 });
    let mut dividend_next = 1usize;

    let mut exact = true;

    // Nothing to arm before the first quotient term exists; `arm_rows_due_at`
    // is invoked after every emission below, including the first.

    while !heap.is_empty() {
        let top_exp = heap.peek_exp().unwrap().to_vec();
        let mut acc = TaggedInt::zero();
        while heap.peek_exp() == Some(top_exp.as_slice()) {
            let (_, Cell { i, j }) = heap.pop().unwrap();
            if i == SENTINEL {
                acc = acc.add(a.coeff(dividend_next - 1));
                if dividend_next < la {
                    heap.push(a.exp(dividend_next).to_vec(), Cell { i: SENTINEL, j: 0 });
                    dividend_next += 1;
                }
            } else {
                let row = i as usize;
                in_heap[row] = false;
                let qj = quotient.coeff(j as usize).clone();
                acc.submul(b.coeff(row), &qj);
                hind[row] = j + 1;
                if (j as usize + 1) < quotient.len() {
                    let e = width.add_checked(b.exp(row), quotient.exp(j as usize + 1)).ok_or(Overflow)?;
                    heap.push(e, Cell { i: row as u32, j: j + 1 });
                    in_heap[row] = true;
                }
            }
        }

        match width.divides(b.exp(0), &top_exp) {
            Some(qexp) if !acc.is_zero() => {
                let (q, r) = acc.trunc_div_rem(b.coeff(0));
                if r.is_zero() {
                    quotient.push_term(q, qexp);
                    let k = (quotient.len() - 1) as u32;
                    arm_rows_due_at(k, b, &quotient, width, &mut heap, &mut hind, &mut in_heap)?;
                } else {
                    exact = false;
                    match mode {
                        Mode::ExactOnly => {
                            return Ok(DivremOutcome {
                                exact: false,
                                quotient,
                                remainder,
                            })
                        }
                        Mode::Floor => {}
                        Mode::Remainder => remainder.push_term(acc, top_exp),
                    }
                }
            }
            _ if !acc.is_zero() => {
                exact = false;
                match mode {
                    Mode::ExactOnly => {
                        return Ok(DivremOutcome {
                            exact: false,
                            quotient,
                            remainder,
                        })
                    }
                    Mode::Floor => {}
                    Mode::Remainder => remainder.push_term(acc, top_exp),
                }
            }
            _ => {}
        }
    }

    remainder.sort_terms();
    Ok(DivremOutcome {
        exact,
        quotient,
        remainder,
    })
}
